//! Repository layer for data access.

pub mod entities;
mod user_directory;

#[cfg(any(test, feature = "test-utils"))]
pub use user_directory::MockUserDirectory;
pub use user_directory::{UserDirectory, UserDirectoryStore};
