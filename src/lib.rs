pub mod atomic;
pub mod commands;
pub mod doctor;
pub mod error;
pub mod merge;
pub mod names;
pub mod paths;
pub mod profiles;
pub mod schema;
pub mod switch;
pub mod ui;
pub mod writer;

pub use error::{FsOperation, ProfileError, ProfileResult};
pub use profiles::{ProfileInfo, ProfileStore};
pub use schema::{DocumentValidator, ModelMapValidator, ValidationIssue};

#[cfg(test)]
pub mod test_utils;
