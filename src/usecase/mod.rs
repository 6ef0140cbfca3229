pub mod comments;
pub mod contracts;
pub mod error;
