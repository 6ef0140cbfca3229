pub mod builder;
pub mod comment;
pub mod tree;
