pub mod errors;
pub mod sqlite;
