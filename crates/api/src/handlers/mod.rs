pub mod downloads;
pub mod models;
