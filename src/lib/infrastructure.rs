//! Storage and relay adapters

pub mod database;
pub mod email;
