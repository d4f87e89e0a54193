//! CLI command implementations.

pub mod admin;
pub mod delete;
pub mod hash_password;
pub mod serve;
