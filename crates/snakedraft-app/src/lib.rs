// Library root: re-exports all modules so integration tests and the binary
// can reach the crate's public API.

pub mod app;
pub mod config;
pub mod db;
pub mod notify;
pub mod protocol;
pub mod render;
pub mod store;
pub mod teams;
