pub mod auth;
pub mod batch;
pub mod config;
pub mod interview;
pub mod results;
