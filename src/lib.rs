pub mod config;
pub mod filter;
pub mod geo;
pub mod models;
pub mod storage;
pub mod templates;
