pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod shops;
pub mod state;
