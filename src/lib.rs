pub mod config;
pub mod embed;
pub mod error;
pub mod http;
pub mod logging;
pub mod openai;
pub mod qa;
pub mod register;
pub mod search;
pub mod store;
