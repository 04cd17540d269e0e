pub mod sample;
pub mod filter;
pub mod error;
pub mod traits;
pub mod buffer;
pub mod channel;
pub mod command;
pub mod snapshot;
pub mod engine;
pub mod publisher;
pub mod status;
pub mod config;
pub mod controller;
pub mod dataset;
