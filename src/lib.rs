pub mod cli;
pub mod config;
pub mod service;
pub mod ship;
pub mod source;
