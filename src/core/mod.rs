pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod executors;
pub mod graph;
pub mod resolver;
pub mod runner;
pub mod validation;
pub mod wire;
