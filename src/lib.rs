pub mod actor;
pub mod checkpoint;
pub mod command;
pub mod config;
pub mod console;
pub mod constants;
pub mod engine;
pub mod error;
pub mod grid;
pub mod level;
pub mod log;
pub mod orchestrator;
pub mod rng;
pub mod round;
pub mod session;
pub mod types;
pub mod world;
