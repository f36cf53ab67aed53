pub mod checkpoint;
pub mod config;
pub mod domain;
pub mod error;
pub mod harvest;
pub mod interrupt;
pub mod modeldb;
pub mod output;
pub mod progress;
pub mod retry;
pub mod store;
