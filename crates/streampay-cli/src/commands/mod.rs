pub mod balance;
pub mod common;
pub mod config;
pub mod mutations;
pub mod streams;
pub mod watch;
