#![allow(dead_code)]

pub mod mock_executors;
pub mod strategies;

pub use mock_executors::*;
