#![allow(dead_code)]

pub mod fetcher;
pub mod fixtures;
pub mod strategies;

pub use fetcher::*;
pub use fixtures::*;
pub use strategies::*;
