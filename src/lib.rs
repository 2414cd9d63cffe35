#![doc = include_str!("../README.md")]
#[macro_use]
extern crate log;

pub mod database;
pub mod domain;
pub mod engine;
pub mod error;
pub mod index;
pub mod model;
pub mod query;
pub mod results;
pub mod shard;
pub mod utils;
