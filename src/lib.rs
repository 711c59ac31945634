#![forbid(unsafe_code)]

//! Control plane for HP-UX virtual partitions (vPars) hosted on physical
//! partitions (nPars), driven over SSH through the vendor CLI.

pub mod commands;
pub mod config;
pub mod driver;
pub mod errors;
pub mod models;
pub mod monitor;
pub mod parse;
pub mod persistence;
pub mod provisioning;
pub mod remote;
pub mod scheduler;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
