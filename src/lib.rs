//! rudo: a command line task manager with recurring and repeating tasks.
//!
//! This module exports the core components for testing and integration.

pub mod arguments;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod fulid;
pub mod logging;
pub mod model;
pub mod report;
pub mod services;
