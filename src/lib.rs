//! Cookbook configuration engine.
//!
//! This module exports the core components for the command line tool and
//! for build tools that embed the configuration store.

pub mod cli;
pub mod commands;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod logging;
pub mod vault;
