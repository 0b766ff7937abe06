//! Test utilities for the load generator.
//!
//! This crate provides a fake target service to run virtual users against, and a tracing setup
//! for tests. See the modules for all available utilities.

pub mod server;
pub mod tracing;
