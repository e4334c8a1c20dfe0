//! Integration test entry point for treedrive-server.
//!
//! Run with: cargo test --test integration

mod harness;
mod sessions;
mod transfer;
