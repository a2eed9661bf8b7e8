//! Test harnesses for Postern.
//!
//! Provides `MockGateway`, a wiremock-backed stand-in for the API Gateway
//! REST API that synchronous code and the `postern` binary can talk to.

#[cfg(test)]
pub mod cli;
pub mod gateway;
#[cfg(test)]
mod importer;

pub use gateway::{MockGateway, TestError};
