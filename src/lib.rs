//! interaction-testgen library: interaction graph construction and integration-test
//! scenario synthesis.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod domain;
pub mod server;
