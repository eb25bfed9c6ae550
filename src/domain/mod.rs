pub mod unit;
pub mod diagnostics;
pub mod edge;
pub mod boundary;
pub mod graph;
pub mod builder;
pub mod workflow;
pub mod propagation;
pub mod synthesis;
pub mod pipeline;
pub mod ports;
