// Library exports for polyboard

pub mod csv_reader;
pub mod error;
pub mod palette;
pub mod validate;

// Data preparation
pub mod config;
pub mod prepare;
pub mod transform;

// Chart pipeline
pub mod compiler;
pub mod graph;
pub mod ir;
pub mod layout;
pub mod runtime;
pub mod scale;

pub use error::{ChartError, ChartResult};
