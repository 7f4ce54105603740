pub mod engine;
pub mod service;
pub mod validate;
pub mod workspace;

pub use engine::{EngineConfig, PdfEngine, ProbeError};
pub use service::{ConvertLimits, ConvertService};
