// Inner modules
mod errors;
mod lag_engine;

// Exports
pub use errors::{LagEngineError, LagEngineResult};
pub use lag_engine::{LagEngine, SamplingInstantsConfig};
