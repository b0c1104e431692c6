// Inner modules
mod fetch;
mod offset_sampler;

// Exports
pub use offset_sampler::{OffsetSampler, SamplerConfig};
