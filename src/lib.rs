pub mod brdf;
pub mod brdf_lut;
pub mod cache;
pub mod compositor;
pub mod config;
pub mod cubemap;
pub mod environment;
pub mod error;
pub mod gpu;
pub mod irradiance;
pub mod material;
pub mod pass;
pub mod pipeline;
pub mod prefilter;
pub mod registry;
pub mod sampling;

pub use brdf::{evaluate_direct, shade_direct};
pub use brdf_lut::generate_brdf_table;
pub use compositor::{compute_ambient, GroundFallback, IblMaps};
pub use config::LightingConfig;
pub use environment::EnvironmentMap;
pub use error::LightingError;
pub use irradiance::generate_irradiance;
pub use material::{Light, Material};
pub use pipeline::{IblPipeline, PipelineState, PollOutcome};
pub use prefilter::generate_prefiltered;
pub use registry::EnvironmentRegistry;
