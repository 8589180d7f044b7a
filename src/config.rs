use crate::compositor::GroundFallback;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Quality and behavior knobs for the precomputation pipeline and the
/// ambient compositor.
#[derive(Debug, Clone, Deserialize)]
pub struct LightingConfig {
    #[serde(default = "LightingConfig::default_irradiance_resolution")]
    pub irradiance_resolution: u32,
    #[serde(default = "LightingConfig::default_irradiance_sample_delta")]
    pub irradiance_sample_delta: f32,
    #[serde(default = "LightingConfig::default_prefilter_base_resolution")]
    pub prefilter_base_resolution: u32,
    #[serde(default = "LightingConfig::default_prefilter_mip_levels")]
    pub prefilter_mip_levels: u32,
    #[serde(default = "LightingConfig::default_prefilter_sample_count")]
    pub prefilter_sample_count: u32,
    #[serde(default = "LightingConfig::default_brdf_lut_size")]
    pub brdf_lut_size: u32,
    #[serde(default = "LightingConfig::default_brdf_sample_count")]
    pub brdf_sample_count: u32,
    #[serde(default = "LightingConfig::default_ambient_intensity")]
    pub ambient_intensity: f32,
    /// Constant ambient color used while the pipeline is not Ready.
    #[serde(default = "LightingConfig::default_flat_ambient")]
    pub flat_ambient: [f32; 3],
    #[serde(default)]
    pub ground_fallback: Option<GroundFallback>,
}

impl LightingConfig {
    const fn default_irradiance_resolution() -> u32 {
        crate::irradiance::DEFAULT_IRRADIANCE_RESOLUTION
    }

    const fn default_irradiance_sample_delta() -> f32 {
        crate::irradiance::DEFAULT_SAMPLE_DELTA
    }

    const fn default_prefilter_base_resolution() -> u32 {
        crate::prefilter::DEFAULT_PREFILTER_BASE_RESOLUTION
    }

    const fn default_prefilter_mip_levels() -> u32 {
        crate::prefilter::DEFAULT_PREFILTER_MIP_LEVELS
    }

    const fn default_prefilter_sample_count() -> u32 {
        crate::prefilter::DEFAULT_PREFILTER_SAMPLE_COUNT
    }

    const fn default_brdf_lut_size() -> u32 {
        crate::brdf_lut::DEFAULT_BRDF_LUT_SIZE
    }

    const fn default_brdf_sample_count() -> u32 {
        crate::brdf_lut::DEFAULT_BRDF_SAMPLE_COUNT
    }

    const fn default_ambient_intensity() -> f32 {
        1.0
    }

    const fn default_flat_ambient() -> [f32; 3] {
        [0.03, 0.03, 0.03]
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read lighting config {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse lighting config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("[lighting] config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            irradiance_resolution: Self::default_irradiance_resolution(),
            irradiance_sample_delta: Self::default_irradiance_sample_delta(),
            prefilter_base_resolution: Self::default_prefilter_base_resolution(),
            prefilter_mip_levels: Self::default_prefilter_mip_levels(),
            prefilter_sample_count: Self::default_prefilter_sample_count(),
            brdf_lut_size: Self::default_brdf_lut_size(),
            brdf_sample_count: Self::default_brdf_sample_count(),
            ambient_intensity: Self::default_ambient_intensity(),
            flat_ambient: Self::default_flat_ambient(),
            ground_fallback: None,
        }
    }
}
