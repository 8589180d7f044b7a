use crate::compositor::IblMaps;
use crate::config::LightingConfig;
use crate::environment::{generate_default_hdr, load_hdr_image, EnvironmentMap};
use crate::gpu::IblMapsGpu;
use crate::pipeline::IblPipeline;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const DEFAULT_CUBE_RESOLUTION: u32 = 128;

/// Keyed registry of environments and their derived IBL maps. Holds one
/// permanent generated default; file-backed entries are ref-counted and drop
/// their CPU and GPU data when released to zero.
pub struct EnvironmentRegistry {
    environments: HashMap<String, EnvironmentEntry>,
    default_key: String,
    pipeline: IblPipeline,
    revision: u64,
}

struct EnvironmentEntry {
    definition: EnvironmentDefinition,
    environment: Option<Arc<EnvironmentMap>>,
    maps: Option<Arc<IblMaps>>,
    gpu: Option<Arc<IblMapsGpu>>,
    ref_count: usize,
    permanent: bool,
}

#[derive(Clone)]
pub struct EnvironmentDefinition {
    key: String,
    label: String,
    source: Option<String>,
}

impl EnvironmentDefinition {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl EnvironmentRegistry {
    pub fn new(config: LightingConfig) -> Self {
        let default_key = "environment::default".to_string();
        let mut registry = Self {
            environments: HashMap::new(),
            default_key: default_key.clone(),
            pipeline: IblPipeline::new(config),
            revision: 0,
        };
        registry.environments.insert(
            default_key.clone(),
            EnvironmentEntry {
                definition: EnvironmentDefinition {
                    key: default_key,
                    label: "Built-in Sky".to_string(),
                    source: None,
                },
                environment: None,
                maps: None,
                gpu: None,
                ref_count: 1,
                permanent: true,
            },
        );
        registry.bump_revision();
        registry
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.environments.keys()
    }

    pub fn definition(&self, key: &str) -> Option<&EnvironmentDefinition> {
        self.environments.get(key).map(|entry| &entry.definition)
    }

    pub fn ref_count(&self, key: &str) -> Option<usize> {
        self.environments.get(key).map(|entry| entry.ref_count)
    }

    /// Monotonic counter bumped on every registration change; lets renderers
    /// detect that their cached bindings are stale.
    pub fn version(&self) -> u64 {
        self.revision
    }

    fn bump_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Registers every supported environment image found in `dir`.
    pub fn load_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<Vec<String>> {
        let dir_path = dir.as_ref();
        if !dir_path.exists() {
            return Ok(Vec::new());
        }
        let mut loaded = Vec::new();
        let entries = fs::read_dir(dir_path)
            .with_context(|| format!("reading environment directory '{}'", dir_path.display()))?;
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let source_path = entry.path();
            if !is_supported_environment_file(&source_path) {
                continue;
            }
            let Some(key) = environment_key_from_path(&source_path) else {
                continue;
            };
            if self.environments.contains_key(&key) {
                continue;
            }
            let label = source_path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| key.clone());
            self.environments.insert(
                key.clone(),
                EnvironmentEntry {
                    definition: EnvironmentDefinition {
                        key: key.clone(),
                        label,
                        source: Some(source_path.to_string_lossy().into_owned()),
                    },
                    environment: None,
                    maps: None,
                    gpu: None,
                    ref_count: 0,
                    permanent: false,
                },
            );
            self.bump_revision();
            loaded.push(key);
        }
        Ok(loaded)
    }

    pub fn retain(&mut self, key: &str, source: Option<&str>) -> Result<()> {
        if let Some(entry) = self.environments.get_mut(key) {
            entry.ref_count = entry.ref_count.saturating_add(1);
            if let Some(path) = source {
                if entry.definition.source() != Some(path) {
                    entry.definition.source = Some(path.to_string());
                    entry.environment = None;
                    entry.maps = None;
                    entry.gpu = None;
                }
            }
            return Ok(());
        }
        let path =
            source.ok_or_else(|| anyhow!("Environment '{key}' not loaded and no source provided."))?;
        self.environments.insert(
            key.to_string(),
            EnvironmentEntry {
                definition: EnvironmentDefinition {
                    key: key.to_string(),
                    label: key.to_string(),
                    source: Some(path.to_string()),
                },
                environment: None,
                maps: None,
                gpu: None,
                ref_count: 1,
                permanent: false,
            },
        );
        self.bump_revision();
        Ok(())
    }

    pub fn release(&mut self, key: &str) -> bool {
        if let Some(entry) = self.environments.get_mut(key) {
            if entry.permanent {
                return true;
            }
            if entry.ref_count > 0 {
                entry.ref_count -= 1;
            }
            if entry.ref_count == 0 {
                entry.environment = None;
                entry.maps = None;
                entry.gpu = None;
            }
            return true;
        }
        false
    }

    fn build_environment(definition: &EnvironmentDefinition) -> Result<EnvironmentMap> {
        let image = match definition.source() {
            Some(path) => load_hdr_image(path)
                .with_context(|| format!("loading environment '{}'", definition.key()))?,
            None => generate_default_hdr(),
        };
        Ok(EnvironmentMap::from_equirect(&image, DEFAULT_CUBE_RESOLUTION)?)
    }

    /// Source environment cube for `key`, decoding and projecting on first
    /// use.
    pub fn ensure_environment(&mut self, key: &str) -> Result<Arc<EnvironmentMap>> {
        let entry =
            self.environments.get_mut(key).ok_or_else(|| anyhow!("Environment '{key}' not retained"))?;
        if let Some(environment) = entry.environment.as_ref() {
            return Ok(environment.clone());
        }
        let environment = Arc::new(Self::build_environment(&entry.definition)?);
        entry.environment = Some(environment.clone());
        Ok(environment)
    }

    /// Derived maps for `key`, running the precomputation pipeline on first
    /// use. Blocking; see `IblPipeline::regenerate_background` for keeping a
    /// frame loop responsive instead.
    pub fn ensure_maps(&mut self, key: &str) -> Result<Arc<IblMaps>> {
        if let Some(maps) = self.environments.get(key).and_then(|entry| entry.maps.clone()) {
            return Ok(maps);
        }
        let environment = self.ensure_environment(key)?;
        let maps = self
            .pipeline
            .regenerate(&environment)
            .with_context(|| format!("generating IBL maps for '{key}'"))?;
        if let Some(entry) = self.environments.get_mut(key) {
            entry.maps = Some(maps.clone());
        }
        Ok(maps)
    }

    /// GPU textures for `key`, uploading on first use.
    pub fn ensure_gpu(
        &mut self,
        key: &str,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Arc<IblMapsGpu>> {
        if let Some(gpu) = self.environments.get(key).and_then(|entry| entry.gpu.clone()) {
            return Ok(gpu);
        }
        let maps = self.ensure_maps(key)?;
        let gpu = Arc::new(
            IblMapsGpu::upload(device, queue, &maps)
                .with_context(|| format!("uploading environment '{key}'"))?,
        );
        if let Some(entry) = self.environments.get_mut(key) {
            entry.gpu = Some(gpu.clone());
        }
        Ok(gpu)
    }

    pub fn pipeline(&self) -> &IblPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut IblPipeline {
        &mut self.pipeline
    }
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::new(LightingConfig::default())
    }
}

fn is_supported_environment_file(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()).map(|s| s.to_ascii_lowercase()) {
        Some(ext) => matches!(ext.as_str(), "hdr" | "exr" | "png"),
        None => false,
    }
}

fn environment_key_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let sanitized: String = stem
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '_' })
        .collect();
    if sanitized.is_empty() {
        None
    } else {
        Some(format!("environment::{sanitized}"))
    }
}
