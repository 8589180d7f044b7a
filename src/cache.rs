use crate::compositor::IblMaps;
use crate::cubemap::{BrdfTable, Cubemap, CubemapLevel, PrefilteredCubemap};
use crate::environment::EnvironmentMap;
use crate::error::LightingError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const FORMAT_TAG: &[u8; 4] = b"SLIB";
const FORMAT_VERSION: u32 = 1;

/// On-disk layout for the three derived maps. Texel data is face-major,
/// row-major f32 RGBA, exactly as held in memory. Purely an optimization to
/// skip regeneration; a damaged or mismatched file is simply regenerated.
#[derive(Serialize, Deserialize)]
struct CacheFile {
    tag: [u8; 4],
    version: u32,
    environment_hash: [u8; 32],
    irradiance: CachedLevel,
    prefiltered: Vec<CachedLevel>,
    brdf_size: u32,
    brdf_data: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct CachedLevel {
    size: u32,
    faces: Vec<Vec<f32>>,
}

impl CachedLevel {
    fn from_faces(size: u32, faces: &[Vec<f32>; 6]) -> Self {
        Self { size, faces: faces.to_vec() }
    }

    fn into_faces(self) -> Result<(u32, [Vec<f32>; 6]), LightingError> {
        if self.size == 0 {
            return Err(LightingError::CacheFormat("zero-resolution cached level".into()));
        }
        let expected = (self.size * self.size * 4) as usize;
        if self.faces.len() != 6 || self.faces.iter().any(|f| f.len() != expected) {
            return Err(LightingError::CacheFormat("face data has unexpected length".into()));
        }
        let faces: [Vec<f32>; 6] = self
            .faces
            .try_into()
            .map_err(|_| LightingError::CacheFormat("expected six faces".into()))?;
        Ok((self.size, faces))
    }
}

/// Writes the derived maps for `environment` to `path`.
pub fn store(path: impl AsRef<Path>, environment: &EnvironmentMap, maps: &IblMaps) -> Result<()> {
    let path = path.as_ref();
    let file = CacheFile {
        tag: *FORMAT_TAG,
        version: FORMAT_VERSION,
        environment_hash: *environment.content_hash().as_bytes(),
        irradiance: CachedLevel::from_faces(maps.irradiance.size, &maps.irradiance.faces),
        prefiltered: maps
            .prefiltered
            .levels
            .iter()
            .map(|level| CachedLevel::from_faces(level.size, &level.faces))
            .collect(),
        brdf_size: maps.brdf.size,
        brdf_data: maps.brdf.data.clone(),
    };
    let bytes = bincode::serialize(&file).context("encoding IBL cache")?;
    fs::write(path, bytes).with_context(|| format!("writing IBL cache {}", path.display()))?;
    Ok(())
}

/// Loads cached maps, verifying the format tag, version, and that the cache
/// was produced from exactly this environment's texels.
pub fn load(path: impl AsRef<Path>, environment: &EnvironmentMap) -> Result<IblMaps> {
    let path = path.as_ref();
    let bytes = fs::read(path).with_context(|| format!("reading IBL cache {}", path.display()))?;
    let file: CacheFile = bincode::deserialize(&bytes)
        .map_err(|err| LightingError::CacheFormat(err.to_string()))
        .with_context(|| format!("decoding IBL cache {}", path.display()))?;

    if file.tag != *FORMAT_TAG {
        return Err(LightingError::CacheFormat("unrecognized format tag".into()).into());
    }
    if file.version != FORMAT_VERSION {
        return Err(LightingError::CacheFormat(format!(
            "unsupported cache version {}",
            file.version
        ))
        .into());
    }
    if file.environment_hash != *environment.content_hash().as_bytes() {
        return Err(LightingError::CacheHashMismatch.into());
    }

    let (size, faces) = file.irradiance.into_faces()?;
    let irradiance = Cubemap { size, faces };
    if file.prefiltered.is_empty() {
        return Err(LightingError::CacheFormat("empty prefiltered chain".into()).into());
    }
    let mut levels = Vec::with_capacity(file.prefiltered.len());
    for cached in file.prefiltered {
        let (size, faces) = cached.into_faces()?;
        levels.push(CubemapLevel { size, faces });
    }
    let base_size = levels[0].size;
    let prefiltered = PrefilteredCubemap { base_size, levels };

    if file.brdf_size == 0
        || file.brdf_data.len() != (file.brdf_size * file.brdf_size * 4) as usize
    {
        return Err(LightingError::CacheFormat("BRDF table has unexpected length".into()).into());
    }
    let brdf = BrdfTable { size: file.brdf_size, data: file.brdf_data };

    Ok(IblMaps { irradiance, prefiltered, brdf })
}
