use crate::cubemap::{cubemap_direction, empty_faces, CubemapLevel};
use crate::error::LightingError;
use glam::Vec3;

/// Pure description of one render-into-cube-face pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubePass {
    pub face: usize,
    pub mip: u32,
    pub size: u32,
    pub roughness: f32,
}

/// Ordered iteration plan over faces and mips, consumed by [`run_cube_plan`].
/// Generators describe their work as a plan instead of hand-unrolling
/// per-face loops.
#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
    passes: Vec<CubePass>,
    mip_sizes: Vec<u32>,
}

impl PassPlan {
    /// Six faces of a single-mip cube target.
    pub fn single_level(size: u32) -> Result<Self, LightingError> {
        if size == 0 {
            return Err(LightingError::InvalidInput("zero-resolution pass target".into()));
        }
        let passes = (0..6).map(|face| CubePass { face, mip: 0, size, roughness: 0.0 }).collect();
        Ok(Self { passes, mip_sizes: vec![size] })
    }

    /// Full mip chain; level m covers roughness m / (mip_levels - 1).
    pub fn mip_chain(base_size: u32, mip_levels: u32) -> Result<Self, LightingError> {
        if base_size == 0 || mip_levels == 0 {
            return Err(LightingError::InvalidInput("zero-resolution pass target".into()));
        }
        let mut passes = Vec::with_capacity((mip_levels * 6) as usize);
        let mut mip_sizes = Vec::with_capacity(mip_levels as usize);
        for mip in 0..mip_levels {
            let size = (base_size >> mip).max(1);
            let roughness = mip as f32 / (mip_levels as f32 - 1.0).max(1.0);
            mip_sizes.push(size);
            for face in 0..6 {
                passes.push(CubePass { face, mip, size, roughness });
            }
        }
        Ok(Self { passes, mip_sizes })
    }

    pub fn passes(&self) -> &[CubePass] {
        &self.passes
    }

    pub fn mip_count(&self) -> u32 {
        self.mip_sizes.len() as u32
    }
}

/// Runs every pass of the plan, invoking the kernel once per destination
/// texel with its unit direction, and collects the finished levels.
///
/// Each level is written completely before the next begins; the caller only
/// sees the result after the whole plan has run, so a partially-written
/// target can never escape.
pub fn run_cube_plan<K>(plan: &PassPlan, mut kernel: K) -> Result<Vec<CubemapLevel>, LightingError>
where
    K: FnMut(&CubePass, Vec3) -> Vec3,
{
    let mut levels: Vec<CubemapLevel> =
        plan.mip_sizes.iter().map(|&size| CubemapLevel { size, faces: empty_faces(size) }).collect();

    for pass in &plan.passes {
        let level = levels
            .get_mut(pass.mip as usize)
            .ok_or_else(|| LightingError::TargetMismatch(format!("mip {} out of range", pass.mip)))?;
        if level.size != pass.size {
            return Err(LightingError::TargetMismatch(format!(
                "pass expects {}px at mip {}, target has {}px",
                pass.size, pass.mip, level.size
            )));
        }
        let data = &mut level.faces[pass.face];
        for y in 0..pass.size {
            for x in 0..pass.size {
                let dir = cubemap_direction(pass.face, x, y, pass.size);
                let color = kernel(pass, dir);
                debug_assert!(color.is_finite(), "non-finite texel at face {} ({x}, {y})", pass.face);
                let idx = ((y * pass.size + x) * 4) as usize;
                data[idx] = color.x;
                data[idx + 1] = color.y;
                data[idx + 2] = color.z;
                data[idx + 3] = 1.0;
            }
        }
    }
    Ok(levels)
}
