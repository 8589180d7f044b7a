use crate::cubemap::Cubemap;
use crate::environment::EnvironmentMap;
use crate::error::LightingError;
use crate::pass::{run_cube_plan, PassPlan};
use glam::Vec3;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

pub const DEFAULT_IRRADIANCE_RESOLUTION: u32 = 32;
pub const DEFAULT_SAMPLE_DELTA: f32 = 0.025;

/// Convolves the environment over the hemisphere above each output direction,
/// producing the diffuse irradiance cube. The output is deliberately small:
/// irradiance is a low-frequency signal.
pub fn generate_irradiance(
    environment: &EnvironmentMap,
    resolution: u32,
) -> Result<Cubemap, LightingError> {
    generate_irradiance_with_delta(environment, resolution, DEFAULT_SAMPLE_DELTA)
}

/// Convolution with an explicit angular step, nested phi/theta sweep.
/// The sin(theta) factor corrects for the shrinking solid angle near the
/// pole; normalization is pi / sample_count, so a constant environment maps
/// to itself.
pub fn generate_irradiance_with_delta(
    environment: &EnvironmentMap,
    resolution: u32,
    sample_delta: f32,
) -> Result<Cubemap, LightingError> {
    if environment.size() == 0 {
        return Err(LightingError::InvalidInput("empty environment map".into()));
    }
    if !(sample_delta > 0.0) || sample_delta >= FRAC_PI_2 {
        return Err(LightingError::InvalidInput(format!("unusable sample delta {sample_delta}")));
    }
    let plan = PassPlan::single_level(resolution)?;
    let mut levels = run_cube_plan(&plan, |_, normal| {
        convolve_hemisphere(environment, normal, sample_delta)
    })?;
    let level = levels.pop().ok_or_else(|| LightingError::TargetMismatch("missing output level".into()))?;
    Ok(Cubemap { size: level.size, faces: level.faces })
}

fn convolve_hemisphere(environment: &EnvironmentMap, normal: Vec3, sample_delta: f32) -> Vec3 {
    // Tangent basis around the output direction.
    let up = if normal.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let right = up.cross(normal).normalize();
    let up = normal.cross(right);

    let mut irradiance = Vec3::ZERO;
    let mut sample_count = 0u32;
    let mut phi = 0.0f32;
    while phi < TAU {
        let mut theta = 0.0f32;
        while theta < FRAC_PI_2 {
            let tangent = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
            let sample_dir = right * tangent.x + up * tangent.y + normal * tangent.z;
            irradiance += environment.sample(sample_dir) * theta.cos() * theta.sin();
            sample_count += 1;
            theta += sample_delta;
        }
        phi += sample_delta;
    }
    irradiance * PI / sample_count as f32
}
