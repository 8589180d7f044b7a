use crate::cubemap::PrefilteredCubemap;
use crate::environment::EnvironmentMap;
use crate::error::LightingError;
use crate::pass::{run_cube_plan, PassPlan};
use crate::sampling::{hammersley, importance_sample_ggx, reflect};
use glam::Vec3;

pub const DEFAULT_PREFILTER_BASE_RESOLUTION: u32 = 128;
pub const DEFAULT_PREFILTER_MIP_LEVELS: u32 = 5;
pub const DEFAULT_PREFILTER_SAMPLE_COUNT: u32 = 1024;

/// Importance-samples the GGX lobe at increasing roughness per mip level.
/// Uses the standard isotropic simplification V = R = N, so the lobe is
/// centered on the output direction.
pub fn generate_prefiltered(
    environment: &EnvironmentMap,
    base_resolution: u32,
    mip_levels: u32,
) -> Result<PrefilteredCubemap, LightingError> {
    generate_prefiltered_with_samples(environment, base_resolution, mip_levels, DEFAULT_PREFILTER_SAMPLE_COUNT)
}

pub fn generate_prefiltered_with_samples(
    environment: &EnvironmentMap,
    base_resolution: u32,
    mip_levels: u32,
    sample_count: u32,
) -> Result<PrefilteredCubemap, LightingError> {
    if environment.size() == 0 {
        return Err(LightingError::InvalidInput("empty environment map".into()));
    }
    if sample_count == 0 {
        return Err(LightingError::InvalidInput("zero prefilter sample count".into()));
    }
    let plan = PassPlan::mip_chain(base_resolution, mip_levels)?;
    let levels = run_cube_plan(&plan, |pass, normal| {
        prefilter_direction(environment, normal, pass.roughness, sample_count)
    })?;
    Ok(PrefilteredCubemap { base_size: base_resolution, levels })
}

fn prefilter_direction(
    environment: &EnvironmentMap,
    normal: Vec3,
    roughness: f32,
    sample_count: u32,
) -> Vec3 {
    let v = normal;
    let mut color = Vec3::ZERO;
    let mut weight = 0.0f32;
    for i in 0..sample_count {
        let xi = hammersley(i, sample_count);
        let h = importance_sample_ggx(normal, xi, roughness);
        let l = reflect(-v, h).normalize();
        let n_dot_l = normal.dot(l);
        if n_dot_l > 0.0 {
            color += environment.sample(l) * n_dot_l;
            weight += n_dot_l;
        }
    }
    if weight > 0.0 {
        color / weight
    } else {
        environment.sample(normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubemap::cubemap_direction;

    #[test]
    fn sharpest_mip_matches_source_environment() {
        let image = crate::environment::generate_default_hdr();
        let size = 16;
        let env = EnvironmentMap::from_equirect(&image, size).expect("environment");
        let prefiltered =
            generate_prefiltered_with_samples(&env, size, 4, 64).expect("prefiltered");
        let level = &prefiltered.levels[0];
        assert_eq!(level.size, size);
        let mut max_err = 0.0f32;
        for face in 0..6 {
            for y in 0..size {
                for x in 0..size {
                    let dir = cubemap_direction(face, x, y, size);
                    let idx = ((y * size + x) * 4) as usize;
                    let got = Vec3::new(
                        level.faces[face][idx],
                        level.faces[face][idx + 1],
                        level.faces[face][idx + 2],
                    );
                    let want = env.sample(dir);
                    max_err = max_err.max((got - want).length() / want.length().max(1e-3));
                }
            }
        }
        assert!(max_err < 0.02, "mip 0 diverges from source by {max_err}");
    }

    #[test]
    fn rough_mip_blurs_toward_hemisphere_average() {
        // Two-tone environment: +Z hemisphere bright, -Z dark. The roughest
        // mip should land well between the extremes.
        let size = 16;
        let mut faces = crate::cubemap::empty_faces(size);
        for (face, data) in faces.iter_mut().enumerate() {
            let bright = matches!(face, 4);
            for texel in data.chunks_mut(4) {
                let v = if bright { 1.0 } else { 0.1 };
                texel.copy_from_slice(&[v, v, v, 1.0]);
            }
        }
        let env = EnvironmentMap::from_cubemap(crate::cubemap::Cubemap { size, faces })
            .expect("environment");
        let prefiltered = generate_prefiltered_with_samples(&env, size, 4, 256).expect("prefiltered");
        let rough = prefiltered.levels.last().expect("roughest level");
        let idx = ((rough.size / 2) * rough.size + rough.size / 2) as usize * 4;
        let toward_bright = rough.faces[4][idx];
        assert!(toward_bright < 1.0 && toward_bright > 0.1, "no blur at roughest mip: {toward_bright}");
    }

    #[test]
    fn zero_sample_count_is_rejected() {
        let env = EnvironmentMap::constant(Vec3::ONE, 8).expect("environment");
        assert!(generate_prefiltered_with_samples(&env, 8, 4, 0).is_err());
    }
}
