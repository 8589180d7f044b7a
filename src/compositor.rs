use crate::brdf::fresnel_schlick_roughness;
use crate::cubemap::{BrdfTable, Cubemap, PrefilteredCubemap};
use crate::material::Material;
use crate::sampling::reflect;
use glam::Vec3;
use serde::Deserialize;

/// The complete derived set the compositor samples from. Published atomically
/// by the pipeline; never mutated once built.
#[derive(Clone, Debug)]
pub struct IblMaps {
    pub irradiance: Cubemap,
    pub prefiltered: PrefilteredCubemap,
    pub brdf: BrdfTable,
}

/// Non-physical safeguard blended over the physically derived ambient when
/// the reflection direction points below the local horizon or the sampled
/// specular is effectively black. Purely a post-step; the blend curve is a
/// tunable, not a physical constant.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GroundFallback {
    pub color: [f32; 3],
    pub intensity: f32,
    #[serde(default = "GroundFallback::default_luminance_threshold")]
    pub luminance_threshold: f32,
    #[serde(default = "GroundFallback::default_blend_exponent")]
    pub blend_exponent: f32,
}

impl GroundFallback {
    const fn default_luminance_threshold() -> f32 {
        1e-3
    }

    const fn default_blend_exponent() -> f32 {
        1.0
    }
}

fn luminance(color: Vec3) -> f32 {
    color.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// Split-sum ambient term: convolved irradiance for diffuse, prefiltered
/// environment plus the integration table for specular.
pub fn compute_ambient(
    n: Vec3,
    v: Vec3,
    material: &Material,
    maps: &IblMaps,
    intensity: f32,
) -> Vec3 {
    let n_dot_v = n.dot(v).max(0.0);
    let f0 = material.f0();

    let k_s = fresnel_schlick_roughness(n_dot_v, f0, material.roughness);
    let k_d = (Vec3::ONE - k_s) * (1.0 - material.metallic);
    let diffuse = k_d * maps.irradiance.sample(n) * material.albedo;

    let r = reflect(-v, n);
    let lod = material.roughness * maps.prefiltered.max_mip_level();
    let prefiltered = maps.prefiltered.sample_lod(r, lod);
    let (scale, bias) = maps.brdf.lookup(n_dot_v, material.roughness);
    let specular = prefiltered * (f0 * scale + Vec3::splat(bias));

    (diffuse + specular) * material.ao * intensity
}

/// Flat constant ambient used when the pipeline is Invalid or not yet Ready;
/// never samples any texture.
pub fn flat_ambient(material: &Material, flat_color: Vec3, intensity: f32) -> Vec3 {
    material.albedo * flat_color * material.ao * intensity
}

/// Applies the ground fallback over an already-computed ambient value.
/// `n`/`v` must match the `compute_ambient` call that produced `ambient`;
/// `up` is the local horizon axis.
pub fn apply_ground_fallback(
    ambient: Vec3,
    n: Vec3,
    v: Vec3,
    up: Vec3,
    maps: &IblMaps,
    material: &Material,
    fallback: &GroundFallback,
) -> Vec3 {
    let r = reflect(-v, n);
    let lod = material.roughness * maps.prefiltered.max_mip_level();
    let sampled = maps.prefiltered.sample_lod(r, lod);

    let below_horizon = r.dot(up) < 0.0;
    let near_black = luminance(sampled) < fallback.luminance_threshold;
    if !below_horizon && !near_black {
        return ambient;
    }

    // Blend weight ramps with how far below the horizon the reflection
    // points; near-black reflections use the full configured intensity.
    let depth = if below_horizon { (-r.dot(up)).clamp(0.0, 1.0) } else { 1.0 };
    let weight = (depth.powf(fallback.blend_exponent.max(1e-3)) * fallback.intensity).clamp(0.0, 1.0);
    let ground = Vec3::from(fallback.color) * material.ao;
    ambient.lerp(ground, weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brdf_lut::generate_brdf_table_with_samples;
    use crate::environment::EnvironmentMap;
    use crate::irradiance::generate_irradiance_with_delta;
    use crate::prefilter::generate_prefiltered_with_samples;

    fn test_maps(color: Vec3) -> IblMaps {
        let env = EnvironmentMap::constant(color, 16).expect("environment");
        IblMaps {
            irradiance: generate_irradiance_with_delta(&env, 8, 0.05).expect("irradiance"),
            prefiltered: generate_prefiltered_with_samples(&env, 16, 4, 64).expect("prefiltered"),
            brdf: generate_brdf_table_with_samples(32, 256).expect("brdf"),
        }
    }

    #[test]
    fn metallic_surface_takes_no_diffuse_ambient() {
        let maps = test_maps(Vec3::ONE);
        let metal = Material::new(Vec3::new(1.0, 0.76, 0.33), 1.0, 0.3, 1.0);
        let dielectric = Material::new(Vec3::new(1.0, 0.76, 0.33), 0.0, 0.3, 1.0);
        let metal_out = compute_ambient(Vec3::Z, Vec3::Z, &metal, &maps, 1.0);
        let dielectric_out = compute_ambient(Vec3::Z, Vec3::Z, &dielectric, &maps, 1.0);
        // The dielectric keeps a Lambert share; the metal is specular-only
        // and therefore tinted by F0 rather than flat white.
        assert!(dielectric_out.min_element() > 0.3);
        assert!(metal_out.x > metal_out.z, "metal ambient not tinted by F0: {metal_out}");
    }

    #[test]
    fn ambient_scales_with_ao_and_intensity() {
        let maps = test_maps(Vec3::ONE);
        let base = Material::new(Vec3::splat(0.8), 0.2, 0.5, 1.0);
        let occluded = Material::new(Vec3::splat(0.8), 0.2, 0.5, 0.5);
        let full = compute_ambient(Vec3::Z, Vec3::Z, &base, &maps, 1.0);
        let half_ao = compute_ambient(Vec3::Z, Vec3::Z, &occluded, &maps, 1.0);
        let half_intensity = compute_ambient(Vec3::Z, Vec3::Z, &base, &maps, 0.5);
        assert!((half_ao - full * 0.5).length() < 1e-5);
        assert!((half_intensity - full * 0.5).length() < 1e-5);
    }

    #[test]
    fn fallback_disabled_leaves_physical_result_untouched() {
        let maps = test_maps(Vec3::splat(0.5));
        let material = Material::new(Vec3::splat(0.9), 1.0, 0.1, 1.0);
        let n = Vec3::Z;
        let v = Vec3::Z;
        let ambient = compute_ambient(n, v, &material, &maps, 1.0);
        let fallback = GroundFallback {
            color: [0.2, 0.15, 0.1],
            intensity: 0.5,
            luminance_threshold: 1e-3,
            blend_exponent: 1.0,
        };
        // Bright constant environment: neither trigger fires.
        let out = apply_ground_fallback(ambient, n, v, Vec3::Z, &maps, &material, &fallback);
        assert_eq!(out, ambient);
    }

    #[test]
    fn fallback_blends_ground_color_for_black_reflections() {
        let maps = test_maps(Vec3::ZERO);
        let material = Material::new(Vec3::ONE, 1.0, 0.05, 1.0);
        let n = Vec3::Z;
        let v = Vec3::Z;
        let ambient = compute_ambient(n, v, &material, &maps, 1.0);
        assert!(ambient.length() < 1e-4, "black environment should give black ambient");
        let fallback = GroundFallback {
            color: [0.2, 0.15, 0.1],
            intensity: 1.0,
            luminance_threshold: 1e-3,
            blend_exponent: 1.0,
        };
        let out = apply_ground_fallback(ambient, n, v, Vec3::Z, &maps, &material, &fallback);
        assert!((out - Vec3::new(0.2, 0.15, 0.1)).length() < 1e-5);
    }

    #[test]
    fn flat_ambient_ignores_maps() {
        let material = Material::new(Vec3::new(0.5, 0.25, 0.1), 0.0, 0.5, 0.8);
        let out = flat_ambient(&material, Vec3::splat(0.2), 1.5);
        let expected = material.albedo * 0.2 * 0.8 * 1.5;
        assert!((out - expected).length() < 1e-6);
    }
}
