use crate::material::{Light, Material, MIN_ROUGHNESS};
use glam::Vec3;
use std::f32::consts::PI;

/// Denominator guard for near-grazing cosines.
const COS_EPSILON: f32 = 1e-4;

/// GGX / Trowbridge-Reitz normal distribution, alpha = roughness^2.
pub fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    // Roughness can arrive unclamped through direct field writes; below
    // MIN_ROUGHNESS the denominator vanishes at n_dot_h = 1.
    let r = roughness.max(MIN_ROUGHNESS);
    let a = r * r;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * d * d)
}

/// Schlick-GGX masking for a single direction with an explicit k.
fn geometry_schlick_ggx(n_dot_x: f32, k: f32) -> f32 {
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

/// Smith joint masking-shadowing, direct-lighting remapping
/// k = (roughness + 1)^2 / 8.
pub fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = (r * r) * 0.125;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

/// Smith joint masking-shadowing with the IBL remapping k = roughness^2 / 2.
/// Used only by the split-sum integration table.
pub fn geometry_smith_ibl(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let k = a * 0.5;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

/// Schlick's Fresnel approximation.
pub fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Roughness-aware Fresnel used by the ambient compositor; the clamp keeps
/// grazing reflectance from exceeding what a rough surface can return.
pub fn fresnel_schlick_roughness(cos_theta: f32, f0: Vec3, roughness: f32) -> Vec3 {
    let max_reflectance = Vec3::splat(1.0 - roughness).max(f0);
    f0 + (max_reflectance - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Cook-Torrance contribution of a single light.
///
/// `n`, `v`, `l` are unit vectors; `radiance` is the light color with
/// attenuation already applied. Back-facing configurations contribute zero.
pub fn evaluate_direct(n: Vec3, v: Vec3, l: Vec3, radiance: Vec3, material: &Material) -> Vec3 {
    let n_dot_v = n.dot(v);
    let n_dot_l = n.dot(l);
    if n_dot_v <= 0.0 || n_dot_l <= 0.0 {
        return Vec3::ZERO;
    }

    let h = (v + l).normalize();
    let n_dot_h = n.dot(h).max(0.0);
    let h_dot_v = h.dot(v).max(0.0);

    let d = distribution_ggx(n_dot_h, material.roughness);
    let g = geometry_smith(n_dot_v, n_dot_l, material.roughness);
    let f = fresnel_schlick(h_dot_v, material.f0());

    let specular = d * g * f / (4.0 * n_dot_v.max(COS_EPSILON) * n_dot_l.max(COS_EPSILON));
    let k_d = (Vec3::ONE - f) * (1.0 - material.metallic);
    let diffuse = k_d * material.albedo / PI;

    (diffuse + specular) * radiance * n_dot_l
}

/// Sum of `evaluate_direct` over every active light at a surface point.
pub fn shade_direct(n: Vec3, v: Vec3, point: Vec3, material: &Material, lights: &[Light]) -> Vec3 {
    let mut total = Vec3::ZERO;
    for light in lights {
        let (l, radiance) = light.radiance_at(point);
        total += evaluate_direct(n, v, l, radiance, material);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MIN_ROUGHNESS;
    use crate::sampling::reflect;
    use std::f32::consts::FRAC_PI_2;

    // The NDF is normalized so the projected microfacet area integrates to
    // one over the hemisphere.
    #[test]
    fn ggx_distribution_integrates_to_one() {
        for roughness in [0.25f32, 0.5, 1.0] {
            let steps = 4096;
            let d_theta = FRAC_PI_2 / steps as f32;
            let mut sum = 0.0f64;
            for i in 0..steps {
                let theta = (i as f32 + 0.5) * d_theta;
                let d = distribution_ggx(theta.cos(), roughness);
                // Azimuthal symmetry folds the phi integral into 2*pi.
                sum += (d * theta.cos() * theta.sin() * d_theta * std::f32::consts::TAU) as f64;
            }
            assert!((sum - 1.0).abs() < 0.03, "roughness {roughness}: integral {sum}");
        }
    }

    #[test]
    fn energy_split_never_exceeds_one() {
        for metallic in [0.0f32, 0.3, 1.0] {
            for roughness in [MIN_ROUGHNESS, 0.3, 0.7, 1.0] {
                for cos_index in 0..32 {
                    let cos_theta = (cos_index as f32 + 0.5) / 32.0;
                    let material = Material::new(Vec3::new(0.9, 0.6, 0.2), metallic, roughness, 1.0);
                    let k_s = fresnel_schlick_roughness(cos_theta, material.f0(), material.roughness);
                    let k_d = (Vec3::ONE - k_s) * (1.0 - material.metallic);
                    let total = k_d + k_s;
                    assert!(
                        total.max_element() <= 1.0 + 1e-5,
                        "kD + kS = {total} at metallic {metallic}, roughness {roughness}"
                    );
                }
            }
        }
    }

    #[test]
    fn fully_metallic_surface_has_no_diffuse() {
        let material = Material::new(Vec3::new(0.2, 0.9, 0.4), 1.0, 0.6, 1.0);
        let n = Vec3::Z;
        let v = Vec3::new(0.2, 0.1, 0.9).normalize();
        let l = Vec3::new(-0.3, 0.2, 0.9).normalize();
        let out = evaluate_direct(n, v, l, Vec3::ONE, &material);
        // The result must equal the pure specular expression: kD is exactly
        // zero, so no Lambert term may leak through regardless of albedo.
        let h = (v + l).normalize();
        let d = distribution_ggx(n.dot(h), material.roughness);
        let g = geometry_smith(n.dot(v), n.dot(l), material.roughness);
        let f = fresnel_schlick(h.dot(v), material.f0());
        let specular = d * g * f / (4.0 * n.dot(v) * n.dot(l)) * n.dot(l);
        assert!((out - specular).length() < 1e-5);
    }

    #[test]
    fn hand_built_zero_roughness_material_stays_finite() {
        // Struct literals bypass the constructor clamp; the worst case is a
        // perfectly aligned half vector.
        let material = Material { albedo: Vec3::ONE, metallic: 1.0, roughness: 0.0, ao: 1.0 };
        let out = evaluate_direct(Vec3::Z, Vec3::Z, Vec3::Z, Vec3::ONE, &material);
        assert!(out.is_finite(), "non-finite output {out}");
        assert!(out.max_element() > 0.0);
    }

    #[test]
    fn back_facing_light_contributes_nothing() {
        let material = Material::default();
        let out = evaluate_direct(Vec3::Z, Vec3::Z, -Vec3::Z, Vec3::ONE, &material);
        assert_eq!(out, Vec3::ZERO);
    }

    // Mirror sanity check as an energy statement: for a smooth metal the
    // specular term integrated over incident directions returns F0 of the
    // incoming radiance. A pointwise probe at the mirror direction diverges
    // as the lobe narrows, so the integral is the meaningful quantity.
    #[test]
    fn smooth_metal_reflects_f0_of_incoming_energy() {
        let material = Material::new(Vec3::ONE, 1.0, 0.15, 1.0);
        let n = Vec3::Z;
        let v = Vec3::Z; // head-on, so the lobe is azimuthally symmetric
        let steps = 16_384;
        let d_theta = FRAC_PI_2 / steps as f32;
        let mut reflected = 0.0f64;
        for i in 0..steps {
            let theta = (i as f32 + 0.5) * d_theta;
            let l = Vec3::new(theta.sin(), 0.0, theta.cos());
            let out = evaluate_direct(n, v, l, Vec3::ONE, &material);
            reflected += (out.x * theta.sin() * d_theta * std::f32::consts::TAU) as f64;
        }
        let f0 = material.f0().x as f64;
        assert!(
            (reflected - f0).abs() < 0.15 * f0,
            "reflected energy {reflected} vs F0 {f0}"
        );
    }

    #[test]
    fn mirror_aligned_light_dominates_off_axis_light() {
        let material = Material::new(Vec3::ONE, 1.0, MIN_ROUGHNESS, 1.0);
        let n = Vec3::Z;
        let v = Vec3::new(0.4, 0.0, 0.9165).normalize();
        let mirror = reflect(-v, n);
        let off_axis = Vec3::new(-0.6, 0.3, 0.74).normalize();
        let aligned = evaluate_direct(n, v, mirror, Vec3::ONE, &material);
        let away = evaluate_direct(n, v, off_axis, Vec3::ONE, &material);
        assert!(aligned.x > away.x * 1e3);
    }

    #[test]
    fn red_point_light_scenario_is_red_dominant_and_bounded() {
        let material = Material::new(Vec3::new(1.0, 0.0, 0.0), 0.0, 0.5, 1.0);
        let n = Vec3::Z;
        let v = Vec3::Z;
        let lights = [Light::Point { position: Vec3::new(0.0, 0.0, 5.0), color: Vec3::splat(300.0) }];
        let out = shade_direct(n, v, Vec3::ZERO, &material, &lights);
        assert!(out.is_finite());
        assert!(out.x > out.y && out.x > out.z, "not red dominant: {out}");
        assert!(out.x > 1.0 && out.x < 5.0, "unexpected magnitude: {out}");
    }
}
