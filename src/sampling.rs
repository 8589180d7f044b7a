use glam::{Vec2, Vec3};
use std::f32::consts::TAU;

/// Low-discrepancy 2D point i of n: (i/n, Van der Corput radical inverse).
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

fn radical_inverse_vdc(bits: u32) -> f32 {
    let mut b = bits;
    b = (b << 16) | (b >> 16);
    b = ((b & 0x5555_5555) << 1) | ((b & 0xAAAA_AAAA) >> 1);
    b = ((b & 0x3333_3333) << 2) | ((b & 0xCCCC_CCCC) >> 2);
    b = ((b & 0x0F0F_0F0F) << 4) | ((b & 0xF0F0_F0F0) >> 4);
    b = ((b & 0x00FF_00FF) << 8) | ((b & 0xFF00_FF00) >> 8);
    (b as f32) * 2.328_306_4e-10
}

/// Half-vector around `normal` biased toward the GGX lobe for `roughness`.
/// Spherical coordinates follow the standard inversion of the GGX CDF with
/// alpha = roughness^2.
pub fn importance_sample_ggx(normal: Vec3, xi: Vec2, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);
    tangent_to_world(normal, h)
}

pub fn tangent_to_world(normal: Vec3, vec: Vec3) -> Vec3 {
    let up = if normal.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    tangent * vec.x + bitangent * vec.y + normal * vec.z
}

pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn hammersley_points_are_distinct_and_in_unit_square() {
        const N: u32 = 65_536;
        let mut seen = HashSet::with_capacity(N as usize);
        for i in 0..N {
            let p = hammersley(i, N);
            assert!((0.0..1.0).contains(&p.x) && (0.0..1.0).contains(&p.y), "point {p:?} out of range");
            assert!(seen.insert((p.x.to_bits(), p.y.to_bits())), "duplicate sample at index {i}");
        }
    }

    #[test]
    fn ggx_sample_is_unit_length_and_in_upper_hemisphere() {
        let n = Vec3::new(0.3, -0.5, 0.8).normalize();
        for i in 0..256 {
            let h = importance_sample_ggx(n, hammersley(i, 256), 0.4);
            assert!((h.length() - 1.0).abs() < 1e-4);
            assert!(h.dot(n) >= 0.0);
        }
    }

    #[test]
    fn zero_roughness_sample_collapses_to_normal() {
        let n = Vec3::new(0.0, 1.0, 0.0);
        for i in 0..16 {
            let h = importance_sample_ggx(n, hammersley(i, 16), 0.0);
            assert!((h - n).length() < 1e-4);
        }
    }

    #[test]
    fn reflect_mirrors_about_normal() {
        let r = reflect(Vec3::new(1.0, -1.0, 0.0).normalize(), Vec3::Y);
        assert!((r - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-6);
    }
}
