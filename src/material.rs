use glam::Vec3;
use serde::Deserialize;

/// Reflectance at normal incidence for dielectrics.
pub const DIELECTRIC_F0: f32 = 0.04;

/// Smallest roughness the microfacet distribution accepts. Values below this
/// make the GGX denominator singular.
pub const MIN_ROUGHNESS: f32 = 0.04;

/// Plain per-draw material values, linear color space.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Material {
    pub albedo: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
}

impl Material {
    pub fn new(albedo: Vec3, metallic: f32, roughness: f32, ao: f32) -> Self {
        Self {
            albedo: albedo.clamp(Vec3::ZERO, Vec3::ONE),
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(MIN_ROUGHNESS, 1.0),
            ao: ao.clamp(0.0, 1.0),
        }
    }

    /// Normal-incidence reflectance: dielectric constant blended toward the
    /// albedo as the surface becomes metallic.
    pub fn f0(&self) -> Vec3 {
        Vec3::splat(DIELECTRIC_F0).lerp(self.albedo, self.metallic)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Vec3::ONE, 0.0, 1.0, 1.0)
    }
}

/// Scene-owned light sources; read-only to the lighting core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Point { position: Vec3, color: Vec3 },
    Directional { direction: Vec3, color: Vec3 },
}

impl Light {
    /// Unit direction from the shaded point toward the light and the radiance
    /// arriving from it. Point lights attenuate with inverse-square falloff.
    pub fn radiance_at(&self, point: Vec3) -> (Vec3, Vec3) {
        match *self {
            Light::Point { position, color } => {
                let to_light = position - point;
                let distance_sq = to_light.length_squared().max(1e-8);
                (to_light / distance_sq.sqrt(), color / distance_sq)
            }
            Light::Directional { direction, color } => (-direction.normalize(), color),
        }
    }
}
