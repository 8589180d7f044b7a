use crate::cubemap::{cubemap_direction, empty_faces, Cubemap};
use crate::error::LightingError;
use anyhow::Result;
use glam::{Vec2, Vec3};
use image::{DynamicImage, ImageReader};
use std::f32::consts::{PI, TAU};

/// Equirectangular HDR radiance image.
#[derive(Clone)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec3>,
}

impl HdrImage {
    fn pixel(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// Static 6-face HDR radiance cube. Replaced wholesale on environment change,
/// never mutated in place.
#[derive(Clone)]
pub struct EnvironmentMap {
    cubemap: Cubemap,
}

impl EnvironmentMap {
    /// Projects an equirectangular image onto a cube of the given face
    /// resolution.
    pub fn from_equirect(image: &HdrImage, size: u32) -> Result<Self, LightingError> {
        if size == 0 || image.width == 0 || image.height == 0 || image.pixels.is_empty() {
            return Err(LightingError::InvalidInput("zero-resolution environment input".into()));
        }
        let mut faces = empty_faces(size);
        for (face, data) in faces.iter_mut().enumerate() {
            for y in 0..size {
                for x in 0..size {
                    let dir = cubemap_direction(face, x, y, size);
                    let color = sample_equirect(image, dir);
                    let idx = ((y * size + x) * 4) as usize;
                    data[idx] = color.x;
                    data[idx + 1] = color.y;
                    data[idx + 2] = color.z;
                    data[idx + 3] = 1.0;
                }
            }
        }
        Ok(Self { cubemap: Cubemap { size, faces } })
    }

    pub fn from_cubemap(cubemap: Cubemap) -> Result<Self, LightingError> {
        if cubemap.size == 0 || cubemap.faces.iter().any(|f| f.is_empty()) {
            return Err(LightingError::InvalidInput("zero-resolution environment cube".into()));
        }
        Ok(Self { cubemap })
    }

    /// Uniform-color environment, mainly useful for tests and fallbacks.
    pub fn constant(color: Vec3, size: u32) -> Result<Self, LightingError> {
        if size == 0 {
            return Err(LightingError::InvalidInput("zero-resolution environment cube".into()));
        }
        let mut faces = empty_faces(size);
        for face in faces.iter_mut() {
            for texel in face.chunks_mut(4) {
                texel.copy_from_slice(&[color.x, color.y, color.z, 1.0]);
            }
        }
        Ok(Self { cubemap: Cubemap { size, faces } })
    }

    pub fn size(&self) -> u32 {
        self.cubemap.size
    }

    pub fn sample(&self, dir: Vec3) -> Vec3 {
        self.cubemap.sample(dir)
    }

    pub fn cubemap(&self) -> &Cubemap {
        &self.cubemap
    }

    /// Content hash of the source texels, used to key the disk cache.
    pub fn content_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.cubemap.size.to_le_bytes());
        for face in &self.cubemap.faces {
            hasher.update(bytemuck::cast_slice(face));
        }
        hasher.finalize()
    }
}

pub fn load_hdr_image(path: &str) -> Result<HdrImage> {
    use anyhow::Context;
    let reader = ImageReader::open(path)
        .with_context(|| format!("opening environment image '{path}'"))?
        .with_guessed_format()?;
    let dyn_img = reader.decode().with_context(|| format!("decoding environment image '{path}'"))?;
    Ok(convert_to_hdr(&dyn_img))
}

fn convert_to_hdr(image: &DynamicImage) -> HdrImage {
    let rgb = image.to_rgb32f();
    let width = rgb.width();
    let height = rgb.height();
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        pixels.push(Vec3::new(r, g, b));
    }
    HdrImage { width, height, pixels }
}

/// Built-in fallback environment: a zenith-to-horizon sky ramp over a dark
/// ground plane, with a bright sun disc so specular probes have a highlight.
pub fn generate_default_hdr() -> HdrImage {
    const ZENITH: Vec3 = Vec3::new(0.34, 0.42, 0.66);
    const HORIZON: Vec3 = Vec3::new(0.78, 0.75, 0.70);
    const GROUND: Vec3 = Vec3::new(0.14, 0.12, 0.10);
    const SUN: Vec3 = Vec3::new(1.0, 0.93, 0.80);
    let width = 192u32;
    let height = 96u32;
    let sun_center = Vec2::new(0.3, 0.3);
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        let v = y as f32 / (height - 1) as f32;
        for x in 0..width {
            let u = x as f32 / (width - 1) as f32;
            // v = 0.5 is the horizon line of the equirect parameterization.
            let color = if v < 0.5 {
                let t = v * 2.0;
                let mut sky = ZENITH.lerp(HORIZON, t * t);
                let sun_dist = (Vec2::new(u, v) - sun_center).length();
                sky += SUN * ((1.0 - sun_dist * 5.0).max(0.0)).powi(8) * 10.0;
                sky
            } else {
                let t = (v - 0.5) * 2.0;
                HORIZON.lerp(GROUND, t.sqrt())
            };
            pixels.push(color);
        }
    }
    HdrImage { width, height, pixels }
}

pub fn sample_equirect(image: &HdrImage, dir: Vec3) -> Vec3 {
    let d = dir.normalize();
    let theta = d.y.clamp(-1.0, 1.0).acos();
    let phi = d.z.atan2(d.x);
    let u = (phi + PI) / TAU;
    let v = theta / PI;
    let x = u * (image.width as f32 - 1.0);
    let y = v * (image.height as f32 - 1.0);
    let x0 = x.floor();
    let y0 = y.floor();
    let tx = x - x0;
    let ty = y - y0;

    let ix0 = x0.rem_euclid(image.width as f32) as u32;
    let ix1 = (x0 + 1.0).rem_euclid(image.width as f32) as u32;
    let iy0 = y0.clamp(0.0, (image.height - 1) as f32) as u32;
    let iy1 = (y0 + 1.0).clamp(0.0, (image.height - 1) as f32) as u32;

    let c00 = image.pixel(ix0, iy0);
    let c10 = image.pixel(ix1, iy0);
    let c01 = image.pixel(ix0, iy1);
    let c11 = image.pixel(ix1, iy1);

    let c0 = c00 * (1.0 - tx) + c10 * tx;
    let c1 = c01 * (1.0 - tx) + c11 * tx;
    c0 * (1.0 - ty) + c1 * ty
}
