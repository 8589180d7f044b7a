use glam::Vec3;

/// One cube face stores RGBA f32 texels in row-major order; faces follow the
/// +X, -X, +Y, -Y, +Z, -Z convention.
#[derive(Clone, Debug, PartialEq)]
pub struct Cubemap {
    pub size: u32,
    pub faces: [Vec<f32>; 6],
}

#[derive(Clone, Debug, PartialEq)]
pub struct CubemapLevel {
    pub size: u32,
    pub faces: [Vec<f32>; 6],
}

/// Roughness-indexed mip chain; level i holds the environment convolved for
/// roughness i / (levels - 1).
#[derive(Clone, Debug, PartialEq)]
pub struct PrefilteredCubemap {
    pub base_size: u32,
    pub levels: Vec<CubemapLevel>,
}

/// Two-channel split-sum lookup stored as RGBA f32 rows; x maps to N.V,
/// y maps to roughness.
#[derive(Clone, Debug, PartialEq)]
pub struct BrdfTable {
    pub size: u32,
    pub data: Vec<f32>,
}

pub fn empty_faces(size: u32) -> [Vec<f32>; 6] {
    let len = (size * size * 4) as usize;
    [
        vec![0.0; len],
        vec![0.0; len],
        vec![0.0; len],
        vec![0.0; len],
        vec![0.0; len],
        vec![0.0; len],
    ]
}

/// Unit direction through the center of texel (x, y) of `face`.
pub fn cubemap_direction(face: usize, x: u32, y: u32, size: u32) -> Vec3 {
    let a = (2.0 * (x as f32 + 0.5) / size as f32) - 1.0;
    let b = (2.0 * (y as f32 + 0.5) / size as f32) - 1.0;
    match face {
        0 => Vec3::new(1.0, -b, -a),
        1 => Vec3::new(-1.0, -b, a),
        2 => Vec3::new(a, 1.0, b),
        3 => Vec3::new(a, -1.0, -b),
        4 => Vec3::new(a, -b, 1.0),
        _ => Vec3::new(-a, -b, -1.0),
    }
    .normalize()
}

/// Inverse of `cubemap_direction`: face index plus face-plane coordinates in
/// [-1, 1].
pub fn direction_to_face(dir: Vec3) -> (usize, f32, f32) {
    let abs = dir.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        if dir.x > 0.0 {
            (0, -dir.z / abs.x, -dir.y / abs.x)
        } else {
            (1, dir.z / abs.x, -dir.y / abs.x)
        }
    } else if abs.y >= abs.z {
        if dir.y > 0.0 {
            (2, dir.x / abs.y, dir.z / abs.y)
        } else {
            (3, dir.x / abs.y, -dir.z / abs.y)
        }
    } else if dir.z > 0.0 {
        (4, dir.x / abs.z, -dir.y / abs.z)
    } else {
        (5, -dir.x / abs.z, -dir.y / abs.z)
    }
}

fn texel(faces: &[Vec<f32>; 6], face: usize, size: u32, x: u32, y: u32) -> Vec3 {
    let idx = ((y * size + x) * 4) as usize;
    let data = &faces[face];
    Vec3::new(data[idx], data[idx + 1], data[idx + 2])
}

/// Bilinear sample of one face set by direction. Filtering clamps at face
/// edges rather than crossing seams; at the resolutions involved the seam
/// error is below the Monte Carlo noise of the generators.
pub fn sample_faces(faces: &[Vec<f32>; 6], size: u32, dir: Vec3) -> Vec3 {
    let (face, a, b) = direction_to_face(dir.normalize());
    let fx = ((a + 1.0) * 0.5 * size as f32 - 0.5).clamp(0.0, (size - 1) as f32);
    let fy = ((b + 1.0) * 0.5 * size as f32 - 0.5).clamp(0.0, (size - 1) as f32);
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(size - 1);
    let y1 = (y0 + 1).min(size - 1);
    let tx = fx - x0 as f32;
    let ty = fy - y0 as f32;

    let c00 = texel(faces, face, size, x0, y0);
    let c10 = texel(faces, face, size, x1, y0);
    let c01 = texel(faces, face, size, x0, y1);
    let c11 = texel(faces, face, size, x1, y1);
    let c0 = c00 * (1.0 - tx) + c10 * tx;
    let c1 = c01 * (1.0 - tx) + c11 * tx;
    c0 * (1.0 - ty) + c1 * ty
}

impl Cubemap {
    pub fn sample(&self, dir: Vec3) -> Vec3 {
        sample_faces(&self.faces, self.size, dir)
    }
}

impl PrefilteredCubemap {
    pub fn max_mip_level(&self) -> f32 {
        (self.levels.len().saturating_sub(1)) as f32
    }

    /// Trilinear sample: bilinear within the two nearest mips, linear across.
    pub fn sample_lod(&self, dir: Vec3, lod: f32) -> Vec3 {
        if self.levels.is_empty() {
            return Vec3::ZERO;
        }
        let lod = lod.clamp(0.0, self.max_mip_level());
        let lo = lod.floor() as usize;
        let hi = (lo + 1).min(self.levels.len() - 1);
        let t = lod - lo as f32;
        let a = sample_faces(&self.levels[lo].faces, self.levels[lo].size, dir);
        if hi == lo || t <= 0.0 {
            return a;
        }
        let b = sample_faces(&self.levels[hi].faces, self.levels[hi].size, dir);
        a.lerp(b, t)
    }
}

impl BrdfTable {
    /// Bilinear lookup of (scale, bias) at (n_dot_v, roughness).
    pub fn lookup(&self, n_dot_v: f32, roughness: f32) -> (f32, f32) {
        let size = self.size;
        let fx = (n_dot_v.clamp(0.0, 1.0) * size as f32 - 0.5).clamp(0.0, (size - 1) as f32);
        let fy = (roughness.clamp(0.0, 1.0) * size as f32 - 0.5).clamp(0.0, (size - 1) as f32);
        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(size - 1);
        let y1 = (y0 + 1).min(size - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;
        let at = |x: u32, y: u32| {
            let idx = ((y * size + x) * 4) as usize;
            (self.data[idx], self.data[idx + 1])
        };
        let (s00, b00) = at(x0, y0);
        let (s10, b10) = at(x1, y0);
        let (s01, b01) = at(x0, y1);
        let (s11, b11) = at(x1, y1);
        let s0 = s00 * (1.0 - tx) + s10 * tx;
        let s1 = s01 * (1.0 - tx) + s11 * tx;
        let b0 = b00 * (1.0 - tx) + b10 * tx;
        let b1 = b01 * (1.0 - tx) + b11 * tx;
        (s0 * (1.0 - ty) + s1 * ty, b0 * (1.0 - ty) + b1 * ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_to_face_inverts_cubemap_direction() {
        let size = 16;
        for face in 0..6 {
            for y in 0..size {
                for x in 0..size {
                    let dir = cubemap_direction(face, x, y, size);
                    let (found_face, a, b) = direction_to_face(dir);
                    assert_eq!(found_face, face, "direction {dir:?}");
                    let fx = ((a + 1.0) * 0.5 * size as f32 - 0.5).round() as u32;
                    let fy = ((b + 1.0) * 0.5 * size as f32 - 0.5).round() as u32;
                    assert_eq!((fx, fy), (x, y), "face {face} texel ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn constant_cubemap_samples_constant() {
        let size = 8;
        let mut faces = empty_faces(size);
        for face in faces.iter_mut() {
            for texel in face.chunks_mut(4) {
                texel.copy_from_slice(&[0.2, 0.4, 0.8, 1.0]);
            }
        }
        let cube = Cubemap { size, faces };
        for dir in [Vec3::X, -Vec3::Y, Vec3::new(0.5, 0.7, -0.3).normalize()] {
            assert!((cube.sample(dir) - Vec3::new(0.2, 0.4, 0.8)).length() < 1e-6);
        }
    }
}
