use crate::brdf::geometry_smith_ibl;
use crate::cubemap::BrdfTable;
use crate::error::LightingError;
use crate::sampling::{hammersley, importance_sample_ggx, reflect};
use glam::Vec3;

pub const DEFAULT_BRDF_LUT_SIZE: u32 = 256;
pub const DEFAULT_BRDF_SAMPLE_COUNT: u32 = 1024;

/// Environment-independent split-sum integration table: U maps to N.V,
/// V maps to roughness, channels hold the Fresnel scale and bias. Depends on
/// nothing but its resolution and sample count, so repeated generation is
/// bit-identical.
pub fn generate_brdf_table(size: u32) -> Result<BrdfTable, LightingError> {
    generate_brdf_table_with_samples(size, DEFAULT_BRDF_SAMPLE_COUNT)
}

pub fn generate_brdf_table_with_samples(size: u32, sample_count: u32) -> Result<BrdfTable, LightingError> {
    if size == 0 || sample_count == 0 {
        return Err(LightingError::InvalidInput("zero-resolution BRDF table".into()));
    }
    let mut data = vec![0.0f32; (size * size * 4) as usize];
    for y in 0..size {
        let roughness = (y as f32 + 0.5) / size as f32;
        for x in 0..size {
            let n_dot_v = (x as f32 + 0.5) / size as f32;
            let (scale, bias) = integrate_brdf(n_dot_v, roughness, sample_count);
            debug_assert!(scale.is_finite() && bias.is_finite());
            let idx = ((y * size + x) * 4) as usize;
            data[idx] = scale;
            data[idx + 1] = bias;
            data[idx + 2] = 0.0;
            data[idx + 3] = 1.0;
        }
    }
    Ok(BrdfTable { size, data })
}

fn integrate_brdf(n_dot_v: f32, roughness: f32, sample_count: u32) -> (f32, f32) {
    let normal = Vec3::Z;
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let mut scale = 0.0f32;
    let mut bias = 0.0f32;
    for i in 0..sample_count {
        let xi = hammersley(i, sample_count);
        let h = importance_sample_ggx(normal, xi, roughness);
        let l = reflect(-v, h);
        let n_dot_l = l.z.max(0.0);
        if n_dot_l > 0.0 {
            let n_dot_h = h.z.max(0.0);
            let v_dot_h = v.dot(h).max(0.0);
            let g = geometry_smith_ibl(n_dot_v, n_dot_l, roughness);
            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v).max(1e-4);
            let fc = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fc) * g_vis;
            bias += fc * g_vis;
        }
    }
    let inv = 1.0 / sample_count as f32;
    (scale * inv, bias * inv)
}
