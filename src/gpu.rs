use crate::compositor::IblMaps;
use crate::cubemap::CubemapLevel;
use anyhow::{anyhow, Context, Result};
use half::f16;
use std::sync::Arc;

fn f32_to_f16_bits(data: &[f32]) -> Vec<u16> {
    data.iter().map(|value| f16::from_f32(*value).to_bits()).collect()
}

/// GPU-resident derived maps, ready for binding by a renderer: irradiance and
/// prefiltered cubes plus the 2D integration table, all Rgba16Float.
pub struct IblMapsGpu {
    _irradiance_texture: Arc<wgpu::Texture>,
    irradiance_view: Arc<wgpu::TextureView>,
    _prefiltered_texture: Arc<wgpu::Texture>,
    prefiltered_view: Arc<wgpu::TextureView>,
    _brdf_texture: Arc<wgpu::Texture>,
    brdf_view: Arc<wgpu::TextureView>,
    sampler: Arc<wgpu::Sampler>,
    prefiltered_mip_count: u32,
}

impl IblMapsGpu {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, maps: &IblMaps) -> Result<Self> {
        let irradiance_level = CubemapLevel {
            size: maps.irradiance.size,
            faces: maps.irradiance.faces.clone(),
        };
        let (irradiance_texture, irradiance_view) = upload_cube(
            device,
            queue,
            "IBL Irradiance Cube",
            std::slice::from_ref(&irradiance_level),
        )?;

        let mip_count = maps.prefiltered.levels.len() as u32;
        let (prefiltered_texture, prefiltered_view) =
            upload_cube(device, queue, "IBL Prefiltered Cube", &maps.prefiltered.levels)?;

        let (brdf_texture, brdf_view) = upload_brdf(device, queue, maps)?;
        let sampler = Arc::new(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("IBL Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        }));

        Ok(Self {
            _irradiance_texture: irradiance_texture,
            irradiance_view,
            _prefiltered_texture: prefiltered_texture,
            prefiltered_view,
            _brdf_texture: brdf_texture,
            brdf_view,
            sampler,
            prefiltered_mip_count: mip_count,
        })
    }

    pub fn irradiance_view(&self) -> &wgpu::TextureView {
        self.irradiance_view.as_ref()
    }

    pub fn prefiltered_view(&self) -> &wgpu::TextureView {
        self.prefiltered_view.as_ref()
    }

    pub fn brdf_view(&self) -> &wgpu::TextureView {
        self.brdf_view.as_ref()
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        self.sampler.as_ref()
    }

    pub fn prefiltered_mip_count(&self) -> u32 {
        self.prefiltered_mip_count
    }
}

fn upload_cube(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    levels: &[CubemapLevel],
) -> Result<(Arc<wgpu::Texture>, Arc<wgpu::TextureView>)> {
    let base = levels.first().ok_or_else(|| anyhow!("cube upload '{label}' has no levels"))?;
    let mip_count = levels.len() as u32;
    let texture = Arc::new(device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width: base.size, height: base.size, depth_or_array_layers: 6 },
        mip_level_count: mip_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    }));
    for (mip, level) in levels.iter().enumerate() {
        for face in 0..6 {
            let face_half = f32_to_f16_bits(&level.faces[face]);
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: mip as u32,
                    origin: wgpu::Origin3d { x: 0, y: 0, z: face as u32 },
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(&face_half),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level.size * 8),
                    rows_per_image: Some(level.size),
                },
                wgpu::Extent3d { width: level.size, height: level.size, depth_or_array_layers: 1 },
            );
        }
    }
    let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        base_mip_level: 0,
        mip_level_count: Some(mip_count),
        ..Default::default()
    }));
    Ok((texture, view))
}

fn upload_brdf(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    maps: &IblMaps,
) -> Result<(Arc<wgpu::Texture>, Arc<wgpu::TextureView>)> {
    let size = maps.brdf.size;
    if size == 0 {
        return Err(anyhow!("BRDF table has zero resolution"));
    }
    let texture = Arc::new(device.create_texture(&wgpu::TextureDescriptor {
        label: Some("IBL BRDF LUT"),
        size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    }));
    let half_data = f32_to_f16_bits(&maps.brdf.data);
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&half_data),
        wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(size * 8), rows_per_image: Some(size) },
        wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 1 },
    );
    let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("IBL BRDF View"),
        dimension: Some(wgpu::TextureViewDimension::D2),
        ..Default::default()
    }));
    Ok((texture, view))
}

/// Acquires a headless device for offline generation or tests. Fails cleanly
/// when no adapter is available (e.g. CI without a GPU).
pub fn create_headless_device() -> Result<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|err| anyhow!("no suitable adapter: {err}"))?;
        let required_limits =
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
        let device_desc = wgpu::DeviceDescriptor {
            label: Some("Lighting Device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };
        adapter.request_device(&device_desc).await.context("requesting headless device")
    })
}
