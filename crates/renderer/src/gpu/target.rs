use anyhow::{anyhow, Context, Result};
use image::imageops::flip_vertical_in_place;
use image::RgbaImage;

use super::context::GpuContext;

/// Format of every compute output image (`rgba8` in GLSL).
pub const STORAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const BYTES_PER_PIXEL: u32 = 4;

/// Fixed-size image written by compute shaders and sampled by the blit.
///
/// Row 0 of the texture is the bottom of the picture, matching the
/// bottom-left origin the shaders use for `gl_GlobalInvocationID.xy`.
pub struct StorageTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    readback: Option<wgpu::Buffer>,
}

impl StorageTarget {
    pub fn new(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STORAGE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("storage target sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
            readback: None,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Allocates the staging buffer used by [`StorageTarget::read_rgba`].
    pub fn enable_readback(&mut self, device: &wgpu::Device) {
        if self.readback.is_some() {
            return;
        }
        let size = u64::from(padded_bytes_per_row(self.width)) * u64::from(self.height);
        self.readback = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("storage target readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
    }

    /// Copies the image back to the CPU as tightly packed RGBA rows, top row
    /// first. Blocks until the GPU has finished all submitted work.
    pub fn read_rgba(&self, ctx: &GpuContext) -> Result<Vec<u8>> {
        let buffer = self
            .readback
            .as_ref()
            .ok_or_else(|| anyhow!("readback was not enabled for this storage target"))?;
        let padded = padded_bytes_per_row(self.width);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("storage target readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        ctx.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        ctx.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| anyhow!("failed to wait for GPU readback: {err}"))?;
        rx.recv()
            .context("readback callback was dropped")?
            .map_err(|err| anyhow!("failed to map readback buffer: {err}"))?;

        let padded_rows = slice.get_mapped_range().to_vec();
        buffer.unmap();

        let rows = unpad_rows(&padded_rows, self.width, self.height, padded);
        into_top_down(rows, self.width, self.height)
    }
}

/// Row pitch satisfying wgpu's copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Drops the per-row padding left by a texture-to-buffer copy.
pub fn unpad_rows(data: &[u8], width: u32, height: u32, padded_bytes_per_row: u32) -> Vec<u8> {
    let row_len = (width * BYTES_PER_PIXEL) as usize;
    let stride = padded_bytes_per_row as usize;
    let mut out = Vec::with_capacity(row_len * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        out.extend_from_slice(&row[..row_len.min(row.len())]);
    }
    out
}

/// Reorders bottom-up rows (texture order) into top-down image order.
pub fn into_top_down(pixels: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let len = pixels.len();
    let mut image = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
        anyhow!("pixel buffer of {len} bytes does not match {width}x{height} RGBA")
    })?;
    flip_vertical_in_place(&mut image);
    Ok(image.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1280), 5120);
        assert_eq!(padded_bytes_per_row(1), 256);
    }

    #[test]
    fn unpad_keeps_only_pixel_bytes() {
        let width = 2;
        let height = 2;
        let stride = 256u32;
        let mut data = vec![0xAAu8; (stride * height) as usize];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[256..264].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

        let rows = unpad_rows(&data, width, height, stride);
        assert_eq!(rows, (1..=16).collect::<Vec<u8>>());
    }

    #[test]
    fn top_down_flips_rows() {
        let bottom = [1u8, 1, 1, 255];
        let top = [2u8, 2, 2, 255];
        let pixels = [bottom, top].concat();

        let flipped = into_top_down(pixels, 1, 2).unwrap();
        assert_eq!(&flipped[..4], &top);
        assert_eq!(&flipped[4..], &bottom);
    }

    #[test]
    fn top_down_rejects_wrong_length() {
        let err = into_top_down(vec![0; 7], 1, 2).unwrap_err();
        assert!(err.to_string().contains("1x2"));
    }
}
