//! Image compression/decompression. The Frame Codec (mirror-protocol) never
//! touches pixels; this module is the compositional half named in §4.2 —
//! JPEG for keyframes, WebP for tiles, fixed by protocol convention.

use crate::error::CodecError;

pub fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, CodecError> {
    let mut compressor = turbojpeg::Compressor::new()
        .map_err(|e| CodecError(anyhow::anyhow!("failed to create JPEG compressor: {e}")))?;
    compressor
        .set_quality(quality as i32)
        .map_err(|e| CodecError(anyhow::anyhow!("failed to set JPEG quality: {e}")))?;

    let image = turbojpeg::Image {
        pixels: rgb,
        width: width as usize,
        pitch: (width * 3) as usize,
        height: height as usize,
        format: turbojpeg::PixelFormat::RGB,
    };

    compressor
        .compress_to_vec(image)
        .map_err(|e| CodecError(anyhow::anyhow!("JPEG compression failed: {e}")))
}

pub fn decode_jpeg(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>), CodecError> {
    let mut decompressor = turbojpeg::Decompressor::new()
        .map_err(|e| CodecError(anyhow::anyhow!("failed to create JPEG decompressor: {e}")))?;
    let header = decompressor
        .read_header(bytes)
        .map_err(|e| CodecError(anyhow::anyhow!("failed to read JPEG header: {e}")))?;

    let width = header.width as u32;
    let height = header.height as u32;
    let mut pixels = vec![0u8; (width * height * 3) as usize];
    let image = turbojpeg::Image {
        pixels: pixels.as_mut_slice(),
        width: width as usize,
        pitch: (width * 3) as usize,
        height: height as usize,
        format: turbojpeg::PixelFormat::RGB,
    };
    decompressor
        .decompress(bytes, image)
        .map_err(|e| CodecError(anyhow::anyhow!("JPEG decompression failed: {e}")))?;

    Ok((width, height, pixels))
}

pub fn encode_webp(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, CodecError> {
    if rgb.len() != (width as usize) * (height as usize) * 3 {
        return Err(CodecError(anyhow::anyhow!(
            "tile buffer size {} does not match {}x{}x3",
            rgb.len(),
            width,
            height
        )));
    }
    let encoder = webp::Encoder::from_rgb(rgb, width, height);
    let encoded = encoder.encode(quality as f32);
    Ok(encoded.to_vec())
}

pub fn decode_webp(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>), CodecError> {
    let decoder = webp::Decoder::new(bytes);
    let decoded = decoder
        .decode()
        .ok_or_else(|| CodecError(anyhow::anyhow!("WebP decode failed")))?;
    let rgb_image = decoded.to_image().to_rgb8();
    let (width, height) = (rgb_image.width(), rgb_image.height());
    Ok((width, height, rgb_image.into_raw()))
}
