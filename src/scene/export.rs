use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::{jpeg::JpegEncoder, png::PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("scene is not initialized")]
    NotInitialized,
    #[error("unsupported image format `{0}`")]
    UnsupportedFormat(String),
    /// The render target could not be read back as an image
    #[error("render target is not exportable: {0}")]
    Image(String),
    #[error(transparent)]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageExportFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageExportFormat::Png => "image/png",
            ImageExportFormat::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ImageExportFormat {
    type Err = ExportError;

    /// Accepts a MIME type or a bare extension.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image/png" | "png" => Ok(ImageExportFormat::Png),
            "image/jpeg" | "image/jpg" | "jpeg" | "jpg" => Ok(ImageExportFormat::Jpeg),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ImageExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Encodes `image` and wraps it in a `data:` URL. `quality` in `[0, 1]` only
/// affects JPEG.
pub fn encode_data_url(
    image: &DynamicImage,
    format: ImageExportFormat,
    quality: f32,
) -> Result<String, ExportError> {
    let mut bytes = Vec::new();
    match format {
        ImageExportFormat::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new(&mut bytes).write_image(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                ExtendedColorType::Rgba8,
            )?;
        }
        ImageExportFormat::Jpeg => {
            let rgb = image.to_rgb8();
            let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
            JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )?;
        }
    }
    Ok(format!("data:{};base64,{}", format.mime(), STANDARD.encode(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn parses_formats() {
        assert_eq!(
            "image/png".parse::<ImageExportFormat>().unwrap(),
            ImageExportFormat::Png
        );
        assert_eq!(
            "JPG".parse::<ImageExportFormat>().unwrap(),
            ImageExportFormat::Jpeg
        );
        assert!("image/webp".parse::<ImageExportFormat>().is_err());
    }

    #[test]
    fn png_data_url() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            2,
            image::Rgba([0x22, 0x22, 0x22, 0xff]),
        ));
        let url = encode_data_url(&image, ImageExportFormat::Png, 1.0).unwrap();
        // base64 of the PNG signature
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
        let payload = url.trim_start_matches("data:image/png;base64,");
        let bytes = STANDARD.decode(payload).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
    }

    #[test]
    fn jpeg_data_url() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));
        let url = encode_data_url(&image, ImageExportFormat::Jpeg, 0.8).unwrap();
        // base64 of the JPEG SOI marker
        assert!(url.starts_with("data:image/jpeg;base64,/9j/"));
    }
}
