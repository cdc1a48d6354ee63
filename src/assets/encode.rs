use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode {format} output: {source}")]
    Image {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot encode an empty {width}x{height} raster")]
    EmptyRaster { width: u32, height: u32 },
}

/// Raster formats available at the export boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg { quality: u8 },
    /// Lossless WebP; the `image` encoder does not offer lossy output.
    Webp,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
            Self::Webp => "webp",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpeg",
            Self::Webp => "webp",
        }
    }
}

/// Lossless encoding used for history previews, brush commits and crops.
pub fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, EncodeError> {
    encode_raster(raster, ExportFormat::Png)
}

pub fn encode_raster(raster: &RgbaImage, format: ExportFormat) -> Result<Vec<u8>, EncodeError> {
    if raster.width() == 0 || raster.height() == 0 {
        return Err(EncodeError::EmptyRaster {
            width: raster.width(),
            height: raster.height(),
        });
    }

    let mut buffer = Cursor::new(Vec::new());
    let result = match format {
        ExportFormat::Png => raster.write_to(&mut buffer, ImageFormat::Png),
        ExportFormat::Webp => raster.write_to(&mut buffer, ImageFormat::WebP),
        ExportFormat::Jpeg { quality } => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(raster.clone()).to_rgb8();
            let quality = quality.clamp(1, 100);
            JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(&rgb)
        }
    };
    result.map_err(|source| EncodeError::Image {
        format: format.label(),
        source,
    })?;

    tracing::debug!(
        format = format.label(),
        width = raster.width(),
        height = raster.height(),
        bytes = buffer.get_ref().len(),
        "encoded raster"
    );
    Ok(buffer.into_inner())
}
