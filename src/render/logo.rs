use std::fs;
use std::path::Path;

use image::GenericImageView;

use super::RenderError;

/// Longest side accepted for a logo, in pixels.
const MAX_SIDE: u32 = 4096;

/// A decoded raster logo, split into 8-bit RGB samples and an optional
/// alpha channel for the PDF soft mask.
#[derive(Debug)]
pub struct Logo {
    name: String,
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl Logo {
    /// Decodes PNG or JPEG bytes. Fully opaque images carry no alpha.
    pub fn from_bytes(name: impl Into<String>, data: &[u8]) -> Result<Self, RenderError> {
        let name = name.into();
        let decoded = image::load_from_memory(data).map_err(|e| RenderError::Image {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 || width > MAX_SIDE || height > MAX_SIDE {
            return Err(RenderError::Image {
                name,
                reason: format!("unsupported size {width}x{height}"),
            });
        }

        let rgba = decoded.to_rgba8();
        let pixels = width as usize * height as usize;
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }
        let alpha = alpha.iter().any(|&a| a != u8::MAX).then_some(alpha);

        Ok(Self {
            name,
            width,
            height,
            rgb,
            alpha,
        })
    }

    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let data = fs::read(path).map_err(|e| RenderError::Image {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("logo")
            .to_string();
        Self::from_bytes(name, &data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Height over width.
    pub fn aspect(&self) -> f32 {
        self.height as f32 / self.width as f32
    }

    pub(crate) fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    pub(crate) fn alpha(&self) -> Option<&[u8]> {
        self.alpha.as_deref()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, ImageFormat, Rgba};

    use super::*;

    /// Encodes a solid PNG; `alpha` below 255 yields a soft mask.
    pub(crate) fn png(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(width, height, Rgba([0x2b, 0x3d, 0x4f, alpha]));
        let mut bytes = Cursor::new(Vec::new());
        buffer.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_decodes_png_with_alpha() {
        let logo = Logo::from_bytes("logo", &png(4, 2, 128)).unwrap();
        assert_eq!((logo.width(), logo.height()), (4, 2));
        assert_eq!(logo.rgb().len(), 4 * 2 * 3);
        assert_eq!(&logo.rgb()[..3], &[0x2b, 0x3d, 0x4f]);
        assert_eq!(logo.alpha().unwrap(), &[128; 8]);
        assert_eq!(logo.aspect(), 0.5);
    }

    #[test]
    fn test_opaque_png_has_no_mask() {
        let logo = Logo::from_bytes("logo", &png(3, 3, 255)).unwrap();
        assert!(logo.alpha().is_none());
    }

    #[test]
    fn test_rejects_non_image() {
        let err = Logo::from_bytes("logo", b"not an image").unwrap_err();
        assert!(matches!(err, RenderError::Image { .. }));
        assert_eq!(err.kind(), "render_error");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Logo::load(&dir.path().join("logo.png")).unwrap_err();
        assert!(matches!(err, RenderError::Image { name, .. } if name.ends_with("logo.png")));
    }
}
