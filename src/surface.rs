use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("failed to load image {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {} has zero size", path.display())]
    Empty { path: PathBuf },
}

#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    // BGRX8 in little-endian memory, the softbuffer presentation format
    (b as u32) | ((g as u32) << 8) | ((r as u32) << 16)
}

/// Rectangular buffer of packed colors. Accessors take signed coordinates
/// because projection math routinely produces transient out-of-range
/// samples: reads outside the surface return 0, writes are dropped.
#[derive(Clone)]
pub struct PixelSurface {
    width: i32,
    height: i32,
    pixels: Vec<u32>,
}

impl PixelSurface {
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "surface must have positive size");
        Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        }
    }

    /// Decode an image file into a surface. Fatal to the caller at startup;
    /// rendering is meaningless without the texture atlas.
    pub fn load(path: &Path) -> Result<Self, SurfaceError> {
        let decoded = image::open(path).map_err(|source| SurfaceError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(SurfaceError::Empty {
                path: path.to_path_buf(),
            });
        }

        let pixels = rgba
            .pixels()
            .map(|p| pack_rgb(p.0[0], p.0[1], p.0[2]))
            .collect();
        Ok(Self {
            width: width as i32,
            height: height as i32,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> u32 {
        if !self.in_bounds(x, y) {
            return 0;
        }
        self.pixels[(x + y * self.width) as usize]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if !self.in_bounds(x, y) {
            return;
        }
        self.pixels[(x + y * self.width) as usize] = color;
    }

    pub fn clear(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    /// Row-major pixel data, for blitting to the window buffer.
    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }
}
