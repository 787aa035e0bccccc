use std::{fmt, num::NonZeroU32};

/// Resolution of a stream.
///
/// # Example
/// ```rust
/// use argus_core::prelude::Resolution;
///
/// let res = Resolution::new(640, 480).unwrap();
/// assert_eq!(res.width.get(), 640);
/// assert!(Resolution::new(0, 480).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// Width in pixels (non-zero).
    pub width: NonZeroU32,
    /// Height in pixels (non-zero).
    pub height: NonZeroU32,
}

impl Resolution {
    /// Create a resolution, returning `None` if width or height are zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            width: NonZeroU32::new(width)?,
            height: NonZeroU32::new(height)?,
        })
    }

    /// Total pixel count.
    pub fn pixels(&self) -> usize {
        self.width.get() as usize * self.height.get() as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel formats the sensor can fill.
///
/// `ImplementationDefined` is a placeholder the configuration layer maps
/// to a concrete format per dynamic-range profile before any buffer is
/// allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PixelFormat {
    /// 16-bit-per-sample Bayer mosaic (12 significant bits).
    Raw16,
    /// Planar 8-bit Y/U/V with 2x2 chroma subsampling.
    Yuv420,
    /// Packed 8-bit RGB.
    Rgb888,
    /// Packed 8-bit RGBA.
    Rgba8888,
    /// Packed 8-bit ARGB.
    Argb8888,
    /// 16-bit depth samples.
    Depth16,
    /// Opaque compressed output; the emulator fills it with packed RGB.
    Blob,
    /// Resolved to a concrete format during stream configuration.
    ImplementationDefined,
}

impl PixelFormat {
    /// Number of planes a buffer of this format carries.
    pub fn plane_count(&self) -> usize {
        match self {
            PixelFormat::Yuv420 => 3,
            _ => 1,
        }
    }

    /// Bytes per pixel for single-plane formats; `None` for planar ones
    /// and for formats that have not been resolved yet.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Raw16 | PixelFormat::Depth16 => Some(2),
            PixelFormat::Rgb888 | PixelFormat::Blob => Some(3),
            PixelFormat::Rgba8888 | PixelFormat::Argb8888 => Some(4),
            PixelFormat::Yuv420 | PixelFormat::ImplementationDefined => None,
        }
    }

    /// Raw Bayer output.
    pub fn is_raw(&self) -> bool {
        matches!(self, PixelFormat::Raw16)
    }

    /// Processed (non-raw, non-stalling) output.
    pub fn is_processed(&self) -> bool {
        matches!(
            self,
            PixelFormat::Yuv420
                | PixelFormat::Rgb888
                | PixelFormat::Rgba8888
                | PixelFormat::Argb8888
                | PixelFormat::Depth16
                | PixelFormat::ImplementationDefined
        )
    }

    /// Output whose consumer may stall the pipeline (compressed captures).
    pub fn is_stalling(&self) -> bool {
        matches!(self, PixelFormat::Blob)
    }
}

/// Color-space profile requested for an output stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ColorSpaceProfile {
    /// No explicit profile requested.
    #[default]
    Unspecified,
    Srgb,
    DisplayP3,
    Bt2020,
}

/// Dynamic-range profile of an output stream.
///
/// The profile selects the tone-mapping curve and the nominal bit depth
/// of the processed output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DynamicRangeProfile {
    #[default]
    Standard,
    Hlg10,
    Hdr10,
}

/// Color filter arrangement of the Bayer mosaic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ColorFilterArrangement {
    #[default]
    Rggb,
    Grbg,
    Gbrg,
    Bggr,
}

/// Axis-aligned crop rectangle in sensor pixel coordinates.
///
/// # Example
/// ```rust
/// use argus_core::prelude::CropRegion;
///
/// let region = CropRegion::new(0, 0, 1920, 1080);
/// assert!(region.contains(1919, 1079));
/// assert!(!region.contains(1920, 0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle has any area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether a sensor coordinate falls inside this region.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_rejects_zero() {
        assert!(Resolution::new(0, 1).is_none());
        assert!(Resolution::new(1, 0).is_none());
        assert!(Resolution::new(1, 1).is_some());
    }

    #[test]
    fn format_categories_are_disjoint() {
        for format in [
            PixelFormat::Raw16,
            PixelFormat::Yuv420,
            PixelFormat::Rgb888,
            PixelFormat::Rgba8888,
            PixelFormat::Argb8888,
            PixelFormat::Depth16,
            PixelFormat::Blob,
            PixelFormat::ImplementationDefined,
        ] {
            let categories = [format.is_raw(), format.is_processed(), format.is_stalling()];
            assert_eq!(
                categories.iter().filter(|c| **c).count(),
                1,
                "{format:?} must fall in exactly one stream category"
            );
        }
    }

    #[test]
    fn yuv_is_planar() {
        assert_eq!(PixelFormat::Yuv420.plane_count(), 3);
        assert!(PixelFormat::Yuv420.bytes_per_pixel().is_none());
        assert_eq!(PixelFormat::Raw16.bytes_per_pixel(), Some(2));
    }
}
