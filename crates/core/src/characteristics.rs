use std::collections::{HashMap, HashSet};

use crate::format::{
    ColorFilterArrangement, ColorSpaceProfile, CropRegion, DynamicRangeProfile, PixelFormat,
};
use crate::settings::TimestampSource;

/// Supported exposure time range in nanoseconds.
pub const SUPPORTED_EXPOSURE_TIME_RANGE: [u64; 2] = [1_000, 300_000_000];
/// Supported frame duration range in nanoseconds.
pub const SUPPORTED_FRAME_DURATION_RANGE: [u64; 2] = [33_331_760, 1_000_000_000];
/// Supported sensitivity (ISO) range.
pub const SUPPORTED_SENSITIVITY_RANGE: [u32; 2] = [100, 1600];
/// Largest raw sample value for the 12-bit mosaic.
pub const DEFAULT_MAX_RAW_VALUE: u32 = 4000;
/// Black level added to every raw sample, per CFA position.
pub const DEFAULT_BLACK_LEVEL_PATTERN: [u32; 4] = [200, 200, 200, 200];

/// XYZ-to-linear-RGB conversion coefficients for the sensor's color
/// filters, defaulting to sRGB primaries with a D65 white point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorFilterXyz {
    pub r: [f32; 3],
    pub gr: [f32; 3],
    pub gb: [f32; 3],
    pub b: [f32; 3],
}

impl Default for ColorFilterXyz {
    fn default() -> Self {
        Self {
            r: [3.2406, -1.5372, -0.4986],
            gr: [-0.9689, 1.8758, 0.0415],
            gb: [-0.9689, 1.8758, 0.0415],
            b: [0.0557, -0.2040, 1.0570],
        }
    }
}

/// Sensor-RGB-to-XYZ forward matrix (rows produce X, Y, Z).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForwardMatrix {
    pub x: [f32; 3],
    pub y: [f32; 3],
    pub z: [f32; 3],
}

impl Default for ForwardMatrix {
    fn default() -> Self {
        Self {
            x: [0.4355, 0.3848, 0.1425],
            y: [0.2216, 0.7168, 0.0605],
            z: [0.0137, 0.0967, 0.7139],
        }
    }
}

/// For each supported dynamic-range profile, the set of profiles it can
/// be combined with in a single stream configuration.
pub type DynamicRangeProfileMap = HashMap<DynamicRangeProfile, HashSet<DynamicRangeProfile>>;

/// For each supported color space, the pixel formats it applies to and
/// the dynamic-range profiles allowed per format.
pub type ColorSpaceProfileMap =
    HashMap<ColorSpaceProfile, HashMap<PixelFormat, HashSet<DynamicRangeProfile>>>;

/// Static, immutable description of one physical sensor.
///
/// Constructed once before start-up and never mutated afterwards. Width
/// and height are stored as plain integers so that structurally invalid
/// descriptions can be represented and rejected by the validator rather
/// than silently papered over.
///
/// # Example
/// ```rust
/// use argus_core::prelude::SensorCharacteristics;
///
/// let chars = SensorCharacteristics::default_emulated();
/// assert!(chars.width > 0 && chars.full_res_width >= chars.width);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorCharacteristics {
    /// Default-mode (binned, for quad sensors) width in pixels.
    pub width: u32,
    /// Default-mode height in pixels.
    pub height: u32,
    /// Full-resolution width in pixels.
    pub full_res_width: u32,
    /// Full-resolution height in pixels.
    pub full_res_height: u32,
    /// Inclusive exposure time range in nanoseconds.
    pub exposure_time_range: [u64; 2],
    /// Inclusive frame duration range in nanoseconds.
    pub frame_duration_range: [u64; 2],
    /// Inclusive sensitivity (ISO) range.
    pub sensitivity_range: [u32; 2],
    /// Bayer mosaic layout.
    pub color_arrangement: ColorFilterArrangement,
    /// XYZ-to-RGB coefficients for the color filters.
    pub color_filter: ColorFilterXyz,
    /// Sensor-RGB-to-XYZ forward matrix.
    pub forward_matrix: ForwardMatrix,
    /// Largest raw sample value the ADC produces.
    pub max_raw_value: u32,
    /// Black level per CFA position (R, Gr, Gb, B).
    pub black_level_pattern: [u32; 4],
    /// Maximum concurrent raw output streams.
    pub max_raw_streams: u32,
    /// Maximum concurrent processed output streams.
    pub max_processed_streams: u32,
    /// Maximum concurrent stalling output streams.
    pub max_stalling_streams: u32,
    /// Maximum concurrent input (reprocess) streams.
    pub max_input_streams: u32,
    /// Frames in flight before results must drain.
    pub max_pipeline_depth: u32,
    /// Whether each 2x2 pixel block shares one color filter.
    pub quad_bayer: bool,
    /// Whether 10-bit dynamic-range profiles are available.
    pub is_10bit_capable: bool,
    /// Dynamic-range profile compatibility matrix.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub dynamic_range_profiles: DynamicRangeProfileMap,
    /// Color-space profile compatibility matrix.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub color_space_profiles: ColorSpaceProfileMap,
    /// Raw crop window at maximum zoom.
    pub raw_crop_region_zoomed: CropRegion,
    /// Raw crop window with no zoom applied.
    pub raw_crop_region_unzoomed: CropRegion,
    /// Largest zoom ratio the sensor honors; larger requests are clamped.
    pub max_zoom_ratio: f32,
    /// Clock domain used for frame timestamps.
    pub timestamp_source: TimestampSource,
}

impl SensorCharacteristics {
    /// The built-in emulated sensor: a 1080p-binned, 4K-capable
    /// quad-less part with a 4x zoom range and standard plus HLG10
    /// dynamic-range support.
    pub fn default_emulated() -> Self {
        let width = 1920;
        let height = 1080;
        let supported_profiles = [
            DynamicRangeProfile::Standard,
            DynamicRangeProfile::Hlg10,
            DynamicRangeProfile::Hdr10,
        ];
        let mut dynamic_range_profiles: DynamicRangeProfileMap = HashMap::new();
        for profile in supported_profiles {
            dynamic_range_profiles.insert(profile, HashSet::from(supported_profiles));
        }

        let mut color_space_profiles: ColorSpaceProfileMap = HashMap::new();
        for space in [ColorSpaceProfile::Srgb, ColorSpaceProfile::DisplayP3] {
            let mut per_format = HashMap::new();
            for format in [
                PixelFormat::Yuv420,
                PixelFormat::Rgb888,
                PixelFormat::Rgba8888,
                PixelFormat::Argb8888,
                PixelFormat::Blob,
                PixelFormat::ImplementationDefined,
            ] {
                per_format.insert(format, HashSet::from(supported_profiles));
            }
            color_space_profiles.insert(space, per_format);
        }

        Self {
            width,
            height,
            full_res_width: width,
            full_res_height: height,
            exposure_time_range: SUPPORTED_EXPOSURE_TIME_RANGE,
            frame_duration_range: SUPPORTED_FRAME_DURATION_RANGE,
            sensitivity_range: SUPPORTED_SENSITIVITY_RANGE,
            color_arrangement: ColorFilterArrangement::Rggb,
            color_filter: ColorFilterXyz::default(),
            forward_matrix: ForwardMatrix::default(),
            max_raw_value: DEFAULT_MAX_RAW_VALUE,
            black_level_pattern: DEFAULT_BLACK_LEVEL_PATTERN,
            max_raw_streams: 1,
            max_processed_streams: 3,
            max_stalling_streams: 1,
            max_input_streams: 1,
            max_pipeline_depth: 8,
            quad_bayer: false,
            is_10bit_capable: true,
            dynamic_range_profiles,
            color_space_profiles,
            raw_crop_region_zoomed: CropRegion::new(
                width * 3 / 8,
                height * 3 / 8,
                width / 4,
                height / 4,
            ),
            raw_crop_region_unzoomed: CropRegion::new(0, 0, width, height),
            max_zoom_ratio: 4.0,
            timestamp_source: TimestampSource::Unknown,
        }
    }

    /// Variant of the built-in sensor with a quad-Bayer mosaic: the
    /// default readout is binned, the full-resolution grid is 2x.
    pub fn default_emulated_quad_bayer() -> Self {
        let mut chars = Self::default_emulated();
        chars.quad_bayer = true;
        chars.full_res_width = chars.width * 2;
        chars.full_res_height = chars.height * 2;
        chars
    }

    /// Sensor dimensions for the requested pixel mode.
    pub fn dimensions(&self, max_resolution: bool) -> (u32, u32) {
        if max_resolution {
            (self.full_res_width, self.full_res_height)
        } else {
            (self.width, self.height)
        }
    }
}

/// Characteristics for a logical sensor and its physical members, keyed
/// by sensor id.
pub type LogicalCharacteristics = HashMap<u32, SensorCharacteristics>;
