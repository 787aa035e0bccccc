use std::collections::HashMap;

use crate::characteristics::SensorCharacteristics;

/// Rotate-and-crop mode applied to processed outputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RotateAndCrop {
    #[default]
    None,
    Rotate90,
}

/// Video stabilization mode; the emulator only reports it back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VideoStabilizationMode {
    #[default]
    Off,
    On,
}

/// Edge enhancement mode; the emulator only reports it back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EdgeMode {
    #[default]
    Off,
    Fast,
    HighQuality,
}

/// Pixel readout mode for quad-Bayer sensors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SensorPixelMode {
    /// Binned readout at the default resolution.
    #[default]
    Default,
    /// Unbinned readout at the full sensor resolution.
    MaximumResolution,
}

/// Synthetic test pattern replacing scene content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TestPatternMode {
    #[default]
    Off,
    /// Every CFA position fixed to the matching `test_pattern_data` value.
    SolidColor,
    /// Standard eight-bar pattern.
    ColorBars,
}

/// Clock domain for frame timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimestampSource {
    /// Process-monotonic time.
    #[default]
    Unknown,
    /// Wall-clock time.
    Realtime,
}

/// Capture-request template for default settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RequestTemplate {
    Preview,
    StillCapture,
    VideoRecord,
    VideoSnapshot,
    ZeroShutterLag,
    Manual,
}

/// Per-frame configurable sensor state.
///
/// One instance is committed per frame per sensor id. The `report_*`
/// flags mark fields that must be echoed into the result metadata.
///
/// # Example
/// ```rust
/// use argus_core::prelude::SensorSettings;
///
/// let settings = SensorSettings::default();
/// assert_eq!(settings.zoom_ratio, 1.0);
/// assert_eq!(settings.frame_duration, 33_333_333);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorSettings {
    /// Exposure time in nanoseconds.
    pub exposure_time: u64,
    /// Frame duration in nanoseconds.
    pub frame_duration: u64,
    /// Sensitivity as ISO.
    pub gain: u32,
    pub zoom_ratio: f32,
    pub rotate_and_crop: RotateAndCrop,
    pub report_rotate_and_crop: bool,
    pub video_stabilization: VideoStabilizationMode,
    pub report_video_stabilization: bool,
    pub edge_mode: EdgeMode,
    pub report_edge_mode: bool,
    pub sensor_pixel_mode: SensorPixelMode,
    pub test_pattern_mode: TestPatternMode,
    /// Raw channel values (R, Gr, Gb, B) for `TestPatternMode::SolidColor`.
    pub test_pattern_data: [u32; 4],
    pub timestamp_source: TimestampSource,
    pub report_neutral_color_point: bool,
    pub report_green_split: bool,
    pub report_noise_profile: bool,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            exposure_time: 10_000_000,
            frame_duration: 33_333_333,
            gain: 100,
            zoom_ratio: 1.0,
            rotate_and_crop: RotateAndCrop::None,
            report_rotate_and_crop: false,
            video_stabilization: VideoStabilizationMode::Off,
            report_video_stabilization: false,
            edge_mode: EdgeMode::Off,
            report_edge_mode: false,
            sensor_pixel_mode: SensorPixelMode::Default,
            test_pattern_mode: TestPatternMode::Off,
            test_pattern_data: [0; 4],
            timestamp_source: TimestampSource::Unknown,
            report_neutral_color_point: false,
            report_green_split: false,
            report_noise_profile: false,
        }
    }
}

impl SensorSettings {
    /// Clamp exposure, frame duration, and gain into the sensor's
    /// supported ranges. Frame duration is also floored to the exposure
    /// time so a cycle never ends before its exposure does.
    pub fn clamped_to(&self, chars: &SensorCharacteristics) -> Self {
        let mut out = self.clone();
        out.exposure_time = out
            .exposure_time
            .clamp(chars.exposure_time_range[0], chars.exposure_time_range[1]);
        out.frame_duration = out
            .frame_duration
            .clamp(chars.frame_duration_range[0], chars.frame_duration_range[1])
            .max(out.exposure_time);
        out.gain = out
            .gain
            .clamp(chars.sensitivity_range[0], chars.sensitivity_range[1]);
        out.zoom_ratio = out.zoom_ratio.clamp(1.0, chars.max_zoom_ratio);
        out
    }
}

/// Per-frame settings for a logical sensor and its physical members,
/// keyed by sensor id.
pub type LogicalCameraSettings = HashMap<u32, SensorSettings>;
