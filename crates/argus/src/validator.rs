//! Stream compatibility validation.
//!
//! Pure predicates over static sensor characteristics; called before
//! any pipeline mutation, never producing side effects.

use argus_core::prelude::{
    ColorSpaceProfile, DynamicRangeProfile, LogicalCharacteristics, PixelFormat, Resolution,
    SensorCharacteristics,
};
use tracing::debug;

/// One stream of a requested configuration.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub id: u32,
    pub format: PixelFormat,
    pub resolution: Resolution,
    pub color_space: ColorSpaceProfile,
    pub dynamic_range: DynamicRangeProfile,
    pub is_input: bool,
    /// Physical sensor this stream targets, if not the logical one.
    pub physical_camera_id: Option<u32>,
}

/// A full stream configuration to validate.
#[derive(Debug, Clone, Default)]
pub struct StreamConfiguration {
    pub streams: Vec<StreamInfo>,
}

/// Whether a characteristics description is structurally valid:
/// positive dimensions and every range ordered with positive bounds.
///
/// # Example
/// ```rust
/// use argus::validator::are_characteristics_supported;
/// use argus_core::prelude::SensorCharacteristics;
///
/// let mut chars = SensorCharacteristics::default_emulated();
/// assert!(are_characteristics_supported(&chars));
/// chars.width = 0;
/// assert!(!are_characteristics_supported(&chars));
/// ```
pub fn are_characteristics_supported(chars: &SensorCharacteristics) -> bool {
    let ranges_ok = |range: [u64; 2]| range[0] > 0 && range[0] <= range[1];
    chars.width > 0
        && chars.height > 0
        && chars.full_res_width >= chars.width
        && chars.full_res_height >= chars.height
        && ranges_ok(chars.exposure_time_range)
        && ranges_ok(chars.frame_duration_range)
        && chars.sensitivity_range[0] > 0
        && chars.sensitivity_range[0] <= chars.sensitivity_range[1]
        && chars.max_raw_value > 0
        && chars.max_zoom_ratio >= 1.0
        && !chars.raw_crop_region_unzoomed.is_empty()
        && !chars.raw_crop_region_zoomed.is_empty()
}

/// Whether a stream combination is satisfiable by the given sensors.
///
/// Checks per-category stream counts, resolutions against the sensor
/// bounds for the requested pixel mode, reprocess input formats, the
/// dynamic-range compatibility matrix, and the color-space capability
/// matrix. Physical stream targets must resolve in the characteristics
/// map.
pub fn is_stream_combination_supported(
    config: &StreamConfiguration,
    sensors: &LogicalCharacteristics,
    logical_id: u32,
    is_max_res: bool,
) -> bool {
    let Some(logical_chars) = sensors.get(&logical_id) else {
        debug!(logical_id, "unknown logical sensor id");
        return false;
    };
    if config.streams.is_empty() {
        return false;
    }

    let mut raw_count = 0u32;
    let mut processed_count = 0u32;
    let mut stalling_count = 0u32;
    let mut input_count = 0u32;

    for stream in &config.streams {
        let chars = match stream.physical_camera_id {
            Some(id) => match sensors.get(&id) {
                Some(chars) => chars,
                None => {
                    debug!(physical_id = id, "unresolvable physical sensor id");
                    return false;
                }
            },
            None => logical_chars,
        };

        let (max_w, max_h) = chars.dimensions(is_max_res);
        if stream.resolution.width.get() > max_w || stream.resolution.height.get() > max_h {
            debug!(stream = stream.id, %stream.resolution, "stream exceeds sensor bounds");
            return false;
        }

        if stream.is_input {
            input_count += 1;
            if !matches!(stream.format, PixelFormat::Yuv420 | PixelFormat::Raw16) {
                debug!(stream = stream.id, "format cannot feed the reprocess path");
                return false;
            }
            // Raw reprocess inputs must cover the full active array.
            if stream.format == PixelFormat::Raw16
                && (stream.resolution.width.get() != max_w
                    || stream.resolution.height.get() != max_h)
            {
                return false;
            }
        } else if stream.format.is_raw() {
            raw_count += 1;
        } else if stream.format.is_stalling() {
            stalling_count += 1;
        } else {
            processed_count += 1;
        }

        if !chars
            .dynamic_range_profiles
            .contains_key(&stream.dynamic_range)
        {
            debug!(stream = stream.id, "dynamic-range profile unsupported");
            return false;
        }

        if stream.color_space != ColorSpaceProfile::Unspecified {
            let supported = chars
                .color_space_profiles
                .get(&stream.color_space)
                .and_then(|formats| formats.get(&stream.format))
                .map(|profiles| profiles.contains(&stream.dynamic_range))
                .unwrap_or(false);
            if !supported {
                debug!(stream = stream.id, "color-space combination unsupported");
                return false;
            }
        }
    }

    // Every pair of requested dynamic-range profiles must be mutually
    // combinable.
    for a in &config.streams {
        for b in &config.streams {
            let compatible = logical_chars
                .dynamic_range_profiles
                .get(&a.dynamic_range)
                .map(|set| set.contains(&b.dynamic_range))
                .unwrap_or(false);
            if !compatible {
                debug!("incompatible dynamic-range profile pairing");
                return false;
            }
        }
    }

    raw_count <= logical_chars.max_raw_streams
        && processed_count <= logical_chars.max_processed_streams
        && stalling_count <= logical_chars.max_stalling_streams
        && input_count <= logical_chars.max_input_streams
}

/// Resolve `ImplementationDefined` to a concrete format for a
/// dynamic-range profile. Other formats pass through unchanged.
pub fn override_format(format: PixelFormat, dynamic_range: DynamicRangeProfile) -> PixelFormat {
    if format != PixelFormat::ImplementationDefined {
        return format;
    }
    match dynamic_range {
        DynamicRangeProfile::Standard => PixelFormat::Yuv420,
        DynamicRangeProfile::Hlg10 | DynamicRangeProfile::Hdr10 => {
            // 10-bit planar output is synthesized as 8-bit YUV through
            // the matching tone curve.
            debug!(?dynamic_range, "narrowing 10-bit opaque format to planar YUV");
            PixelFormat::Yuv420
        }
    }
}

/// Whether an input format can be reprocessed into an output format.
pub fn is_reprocess_path_supported(input: PixelFormat, output: PixelFormat) -> bool {
    matches!(
        (input, output),
        (PixelFormat::Yuv420, PixelFormat::Yuv420)
            | (PixelFormat::Yuv420, PixelFormat::Blob)
            | (PixelFormat::Raw16, PixelFormat::Raw16)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::prelude::SensorCharacteristics;
    use std::collections::HashMap;

    fn sensors() -> LogicalCharacteristics {
        HashMap::from([(0, SensorCharacteristics::default_emulated())])
    }

    fn stream(id: u32, format: PixelFormat, width: u32, height: u32) -> StreamInfo {
        StreamInfo {
            id,
            format,
            resolution: Resolution::new(width, height).unwrap(),
            color_space: ColorSpaceProfile::Unspecified,
            dynamic_range: DynamicRangeProfile::Standard,
            is_input: false,
            physical_camera_id: None,
        }
    }

    #[test]
    fn characteristics_reject_inverted_ranges() {
        let mut chars = SensorCharacteristics::default_emulated();
        assert!(are_characteristics_supported(&chars));
        chars.exposure_time_range = [100, 10];
        assert!(!are_characteristics_supported(&chars));

        let mut chars = SensorCharacteristics::default_emulated();
        chars.sensitivity_range = [0, 1600];
        assert!(!are_characteristics_supported(&chars));

        let mut chars = SensorCharacteristics::default_emulated();
        chars.height = 0;
        assert!(!are_characteristics_supported(&chars));
    }

    #[test]
    fn accepts_basic_four_stream_combination() {
        let config = StreamConfiguration {
            streams: vec![
                stream(0, PixelFormat::Raw16, 1920, 1080),
                stream(1, PixelFormat::Yuv420, 1280, 720),
                stream(2, PixelFormat::Rgb888, 640, 480),
                stream(3, PixelFormat::Depth16, 640, 480),
            ],
        };
        assert!(is_stream_combination_supported(&config, &sensors(), 0, false));
    }

    #[test]
    fn rejects_too_many_raw_streams() {
        let config = StreamConfiguration {
            streams: vec![
                stream(0, PixelFormat::Raw16, 1920, 1080),
                stream(1, PixelFormat::Raw16, 1920, 1080),
            ],
        };
        assert!(!is_stream_combination_supported(&config, &sensors(), 0, false));
    }

    #[test]
    fn rejects_oversized_stream() {
        let config = StreamConfiguration {
            streams: vec![stream(0, PixelFormat::Yuv420, 4000, 3000)],
        };
        assert!(!is_stream_combination_supported(&config, &sensors(), 0, false));
    }

    #[test]
    fn rejects_unknown_physical_target() {
        let mut s = stream(0, PixelFormat::Yuv420, 640, 480);
        s.physical_camera_id = Some(42);
        let config = StreamConfiguration { streams: vec![s] };
        assert!(!is_stream_combination_supported(&config, &sensors(), 0, false));
    }

    #[test]
    fn rejects_bad_reprocess_input() {
        let mut s = stream(0, PixelFormat::Rgb888, 640, 480);
        s.is_input = true;
        let config = StreamConfiguration { streams: vec![s] };
        assert!(!is_stream_combination_supported(&config, &sensors(), 0, false));
    }

    #[test]
    fn override_format_resolves_opaque_formats() {
        assert_eq!(
            override_format(PixelFormat::ImplementationDefined, DynamicRangeProfile::Standard),
            PixelFormat::Yuv420
        );
        assert_eq!(
            override_format(PixelFormat::ImplementationDefined, DynamicRangeProfile::Hlg10),
            PixelFormat::Yuv420
        );
        assert_eq!(
            override_format(PixelFormat::Raw16, DynamicRangeProfile::Standard),
            PixelFormat::Raw16
        );
    }

    #[test]
    fn reprocess_paths() {
        assert!(is_reprocess_path_supported(
            PixelFormat::Yuv420,
            PixelFormat::Yuv420
        ));
        assert!(is_reprocess_path_supported(
            PixelFormat::Yuv420,
            PixelFormat::Blob
        ));
        assert!(is_reprocess_path_supported(
            PixelFormat::Raw16,
            PixelFormat::Raw16
        ));
        assert!(!is_reprocess_path_supported(
            PixelFormat::Raw16,
            PixelFormat::Yuv420
        ));
    }
}
