//! Precomputed tone-mapping lookup tables.
//!
//! Each transfer function is evaluated once over the full raw-value
//! domain at construction; per-pixel application is a table index.

use argus_core::prelude::{ColorSpaceProfile, DynamicRangeProfile};
use tracing::warn;

/// Tone-mapping curve families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFunction {
    /// Piecewise sRGB.
    Srgb,
    /// SMPTE 170M (BT.601/709 OETF).
    Smpte170m,
    /// SMPTE ST.2084 perceptual quantizer.
    St2084,
    /// Hybrid log-gamma.
    Hlg,
}

/// Lookup tables mapping linear raw values to 8-bit tone-mapped output.
///
/// Generation is idempotent: the same `max_raw_value` always produces
/// identical tables.
///
/// # Example
/// ```rust
/// use argus_synth::prelude::{GammaTables, TransferFunction};
///
/// let tables = GammaTables::new(4000);
/// assert_eq!(tables.apply(0, TransferFunction::Srgb), 0);
/// assert_eq!(tables.apply(4000, TransferFunction::Srgb), 255);
/// ```
pub struct GammaTables {
    max_raw_value: u32,
    srgb: Vec<u16>,
    smpte170m: Vec<u16>,
    st2084: Vec<u16>,
    hlg: Vec<u16>,
}

impl GammaTables {
    pub fn new(max_raw_value: u32) -> Self {
        let max_raw_value = max_raw_value.max(1);
        Self {
            max_raw_value,
            srgb: build_table(max_raw_value, srgb_curve),
            smpte170m: build_table(max_raw_value, smpte170m_curve),
            st2084: build_table(max_raw_value, st2084_curve),
            hlg: build_table(max_raw_value, hlg_curve),
        }
    }

    /// Largest raw value the tables cover.
    pub fn max_raw_value(&self) -> u32 {
        self.max_raw_value
    }

    /// Full table for one curve family.
    pub fn table(&self, tf: TransferFunction) -> &[u16] {
        match tf {
            TransferFunction::Srgb => &self.srgb,
            TransferFunction::Smpte170m => &self.smpte170m,
            TransferFunction::St2084 => &self.st2084,
            TransferFunction::Hlg => &self.hlg,
        }
    }

    /// Map one raw value through a curve. Values past the raw domain
    /// clamp to the brightest entry.
    pub fn apply(&self, raw: u32, tf: TransferFunction) -> u16 {
        let table = self.table(tf);
        let idx = (raw as usize).min(table.len() - 1);
        table[idx]
    }
}

fn build_table(max_raw_value: u32, curve: fn(f32) -> f32) -> Vec<u16> {
    (0..=max_raw_value)
        .map(|raw| {
            let linear = raw as f32 / max_raw_value as f32;
            (curve(linear).clamp(0.0, 1.0) * 255.0).round() as u16
        })
        .collect()
}

fn srgb_curve(x: f32) -> f32 {
    if x <= 0.003_130_8 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

fn smpte170m_curve(x: f32) -> f32 {
    if x < 0.018 {
        4.5 * x
    } else {
        1.099 * x.powf(0.45) - 0.099
    }
}

fn st2084_curve(x: f32) -> f32 {
    const M1: f32 = 2610.0 / 16384.0;
    const M2: f32 = 2523.0 / 4096.0 * 128.0;
    const C1: f32 = 3424.0 / 4096.0;
    const C2: f32 = 2413.0 / 4096.0 * 32.0;
    const C3: f32 = 2392.0 / 4096.0 * 32.0;
    let xp = x.max(0.0).powf(M1);
    ((C1 + C2 * xp) / (1.0 + C3 * xp)).powf(M2)
}

fn hlg_curve(x: f32) -> f32 {
    const A: f32 = 0.178_832_77;
    const B: f32 = 0.284_668_92;
    const C: f32 = 0.559_910_73;
    if x <= 1.0 / 12.0 {
        (3.0 * x).max(0.0).sqrt()
    } else {
        A * (12.0 * x - B).ln() + C
    }
}

/// Choose the curve for an output's color-space and dynamic-range
/// profile.
///
/// `is_10bit_capable` mirrors the sensor capability; a 10-bit profile
/// requested on an 8-bit-only sensor degrades to SMPTE 170M with a
/// warning rather than failing the frame.
pub fn select_transfer_function(
    color_space: ColorSpaceProfile,
    dynamic_range: DynamicRangeProfile,
    is_10bit_capable: bool,
) -> TransferFunction {
    match dynamic_range {
        DynamicRangeProfile::Hlg10 | DynamicRangeProfile::Hdr10 if !is_10bit_capable => {
            warn!(
                ?dynamic_range,
                "10-bit dynamic range requested on an 8-bit sensor, falling back to SMPTE 170M"
            );
            TransferFunction::Smpte170m
        }
        DynamicRangeProfile::Hlg10 => TransferFunction::Hlg,
        DynamicRangeProfile::Hdr10 => TransferFunction::St2084,
        DynamicRangeProfile::Standard => match color_space {
            ColorSpaceProfile::Srgb | ColorSpaceProfile::DisplayP3 => TransferFunction::Srgb,
            ColorSpaceProfile::Unspecified | ColorSpaceProfile::Bt2020 => {
                TransferFunction::Smpte170m
            }
        },
    }
}
