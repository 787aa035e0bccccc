//! Per-format capture kernels.
//!
//! Every kernel is a pure function of (scene, settings, characteristics,
//! seed): identical inputs synthesize byte-identical buffers. Rows are
//! filled in parallel with per-row random streams so scheduling never
//! affects output.

use argus_core::prelude::{
    ColorFilterArrangement, ColorSpaceProfile, CropRegion, DynamicRangeProfile, RotateAndCrop,
    SensorCharacteristics, SensorSettings, TestPatternMode,
};
use rayon::prelude::*;
use tracing::warn;

use crate::gamma::{GammaTables, TransferFunction, select_transfer_function};
use crate::noise::{self, ELECTRONS_PER_LUX_SECOND, RowNoise};
use crate::remosaic::{quad_bayer_channel, remosaic_raw16, standard_bayer_channel};
use crate::scene::{Scene, SceneChannel};

/// Reference neutral color point reported when requested.
pub const NEUTRAL_COLOR_POINT: [f32; 3] = [0.45, 1.0, 0.61];
/// Sensor green-channel split ratio; 1.0 means Gr and Gb match.
pub const GREEN_SPLIT: f32 = 1.0;

/// Packed layout for RGB captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RgbLayout {
    Rgb,
    Rgba,
    Argb,
}

/// YUV420 synthesis fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// Transform an existing YUV input buffer; no re-synthesis.
    Reprocess,
    /// 2x2 supersampled scene sampling.
    HighQuality,
    /// One scene sample per output pixel.
    Regular,
}

/// Raw readout mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawMode {
    /// One sample per native pixel.
    FullRes,
    /// Quad blocks averaged down to the binned resolution.
    Binned,
    /// Cropped to the zoomed raw window, upsampled to full resolution.
    InSensorZoom,
}

/// Sensor-RGB to target-RGB conversion matrix.
#[derive(Debug, Clone, Copy)]
pub struct RgbRgbMatrix(pub [[f32; 3]; 3]);

impl RgbRgbMatrix {
    pub fn identity() -> Self {
        Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Transform a linear RGB triple, clamping to `[0, 1]`.
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        [0, 1, 2].map(|row| {
            (m[row][0] * rgb[0] + m[row][1] * rgb[1] + m[row][2] * rgb[2]).clamp(0.0, 1.0)
        })
    }
}

const XYZ_TO_DISPLAY_P3: [[f32; 3]; 3] = [
    [2.493_497, -0.931_383_6, -0.402_710_8],
    [-0.829_489, 1.762_664_1, 0.023_624_7],
    [0.035_845_8, -0.076_172_4, 0.956_884_5],
];
const XYZ_TO_BT2020: [[f32; 3]; 3] = [
    [1.716_651_2, -0.355_670_8, -0.253_366_3],
    [-0.666_684_4, 1.616_481_2, 0.015_768_5],
    [0.017_639_9, -0.042_770_6, 0.942_103_1],
];

/// Mutable planar YUV420 view.
pub struct YuvPlanesMut<'a> {
    pub y: &'a mut [u8],
    pub u: &'a mut [u8],
    pub v: &'a mut [u8],
    pub y_stride: usize,
    pub c_stride: usize,
}

/// Immutable planar YUV420 view.
pub struct YuvPlanesRef<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub y_stride: usize,
    pub c_stride: usize,
}

// Chroma rows draw from a distinct random stream than luma rows.
const CHROMA_SEED_SALT: u64 = 0x5bd1_e995_9d1d_c9d5;

fn cfa_channel(arrangement: ColorFilterArrangement, x: u32, y: u32) -> SceneChannel {
    let (dx, dy) = match arrangement {
        ColorFilterArrangement::Rggb => (0, 0),
        ColorFilterArrangement::Grbg => (1, 0),
        ColorFilterArrangement::Gbrg => (0, 1),
        ColorFilterArrangement::Bggr => (1, 1),
    };
    standard_bayer_channel(x + dx, y + dy)
}

fn channel_index(channel: SceneChannel) -> usize {
    match channel {
        SceneChannel::Red => 0,
        SceneChannel::GreenEven => 1,
        SceneChannel::GreenOdd => 2,
        SceneChannel::Blue => 3,
        SceneChannel::Depth => 0,
    }
}

// Classic eight-bar pattern, RGB weights per bar left to right.
const COLOR_BARS: [[f32; 3]; 8] = [
    [1.0, 1.0, 1.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, 0.0],
];

fn color_bar_value(x: u32, width: u32, channel: SceneChannel, max_raw: f32) -> f32 {
    let bar = ((x as usize * COLOR_BARS.len()) / width.max(1) as usize).min(COLOR_BARS.len() - 1);
    let rgb = COLOR_BARS[bar];
    let weight = match channel {
        SceneChannel::Red => rgb[0],
        SceneChannel::GreenEven | SceneChannel::GreenOdd => rgb[1],
        SceneChannel::Blue => rgb[2],
        SceneChannel::Depth => 0.0,
    };
    weight * max_raw
}

/// The synthesis engine for one sensor.
///
/// Holds the characteristics and the precomputed gamma tables; all
/// per-frame state arrives through the kernel arguments.
///
/// # Example
/// ```rust
/// use argus_core::prelude::*;
/// use argus_synth::prelude::*;
///
/// let chars = SensorCharacteristics::default_emulated();
/// let engine = SynthesisEngine::new(&chars);
/// let mut scene = TestScene::new();
/// scene.initialize(chars.width, chars.height);
/// let settings = SensorSettings::default();
///
/// let (width, height) = (64u32, 48u32);
/// let mut raw = vec![0u8; (width * height * 2) as usize];
/// engine.capture_raw(
///     &scene,
///     &settings,
///     &mut raw,
///     width,
///     height,
///     (width * 2) as usize,
///     RawMode::FullRes,
///     false,
///     7,
/// );
/// ```
pub struct SynthesisEngine {
    chars: SensorCharacteristics,
    gamma: GammaTables,
}

impl SynthesisEngine {
    pub fn new(chars: &SensorCharacteristics) -> Self {
        Self {
            chars: chars.clone(),
            gamma: GammaTables::new(chars.max_raw_value),
        }
    }

    /// Precomputed gamma tables for this sensor.
    pub fn gamma(&self) -> &GammaTables {
        &self.gamma
    }

    /// Sensor-RGB to target-RGB matrix for a color-space profile.
    pub fn rgb_rgb_matrix(&self, color_space: ColorSpaceProfile) -> RgbRgbMatrix {
        let cf = &self.chars.color_filter;
        let xyz_to_target: [[f32; 3]; 3] = match color_space {
            ColorSpaceProfile::Unspecified | ColorSpaceProfile::Srgb => [cf.r, cf.gr, cf.b],
            ColorSpaceProfile::DisplayP3 => XYZ_TO_DISPLAY_P3,
            ColorSpaceProfile::Bt2020 => XYZ_TO_BT2020,
        };
        let fwd = &self.chars.forward_matrix;
        let sensor_to_xyz = [fwd.x, fwd.y, fwd.z];
        let mut out = [[0.0f32; 3]; 3];
        for (row, target_row) in xyz_to_target.iter().enumerate() {
            for col in 0..3 {
                out[row][col] = (0..3)
                    .map(|k| target_row[k] * sensor_to_xyz[k][col])
                    .sum();
            }
        }
        RgbRgbMatrix(out)
    }

    /// Zoom crop window in sensor coordinates.
    ///
    /// The window shrinks with the (clamped) zoom ratio, centered in
    /// the unzoomed raw crop region and never smaller than the zoomed
    /// raw crop region.
    pub fn zoom_window(&self, zoom_ratio: f32) -> CropRegion {
        let zoom = zoom_ratio.clamp(1.0, self.chars.max_zoom_ratio);
        let outer = self.chars.raw_crop_region_unzoomed;
        let inner = self.chars.raw_crop_region_zoomed;
        let width = ((outer.width as f32 / zoom) as u32).max(inner.width.max(2));
        let height = ((outer.height as f32 / zoom) as u32).max(inner.height.max(2));
        CropRegion::new(
            outer.x + (outer.width - width) / 2,
            outer.y + (outer.height - height) / 2,
            width,
            height,
        )
    }

    /// Capture a 12-bit Bayer mosaic.
    ///
    /// `width`/`height` describe the output buffer; `remosaic` converts
    /// a quad-Bayer readout into standard layout (quad sensors only).
    #[allow(clippy::too_many_arguments)]
    pub fn capture_raw(
        &self,
        scene: &dyn Scene,
        settings: &SensorSettings,
        out: &mut [u8],
        width: u32,
        height: u32,
        stride_bytes: usize,
        mode: RawMode,
        remosaic: bool,
        seed: u64,
    ) {
        if remosaic && self.chars.quad_bayer {
            let mut quad = vec![0u16; width as usize * height as usize];
            self.fill_raw_u16(scene, settings, &mut quad, width, height, mode, true, seed);
            let mut standard = vec![0u16; quad.len()];
            match remosaic_raw16(&quad, width as usize, height as usize, &mut standard) {
                Ok(()) => write_u16_rows(out, &standard, width as usize, stride_bytes),
                Err(err) => {
                    warn!(%err, "remosaic skipped, emitting quad mosaic unchanged");
                    write_u16_rows(out, &quad, width as usize, stride_bytes);
                }
            }
        } else {
            let quad_layout = self.chars.quad_bayer && mode != RawMode::Binned;
            let mut mosaic = vec![0u16; width as usize * height as usize];
            self.fill_raw_u16(
                scene,
                settings,
                &mut mosaic,
                width,
                height,
                mode,
                quad_layout,
                seed,
            );
            write_u16_rows(out, &mosaic, width as usize, stride_bytes);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_raw_u16(
        &self,
        scene: &dyn Scene,
        settings: &SensorSettings,
        out: &mut [u16],
        width: u32,
        height: u32,
        mode: RawMode,
        quad_layout: bool,
        seed: u64,
    ) {
        let exposure_s = settings.exposure_time as f32 / 1e9;
        let gain_factor = noise::total_gain(settings.gain, self.chars.max_raw_value);
        let max_raw = self.chars.max_raw_value as f32;
        let black = self.chars.black_level_pattern;
        let arrangement = self.chars.color_arrangement;
        let zoom_window = self.zoom_window(self.chars.max_zoom_ratio);

        out.par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(row, samples)| {
                let y = row as u32;
                let mut rng = RowNoise::new(seed, y);
                for (col, sample) in samples.iter_mut().enumerate() {
                    let x = col as u32;
                    let channel = if quad_layout {
                        quad_bayer_channel(x, y)
                    } else {
                        cfa_channel(arrangement, x, y)
                    };
                    let idx = channel_index(channel);
                    let digital = match settings.test_pattern_mode {
                        TestPatternMode::SolidColor => settings.test_pattern_data[idx] as f32,
                        TestPatternMode::ColorBars => {
                            color_bar_value(x, width, channel, max_raw)
                        }
                        TestPatternMode::Off => {
                            let electrons = match mode {
                                RawMode::FullRes => {
                                    scene.sample(x, y, channel) * ELECTRONS_PER_LUX_SECOND
                                        * exposure_s
                                }
                                RawMode::Binned => {
                                    // Average the four same-color pixels of
                                    // the quad block this binned pixel covers.
                                    let bx = x * 2;
                                    let by = y * 2;
                                    let sum = scene.sample(bx, by, channel)
                                        + scene.sample(bx + 1, by, channel)
                                        + scene.sample(bx, by + 1, channel)
                                        + scene.sample(bx + 1, by + 1, channel);
                                    sum * 0.25 * ELECTRONS_PER_LUX_SECOND * exposure_s
                                }
                                RawMode::InSensorZoom => {
                                    let sx = zoom_source(x, width, zoom_window.x, zoom_window.width);
                                    let sy =
                                        zoom_source(y, height, zoom_window.y, zoom_window.height);
                                    scene.sample(sx, sy, channel) * ELECTRONS_PER_LUX_SECOND
                                        * exposure_s
                                }
                            };
                            let noisy = electrons + rng.electron_noise(electrons);
                            noisy * gain_factor
                        }
                    };
                    let value = digital + rng.digital_noise() + black[idx] as f32;
                    *sample = value.round().clamp(0.0, max_raw) as u16;
                }
            });
    }

    /// Capture packed RGB.
    #[allow(clippy::too_many_arguments)]
    pub fn capture_rgb(
        &self,
        scene: &dyn Scene,
        settings: &SensorSettings,
        out: &mut [u8],
        width: u32,
        height: u32,
        stride_bytes: usize,
        layout: RgbLayout,
        color_space: ColorSpaceProfile,
        dynamic_range: DynamicRangeProfile,
        seed: u64,
    ) {
        let matrix = self.rgb_rgb_matrix(color_space);
        let tf = select_transfer_function(color_space, dynamic_range, self.chars.is_10bit_capable);
        let exposure_s = settings.exposure_time as f32 / 1e9;
        let gain_factor = noise::total_gain(settings.gain, self.chars.max_raw_value);
        let max_raw = self.chars.max_raw_value as f32;
        let (sensor_w, sensor_h) =
            self.chars.dimensions(false);
        let bpp = match layout {
            RgbLayout::Rgb => 3,
            RgbLayout::Rgba | RgbLayout::Argb => 4,
        };

        out.par_chunks_mut(stride_bytes)
            .take(height as usize)
            .enumerate()
            .for_each(|(row, line)| {
                let y = row as u32;
                let mut rng = RowNoise::new(seed, y);
                let sy = y as u64 * sensor_h as u64 / height.max(1) as u64;
                for x in 0..width {
                    let sx = (x as u64 * sensor_w as u64 / width.max(1) as u64) as u32;
                    let rgb = self.sample_linear_rgb(
                        scene,
                        sx as f32,
                        sy as f32,
                        exposure_s,
                        gain_factor,
                        max_raw,
                        &mut rng,
                    );
                    let rgb = matrix.apply(rgb);
                    let r = self.gamma.apply((rgb[0] * max_raw) as u32, tf) as u8;
                    let g = self.gamma.apply((rgb[1] * max_raw) as u32, tf) as u8;
                    let b = self.gamma.apply((rgb[2] * max_raw) as u32, tf) as u8;
                    let off = x as usize * bpp;
                    match layout {
                        RgbLayout::Rgb => {
                            line[off..off + 3].copy_from_slice(&[r, g, b]);
                        }
                        RgbLayout::Rgba => {
                            line[off..off + 4].copy_from_slice(&[r, g, b, 0xff]);
                        }
                        RgbLayout::Argb => {
                            line[off..off + 4].copy_from_slice(&[0xff, r, g, b]);
                        }
                    }
                }
            });
    }

    /// Synthesize planar YUV420.
    ///
    /// `ProcessMode::Reprocess` is handled by [`Self::reprocess_yuv420`];
    /// calling this kernel with it degrades to `Regular` with a warning.
    #[allow(clippy::too_many_arguments)]
    pub fn capture_yuv420(
        &self,
        scene: &dyn Scene,
        settings: &SensorSettings,
        out: YuvPlanesMut<'_>,
        width: u32,
        height: u32,
        mode: ProcessMode,
        color_space: ColorSpaceProfile,
        dynamic_range: DynamicRangeProfile,
        seed: u64,
    ) {
        let mode = if mode == ProcessMode::Reprocess {
            warn!("reprocess requested without an input buffer, synthesizing instead");
            ProcessMode::Regular
        } else {
            mode
        };
        let matrix = self.rgb_rgb_matrix(color_space);
        let tf = select_transfer_function(color_space, dynamic_range, self.chars.is_10bit_capable);
        let exposure_s = settings.exposure_time as f32 / 1e9;
        let gain_factor = noise::total_gain(settings.gain, self.chars.max_raw_value);
        let max_raw = self.chars.max_raw_value as f32;
        let window = self.zoom_window(settings.zoom_ratio);
        let rotate = settings.rotate_and_crop == RotateAndCrop::Rotate90;

        let sample_tone_mapped = |u: f32, v: f32, rng: &mut RowNoise| -> [u8; 3] {
            let rgb = match mode {
                ProcessMode::HighQuality => {
                    // 2x2 supersampling inside the output pixel footprint.
                    let mut acc = [0.0f32; 3];
                    for (du, dv) in [(-0.25, -0.25), (0.25, -0.25), (-0.25, 0.25), (0.25, 0.25)] {
                        let (sx, sy) = map_to_window(
                            u + du / width as f32,
                            v + dv / height as f32,
                            window,
                            rotate,
                        );
                        let s = self.sample_linear_rgb(
                            scene,
                            sx,
                            sy,
                            exposure_s,
                            gain_factor,
                            max_raw,
                            rng,
                        );
                        for (a, b) in acc.iter_mut().zip(s) {
                            *a += b;
                        }
                    }
                    acc.map(|a| a * 0.25)
                }
                _ => {
                    let (sx, sy) = map_to_window(u, v, window, rotate);
                    self.sample_linear_rgb(scene, sx, sy, exposure_s, gain_factor, max_raw, rng)
                }
            };
            let rgb = matrix.apply(rgb);
            [
                self.gamma.apply((rgb[0] * max_raw) as u32, tf) as u8,
                self.gamma.apply((rgb[1] * max_raw) as u32, tf) as u8,
                self.gamma.apply((rgb[2] * max_raw) as u32, tf) as u8,
            ]
        };

        let YuvPlanesMut {
            y: y_plane,
            u: u_plane,
            v: v_plane,
            y_stride,
            c_stride,
        } = out;

        y_plane
            .par_chunks_mut(y_stride)
            .take(height as usize)
            .enumerate()
            .for_each(|(row, line)| {
                let mut rng = RowNoise::new(seed, row as u32);
                let v = (row as f32 + 0.5) / height as f32;
                for x in 0..width as usize {
                    let u = (x as f32 + 0.5) / width as f32;
                    let [r, g, b] = sample_tone_mapped(u, v, &mut rng);
                    line[x] = luma(r, g, b);
                }
            });

        let chroma_w = (width as usize).div_ceil(2);
        let chroma_h = (height as usize).div_ceil(2);
        u_plane
            .par_chunks_mut(c_stride)
            .zip(v_plane.par_chunks_mut(c_stride))
            .take(chroma_h)
            .enumerate()
            .for_each(|(row, (u_line, v_line))| {
                let mut rng = RowNoise::new(seed ^ CHROMA_SEED_SALT, row as u32);
                let v = (row as f32 * 2.0 + 1.0) / height as f32;
                for cx in 0..chroma_w {
                    let u = (cx as f32 * 2.0 + 1.0) / width as f32;
                    let [r, g, b] = sample_tone_mapped(u, v, &mut rng);
                    let (cb, cr) = chroma(r, g, b);
                    u_line[cx] = cb;
                    v_line[cx] = cr;
                }
            });
    }

    /// Pass-through transform of an existing YUV buffer: zoom crop,
    /// optional rotate, nearest-neighbor scale. No re-synthesis.
    #[allow(clippy::too_many_arguments)]
    pub fn reprocess_yuv420(
        &self,
        input: YuvPlanesRef<'_>,
        in_width: u32,
        in_height: u32,
        out: YuvPlanesMut<'_>,
        out_width: u32,
        out_height: u32,
        zoom_ratio: f32,
        rotate: bool,
    ) {
        let zoom = zoom_ratio.clamp(1.0, self.chars.max_zoom_ratio);
        let crop_w = (in_width as f32 / zoom).max(2.0);
        let crop_h = (in_height as f32 / zoom).max(2.0);
        let window = CropRegion::new(
            ((in_width as f32 - crop_w) / 2.0) as u32,
            ((in_height as f32 - crop_h) / 2.0) as u32,
            crop_w as u32,
            crop_h as u32,
        );

        // Source coordinates are computed in luma space; chroma reuses
        // them at half scale so both planes crop identically.
        let map = |u: f32, v: f32| -> (usize, usize) {
            let (sx, sy) = map_to_window(u, v, window, rotate);
            (
                (sx.max(0.0) as usize).min(in_width as usize - 1),
                (sy.max(0.0) as usize).min(in_height as usize - 1),
            )
        };

        for y in 0..out_height as usize {
            let v = (y as f32 + 0.5) / out_height as f32;
            for x in 0..out_width as usize {
                let u = (x as f32 + 0.5) / out_width as f32;
                let (sx, sy) = map(u, v);
                out.y[y * out.y_stride + x] = input.y[sy * input.y_stride + sx];
            }
        }
        let out_cw = (out_width as usize).div_ceil(2);
        let out_ch = (out_height as usize).div_ceil(2);
        let in_cw = (in_width as usize).div_ceil(2);
        let in_ch = (in_height as usize).div_ceil(2);
        for cy in 0..out_ch {
            let v = (cy as f32 * 2.0 + 1.5) / out_height as f32;
            for cx in 0..out_cw {
                let u = (cx as f32 * 2.0 + 1.5) / out_width as f32;
                let (sx, sy) = map(u, v);
                let (sx, sy) = ((sx / 2).min(in_cw - 1), (sy / 2).min(in_ch - 1));
                out.u[cy * out.c_stride + cx] = input.u[sy * input.c_stride + sx];
                out.v[cy * out.c_stride + cx] = input.v[sy * input.c_stride + sx];
            }
        }
    }

    /// Capture a 16-bit depth map from the scene's depth channel.
    #[allow(clippy::too_many_arguments)]
    pub fn capture_depth(
        &self,
        scene: &dyn Scene,
        settings: &SensorSettings,
        out: &mut [u8],
        width: u32,
        height: u32,
        stride_bytes: usize,
        seed: u64,
    ) {
        let gain_scale = settings.gain as f32 / 100.0;
        let (sensor_w, sensor_h) = self.chars.dimensions(false);

        out.par_chunks_mut(stride_bytes)
            .take(height as usize)
            .enumerate()
            .for_each(|(row, line)| {
                let y = row as u32;
                let mut rng = RowNoise::new(seed, y);
                let sy = (y as u64 * sensor_h as u64 / height.max(1) as u64) as u32;
                for x in 0..width {
                    let sx = (x as u64 * sensor_w as u64 / width.max(1) as u64) as u32;
                    let depth = scene.sample(sx, sy, SceneChannel::Depth);
                    let value = depth * f32::from(u16::MAX) + rng.digital_noise() * gain_scale;
                    let sample = value.round().clamp(0.0, f32::from(u16::MAX)) as u16;
                    let off = x as usize * 2;
                    line[off..off + 2].copy_from_slice(&sample.to_le_bytes());
                }
            });
    }

    /// Per-channel `(scale, offset)` noise-profile coefficients in
    /// normalized units, derived from the gain and conversion factors.
    pub fn noise_profile(&self, gain: u32) -> [[f64; 2]; 4] {
        let total = noise::total_gain(gain, self.chars.max_raw_value) as f64;
        let max = self.chars.max_raw_value as f64;
        let scale = total / max;
        let before = noise::READ_NOISE_STDDEV_BEFORE_GAIN as f64;
        let after = noise::READ_NOISE_STDDEV_AFTER_GAIN as f64;
        let offset = (before * before * total * total + after * after) / (max * max);
        [[scale, offset]; 4]
    }

    #[allow(clippy::too_many_arguments)]
    fn sample_linear_rgb(
        &self,
        scene: &dyn Scene,
        sx: f32,
        sy: f32,
        exposure_s: f32,
        gain_factor: f32,
        max_raw: f32,
        rng: &mut RowNoise,
    ) -> [f32; 3] {
        let x = sx.max(0.0) as u32;
        let y = sy.max(0.0) as u32;
        [
            SceneChannel::Red,
            SceneChannel::GreenEven,
            SceneChannel::Blue,
        ]
        .map(|channel| {
            let electrons = scene.sample(x, y, channel) * ELECTRONS_PER_LUX_SECOND * exposure_s;
            let noisy = electrons + rng.electron_noise(electrons);
            ((noisy * gain_factor + rng.digital_noise()) / max_raw).clamp(0.0, 1.0)
        })
    }
}

/// Map normalized output coordinates into a crop window, optionally
/// through a 90-degree rotate-and-crop.
///
/// Rotation samples the centered square of the window so the rotated
/// field of view fills the output without changing its aspect.
fn map_to_window(u: f32, v: f32, window: CropRegion, rotate: bool) -> (f32, f32) {
    let u = u.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    if !rotate {
        return (
            window.x as f32 + u * window.width as f32,
            window.y as f32 + v * window.height as f32,
        );
    }
    let (ru, rv) = (v, 1.0 - u);
    let side = window.width.min(window.height) as f32;
    let cx = window.x as f32 + window.width as f32 / 2.0;
    let cy = window.y as f32 + window.height as f32 / 2.0;
    (cx + (ru - 0.5) * side, cy + (rv - 0.5) * side)
}

fn zoom_source(x: u32, out_extent: u32, window_origin: u32, window_extent: u32) -> u32 {
    let sx = window_origin + (x as u64 * window_extent as u64 / out_extent.max(1) as u64) as u32;
    // Preserve the Bayer phase of the destination coordinate.
    (sx & !1) | (x & 1)
}

fn write_u16_rows(out: &mut [u8], samples: &[u16], width: usize, stride_bytes: usize) {
    out.par_chunks_mut(stride_bytes)
        .zip(samples.par_chunks(width))
        .for_each(|(line, row)| {
            for (x, sample) in row.iter().enumerate() {
                line[x * 2..x * 2 + 2].copy_from_slice(&sample.to_le_bytes());
            }
        });
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

fn chroma(r: u8, g: u8, b: u8) -> (u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (
        cb.round().clamp(0.0, 255.0) as u8,
        cr.round().clamp(0.0, 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::TestScene;
    use argus_core::prelude::SensorCharacteristics;

    fn test_setup(quad: bool) -> (SynthesisEngine, TestScene, SensorSettings) {
        let chars = if quad {
            SensorCharacteristics::default_emulated_quad_bayer()
        } else {
            SensorCharacteristics::default_emulated()
        };
        let engine = SynthesisEngine::new(&chars);
        let mut scene = TestScene::new();
        scene.initialize(chars.full_res_width, chars.full_res_height);
        (engine, scene, SensorSettings::default())
    }

    #[test]
    fn raw_capture_is_deterministic() {
        let (engine, scene, settings) = test_setup(false);
        let (w, h) = (64u32, 48u32);
        let mut a = vec![0u8; (w * h * 2) as usize];
        let mut b = vec![0u8; (w * h * 2) as usize];
        engine.capture_raw(
            &scene, &settings, &mut a, w, h, (w * 2) as usize, RawMode::FullRes, false, 99,
        );
        engine.capture_raw(
            &scene, &settings, &mut b, w, h, (w * 2) as usize, RawMode::FullRes, false, 99,
        );
        assert_eq!(a, b);

        engine.capture_raw(
            &scene, &settings, &mut b, w, h, (w * 2) as usize, RawMode::FullRes, false, 100,
        );
        assert_ne!(a, b, "a different seed must change the noise");
    }

    #[test]
    fn raw_samples_stay_within_adc_range() {
        let (engine, scene, mut settings) = test_setup(false);
        settings.gain = 1600;
        settings.exposure_time = 100_000_000;
        let (w, h) = (32u32, 32u32);
        let mut buf = vec![0u8; (w * h * 2) as usize];
        engine.capture_raw(
            &scene, &settings, &mut buf, w, h, (w * 2) as usize, RawMode::FullRes, false, 1,
        );
        for pair in buf.chunks_exact(2) {
            let v = u16::from_le_bytes([pair[0], pair[1]]);
            assert!(u32::from(v) <= 4000);
        }
    }

    #[test]
    fn solid_test_pattern_pins_channel_means() {
        let (engine, scene, mut settings) = test_setup(false);
        settings.test_pattern_mode = TestPatternMode::SolidColor;
        settings.test_pattern_data = [1000, 1200, 1400, 1600];
        let (w, h) = (64u32, 64u32);
        let mut buf = vec![0u8; (w * h * 2) as usize];
        engine.capture_raw(
            &scene, &settings, &mut buf, w, h, (w * 2) as usize, RawMode::FullRes, false, 5,
        );
        // Top-left pixel is R for an RGGB sensor; black level shifts the
        // mean up by the pattern offset, read noise stays within a few
        // counts.
        let first = u16::from_le_bytes([buf[0], buf[1]]) as f32;
        let expected = 1000.0 + 200.0;
        assert!((first - expected).abs() < 20.0, "got {first}");
    }

    #[test]
    fn yuv_capture_is_deterministic_and_zoom_clamps() {
        let (engine, scene, mut settings) = test_setup(false);
        let (w, h) = (64u32, 48u32);
        let cw = (w as usize).div_ceil(2);
        let ch = (h as usize).div_ceil(2);
        let mut run = |settings: &SensorSettings, seed: u64| -> Vec<u8> {
            let mut y = vec![0u8; (w * h) as usize];
            let mut u = vec![0u8; cw * ch];
            let mut v = vec![0u8; cw * ch];
            engine.capture_yuv420(
                &scene,
                settings,
                YuvPlanesMut {
                    y: &mut y,
                    u: &mut u,
                    v: &mut v,
                    y_stride: w as usize,
                    c_stride: cw,
                },
                w,
                h,
                ProcessMode::Regular,
                ColorSpaceProfile::Srgb,
                DynamicRangeProfile::Standard,
                seed,
            );
            y.extend(u);
            y.extend(v);
            y
        };
        let base = run(&settings, 3);
        assert_eq!(base, run(&settings, 3));

        settings.zoom_ratio = 10.0;
        let over = run(&settings, 3);
        settings.zoom_ratio = 4.0;
        let max = run(&settings, 3);
        assert_eq!(over, max, "zoom past the sensor maximum must clamp");
    }

    #[test]
    fn high_quality_differs_from_regular() {
        let (engine, scene, settings) = test_setup(false);
        let (w, h) = (32u32, 32u32);
        let cw = (w as usize).div_ceil(2);
        let mut run = |mode: ProcessMode| -> Vec<u8> {
            let mut y = vec![0u8; (w * h) as usize];
            let mut u = vec![0u8; cw * cw];
            let mut v = vec![0u8; cw * cw];
            engine.capture_yuv420(
                &scene,
                &settings,
                YuvPlanesMut {
                    y: &mut y,
                    u: &mut u,
                    v: &mut v,
                    y_stride: w as usize,
                    c_stride: cw,
                },
                w,
                h,
                mode,
                ColorSpaceProfile::Srgb,
                DynamicRangeProfile::Standard,
                11,
            );
            y
        };
        assert_ne!(run(ProcessMode::Regular), run(ProcessMode::HighQuality));
    }

    #[test]
    fn reprocess_at_unit_zoom_is_identity() {
        let (engine, _scene, _settings) = test_setup(false);
        let (w, h) = (16u32, 16u32);
        let cw = (w as usize) / 2;
        let y_in: Vec<u8> = (0..w * h).map(|i| (i % 251) as u8).collect();
        let u_in: Vec<u8> = (0..(cw * cw)).map(|i| (i % 17) as u8).collect();
        let v_in: Vec<u8> = (0..(cw * cw)).map(|i| (i % 29) as u8).collect();
        let mut y_out = vec![0u8; y_in.len()];
        let mut u_out = vec![0u8; u_in.len()];
        let mut v_out = vec![0u8; v_in.len()];
        engine.reprocess_yuv420(
            YuvPlanesRef {
                y: &y_in,
                u: &u_in,
                v: &v_in,
                y_stride: w as usize,
                c_stride: cw,
            },
            w,
            h,
            YuvPlanesMut {
                y: &mut y_out,
                u: &mut u_out,
                v: &mut v_out,
                y_stride: w as usize,
                c_stride: cw,
            },
            w,
            h,
            1.0,
            false,
        );
        assert_eq!(y_in, y_out);
        assert_eq!(u_in, u_out);
        assert_eq!(v_in, v_out);
    }

    #[test]
    fn rgb_layouts_place_alpha_correctly() {
        let (engine, scene, settings) = test_setup(false);
        let (w, h) = (8u32, 8u32);
        let mut rgba = vec![0u8; (w * h * 4) as usize];
        engine.capture_rgb(
            &scene,
            &settings,
            &mut rgba,
            w,
            h,
            (w * 4) as usize,
            RgbLayout::Rgba,
            ColorSpaceProfile::Srgb,
            DynamicRangeProfile::Standard,
            2,
        );
        assert!(rgba.chunks_exact(4).all(|px| px[3] == 0xff));

        let mut argb = vec![0u8; (w * h * 4) as usize];
        engine.capture_rgb(
            &scene,
            &settings,
            &mut argb,
            w,
            h,
            (w * 4) as usize,
            RgbLayout::Argb,
            ColorSpaceProfile::Srgb,
            DynamicRangeProfile::Standard,
            2,
        );
        assert!(argb.chunks_exact(4).all(|px| px[0] == 0xff));
    }

    #[test]
    fn depth_capture_is_deterministic() {
        let (engine, scene, settings) = test_setup(false);
        let (w, h) = (32u32, 24u32);
        let mut a = vec![0u8; (w * h * 2) as usize];
        let mut b = vec![0u8; (w * h * 2) as usize];
        engine.capture_depth(&scene, &settings, &mut a, w, h, (w * 2) as usize, 8);
        engine.capture_depth(&scene, &settings, &mut b, w, h, (w * 2) as usize, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn quad_remosaic_path_produces_standard_layout_output() {
        let (engine, scene, settings) = test_setup(true);
        let (w, h) = (32u32, 32u32);
        let mut remosaiced = vec![0u8; (w * h * 2) as usize];
        engine.capture_raw(
            &scene,
            &settings,
            &mut remosaiced,
            w,
            h,
            (w * 2) as usize,
            RawMode::FullRes,
            true,
            21,
        );
        let mut quad = vec![0u8; (w * h * 2) as usize];
        engine.capture_raw(
            &scene,
            &settings,
            &mut quad,
            w,
            h,
            (w * 2) as usize,
            RawMode::FullRes,
            false,
            21,
        );
        // Same readout, different arrangement: total energy matches,
        // layout does not.
        let sum = |buf: &[u8]| -> u64 {
            buf.chunks_exact(2)
                .map(|p| u64::from(u16::from_le_bytes([p[0], p[1]])))
                .sum()
        };
        assert_eq!(sum(&quad), sum(&remosaiced));
        assert_ne!(quad, remosaiced);
    }

    #[test]
    fn noise_profile_scales_with_gain(){
        let (engine, _scene, _settings) = test_setup(false);
        let low = engine.noise_profile(100);
        let high = engine.noise_profile(800);
        assert!(high[0][0] > low[0][0]);
        assert!(high[0][1] > low[0][1]);
    }
}
