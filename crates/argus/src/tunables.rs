use std::sync::{Mutex, OnceLock};

/// Default buffer pool minimum count.
pub const DEFAULT_POOL_MIN: usize = 8;
/// Default buffer pool bytes per buffer (covers a 1080p RAW16 plane).
pub const DEFAULT_POOL_BYTES: usize = 4 << 20;
/// Default extra spare buffers retained beyond the minimum.
pub const DEFAULT_POOL_SPARE: usize = 16;
/// Default zoom ramp length in frames.
pub const DEFAULT_ZOOM_RAMP_FRAMES: u32 = 2;
/// Default dispatch-side wait for a vertical sync pulse (milliseconds).
pub const DEFAULT_DISPATCH_VSYNC_TIMEOUT_MS: u64 = 500;

/// Interpolation curve for the zoom ramp window.
///
/// The ramp length is fixed by `zoom_ramp_frames`; the curve only
/// shapes the intermediate values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ZoomRampCurve {
    #[default]
    Linear,
    Smoothstep,
}

impl ZoomRampCurve {
    /// Interpolate between two zoom ratios at `fraction` of the ramp.
    pub fn interpolate(&self, from: f32, to: f32, fraction: f32) -> f32 {
        let t = fraction.clamp(0.0, 1.0);
        let t = match self {
            ZoomRampCurve::Linear => t,
            ZoomRampCurve::Smoothstep => t * t * (3.0 - 2.0 * t),
        };
        from + (to - from) * t
    }
}

/// Tunables for the request controller and its buffer pool.
///
/// # Example
/// ```rust
/// use argus::tunables::{ControllerTunables, set_controller_tunables};
///
/// set_controller_tunables(ControllerTunables {
///     zoom_ramp_frames: 4,
///     ..ControllerTunables::default()
/// });
/// ```
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControllerTunables {
    pub pool_min: usize,
    pub pool_bytes: usize,
    pub pool_spare: usize,
    pub zoom_ramp_frames: u32,
    pub zoom_ramp_curve: ZoomRampCurve,
    pub dispatch_vsync_timeout_ms: u64,
}

impl Default for ControllerTunables {
    fn default() -> Self {
        Self {
            pool_min: DEFAULT_POOL_MIN,
            pool_bytes: DEFAULT_POOL_BYTES,
            pool_spare: DEFAULT_POOL_SPARE,
            zoom_ramp_frames: DEFAULT_ZOOM_RAMP_FRAMES,
            zoom_ramp_curve: ZoomRampCurve::default(),
            dispatch_vsync_timeout_ms: DEFAULT_DISPATCH_VSYNC_TIMEOUT_MS,
        }
    }
}

impl ControllerTunables {
    fn sanitized(self) -> Self {
        Self {
            pool_min: self.pool_min.max(1),
            pool_bytes: self.pool_bytes.max(1),
            pool_spare: self.pool_spare,
            zoom_ramp_frames: self.zoom_ramp_frames.max(1),
            zoom_ramp_curve: self.zoom_ramp_curve,
            dispatch_vsync_timeout_ms: self.dispatch_vsync_timeout_ms.max(1),
        }
    }
}

static CONTROLLER_TUNABLES: OnceLock<Mutex<ControllerTunables>> = OnceLock::new();

/// Override controller tunables process-wide.
pub fn set_controller_tunables(tunables: ControllerTunables) {
    let lock = CONTROLLER_TUNABLES.get_or_init(|| Mutex::new(ControllerTunables::default()));
    *lock.lock().unwrap() = tunables.sanitized();
}

pub(crate) fn controller_tunables() -> ControllerTunables {
    CONTROLLER_TUNABLES
        .get()
        .and_then(|t| t.lock().ok().map(|v| *v))
        .unwrap_or_default()
}

/// Builder for process-wide emulator tunables.
///
/// # Example
/// ```rust
/// use argus::tunables::{ArgusConfig, ZoomRampCurve};
///
/// ArgusConfig::new()
///     .buffer_pool(8, 4 << 20, 16)
///     .zoom_ramp(3, ZoomRampCurve::Smoothstep)
///     .apply();
/// ```
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ArgusConfig {
    controller: ControllerTunables,
}

impl ArgusConfig {
    /// Start building a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override buffer pool sizing.
    pub fn buffer_pool(mut self, min: usize, bytes: usize, spare: usize) -> Self {
        self.controller.pool_min = min;
        self.controller.pool_bytes = bytes;
        self.controller.pool_spare = spare;
        self
    }

    /// Override the zoom ramp policy.
    pub fn zoom_ramp(mut self, frames: u32, curve: ZoomRampCurve) -> Self {
        self.controller.zoom_ramp_frames = frames;
        self.controller.zoom_ramp_curve = curve;
        self
    }

    /// Override the dispatch thread's vsync wait.
    pub fn dispatch_vsync_timeout_ms(mut self, millis: u64) -> Self {
        self.controller.dispatch_vsync_timeout_ms = millis;
        self
    }

    /// Apply the configuration to global tunables.
    pub fn apply(self) {
        set_controller_tunables(self.controller);
    }
}
