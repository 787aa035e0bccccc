//! The sensor pipeline state machine.
//!
//! A sensor models a three-stage pipeline: configure, capture, readout.
//! Each stage boundary is marked by a vertical sync pulse, and the
//! interval between pulses follows the committed frame duration. Rows
//! are exposed at sequentially offset times (rolling shutter); the
//! emulator reports that timing through the shutter notification rather
//! than simulating per-row exposure.
//!
//! The pipeline owns a single worker thread for its `Running` lifetime.
//! The critical section under the control lock is a field swap; all
//! synthesis happens outside the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use argus_core::prelude::{
    Buffers, Counters, LogicalCameraSettings, LogicalCharacteristics, PixelFormat, SensorBuffer,
    SensorError, SensorPixelMode, SensorSettings, TimestampSource,
};
use argus_synth::prelude::{
    GREEN_SPLIT, NEUTRAL_COLOR_POINT, ProcessMode, RawMode, RgbLayout, Scene, SynthesisEngine,
    YuvPlanesMut, YuvPlanesRef,
};

use crate::callback::{NotifyErrorKind, NotifyMessage, PipelineCallback, PipelineResult};
use crate::metrics::PipelineStageMetrics;
use crate::validator;

/// Derived per-stream-configuration readout hints, computed once per
/// configuration by the request controller and carried with each
/// committed frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorBinningFactorInfo {
    pub has_raw_stream: bool,
    pub has_non_raw_stream: bool,
    pub quad_bayer_sensor: bool,
    pub max_res_request: bool,
    pub has_cropped_raw_stream: bool,
    pub raw_in_sensor_zoom_applied: bool,
}

/// Everything the pipeline needs to run one capture cycle.
#[derive(Debug)]
pub struct FrameRequest {
    pub settings: LogicalCameraSettings,
    pub result: PipelineResult,
    pub partial_result: Option<PipelineResult>,
    pub callback: PipelineCallback,
    pub input_buffers: Buffers,
    pub output_buffers: Buffers,
    pub binning: SensorBinningFactorInfo,
}

struct ControlState {
    got_vsync: bool,
    current: Option<FrameRequest>,
    in_capture: bool,
}

struct PipelineShared {
    control: Mutex<ControlState>,
    vsync: Condvar,
    quiesce: Condvar,
    exit: AtomicBool,
    flushing: AtomicBool,
    running: AtomicBool,
    counters: Arc<Counters>,
    stages: PipelineStageMetrics,
}

/// Idle cadence when no request is committed, nanoseconds.
const IDLE_FRAME_DURATION_NS: u64 = 33_333_333;
/// Worker sleep slice so shutdown stays responsive through long frames.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// The continuously running sensor pipeline for one logical camera.
///
/// Lifecycle: `Stopped` -> [`SensorPipeline::start_up`] -> `Running`
/// -> [`SensorPipeline::shut_down`] -> `Stopped`.
///
/// # Example
/// ```rust
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use argus::pipeline::SensorPipeline;
/// use argus_core::prelude::SensorCharacteristics;
/// use argus_synth::prelude::TestScene;
///
/// let pipeline = SensorPipeline::new();
/// let chars = HashMap::from([(0, SensorCharacteristics::default_emulated())]);
/// pipeline.start_up(0, chars, Box::new(TestScene::new())).unwrap();
/// assert!(pipeline.wait_for_vsync(Duration::from_secs(1)));
/// pipeline.shut_down().unwrap();
/// ```
pub struct SensorPipeline {
    shared: Arc<PipelineShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SensorPipeline {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PipelineShared {
                control: Mutex::new(ControlState {
                    got_vsync: false,
                    current: None,
                    in_capture: false,
                }),
                vsync: Condvar::new(),
                quiesce: Condvar::new(),
                exit: AtomicBool::new(false),
                flushing: AtomicBool::new(false),
                running: AtomicBool::new(false),
                counters: Arc::new(Counters::default()),
                stages: PipelineStageMetrics::default(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Validate the characteristics and spawn the capture worker.
    ///
    /// Fails fast on structurally invalid characteristics (zero
    /// resolution, inverted ranges) before any thread starts.
    pub fn start_up(
        &self,
        logical_camera_id: u32,
        chars: LogicalCharacteristics,
        mut scene: Box<dyn Scene>,
    ) -> Result<(), SensorError> {
        if self.shared.running.load(Ordering::Acquire) {
            return Err(SensorError::LifecycleMisuse("start_up while running"));
        }
        if chars.is_empty() {
            return Err(SensorError::InvalidArgument("empty characteristics map"));
        }
        if !chars.contains_key(&logical_camera_id) {
            return Err(SensorError::InvalidArgument(
                "logical camera id missing from characteristics",
            ));
        }
        for entry in chars.values() {
            if !validator::are_characteristics_supported(entry) {
                return Err(SensorError::InvalidArgument(
                    "structurally invalid sensor characteristics",
                ));
            }
        }

        let engines: HashMap<u32, SynthesisEngine> = chars
            .iter()
            .map(|(id, entry)| (*id, SynthesisEngine::new(entry)))
            .collect();
        let logical = &chars[&logical_camera_id];
        scene.initialize(logical.full_res_width, logical.full_res_height);

        self.shared.exit.store(false, Ordering::Release);
        self.shared.flushing.store(false, Ordering::Release);
        let shared = self.shared.clone();
        let sensor_height = logical.height;
        let handle = std::thread::Builder::new()
            .name(format!("argus-sensor-{logical_camera_id}"))
            .spawn(move || {
                worker_loop(shared, logical_camera_id, sensor_height, engines, scene);
            })
            .map_err(|err| SensorError::PipelineFailure(format!("worker spawn failed: {err}")))?;
        *self.worker.lock() = Some(handle);
        self.shared.running.store(true, Ordering::Release);
        debug!(logical_camera_id, "sensor pipeline running");
        Ok(())
    }

    /// Signal the worker to exit after any in-flight readout, join it,
    /// and fail any buffers still owned by the pipeline.
    pub fn shut_down(&self) -> Result<(), SensorError> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(SensorError::LifecycleMisuse("shut_down while stopped"));
        }
        self.shared.exit.store(true, Ordering::Release);
        if let Some(handle) = self.worker.lock().take() {
            handle
                .join()
                .map_err(|_| SensorError::PipelineFailure("worker panicked".into()))?;
        }
        // The worker drains on exit; sweep anything committed after it
        // observed the exit flag.
        if let Some(request) = self.shared.control.lock().current.take() {
            fail_request(request, &self.shared.counters);
        }
        self.shared.running.store(false, Ordering::Release);
        debug!("sensor pipeline stopped");
        Ok(())
    }

    /// Commit the next frame's settings, result skeletons, and buffer
    /// sets. The pipeline owns the buffers from this point until it
    /// hands them to the result callback.
    pub fn set_current_request(&self, request: FrameRequest) -> Result<(), SensorError> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(SensorError::LifecycleMisuse(
                "set_current_request while stopped",
            ));
        }
        let replaced = {
            let mut control = self.shared.control.lock();
            control.current.replace(request)
        };
        if let Some(stale) = replaced {
            // A request was overwritten before the worker picked it up;
            // its buffers must still be returned.
            warn!(
                frame_number = stale.result.frame_number,
                "request replaced before capture, failing it"
            );
            fail_request(stale, &self.shared.counters);
        }
        Ok(())
    }

    /// Block until the next configure phase signals vertical sync, or
    /// `timeout` elapses. Pulses are not buffered: a waiter that misses
    /// one waits for the next.
    pub fn wait_for_vsync(&self, timeout: Duration) -> bool {
        if !self.shared.running.load(Ordering::Acquire) {
            return false;
        }
        let deadline = Instant::now() + timeout;
        let mut control = self.shared.control.lock();
        control.got_vsync = false;
        while !control.got_vsync {
            if self
                .shared
                .vsync
                .wait_until(&mut control, deadline)
                .timed_out()
            {
                return control.got_vsync;
            }
        }
        true
    }

    /// Drain every buffer the pipeline currently owns with failure
    /// notifications, skip synthesis for the in-flight cycle, and
    /// return once the worker is quiescent. The worker itself survives.
    pub fn flush(&self) -> Result<(), SensorError> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(SensorError::LifecycleMisuse("flush while stopped"));
        }
        self.shared.flushing.store(true, Ordering::Release);
        let pending = self.shared.control.lock().current.take();
        if let Some(request) = pending {
            fail_request(request, &self.shared.counters);
        }

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut control = self.shared.control.lock();
        while control.in_capture {
            if self
                .shared
                .quiesce
                .wait_until(&mut control, deadline)
                .timed_out()
            {
                self.shared.flushing.store(false, Ordering::Release);
                return Err(SensorError::FlushFailure(
                    "capture did not reach a quiescent point".into(),
                ));
            }
        }
        drop(control);
        self.shared.flushing.store(false, Ordering::Release);
        Ok(())
    }

    /// Whether the pipeline is in its `Running` state.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Shared event counters.
    pub fn counters(&self) -> Arc<Counters> {
        self.shared.counters.clone()
    }

    /// Per-stage timing metrics.
    pub fn stage_metrics(&self) -> PipelineStageMetrics {
        self.shared.stages.clone()
    }
}

impl Default for SensorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SensorPipeline {
    fn drop(&mut self) {
        // Best-effort teardown if the owner forgot to shut down.
        if self.is_running() {
            let _ = self.shut_down();
        }
    }
}

fn fail_request(request: FrameRequest, counters: &Counters) {
    request.callback.notify(NotifyMessage::Error {
        frame_number: request.result.frame_number,
        pipeline_id: request.result.pipeline_id,
        kind: NotifyErrorKind::Request,
    });
    counters.frame_failed();
    // Dropping the request returns its pooled buffers.
}

fn now_ns(source: TimestampSource, epoch: Instant) -> u64 {
    match source {
        TimestampSource::Unknown => epoch.elapsed().as_nanos().min(u64::MAX as u128) as u64,
        TimestampSource::Realtime => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
            .min(u64::MAX as u128) as u64,
    }
}

fn worker_loop(
    shared: Arc<PipelineShared>,
    camera_id: u32,
    sensor_height: u32,
    engines: HashMap<u32, SynthesisEngine>,
    scene: Box<dyn Scene>,
) {
    let epoch = Instant::now();
    loop {
        if shared.exit.load(Ordering::Acquire) {
            break;
        }
        let cycle_start = Instant::now();

        // Configure: swap in the committed request and pulse vsync.
        let request = {
            let mut control = shared.control.lock();
            control.got_vsync = true;
            shared.vsync.notify_all();
            let request = control.current.take();
            if request.is_some() {
                control.in_capture = true;
            }
            request
        };
        shared.counters.vsync_pulse();

        let settings = request
            .as_ref()
            .and_then(|r| r.settings.get(&camera_id).cloned())
            .unwrap_or_default();
        let frame_duration_ns = if request.is_some() {
            settings.frame_duration
        } else {
            IDLE_FRAME_DURATION_NS
        };
        let capture_timestamp_ns = now_ns(settings.timestamp_source, epoch);
        // Rows read out at sequentially offset times; the last row
        // completes one row-readout interval per row after exposure.
        let row_readout_ns = frame_duration_ns / u64::from(sensor_height.max(1));
        let readout_timestamp_ns = capture_timestamp_ns
            + settings.exposure_time
            + row_readout_ns * u64::from(sensor_height);
        shared.stages.configure.record(cycle_start.elapsed());

        if let Some(mut request) = request {
            if shared.flushing.load(Ordering::Acquire) {
                fail_request(request, &shared.counters);
            } else {
                let capture_start = Instant::now();
                request.callback.notify(NotifyMessage::Shutter {
                    frame_number: request.result.frame_number,
                    timestamp_ns: capture_timestamp_ns,
                    readout_timestamp_ns,
                });

                let engine = engines.get(&camera_id);
                let frame_number = request.result.frame_number;
                let (inputs, outputs) = (&request.input_buffers, &mut request.output_buffers);
                if let Some(engine) = engine {
                    for buffer in outputs.iter_mut() {
                        synthesize_buffer(
                            engine,
                            scene.as_ref(),
                            &settings,
                            &request.binning,
                            inputs,
                            buffer,
                            frame_number,
                            &request.callback,
                        );
                    }
                }
                shared.stages.capture.record(capture_start.elapsed());

                // Readout: hand the buffers and metadata to the callback.
                let readout_start = Instant::now();
                if let Some(engine) = engine {
                    finish_request(request, engine, &settings, capture_timestamp_ns);
                    shared.counters.frame_synthesized();
                } else {
                    fail_request(request, &shared.counters);
                }
                shared.stages.readout.record(readout_start.elapsed());
            }
            let mut control = shared.control.lock();
            control.in_capture = false;
            shared.quiesce.notify_all();
        }

        // Honor the frame duration against the monotonic clock, in
        // slices so shutdown is not delayed by slow frames.
        let frame_duration = Duration::from_nanos(frame_duration_ns);
        while cycle_start.elapsed() < frame_duration {
            if shared.exit.load(Ordering::Acquire) {
                break;
            }
            let remaining = frame_duration.saturating_sub(cycle_start.elapsed());
            std::thread::sleep(remaining.min(SLEEP_SLICE));
        }
    }

    // Exit path: nothing may be dropped silently.
    if let Some(request) = shared.control.lock().current.take() {
        fail_request(request, &shared.counters);
    }
}

#[allow(clippy::too_many_arguments)]
fn synthesize_buffer(
    engine: &SynthesisEngine,
    scene: &dyn Scene,
    settings: &SensorSettings,
    binning: &SensorBinningFactorInfo,
    inputs: &Buffers,
    buffer: &mut SensorBuffer,
    frame_number: u32,
    callback: &PipelineCallback,
) {
    // Identical frame numbers and stream ids reproduce identical noise.
    let seed = (u64::from(frame_number) << 20) | u64::from(buffer.stream_id);
    let width = buffer.resolution.width.get();
    let height = buffer.resolution.height.get();
    let stride = buffer.stride(0);
    let chroma_stride = buffer.stride(1);
    let format = buffer.format;
    let color_space = buffer.color_space;
    let dynamic_range = buffer.dynamic_range;
    let pipeline_id = buffer.pipeline_id;
    let stream_id = buffer.stream_id;

    let filled = match format {
        PixelFormat::Raw16 => {
            let mode = if binning.quad_bayer_sensor && !binning.max_res_request {
                RawMode::Binned
            } else if binning.raw_in_sensor_zoom_applied {
                RawMode::InSensorZoom
            } else {
                RawMode::FullRes
            };
            let remosaic = binning.quad_bayer_sensor && binning.max_res_request;
            match buffer.planes_mut().into_iter().next() {
                Some(plane) => {
                    engine.capture_raw(
                        scene, settings, plane, width, height, stride, mode, remosaic, seed,
                    );
                    true
                }
                None => false,
            }
        }
        PixelFormat::Yuv420 => {
            let reprocess_source = inputs
                .iter()
                .find(|input| input.format == PixelFormat::Yuv420);
            let mut planes = buffer.planes_mut().into_iter();
            match (planes.next(), planes.next(), planes.next()) {
                (Some(y), Some(u), Some(v)) => {
                    let out = YuvPlanesMut {
                        y,
                        u,
                        v,
                        y_stride: stride,
                        c_stride: chroma_stride,
                    };
                    if let Some(input) = reprocess_source {
                        let input_planes = input.planes();
                        let input_view = YuvPlanesRef {
                            y: input_planes[0],
                            u: input_planes[1],
                            v: input_planes[2],
                            y_stride: input.stride(0),
                            c_stride: input.stride(1),
                        };
                        engine.reprocess_yuv420(
                            input_view,
                            input.resolution.width.get(),
                            input.resolution.height.get(),
                            out,
                            width,
                            height,
                            settings.zoom_ratio,
                            settings.rotate_and_crop
                                == argus_core::settings::RotateAndCrop::Rotate90,
                        );
                    } else {
                        let mode = match settings.edge_mode {
                            argus_core::settings::EdgeMode::HighQuality => ProcessMode::HighQuality,
                            _ => ProcessMode::Regular,
                        };
                        engine.capture_yuv420(
                            scene,
                            settings,
                            out,
                            width,
                            height,
                            mode,
                            color_space,
                            dynamic_range,
                            seed,
                        );
                    }
                    true
                }
                _ => false,
            }
        }
        PixelFormat::Rgb888 | PixelFormat::Rgba8888 | PixelFormat::Argb8888 => {
            let layout = match format {
                PixelFormat::Rgb888 => RgbLayout::Rgb,
                PixelFormat::Rgba8888 => RgbLayout::Rgba,
                _ => RgbLayout::Argb,
            };
            match buffer.planes_mut().into_iter().next() {
                Some(plane) => {
                    engine.capture_rgb(
                        scene,
                        settings,
                        plane,
                        width,
                        height,
                        stride,
                        layout,
                        color_space,
                        dynamic_range,
                        seed,
                    );
                    true
                }
                None => false,
            }
        }
        PixelFormat::Depth16 => match buffer.planes_mut().into_iter().next() {
            Some(plane) => {
                engine.capture_depth(scene, settings, plane, width, height, stride, seed);
                true
            }
            None => false,
        },
        PixelFormat::Blob | PixelFormat::ImplementationDefined => {
            // Unresolved formats degrade to packed RGB content so the
            // frame is still produced.
            warn!(?format, stream_id, "unresolved output format, filling packed RGB");
            match buffer.planes_mut().into_iter().next() {
                Some(plane) => {
                    engine.capture_rgb(
                        scene,
                        settings,
                        plane,
                        width,
                        height,
                        stride,
                        RgbLayout::Rgb,
                        color_space,
                        dynamic_range,
                        seed,
                    );
                    true
                }
                None => false,
            }
        }
    };

    if !filled {
        callback.notify(NotifyMessage::Error {
            frame_number,
            pipeline_id,
            kind: NotifyErrorKind::Buffer { stream_id },
        });
    }
}

fn finish_request(
    mut request: FrameRequest,
    engine: &SynthesisEngine,
    settings: &SensorSettings,
    timestamp_ns: u64,
) {
    let metadata = build_metadata(engine, settings, timestamp_ns);

    if let Some(mut partial) = request.partial_result.take() {
        partial.metadata.timestamp_ns = Some(timestamp_ns);
        partial.partial_result_count = 1;
        request.result.partial_result_count = 2;
        request.callback.process_result(partial);
    }

    let mut result = request.result;
    result.metadata = metadata;
    result.output_buffers = std::mem::take(&mut request.output_buffers);
    result.input_buffers = std::mem::take(&mut request.input_buffers);
    request.callback.process_result(result);
}

fn build_metadata(
    engine: &SynthesisEngine,
    settings: &SensorSettings,
    timestamp_ns: u64,
) -> crate::callback::ResultMetadata {
    let mut metadata = crate::callback::ResultMetadata {
        timestamp_ns: Some(timestamp_ns),
        exposure_time: Some(settings.exposure_time),
        frame_duration: Some(settings.frame_duration),
        gain: Some(settings.gain),
        zoom_ratio: Some(settings.zoom_ratio),
        ..Default::default()
    };
    if settings.report_rotate_and_crop {
        metadata.rotate_and_crop = Some(settings.rotate_and_crop);
    }
    if settings.report_video_stabilization {
        metadata.video_stabilization = Some(settings.video_stabilization);
    }
    if settings.report_edge_mode {
        metadata.edge_mode = Some(settings.edge_mode);
    }
    if settings.report_neutral_color_point {
        metadata.neutral_color_point = Some(NEUTRAL_COLOR_POINT);
    }
    if settings.report_green_split {
        metadata.green_split = Some(GREEN_SPLIT);
    }
    if settings.report_noise_profile {
        metadata.noise_profile = Some(engine.noise_profile(settings.gain));
    }
    metadata
}

/// Pick the raw readout hints for a stream configuration. Exposed for
/// the request controller, which caches one per pipeline.
pub fn derive_binning_info(
    quad_bayer_sensor: bool,
    has_raw_stream: bool,
    has_non_raw_stream: bool,
    has_cropped_raw_stream: bool,
    settings: &SensorSettings,
) -> SensorBinningFactorInfo {
    let max_res_request = settings.sensor_pixel_mode == SensorPixelMode::MaximumResolution;
    SensorBinningFactorInfo {
        has_raw_stream,
        has_non_raw_stream,
        quad_bayer_sensor,
        max_res_request,
        has_cropped_raw_stream,
        raw_in_sensor_zoom_applied: has_cropped_raw_stream && settings.zoom_ratio > 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::prelude::SensorCharacteristics;
    use argus_synth::prelude::TestScene;
    use std::collections::HashMap;

    fn running_pipeline() -> SensorPipeline {
        let pipeline = SensorPipeline::new();
        let chars = HashMap::from([(0, SensorCharacteristics::default_emulated())]);
        pipeline
            .start_up(0, chars, Box::new(TestScene::new()))
            .unwrap();
        pipeline
    }

    #[test]
    fn lifecycle_misuse_is_rejected() {
        let pipeline = SensorPipeline::new();
        assert!(matches!(
            pipeline.shut_down(),
            Err(SensorError::LifecycleMisuse(_))
        ));
        assert!(matches!(
            pipeline.flush(),
            Err(SensorError::LifecycleMisuse(_))
        ));
        assert!(!pipeline.wait_for_vsync(Duration::from_millis(1)));

        let pipeline = running_pipeline();
        assert!(matches!(
            pipeline.start_up(
                0,
                HashMap::from([(0, SensorCharacteristics::default_emulated())]),
                Box::new(TestScene::new()),
            ),
            Err(SensorError::LifecycleMisuse(_))
        ));
        pipeline.shut_down().unwrap();
    }

    #[test]
    fn start_up_rejects_invalid_characteristics() {
        let pipeline = SensorPipeline::new();
        let mut chars = SensorCharacteristics::default_emulated();
        chars.width = 0;
        let result = pipeline.start_up(0, HashMap::from([(0, chars)]), Box::new(TestScene::new()));
        assert!(matches!(result, Err(SensorError::InvalidArgument(_))));
        assert!(!pipeline.is_running());
    }

    #[test]
    fn vsync_pulses_while_idle() {
        let pipeline = running_pipeline();
        // Several consecutive waits must all observe a pulse.
        for _ in 0..3 {
            assert!(pipeline.wait_for_vsync(Duration::from_millis(500)));
        }
        pipeline.shut_down().unwrap();
    }

    #[test]
    fn vsync_times_out_when_stopped_mid_wait() {
        let pipeline = running_pipeline();
        pipeline.shut_down().unwrap();
        assert!(!pipeline.wait_for_vsync(Duration::from_millis(50)));
    }
}
