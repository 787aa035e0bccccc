//! Request queue and settings-override controller.
//!
//! Submission is thread-safe and non-blocking: requests are enqueued
//! under the state lock and a dedicated dispatch thread commits them to
//! the sensor pipeline, one per vertical sync. Short-lived overrides
//! (the zoom ramp) are resolved just before commit and discarded after
//! one use.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use argus_core::prelude::{
    BufferPool, Buffers, LogicalCameraSettings, LogicalCharacteristics, RequestTemplate,
    SensorBuffer, SensorError, SensorSettings, StreamSpec,
};

use crate::callback::{NotifyErrorKind, NotifyMessage, PipelineCallback, PipelineResult};
use crate::pipeline::{FrameRequest, SensorBinningFactorInfo, SensorPipeline, derive_binning_info};
use crate::tunables::controller_tunables;
use crate::validator::{self, StreamConfiguration, StreamInfo};

/// One per-pipeline capture request for a frame.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub pipeline_id: u32,
    /// `None` repeats the previous frame's settings (partial-settings
    /// semantics).
    pub settings: Option<SensorSettings>,
    pub output_stream_ids: Vec<u32>,
    pub input_stream_ids: Vec<u32>,
}

/// Static description of one configured pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub id: u32,
    pub callback: PipelineCallback,
    pub streams: Vec<StreamInfo>,
    pub physical_camera_id: Option<u32>,
}

struct PendingRequest {
    frame_number: u32,
    pipeline_id: u32,
    callback: PipelineCallback,
    settings: LogicalCameraSettings,
    input_buffers: Buffers,
    output_buffers: Buffers,
    binning: SensorBinningFactorInfo,
}

struct OverrideRequest {
    frame_number: u32,
    zoom_ratio: f32,
}

#[derive(Clone, Copy, Default)]
struct StreamShape {
    has_raw: bool,
    has_non_raw: bool,
    has_cropped_raw: bool,
}

struct ProcessorState {
    chars: Option<Arc<LogicalCharacteristics>>,
    pending: VecDeque<PendingRequest>,
    overrides: VecDeque<OverrideRequest>,
    last_settings: Option<SensorSettings>,
    stream_shapes: HashMap<u32, StreamShape>,
}

struct ProcessorShared {
    camera_id: u32,
    sensor: Arc<SensorPipeline>,
    state: Mutex<ProcessorState>,
    wake: Condvar,
    done: AtomicBool,
    pool: BufferPool,
}

/// The single point of entry for capture requests.
///
/// # Example
/// ```rust,no_run
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use argus::prelude::*;
///
/// let sensor = Arc::new(SensorPipeline::new());
/// let chars = HashMap::from([(0, SensorCharacteristics::default_emulated())]);
/// sensor.start_up(0, chars.clone(), Box::new(TestScene::new())).unwrap();
///
/// let processor = RequestProcessor::new(0, sensor.clone());
/// processor.initialize(chars).unwrap();
/// let defaults = processor.get_default_request(RequestTemplate::Preview).unwrap();
/// assert_eq!(defaults.gain, 100);
/// ```
pub struct RequestProcessor {
    shared: Arc<ProcessorShared>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl RequestProcessor {
    /// Create the controller and spawn its dispatch thread.
    pub fn new(camera_id: u32, sensor: Arc<SensorPipeline>) -> Self {
        let tunables = controller_tunables();
        let shared = Arc::new(ProcessorShared {
            camera_id,
            sensor,
            state: Mutex::new(ProcessorState {
                chars: None,
                pending: VecDeque::new(),
                overrides: VecDeque::new(),
                last_settings: None,
                stream_shapes: HashMap::new(),
            }),
            wake: Condvar::new(),
            done: AtomicBool::new(false),
            pool: BufferPool::with_limits(
                tunables.pool_min,
                tunables.pool_bytes,
                tunables.pool_min + tunables.pool_spare,
            ),
        });
        let dispatch_shared = shared.clone();
        let dispatch = std::thread::Builder::new()
            .name(format!("argus-dispatch-{camera_id}"))
            .spawn(move || dispatch_loop(dispatch_shared))
            .ok();
        Self {
            shared,
            dispatch: Mutex::new(dispatch),
        }
    }

    /// Record the sensor characteristics this controller serves.
    pub fn initialize(&self, chars: LogicalCharacteristics) -> Result<(), SensorError> {
        if !chars.contains_key(&self.shared.camera_id) {
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
        self.shared.state.lock().chars = Some(Arc::new(chars));
        Ok(())
    }

    /// Default settings for a request template, clamped to the sensor's
    /// supported ranges.
    pub fn get_default_request(
        &self,
        template: RequestTemplate,
    ) -> Result<SensorSettings, SensorError> {
        let state = self.shared.state.lock();
        let chars_map = state
            .chars
            .as_ref()
            .ok_or(SensorError::LifecycleMisuse("processor not initialized"))?;
        let chars = chars_map
            .get(&self.shared.camera_id)
            .ok_or(SensorError::InvalidArgument("unknown logical camera id"))?;

        let mut settings = SensorSettings::default();
        match template {
            RequestTemplate::Preview | RequestTemplate::ZeroShutterLag => {}
            RequestTemplate::StillCapture => {
                settings.exposure_time = 20_000_000;
                settings.frame_duration = 40_000_000;
            }
            RequestTemplate::VideoRecord | RequestTemplate::VideoSnapshot => {
                settings.frame_duration = 33_333_333;
            }
            RequestTemplate::Manual => {
                settings.gain = chars.sensitivity_range[0];
            }
        }
        Ok(settings.clamped_to(chars))
    }

    /// Submit one frame's worth of per-pipeline requests.
    ///
    /// Validation failures are returned synchronously and nothing is
    /// queued; on success the dispatch thread is signaled and the call
    /// returns without blocking on the pipeline.
    pub fn process_pipeline_requests(
        &self,
        frame_number: u32,
        requests: Vec<PipelineRequest>,
        pipelines: &[PipelineConfig],
    ) -> Result<(), SensorError> {
        if self.shared.done.load(Ordering::Acquire) {
            return Err(SensorError::LifecycleMisuse("processor is shut down"));
        }
        if requests.is_empty() {
            return Err(SensorError::InvalidArgument("empty request batch"));
        }

        let tunables = controller_tunables();
        let mut state = self.shared.state.lock();
        let chars_map = state
            .chars
            .clone()
            .ok_or(SensorError::LifecycleMisuse("processor not initialized"))?;
        let chars = chars_map
            .get(&self.shared.camera_id)
            .ok_or(SensorError::InvalidArgument("unknown logical camera id"))?;

        // Validate the whole batch before committing any of it.
        let mut prepared = Vec::with_capacity(requests.len());
        for request in &requests {
            let config = pipelines
                .iter()
                .find(|p| p.id == request.pipeline_id)
                .ok_or(SensorError::InvalidArgument("unknown pipeline id"))?;
            let combination = StreamConfiguration {
                streams: config.streams.clone(),
            };
            let max_res = request
                .settings
                .as_ref()
                .map(|s| {
                    s.sensor_pixel_mode
                        == argus_core::settings::SensorPixelMode::MaximumResolution
                })
                .unwrap_or(false);
            if !validator::is_stream_combination_supported(
                &combination,
                &chars_map,
                self.shared.camera_id,
                max_res,
            ) {
                return Err(SensorError::UnsupportedConfiguration(format!(
                    "stream combination rejected for pipeline {}",
                    request.pipeline_id
                )));
            }
            for stream_id in request
                .output_stream_ids
                .iter()
                .chain(request.input_stream_ids.iter())
            {
                if !config.streams.iter().any(|s| s.id == *stream_id) {
                    return Err(SensorError::InvalidArgument("unresolvable stream id"));
                }
            }
            prepared.push(config);
        }

        for (request, config) in requests.iter().zip(prepared) {
            // Partial settings: omitted fields repeat the prior frame.
            let effective = request
                .settings
                .clone()
                .or_else(|| state.last_settings.clone())
                .unwrap_or_default()
                .clamped_to(chars);

            let prior_zoom = state
                .last_settings
                .as_ref()
                .map(|s| s.zoom_ratio)
                .unwrap_or(1.0);
            if (effective.zoom_ratio - prior_zoom).abs() > f32::EPSILON {
                let frames = tunables.zoom_ramp_frames.max(1);
                // Replace the discontinuous jump with a ramp: the
                // change's own frame and the following frames step
                // through interpolated values; the final ramp frame
                // reaches the target through its own settings.
                for step in 0..frames.saturating_sub(1) {
                    let fraction = (step + 1) as f32 / frames as f32;
                    let zoom_ratio = tunables.zoom_ramp_curve.interpolate(
                        prior_zoom,
                        effective.zoom_ratio,
                        fraction,
                    );
                    state.overrides.push_back(OverrideRequest {
                        frame_number: frame_number + step,
                        zoom_ratio,
                    });
                }
                debug!(
                    from = prior_zoom,
                    to = effective.zoom_ratio,
                    frames,
                    "zoom ramp scheduled"
                );
            }

            let shape = stream_shape(&mut state.stream_shapes, config, chars.width, chars.height);
            let binning = derive_binning_info(
                chars.quad_bayer,
                shape.has_raw,
                shape.has_non_raw,
                shape.has_cropped_raw,
                &effective,
            );

            let allocate = |stream_id: u32| -> Option<SensorBuffer> {
                let stream = config.streams.iter().find(|s| s.id == stream_id)?;
                let format = validator::override_format(stream.format, stream.dynamic_range);
                Some(SensorBuffer::allocate(
                    &self.shared.pool,
                    StreamSpec {
                        stream_id: stream.id,
                        format,
                        resolution: stream.resolution,
                        color_space: stream.color_space,
                        dynamic_range: stream.dynamic_range,
                        is_input: stream.is_input,
                    },
                    frame_number,
                    config.id,
                ))
            };
            let output_buffers: Buffers = request
                .output_stream_ids
                .iter()
                .filter_map(|id| allocate(*id))
                .collect();
            let input_buffers: Buffers = request
                .input_stream_ids
                .iter()
                .filter_map(|id| allocate(*id))
                .collect();

            let mut settings = LogicalCameraSettings::new();
            settings.insert(self.shared.camera_id, effective.clone());
            if let Some(physical_id) = config.physical_camera_id {
                settings.insert(physical_id, effective.clone());
            }

            state.last_settings = Some(effective);
            state.pending.push_back(PendingRequest {
                frame_number,
                pipeline_id: config.id,
                callback: config.callback.clone(),
                settings,
                input_buffers,
                output_buffers,
                binning,
            });
        }

        drop(state);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Drain pending and override entries; every drained request gets a
    /// failure notification instead of a result, then the sensor
    /// pipeline itself is flushed.
    pub fn flush(&self) -> Result<(), SensorError> {
        let drained: Vec<PendingRequest> = {
            let mut state = self.shared.state.lock();
            state.overrides.clear();
            state.pending.drain(..).collect()
        };
        for request in drained {
            notify_failed_request(&request);
            self.shared.sensor.counters().request_flushed();
        }
        self.shared.sensor.flush()
    }

    /// Stop the dispatch thread after failing anything still queued.
    pub fn shut_down(&self) {
        let drained: Vec<PendingRequest> = {
            let mut state = self.shared.state.lock();
            state.overrides.clear();
            state.pending.drain(..).collect()
        };
        for request in drained {
            notify_failed_request(&request);
        }
        self.shared.done.store(true, Ordering::Release);
        self.shared.wake.notify_all();
        if let Some(handle) = self.dispatch.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RequestProcessor {
    fn drop(&mut self) {
        self.shut_down();
    }
}

fn notify_failed_request(request: &PendingRequest) {
    request.callback.notify(NotifyMessage::Error {
        frame_number: request.frame_number,
        pipeline_id: request.pipeline_id,
        kind: NotifyErrorKind::Request,
    });
}

fn stream_shape(
    cache: &mut HashMap<u32, StreamShape>,
    config: &PipelineConfig,
    sensor_width: u32,
    sensor_height: u32,
) -> StreamShape {
    *cache.entry(config.id).or_insert_with(|| {
        let mut shape = StreamShape::default();
        for stream in &config.streams {
            if stream.is_input {
                continue;
            }
            if stream.format.is_raw() {
                shape.has_raw = true;
                if stream.resolution.width.get() < sensor_width
                    || stream.resolution.height.get() < sensor_height
                {
                    shape.has_cropped_raw = true;
                }
            } else {
                shape.has_non_raw = true;
            }
        }
        shape
    })
}

fn dispatch_loop(shared: Arc<ProcessorShared>) {
    let tunables = controller_tunables();
    let vsync_timeout = Duration::from_millis(tunables.dispatch_vsync_timeout_ms);
    loop {
        {
            let mut state = shared.state.lock();
            while state.pending.is_empty() && !shared.done.load(Ordering::Acquire) {
                shared.wake.wait(&mut state);
            }
            if shared.done.load(Ordering::Acquire) {
                break;
            }
        }

        // Commit on the pipeline's cadence so a frame is never
        // overwritten before the worker picks it up. The request stays
        // queued through the wait so a concurrent flush can claim it.
        if !shared.sensor.wait_for_vsync(vsync_timeout) {
            warn!("no vertical sync before dispatch, committing anyway");
        }

        let request = {
            let mut state = shared.state.lock();
            let Some(mut request) = state.pending.pop_front() else {
                // Drained by a flush while waiting for vsync.
                continue;
            };

            // Merge any override for this frame into a copy of the
            // settings; entries for frames already dispatched are stale.
            while let Some(head) = state.overrides.front() {
                if head.frame_number < request.frame_number {
                    state.overrides.pop_front();
                } else {
                    break;
                }
            }
            if let Some(head) = state.overrides.front() {
                if head.frame_number == request.frame_number {
                    let zoom_ratio = head.zoom_ratio;
                    for settings in request.settings.values_mut() {
                        settings.zoom_ratio = zoom_ratio;
                    }
                    state.overrides.pop_front();
                    debug!(
                        frame_number = request.frame_number,
                        zoom_ratio, "zoom override applied"
                    );
                }
            }
            request
        };

        let partial_wanted = request
            .settings
            .get(&shared.camera_id)
            .map(|s| {
                s.report_noise_profile || s.report_neutral_color_point || s.report_green_split
            })
            .unwrap_or(false);
        let mut result =
            PipelineResult::prototype(shared.camera_id, request.pipeline_id, request.frame_number);
        let partial_result = partial_wanted.then(|| {
            result.partial_result_count = 2;
            PipelineResult::prototype(shared.camera_id, request.pipeline_id, request.frame_number)
        });

        let frame = FrameRequest {
            settings: request.settings,
            result,
            partial_result,
            callback: request.callback.clone(),
            input_buffers: request.input_buffers,
            output_buffers: request.output_buffers,
            binning: request.binning,
        };
        if let Err(err) = shared.sensor.set_current_request(frame) {
            warn!(%err, frame_number = request.frame_number, "commit failed");
            request.callback.notify(NotifyMessage::Error {
                frame_number: request.frame_number,
                pipeline_id: request.pipeline_id,
                kind: NotifyErrorKind::Request,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::queue_callback;
    use argus_core::prelude::{
        ColorSpaceProfile, DynamicRangeProfile, PixelFormat, RecvOutcome, Resolution,
        SensorCharacteristics,
    };
    use argus_synth::prelude::TestScene;
    use std::collections::HashMap;

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

    fn start_stack() -> (Arc<SensorPipeline>, RequestProcessor, LogicalCharacteristics) {
        let chars = HashMap::from([(0, SensorCharacteristics::default_emulated())]);
        let sensor = Arc::new(SensorPipeline::new());
        sensor
            .start_up(0, chars.clone(), Box::new(TestScene::new()))
            .unwrap();
        let processor = RequestProcessor::new(0, sensor.clone());
        processor.initialize(chars.clone()).unwrap();
        (sensor, processor, chars)
    }

    fn request(pipeline_id: u32, settings: SensorSettings, outputs: Vec<u32>) -> PipelineRequest {
        PipelineRequest {
            pipeline_id,
            settings: Some(settings),
            output_stream_ids: outputs,
            input_stream_ids: Vec::new(),
        }
    }

    #[test]
    fn rejects_misuse_before_initialize() {
        let sensor = Arc::new(SensorPipeline::new());
        let processor = RequestProcessor::new(0, sensor);
        assert!(matches!(
            processor.get_default_request(RequestTemplate::Preview),
            Err(SensorError::LifecycleMisuse(_))
        ));
        let err = processor
            .process_pipeline_requests(
                0,
                vec![request(0, SensorSettings::default(), vec![0])],
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, SensorError::LifecycleMisuse(_)));
    }

    #[test]
    fn rejects_invalid_batches_synchronously() {
        let (sensor, processor, _) = start_stack();
        let (callback, _results, _notifications) = queue_callback(4);
        let config = PipelineConfig {
            id: 0,
            callback,
            streams: vec![stream(0, PixelFormat::Yuv420, 320, 240)],
            physical_camera_id: None,
        };

        assert!(matches!(
            processor.process_pipeline_requests(0, Vec::new(), &[config.clone()]),
            Err(SensorError::InvalidArgument(_))
        ));
        assert!(matches!(
            processor.process_pipeline_requests(
                0,
                vec![request(9, SensorSettings::default(), vec![0])],
                &[config.clone()],
            ),
            Err(SensorError::InvalidArgument(_))
        ));
        assert!(matches!(
            processor.process_pipeline_requests(
                0,
                vec![request(0, SensorSettings::default(), vec![7])],
                &[config.clone()],
            ),
            Err(SensorError::InvalidArgument(_))
        ));

        let two_raw = PipelineConfig {
            id: 1,
            callback: config.callback.clone(),
            streams: vec![
                stream(0, PixelFormat::Raw16, 1920, 1080),
                stream(1, PixelFormat::Raw16, 1920, 1080),
            ],
            physical_camera_id: None,
        };
        assert!(matches!(
            processor.process_pipeline_requests(
                0,
                vec![request(1, SensorSettings::default(), vec![0, 1])],
                &[two_raw],
            ),
            Err(SensorError::UnsupportedConfiguration(_))
        ));

        processor.shut_down();
        sensor.shut_down().unwrap();
    }

    #[test]
    fn default_request_templates_differ() {
        let (sensor, processor, chars) = start_stack();
        let preview = processor
            .get_default_request(RequestTemplate::Preview)
            .unwrap();
        let still = processor
            .get_default_request(RequestTemplate::StillCapture)
            .unwrap();
        let manual = processor
            .get_default_request(RequestTemplate::Manual)
            .unwrap();
        assert!(still.exposure_time >= preview.exposure_time);
        assert_eq!(manual.gain, chars[&0].sensitivity_range[0]);
        for settings in [&preview, &still, &manual] {
            assert!(settings.exposure_time >= chars[&0].exposure_time_range[0]);
            assert!(settings.frame_duration <= chars[&0].frame_duration_range[1]);
        }
        processor.shut_down();
        sensor.shut_down().unwrap();
    }

    #[test]
    fn end_to_end_four_stream_capture() {
        let (sensor, processor, _) = start_stack();
        let (callback, results, notifications) = queue_callback(32);
        let config = PipelineConfig {
            id: 0,
            callback,
            streams: vec![
                stream(0, PixelFormat::Raw16, 1920, 1080),
                stream(1, PixelFormat::Yuv420, 1280, 720),
                stream(2, PixelFormat::Rgb888, 640, 480),
                stream(3, PixelFormat::Depth16, 640, 480),
            ],
            physical_camera_id: None,
        };
        processor
            .process_pipeline_requests(
                7,
                vec![request(0, SensorSettings::default(), vec![0, 1, 2, 3])],
                &[config],
            )
            .unwrap();

        let result = match results.recv_timeout(Duration::from_secs(10)) {
            RecvOutcome::Data(result) => result,
            other => panic!("expected a result, got {other:?}"),
        };
        assert_eq!(result.frame_number, 7);
        assert_eq!(result.pipeline_id, 0);
        assert_eq!(result.output_buffers.len(), 4);
        for buffer in &result.output_buffers {
            match buffer.stream_id {
                0 => {
                    assert_eq!(buffer.format, PixelFormat::Raw16);
                    assert_eq!(buffer.resolution, Resolution::new(1920, 1080).unwrap());
                    assert_eq!(buffer.planes()[0].len(), 1920 * 1080 * 2);
                }
                1 => {
                    assert_eq!(buffer.format, PixelFormat::Yuv420);
                    assert_eq!(buffer.planes().len(), 3);
                }
                2 => assert_eq!(buffer.planes()[0].len(), 640 * 480 * 3),
                3 => assert_eq!(buffer.planes()[0].len(), 640 * 480 * 2),
                other => panic!("unexpected stream id {other}"),
            }
        }
        assert!(result.metadata.timestamp_ns.is_some());

        let shutter_seen = std::iter::from_fn(|| match notifications.recv() {
            RecvOutcome::Data(message) => Some(message),
            _ => None,
        })
        .any(|message| {
            matches!(
                message,
                NotifyMessage::Shutter { frame_number: 7, .. }
            )
        });
        assert!(shutter_seen, "shutter event missing");

        processor.shut_down();
        sensor.shut_down().unwrap();
    }

    #[test]
    fn zoom_change_ramps_over_speedup_window() {
        let (sensor, processor, _) = start_stack();
        let (callback, results, _notifications) = queue_callback(32);
        let config = PipelineConfig {
            id: 0,
            callback,
            streams: vec![stream(0, PixelFormat::Yuv420, 320, 240)],
            physical_camera_id: None,
        };

        for (frame_number, zoom) in [(1u32, 1.0f32), (2, 3.0), (3, 3.0)] {
            let settings = SensorSettings {
                zoom_ratio: zoom,
                ..SensorSettings::default()
            };
            processor
                .process_pipeline_requests(
                    frame_number,
                    vec![request(0, settings, vec![0])],
                    std::slice::from_ref(&config),
                )
                .unwrap();
        }

        let mut zooms = Vec::new();
        for _ in 0..3 {
            match results.recv_timeout(Duration::from_secs(5)) {
                RecvOutcome::Data(result) => {
                    zooms.push((result.frame_number, result.metadata.zoom_ratio.unwrap()));
                }
                other => panic!("missing result: {other:?}"),
            }
        }
        zooms.sort_by_key(|(frame, _)| *frame);
        assert_eq!(zooms[0], (1, 1.0));
        assert!(
            (zooms[1].1 - 2.0).abs() < 1e-3,
            "frame 2 should carry the interpolated zoom, got {}",
            zooms[1].1
        );
        assert_eq!(zooms[2].1, 3.0);

        processor.shut_down();
        sensor.shut_down().unwrap();
    }

    #[test]
    fn zoom_past_sensor_maximum_is_clamped_not_rejected() {
        let (sensor, processor, chars) = start_stack();
        let (callback, results, _notifications) = queue_callback(8);
        let config = PipelineConfig {
            id: 0,
            callback,
            streams: vec![stream(0, PixelFormat::Yuv420, 320, 240)],
            physical_camera_id: None,
        };
        let settings = SensorSettings {
            zoom_ratio: 10.0,
            ..SensorSettings::default()
        };
        processor
            .process_pipeline_requests(1, vec![request(0, settings, vec![0])], &[config])
            .unwrap();
        match results.recv_timeout(Duration::from_secs(5)) {
            RecvOutcome::Data(result) => {
                assert_eq!(
                    result.metadata.zoom_ratio.unwrap(),
                    chars[&0].max_zoom_ratio
                );
            }
            other => panic!("missing result: {other:?}"),
        }
        processor.shut_down();
        sensor.shut_down().unwrap();
    }

    #[test]
    fn flush_fails_pending_requests_without_results() {
        let (sensor, processor, _) = start_stack();
        let (callback, results, notifications) = queue_callback(32);
        let config = PipelineConfig {
            id: 0,
            callback,
            streams: vec![stream(0, PixelFormat::Yuv420, 320, 240)],
            physical_camera_id: None,
        };
        // A one-second frame keeps the worker busy so the follow-up
        // requests stay queued at the dispatch stage.
        let slow = SensorSettings {
            frame_duration: 1_000_000_000,
            ..SensorSettings::default()
        };
        processor
            .process_pipeline_requests(
                1,
                vec![request(0, slow.clone(), vec![0])],
                std::slice::from_ref(&config),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(300));
        for frame_number in 2..=4 {
            processor
                .process_pipeline_requests(
                    frame_number,
                    vec![request(0, slow.clone(), vec![0])],
                    std::slice::from_ref(&config),
                )
                .unwrap();
        }
        processor.flush().unwrap();

        // Frame 1 completed normally before the flush.
        match results.recv_timeout(Duration::from_secs(5)) {
            RecvOutcome::Data(result) => assert_eq!(result.frame_number, 1),
            other => panic!("missing first result: {other:?}"),
        }
        assert!(matches!(
            results.recv_timeout(Duration::from_millis(100)),
            RecvOutcome::Empty
        ));

        let mut failed_frames = Vec::new();
        while let RecvOutcome::Data(message) = notifications.recv() {
            if let NotifyMessage::Error {
                frame_number,
                kind: NotifyErrorKind::Request,
                ..
            } = message
            {
                failed_frames.push(frame_number);
            }
        }
        failed_frames.sort_unstable();
        assert_eq!(failed_frames, vec![2, 3, 4]);

        processor.shut_down();
        sensor.shut_down().unwrap();
    }

    #[test]
    fn synthesis_is_reproducible_across_pipeline_instances() {
        let capture = || -> Vec<u8> {
            let (sensor, processor, _) = start_stack();
            let (callback, results, _notifications) = queue_callback(8);
            let config = PipelineConfig {
                id: 0,
                callback,
                streams: vec![stream(0, PixelFormat::Yuv420, 320, 240)],
                physical_camera_id: None,
            };
            processor
                .process_pipeline_requests(
                    5,
                    vec![request(0, SensorSettings::default(), vec![0])],
                    &[config],
                )
                .unwrap();
            let result = match results.recv_timeout(Duration::from_secs(5)) {
                RecvOutcome::Data(result) => result,
                other => panic!("missing result: {other:?}"),
            };
            let bytes = result.output_buffers[0].planes()[0].to_vec();
            processor.shut_down();
            sensor.shut_down().unwrap();
            bytes
        };
        assert_eq!(capture(), capture());
    }
}
