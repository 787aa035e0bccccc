//! Result and notification delivery types.

use std::fmt;
use std::sync::Arc;

use argus_core::prelude::{
    BoundedRx, Buffers, EdgeMode, RotateAndCrop, SendOutcome, VideoStabilizationMode, bounded,
};
use tracing::warn;

/// Metadata echoed with a completed frame.
///
/// Fields stay `None` unless the committed settings asked for them to
/// be reported.
#[derive(Debug, Clone, Default)]
pub struct ResultMetadata {
    /// Start-of-exposure timestamp in nanoseconds.
    pub timestamp_ns: Option<u64>,
    pub exposure_time: Option<u64>,
    pub frame_duration: Option<u64>,
    pub gain: Option<u32>,
    pub zoom_ratio: Option<f32>,
    pub rotate_and_crop: Option<RotateAndCrop>,
    pub video_stabilization: Option<VideoStabilizationMode>,
    pub edge_mode: Option<EdgeMode>,
    pub neutral_color_point: Option<[f32; 3]>,
    pub green_split: Option<f32>,
    /// Per-channel `(scale, offset)` noise coefficients.
    pub noise_profile: Option<[[f64; 2]; 4]>,
}

/// A completed (or partial) capture result for one pipeline request.
#[derive(Debug)]
pub struct PipelineResult {
    pub camera_id: u32,
    pub pipeline_id: u32,
    pub frame_number: u32,
    /// 1 for a lone/partial result, incremented for the final result of
    /// a request that also produced a partial.
    pub partial_result_count: u32,
    pub metadata: ResultMetadata,
    pub output_buffers: Buffers,
    pub input_buffers: Buffers,
}

impl PipelineResult {
    /// Empty prototype for a request; the pipeline fills metadata and
    /// buffers during readout.
    pub fn prototype(camera_id: u32, pipeline_id: u32, frame_number: u32) -> Self {
        Self {
            camera_id,
            pipeline_id,
            frame_number,
            partial_result_count: 1,
            metadata: ResultMetadata::default(),
            output_buffers: Buffers::new(),
            input_buffers: Buffers::new(),
        }
    }
}

/// Classification of an asynchronous fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyErrorKind {
    /// The whole device failed.
    Device,
    /// One request failed; siblings are unaffected.
    Request,
    /// Result metadata could not be produced.
    Result,
    /// A single stream buffer could not be filled.
    Buffer { stream_id: u32 },
}

/// Event delivered on the notify channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyMessage {
    /// The frame began exposing at `timestamp_ns`; readout completes at
    /// `readout_timestamp_ns` under the rolling-shutter row cadence.
    Shutter {
        frame_number: u32,
        timestamp_ns: u64,
        readout_timestamp_ns: u64,
    },
    /// A request or buffer failed; correlate by frame number and
    /// pipeline id.
    Error {
        frame_number: u32,
        pipeline_id: u32,
        kind: NotifyErrorKind,
    },
}

/// Per-request delivery callbacks: a result channel and a separate
/// notify channel for shutter/error events.
///
/// # Example
/// ```rust
/// use argus::callback::{NotifyMessage, PipelineCallback, PipelineResult};
///
/// let callback = PipelineCallback::new(
///     |result: PipelineResult| println!("frame {}", result.frame_number),
///     |message: NotifyMessage| println!("{message:?}"),
/// );
/// callback.notify(NotifyMessage::Shutter {
///     frame_number: 1,
///     timestamp_ns: 0,
///     readout_timestamp_ns: 0,
/// });
/// ```
#[derive(Clone)]
pub struct PipelineCallback {
    result: Arc<dyn Fn(PipelineResult) + Send + Sync>,
    notify: Arc<dyn Fn(NotifyMessage) + Send + Sync>,
}

impl PipelineCallback {
    pub fn new(
        result: impl Fn(PipelineResult) + Send + Sync + 'static,
        notify: impl Fn(NotifyMessage) + Send + Sync + 'static,
    ) -> Self {
        Self {
            result: Arc::new(result),
            notify: Arc::new(notify),
        }
    }

    /// Deliver a completed or partial result.
    pub fn process_result(&self, result: PipelineResult) {
        (self.result)(result);
    }

    /// Deliver a shutter or error event.
    pub fn notify(&self, message: NotifyMessage) {
        (self.notify)(message);
    }
}

impl fmt::Debug for PipelineCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineCallback").finish_non_exhaustive()
    }
}

/// Build a callback pair backed by bounded queues, for consumers that
/// poll rather than register closures.
///
/// Events past the queue capacity are dropped with a warning; size the
/// depth to the expected frames in flight.
///
/// # Example
/// ```rust
/// use argus::callback::queue_callback;
/// use argus_core::prelude::RecvOutcome;
///
/// let (callback, results, notifications) = queue_callback(8);
/// drop(callback);
/// assert!(matches!(results.recv(), RecvOutcome::Empty));
/// assert!(matches!(notifications.recv(), RecvOutcome::Empty));
/// ```
pub fn queue_callback(
    depth: usize,
) -> (
    PipelineCallback,
    BoundedRx<PipelineResult>,
    BoundedRx<NotifyMessage>,
) {
    let (result_tx, result_rx) = bounded(depth);
    let (notify_tx, notify_rx) = bounded(depth);
    let callback = PipelineCallback::new(
        move |result| {
            if result_tx.send(result) != SendOutcome::Ok {
                warn!("result queue full or closed, dropping result");
            }
        },
        move |message| {
            if notify_tx.send(message) != SendOutcome::Ok {
                warn!("notify queue full or closed, dropping notification");
            }
        },
    );
    (callback, result_rx, notify_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_core::prelude::RecvOutcome;

    #[test]
    fn queue_callback_round_trips_events() {
        let (callback, results, notifications) = queue_callback(4);
        callback.process_result(PipelineResult::prototype(0, 1, 9));
        callback.notify(NotifyMessage::Error {
            frame_number: 9,
            pipeline_id: 1,
            kind: NotifyErrorKind::Request,
        });

        match results.recv() {
            RecvOutcome::Data(result) => {
                assert_eq!(result.frame_number, 9);
                assert_eq!(result.pipeline_id, 1);
            }
            other => panic!("expected a result, got {other:?}"),
        }
        match notifications.recv() {
            RecvOutcome::Data(NotifyMessage::Error { kind, .. }) => {
                assert_eq!(kind, NotifyErrorKind::Request);
            }
            other => panic!("expected an error notification, got {other:?}"),
        }
    }
}
