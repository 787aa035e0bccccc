#![doc = include_str!("../README.md")]

pub use argus_core as core;
pub use argus_synth as synth;

pub use thiserror;

pub mod callback;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod tunables;
pub mod validator;

pub mod prelude {
    pub use crate::callback::{
        NotifyErrorKind, NotifyMessage, PipelineCallback, PipelineResult, ResultMetadata,
        queue_callback,
    };
    pub use crate::metrics::{PipelineStageMetrics, StageMetrics};
    pub use crate::pipeline::{FrameRequest, SensorBinningFactorInfo, SensorPipeline};
    pub use crate::processor::{PipelineConfig, PipelineRequest, RequestProcessor};
    pub use crate::tunables::{ArgusConfig, ControllerTunables, ZoomRampCurve};
    pub use crate::validator::{
        StreamConfiguration, StreamInfo, are_characteristics_supported,
        is_reprocess_path_supported, is_stream_combination_supported, override_format,
    };
    pub use argus_core::prelude::*;
    pub use argus_synth::prelude::*;
}
