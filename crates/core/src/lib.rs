#![doc = include_str!("../README.md")]

pub mod buffer;
pub mod characteristics;
pub mod error;
pub mod format;
pub mod metrics;
pub mod queue;
pub mod settings;

pub mod prelude {
    pub use crate::{
        buffer::{
            BufferLease, BufferPool, Buffers, PlaneLayout, SensorBuffer, StreamSpec, plane_layouts,
        },
        characteristics::{
            ColorFilterXyz, ColorSpaceProfileMap, DynamicRangeProfileMap, ForwardMatrix,
            LogicalCharacteristics, SensorCharacteristics,
        },
        error::SensorError,
        format::{
            ColorFilterArrangement, ColorSpaceProfile, CropRegion, DynamicRangeProfile,
            PixelFormat, Resolution,
        },
        metrics::Counters,
        queue::{BoundedRx, BoundedTx, RecvOutcome, SendOutcome, bounded},
        settings::{
            EdgeMode, LogicalCameraSettings, RequestTemplate, RotateAndCrop, SensorPixelMode,
            SensorSettings, TestPatternMode, TimestampSource, VideoStabilizationMode,
        },
    };
}
