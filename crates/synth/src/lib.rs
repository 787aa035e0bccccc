#![doc = include_str!("../README.md")]

pub mod engine;
pub mod gamma;
pub mod noise;
pub mod remosaic;
pub mod scene;

pub mod prelude {
    pub use crate::{
        engine::{
            GREEN_SPLIT, NEUTRAL_COLOR_POINT, ProcessMode, RawMode, RgbLayout, RgbRgbMatrix,
            SynthesisEngine, YuvPlanesMut, YuvPlanesRef,
        },
        gamma::{GammaTables, TransferFunction, select_transfer_function},
        noise::{RowNoise, base_gain_factor, total_gain},
        remosaic::{quad_bayer_channel, remosaic_raw16, standard_bayer_channel},
        scene::{Scene, SceneChannel, TestScene},
    };
}
