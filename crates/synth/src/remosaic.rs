//! Quad-Bayer to standard Bayer remosaic.
//!
//! A quad-Bayer mosaic groups each 2x2 pixel block under one color
//! filter; standard processing expects one color per pixel. The
//! remosaic is a pure permutation within every 4x4 tile, so per-channel
//! energy is preserved exactly. No inverse is provided.

use argus_core::prelude::SensorError;

use crate::scene::SceneChannel;

/// CFA color at a coordinate of a quad-Bayer (RGGB-quadded) mosaic.
pub fn quad_bayer_channel(x: u32, y: u32) -> SceneChannel {
    match ((x % 4) / 2, (y % 4) / 2) {
        (0, 0) => SceneChannel::Red,
        (1, 0) => SceneChannel::GreenEven,
        (0, 1) => SceneChannel::GreenOdd,
        _ => SceneChannel::Blue,
    }
}

/// CFA color at a coordinate of a standard RGGB mosaic.
pub fn standard_bayer_channel(x: u32, y: u32) -> SceneChannel {
    match (x % 2, y % 2) {
        (0, 0) => SceneChannel::Red,
        (1, 0) => SceneChannel::GreenEven,
        (0, 1) => SceneChannel::GreenOdd,
        _ => SceneChannel::Blue,
    }
}

// Pixel positions of each channel inside a 4x4 tile, quad layout and
// standard layout respectively. Index order: R, Gr, Gb, B.
const QUAD_POSITIONS: [[(usize, usize); 4]; 4] = [
    [(0, 0), (1, 0), (0, 1), (1, 1)],
    [(2, 0), (3, 0), (2, 1), (3, 1)],
    [(0, 2), (1, 2), (0, 3), (1, 3)],
    [(2, 2), (3, 2), (2, 3), (3, 3)],
];
const STANDARD_POSITIONS: [[(usize, usize); 4]; 4] = [
    [(0, 0), (2, 0), (0, 2), (2, 2)],
    [(1, 0), (3, 0), (1, 2), (3, 2)],
    [(0, 1), (2, 1), (0, 3), (2, 3)],
    [(1, 1), (3, 1), (1, 3), (3, 3)],
];

/// Regroup a quad-Bayer RAW16 mosaic into standard RGGB layout.
///
/// Width and height must be multiples of 4 (quad sensors read out in
/// 4x4 tiles) and both slices must hold exactly `width * height`
/// samples.
///
/// # Example
/// ```rust
/// use argus_synth::prelude::remosaic_raw16;
///
/// let input: Vec<u16> = (0..16).collect();
/// let mut output = vec![0u16; 16];
/// remosaic_raw16(&input, 4, 4, &mut output).unwrap();
/// assert_eq!(
///     input.iter().map(|v| *v as u64).sum::<u64>(),
///     output.iter().map(|v| *v as u64).sum::<u64>(),
/// );
/// ```
pub fn remosaic_raw16(
    input: &[u16],
    width: usize,
    height: usize,
    output: &mut [u16],
) -> Result<(), SensorError> {
    if width % 4 != 0 || height % 4 != 0 {
        return Err(SensorError::InvalidArgument(
            "remosaic dimensions must be multiples of four",
        ));
    }
    if input.len() != width * height || output.len() != width * height {
        return Err(SensorError::InvalidArgument(
            "remosaic buffer length does not match dimensions",
        ));
    }

    for tile_y in (0..height).step_by(4) {
        for tile_x in (0..width).step_by(4) {
            for channel in 0..4 {
                for slot in 0..4 {
                    let (qx, qy) = QUAD_POSITIONS[channel][slot];
                    let (sx, sy) = STANDARD_POSITIONS[channel][slot];
                    output[(tile_y + sy) * width + tile_x + sx] =
                        input[(tile_y + qy) * width + tile_x + qx];
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_sum(data: &[u16], width: usize, layout: fn(u32, u32) -> SceneChannel) -> [u64; 4] {
        let mut sums = [0u64; 4];
        for (idx, value) in data.iter().enumerate() {
            let x = (idx % width) as u32;
            let y = (idx / width) as u32;
            let slot = match layout(x, y) {
                SceneChannel::Red => 0,
                SceneChannel::GreenEven => 1,
                SceneChannel::GreenOdd => 2,
                SceneChannel::Blue => 3,
                SceneChannel::Depth => unreachable!(),
            };
            sums[slot] += u64::from(*value);
        }
        sums
    }

    #[test]
    fn preserves_per_channel_energy() {
        let width = 16;
        let height = 8;
        let input: Vec<u16> = (0..width * height).map(|i| (i * 37 % 4001) as u16).collect();
        let mut output = vec![0u16; width * height];
        remosaic_raw16(&input, width, height, &mut output).unwrap();

        let before = channel_sum(&input, width, quad_bayer_channel);
        let after = channel_sum(&output, width, standard_bayer_channel);
        assert_eq!(before, after);
    }

    #[test]
    fn output_follows_standard_layout() {
        // Encode the quad channel into each sample, then check every
        // output position carries its own standard-layout channel.
        let width = 8;
        let height = 8;
        let input: Vec<u16> = (0..width * height)
            .map(|i| {
                let x = (i % width) as u32;
                let y = (i / width) as u32;
                match quad_bayer_channel(x, y) {
                    SceneChannel::Red => 10,
                    SceneChannel::GreenEven => 20,
                    SceneChannel::GreenOdd => 30,
                    SceneChannel::Blue => 40,
                    SceneChannel::Depth => unreachable!(),
                }
            })
            .collect();
        let mut output = vec![0u16; width * height];
        remosaic_raw16(&input, width, height, &mut output).unwrap();
        for (idx, value) in output.iter().enumerate() {
            let x = (idx % width) as u32;
            let y = (idx / width) as u32;
            let expected = match standard_bayer_channel(x, y) {
                SceneChannel::Red => 10,
                SceneChannel::GreenEven => 20,
                SceneChannel::GreenOdd => 30,
                SceneChannel::Blue => 40,
                SceneChannel::Depth => unreachable!(),
            };
            assert_eq!(*value, expected, "wrong channel at ({x}, {y})");
        }
    }

    #[test]
    fn rejects_unaligned_dimensions() {
        let input = vec![0u16; 6 * 4];
        let mut output = vec![0u16; 6 * 4];
        assert!(remosaic_raw16(&input, 6, 4, &mut output).is_err());
    }
}
