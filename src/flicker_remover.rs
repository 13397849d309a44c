// Copyright (c) the flicker_remover Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The flicker-removal state machine: phase scheduling, sliding-block
//! similarity bookkeeping, and the per-pixel mask-update rule, all driven
//! by a pluggable [`Evaluator`].

use crate::bit_grid::BitGrid;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::grid::Grid;
use crate::ring_buffer::RingBuffer;

/// Power-line frequency this engine is tuned for. A camera running at or
/// below this rate never samples more than one lighting phase per frame.
const LINE_FREQUENCY_HZ: u32 = 50;

/// Smallest `block_size` such that `block_size * camera_fps / LINE_FREQUENCY_HZ`
/// stays an integer cycle length: grow a multiplier until `i * camera_fps`
/// divides evenly by the line frequency.
fn compute_block_size(camera_fps: u32) -> u32 {
    for i in 1..=LINE_FREQUENCY_HZ {
        if (i * camera_fps) % LINE_FREQUENCY_HZ == 0 {
            return i * camera_fps / LINE_FREQUENCY_HZ;
        }
    }
    // i == LINE_FREQUENCY_HZ always divides evenly, so this is unreachable.
    camera_fps
}

fn widen(frame: &Grid<u8>) -> Grid<i32> {
    let (rows, cols) = frame.size();
    let mut out = Grid::<i32>::new(rows, cols);
    for (dst, src) in out.as_mut_slice().iter_mut().zip(frame.as_slice()) {
        *dst = i32::from(*src);
    }
    out
}

/// Adaptive engine that removes power-line flicker from a stream of
/// fixed-size grayscale frames. Generic over the [`Evaluator`] that
/// executes its five per-pixel kernels, so the same state machine runs
/// identically on a direct CPU loop or a data-parallel back-end.
pub struct FlickerRemover<E: Evaluator> {
    evaluator: E,
    rows: usize,
    cols: usize,
    flickering_threshold: i32,
    max_allowed_flicker_duration: i32,

    block_size: u32,
    number_of_masks: u32,
    actual_mask: u32,

    masks: Vec<Grid<i32>>,
    frames_block: RingBuffer<Grid<i32>>,
    corresponding_frames_similarity_levels: RingBuffer<BitGrid>,
    adjacent_frames_similarity_levels: RingBuffer<BitGrid>,
    corresponding_frames_similarity_sum: Grid<u8>,
    adjacent_frames_similarity_sum: Grid<u8>,
    flicker_counter: Grid<u8>,

    expected_timestamp: Option<f64>,
    timestamps_delta: f64,
    accepted_timestamp_difference: f64,
}

impl<E: Evaluator> FlickerRemover<E> {
    pub fn new(
        evaluator: E,
        camera_fps: u32,
        flickering_threshold: i32,
        max_allowed_flicker_duration: i32,
        rows: usize,
        cols: usize,
    ) -> Result<Self> {
        if camera_fps <= LINE_FREQUENCY_HZ {
            return Err(Error::ConfigurationError { fps: camera_fps });
        }
        // BitGrid validates rows/cols > 0 for us; surface that failure up front
        // rather than after allocating the rest of the engine's state.
        BitGrid::new(rows, cols)?;

        let block_size = compute_block_size(camera_fps);
        let number_of_masks = block_size - 1;

        let masks = (0..number_of_masks)
            .map(|_| Grid::<i32>::new(rows, cols))
            .collect();

        let mut corresponding_frames_similarity_levels = RingBuffer::new(block_size as usize);
        for _ in 0..block_size {
            corresponding_frames_similarity_levels.push(BitGrid::new(rows, cols)?);
        }
        let mut adjacent_frames_similarity_levels = RingBuffer::new(number_of_masks as usize);
        for _ in 0..number_of_masks {
            adjacent_frames_similarity_levels.push(BitGrid::new(rows, cols)?);
        }

        let timestamps_delta = 1000.0 / f64::from(camera_fps);
        let accepted_timestamp_difference = timestamps_delta / 3.0;

        tracing::info!(
            camera_fps,
            block_size,
            number_of_masks,
            "constructed flicker remover"
        );

        Ok(Self {
            evaluator,
            rows,
            cols,
            flickering_threshold,
            max_allowed_flicker_duration,
            block_size,
            number_of_masks,
            actual_mask: number_of_masks,
            masks,
            frames_block: RingBuffer::new(block_size as usize),
            corresponding_frames_similarity_levels,
            adjacent_frames_similarity_levels,
            corresponding_frames_similarity_sum: Grid::new(rows, cols),
            adjacent_frames_similarity_sum: Grid::new(rows, cols),
            flicker_counter: Grid::new(rows, cols),
            expected_timestamp: None,
            timestamps_delta,
            accepted_timestamp_difference,
        })
    }

    /// Processes one input frame, returning the bias-corrected frame in the
    /// engine's widened (`i32`) working pixel format.
    pub fn process(&mut self, frame: &Grid<u8>, timestamp_ms: i64) -> Result<Grid<i32>> {
        let shape = frame.size();
        if shape != (self.rows, self.cols) {
            return Err(Error::ShapeMismatch {
                expected: (self.rows, self.cols),
                actual: shape,
            });
        }

        let timestamp = timestamp_ms as f64;
        let on_schedule = match self.expected_timestamp {
            None => true,
            Some(expected) => (expected - timestamp).abs() < self.accepted_timestamp_difference,
        };
        if !on_schedule {
            let expected = self.expected_timestamp.expect("on_schedule implies Some");
            if timestamp < expected {
                return Err(Error::TimestampRegression {
                    expected_ms: expected,
                    actual_ms: timestamp_ms,
                });
            }
            let n_dropped = ((timestamp - expected + self.accepted_timestamp_difference)
                / self.timestamps_delta)
                .floor() as u32;
            self.actual_mask = (self.actual_mask + n_dropped) % (self.number_of_masks + 1);
            tracing::debug!(
                n_dropped,
                actual_mask = self.actual_mask,
                "forward timestamp gap; rotating phase"
            );
        } else {
            tracing::trace!(timestamp_ms, "accepted on-schedule frame");
        }
        self.expected_timestamp = Some(timestamp + self.timestamps_delta);

        let mut working = widen(frame);
        if self.actual_mask == self.number_of_masks {
            self.actual_mask = 0;
        } else {
            let mask = &self.masks[self.actual_mask as usize];
            for (dst, bias) in working.as_mut_slice().iter_mut().zip(mask.as_slice()) {
                *dst -= bias;
            }
            self.actual_mask += 1;
        }

        if !self.frames_block.is_empty() {
            let a = self.frames_block.last().expect("checked non-empty");
            let old_levels = self
                .adjacent_frames_similarity_levels
                .pop()
                .expect("adjacent ring is always fully populated");
            let mut new_levels = BitGrid::new(self.rows, self.cols)?;
            self.evaluator.update_similarity_levels(
                a,
                &working,
                &old_levels,
                self.flickering_threshold,
                &mut new_levels,
                &mut self.adjacent_frames_similarity_sum,
            );
            self.adjacent_frames_similarity_levels.push(new_levels);
        }

        let evicted_frame = self.frames_block.push(working.clone());
        if let Some(ref prev) = evicted_frame {
            let old_levels = self
                .corresponding_frames_similarity_levels
                .pop()
                .expect("corresponding ring is always fully populated");
            let mut new_levels = BitGrid::new(self.rows, self.cols)?;
            self.evaluator.update_similarity_levels(
                prev,
                &working,
                &old_levels,
                self.flickering_threshold,
                &mut new_levels,
                &mut self.corresponding_frames_similarity_sum,
            );
            self.corresponding_frames_similarity_levels.push(new_levels);
        }

        if self.actual_mask == self.number_of_masks && self.frames_block.is_full() {
            tracing::debug!("end of block reached, learning masks");
            let theta = 0.7 * f64::from(self.block_size);
            self.evaluator.update_flicker_counter(
                &self.adjacent_frames_similarity_sum,
                self.number_of_masks,
                &self.corresponding_frames_similarity_sum,
                theta,
                &mut self.flicker_counter,
            );
            for i in 0..self.number_of_masks {
                let ground = self.frames_block.index(0).expect("frame ring is full");
                let offset = self
                    .frames_block
                    .index((i + 1) as isize)
                    .expect("in range for a full block");
                self.evaluator.update_masks(
                    ground,
                    offset,
                    &self.flicker_counter,
                    self.max_allowed_flicker_duration,
                    &mut self.masks[i as usize],
                );
            }
            self.evaluator
                .zero_flicker_counter(self.max_allowed_flicker_duration, &mut self.flicker_counter);
        }

        Ok(working)
    }

    /// Resets all learned state; the engine behaves as if freshly
    /// constructed, except that its allocations are reused.
    pub fn reset(&mut self) {
        tracing::info!("resetting flicker remover state");
        self.frames_block.clear();
        self.corresponding_frames_similarity_levels.clear();
        self.adjacent_frames_similarity_levels.clear();
        self.flicker_counter.fill(0);
        self.corresponding_frames_similarity_sum.fill(0);
        self.adjacent_frames_similarity_sum.fill(0);
        for mask in &mut self.masks {
            mask.fill(0);
        }
        self.actual_mask = self.number_of_masks;
        for _ in 0..self.block_size {
            self.corresponding_frames_similarity_levels.push(
                BitGrid::new(self.rows, self.cols).expect("rows/cols validated at construction"),
            );
        }
        for _ in 0..self.number_of_masks {
            self.adjacent_frames_similarity_levels.push(
                BitGrid::new(self.rows, self.cols).expect("rows/cols validated at construction"),
            );
        }
        self.expected_timestamp = None;
    }

    /// Pixels where the last two consecutive processed frames were similar
    /// (per `flickering_threshold`) are `true`; all others are `false`.
    pub fn static_pixel_mask(&self, out: &mut BitGrid) -> Result<()> {
        if self.frames_block.size() < 2 {
            return Err(Error::InsufficientHistory {
                needed: 2,
                have: self.frames_block.size(),
            });
        }
        let last = self.frames_block.last().expect("size >= 2");
        let prev = self.frames_block.index(-2).expect("size >= 2");
        let threshold = i64::from(self.flickering_threshold);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let similar = crate::evaluator::abs_diff_i32(*last.get(row, col), *prev.get(row, col))
                    <= threshold;
                out.set(row, col, similar)?;
            }
        }
        Ok(())
    }

    /// Frames processed over this many on-schedule calls should be
    /// discarded by the caller: earlier metrics were computed before any
    /// mask had a chance to converge.
    pub fn warmup_duration(&self) -> u32 {
        self.block_size * (self.max_allowed_flicker_duration as u32 + 2)
    }

    pub fn stored_frame_count(&self) -> u32 {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Cpu;
    use test_log::test;

    fn filled_frame(rows: usize, cols: usize, value: u8) -> Grid<u8> {
        Grid::filled(rows, cols, value)
    }

    #[test]
    fn rejects_fps_at_or_below_line_frequency() {
        assert!(matches!(
            FlickerRemover::new(Cpu, 50, 10, 3, 4, 4),
            Err(Error::ConfigurationError { fps: 50 })
        ));
        assert!(matches!(
            FlickerRemover::new(Cpu, 30, 10, 3, 4, 4),
            Err(Error::ConfigurationError { .. })
        ));
    }

    #[test]
    fn block_size_matches_150fps_scenario() {
        // S1: FPS=150, L=50 => block_size=3, number_of_masks=2.
        let engine = FlickerRemover::new(Cpu, 150, 10, 3, 4, 4).unwrap();
        assert_eq!(engine.stored_frame_count(), 3);
        assert_eq!(engine.warmup_duration(), 3 * (3 + 2));
    }

    #[test]
    fn shape_mismatch_is_reported_with_both_sizes() {
        let mut engine = FlickerRemover::new(Cpu, 150, 10, 3, 600, 800).unwrap();
        let bad_frame = filled_frame(480, 640, 10);
        let err = engine.process(&bad_frame, 0).unwrap_err();
        match err {
            Error::ShapeMismatch { expected, actual } => {
                assert_eq!(expected, (600, 800));
                assert_eq!(actual, (480, 640));
            }
            _ => panic!("expected ShapeMismatch, got {err:?}"),
        }
    }

    #[test]
    fn ground_frame_is_returned_unmodified() {
        // P4: actual_mask starts at number_of_masks, so the very first
        // processed frame is a ground frame and must come back unchanged
        // (in the widened pixel format).
        let mut engine = FlickerRemover::new(Cpu, 150, 10, 3, 2, 2).unwrap();
        let frame = filled_frame(2, 2, 77);
        let out = engine.process(&frame, 0).unwrap();
        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(*out.get(row, col), 77);
            }
        }
    }

    #[test]
    fn timestamp_regression_is_rejected() {
        // S4: fps=150 => delta ~6.67ms, tolerance ~2.22ms.
        let mut engine = FlickerRemover::new(Cpu, 150, 10, 3, 2, 2).unwrap();
        let frame = filled_frame(2, 2, 0);
        engine.process(&frame, 0).unwrap();
        engine.process(&frame, 10).unwrap();
        let err = engine.process(&frame, 3).unwrap_err();
        assert!(matches!(err, Error::TimestampRegression { .. }));
    }

    #[test]
    fn static_pixel_mask_requires_two_frames() {
        let mut engine = FlickerRemover::new(Cpu, 150, 10, 3, 2, 2).unwrap();
        let mut out = BitGrid::new(2, 2).unwrap();
        assert!(matches!(
            engine.static_pixel_mask(&mut out),
            Err(Error::InsufficientHistory { needed: 2, have: 0 })
        ));
        let frame = filled_frame(2, 2, 5);
        engine.process(&frame, 0).unwrap();
        assert!(matches!(
            engine.static_pixel_mask(&mut out),
            Err(Error::InsufficientHistory { needed: 2, have: 1 })
        ));
    }

    #[test]
    fn static_pixel_mask_all_ones_for_identical_frames() {
        // S6, first half: two identical frames => static_pixel_mask is all-true.
        let mut engine = FlickerRemover::new(Cpu, 150, 10, 3, 2, 2).unwrap();
        let frame = filled_frame(2, 2, 5);
        engine.process(&frame, 0).unwrap();
        engine.process(&frame, 7).unwrap();
        let mut out = BitGrid::new(2, 2).unwrap();
        engine.static_pixel_mask(&mut out).unwrap();
        for row in 0..2 {
            for col in 0..2 {
                assert!(out.at(row, col).unwrap());
            }
        }
    }

    #[test]
    fn static_pixel_mask_all_zeros_for_very_different_frames() {
        // S6, second half.
        let mut engine = FlickerRemover::new(Cpu, 150, 10, 3, 2, 2).unwrap();
        let frame_a = filled_frame(2, 2, 0);
        let frame_b = filled_frame(2, 2, 255);
        engine.process(&frame_a, 0).unwrap();
        engine.process(&frame_b, 7).unwrap();
        let mut out = BitGrid::new(2, 2).unwrap();
        engine.static_pixel_mask(&mut out).unwrap();
        for row in 0..2 {
            for col in 0..2 {
                assert!(!out.at(row, col).unwrap());
            }
        }
    }

    #[test]
    fn reset_clears_history_and_restores_initial_phase() {
        let mut engine = FlickerRemover::new(Cpu, 150, 10, 3, 2, 2).unwrap();
        let frame = filled_frame(2, 2, 9);
        engine.process(&frame, 0).unwrap();
        engine.process(&frame, 7).unwrap();
        engine.reset();
        assert_eq!(engine.frames_block.size(), 0);
        let mut out = BitGrid::new(2, 2).unwrap();
        assert!(engine.static_pixel_mask(&mut out).is_err());
        // A fresh ground frame must again be returned bitwise unchanged.
        let out = engine.process(&frame, 0).unwrap();
        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(*out.get(row, col), 9);
            }
        }
    }

    #[test]
    fn no_flicker_identity_holds_after_warmup() {
        // P3: every input frame pixel-identical => masks never move and
        // every output equals the input, after warmup.
        let mut engine = FlickerRemover::new(Cpu, 150, 5, 2, 3, 3).unwrap();
        let frame = filled_frame(3, 3, 128);
        let mut last = None;
        let warmup = engine.warmup_duration();
        for i in 0..(warmup + 10) {
            let out = engine.process(&frame, i64::from(i) * 7).unwrap();
            last = Some(out);
        }
        let out = last.unwrap();
        for row in 0..3 {
            for col in 0..3 {
                assert_eq!(*out.get(row, col), 128);
            }
        }
    }
}
