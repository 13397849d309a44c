// Copyright (c) the flicker_remover Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! The per-pixel evaluator: five pixel-parallel kernels shared by every
//! phase of the flicker-removal algorithm.
//!
//! Two implementations are provided, both producing bit-identical results
//! for `update_similarity_levels`, `update_flicker_counter`, `update_masks`
//! and `zero_flicker_counter`:
//!
//! - [`Cpu`] walks pixels with a direct nested loop.
//! - [`Parallel`] (behind the `parallel` feature, default-on) dispatches
//!   the same per-row work to a Rayon thread pool, standing in for an
//!   accelerator back-end that offloads the kernels to a data-parallel
//!   device.
//!
//! `filtered_diff` (K5) exists only for an external visualization
//! collaborator; the flicker remover itself never calls it.

mod cpu;
#[cfg(feature = "parallel")]
mod parallel;

pub use cpu::Cpu;
#[cfg(feature = "parallel")]
pub use parallel::Parallel;

use crate::bit_grid::BitGrid;
use crate::grid::Grid;

/// A pluggable primitive executing the five per-pixel kernels that drive
/// [`crate::flicker_remover::FlickerRemover`]. Every kernel is a pure,
/// per-coordinate function of its same-coordinate inputs (K5 additionally
/// reads a read-only 3x3 neighborhood), so an implementation may freely
/// parallelize across pixels as long as it returns only once every pixel
/// has been written.
pub trait Evaluator {
    /// K1: recomputes the similarity level between `a` and `b` at every
    /// pixel, writing it to `new_levels`, and updates `sum` so that it
    /// remains the element-wise sum of the ring of level-grids (`sum +=
    /// new_levels - old_levels`, pixel by pixel).
    fn update_similarity_levels(
        &self,
        a: &Grid<i32>,
        b: &Grid<i32>,
        old_levels: &BitGrid,
        threshold: i32,
        new_levels: &mut BitGrid,
        sum: &mut Grid<u8>,
    );

    /// K2: for every pixel, increments `counter` when the pixel is stable
    /// across phase-aligned frames (`corresponding_sum > theta`) but not
    /// stable across adjacent frames (`adjacent_sum < similarity_max`);
    /// resets it to zero otherwise.
    fn update_flicker_counter(
        &self,
        adjacent_sum: &Grid<u8>,
        similarity_max: u32,
        corresponding_sum: &Grid<u8>,
        theta: f64,
        counter: &mut Grid<u8>,
    );

    /// K3: for every pixel where `counter > max_duration`, accumulates
    /// `b - a` into `mask`.
    fn update_masks(
        &self,
        a: &Grid<i32>,
        b: &Grid<i32>,
        counter: &Grid<u8>,
        max_duration: i32,
        mask: &mut Grid<i32>,
    );

    /// K4: for every pixel where `counter > max_duration`, resets it to
    /// zero. Must be invoked after `update_masks` so a pixel's counter is
    /// not cleared before its accumulated mask delta is applied.
    fn zero_flicker_counter(&self, max_duration: i32, counter: &mut Grid<u8>);

    /// K5 (external visualization only): sets the output pixel to 255 when
    /// `src > threshold_1` and at least `threshold_2` of its 8-connected
    /// neighbors (radius 1, center excluded) also exceed `threshold_1`.
    fn filtered_diff(&self, src: &Grid<u8>, threshold_1: u8, threshold_2: u32, dst: &mut Grid<u8>);
}

/// Counts 8-connected neighbors (radius 1, center excluded) of `(row, col)`
/// in `src` whose value exceeds `threshold`. Shared by both evaluator
/// backends so K5 agrees pixel-for-pixel between them.
pub(crate) fn count_bright_neighbors(src: &Grid<u8>, row: usize, col: usize, threshold: u8) -> u32 {
    let (rows, cols) = src.size();
    let row = row as isize;
    let col = col as isize;
    let mut count = 0u32;
    for dr in -1isize..=1 {
        for dc in -1isize..=1 {
            if dr == 0 && dc == 0 {
                continue;
            }
            let r = row + dr;
            let c = col + dc;
            if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
                continue;
            }
            if *src.get(r as usize, c as usize) > threshold {
                count += 1;
            }
        }
    }
    count
}

#[inline]
pub(crate) fn abs_diff_i32(a: i32, b: i32) -> i64 {
    (a as i64 - b as i64).abs()
}
