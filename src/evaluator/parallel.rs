// Copyright (c) the flicker_remover Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use rayon::prelude::*;

use super::{Evaluator, abs_diff_i32, count_bright_neighbors};
use crate::bit_grid::BitGrid;
use crate::grid::Grid;

/// Data-parallel realization of the evaluator: the per-pixel work of each
/// kernel is split across the ambient Rayon thread pool, standing in for
/// an accelerator back-end that offloads the same per-pixel kernels to a
/// device. Produces results bit-identical to [`super::Cpu`] for K1-K4.
///
/// [`BitGrid`] packs bits across row boundaries, so its storage cannot be
/// split into disjoint per-row mutable slices; `update_similarity_levels`
/// therefore parallelizes only the (dominant) comparison work and commits
/// the bit writes in a fast sequential pass. Every other kernel operates on
/// plain `Grid<T>` storage and is parallelized end to end via disjoint
/// per-row mutable chunks.
#[derive(Clone, Copy, Debug, Default)]
pub struct Parallel;

impl Evaluator for Parallel {
    fn update_similarity_levels(
        &self,
        a: &Grid<i32>,
        b: &Grid<i32>,
        old_levels: &BitGrid,
        threshold: i32,
        new_levels: &mut BitGrid,
        sum: &mut Grid<u8>,
    ) {
        let (rows, cols) = a.size();
        let threshold = threshold as i64;
        let similarities: Vec<bool> = (0..rows * cols)
            .into_par_iter()
            .map(|idx| {
                let row = idx / cols;
                let col = idx % cols;
                abs_diff_i32(*a.get(row, col), *b.get(row, col)) <= threshold
            })
            .collect();
        for (idx, similar) in similarities.into_iter().enumerate() {
            let row = idx / cols;
            let col = idx % cols;
            let was_similar = old_levels.at(row, col).expect("in-bounds pixel");
            new_levels.set(row, col, similar).expect("in-bounds pixel");
            let slot = sum.get_mut(row, col);
            match (similar, was_similar) {
                (true, false) => *slot += 1,
                (false, true) => *slot -= 1,
                _ => {}
            }
        }
    }

    fn update_flicker_counter(
        &self,
        adjacent_sum: &Grid<u8>,
        similarity_max: u32,
        corresponding_sum: &Grid<u8>,
        theta: f64,
        counter: &mut Grid<u8>,
    ) {
        let cols = counter.cols();
        counter
            .rows_mut()
            .enumerate()
            .par_bridge()
            .for_each(|(row, counter_row)| {
                for (col, slot) in counter_row.iter_mut().enumerate() {
                    let flickers = f64::from(*corresponding_sum.get(row, col)) > theta
                        && u32::from(*adjacent_sum.get(row, col)) < similarity_max;
                    *slot = if flickers { slot.wrapping_add(1) } else { 0 };
                }
            });
    }

    fn update_masks(
        &self,
        a: &Grid<i32>,
        b: &Grid<i32>,
        counter: &Grid<u8>,
        max_duration: i32,
        mask: &mut Grid<i32>,
    ) {
        let cols = mask.cols();
        mask.rows_mut()
            .enumerate()
            .par_bridge()
            .for_each(|(row, mask_row)| {
                for (col, slot) in mask_row.iter_mut().enumerate() {
                    if i32::from(*counter.get(row, col)) > max_duration {
                        *slot += *b.get(row, col) - *a.get(row, col);
                    }
                }
            });
    }

    fn zero_flicker_counter(&self, max_duration: i32, counter: &mut Grid<u8>) {
        counter.as_mut_slice().par_iter_mut().for_each(|slot| {
            if i32::from(*slot) > max_duration {
                *slot = 0;
            }
        });
    }

    fn filtered_diff(&self, src: &Grid<u8>, threshold_1: u8, threshold_2: u32, dst: &mut Grid<u8>) {
        let cols = dst.cols();
        dst.rows_mut()
            .enumerate()
            .par_bridge()
            .for_each(|(row, dst_row)| {
                for (col, slot) in dst_row.iter_mut().enumerate() {
                    let value = *src.get(row, col);
                    let set = value > threshold_1
                        && count_bright_neighbors(src, row, col, threshold_1) >= threshold_2;
                    *slot = if set { 255 } else { 0 };
                }
            });
    }
}
