// Copyright (c) the flicker_remover Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{Evaluator, abs_diff_i32, count_bright_neighbors};
use crate::bit_grid::BitGrid;
use crate::grid::Grid;

/// Direct nested-loop realization of the evaluator.
#[derive(Clone, Copy, Debug, Default)]
pub struct Cpu;

impl Evaluator for Cpu {
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
        for row in 0..rows {
            for col in 0..cols {
                let similar = abs_diff_i32(*a.get(row, col), *b.get(row, col)) <= threshold;
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
    }

    fn update_flicker_counter(
        &self,
        adjacent_sum: &Grid<u8>,
        similarity_max: u32,
        corresponding_sum: &Grid<u8>,
        theta: f64,
        counter: &mut Grid<u8>,
    ) {
        let (rows, cols) = counter.size();
        for row in 0..rows {
            for col in 0..cols {
                let flickers = f64::from(*corresponding_sum.get(row, col)) > theta
                    && u32::from(*adjacent_sum.get(row, col)) < similarity_max;
                let slot = counter.get_mut(row, col);
                if flickers {
                    *slot = slot.wrapping_add(1);
                } else {
                    *slot = 0;
                }
            }
        }
    }

    fn update_masks(
        &self,
        a: &Grid<i32>,
        b: &Grid<i32>,
        counter: &Grid<u8>,
        max_duration: i32,
        mask: &mut Grid<i32>,
    ) {
        let (rows, cols) = mask.size();
        for row in 0..rows {
            for col in 0..cols {
                if i32::from(*counter.get(row, col)) > max_duration {
                    let delta = *b.get(row, col) - *a.get(row, col);
                    *mask.get_mut(row, col) += delta;
                }
            }
        }
    }

    fn zero_flicker_counter(&self, max_duration: i32, counter: &mut Grid<u8>) {
        let (rows, cols) = counter.size();
        for row in 0..rows {
            for col in 0..cols {
                let slot = counter.get_mut(row, col);
                if i32::from(*slot) > max_duration {
                    *slot = 0;
                }
            }
        }
    }

    fn filtered_diff(&self, src: &Grid<u8>, threshold_1: u8, threshold_2: u32, dst: &mut Grid<u8>) {
        let (rows, cols) = src.size();
        for row in 0..rows {
            for col in 0..cols {
                let value = *src.get(row, col);
                let set = value > threshold_1
                    && count_bright_neighbors(src, row, col, threshold_1) >= threshold_2;
                *dst.get_mut(row, col) = if set { 255 } else { 0 };
            }
        }
    }
}
