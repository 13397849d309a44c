// Copyright (c) the flicker_remover Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Test-only helpers shared across `flicker_remover`'s unit and integration
//! tests.

#[macro_export]
macro_rules! assert_almost_eq {
    ($left:expr, $right:expr, $max_error:expr $(,)?) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                let diff = if *left_val > *right_val {
                    *left_val - *right_val
                } else {
                    *right_val - *left_val
                };
                if !(diff <= $max_error) {
                    panic!(
                        "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n max_error: `{:?}`",
                        left_val, right_val, $max_error
                    );
                }
            }
        }
    };
}

/// Asserts that two same-sized pixel grids are equal within `max_error` at
/// every pixel, panicking with the coordinate and values of the first
/// mismatch found rather than a useless "grids differ" message.
#[macro_export]
macro_rules! assert_frames_close {
    ($left:expr, $right:expr, $max_error:expr $(,)?) => {{
        let left_grid = &$left;
        let right_grid = &$right;
        let left_size = left_grid.size();
        let right_size = right_grid.size();
        assert_eq!(
            left_size, right_size,
            "frame size mismatch: left is {:?}, right is {:?}",
            left_size, right_size
        );
        let (rows, cols) = left_size;
        for row in 0..rows {
            for col in 0..cols {
                let l = *left_grid.get(row, col);
                let r = *right_grid.get(row, col);
                let diff = if l > r { l - r } else { r - l };
                if !(diff <= $max_error) {
                    panic!(
                        "frames differ at ({row}, {col}): left={l:?}, right={r:?}, max_error={:?}",
                        $max_error
                    );
                }
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use flicker_remover::Grid;

    #[test]
    fn test_with_floats() {
        assert_almost_eq!(1.0000001f64, 1.0000002, 0.000001);
        assert_almost_eq!(1.0, 1.1, 0.2);
    }

    #[test]
    fn test_with_integers() {
        assert_almost_eq!(100, 101, 2);
        assert_almost_eq!(777u32, 770, 7);
        assert_almost_eq!(500i64, 498, 3);
    }

    #[test]
    fn test_panic() {
        use std::panic;
        let result = panic::catch_unwind(|| {
            assert_almost_eq!(1.0, 1.2, 0.1);
        });
        assert!(
            result.is_err(),
            "Expected assert_almost_eq! to panic, but it didn't"
        );

        let result = panic::catch_unwind(|| {
            assert_almost_eq!(100, 105, 2);
        });
        assert!(
            result.is_err(),
            "Expected assert_almost_eq! to panic, but it didn't"
        );
    }

    #[test]
    fn frames_close_accepts_small_per_pixel_error() {
        let mut a = Grid::<i32>::new(2, 2);
        let mut b = Grid::<i32>::new(2, 2);
        *a.get_mut(0, 0) = 10;
        *b.get_mut(0, 0) = 11;
        assert_frames_close!(a, b, 1);
    }

    #[test]
    fn frames_close_rejects_large_per_pixel_error() {
        let mut a = Grid::<i32>::new(1, 1);
        let mut b = Grid::<i32>::new(1, 1);
        *a.get_mut(0, 0) = 10;
        *b.get_mut(0, 0) = 20;
        let result = std::panic::catch_unwind(|| {
            assert_frames_close!(a, b, 1);
        });
        assert!(result.is_err());
    }
}
