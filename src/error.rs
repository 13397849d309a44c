// Copyright (c) the flicker_remover Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "camera fps {fps} must be strictly greater than the power-line frequency (50Hz) for flicker removal to work"
    )]
    ConfigurationError { fps: u32 },
    #[error("invalid grid size {rows}x{cols}: both dimensions must be non-zero")]
    InvalidGridSize { rows: usize, cols: usize },
    #[error("out of bounds access ({row}, {col}) in a {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("frame shape mismatch: got {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("timestamp went backward: got {actual_ms}ms, expected close to {expected_ms}ms")]
    TimestampRegression { expected_ms: f64, actual_ms: i64 },
    #[error("not enough history: need at least {needed} processed frame(s), have {have}")]
    InsufficientHistory { needed: usize, have: usize },
    /// Reserved for accelerator-backed evaluator implementations; none of the
    /// evaluators in this crate can fail, so this variant has no live call site.
    #[error("kernel dispatch failed: {0}")]
    KernelDispatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
