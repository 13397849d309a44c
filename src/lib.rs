// Copyright (c) the flicker_remover Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Adaptive, online removal of AC-line flicker from a stream of
//! fixed-size grayscale video frames.
//!
//! A camera running at a frame rate that is not an integer multiple of the
//! power-line frequency samples a different phase of the lighting cycle on
//! every frame, so static scene content appears to flicker. [`FlickerRemover`]
//! learns a small set of per-pixel additive correction masks online, one per
//! lighting phase, and subtracts the appropriate mask from every frame it is
//! fed so that static content becomes photometrically stable.
//!
//! The state machine is generic over [`Evaluator`], the trait executing the
//! five per-pixel kernels the algorithm is built from; [`evaluator::Cpu`]
//! walks pixels directly, [`evaluator::Parallel`] (default-on `parallel`
//! feature) splits the same work across a Rayon thread pool, standing in for
//! a data-parallel accelerator back-end. Both produce identical results.
//!
//! ```
//! use flicker_remover::{FlickerRemover, Grid};
//! use flicker_remover::evaluator::Cpu;
//!
//! # fn main() -> Result<(), flicker_remover::Error> {
//! let mut engine = FlickerRemover::new(Cpu, 150, 10, 3, 480, 640)?;
//! let frame = Grid::<u8>::new(480, 640);
//! let corrected = engine.process(&frame, 0)?;
//! assert_eq!(corrected.size(), (480, 640));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod bit_grid;
pub mod error;
pub mod evaluator;
pub mod flicker_remover;
pub mod grid;
pub mod ring_buffer;

pub use bit_grid::BitGrid;
pub use error::{Error, Result};
pub use evaluator::Evaluator;
pub use flicker_remover::FlickerRemover;
pub use grid::Grid;
pub use ring_buffer::RingBuffer;
