// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Dense row-major tensor primitive shared by the softmax kernels.
//!
//! The type is deliberately small: an ordered dimension tuple plus a flat
//! `f32` buffer. Shapes with zero-sized dimensions are valid — empty batches
//! must flow through the operators without special casing at the call site.

use core::fmt;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Result alias used throughout the crate.
pub type PureResult<T> = Result<T, TensorError>;

/// Errors emitted by tensor constructors and operator entry points.
#[derive(Clone, Debug, PartialEq)]
pub enum TensorError {
    /// Data provided to a constructor does not match the tensor shape.
    DataLength { expected: usize, got: usize },
    /// An operator was asked to combine tensors of incompatible shapes.
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
    /// The requested axis cannot be canonicalised against the tensor rank.
    AxisOutOfRange { axis: isize, rank: usize },
    /// Random initialiser bounds must be finite with `lo < hi`.
    InvalidBounds { lo: f32, hi: f32 },
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorError::DataLength { expected, got } => {
                write!(f, "data length mismatch: expected {expected}, got {got}")
            }
            TensorError::ShapeMismatch { left, right } => {
                write!(f, "tensor shape mismatch: {left:?} vs {right:?}")
            }
            TensorError::AxisOutOfRange { axis, rank } => {
                write!(
                    f,
                    "axis {axis} is outside the admissible range [-{rank}, {rank}] for rank {rank}"
                )
            }
            TensorError::InvalidBounds { lo, hi } => {
                write!(f, "invalid sampling bounds [{lo}, {hi}); bounds must be finite with lo < hi")
            }
        }
    }
}

impl std::error::Error for TensorError {}

/// Dense row-major tensor of `f32` values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    dims: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor of the given shape filled with zeros.
    pub fn zeros(dims: impl Into<Vec<usize>>) -> Self {
        let dims = dims.into();
        let len = dims.iter().product();
        Self {
            data: vec![0.0; len],
            dims,
        }
    }

    /// Wraps an existing buffer, validating it against the shape.
    pub fn from_vec(dims: impl Into<Vec<usize>>, data: Vec<f32>) -> PureResult<Self> {
        let dims = dims.into();
        let expected = dims.iter().product::<usize>();
        if expected != data.len() {
            return Err(TensorError::DataLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    /// Fills a tensor with uniform samples drawn from `[lo, hi)`. Passing a
    /// fixed `seed` keeps the draw reproducible across runs.
    pub fn random_uniform(
        dims: impl Into<Vec<usize>>,
        lo: f32,
        hi: f32,
        seed: Option<u64>,
    ) -> PureResult<Self> {
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(TensorError::InvalidBounds { lo, hi });
        }
        let dims = dims.into();
        let len: usize = dims.iter().product();
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let between = Uniform::new(lo, hi);
        let data = (0..len).map(|_| between.sample(&mut rng)).collect();
        Ok(Self { dims, data })
    }

    /// Returns the ordered dimension tuple.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Returns the total element count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` when the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Provides a read-only view of the underlying buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Provides a mutable view of the underlying buffer.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}
