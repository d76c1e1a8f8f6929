// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Numerically stable softmax and its analytic gradient over dense `f32`
//! tensors, collapsed around a configurable axis.
//!
//! The stack stays entirely in Rust: an n-dimensional tensor is viewed as a
//! `(rows, cols)` matrix around the configured axis, every row is rescaled
//! into a probability distribution with the max-subtraction trick, and the
//! backward pass applies the closed-form vector-Jacobian product
//! `y ⊙ (dy − ⟨y, dy⟩·𝟙)` to the saved forward output. The [`Softmax`]
//! operator instance owns the scratch buffers both kernels reuse across
//! invocations.

pub mod collapse;
pub mod kernel;
pub mod observability;
pub mod softmax;
pub mod tensor;

pub use collapse::{canonical_axis, collapse, Collapsed};
pub use observability::{set_kernel_observer, KernelEvent, KernelObserver};
pub use softmax::Softmax;
pub use tensor::{PureResult, Tensor, TensorError};
