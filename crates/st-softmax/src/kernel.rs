// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Row kernels for the softmax forward and backward passes.
//!
//! Both kernels operate on the flat buffer of an already collapsed
//! `(rows, cols)` view. Rows are independent, so large batches fan out across
//! the rayon pool; each individual row is reduced serially, which keeps the
//! per-row association identical regardless of thread count.

use rayon::prelude::*;

/// Element count above which a kernel dispatch fans out across the pool.
const PAR_ELEMENTS: usize = 1 << 14;

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// One softmax row: subtract the running maximum, exponentiate, normalise.
///
/// Keeping the largest exponent at `exp(0)` guarantees a finite non-zero term
/// per row; entries that underflow to zero leave the sum at least 1. A row
/// that reduces to a non-finite maximum divides itself into NaN, which is the
/// reported result rather than an error.
#[inline]
fn softmax_row(input: &[f32], output: &mut [f32], rowmax: &mut f32) {
    let max = input.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    *rowmax = max;
    let mut sum = 0.0f32;
    for (out, &value) in output.iter_mut().zip(input.iter()) {
        let e = (value - max).exp();
        *out = e;
        sum += e;
    }
    let inv_sum = 1.0 / sum;
    for out in output.iter_mut() {
        *out *= inv_sum;
    }
}

/// One backward row: `dx = y ⊙ (dy − ⟨y, dy⟩·𝟙)`, with `dx` pre-seeded from
/// `dy` and the scalar broadcast against the ones multiplier as the dense
/// rank-1 update would.
#[inline]
fn softmax_grad_row(y: &[f32], dx: &mut [f32], ones: &[f32], coeff: f32) {
    for ((value, &prob), &one) in dx.iter_mut().zip(y.iter()).zip(ones.iter()) {
        *value = (*value - coeff * one) * prob;
    }
}

/// Numerically stable softmax over every row of `input`, written to `output`.
///
/// `row_scratch` must hold at least `rows` slots; it retains the per-row
/// maxima after the call.
pub fn softmax_rows(
    rows: usize,
    cols: usize,
    input: &[f32],
    output: &mut [f32],
    row_scratch: &mut [f32],
) {
    debug_assert_eq!(input.len(), rows * cols);
    debug_assert_eq!(output.len(), rows * cols);
    debug_assert!(row_scratch.len() >= rows);
    if rows == 0 || cols == 0 {
        return;
    }
    let scratch = &mut row_scratch[..rows];
    if rows > 1 && rows * cols >= PAR_ELEMENTS {
        output
            .par_chunks_mut(cols)
            .zip(input.par_chunks(cols))
            .zip(scratch.par_iter_mut())
            .for_each(|((out_row, in_row), slot)| softmax_row(in_row, out_row, slot));
    } else {
        for ((out_row, in_row), slot) in output
            .chunks_mut(cols)
            .zip(input.chunks(cols))
            .zip(scratch.iter_mut())
        {
            softmax_row(in_row, out_row, slot);
        }
    }
}

/// Vector-Jacobian product of softmax for every row.
///
/// `y` is the forward output, `dy` the upstream gradient; `dx` receives
/// `y ⊙ (dy − ⟨y, dy⟩·𝟙)`. `row_scratch` must hold at least `rows` slots and
/// retains the per-row inner products; `ones` must hold `cols` slots of 1.0.
/// `y` is taken as-is — callers that pass something other than a softmax
/// output get a mathematically defined but meaningless gradient.
pub fn softmax_grad_rows(
    rows: usize,
    cols: usize,
    y: &[f32],
    dy: &[f32],
    dx: &mut [f32],
    row_scratch: &mut [f32],
    ones: &[f32],
) {
    debug_assert_eq!(y.len(), rows * cols);
    debug_assert_eq!(dy.len(), rows * cols);
    debug_assert_eq!(dx.len(), rows * cols);
    debug_assert!(row_scratch.len() >= rows);
    debug_assert!(ones.len() >= cols);
    if rows == 0 || cols == 0 {
        return;
    }
    dx.copy_from_slice(dy);
    let scratch = &mut row_scratch[..rows];
    let ones = &ones[..cols];
    if rows > 1 && rows * cols >= PAR_ELEMENTS {
        dx.par_chunks_mut(cols)
            .zip(y.par_chunks(cols))
            .zip(dy.par_chunks(cols))
            .zip(scratch.par_iter_mut())
            .for_each(|(((dx_row, y_row), dy_row), slot)| {
                *slot = dot(y_row, dy_row);
                softmax_grad_row(y_row, dx_row, ones, *slot);
            });
    } else {
        for (((dx_row, y_row), dy_row), slot) in dx
            .chunks_mut(cols)
            .zip(y.chunks(cols))
            .zip(dy.chunks(cols))
            .zip(scratch.iter_mut())
        {
            *slot = dot(y_row, dy_row);
            softmax_grad_row(y_row, dx_row, ones, *slot);
        }
    }
}
