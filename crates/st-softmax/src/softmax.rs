// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Softmax operator with reusable per-instance scratch state.

use crate::collapse::{collapse, Collapsed};
use crate::kernel;
use crate::observability::emit_kernel_event;
use crate::tensor::{PureResult, Tensor, TensorError};

/// Numerically stable softmax over a configurable axis, paired with the
/// analytic vector-Jacobian product as its backward pass.
///
/// The input is collapsed into a `(rows, cols)` view before the configured
/// axis; every row of that view becomes a probability distribution. The
/// instance owns two scratch buffers — a per-row scalar and a ones
/// multiplier — that are resized lazily whenever the collapsed view changes,
/// so repeated invocations on same-shaped tensors allocate nothing.
#[derive(Clone, Debug)]
pub struct Softmax {
    axis: isize,
    row_scratch: Vec<f32>,
    ones: Vec<f32>,
}

impl Default for Softmax {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Softmax {
    /// Creates an operator that collapses its input before `axis`. Negative
    /// axes count from the back; the range check happens per invocation since
    /// it depends on the tensor rank.
    pub fn new(axis: isize) -> Self {
        Self {
            axis,
            row_scratch: Vec::new(),
            ones: Vec::new(),
        }
    }

    /// Returns the configured axis.
    pub fn axis(&self) -> isize {
        self.axis
    }

    fn reserve(&mut self, view: Collapsed) {
        if self.row_scratch.len() != view.rows {
            self.row_scratch.resize(view.rows, 0.0);
        }
        if self.ones.len() != view.cols {
            self.ones.clear();
            self.ones.resize(view.cols, 1.0);
        }
    }

    /// Runs the forward pass into a freshly allocated tensor.
    pub fn forward(&mut self, input: &Tensor) -> PureResult<Tensor> {
        let mut output = Tensor::zeros(input.dims());
        self.forward_into(input, &mut output)?;
        Ok(output)
    }

    /// Runs the forward pass into a caller-owned tensor of matching shape.
    ///
    /// On failure nothing is written to `output`.
    pub fn forward_into(&mut self, input: &Tensor, output: &mut Tensor) -> PureResult<()> {
        if output.dims() != input.dims() {
            return Err(TensorError::ShapeMismatch {
                left: input.dims().to_vec(),
                right: output.dims().to_vec(),
            });
        }
        let view = collapse(input.dims(), self.axis)?;
        self.reserve(view);
        kernel::softmax_rows(
            view.rows,
            view.cols,
            input.data(),
            output.data_mut(),
            &mut self.row_scratch,
        );
        emit_kernel_event("softmax_forward", input.dims(), view);
        Ok(())
    }

    /// Backpropagates an upstream gradient through the forward output.
    ///
    /// `output` is the tensor the forward pass produced, `grad_output` the
    /// gradient with respect to it. The forward input is not needed: the
    /// Jacobian of softmax is a function of its output alone.
    pub fn backward(&mut self, output: &Tensor, grad_output: &Tensor) -> PureResult<Tensor> {
        let mut grad_input = Tensor::zeros(output.dims());
        self.backward_into(output, grad_output, &mut grad_input)?;
        Ok(grad_input)
    }

    /// Backpropagates into a caller-owned gradient tensor of matching shape.
    ///
    /// `output` is never validated as a probability distribution; passing
    /// anything other than a forward result yields a mathematically defined
    /// but meaningless gradient. On failure nothing is written to
    /// `grad_input`.
    pub fn backward_into(
        &mut self,
        output: &Tensor,
        grad_output: &Tensor,
        grad_input: &mut Tensor,
    ) -> PureResult<()> {
        if grad_output.dims() != output.dims() {
            return Err(TensorError::ShapeMismatch {
                left: output.dims().to_vec(),
                right: grad_output.dims().to_vec(),
            });
        }
        if grad_input.dims() != output.dims() {
            return Err(TensorError::ShapeMismatch {
                left: output.dims().to_vec(),
                right: grad_input.dims().to_vec(),
            });
        }
        let view = collapse(output.dims(), self.axis)?;
        self.reserve(view);
        kernel::softmax_grad_rows(
            view.rows,
            view.cols,
            output.data(),
            grad_output.data(),
            grad_input.data_mut(),
            &mut self.row_scratch,
            &self.ones,
        );
        emit_kernel_event("softmax_backward", output.dims(), view);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < tol, "expected {e}, got {a}");
        }
    }

    #[test]
    fn forward_rows_sum_to_one() {
        let mut op = Softmax::new(1);
        let input = Tensor::from_vec(vec![2, 3], vec![1.0, 2.0, 3.0, -0.5, 0.0, 0.5]).unwrap();
        let output = op.forward(&input).unwrap();
        for row in output.data().chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
            assert!(row.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn identical_rows_produce_identical_distributions() {
        let mut op = Softmax::new(1);
        let input = Tensor::from_vec(vec![2, 3], vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]).unwrap();
        let output = op.forward(&input).unwrap();
        let (first, second) = output.data().split_at(3);
        assert_eq!(first, second);
    }

    #[test]
    fn trivial_column_view_is_all_ones() {
        // axis == rank collapses every dimension into rows, leaving cols == 1.
        let mut op = Softmax::new(2);
        let input = Tensor::from_vec(vec![2, 2], vec![-7.0, 0.0, 3.5, 100.0]).unwrap();
        let output = op.forward(&input).unwrap();
        assert_eq!(output.data(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn backward_matches_the_jacobian_formula() {
        let mut op = Softmax::new(1);
        let input = Tensor::from_vec(vec![1, 3], vec![1.0, 2.0, 3.0]).unwrap();
        let output = op.forward(&input).unwrap();
        let grad_output = Tensor::from_vec(vec![1, 3], vec![1.0, 0.0, 0.0]).unwrap();
        let grad_input = op.backward(&output, &grad_output).unwrap();

        assert_close(output.data(), &[0.0900, 0.2447, 0.6652], 1e-3);
        assert_close(grad_input.data(), &[0.0819, -0.0220, -0.0599], 1e-3);
        let sum: f32 = grad_input.data().iter().sum();
        assert!(sum.abs() < 1e-6);
    }

    #[test]
    fn uniform_upstream_gradient_vanishes() {
        let mut op = Softmax::new(1);
        let input = Tensor::from_vec(vec![1, 3], vec![0.3, -1.2, 2.0]).unwrap();
        let output = op.forward(&input).unwrap();
        let grad_output = Tensor::from_vec(vec![1, 3], vec![5.0, 5.0, 5.0]).unwrap();
        let grad_input = op.backward(&output, &grad_output).unwrap();
        for value in grad_input.data() {
            assert!(value.abs() < 1e-6);
        }
    }

    #[test]
    fn empty_batches_round_trip() {
        let mut op = Softmax::new(1);
        let input = Tensor::zeros(vec![0, 5]);
        let output = op.forward(&input).unwrap();
        assert_eq!(output.dims(), &[0, 5]);

        let grad = op.backward(&output, &output.clone()).unwrap();
        assert_eq!(grad.dims(), &[0, 5]);
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        let mut op = Softmax::new(1);
        let y = Tensor::zeros(vec![2, 3]);
        let dy = Tensor::zeros(vec![3, 2]);
        let err = op.backward(&y, &dy).unwrap_err();
        assert_eq!(
            err,
            TensorError::ShapeMismatch {
                left: vec![2, 3],
                right: vec![3, 2]
            }
        );

        let input = Tensor::zeros(vec![2, 3]);
        let mut wrong = Tensor::zeros(vec![2, 4]);
        assert!(op.forward_into(&input, &mut wrong).is_err());
    }

    #[test]
    fn invalid_axes_are_rejected() {
        let mut op = Softmax::new(4);
        let input = Tensor::zeros(vec![2, 3]);
        let err = op.forward(&input).unwrap_err();
        assert_eq!(err, TensorError::AxisOutOfRange { axis: 4, rank: 2 });
    }

    #[test]
    fn scratch_is_reused_and_resized_across_invocations() {
        let mut op = Softmax::new(1);
        let small = Tensor::random_uniform(vec![2, 3], -1.0, 1.0, Some(3)).unwrap();
        op.forward(&small).unwrap();
        assert_eq!(op.row_scratch.len(), 2);
        assert_eq!(op.ones.len(), 3);

        let large = Tensor::random_uniform(vec![4, 7], -1.0, 1.0, Some(4)).unwrap();
        op.forward(&large).unwrap();
        assert_eq!(op.row_scratch.len(), 4);
        assert_eq!(op.ones.len(), 7);
        assert!(op.ones.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn default_axis_is_one() {
        let op = Softmax::default();
        assert_eq!(op.axis(), 1);
    }
}
