//! Loop geometry for kernels that run independently per batch row.
//!
//! A split axis divides the input shape into leading "batch" dimensions and
//! trailing "feature" dimensions. The extents are computed once at bind and
//! reused by every exec.

use nnkit_core::{NnError, Result, Shape};

/// Precomputed iteration extents: row → input feature → output feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopGeometry {
    /// Number of independent rows: product of `input.shape[..base_axis]`.
    pub base_loop_size: usize,
    /// Flattened per-row input features: product of `input.shape[base_axis..]`.
    pub input_loop_size: usize,
    /// Flattened per-row output features: product of `output.shape[base_axis..]`.
    pub output_loop_size: usize,
    /// Total output elements.
    pub output_size: usize,
}

impl LoopGeometry {
    /// Split `input` and `output` at `base_axis`.
    ///
    /// `base_axis` must lie in `[0, input.ndim()]`, and the output's leading
    /// dimensions must cover the same number of rows as the input's.
    pub fn plan(input: &Shape, output: &Shape, base_axis: i32) -> Result<Self> {
        let axis = usize::try_from(base_axis)
            .ok()
            .filter(|&a| a <= input.ndim())
            .ok_or(NnError::BaseAxisOutOfRange {
                base_axis: base_axis.into(),
                rank: input.ndim(),
            })?;

        if axis > output.ndim() {
            return Err(NnError::BaseAxisOutOfRange {
                base_axis: base_axis.into(),
                rank: output.ndim(),
            });
        }

        let overflow = |operand| NnError::ExtentOverflow { operand };
        let base_loop_size = input.leading_numel(axis).ok_or(overflow("input"))?;
        let input_loop_size = input.trailing_numel(axis).ok_or(overflow("input"))?;
        let output_rows = output.leading_numel(axis).ok_or(overflow("output"))?;
        let output_loop_size = output.trailing_numel(axis).ok_or(overflow("output"))?;
        let output_size = output.checked_numel().ok_or(overflow("output"))?;

        if output_rows != base_loop_size {
            return Err(NnError::BatchMismatch {
                expected: base_loop_size,
                got: output_rows,
            });
        }

        Ok(Self {
            base_loop_size,
            input_loop_size,
            output_loop_size,
            output_size,
        })
    }

    /// Multiply-accumulate count of one dense pass over this geometry.
    pub fn macs(&self) -> usize {
        self.base_loop_size
            .saturating_mul(self.input_loop_size)
            .saturating_mul(self.output_loop_size)
    }

    /// Element count of a dense `[input_loop_size, output_loop_size]` weight.
    pub fn weight_numel(&self) -> Option<usize> {
        self.input_loop_size.checked_mul(self.output_loop_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_matrix() {
        let g = LoopGeometry::plan(&Shape::new(&[2, 3]), &Shape::new(&[2, 4]), 1).unwrap();
        assert_eq!(g.base_loop_size, 2);
        assert_eq!(g.input_loop_size, 3);
        assert_eq!(g.output_loop_size, 4);
        assert_eq!(g.output_size, 8);
        assert_eq!(g.macs(), 24);
    }

    #[test]
    fn test_plan_flattens_trailing_dims() {
        let g = LoopGeometry::plan(&Shape::new(&[5, 2, 3, 4]), &Shape::new(&[5, 7]), 1).unwrap();
        assert_eq!(g.base_loop_size, 5);
        assert_eq!(g.input_loop_size, 24);
        assert_eq!(g.output_loop_size, 7);
    }

    #[test]
    fn test_plan_axis_zero_is_single_row() {
        let g = LoopGeometry::plan(&Shape::new(&[6]), &Shape::new(&[2]), 0).unwrap();
        assert_eq!(g.base_loop_size, 1);
        assert_eq!(g.input_loop_size, 6);
        assert_eq!(g.output_loop_size, 2);
    }

    #[test]
    fn test_plan_axis_at_rank() {
        // Every dimension is batch; each row carries one feature.
        let g = LoopGeometry::plan(&Shape::new(&[2, 3]), &Shape::new(&[2, 3]), 2).unwrap();
        assert_eq!(g.base_loop_size, 6);
        assert_eq!(g.input_loop_size, 1);
        assert_eq!(g.output_loop_size, 1);
    }

    #[test]
    fn test_plan_axis_out_of_range() {
        let input = Shape::new(&[2, 3]);
        let output = Shape::new(&[2, 4]);
        assert_eq!(
            LoopGeometry::plan(&input, &output, 3),
            Err(NnError::BaseAxisOutOfRange { base_axis: 3, rank: 2 })
        );
        assert_eq!(
            LoopGeometry::plan(&input, &output, -1),
            Err(NnError::BaseAxisOutOfRange { base_axis: -1, rank: 2 })
        );
    }

    #[test]
    fn test_plan_output_rank_too_small() {
        let err = LoopGeometry::plan(&Shape::new(&[2, 3, 4]), &Shape::new(&[6]), 2).unwrap_err();
        assert_eq!(err, NnError::BaseAxisOutOfRange { base_axis: 2, rank: 1 });
    }

    #[test]
    fn test_plan_batch_mismatch() {
        let err = LoopGeometry::plan(&Shape::new(&[2, 3]), &Shape::new(&[3, 4]), 1).unwrap_err();
        assert_eq!(err, NnError::BatchMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn test_plan_trailing_overflow() {
        let big = 1usize << (usize::BITS / 2 + 8);
        let err = LoopGeometry::plan(&Shape::new(&[0, big, big]), &Shape::new(&[0, 4]), 1).unwrap_err();
        assert_eq!(err, NnError::ExtentOverflow { operand: "input" });
        assert!(err.is_configuration());

        let err = LoopGeometry::plan(&Shape::new(&[2, 3]), &Shape::new(&[2, big, big]), 1).unwrap_err();
        assert_eq!(err, NnError::ExtentOverflow { operand: "output" });
    }

    #[test]
    fn test_weight_numel_overflow() {
        let big = 1usize << (usize::BITS / 2 + 8);
        let g = LoopGeometry::plan(&Shape::new(&[0, big]), &Shape::new(&[0, big]), 1).unwrap();
        assert_eq!(g.weight_numel(), None);
    }

    #[test]
    fn test_plan_empty_batch() {
        let g = LoopGeometry::plan(&Shape::new(&[0, 3]), &Shape::new(&[0, 4]), 1).unwrap();
        assert_eq!(g.base_loop_size, 0);
        assert_eq!(g.output_size, 0);
    }
}
