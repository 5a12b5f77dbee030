//! Numeric bodies of the operators.
//!
//! Each op comes in two forms: a direct one over raw `&[f32]` slices and a
//! generic one that reaches every element through resolved accessors.
//! Kernels pick one at bind time.

pub mod affine;
