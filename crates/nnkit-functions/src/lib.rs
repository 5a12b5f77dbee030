//! # nnkit-functions
//!
//! Operator kernels for embedded neural-network inference.
//!
//! Every operator follows one lifecycle: construct with an immutable config,
//! `bind` once to its input/output variables (resolving typed accessors and
//! loop extents), `exec` any number of times without allocating, `release`
//! on teardown.
//!
//! ## Key Features
//! - `Kernel` trait: the uniform seam a graph scheduler drives
//! - `Affine` kernel with a direct f32 path and a generic accessor path
//! - `LoopGeometry`: batch/feature extents precomputed from a split axis
//! - Full operator catalog (`FunctionKind`) with stubs for unported ops

pub mod affine;
pub mod catalog;
pub mod geometry;
pub mod kernel;
pub mod ops;

pub use affine::{Affine, AffineConfig, Strategy};
pub use catalog::{instantiate, Category, FunctionConfig, FunctionKind, UnimplementedKernel};
pub use geometry::LoopGeometry;
pub use kernel::{Binding, Kernel};
