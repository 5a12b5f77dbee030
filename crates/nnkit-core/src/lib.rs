//! # nnkit-core
//!
//! Storage layer for the nnkit inference kernels.
//!
//! Provides:
//! - `Variable`: a shape- and dtype-tagged buffer shared between kernels
//! - `DType`: F32, F16, fixed-point and bit-packed binary representations
//! - Typed scalar access (`access`): readers and writers resolved once per
//!   variable so kernel loops never branch on the storage type
//! - `NnError`, the error type shared by every kernel

pub mod access;
pub mod dtype;
pub mod error;
pub mod prelude;
pub mod shape;
pub mod variable;

pub use access::{resolve_reader, resolve_writer, ReadView, Reader, WriteView, Writer};
pub use dtype::{DType, FixedFormat};
pub use error::{ErrorKind, NnError};
pub use shape::Shape;
pub use variable::{SharedVariable, Variable};

pub type Result<T> = std::result::Result<T, NnError>;
