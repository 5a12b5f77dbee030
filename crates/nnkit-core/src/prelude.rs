//! Convenience re-exports for common nnkit-core types.
//!
//! ```rust
//! use nnkit_core::prelude::*;
//! ```

pub use crate::DType;
pub use crate::FixedFormat;
pub use crate::NnError;
pub use crate::Result;
pub use crate::Shape;
pub use crate::SharedVariable;
pub use crate::Variable;
