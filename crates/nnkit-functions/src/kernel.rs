//! The seam every operator implements.
//!
//! A kernel is constructed from an immutable config, bound once to its
//! input/output variables (resolving accessors and loop extents into private
//! state), executed any number of times, then released.

use nnkit_core::{NnError, Result, SharedVariable};

use crate::catalog::FunctionKind;

/// Uniform bind/exec/release contract shared by all operators.
pub trait Kernel: Send {
    fn kind(&self) -> FunctionKind;

    /// Validate the operands and build fresh resolved state.
    ///
    /// Any earlier binding is discarded first; on error the kernel is left
    /// unbound.
    fn bind(&mut self, inputs: &[SharedVariable], outputs: &[SharedVariable]) -> Result<()>;

    /// Run one pass over the bound variables.
    fn exec(&mut self) -> Result<()>;

    /// Drop resolved state. The kernel cannot be bound again afterwards.
    fn release(&mut self);

    fn is_bound(&self) -> bool;
}

/// Lifecycle holder for a kernel's resolved state.
#[derive(Debug, Default)]
pub enum Binding<S> {
    #[default]
    Unbound,
    Bound(S),
    Released,
}

impl<S> Binding<S> {
    /// Resolved state, or the lifecycle error for `function`.
    pub fn state(&self, function: &'static str) -> Result<&S> {
        match self {
            Binding::Bound(state) => Ok(state),
            Binding::Unbound => Err(NnError::NotBound(function)),
            Binding::Released => Err(NnError::Released(function)),
        }
    }

    /// Replace the current state with the result of `resolve`.
    ///
    /// The previous state is dropped before `resolve` runs.
    pub fn rebind(&mut self, function: &'static str, resolve: impl FnOnce() -> Result<S>) -> Result<()> {
        if self.is_released() {
            return Err(NnError::Released(function));
        }
        *self = Binding::Unbound;
        *self = Binding::Bound(resolve()?);
        Ok(())
    }

    pub fn release(&mut self) {
        *self = Binding::Released;
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound(_))
    }

    pub fn is_released(&self) -> bool {
        matches!(self, Binding::Released)
    }
}
