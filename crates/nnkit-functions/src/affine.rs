//! Affine (fully-connected) kernel.
//!
//! Inputs: `[x, W]` or `[x, W, b]`; output: `[y]`. The input is split at
//! `base_axis` into rows and features, `W` holds
//! `input_loop_size * output_loop_size` elements and `b` holds
//! `output_loop_size`.

use std::sync::Arc;

use nnkit_core::{resolve_reader, resolve_writer, DType, NnError, Reader, Result, SharedVariable, Variable, Writer};
use serde::{Deserialize, Serialize};

use crate::catalog::FunctionKind;
use crate::geometry::LoopGeometry;
use crate::kernel::{Binding, Kernel};
use crate::ops::affine::{affine_f32, affine_generic};

const NAME: &str = "affine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffineConfig {
    pub base_axis: i32,
}

impl Default for AffineConfig {
    fn default() -> Self {
        Self { base_axis: 1 }
    }
}

/// How exec reaches the operand storage. Fixed at bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every operand is F32: loops run over raw float slices.
    Direct,
    /// At least one operand is not F32: every element goes through an accessor.
    Generic,
}

/// A bound variable plus the accessor resolved against it.
#[derive(Debug)]
struct Operand<A> {
    var: SharedVariable,
    access: A,
    name: &'static str,
}

impl Operand<Reader> {
    fn reader(var: &SharedVariable, name: &'static str) -> Result<Self> {
        let access = resolve_reader(&var.read())?;
        Ok(Self { var: Arc::clone(var), access, name })
    }

    fn check(&self, var: &Variable) -> Result<()> {
        check_unchanged(var, self.access.dtype(), self.access.len(), self.name)
    }
}

impl Operand<Writer> {
    fn writer(var: &SharedVariable, name: &'static str) -> Result<Self> {
        let access = resolve_writer(&var.read())?;
        Ok(Self { var: Arc::clone(var), access, name })
    }

    fn check(&self, var: &Variable) -> Result<()> {
        check_unchanged(var, self.access.dtype(), self.access.len(), self.name)
    }
}

fn check_unchanged(var: &Variable, dtype: DType, len: usize, operand: &'static str) -> Result<()> {
    if var.dtype() != dtype || var.numel() != len {
        return Err(NnError::StaleBinding { operand });
    }
    Ok(())
}

/// Resolved state of a bound affine kernel.
#[derive(Debug)]
struct AffineState {
    input: Operand<Reader>,
    weight: Operand<Reader>,
    bias: Option<Operand<Reader>>,
    output: Operand<Writer>,
    geometry: LoopGeometry,
    strategy: Strategy,
}

impl AffineState {
    fn resolve(config: &AffineConfig, inputs: &[SharedVariable], outputs: &[SharedVariable]) -> Result<Self> {
        if !(2..=3).contains(&inputs.len()) {
            return Err(NnError::InputArity {
                function: NAME,
                expected: "2 or 3",
                got: inputs.len(),
            });
        }
        if outputs.len() != 1 {
            return Err(NnError::OutputArity {
                function: NAME,
                expected: "1",
                got: outputs.len(),
            });
        }
        // exec holds read locks on the inputs while writing the output.
        if let Some(input) = inputs.iter().position(|v| Arc::ptr_eq(v, &outputs[0])) {
            return Err(NnError::AliasedOutput { input });
        }

        let geometry = {
            let input = inputs[0].read();
            let output = outputs[0].read();
            LoopGeometry::plan(input.shape(), output.shape(), config.base_axis)?
        };

        let weight_len = inputs[1].read().numel();
        let expected = geometry
            .weight_numel()
            .ok_or(NnError::ExtentOverflow { operand: "weight" })?;
        if weight_len != expected {
            return Err(NnError::ElementCount {
                operand: "weight",
                expected,
                got: weight_len,
            });
        }
        if let Some(bias) = inputs.get(2) {
            let bias_len = bias.read().numel();
            if bias_len != geometry.output_loop_size {
                return Err(NnError::ElementCount {
                    operand: "bias",
                    expected: geometry.output_loop_size,
                    got: bias_len,
                });
            }
        }

        let input = Operand::reader(&inputs[0], "input")?;
        let weight = Operand::reader(&inputs[1], "weight")?;
        let bias = inputs.get(2).map(|b| Operand::reader(b, "bias")).transpose()?;
        let output = Operand::writer(&outputs[0], "output")?;

        let all_f32 = input.access.dtype().is_f32()
            && weight.access.dtype().is_f32()
            && output.access.dtype().is_f32()
            && bias.as_ref().map_or(true, |b| b.access.dtype().is_f32());
        let strategy = if all_f32 { Strategy::Direct } else { Strategy::Generic };

        Ok(Self {
            input,
            weight,
            bias,
            output,
            geometry,
            strategy,
        })
    }

    fn run(&self) -> Result<()> {
        let input = self.input.var.read();
        let weight = self.weight.var.read();
        let bias = self.bias.as_ref().map(|b| (b, b.var.read()));
        let mut output = self.output.var.write();

        self.input.check(&input)?;
        self.weight.check(&weight)?;
        if let Some((operand, var)) = &bias {
            operand.check(var)?;
        }
        self.output.check(&output)?;

        match self.strategy {
            Strategy::Direct => {
                let stale = |operand: &'static str| NnError::StaleBinding { operand };
                let x = input.as_f32_slice().ok_or_else(|| stale("input"))?;
                let w = weight.as_f32_slice().ok_or_else(|| stale("weight"))?;
                let b = match &bias {
                    Some((_, var)) => Some(var.as_f32_slice().ok_or_else(|| stale("bias"))?),
                    None => None,
                };
                let y = output.as_f32_slice_mut().ok_or_else(|| stale("output"))?;
                affine_f32(x, w, b, y, &self.geometry);
            }
            Strategy::Generic => {
                let b = bias.as_ref().map(|(operand, var)| operand.access.view(var.as_bytes()));
                affine_generic(
                    self.input.access.view(input.as_bytes()),
                    self.weight.access.view(weight.as_bytes()),
                    b,
                    self.output.access.view_mut(output.as_bytes_mut()),
                    &self.geometry,
                );
            }
        }
        Ok(())
    }
}

/// Affine kernel instance: config plus its current binding.
#[derive(Debug)]
pub struct Affine {
    config: AffineConfig,
    binding: Binding<AffineState>,
}

impl Affine {
    pub fn new(config: AffineConfig) -> Self {
        Self {
            config,
            binding: Binding::Unbound,
        }
    }

    /// Construct and bind in one step.
    pub fn bind_new(config: AffineConfig, inputs: &[SharedVariable], outputs: &[SharedVariable]) -> Result<Self> {
        let mut kernel = Self::new(config);
        kernel.bind(inputs, outputs)?;
        Ok(kernel)
    }

    pub fn config(&self) -> &AffineConfig {
        &self.config
    }

    /// Loop extents of the current binding.
    pub fn geometry(&self) -> Option<LoopGeometry> {
        self.binding.state(NAME).ok().map(|s| s.geometry)
    }

    /// Strategy chosen by the current binding.
    pub fn strategy(&self) -> Option<Strategy> {
        self.binding.state(NAME).ok().map(|s| s.strategy)
    }
}

impl Kernel for Affine {
    fn kind(&self) -> FunctionKind {
        FunctionKind::Affine
    }

    fn bind(&mut self, inputs: &[SharedVariable], outputs: &[SharedVariable]) -> Result<()> {
        let config = self.config;
        match self.binding.rebind(NAME, || AffineState::resolve(&config, inputs, outputs)) {
            Ok(()) => {
                if let Ok(state) = self.binding.state(NAME) {
                    let g = &state.geometry;
                    tracing::debug!(
                        "affine bound: base_axis={} rows={} in={} out={} strategy={:?}",
                        config.base_axis,
                        g.base_loop_size,
                        g.input_loop_size,
                        g.output_loop_size,
                        state.strategy
                    );
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("affine bind failed: {}", e);
                Err(e)
            }
        }
    }

    fn exec(&mut self) -> Result<()> {
        let state = self.binding.state(NAME)?;
        tracing::trace!("exec affine ({:?})", state.strategy);
        state.run()
    }

    fn release(&mut self) {
        self.binding.release();
    }

    fn is_bound(&self) -> bool {
        self.binding.is_bound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nnkit_core::FixedFormat;

    fn f32_var(shape: &[usize], data: &[f32]) -> SharedVariable {
        Variable::from_f32(shape, data).unwrap().shared()
    }

    #[test]
    fn test_default_config() {
        assert_eq!(AffineConfig::default().base_axis, 1);
    }

    #[test]
    fn test_bind_selects_direct() {
        let x = f32_var(&[2, 3], &[0.0; 6]);
        let w = f32_var(&[3, 4], &[0.0; 12]);
        let y = Variable::zeros([2, 4], DType::F32).shared();
        let k = Affine::bind_new(AffineConfig::default(), &[x, w], &[y]).unwrap();
        assert_eq!(k.strategy(), Some(Strategy::Direct));
        assert_eq!(k.geometry().map(|g| g.output_loop_size), Some(4));
    }

    #[test]
    fn test_bind_selects_generic_for_quantized_bias() {
        let x = f32_var(&[1, 2], &[0.0; 2]);
        let w = f32_var(&[2, 2], &[0.0; 4]);
        let b = Variable::zeros([2], DType::Fixed(FixedFormat::q8(4))).shared();
        let y = Variable::zeros([1, 2], DType::F32).shared();
        let k = Affine::bind_new(AffineConfig::default(), &[x, w, b], &[y]).unwrap();
        assert_eq!(k.strategy(), Some(Strategy::Generic));
    }

    #[test]
    fn test_bind_rejects_weight_size() {
        let x = f32_var(&[2, 3], &[0.0; 6]);
        let w = f32_var(&[3, 3], &[0.0; 9]);
        let y = Variable::zeros([2, 4], DType::F32).shared();
        let err = Affine::bind_new(AffineConfig::default(), &[x, w], &[y]).unwrap_err();
        assert_eq!(err, NnError::ElementCount { operand: "weight", expected: 12, got: 9 });
    }

    #[test]
    fn test_bind_rejects_bias_size() {
        let x = f32_var(&[2, 3], &[0.0; 6]);
        let w = f32_var(&[3, 4], &[0.0; 12]);
        let b = f32_var(&[3], &[0.0; 3]);
        let y = Variable::zeros([2, 4], DType::F32).shared();
        let err = Affine::bind_new(AffineConfig::default(), &[x, w, b], &[y]).unwrap_err();
        assert_eq!(err, NnError::ElementCount { operand: "bias", expected: 4, got: 3 });
    }

    #[test]
    fn test_bind_rejects_aliased_output() {
        let x = f32_var(&[1, 2], &[0.0; 2]);
        let w = f32_var(&[2, 2], &[0.0; 4]);
        let err = Affine::bind_new(AffineConfig::default(), &[x.clone(), w], &[x]).unwrap_err();
        assert_eq!(err, NnError::AliasedOutput { input: 0 });
    }

    #[test]
    fn test_bind_rejects_unsupported_dtype() {
        let fmt = FixedFormat { bits: 4, frac_bits: 2, signed: true };
        let x = f32_var(&[1, 2], &[0.0; 2]);
        let w = Variable::zeros([2, 2], DType::Fixed(fmt)).shared();
        let y = Variable::zeros([1, 2], DType::F32).shared();
        let err = Affine::bind_new(AffineConfig::default(), &[x, w], &[y]).unwrap_err();
        assert_eq!(err, NnError::UnsupportedDType(DType::Fixed(fmt)));
    }

    #[test]
    fn test_exec_detects_stale_binding() {
        let x = f32_var(&[1, 2], &[1.0, 2.0]);
        let w = f32_var(&[2, 1], &[1.0, 1.0]);
        let y = Variable::zeros([1, 1], DType::F32).shared();
        let mut k = Affine::bind_new(AffineConfig::default(), &[x.clone(), w], &[y]).unwrap();
        k.exec().unwrap();

        *x.write() = Variable::zeros([1, 2], DType::F16);
        assert_eq!(k.exec(), Err(NnError::StaleBinding { operand: "input" }));
    }

    #[test]
    fn test_release_is_terminal() {
        let x = f32_var(&[1, 1], &[1.0]);
        let w = f32_var(&[1, 1], &[1.0]);
        let y = Variable::zeros([1, 1], DType::F32).shared();
        let mut k = Affine::bind_new(AffineConfig::default(), &[x.clone(), w.clone()], &[y.clone()]).unwrap();
        k.release();
        k.release();
        assert!(!k.is_bound());
        assert_eq!(k.exec(), Err(NnError::Released("affine")));
        assert_eq!(k.bind(&[x, w], &[y]), Err(NnError::Released("affine")));
        assert_eq!(k.config().base_axis, 1);
    }
}
