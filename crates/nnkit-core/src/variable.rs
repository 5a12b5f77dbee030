use std::sync::Arc;

use parking_lot::RwLock;

use crate::access::resolve_codec;
use crate::{DType, NnError, Result, Shape};

/// A variable shared between the kernel that produces it and the kernels
/// that consume it. The graph owns it; kernels keep clones of the `Arc`.
pub type SharedVariable = Arc<RwLock<Variable>>;

/// A shape- and dtype-tagged buffer flowing between kernels.
///
/// Storage is backed by `u32` words so the `f32` view of an F32 variable is
/// always aligned. The byte length may exceed what the shape needs.
#[derive(Debug, Clone)]
pub struct Variable {
    shape: Shape,
    dtype: DType,
    words: Vec<u32>,
    nbytes: usize,
}

impl Variable {
    /// Allocate a zero-filled variable.
    pub fn zeros(shape: impl Into<Shape>, dtype: DType) -> Self {
        let shape = shape.into();
        let nbytes = dtype.storage_bytes(shape.numel());
        Self {
            words: vec![0u32; nbytes.div_ceil(4)],
            shape,
            dtype,
            nbytes,
        }
    }

    /// Create an F32 variable holding `data` in row-major order.
    pub fn from_f32(shape: impl Into<Shape>, data: &[f32]) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.numel() {
            return Err(NnError::ElementCount {
                operand: "data",
                expected: shape.numel(),
                got: data.len(),
            });
        }
        Ok(Self {
            words: data.iter().map(|v| v.to_bits()).collect(),
            nbytes: data.len() * 4,
            shape,
            dtype: DType::F32,
        })
    }

    /// Wrap native-encoded bytes. `bytes` may be longer than the shape needs.
    pub fn from_bytes(shape: impl Into<Shape>, dtype: DType, bytes: &[u8]) -> Result<Self> {
        let shape = shape.into();
        let expected = dtype.storage_bytes(shape.numel());
        if bytes.len() < expected {
            return Err(NnError::BufferTooSmall {
                dtype,
                numel: shape.numel(),
                expected,
                got: bytes.len(),
            });
        }
        let mut words = vec![0u32; bytes.len().div_ceil(4)];
        bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            shape,
            dtype,
            words,
            nbytes: bytes.len(),
        })
    }

    /// Encode `data` into a new variable of the given dtype.
    pub fn quantize_from_f32(shape: impl Into<Shape>, dtype: DType, data: &[f32]) -> Result<Self> {
        let mut var = Self::zeros(shape, dtype);
        var.assign_f32(data)?;
        Ok(var)
    }

    /// Overwrite every element from `data`, encoding through this variable's dtype.
    pub fn assign_f32(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != self.numel() {
            return Err(NnError::ElementCount {
                operand: "data",
                expected: self.numel(),
                got: data.len(),
            });
        }
        let codec = resolve_codec(self.dtype)?;
        let buf = self.as_bytes_mut();
        for (i, &v) in data.iter().enumerate() {
            codec.encode(buf, i, v);
        }
        Ok(())
    }

    /// Move this variable behind a shared lock.
    pub fn shared(self) -> SharedVariable {
        Arc::new(RwLock::new(self))
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of logical elements.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Raw native storage.
    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u32, u8>(&self.words)[..self.nbytes]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u32, u8>(&mut self.words)[..self.nbytes]
    }

    /// Interpret storage as `numel` f32 values. None unless dtype is F32.
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        if self.dtype != DType::F32 {
            return None;
        }
        let n = self.numel();
        Some(bytemuck::cast_slice(&self.words[..n]))
    }

    pub fn as_f32_slice_mut(&mut self) -> Option<&mut [f32]> {
        if self.dtype != DType::F32 {
            return None;
        }
        let n = self.numel();
        Some(bytemuck::cast_slice_mut(&mut self.words[..n]))
    }

    /// Read one element as f32. Resolves an accessor per call; kernels
    /// resolve once at bind instead.
    pub fn read(&self, index: usize) -> Result<f32> {
        self.check_index(index)?;
        Ok(resolve_codec(self.dtype)?.decode(self.as_bytes(), index))
    }

    /// Write one element, encoding through this variable's dtype.
    pub fn write(&mut self, index: usize, value: f32) -> Result<()> {
        self.check_index(index)?;
        let codec = resolve_codec(self.dtype)?;
        codec.encode(self.as_bytes_mut(), index, value);
        Ok(())
    }

    /// Decode every element.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        if let Some(values) = self.as_f32_slice() {
            return Ok(values.to_vec());
        }
        let codec = resolve_codec(self.dtype)?;
        let buf = self.as_bytes();
        Ok((0..self.numel()).map(|i| codec.decode(buf, i)).collect())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.numel() {
            return Err(NnError::OutOfBounds { index, len: self.numel() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FixedFormat;

    #[test]
    fn test_zeros() {
        let v = Variable::zeros([2, 3], DType::F32);
        assert_eq!(v.numel(), 6);
        assert_eq!(v.as_bytes().len(), 24);
        assert_eq!(v.as_f32_slice().unwrap(), &[0.0; 6]);
    }

    #[test]
    fn test_from_f32_len_mismatch() {
        let err = Variable::from_f32([2, 2], &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, NnError::ElementCount { operand: "data", expected: 4, got: 3 });
    }

    #[test]
    fn test_from_bytes_capacity() {
        let bytes = [0u8; 7];
        let v = Variable::from_bytes([3], DType::F16, &bytes).unwrap();
        assert_eq!(v.as_bytes().len(), 7);
        let err = Variable::from_bytes([4], DType::F16, &bytes).unwrap_err();
        assert!(matches!(err, NnError::BufferTooSmall { expected: 8, got: 7, .. }));
    }

    #[test]
    fn test_f32_view_only_for_f32() {
        let v = Variable::zeros([4], DType::Binary);
        assert!(v.as_f32_slice().is_none());
        assert_eq!(v.as_bytes().len(), 1);
    }

    #[test]
    fn test_read_write_uniform() {
        let mut v = Variable::zeros([4], DType::Fixed(FixedFormat::q16(8)));
        v.write(1, 0.5).unwrap();
        assert_eq!(v.read(1).unwrap(), 0.5);
        assert_eq!(v.read(4), Err(NnError::OutOfBounds { index: 4, len: 4 }));
        assert!(v.write(9, 1.0).is_err());
    }

    #[test]
    fn test_quantize_from_f32() {
        let v = Variable::quantize_from_f32([4], DType::Binary, &[0.3, -0.2, 0.0, -7.0]).unwrap();
        assert_eq!(v.to_f32_vec().unwrap(), vec![1.0, -1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_unsupported_read() {
        let fmt = FixedFormat { bits: 4, frac_bits: 0, signed: true };
        let v = Variable::zeros([2], DType::Fixed(fmt));
        assert_eq!(v.read(0), Err(NnError::UnsupportedDType(DType::Fixed(fmt))));
    }

    #[test]
    fn test_shared_roundtrip() {
        let shared = Variable::from_f32([2], &[1.0, 2.0]).unwrap().shared();
        shared.write().write(0, 5.0).unwrap();
        assert_eq!(shared.read().to_f32_vec().unwrap(), vec![5.0, 2.0]);
    }
}
