//! Typed scalar access.
//!
//! Every storage representation gets one [`ScalarCodec`] translating between
//! its native bytes and an `f32`. A kernel resolves a [`Reader`] or
//! [`Writer`] per bound variable once, at bind time, and its inner loops
//! then pay a single virtual call per element with no dtype inspection.

use std::fmt;
use std::sync::Arc;

use half::f16;

use crate::{DType, FixedFormat, NnError, Result, Variable};

/// Decode/encode scalars of one storage representation.
///
/// `index` is a flat element offset. Callers guarantee it is in range for
/// the buffer; implementations may panic otherwise.
pub trait ScalarCodec: Send + Sync + fmt::Debug {
    fn decode(&self, buf: &[u8], index: usize) -> f32;
    fn encode(&self, buf: &mut [u8], index: usize, value: f32);
}

#[derive(Debug)]
struct F32Codec;

impl ScalarCodec for F32Codec {
    #[inline]
    fn decode(&self, buf: &[u8], index: usize) -> f32 {
        let off = index * 4;
        bytemuck::pod_read_unaligned(&buf[off..off + 4])
    }

    #[inline]
    fn encode(&self, buf: &mut [u8], index: usize, value: f32) {
        let off = index * 4;
        buf[off..off + 4].copy_from_slice(&value.to_ne_bytes());
    }
}

#[derive(Debug)]
struct F16Codec;

impl ScalarCodec for F16Codec {
    #[inline]
    fn decode(&self, buf: &[u8], index: usize) -> f32 {
        let off = index * 2;
        f16::from_bits(bytemuck::pod_read_unaligned(&buf[off..off + 2])).to_f32()
    }

    #[inline]
    fn encode(&self, buf: &mut [u8], index: usize, value: f32) {
        let off = index * 2;
        buf[off..off + 2].copy_from_slice(&f16::from_f32(value).to_bits().to_ne_bytes());
    }
}

/// Scaling shared by the fixed-point codecs.
#[derive(Debug, Clone, Copy)]
struct FixedScale {
    to_raw: f32,
    to_value: f32,
    min: f32,
    max: f32,
}

impl FixedScale {
    fn new(fmt: FixedFormat) -> Self {
        let (min, max) = fmt.raw_range();
        let step = fmt.step();
        Self {
            to_raw: 1.0 / step,
            to_value: step,
            min: min as f32,
            max: max as f32,
        }
    }

    /// Round half away from zero, then saturate.
    #[inline]
    fn quantize(&self, value: f32) -> f32 {
        (value * self.to_raw).round().clamp(self.min, self.max)
    }
}

#[derive(Debug)]
struct Fixed8Codec {
    scale: FixedScale,
    signed: bool,
}

impl ScalarCodec for Fixed8Codec {
    #[inline]
    fn decode(&self, buf: &[u8], index: usize) -> f32 {
        let raw = buf[index];
        let raw = if self.signed { raw as i8 as f32 } else { raw as f32 };
        raw * self.scale.to_value
    }

    #[inline]
    fn encode(&self, buf: &mut [u8], index: usize, value: f32) {
        let q = self.scale.quantize(value);
        buf[index] = if self.signed { q as i8 as u8 } else { q as u8 };
    }
}

#[derive(Debug)]
struct Fixed16Codec {
    scale: FixedScale,
    signed: bool,
}

impl ScalarCodec for Fixed16Codec {
    #[inline]
    fn decode(&self, buf: &[u8], index: usize) -> f32 {
        let off = index * 2;
        let bits: u16 = bytemuck::pod_read_unaligned(&buf[off..off + 2]);
        let raw = if self.signed { bits as i16 as f32 } else { bits as f32 };
        raw * self.scale.to_value
    }

    #[inline]
    fn encode(&self, buf: &mut [u8], index: usize, value: f32) {
        let off = index * 2;
        let q = self.scale.quantize(value);
        let bits = if self.signed { q as i16 as u16 } else { q as u16 };
        buf[off..off + 2].copy_from_slice(&bits.to_ne_bytes());
    }
}

/// Bit-packed ±1, LSB first within each byte.
#[derive(Debug)]
struct BinaryCodec;

impl ScalarCodec for BinaryCodec {
    #[inline]
    fn decode(&self, buf: &[u8], index: usize) -> f32 {
        if (buf[index / 8] >> (index % 8)) & 1 == 1 {
            1.0
        } else {
            -1.0
        }
    }

    #[inline]
    fn encode(&self, buf: &mut [u8], index: usize, value: f32) {
        let mask = 1u8 << (index % 8);
        if value >= 0.0 {
            buf[index / 8] |= mask;
        } else {
            buf[index / 8] &= !mask;
        }
    }
}

/// Select the codec for `dtype`. This is the only place dtypes are matched.
pub fn resolve_codec(dtype: DType) -> Result<Arc<dyn ScalarCodec>> {
    match dtype {
        DType::F32 => Ok(Arc::new(F32Codec)),
        DType::F16 => Ok(Arc::new(F16Codec)),
        DType::Binary => Ok(Arc::new(BinaryCodec)),
        DType::Fixed(fmt) if fmt.frac_bits < 32 => {
            let scale = FixedScale::new(fmt);
            match fmt.bits {
                8 => Ok(Arc::new(Fixed8Codec { scale, signed: fmt.signed })),
                16 => Ok(Arc::new(Fixed16Codec { scale, signed: fmt.signed })),
                _ => Err(NnError::UnsupportedDType(dtype)),
            }
        }
        DType::Fixed(_) => Err(NnError::UnsupportedDType(dtype)),
    }
}

/// Resolved read access to one variable's storage.
#[derive(Debug, Clone)]
pub struct Reader {
    codec: Arc<dyn ScalarCodec>,
    dtype: DType,
    len: usize,
}

impl Reader {
    #[inline]
    pub fn read(&self, buf: &[u8], index: usize) -> f32 {
        debug_assert!(index < self.len, "read index {index} out of bounds for {} elements", self.len);
        self.codec.decode(buf, index)
    }

    pub fn checked_read(&self, buf: &[u8], index: usize) -> Result<f32> {
        if index >= self.len {
            return Err(NnError::OutOfBounds { index, len: self.len });
        }
        Ok(self.codec.decode(buf, index))
    }

    /// Dtype this reader was resolved against.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Element count of the variable this reader was resolved against.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Resolved read/write access to one variable's storage.
///
/// Accumulating kernels read back what they wrote, so a writer can also read.
#[derive(Debug, Clone)]
pub struct Writer {
    codec: Arc<dyn ScalarCodec>,
    dtype: DType,
    len: usize,
}

impl Writer {
    #[inline]
    pub fn write(&self, buf: &mut [u8], index: usize, value: f32) {
        debug_assert!(index < self.len, "write index {index} out of bounds for {} elements", self.len);
        self.codec.encode(buf, index, value);
    }

    #[inline]
    pub fn read(&self, buf: &[u8], index: usize) -> f32 {
        debug_assert!(index < self.len, "read index {index} out of bounds for {} elements", self.len);
        self.codec.decode(buf, index)
    }

    pub fn checked_write(&self, buf: &mut [u8], index: usize, value: f32) -> Result<()> {
        if index >= self.len {
            return Err(NnError::OutOfBounds { index, len: self.len });
        }
        self.codec.encode(buf, index, value);
        Ok(())
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A reader paired with the buffer it reads, for use inside one exec.
#[derive(Debug, Clone, Copy)]
pub struct ReadView<'a> {
    reader: &'a Reader,
    buf: &'a [u8],
}

impl ReadView<'_> {
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.reader.read(self.buf, index)
    }
}

/// A writer paired with the buffer it writes.
#[derive(Debug)]
pub struct WriteView<'a> {
    writer: &'a Writer,
    buf: &'a mut [u8],
}

impl WriteView<'_> {
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        self.writer.read(self.buf, index)
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: f32) {
        self.writer.write(self.buf, index, value);
    }
}

impl Reader {
    pub fn view<'a>(&'a self, buf: &'a [u8]) -> ReadView<'a> {
        ReadView { reader: self, buf }
    }
}

impl Writer {
    pub fn view_mut<'a>(&'a self, buf: &'a mut [u8]) -> WriteView<'a> {
        WriteView { writer: self, buf }
    }
}

/// Resolve a reader for `variable`'s declared dtype.
pub fn resolve_reader(variable: &Variable) -> Result<Reader> {
    Ok(Reader {
        codec: resolve_codec(variable.dtype())?,
        dtype: variable.dtype(),
        len: variable.numel(),
    })
}

/// Resolve a writer for `variable`'s declared dtype.
pub fn resolve_writer(variable: &Variable) -> Result<Writer> {
    Ok(Writer {
        codec: resolve_codec(variable.dtype())?,
        dtype: variable.dtype(),
        len: variable.numel(),
    })
}
