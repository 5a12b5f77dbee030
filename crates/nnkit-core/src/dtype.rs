use std::fmt;

use serde::{Deserialize, Serialize};

/// Layout of a fixed-point element: a `bits`-wide integer holding
/// `value * 2^frac_bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedFormat {
    /// Storage width in bits. Accessors exist for 8 and 16.
    pub bits: u8,
    /// Number of fractional bits (the binary point position).
    pub frac_bits: u8,
    pub signed: bool,
}

impl FixedFormat {
    pub const fn q8(frac_bits: u8) -> Self {
        Self { bits: 8, frac_bits, signed: true }
    }

    pub const fn q16(frac_bits: u8) -> Self {
        Self { bits: 16, frac_bits, signed: true }
    }

    /// Value of one least-significant step.
    pub fn step(&self) -> f32 {
        (-(self.frac_bits as i32) as f32).exp2()
    }

    /// Raw integer range representable with this layout.
    pub fn raw_range(&self) -> (i64, i64) {
        let bits = self.bits.min(63) as u32;
        if self.signed {
            let half = 1i64 << bits.saturating_sub(1);
            (-half, half - 1)
        } else {
            (0, (1i64 << bits) - 1)
        }
    }
}

/// Storage representation of a variable's scalars.
///
/// Kernels never branch on this per element; it is matched once when a
/// [`Reader`](crate::access::Reader) or [`Writer`](crate::access::Writer)
/// is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit IEEE 754 single-precision float
    F32,
    /// 16-bit IEEE 754 half-precision float
    F16,
    /// Fixed-point integer with a binary point
    Fixed(FixedFormat),
    /// One bit per element, {-1, +1}, packed 8 per byte
    Binary,
}

impl DType {
    /// Size in bytes of a single element, or None for bit-packed types.
    pub fn element_size(&self) -> Option<usize> {
        match self {
            DType::F32 => Some(4),
            DType::F16 => Some(2),
            DType::Fixed(fmt) => Some((fmt.bits as usize).div_ceil(8)),
            DType::Binary => None,
        }
    }

    /// Number of bytes needed to store `n` elements of this dtype.
    pub fn storage_bytes(&self, n: usize) -> usize {
        match self.element_size() {
            Some(size) => size.saturating_mul(n),
            None => n.div_ceil(8),
        }
    }

    pub fn is_f32(&self) -> bool {
        matches!(self, DType::F32)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F16 => write!(f, "f16"),
            DType::Fixed(fmt) => {
                let sign = if fmt.signed { "q" } else { "uq" };
                write!(f, "{sign}{}.{}", fmt.bits, fmt.frac_bits)
            }
            DType::Binary => write!(f, "binary"),
        }
    }
}
