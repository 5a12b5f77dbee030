use smallvec::SmallVec;
use std::fmt;

/// Variable shape with stack-allocated storage for ≤4 dimensions.
///
/// Dimensions may be zero. A rank-0 shape describes a single scalar.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Create a new shape from dimensions.
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
        }
    }

    /// Scalar shape (0 dimensions).
    pub fn scalar() -> Self {
        Self {
            dims: SmallVec::new(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements, saturating at `usize::MAX`.
    pub fn numel(&self) -> usize {
        checked_product(&self.dims).unwrap_or(usize::MAX)
    }

    /// Total number of elements, or None if the product overflows `usize`.
    pub fn checked_numel(&self) -> Option<usize> {
        checked_product(&self.dims)
    }

    /// Get dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Get size of a specific dimension.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }

    /// Product of the dimensions before `axis`.
    ///
    /// None if `axis > ndim` or the product overflows `usize`.
    pub fn leading_numel(&self, axis: usize) -> Option<usize> {
        self.dims.get(..axis).and_then(checked_product)
    }

    /// Product of the dimensions from `axis` on.
    ///
    /// None if `axis > ndim` or the product overflows `usize`.
    pub fn trailing_numel(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis..).and_then(checked_product)
    }

    /// Whether this is a scalar (0-dimensional).
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }
}

/// Any zero extent makes the product zero, whatever the other dims are.
fn checked_product(dims: &[usize]) -> Option<usize> {
    if dims.contains(&0) {
        return Some(0);
    }
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.dims.as_slice())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape {
            dims: SmallVec::from_vec(dims),
        }
    }
}

macro_rules! impl_shape_from_array {
    ($($n:expr),*) => {
        $(
            impl From<[usize; $n]> for Shape {
                fn from(dims: [usize; $n]) -> Self {
                    Shape::new(&dims)
                }
            }
        )*
    };
}

impl_shape_from_array!(0, 1, 2, 3, 4, 5, 6);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar() {
        let s = Shape::scalar();
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.numel(), 1);
        assert!(s.is_scalar());
    }

    #[test]
    fn test_basic_shape() {
        let s = Shape::new(&[2, 3, 4]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 24);
        assert_eq!(s.dim(2), Some(4));
        assert_eq!(s.dim(3), None);
    }

    #[test]
    fn test_zero_extent() {
        let s = Shape::new(&[0, 5]);
        assert_eq!(s.numel(), 0);
        assert_eq!(s.leading_numel(1), Some(0));
        assert_eq!(s.trailing_numel(1), Some(5));
    }

    #[test]
    fn test_split_products() {
        let s = Shape::new(&[2, 3, 4]);
        assert_eq!(s.leading_numel(0), Some(1));
        assert_eq!(s.trailing_numel(0), Some(24));
        assert_eq!(s.leading_numel(2), Some(6));
        assert_eq!(s.trailing_numel(2), Some(4));
        assert_eq!(s.leading_numel(3), Some(24));
        assert_eq!(s.trailing_numel(3), Some(1));
        assert_eq!(s.leading_numel(4), None);
        assert_eq!(s.trailing_numel(4), None);
    }

    #[test]
    fn test_split_products_overflow() {
        let big = 1usize << (usize::BITS / 2 + 8);
        let s = Shape::new(&[0, big, big]);
        assert_eq!(s.numel(), 0);
        assert_eq!(s.checked_numel(), Some(0));
        assert_eq!(s.leading_numel(1), Some(0));
        assert_eq!(s.trailing_numel(1), None);

        let s = Shape::new(&[big, big, 0]);
        assert_eq!(s.checked_numel(), Some(0));
        assert_eq!(s.leading_numel(2), None);

        let s = Shape::new(&[big, big]);
        assert_eq!(s.checked_numel(), None);
        assert_eq!(s.numel(), usize::MAX);
    }

    #[test]
    fn test_from_array() {
        let s: Shape = [2, 3].into();
        assert_eq!(s.dims(), &[2, 3]);
        assert_eq!(format!("{s}"), "[2, 3]");
    }
}
