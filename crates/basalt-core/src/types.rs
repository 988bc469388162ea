//! Element types, shapes, and memory layouts for tensor descriptors.

/// Element data type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    F32,
    F16,
    BF16,
    I32,
    I8,
    U8,
    Bool,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            DataType::F32 | DataType::I32 => 4,
            DataType::F16 | DataType::BF16 => 2,
            DataType::I8 | DataType::U8 | DataType::Bool => 1,
        }
    }
}

/// A single dimension of a tensor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    /// Size known at graph construction time.
    Known(usize),

    /// Size not yet known; resolved by the caller before execution.
    Unknown,
}

impl Dim {
    /// Get the size if known.
    pub fn as_known(&self) -> Option<usize> {
        match self {
            Dim::Known(n) => Some(*n),
            Dim::Unknown => None,
        }
    }

    /// Two dimensions unify when they are equal or either is unknown.
    pub fn unifies_with(&self, other: &Dim) -> bool {
        match (self, other) {
            (Dim::Known(a), Dim::Known(b)) => a == b,
            _ => true,
        }
    }
}

impl From<usize> for Dim {
    fn from(n: usize) -> Self {
        Dim::Known(n)
    }
}

/// Tensor shape with support for partially known and fully unknown shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TensorShape {
    /// Rank is known; individual dimensions may still be unknown.
    Ranked(Vec<Dim>),

    /// Neither rank nor dimensions are known.
    Unknown,
}

impl TensorShape {
    /// Build a fully known shape from concrete sizes.
    pub fn known(dims: &[usize]) -> Self {
        TensorShape::Ranked(dims.iter().map(|&d| Dim::Known(d)).collect())
    }

    /// Number of dimensions, if known.
    pub fn rank(&self) -> Option<usize> {
        match self {
            TensorShape::Ranked(dims) => Some(dims.len()),
            TensorShape::Unknown => None,
        }
    }

    /// Check if every dimension is known.
    pub fn is_fully_known(&self) -> bool {
        match self {
            TensorShape::Ranked(dims) => dims.iter().all(|d| matches!(d, Dim::Known(_))),
            TensorShape::Unknown => false,
        }
    }

    /// Get concrete dimensions if the shape is fully known.
    pub fn known_dims(&self) -> Option<Vec<usize>> {
        match self {
            TensorShape::Ranked(dims) => dims.iter().map(Dim::as_known).collect(),
            TensorShape::Unknown => None,
        }
    }

    /// Check whether two shapes can describe the same tensor.
    pub fn unifies_with(&self, other: &TensorShape) -> bool {
        match (self, other) {
            (TensorShape::Ranked(a), TensorShape::Ranked(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.unifies_with(y))
            }
            _ => true,
        }
    }

    /// Merge two unifiable shapes, keeping every known dimension.
    pub(crate) fn refine(&self, other: &TensorShape) -> TensorShape {
        match (self, other) {
            (TensorShape::Ranked(a), TensorShape::Ranked(b)) => TensorShape::Ranked(
                a.iter()
                    .zip(b)
                    .map(|(x, y)| match x {
                        Dim::Known(_) => *x,
                        Dim::Unknown => *y,
                    })
                    .collect(),
            ),
            (TensorShape::Unknown, shape) | (shape, TensorShape::Unknown) => shape.clone(),
        }
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        TensorShape::known(&dims)
    }
}

impl From<&[usize]> for TensorShape {
    fn from(dims: &[usize]) -> Self {
        TensorShape::known(dims)
    }
}

impl<const N: usize> From<[usize; N]> for TensorShape {
    fn from(dims: [usize; N]) -> Self {
        TensorShape::known(&dims)
    }
}

impl From<Vec<Dim>> for TensorShape {
    fn from(dims: Vec<Dim>) -> Self {
        TensorShape::Ranked(dims)
    }
}

/// Memory layout of a tensor.
///
/// `Any` leaves the choice to the backend at compile time; the compiled
/// partition then reports the concrete layout the caller must allocate for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    /// Unspecified; the backend picks a concrete layout during compilation.
    #[default]
    Any,

    /// Concrete strides, in elements, one per dimension.
    Strided(Vec<i64>),

    /// Backend-private layout identified by an opaque id.
    Opaque(u64),
}

impl Layout {
    /// Dense row-major strides for the given dimensions.
    ///
    /// Returns `None` if a stride does not fit in an `i64`.
    pub fn row_major(dims: &[usize]) -> Option<Self> {
        let mut strides = vec![1i64; dims.len()];
        for i in (0..dims.len().saturating_sub(1)).rev() {
            let inner = i64::try_from(dims[i + 1].max(1)).ok()?;
            strides[i] = strides[i + 1].checked_mul(inner)?;
        }
        Some(Layout::Strided(strides))
    }

    /// Check if the layout is unspecified.
    pub fn is_any(&self) -> bool {
        matches!(self, Layout::Any)
    }

    /// Check if the layout is concrete (strided or opaque).
    pub fn is_concrete(&self) -> bool {
        !self.is_any()
    }

    /// Get the strides of a strided layout.
    pub fn strides(&self) -> Option<&[i64]> {
        match self {
            Layout::Strided(strides) => Some(strides),
            _ => None,
        }
    }

    /// Check if this is the dense row-major layout for `dims`.
    pub fn is_row_major_for(&self, dims: &[usize]) -> bool {
        Layout::row_major(dims).is_some_and(|dense| *self == dense)
    }

    /// Two layouts unify when they are equal or either is `Any`.
    pub fn unifies_with(&self, other: &Layout) -> bool {
        self.is_any() || other.is_any() || self == other
    }
}

/// Whether a tensor's contents may change between executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PropertyKind {
    /// Regular tensor; contents may differ on every execution.
    #[default]
    Variable,

    /// Contents stay the same across executions (e.g. weights).
    Constant,
}
