//! Tensor descriptors and caller-owned tensor buffers.
//!
//! A `LogicalTensor` only *describes* a tensor (id, shape, layout, dtype);
//! it is what graphs, partitions, and compiled partitions pass around. A
//! `Tensor` pairs a fully concrete descriptor with a buffer allocated by the
//! caller and the engine that buffer lives on.

use crate::engine::Engine;
use crate::types::{DataType, Layout, PropertyKind, TensorShape};
use crate::{Error, Result};
use bytemuck::Pod;
use std::sync::{Arc, RwLock};

/// Caller-assigned tensor identifier, unique within one graph.
pub type TensorId = u64;

// ───────────────────────────── LogicalTensor ─────────────────────────────

/// Immutable description of a tensor's identity, shape, layout, and dtype.
///
/// Shape and layout may be partially unknown while the graph is built; the
/// compiled partition reports the concrete layout the backend chose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalTensor {
    /// Identifier, unique within a graph.
    pub id: TensorId,

    /// Element type.
    pub dtype: DataType,

    /// Shape (possibly partial).
    pub shape: TensorShape,

    /// Memory layout (possibly `Any`).
    pub layout: Layout,

    /// Whether contents change between executions.
    pub property: PropertyKind,
}

impl LogicalTensor {
    /// Create a variable tensor descriptor with an unspecified layout.
    pub fn new(id: TensorId, dtype: DataType, shape: impl Into<TensorShape>) -> Self {
        Self {
            id,
            dtype,
            shape: shape.into(),
            layout: Layout::Any,
            property: PropertyKind::Variable,
        }
    }

    /// Create a descriptor with fully known dims and dense row-major strides.
    ///
    /// The layout stays `Any` if the strides overflow, so no buffer can be
    /// allocated for it.
    pub fn strided_row_major(id: TensorId, dtype: DataType, dims: &[usize]) -> Self {
        let layout = Layout::row_major(dims).unwrap_or_default();
        Self::new(id, dtype, dims).with_layout(layout)
    }

    /// Create a descriptor whose shape is entirely unknown.
    pub fn unknown_shape(id: TensorId, dtype: DataType) -> Self {
        Self::new(id, dtype, TensorShape::Unknown)
    }

    /// Replace the layout.
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Replace the property kind.
    pub fn with_property(mut self, property: PropertyKind) -> Self {
        self.property = property;
        self
    }

    /// Number of dimensions, if known.
    pub fn rank(&self) -> Option<usize> {
        self.shape.rank()
    }

    /// Check if every dimension is known.
    pub fn is_fully_known(&self) -> bool {
        self.shape.is_fully_known()
    }

    /// Concrete dimensions, if fully known.
    pub fn dims(&self) -> Option<Vec<usize>> {
        self.shape.known_dims()
    }

    /// Total number of elements, if fully known and representable.
    pub fn element_count(&self) -> Option<usize> {
        self.dims()?
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Number of bytes a buffer needs to hold this tensor.
    ///
    /// `Any` is sized as dense storage. Strided layouts are sized by the
    /// span their strides cover. Returns `None` if the dims are not fully
    /// known, the layout is opaque, or the strides are malformed.
    pub fn mem_size(&self) -> Option<usize> {
        let dims = self.dims()?;
        let elements = match &self.layout {
            Layout::Any => self.element_count()?,
            Layout::Strided(strides) => {
                if strides.len() != dims.len() || strides.iter().any(|&s| s < 0) {
                    return None;
                }
                if dims.contains(&0) {
                    0
                } else {
                    let mut span = 0i64;
                    for (&dim, &stride) in dims.iter().zip(strides) {
                        let extent = i64::try_from(dim - 1).ok()?.checked_mul(stride)?;
                        span = span.checked_add(extent)?;
                    }
                    usize::try_from(span.checked_add(1)?).ok()?
                }
            }
            Layout::Opaque(_) => return None,
        };
        elements.checked_mul(self.dtype.size())
    }

    /// Check whether `other` can describe the same tensor as `self`.
    ///
    /// Ids, dtypes, and properties must match exactly; unknown dimensions
    /// and `Any` layouts unify with anything.
    pub fn is_compatible_with(&self, other: &LogicalTensor) -> bool {
        self.id == other.id
            && self.dtype == other.dtype
            && self.property == other.property
            && self.shape.unifies_with(&other.shape)
            && self.layout.unifies_with(&other.layout)
    }

    /// Merge two compatible descriptors, keeping the more specific details.
    pub fn refine(&self, other: &LogicalTensor) -> LogicalTensor {
        let layout = if self.layout.is_any() {
            other.layout.clone()
        } else {
            self.layout.clone()
        };
        LogicalTensor {
            id: self.id,
            dtype: self.dtype,
            shape: self.shape.refine(&other.shape),
            layout,
            property: self.property,
        }
    }
}

// ──────────────────────────────── Tensor ─────────────────────────────────

/// A concrete tensor: a fully known descriptor plus a caller-owned buffer.
///
/// Cloning is cheap and shares the underlying buffer, so the same tensor can
/// be the output of one execution and the input of the next.
#[derive(Debug, Clone)]
pub struct Tensor {
    desc: LogicalTensor,
    engine: Engine,
    buffer: Arc<RwLock<Vec<u8>>>,
}

impl Tensor {
    /// Wrap caller-allocated bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the descriptor has unknown dims or an
    /// `Any` layout, or if the buffer is smaller than the descriptor needs.
    pub fn new(desc: LogicalTensor, engine: Engine, data: Vec<u8>) -> Result<Self> {
        validate_buffer(&desc, data.len())?;
        Ok(Self {
            desc,
            engine,
            buffer: Arc::new(RwLock::new(data)),
        })
    }

    /// Wrap typed host data.
    pub fn from_vec<T: Pod>(desc: LogicalTensor, engine: Engine, data: Vec<T>) -> Result<Self> {
        if std::mem::size_of::<T>() != desc.dtype.size() {
            return Err(Error::InvalidArgument(format!(
                "element size {} does not match {:?} for tensor {}",
                std::mem::size_of::<T>(),
                desc.dtype,
                desc.id
            )));
        }
        let bytes = bytemuck::cast_slice::<T, u8>(data.as_slice()).to_vec();
        Self::new(desc, engine, bytes)
    }

    /// Allocate a zero-filled buffer sized from the descriptor.
    pub fn zeros(desc: LogicalTensor, engine: Engine) -> Result<Self> {
        let size = desc.mem_size().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "cannot size a buffer for tensor {} with layout {:?}",
                desc.id, desc.layout
            ))
        })?;
        Self::new(desc, engine, vec![0u8; size])
    }

    /// Reinterpret this buffer under another descriptor (shares storage).
    pub fn view(&self, desc: LogicalTensor) -> Result<Tensor> {
        validate_buffer(&desc, self.byte_len()?)?;
        Ok(Self {
            desc,
            engine: self.engine,
            buffer: Arc::clone(&self.buffer),
        })
    }

    /// Get the descriptor.
    pub fn logical_tensor(&self) -> &LogicalTensor {
        &self.desc
    }

    /// Get the tensor id.
    pub fn id(&self) -> TensorId {
        self.desc.id
    }

    /// Get the engine the buffer lives on.
    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Current buffer length in bytes.
    pub fn byte_len(&self) -> Result<usize> {
        Ok(self.lock_read()?.len())
    }

    /// Copy the buffer contents out.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.lock_read()?.clone())
    }

    /// Copy the buffer contents out as typed elements.
    pub fn to_vec<T: Pod>(&self) -> Result<Vec<T>> {
        let bytes = self.lock_read()?;
        if bytes.len() % std::mem::size_of::<T>() != 0 {
            return Err(Error::InvalidArgument(format!(
                "buffer of tensor {} ({} bytes) is not a multiple of the element size {}",
                self.desc.id,
                bytes.len(),
                std::mem::size_of::<T>()
            )));
        }
        Ok(bytemuck::pod_collect_to_vec::<u8, T>(bytes.as_slice()))
    }

    /// Overwrite the buffer contents; the length must match exactly.
    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| poisoned(self.desc.id))?;
        if buffer.len() != data.len() {
            return Err(Error::InvalidArgument(format!(
                "write of {} bytes into tensor {} of {} bytes",
                data.len(),
                self.desc.id,
                buffer.len()
            )));
        }
        buffer.copy_from_slice(data);
        Ok(())
    }

    /// Overwrite the buffer contents from typed elements.
    pub fn write_from<T: Pod>(&self, data: &[T]) -> Result<()> {
        self.write_bytes(bytemuck::cast_slice::<T, u8>(data))
    }

    /// Check whether two tensors share one buffer.
    pub fn shares_buffer_with(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    fn lock_read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<u8>>> {
        self.buffer.read().map_err(|_| poisoned(self.desc.id))
    }
}

fn validate_buffer(desc: &LogicalTensor, len: usize) -> Result<()> {
    if !desc.is_fully_known() {
        return Err(Error::InvalidArgument(format!(
            "tensor {} needs fully known dims, got {:?}",
            desc.id, desc.shape
        )));
    }
    if desc.layout.is_any() {
        return Err(Error::InvalidArgument(format!(
            "tensor {} needs a concrete layout",
            desc.id
        )));
    }
    // Opaque layouts are sized by their backend
    if let Layout::Opaque(_) = desc.layout {
        return Ok(());
    }
    let required = desc.mem_size().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "cannot size a buffer for tensor {} with shape {:?} and layout {:?}",
            desc.id, desc.shape, desc.layout
        ))
    })?;
    if len < required {
        return Err(Error::InvalidArgument(format!(
            "buffer of {len} bytes is too small for tensor {} ({required} bytes)",
            desc.id
        )));
    }
    Ok(())
}

fn poisoned(id: TensorId) -> Error {
    Error::Backend(format!("buffer lock of tensor {id} is poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dim;

    #[test]
    fn test_mem_size() {
        let dense = LogicalTensor::new(1, DataType::F32, [2, 3]);
        assert_eq!(dense.mem_size(), Some(24));

        let padded = dense.clone().with_layout(Layout::Strided(vec![4, 1]));
        assert_eq!(padded.mem_size(), Some((4 + 2 + 1) * 4));

        let partial = LogicalTensor::new(2, DataType::F32, vec![Dim::Unknown, Dim::Known(3)]);
        assert_eq!(partial.mem_size(), None);

        let opaque = dense.with_layout(Layout::Opaque(3));
        assert_eq!(opaque.mem_size(), None);
    }

    #[test]
    fn test_sizes_overflow_to_none() {
        let huge = 1usize << 40;
        let dense = LogicalTensor::new(1, DataType::F32, [huge, huge]);
        assert_eq!(dense.element_count(), None);
        assert_eq!(dense.mem_size(), None);

        let strided = dense.clone().with_layout(Layout::Strided(vec![i64::MAX, 1]));
        assert_eq!(strided.mem_size(), None);

        // Elements fit, bytes do not
        let wide = LogicalTensor::new(2, DataType::F32, [usize::MAX / 2]);
        assert_eq!(wide.element_count(), Some(usize::MAX / 2));
        assert_eq!(wide.mem_size(), None);

        let fallback = LogicalTensor::strided_row_major(3, DataType::F32, &[huge, huge, huge]);
        assert!(fallback.layout.is_any());
        assert!(matches!(
            Tensor::zeros(fallback, Engine::cpu(0)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Tensor::new(strided, Engine::cpu(0), vec![0u8; 16]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_compatibility_and_refine() {
        let partial = LogicalTensor::new(5, DataType::F32, vec![Dim::Unknown, Dim::Known(8)]);
        let full = LogicalTensor::strided_row_major(5, DataType::F32, &[4, 8]);
        assert!(partial.is_compatible_with(&full));

        let refined = partial.refine(&full);
        assert_eq!(refined, full);

        let other_dtype = LogicalTensor::new(5, DataType::I32, [4, 8]);
        assert!(!full.is_compatible_with(&other_dtype));

        let constant = full.clone().with_property(PropertyKind::Constant);
        assert!(!full.is_compatible_with(&constant));
    }

    #[test]
    fn test_tensor_requires_concrete_descriptor() {
        let engine = Engine::cpu(0);
        let any = LogicalTensor::new(1, DataType::F32, [2]);
        assert!(matches!(
            Tensor::new(any, engine, vec![0; 8]),
            Err(Error::InvalidArgument(_))
        ));

        let small = LogicalTensor::strided_row_major(1, DataType::F32, &[4]);
        assert!(matches!(
            Tensor::new(small, engine, vec![0; 8]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_tensor_roundtrip_and_sharing() {
        let desc = LogicalTensor::strided_row_major(1, DataType::F32, &[2, 2]);
        let tensor = Tensor::from_vec(desc, Engine::cpu(0), vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(tensor.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

        let alias = tensor.clone();
        alias.write_from(&[5.0f32, 6.0, 7.0, 8.0]).unwrap();
        assert!(alias.shares_buffer_with(&tensor));
        assert_eq!(tensor.to_vec::<f32>().unwrap(), vec![5.0, 6.0, 7.0, 8.0]);

        let flat = tensor
            .view(LogicalTensor::strided_row_major(9, DataType::F32, &[4]))
            .unwrap();
        assert!(flat.shares_buffer_with(&tensor));
        assert_eq!(flat.id(), 9);
    }

    #[test]
    fn test_from_vec_rejects_wrong_element_size() {
        let desc = LogicalTensor::strided_row_major(1, DataType::F32, &[2]);
        let result = Tensor::from_vec(desc, Engine::cpu(0), vec![1u8, 2]);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_zeros_and_write_length_check() {
        let desc = LogicalTensor::strided_row_major(3, DataType::F32, &[3]);
        let tensor = Tensor::zeros(desc, Engine::cpu(0)).unwrap();
        assert_eq!(tensor.byte_len().unwrap(), 12);
        assert!(tensor.write_bytes(&[0u8; 4]).is_err());
    }
}
