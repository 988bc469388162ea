//! Graph nodes: operation kinds, attributes, and their tensor references.

use crate::tensor::{LogicalTensor, TensorId};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Caller-assigned op identifier, unique within one graph.
pub type OpId = u64;

/// Operation tag from the fixed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    Convolution,
    MatMul,
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
    ReLU,
    Sigmoid,
    Tanh,
    GELU,
    Abs,
    Square,
    Sqrt,
    Clamp,
    BiasAdd,
    BatchNorm,
    SoftMax,
    Reorder,
    StaticReshape,
    Wildcard,
    End,
}

impl OpKind {
    /// Every kind in the vocabulary.
    pub const ALL: &'static [OpKind] = &[
        OpKind::Convolution,
        OpKind::MatMul,
        OpKind::Add,
        OpKind::Subtract,
        OpKind::Multiply,
        OpKind::Divide,
        OpKind::Maximum,
        OpKind::Minimum,
        OpKind::ReLU,
        OpKind::Sigmoid,
        OpKind::Tanh,
        OpKind::GELU,
        OpKind::Abs,
        OpKind::Square,
        OpKind::Sqrt,
        OpKind::Clamp,
        OpKind::BiasAdd,
        OpKind::BatchNorm,
        OpKind::SoftMax,
        OpKind::Reorder,
        OpKind::StaticReshape,
        OpKind::Wildcard,
        OpKind::End,
    ];

    /// Canonical name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Convolution => "Convolution",
            OpKind::MatMul => "MatMul",
            OpKind::Add => "Add",
            OpKind::Subtract => "Subtract",
            OpKind::Multiply => "Multiply",
            OpKind::Divide => "Divide",
            OpKind::Maximum => "Maximum",
            OpKind::Minimum => "Minimum",
            OpKind::ReLU => "ReLU",
            OpKind::Sigmoid => "Sigmoid",
            OpKind::Tanh => "Tanh",
            OpKind::GELU => "GELU",
            OpKind::Abs => "Abs",
            OpKind::Square => "Square",
            OpKind::Sqrt => "Sqrt",
            OpKind::Clamp => "Clamp",
            OpKind::BiasAdd => "BiasAdd",
            OpKind::BatchNorm => "BatchNorm",
            OpKind::SoftMax => "SoftMax",
            OpKind::Reorder => "Reorder",
            OpKind::StaticReshape => "StaticReshape",
            OpKind::Wildcard => "Wildcard",
            OpKind::End => "End",
        }
    }

    /// One input, one output, applied per element.
    pub fn is_elementwise_unary(&self) -> bool {
        matches!(
            self,
            OpKind::ReLU
                | OpKind::Sigmoid
                | OpKind::Tanh
                | OpKind::GELU
                | OpKind::Abs
                | OpKind::Square
                | OpKind::Sqrt
                | OpKind::Clamp
        )
    }

    /// Two inputs (broadcast), one output, applied per element.
    pub fn is_elementwise_binary(&self) -> bool {
        matches!(
            self,
            OpKind::Add
                | OpKind::Subtract
                | OpKind::Multiply
                | OpKind::Divide
                | OpKind::Maximum
                | OpKind::Minimum
        )
    }

    /// Either unary or binary elementwise.
    pub fn is_elementwise(&self) -> bool {
        self.is_elementwise_unary() || self.is_elementwise_binary()
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OpKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OpKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidGraph(format!("Unknown op kind '{s}'")))
    }
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Float(f32),
    Bool(bool),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(v: Vec<i64>) -> Self {
        AttributeValue::Ints(v)
    }
}

impl From<Vec<f32>> for AttributeValue {
    fn from(v: Vec<f32>) -> Self {
        AttributeValue::Floats(v)
    }
}

/// A graph node: an operation kind, its ordered input/output tensors, and
/// its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    id: OpId,
    kind: OpKind,
    inputs: Vec<LogicalTensor>,
    outputs: Vec<LogicalTensor>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl Op {
    /// Create an op with no inputs, outputs, or attributes.
    pub fn new(id: OpId, kind: OpKind) -> Self {
        Self {
            id,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Append an input tensor.
    pub fn with_input(mut self, tensor: LogicalTensor) -> Self {
        self.inputs.push(tensor);
        self
    }

    /// Append an output tensor.
    pub fn with_output(mut self, tensor: LogicalTensor) -> Self {
        self.outputs.push(tensor);
        self
    }

    /// Set an attribute.
    pub fn with_attr(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn inputs(&self) -> &[LogicalTensor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[LogicalTensor] {
        &self.outputs
    }

    pub fn input_ids(&self) -> impl Iterator<Item = TensorId> + '_ {
        self.inputs.iter().map(|t| t.id)
    }

    pub fn output_ids(&self) -> impl Iterator<Item = TensorId> + '_ {
        self.outputs.iter().map(|t| t.id)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Get an attribute.
    pub fn attr(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Get a required i64 attribute.
    pub fn attr_i64(&self, name: &str) -> Result<i64> {
        match self.attr(name) {
            Some(AttributeValue::Int(v)) => Ok(*v),
            _ => Err(self.missing_attr(name, "i64")),
        }
    }

    /// Get a required f32 attribute.
    pub fn attr_f32(&self, name: &str) -> Result<f32> {
        match self.attr(name) {
            Some(AttributeValue::Float(v)) => Ok(*v),
            _ => Err(self.missing_attr(name, "f32")),
        }
    }

    /// Get a required bool attribute.
    pub fn attr_bool(&self, name: &str) -> Result<bool> {
        match self.attr(name) {
            Some(AttributeValue::Bool(v)) => Ok(*v),
            _ => Err(self.missing_attr(name, "bool")),
        }
    }

    /// Get a required string attribute.
    pub fn attr_string(&self, name: &str) -> Result<&str> {
        match self.attr(name) {
            Some(AttributeValue::String(v)) => Ok(v.as_str()),
            _ => Err(self.missing_attr(name, "string")),
        }
    }

    /// Get a required ints attribute.
    pub fn attr_ints(&self, name: &str) -> Result<&[i64]> {
        match self.attr(name) {
            Some(AttributeValue::Ints(v)) => Ok(v.as_slice()),
            _ => Err(self.missing_attr(name, "ints")),
        }
    }

    /// Get a required floats attribute.
    pub fn attr_floats(&self, name: &str) -> Result<&[f32]> {
        match self.attr(name) {
            Some(AttributeValue::Floats(v)) => Ok(v.as_slice()),
            _ => Err(self.missing_attr(name, "floats")),
        }
    }

    /// Copy of this op with every tensor replaced by `resolve(id)`.
    ///
    /// Used when sealing partitions so member ops carry the graph's refined
    /// descriptors rather than the ones supplied at `add_op` time.
    pub(crate) fn with_resolved_tensors(
        &self,
        resolve: impl Fn(TensorId) -> Option<LogicalTensor>,
    ) -> Op {
        let mut op = self.clone();
        for tensor in op.inputs.iter_mut().chain(op.outputs.iter_mut()) {
            if let Some(resolved) = resolve(tensor.id) {
                *tensor = resolved;
            }
        }
        op
    }

    fn missing_attr(&self, name: &str, ty: &str) -> Error {
        let problem = if self.attributes.contains_key(name) {
            "has a non-"
        } else {
            "is missing required "
        };
        Error::InvalidGraph(format!(
            "Op {} ({}) {problem}{ty} attribute '{name}'",
            self.id, self.kind
        ))
    }
}
