//! The seam between the protocol engine and whatever object graph it exposes.
//!
//! The engine never inspects concrete types. A host implements
//! [`BindableTarget`] for its objects and [`BindingProvider`] for the
//! components hanging off them; the builder walks those and keeps the
//! [`MemberAccess`] handles it is given.

use crate::value::{Value, ValueType};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Which capabilities a binding exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Get,
    Set,
    GetSet,
    Invoke,
}

impl BindingKind {
    pub fn from_access(readable: bool, writable: bool) -> Option<Self> {
        match (readable, writable) {
            (true, true) => Some(BindingKind::GetSet),
            (true, false) => Some(BindingKind::Get),
            (false, true) => Some(BindingKind::Set),
            (false, false) => None,
        }
    }

    pub fn is_readable(self) -> bool {
        matches!(self, BindingKind::Get | BindingKind::GetSet)
    }

    pub fn is_writable(self) -> bool {
        matches!(self, BindingKind::Set | BindingKind::GetSet)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

/// Declared type of an enumerated member.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberType {
    Value(ValueType),
    /// A zero-argument action.
    Action,
    /// Anything the engine cannot express. Skipped by the builder.
    Unsupported(String),
}

/// One entry of a provider's member enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub name: String,
    pub ty: MemberType,
    pub readable: bool,
    pub writable: bool,
    pub range: Option<Range>,
}

impl MemberInfo {
    /// A plain read-write field.
    pub fn field(name: impl Into<String>, ty: ValueType) -> Self {
        Self::property(name, ty, true, true)
    }

    pub fn property(name: impl Into<String>, ty: ValueType, readable: bool, writable: bool) -> Self {
        Self {
            name: name.into(),
            ty: MemberType::Value(ty),
            readable,
            writable,
            range: None,
        }
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: MemberType::Action,
            readable: false,
            writable: true,
            range: None,
        }
    }

    pub fn unsupported(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: MemberType::Unsupported(type_name.into()),
            readable: true,
            writable: true,
            range: None,
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.range = Some(Range { min, max });
        self
    }

    /// The binding kind this member would get, or `None` when it is not exposable.
    pub fn kind(&self) -> Option<BindingKind> {
        match self.ty {
            MemberType::Action => Some(BindingKind::Invoke),
            MemberType::Value(_) => BindingKind::from_access(self.readable, self.writable),
            MemberType::Unsupported(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("binding is not readable")]
    NotReadable,

    #[error("binding is not writable")]
    NotWritable,

    #[error("binding is not invokable")]
    NotInvokable,

    #[error("target rejected the value: {0}")]
    Rejected(String),
}

/// Live get/set/invoke access to one member.
///
/// Implementations must be safe to call from several transport tasks at once;
/// serialising writes to a non-thread-safe resource is the implementor's job.
pub trait MemberAccess: Send + Sync {
    fn get(&self) -> Option<Value> {
        None
    }

    fn set(&self, _value: Value) -> Result<(), BindingError> {
        Err(BindingError::NotWritable)
    }

    /// Runs the action with every declared parameter left to its default.
    fn invoke(&self) -> Result<(), BindingError> {
        Err(BindingError::NotInvokable)
    }
}

/// Member discovery for one component of a target.
pub trait BindingProvider: Send + Sync {
    /// Path segment for this component (before sanitising).
    fn type_name(&self) -> String;

    /// Ordered members, including ones the engine will skip.
    fn enumerate(&self) -> Vec<MemberInfo>;

    fn bind(&self, member: &str) -> Option<Arc<dyn MemberAccess>>;
}

/// A node of the host object graph.
pub trait BindableTarget: Send + Sync {
    fn name(&self) -> String;

    fn children(&self) -> Vec<Arc<dyn BindableTarget>>;

    fn components(&self) -> Vec<Arc<dyn BindingProvider>>;

    /// Destroyed targets are skipped by the builder.
    fn is_alive(&self) -> bool {
        true
    }
}

/// A live handle for one leaf path of a snapshot.
#[derive(Clone)]
pub struct Binding {
    path: Arc<str>,
    kind: BindingKind,
    value_type: ValueType,
    range: Option<Range>,
    access: Arc<dyn MemberAccess>,
}

impl Binding {
    pub fn new(
        path: impl Into<Arc<str>>,
        kind: BindingKind,
        value_type: ValueType,
        range: Option<Range>,
        access: Arc<dyn MemberAccess>,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            value_type,
            range,
            access,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        self.value_type.enum_names()
    }

    /// Current value, or `None` for bindings without a getter.
    pub fn get(&self) -> Option<Value> {
        if self.kind.is_readable() {
            self.access.get()
        } else {
            None
        }
    }

    pub fn set(&self, value: Value) -> Result<(), BindingError> {
        if !self.kind.is_writable() {
            return Err(BindingError::NotWritable);
        }
        self.access.set(value)
    }

    pub fn invoke(&self) -> Result<(), BindingError> {
        if self.kind != BindingKind::Invoke {
            return Err(BindingError::NotInvokable);
        }
        self.access.invoke()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("value_type", &self.value_type)
            .field("range", &self.range)
            .finish()
    }
}
