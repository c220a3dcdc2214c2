//! Property values carried by elements.
//!
//! Props are an ordered list of named [`Value`]s plus the element's children.
//! Intrinsic elements hand their props to the host as attribute patches;
//! components receive them verbatim on every render.

use alloc::{borrow::Cow, rc::Rc, vec::Vec};
use core::{any::Any, fmt};

use crate::element::Child;

/// Owned-or-static string used for tags, prop names and text.
pub type Str = Cow<'static, str>;

/// A single property value.
///
/// `Shared` holds arbitrary data (host nodes, callbacks, nested children) and
/// compares by identity, so re-rendering with the same `Rc` is not a change.
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value. Hosts treat it as "remove this attribute".
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Str(Str),
    /// Opaque shared value, compared by pointer identity.
    Shared(Rc<dyn Any>),
}

impl Value {
    /// Wraps an arbitrary value into a [`Value::Shared`].
    pub fn shared<T: 'static>(value: T) -> Self {
        Self::Shared(Rc::new(value))
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrows the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the numeric payload as a float, converting integers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Downcasts a [`Value::Shared`] payload.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Self::Shared(value) => value.downcast_ref(),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Shared(a), Self::Shared(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Self::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Self::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Self::Shared(value) => write!(f, "Shared({:p})", Rc::as_ptr(value)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

impl From<alloc::string::String> for Value {
    fn from(value: alloc::string::String) -> Self {
        Self::Str(Cow::Owned(value))
    }
}

impl From<Str> for Value {
    fn from(value: Str) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One changed property, as handed to [`Host::patch`](crate::host::Host::patch).
///
/// `old == None` means the property is new, `new == None` means it was removed.
#[derive(Debug, Clone, Copy)]
pub struct PropPatch<'a> {
    /// Property name.
    pub name: &'a str,
    /// Previously committed value.
    pub old: Option<&'a Value>,
    /// Value to apply.
    pub new: Option<&'a Value>,
}

/// Ordered properties of an element, including its children.
#[derive(Clone, Default)]
pub struct Props {
    entries: Vec<(Str, Value)>,
    children: Vec<Child>,
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, value)| (name, value)))
            .finish()
    }
}

impl Props {
    /// Creates an empty property list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`Props::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<Str>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a property, keeping its original position if it already exists.
    pub fn insert(&mut self, name: impl Into<Str>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Removes a property and returns its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Looks up a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Looks up a string property.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Looks up an integer property.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// Looks up a boolean property.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Looks up a shared property and downcasts it.
    #[must_use]
    pub fn get_shared<T: 'static>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(Value::downcast_ref)
    }

    /// Iterates properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_ref(), value))
    }

    /// Number of named properties (children excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when there are no named properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The children passed to this element.
    #[must_use]
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Child> {
        &mut self.children
    }

    /// Computes the changes needed to go from `old` to `self`.
    ///
    /// New and changed properties come first in `self`'s order, removals last.
    #[must_use]
    pub fn diff<'a>(&'a self, old: Option<&'a Self>) -> Vec<PropPatch<'a>> {
        let mut patches = Vec::new();
        for (name, value) in &self.entries {
            let previous = old.and_then(|old| old.get(name));
            if previous != Some(value) {
                patches.push(PropPatch {
                    name,
                    old: previous,
                    new: Some(value),
                });
            }
        }
        if let Some(old) = old {
            for (name, value) in &old.entries {
                if self.get(name).is_none() {
                    patches.push(PropPatch {
                        name,
                        old: Some(value),
                        new: None,
                    });
                }
            }
        }
        patches
    }
}
