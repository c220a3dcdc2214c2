//! The element model: immutable descriptions of what to render.
//!
//! An [`Element`] pairs a [`Tag`] with [`Props`], an optional [`Key`], an
//! optional [`NodeRef`] and a `copy` flag. Elements are reference counted, so
//! cloning one is cheap and the reconciler can keep the last rendered element
//! around for diffing.
//!
//! ```
//! use eddy_core::element::{element, fragment};
//!
//! let list = element("ul")
//!     .prop("class", "items")
//!     .child(element("li").key("a").child("first"))
//!     .child(element("li").key("b").child("second"));
//! let both = fragment([list.clone(), list]);
//! assert_eq!(both.props().children().len(), 2);
//! ```

use alloc::{borrow::Cow, rc::Rc, string::String, string::ToString, vec::Vec};
use core::{any::Any, fmt};

use crate::{
    component::Component,
    props::{Props, Str, Value},
};

/// What an element renders as.
#[derive(Clone)]
pub enum Tag {
    /// A host-native element such as `div`.
    Intrinsic(Str),
    /// A user component.
    Component(Component),
    /// Groups children without a host node.
    Fragment,
    /// Renders children into the host node stored in the `root` prop.
    Portal,
    /// Injects the host node or markup stored in the `value` prop verbatim.
    Raw,
    /// Keeps whatever was previously rendered at this position.
    Copy,
    /// Explicit text node; the text lives in the `value` prop.
    Text,
}

impl Tag {
    /// Human readable name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Intrinsic(tag) => tag,
            Self::Component(component) => component.name(),
            Self::Fragment => "Fragment",
            Self::Portal => "Portal",
            Self::Raw => "Raw",
            Self::Copy => "Copy",
            Self::Text => "Text",
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intrinsic(tag) => f.debug_tuple("Intrinsic").field(tag).finish(),
            Self::Component(component) => f.debug_tuple("Component").field(component).finish(),
            other => f.write_str(other.name()),
        }
    }
}

impl From<&'static str> for Tag {
    fn from(value: &'static str) -> Self {
        Self::Intrinsic(Cow::Borrowed(value))
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Self::Intrinsic(Cow::Owned(value))
    }
}

impl From<Component> for Tag {
    fn from(value: Component) -> Self {
        Self::Component(value)
    }
}

impl From<&Component> for Tag {
    fn from(value: &Component) -> Self {
        Self::Component(value.clone())
    }
}

/// Identity of an element among its siblings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// String key.
    Str(Str),
    /// Integer key.
    Int(i64),
}

impl From<&'static str> for Key {
    fn from(value: &'static str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Str(Cow::Owned(value))
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(Cow::Owned(value.to_string())), Self::Int)
    }
}

/// Callback receiving the committed host nodes of an element once per mount.
///
/// The engine is host agnostic, so the callback is stored type-erased and
/// downcast to the host's node type when it fires.
#[derive(Clone)]
pub struct NodeRef(Rc<dyn Fn(&dyn Any)>);

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NodeRef")
    }
}

impl NodeRef {
    /// Creates a ref receiving every host node the element rendered.
    pub fn new<N: 'static>(callback: impl Fn(&[N]) + 'static) -> Self {
        Self(Rc::new(move |nodes: &dyn Any| {
            match nodes.downcast_ref::<Vec<N>>() {
                Some(nodes) => callback(nodes),
                None => tracing::warn!(
                    expected = core::any::type_name::<N>(),
                    "ref callback does not match the renderer's node type"
                ),
            }
        }))
    }

    /// Creates a ref receiving the first host node, if the element rendered any.
    pub fn node<N: 'static>(callback: impl Fn(&N) + 'static) -> Self {
        Self::new(move |nodes: &[N]| {
            if let Some(first) = nodes.first() {
                callback(first);
            }
        })
    }

    pub(crate) fn call(&self, nodes: &dyn Any) {
        (self.0)(nodes);
    }
}

#[derive(Clone)]
struct ElementInner {
    tag: Tag,
    props: Props,
    key: Option<Key>,
    node_ref: Option<NodeRef>,
    copy: bool,
}

/// An immutable description of something to render.
#[derive(Clone)]
pub struct Element(Rc<ElementInner>);

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.0.tag)
            .field("key", &self.0.key)
            .field("props", &self.0.props)
            .field("children", &self.0.props.children().len())
            .finish_non_exhaustive()
    }
}

impl Element {
    /// Creates an element with no props and no children.
    pub fn new(tag: impl Into<Tag>) -> Self {
        Self(Rc::new(ElementInner {
            tag: tag.into(),
            props: Props::new(),
            key: None,
            node_ref: None,
            copy: false,
        }))
    }

    fn inner_mut(&mut self) -> &mut ElementInner {
        Rc::make_mut(&mut self.0)
    }

    /// Sets a property.
    #[must_use]
    pub fn prop(mut self, name: impl Into<Str>, value: impl Into<Value>) -> Self {
        self.inner_mut().props.insert(name, value);
        self
    }

    /// Replaces all named properties, keeping the children.
    #[must_use]
    pub fn props_from(mut self, props: Props) -> Self {
        let inner = self.inner_mut();
        let children = core::mem::take(inner.props.children_mut());
        inner.props = props;
        *inner.props.children_mut() = children;
        self
    }

    /// Sets the key used to match this element against previous renders.
    #[must_use]
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.inner_mut().key = Some(key.into());
        self
    }

    /// Attaches a ref callback.
    #[must_use]
    pub fn node_ref(mut self, node_ref: NodeRef) -> Self {
        self.inner_mut().node_ref = Some(node_ref);
        self
    }

    /// When set, a compatible previously rendered element is kept unchanged.
    #[must_use]
    pub fn copy(mut self, copy: bool) -> Self {
        self.inner_mut().copy = copy;
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.inner_mut().props.children_mut().push(child.into());
        self
    }

    /// Appends several children.
    #[must_use]
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        self.inner_mut()
            .props
            .children_mut()
            .extend(children.into_iter().map(Into::into));
        self
    }

    /// The element's tag.
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.0.tag
    }

    /// The element's props, children included.
    #[must_use]
    pub fn props(&self) -> &Props {
        &self.0.props
    }

    /// The element's key, if any.
    #[must_use]
    pub fn get_key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    /// The element's ref callback, if any.
    #[must_use]
    pub fn get_node_ref(&self) -> Option<&NodeRef> {
        self.0.node_ref.as_ref()
    }

    /// Whether the `copy` flag is set.
    #[must_use]
    pub fn is_copy(&self) -> bool {
        self.0.copy || matches!(self.0.tag, Tag::Copy)
    }
}

/// Anything that can appear as a child.
///
/// `bool`, `()` and `None` convert to [`Child::Empty`], which renders nothing
/// but still occupies its position so siblings keep matching by index.
/// Nested lists render as implicit fragments.
#[derive(Clone, Debug, Default)]
pub enum Child {
    /// Renders nothing.
    #[default]
    Empty,
    /// A text node.
    Text(Str),
    /// An element.
    Element(Element),
    /// A list of children.
    List(Vec<Child>),
}

impl From<Element> for Child {
    fn from(value: Element) -> Self {
        Self::Element(value)
    }
}

impl From<&'static str> for Child {
    fn from(value: &'static str) -> Self {
        Self::Text(Cow::Borrowed(value))
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Self::Text(Cow::Owned(value))
    }
}

impl From<Str> for Child {
    fn from(value: Str) -> Self {
        Self::Text(value)
    }
}

macro_rules! impl_number_child {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Self::Text(Cow::Owned(value.to_string()))
                }
            }
        )*
    };
}

impl_number_child!(i32, i64, u32, u64, usize, f64);

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Self::Empty
    }
}

impl From<()> for Child {
    fn from((): ()) -> Self {
        Self::Empty
    }
}

impl<T: Into<Self>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Child {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// Creates an intrinsic or component element.
pub fn element(tag: impl Into<Tag>) -> Element {
    Element::new(tag)
}

/// Groups children without a host node.
pub fn fragment<I>(children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    Element::new(Tag::Fragment).children(children)
}

/// Renders `children` into `root` instead of the logical parent.
pub fn portal<N: 'static, I>(root: N, children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    Element::new(Tag::Portal)
        .prop("root", Value::shared(root))
        .children(children)
}

/// Injects markup verbatim.
pub fn raw_markup(markup: impl Into<Str>) -> Element {
    Element::new(Tag::Raw).prop("value", Value::Str(markup.into()))
}

/// Injects an existing host node.
pub fn raw_node<N: 'static>(node: N) -> Element {
    Element::new(Tag::Raw).prop("value", Value::shared(node))
}

/// Keeps whatever was previously rendered at this position.
#[must_use]
pub fn copy() -> Element {
    Element::new(Tag::Copy)
}

/// Creates an explicit text element.
pub fn text(value: impl Into<Str>) -> Element {
    Element::new(Tag::Text).prop("value", Value::Str(value.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_does_not_mutate_shared_clones() {
        let base = element("p").prop("id", "a");
        let changed = base.clone().prop("id", "b").child("x");
        assert_eq!(base.props().get_str("id"), Some("a"));
        assert!(base.props().children().is_empty());
        assert_eq!(changed.props().get_str("id"), Some("b"));
        assert_eq!(changed.props().children().len(), 1);
    }

    #[test]
    fn ignored_children_keep_their_slot() {
        let list = element("div").child(false).child(None::<Element>).child("x");
        assert_eq!(list.props().children().len(), 3);
        assert!(matches!(list.props().children()[0], Child::Empty));
    }

    #[test]
    fn copy_tag_counts_as_copy_flag() {
        assert!(copy().is_copy());
        assert!(element("div").copy(true).is_copy());
        assert!(!element("div").is_copy());
    }

    #[test]
    fn large_usize_keys_fall_back_to_strings() {
        assert_eq!(Key::from(7_usize), Key::Int(7));
        assert!(matches!(Key::from(usize::MAX), Key::Str(_)));
    }
}
