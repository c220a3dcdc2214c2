//! The contract between the reconciler and a concrete render target.

use core::{fmt::Debug, hash::Hash};

use alloc::borrow::Cow;

use crate::props::{PropPatch, Str};

/// Namespace used for `svg` subtrees.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// A render target, such as a live document or a string buffer.
///
/// The engine only ever asks the host for a handful of primitive operations.
/// Ordering decisions (which node goes where) are made by the engine, so
/// `insert_before` is the only way nodes move.
pub trait Host: 'static {
    /// Handle to a node owned by the host. Cloning must be cheap.
    type Node: Clone + Eq + Hash + Debug + 'static;

    /// Creates an element node. `scope` is the namespace the element lives in.
    fn create_element(&mut self, tag: &str, scope: Option<&str>) -> Self::Node;

    /// Applies property changes to an element node.
    fn patch(&mut self, node: &Self::Node, tag: &str, patches: &[PropPatch<'_>]);

    /// Creates a text node.
    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Replaces the contents of a text node.
    fn update_text(&mut self, node: &Self::Node, text: &str);

    /// Creates a node holding markup that is inserted verbatim.
    fn create_raw(&mut self, markup: &str, scope: Option<&str>) -> Self::Node;

    /// Inserts `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. Moving a node that already has a parent is allowed.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: Option<&Self::Node>,
    );

    /// Detaches `child` from `parent`.
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// Called once the engine has dropped a node it created. The node may
    /// still be attached to its old parent.
    ///
    /// Nodes handed in from outside, such as portal roots, are never released.
    /// The default does nothing.
    fn release(&mut self, node: &Self::Node) {
        let _ = node;
    }

    /// Computes the namespace for the children of `tag`.
    ///
    /// The default enters SVG on `svg` and leaves it on `foreignObject`.
    fn scope(&self, tag: &str, parent: Option<&Str>) -> Option<Str> {
        match tag {
            "svg" => Some(Cow::Borrowed(SVG_NAMESPACE)),
            "foreignObject" => None,
            _ => parent.cloned(),
        }
    }
}
