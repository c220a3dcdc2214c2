//! Matching new children against the ones rendered last time.

use alloc::{format, rc::Rc, string::ToString, vec, vec::Vec};
use std::collections::{HashMap, HashSet};

use futures::future::join_all;

use super::{Engine, Kind, Retainer};
use crate::{
    arena::NodeId,
    context::Context,
    controller::Controller,
    element::{Child, Element, Key, Tag},
    error::Error,
    host::Host,
    props::{Str, Value},
    spawn::Pending,
};

/// A normalised child.
enum Incoming {
    Empty,
    Text(Str),
    Element(Element),
}

impl Incoming {
    fn key(&self) -> Option<&Key> {
        match self {
            Self::Element(element) => element.get_key(),
            _ => None,
        }
    }
}

fn normalize(child: Child) -> Vec<Incoming> {
    fn single(child: Child) -> Incoming {
        match child {
            Child::Empty => Incoming::Empty,
            Child::Text(text) => Incoming::Text(text),
            Child::Element(element) => Incoming::Element(element),
            Child::List(items) => Incoming::Element(Element::new(Tag::Fragment).children(items)),
        }
    }

    match child {
        Child::List(items) => items.into_iter().map(single).collect(),
        child => vec![single(child)],
    }
}

fn compatible(kind: &Kind, incoming: &Incoming) -> bool {
    match incoming {
        Incoming::Empty => false,
        Incoming::Text(_) => matches!(kind, Kind::Text),
        Incoming::Element(element) => match (kind, element.tag()) {
            (Kind::Intrinsic(old), Tag::Intrinsic(new)) => old == new,
            (Kind::Component(old), Tag::Component(new)) => old == new,
            (Kind::Fragment, Tag::Fragment)
            | (Kind::Portal, Tag::Portal)
            | (Kind::Raw, Tag::Raw)
            | (Kind::Text, Tag::Text) => true,
            _ => false,
        },
    }
}

/// Text of an explicit text element.
fn text_value(element: &Element) -> Str {
    match element.props().get("value") {
        Some(Value::Str(text)) => text.clone(),
        Some(Value::Int(value)) => value.to_string().into(),
        Some(Value::Float(value)) => value.to_string().into(),
        _ => Str::Borrowed(""),
    }
}

fn leaf_without_children(element: &Element) -> Result<(), Error> {
    if element.props().children().is_empty() {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "{} elements cannot have children",
            element.tag().name()
        )))
    }
}

fn children_of(element: &Element) -> Child {
    Child::List(element.props().children().to_vec())
}

/// Outcome of reconciling one position.
enum Slot {
    Hole,
    Node(NodeId, Option<Pending>),
    Failed(Option<NodeId>, Error),
}

impl<H: Host> Engine<H> {
    /// Reconciles the children of `id` against `child`.
    ///
    /// Children are visited in document order. A child that fails is torn
    /// down and leaves a hole; its siblings still render, the pass still
    /// commits, and the first error is returned.
    pub(crate) fn update_children(&self, id: NodeId, child: Child) -> Result<Option<Pending>, Error> {
        let incoming = normalize(child);
        let Some((pass, old)) = self.with_mut(id, |retainer| {
            retainer.pass += 1;
            (retainer.pass, retainer.children.clone())
        }) else {
            return Ok(None);
        };

        let mut keyed: HashMap<Key, NodeId> = HashMap::new();
        let mut positional: Vec<Option<NodeId>> = Vec::with_capacity(old.len());
        {
            let tree = self.tree.borrow();
            for slot in old {
                let key = slot.and_then(|node| {
                    tree.get(node)
                        .and_then(|retainer| retainer.element.as_ref())
                        .and_then(|element| element.get_key().cloned())
                        .map(|key| (key, node))
                });
                match key {
                    Some((key, node)) => {
                        if let Some(shadowed) = keyed.insert(key, node) {
                            positional.push(Some(shadowed));
                        }
                    }
                    None => positional.push(slot),
                }
            }
        }

        self.diffing.borrow_mut().push(id);
        let mut cursor = 0;
        let mut claimed: HashSet<Key> = HashSet::new();
        let mut slots = Vec::with_capacity(incoming.len());
        let mut buried = Vec::new();
        let mut pending = Vec::new();
        let mut first_error = None;

        for item in incoming {
            let key = item.key().cloned().filter(|key| {
                let fresh = claimed.insert(key.clone());
                if !fresh {
                    tracing::warn!(?key, "duplicate key among siblings; matching by position");
                }
                fresh
            });
            let old = match &key {
                Some(key) => keyed.remove(key),
                None => {
                    let old = positional.get(cursor).copied().flatten();
                    cursor += 1;
                    old
                }
            };

            match self.reconcile(id, old, item, &mut buried) {
                Slot::Hole => slots.push(None),
                Slot::Node(node, next) => {
                    slots.push(Some(node));
                    if let Some(next) = next {
                        pending.push((node, next));
                    }
                }
                Slot::Failed(node, error) => {
                    tracing::debug!(parent = ?id, %error, "child failed to render");
                    buried.extend(node);
                    slots.push(None);
                    first_error.get_or_insert(error);
                }
            }
        }

        buried.extend(positional.iter().skip(cursor).flatten().copied());
        buried.extend(keyed.into_values());
        self.with_mut(id, |retainer| {
            retainer.children.clone_from(&slots);
            retainer
                .graveyard
                .extend(buried.iter().map(|node| (pass, *node)));
        });
        self.diffing.borrow_mut().pop();

        if pending.is_empty() {
            self.commit_pass(id, pass, slots, &[]);
            return first_error.map_or(Ok(None), Err);
        }

        let engine = self.this.clone();
        Ok(Some(self.eager(async move {
            let results = join_all(pending.iter().map(|(_, next)| next.clone())).await;
            let mut failed = Vec::new();
            let mut error = first_error;
            for ((node, _), result) in pending.iter().zip(results) {
                if let Err(child_error) = result {
                    failed.push(*node);
                    error.get_or_insert(child_error);
                }
            }
            if let Some(engine) = engine.upgrade() {
                engine.commit_pass(id, pass, slots, &failed);
            }
            error.map_or(Ok(()), Err)
        })))
    }

    fn reconcile(
        &self,
        parent: NodeId,
        old: Option<NodeId>,
        item: Incoming,
        buried: &mut Vec<NodeId>,
    ) -> Slot {
        if let Incoming::Empty = item {
            buried.extend(old);
            return Slot::Hole;
        }

        let reusable = old.filter(|node| {
            self.with(*node, |retainer| compatible(&retainer.kind, &item))
                .unwrap_or(false)
        });

        if let Incoming::Element(element) = &item
            && element.is_copy()
        {
            let copy_tag = matches!(element.tag(), Tag::Copy);
            if let Some(node) = old.filter(|node| copy_tag || Some(*node) == reusable) {
                return Slot::Node(node, None);
            }
            if copy_tag {
                buried.extend(old);
                return Slot::Hole;
            }
        }

        if let Some(node) = reusable {
            return match self.update_node(node, item) {
                Ok(next) => Slot::Node(node, next),
                Err(error) => Slot::Failed(Some(node), error),
            };
        }

        buried.extend(old);
        match self.mount_node(parent, item) {
            Ok((node, Ok(next))) => Slot::Node(node, next),
            Ok((node, Err(error))) => Slot::Failed(Some(node), error),
            Err(error) => Slot::Failed(None, error),
        }
    }

    /// Creates the retainer for a new child and renders it.
    fn mount_node(
        &self,
        parent: NodeId,
        item: Incoming,
    ) -> Result<(NodeId, Result<Option<Pending>, Error>), Error> {
        let scope = self
            .with(parent, |retainer| retainer.scope.clone())
            .flatten();

        let element = match item {
            Incoming::Empty => return Err(Error::invalid("empty children are never mounted")),
            Incoming::Text(text) => {
                let mut retainer = Retainer::new(Kind::Text, Some(parent), scope);
                retainer.text = Some(text);
                return Ok((self.insert(retainer), Ok(None)));
            }
            Incoming::Element(element) => element,
        };

        let mut retainer = match element.tag() {
            Tag::Intrinsic(tag) => {
                let inner = self.host.borrow().scope(tag, scope.as_ref());
                let mut retainer = Retainer::new(Kind::Intrinsic(tag.clone()), Some(parent), inner);
                retainer.ns = scope;
                retainer
            }
            Tag::Component(component) => {
                Retainer::new(Kind::Component(component.clone()), Some(parent), scope)
            }
            Tag::Fragment | Tag::Copy => Retainer::new(Kind::Fragment, Some(parent), scope),
            Tag::Portal => {
                let root = self.portal_root(&element)?;
                let mut retainer = Retainer::new(Kind::Portal, Some(parent), None);
                retainer.host = Some(root);
                retainer
            }
            Tag::Raw => {
                leaf_without_children(&element)?;
                let mut retainer = Retainer::new(Kind::Raw, Some(parent), scope.clone());
                retainer.ns = scope;
                retainer
            }
            Tag::Text => {
                leaf_without_children(&element)?;
                let mut retainer = Retainer::new(Kind::Text, Some(parent), scope);
                retainer.text = Some(text_value(&element));
                retainer
            }
        };
        retainer.element = Some(element.clone());
        let node = self.insert(retainer);
        tracing::trace!(?node, ?parent, tag = element.tag().name(), "mounting");

        let rendered = match element.tag() {
            Tag::Component(component) => {
                let context = Context::new(self.runtime(), node);
                let controller = Controller::new(component.clone(), element.props().clone(), context);
                self.with_mut(node, |retainer| retainer.controller = Some(Rc::new(controller)));
                self.step(node)
            }
            Tag::Intrinsic(_) | Tag::Fragment | Tag::Portal => {
                self.update_children(node, children_of(&element))
            }
            Tag::Copy | Tag::Raw | Tag::Text => Ok(None),
        };
        Ok((node, rendered))
    }

    /// Re-renders an existing, compatible child with a new element.
    fn update_node(&self, node: NodeId, item: Incoming) -> Result<Option<Pending>, Error> {
        let element = match item {
            Incoming::Empty => return Ok(None),
            Incoming::Text(text) => {
                self.with_mut(node, |retainer| retainer.text = Some(text));
                return Ok(None);
            }
            Incoming::Element(element) => element,
        };

        match element.tag() {
            Tag::Raw => leaf_without_children(&element)?,
            Tag::Text => {
                leaf_without_children(&element)?;
                let text = text_value(&element);
                self.with_mut(node, |retainer| retainer.text = Some(text));
            }
            Tag::Portal => {
                self.portal_root(&element)?;
            }
            _ => {}
        }
        self.with_mut(node, |retainer| retainer.element = Some(element.clone()));

        match element.tag() {
            Tag::Component(_) => {
                if let Some(controller) = self.controller(node) {
                    *controller.props.borrow_mut() = element.props().clone();
                }
                self.step(node)
            }
            Tag::Intrinsic(_) | Tag::Fragment | Tag::Portal => {
                self.update_children(node, children_of(&element))
            }
            Tag::Copy | Tag::Raw | Tag::Text => Ok(None),
        }
    }

    fn portal_root(&self, element: &Element) -> Result<H::Node, Error> {
        element
            .props()
            .get_shared::<H::Node>("root")
            .cloned()
            .ok_or_else(|| Error::invalid("portal elements need a `root` prop holding a host node"))
    }
}
