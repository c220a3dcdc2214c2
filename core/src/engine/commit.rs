//! Applying settled passes to the host.

use alloc::vec::Vec;
use core::mem;
use std::collections::{HashMap, HashSet};

use super::{Engine, Kind, RetainerFlags, created_raw};
use crate::{
    arena::NodeId, arrange::plan_moves, element::Element, host::Host, props::Value,
};

impl<H: Host> Engine<H> {
    /// Commits pass `pass` of `id` with the given children snapshot.
    ///
    /// Passes older than the last committed one are dropped. Children buried
    /// by this pass or an earlier one are unmounted before the retainer is
    /// committed.
    pub(crate) fn commit_pass(
        &self,
        id: NodeId,
        pass: u64,
        mut snapshot: Vec<Option<NodeId>>,
        failed: &[NodeId],
    ) {
        let _batch = self.batch();
        let buried = self.with_mut(id, |retainer| {
            if retainer.flags.contains(RetainerFlags::UNMOUNTED) {
                return None;
            }
            if pass <= retainer.committed_pass {
                tracing::trace!(?id, pass, committed = retainer.committed_pass, "discarding stale pass");
                return None;
            }
            for node in failed {
                for slot in snapshot.iter_mut().chain(retainer.children.iter_mut()) {
                    if *slot == Some(*node) {
                        *slot = None;
                    }
                }
                retainer.graveyard.push((pass, *node));
            }
            retainer.committed.clone_from(&snapshot);
            retainer.committed_pass = pass;
            let (buried, kept): (Vec<_>, Vec<_>) = mem::take(&mut retainer.graveyard)
                .into_iter()
                .partition(|(buried_in, _)| *buried_in <= pass);
            retainer.graveyard = kept;
            Some(buried)
        });
        let Some(buried) = buried.flatten() else {
            return;
        };

        for node in snapshot.iter().flatten() {
            self.commit_leaf(*node);
        }
        for (_, node) in buried {
            self.bury(node);
        }
        self.commit_retainer(id);
    }

    /// Creates or updates the host node of a text or raw child.
    fn commit_leaf(&self, id: NodeId) {
        let Some((kind, text, committed_text, element, committed, host, ns)) = self.with(id, |retainer| {
            (
                retainer.kind.clone(),
                retainer.text.clone(),
                retainer.committed_text.clone(),
                retainer.element.clone(),
                retainer.committed_element.clone(),
                retainer.host.clone(),
                retainer.ns.clone(),
            )
        }) else {
            return;
        };

        match kind {
            Kind::Text => {
                let text = text.unwrap_or_default();
                match &host {
                    None => {
                        let node = self.host.borrow_mut().create_text(&text);
                        self.with_mut(id, |retainer| retainer.host = Some(node));
                    }
                    Some(node) if committed_text.as_ref() != Some(&text) => {
                        self.host.borrow_mut().update_text(node, &text);
                    }
                    Some(_) => {}
                }
                self.with_mut(id, |retainer| {
                    retainer.committed_text = Some(text);
                    retainer.flags.insert(RetainerFlags::MOUNTED);
                });
            }
            Kind::Raw => {
                let Some(element) = element else {
                    return;
                };
                let value = element.props().get("value");
                let unchanged =
                    host.is_some() && committed.as_ref().map(|old| old.props().get("value")) == Some(value);
                if !unchanged {
                    let node = match value {
                        Some(Value::Str(markup)) => {
                            Some(self.host.borrow_mut().create_raw(markup, ns.as_deref()))
                        }
                        Some(value @ Value::Shared(_)) => {
                            let node = value.downcast_ref::<H::Node>().cloned();
                            if node.is_none() {
                                tracing::warn!("raw `value` does not hold a host node of this renderer");
                            }
                            node
                        }
                        _ => None,
                    };
                    self.with_mut(id, |retainer| retainer.host = node);
                    if let Some(old) = host.as_ref().filter(|_| created_raw(committed.as_ref())) {
                        self.host.borrow_mut().release(old);
                    }
                }
                let first = self
                    .with_mut(id, |retainer| {
                        retainer.committed_element = Some(element.clone());
                        let first = !retainer.flags.contains(RetainerFlags::MOUNTED);
                        retainer.flags.insert(RetainerFlags::MOUNTED);
                        first
                    })
                    .unwrap_or(false);
                if first {
                    self.queue_ref(id, &element);
                }
            }
            _ => {}
        }
    }

    /// Commits the retainer itself once its children are in place.
    fn commit_retainer(&self, id: NodeId) {
        let Some((kind, element, first)) = self.with(id, |retainer| {
            (
                retainer.kind.clone(),
                retainer.element.clone(),
                !retainer.flags.contains(RetainerFlags::MOUNTED),
            )
        }) else {
            return;
        };

        match kind {
            Kind::Intrinsic(tag) => {
                let Some(element) = element else {
                    return;
                };
                self.patch_intrinsic(id, &tag, &element);
                if first {
                    self.queue_ref(id, &element);
                }
                self.arrange(id);
            }
            Kind::Portal => {
                if let Some(element) = &element {
                    self.retarget_portal(id, element);
                    if first {
                        self.queue_ref(id, element);
                    }
                }
                self.arrange(id);
            }
            Kind::Root => self.arrange(id),
            Kind::Component(_) => self.commit_component(id, element.as_ref(), first),
            Kind::Fragment => {
                if first && let Some(element) = &element {
                    self.queue_ref(id, element);
                }
                self.propagate(id);
            }
            Kind::Text | Kind::Raw => {}
        }
        self.with_mut(id, |retainer| retainer.flags.insert(RetainerFlags::MOUNTED));
    }

    fn patch_intrinsic(&self, id: NodeId, tag: &str, element: &Element) {
        let Some((existing, committed, ns)) = self.with(id, |retainer| {
            (
                retainer.host.clone(),
                retainer.committed_element.clone(),
                retainer.ns.clone(),
            )
        }) else {
            return;
        };

        let mut host = self.host.borrow_mut();
        let node = existing.unwrap_or_else(|| host.create_element(tag, ns.as_deref()));
        let patches = element.props().diff(committed.as_ref().map(Element::props));
        if !patches.is_empty() {
            host.patch(&node, tag, &patches);
        }
        drop(host);
        self.with_mut(id, |retainer| {
            retainer.host = Some(node);
            retainer.committed_element = Some(element.clone());
        });
    }

    fn commit_component(&self, id: NodeId, element: Option<&Element>, first: bool) {
        let Some(controller) = self.controller(id) else {
            return;
        };
        let nodes = self.host_nodes(id);
        let scheduled = mem::take(&mut *controller.scheduled.borrow_mut());
        for callback in scheduled {
            callback(&nodes);
        }
        let after = mem::take(&mut *controller.after.borrow_mut());
        for callback in after {
            let nodes = nodes.clone();
            self.defer(move || callback(&nodes));
        }
        if first && let Some(element) = element {
            self.queue_ref(id, element);
        }
        self.propagate(id);
    }

    fn queue_ref(&self, id: NodeId, element: &Element) {
        let Some(node_ref) = element.get_node_ref().cloned() else {
            return;
        };
        let nodes = match self.with(id, |retainer| retainer.kind.clone()) {
            Some(Kind::Portal) => self
                .with(id, |retainer| retainer.host.iter().cloned().collect())
                .unwrap_or_default(),
            _ => self.host_nodes(id),
        };
        self.defer(move || node_ref.call(&nodes));
    }

    /// Re-arranges the host owner above `id` unless an ancestor is about to
    /// do it anyway.
    pub(crate) fn propagate(&self, id: NodeId) {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if self.is_diffing(node) {
                return;
            }
            let is_owner = self
                .with(node, |retainer| retainer.kind.is_host_owner())
                .unwrap_or(false);
            if is_owner {
                self.arrange(node);
                return;
            }
            current = self.parent(node);
        }
    }

    fn retarget_portal(&self, id: NodeId, element: &Element) {
        let Some(root) = element.props().get_shared::<H::Node>("root").cloned() else {
            return;
        };
        let detached = self.with_mut(id, |retainer| {
            if retainer.host.as_ref() == Some(&root) {
                return None;
            }
            let old = retainer.host.replace(root.clone());
            Some((old, mem::take(&mut retainer.arranged)))
        });
        if let Some(Some((Some(old), arranged))) = detached {
            tracing::debug!(?id, from = ?old, to = ?root, "portal moved to a new root");
            let mut host = self.host.borrow_mut();
            for node in &arranged {
                host.remove_child(&old, node);
            }
        }
    }

    /// Brings the host children of `id` in line with its committed children.
    ///
    /// Nodes that are no longer wanted are removed unless they linger behind
    /// an async teardown; the rest are put in order with as few moves as
    /// possible.
    pub(crate) fn arrange(&self, id: NodeId) {
        let Some((Some(parent), committed, mut current)) = self.with(id, |retainer| {
            (
                retainer.host.clone(),
                retainer.committed.clone(),
                retainer.arranged.clone(),
            )
        }) else {
            return;
        };

        let desired: Vec<H::Node> = committed
            .iter()
            .flatten()
            .flat_map(|child| self.host_nodes(*child))
            .collect();
        let wanted: HashSet<&H::Node> = desired.iter().collect();

        {
            let lingering = self.lingering.borrow();
            let mut host = self.host.borrow_mut();
            current.retain(|node| {
                let keep = wanted.contains(node) || lingering.contains_key(node);
                if !keep {
                    host.remove_child(&parent, node);
                }
                keep
            });

            let index: HashMap<&H::Node, usize> = current
                .iter()
                .enumerate()
                .map(|(position, node)| (node, position))
                .collect();
            let positions: Vec<Option<usize>> =
                desired.iter().map(|node| index.get(node).copied()).collect();
            let keep = plan_moves(&positions);
            drop(index);

            for position in (0..desired.len()).rev() {
                if keep[position] {
                    continue;
                }
                let node = &desired[position];
                let reference = desired.get(position + 1);
                host.insert_before(&parent, node, reference);
                current.retain(|existing| existing != node);
                let at = reference
                    .and_then(|reference| current.iter().position(|existing| existing == reference))
                    .unwrap_or(current.len());
                current.insert(at, node.clone());
            }
        }

        self.with_mut(id, |retainer| retainer.arranged = current);
    }
}
