//! The reconciler.
//!
//! Every rendered element is backed by a [`Retainer`] stored in an arena.
//! Reconciling an element's children is a numbered *pass*: the pass diffs the
//! new children against the latest ones, mounts and updates in document
//! order, and commits once every child has settled. Commits walk bottom-up,
//! so by the time a host element arranges its children, each of them already
//! holds its committed host nodes.
//!
//! The engine lives behind an `Rc` and hands out `Weak` references to
//! contexts and spawned tasks. `RefCell` borrows are scoped to the engine's
//! own bookkeeping and never held while component code runs.

mod commit;
mod diff;
mod schedule;
mod unmount;

use alloc::{boxed::Box, collections::VecDeque, rc::Rc, rc::Weak, vec::Vec};
use core::{
    any::Any,
    cell::{Cell, Ref, RefCell, RefMut},
};
use std::collections::HashMap;

use bitflags::bitflags;
use futures::{FutureExt, future::Shared};

use crate::{
    arena::{Arena, NodeId},
    component::Component,
    context::{Hook, Runtime},
    controller::{Cleanup, Controller, ControllerFlags, NodesCallback},
    element::{Child, Element},
    event::{self, Event, Listener, ListenerId},
    host::Host,
    props::{Props, Str, Value},
    spawn::{self, RenderFuture, Spawn},
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct RetainerFlags: u8 {
        /// The retainer has been committed at least once.
        const MOUNTED = 1;
        /// The retainer has been torn down.
        const UNMOUNTED = 1 << 1;
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Kind {
    Root,
    Intrinsic(Str),
    Text,
    Raw,
    Fragment,
    Portal,
    Component(Component),
}

impl Kind {
    /// Whether the retainer owns the host node its children are inserted into.
    const fn is_host_owner(&self) -> bool {
        matches!(self, Self::Root | Self::Intrinsic(_) | Self::Portal)
    }
}

/// Persistent state behind one rendered element.
pub(crate) struct Retainer<N> {
    pub(crate) kind: Kind,
    /// The latest element rendered here. `None` for roots and plain text.
    pub(crate) element: Option<Element>,
    /// The element the host node was last patched with.
    pub(crate) committed_element: Option<Element>,
    /// Latest text for text retainers.
    pub(crate) text: Option<Str>,
    pub(crate) committed_text: Option<Str>,
    pub(crate) parent: Option<NodeId>,
    /// Children of the latest pass. `None` marks a hole.
    pub(crate) children: Vec<Option<NodeId>>,
    /// Children of the last committed pass.
    pub(crate) committed: Vec<Option<NodeId>>,
    /// Children dropped by a pass, with that pass's number.
    pub(crate) graveyard: Vec<(u64, NodeId)>,
    pub(crate) pass: u64,
    pub(crate) committed_pass: u64,
    pub(crate) host: Option<N>,
    /// The host nodes this retainer has placed under `host`, in order.
    pub(crate) arranged: Vec<N>,
    /// Namespace the retainer's own host node lives in.
    pub(crate) ns: Option<Str>,
    /// Namespace handed to children.
    pub(crate) scope: Option<Str>,
    pub(crate) flags: RetainerFlags,
    pub(crate) controller: Option<Rc<Controller>>,
}

impl<N> Retainer<N> {
    pub(crate) const fn new(kind: Kind, parent: Option<NodeId>, scope: Option<Str>) -> Self {
        Self {
            kind,
            element: None,
            committed_element: None,
            text: None,
            committed_text: None,
            parent,
            children: Vec::new(),
            committed: Vec::new(),
            graveyard: Vec::new(),
            pass: 0,
            committed_pass: 0,
            host: None,
            arranged: Vec::new(),
            ns: None,
            scope,
            flags: RetainerFlags::empty(),
            controller: None,
        }
    }

    /// The host node this retainer created itself, as opposed to one handed
    /// in through a portal or a raw node value.
    pub(crate) fn into_created_node(self) -> Option<N> {
        match self.kind {
            Kind::Intrinsic(_) | Kind::Text => self.host,
            Kind::Raw if created_raw(self.committed_element.as_ref()) => self.host,
            _ => None,
        }
    }

    /// Every child this retainer may still reference.
    pub(crate) fn all_children(&self) -> Vec<NodeId> {
        let mut all: Vec<NodeId> = self
            .children
            .iter()
            .chain(&self.committed)
            .flatten()
            .copied()
            .chain(self.graveyard.iter().map(|(_, node)| *node))
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}

/// Whether a raw element's node was created from markup.
pub(crate) fn created_raw(element: Option<&Element>) -> bool {
    matches!(
        element.and_then(|element| element.props().get("value")),
        Some(Value::Str(_))
    )
}

/// Closes a batch of work; the outermost batch flushes deferred callbacks.
pub(crate) struct Batch<'a, H: Host> {
    engine: &'a Engine<H>,
}

impl<H: Host> Drop for Batch<'_, H> {
    fn drop(&mut self) {
        let depth = self.engine.depth.get() - 1;
        self.engine.depth.set(depth);
        if depth == 0 {
            self.engine.flush();
        }
    }
}

pub(crate) struct Engine<H: Host> {
    this: Weak<Self>,
    host: RefCell<H>,
    tree: RefCell<Arena<Retainer<H::Node>>>,
    roots: RefCell<HashMap<H::Node, NodeId>>,
    spawner: Rc<dyn Spawn>,
    deferred: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    depth: Cell<usize>,
    /// Retainers whose children are being diffed right now.
    diffing: RefCell<Vec<NodeId>>,
    /// Host nodes kept in place while an async teardown runs, with their owner.
    lingering: RefCell<HashMap<H::Node, NodeId>>,
    next_listener: Cell<u64>,
}

impl<H: Host> Engine<H> {
    pub(crate) fn new(host: H, spawner: Rc<dyn Spawn>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            host: RefCell::new(host),
            tree: RefCell::new(Arena::new()),
            roots: RefCell::default(),
            spawner,
            deferred: RefCell::default(),
            depth: Cell::new(0),
            diffing: RefCell::default(),
            lingering: RefCell::default(),
            next_listener: Cell::new(0),
        })
    }

    pub(crate) fn host(&self) -> Ref<'_, H> {
        self.host.borrow()
    }

    pub(crate) fn host_mut(&self) -> RefMut<'_, H> {
        self.host.borrow_mut()
    }

    pub(crate) fn runtime(&self) -> Weak<dyn Runtime> {
        let weak: Weak<dyn Runtime> = self.this.clone();
        weak
    }

    pub(crate) fn batch(&self) -> Batch<'_, H> {
        self.depth.set(self.depth.get() + 1);
        Batch { engine: self }
    }

    /// Queues `callback` to run once the outermost batch closes.
    pub(crate) fn defer(&self, callback: impl FnOnce() + 'static) {
        self.deferred.borrow_mut().push_back(Box::new(callback));
    }

    fn flush(&self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }

    pub(crate) fn eager<T: Clone + 'static>(
        &self,
        future: impl Future<Output = T> + 'static,
    ) -> Shared<futures::future::LocalBoxFuture<'static, T>> {
        spawn::eager(&*self.spawner, future)
    }

    pub(crate) fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.spawner.spawn_local(future.boxed_local());
    }

    pub(crate) fn with<R>(&self, id: NodeId, f: impl FnOnce(&Retainer<H::Node>) -> R) -> Option<R> {
        self.tree.borrow().get(id).map(f)
    }

    pub(crate) fn with_mut<R>(
        &self,
        id: NodeId,
        f: impl FnOnce(&mut Retainer<H::Node>) -> R,
    ) -> Option<R> {
        self.tree.borrow_mut().get_mut(id).map(f)
    }

    pub(crate) fn insert(&self, retainer: Retainer<H::Node>) -> NodeId {
        self.tree.borrow_mut().insert(retainer)
    }

    pub(crate) fn controller(&self, id: NodeId) -> Option<Rc<Controller>> {
        self.with(id, |retainer| retainer.controller.clone()).flatten()
    }

    fn live_controller(&self, id: NodeId) -> Option<Rc<Controller>> {
        self.controller(id)
            .filter(|controller| !controller.has(ControllerFlags::UNMOUNTED))
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.with(id, |retainer| retainer.parent).flatten()
    }

    pub(crate) fn is_diffing(&self, id: NodeId) -> bool {
        self.diffing.borrow().contains(&id)
    }

    /// The host nodes an element contributes to its host parent, in order.
    pub(crate) fn host_nodes(&self, id: NodeId) -> Vec<H::Node> {
        fn collect<N: Clone>(tree: &Arena<Retainer<N>>, id: NodeId, out: &mut Vec<N>) {
            let Some(retainer) = tree.get(id) else {
                return;
            };
            match retainer.kind {
                Kind::Intrinsic(_) | Kind::Text | Kind::Raw => {
                    out.extend(retainer.host.iter().cloned());
                }
                Kind::Fragment | Kind::Component(_) => {
                    for child in retainer.committed.iter().flatten() {
                        collect(tree, *child, out);
                    }
                }
                Kind::Root | Kind::Portal => {}
            }
        }

        let mut nodes = Vec::new();
        collect(&self.tree.borrow(), id, &mut nodes);
        nodes
    }

    /// The nearest retainer, starting at `id`, that owns a host parent node.
    pub(crate) fn host_owner(&self, id: NodeId) -> Option<NodeId> {
        let tree = self.tree.borrow();
        let mut current = Some(id);
        while let Some(node) = current {
            let retainer = tree.get(node)?;
            if retainer.kind.is_host_owner() {
                return Some(node);
            }
            current = retainer.parent;
        }
        None
    }

    /// Renders `child` into `root`.
    pub(crate) fn render(&self, child: Child, root: &H::Node) -> RenderFuture {
        let _batch = self.batch();
        let clearing = matches!(child, Child::Empty);
        let existing = self.roots.borrow().get(root).copied();
        let id = match existing {
            Some(id) => id,
            None if clearing => return RenderFuture::ready(Ok(())),
            None => {
                let mut retainer = Retainer::new(Kind::Root, None, None);
                retainer.host = Some(root.clone());
                retainer.flags = RetainerFlags::MOUNTED;
                let id = self.insert(retainer);
                tracing::debug!(?root, ?id, "mounting root");
                self.roots.borrow_mut().insert(root.clone(), id);
                id
            }
        };

        let result = self.update_children(id, child);
        if clearing && matches!(result, Ok(None)) && !self.has_lingering(id) {
            tracing::debug!(?root, "root cleared");
            self.roots.borrow_mut().remove(root);
            self.tree.borrow_mut().remove(id);
        }
        RenderFuture::from_step(result)
    }

    pub(crate) fn is_root_mounted(&self, root: &H::Node) -> bool {
        self.roots.borrow().contains_key(root)
    }

    fn has_lingering(&self, owner: NodeId) -> bool {
        self.lingering.borrow().values().any(|node| *node == owner)
    }

    /// Number of live retainers, roots included.
    pub(crate) fn retained(&self) -> usize {
        self.tree.borrow().len()
    }

    fn provisions_from(&self, id: NodeId, key: &str) -> Option<Rc<dyn Any>> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if let Some(controller) = self.controller(node) {
                let value = controller.provisions.borrow().get(key).cloned();
                if value.is_some() {
                    return value;
                }
            }
            current = self.parent(node);
        }
        None
    }

    /// Listener snapshots for the target and each component ancestor.
    fn listener_path(&self, id: NodeId) -> Vec<Vec<Listener>> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(controller) = self.controller(node) {
                path.push(controller.listeners.borrow().clone());
            }
            current = self.parent(node);
        }
        path
    }
}

impl<H: Host> Runtime for Engine<H> {
    fn props(&self, id: NodeId) -> Option<Props> {
        self.controller(id)
            .map(|controller| controller.props.borrow().clone())
    }

    fn is_mounted(&self, id: NodeId) -> bool {
        self.live_controller(id).is_some()
    }

    fn refresh(&self, id: NodeId, before: Option<Box<dyn FnOnce()>>) -> RenderFuture {
        self.refresh_component(id, before)
    }

    fn provide(&self, id: NodeId, key: Str, value: Rc<dyn Any>) {
        match self.controller(id) {
            Some(controller) => {
                controller.provisions.borrow_mut().insert(key, value);
            }
            None => tracing::warn!(%key, "provide called on an unmounted component"),
        }
    }

    fn consume(&self, id: NodeId, key: &str) -> Option<Rc<dyn Any>> {
        let value = self.provisions_from(id, key);
        if value.is_none() {
            tracing::warn!(key, "no ancestor provides this key");
        }
        value
    }

    fn add_listener(
        &self,
        id: NodeId,
        kind: Str,
        capture: bool,
        callback: Rc<dyn Fn(&Event)>,
    ) -> ListenerId {
        let listener = ListenerId(self.next_listener.get() + 1);
        self.next_listener.set(listener.0);
        match self.live_controller(id) {
            Some(controller) => controller.listeners.borrow_mut().push(Listener {
                id: listener,
                kind,
                capture,
                callback,
            }),
            None => tracing::warn!(%kind, "listener added to an unmounted component"),
        }
        listener
    }

    fn remove_listener(&self, id: NodeId, listener: ListenerId) -> bool {
        let Some(controller) = self.controller(id) else {
            return false;
        };
        let mut listeners = controller.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|registered| registered.id != listener);
        listeners.len() != before
    }

    fn dispatch(&self, id: NodeId, event: &Event) -> bool {
        let path = self.listener_path(id);
        event::dispatch(event, &path)
    }

    fn hook(&self, id: NodeId, hook: Hook, callback: NodesCallback) {
        let Some(controller) = self.live_controller(id) else {
            tracing::warn!(?hook, "callback registered on an unmounted component");
            return;
        };
        match hook {
            Hook::Schedule => controller.scheduled.borrow_mut().push(callback),
            Hook::After => controller.after.borrow_mut().push(callback),
        }
    }

    fn cleanup(&self, id: NodeId, cleanup: Cleanup) {
        if let Some(controller) = self.live_controller(id) {
            controller.cleanups.borrow_mut().push(cleanup);
            return;
        }
        let nodes: Vec<H::Node> = Vec::new();
        match cleanup {
            Cleanup::Sync(callback) => callback(&nodes),
            Cleanup::Async(callback) => self.spawn(callback(&nodes)),
        }
    }
}
