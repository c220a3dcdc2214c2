//! The handle a component instance uses to talk to the engine.

use alloc::{boxed::Box, rc::Rc, rc::Weak, vec::Vec};
use core::{any::Any, fmt};

use futures::FutureExt;

use crate::{
    arena::NodeId,
    controller::{Cleanup, Emit, Mailbox, NextProps, NodesCallback},
    element::Child,
    error::Error,
    event::{Event, ListenerId, Phase},
    props::{Props, Str},
    spawn::RenderFuture,
};

/// Which list a node callback goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hook {
    Schedule,
    After,
}

/// Engine operations reachable from a [`Context`].
///
/// Object safe so contexts do not carry the host type around.
pub(crate) trait Runtime {
    fn props(&self, id: NodeId) -> Option<Props>;
    fn is_mounted(&self, id: NodeId) -> bool;
    fn refresh(&self, id: NodeId, before: Option<Box<dyn FnOnce()>>) -> RenderFuture;
    fn provide(&self, id: NodeId, key: Str, value: Rc<dyn Any>);
    fn consume(&self, id: NodeId, key: &str) -> Option<Rc<dyn Any>>;
    fn add_listener(
        &self,
        id: NodeId,
        kind: Str,
        capture: bool,
        callback: Rc<dyn Fn(&Event)>,
    ) -> ListenerId;
    fn remove_listener(&self, id: NodeId, listener: ListenerId) -> bool;
    fn dispatch(&self, id: NodeId, event: &Event) -> bool;
    fn hook(&self, id: NodeId, hook: Hook, callback: NodesCallback);
    fn cleanup(&self, id: NodeId, cleanup: Cleanup);
}

fn erase<N: 'static>(callback: impl FnOnce(&[N]) + 'static) -> NodesCallback {
    Box::new(move |nodes: &dyn Any| {
        if let Some(nodes) = nodes.downcast_ref::<Vec<N>>() {
            callback(nodes);
        } else {
            tracing::warn!(
                expected = core::any::type_name::<N>(),
                "callback node type does not match the renderer"
            );
            callback(&[]);
        }
    })
}

/// Per-instance handle passed to component bodies.
///
/// Cheap to clone; clones refer to the same instance. A context outliving its
/// component (or its renderer) turns every operation into a logged no-op.
#[derive(Clone)]
pub struct Context {
    runtime: Weak<dyn Runtime>,
    id: NodeId,
    mailbox: Rc<Mailbox>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

impl Context {
    pub(crate) fn new(runtime: Weak<dyn Runtime>, id: NodeId) -> Self {
        Self {
            runtime,
            id,
            mailbox: Rc::default(),
        }
    }

    pub(crate) const fn mailbox(&self) -> &Rc<Mailbox> {
        &self.mailbox
    }

    fn runtime(&self) -> Option<Rc<dyn Runtime>> {
        let runtime = self.runtime.upgrade();
        if runtime.is_none() {
            tracing::debug!(id = ?self.id, "context used after its renderer was dropped");
        }
        runtime
    }

    /// Identifier of the component instance.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// The props of the latest render.
    #[must_use]
    pub fn props(&self) -> Props {
        self.runtime()
            .and_then(|runtime| runtime.props(self.id))
            .unwrap_or_default()
    }

    /// Whether the instance is still part of the tree.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.runtime()
            .is_some_and(|runtime| runtime.is_mounted(self.id))
    }

    /// Re-renders the component with its current props.
    pub fn refresh(&self) -> RenderFuture {
        self.runtime().map_or_else(
            || RenderFuture::ready(Err(Error::Unmounted)),
            |runtime| runtime.refresh(self.id, None),
        )
    }

    /// Runs `update` and then re-renders the component.
    pub fn refresh_with(&self, update: impl FnOnce() + 'static) -> RenderFuture {
        self.runtime().map_or_else(
            || RenderFuture::ready(Err(Error::Unmounted)),
            |runtime| runtime.refresh(self.id, Some(Box::new(update))),
        )
    }

    /// Makes `value` visible to descendants under `key`.
    pub fn provide<T: 'static>(&self, key: impl Into<Str>, value: T) {
        if let Some(runtime) = self.runtime() {
            runtime.provide(self.id, key.into(), Rc::new(value));
        }
    }

    /// Reads the nearest ancestor's provision for `key`.
    #[must_use]
    pub fn consume<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let value = self.runtime()?.consume(self.id, key)?;
        let value = value.downcast_ref::<T>().cloned();
        if value.is_none() {
            tracing::warn!(
                key,
                expected = core::any::type_name::<T>(),
                "provision has a different type"
            );
        }
        value
    }

    /// Registers a listener for events of `kind`.
    ///
    /// [`Phase::Capture`] listeners run on the way down to the target; the
    /// other phases register a listener that runs at the target and while
    /// bubbling.
    pub fn add_event_listener(
        &self,
        kind: impl Into<Str>,
        phase: Phase,
        listener: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        self.runtime().map_or(ListenerId(0), |runtime| {
            runtime.add_listener(
                self.id,
                kind.into(),
                phase == Phase::Capture,
                Rc::new(listener),
            )
        })
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn remove_event_listener(&self, listener: ListenerId) -> bool {
        self.runtime()
            .is_some_and(|runtime| runtime.remove_listener(self.id, listener))
    }

    /// Dispatches `event` with this component as the target.
    ///
    /// Returns `false` when a listener called [`Event::prevent_default`].
    pub fn dispatch_event(&self, event: Event) -> bool {
        self.runtime()
            .is_none_or(|runtime| runtime.dispatch(self.id, &event))
    }

    /// Runs `callback` with the component's host nodes right before its next
    /// output is committed.
    pub fn schedule<N: 'static>(&self, callback: impl FnOnce(&[N]) + 'static) {
        if let Some(runtime) = self.runtime() {
            runtime.hook(self.id, Hook::Schedule, erase(callback));
        }
    }

    /// Runs `callback` with the component's host nodes once the outermost
    /// commit in progress has finished.
    pub fn after<N: 'static>(&self, callback: impl FnOnce(&[N]) + 'static) {
        if let Some(runtime) = self.runtime() {
            runtime.hook(self.id, Hook::After, erase(callback));
        }
    }

    /// Runs `callback` with the component's host nodes when it unmounts.
    pub fn cleanup<N: 'static>(&self, callback: impl FnOnce(&[N]) + 'static) {
        if let Some(runtime) = self.runtime() {
            runtime.cleanup(self.id, Cleanup::Sync(erase(callback)));
        }
    }

    /// Like [`Context::cleanup`], but the host nodes stay attached until the
    /// returned future settles.
    pub fn cleanup_async<N, F, Fut>(&self, callback: F)
    where
        N: 'static,
        F: FnOnce(&[N]) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let Some(runtime) = self.runtime() else {
            return;
        };
        runtime.cleanup(
            self.id,
            Cleanup::Async(Box::new(move |nodes: &dyn Any| {
                if let Some(nodes) = nodes.downcast_ref::<Vec<N>>() {
                    callback(nodes).boxed_local()
                } else {
                    tracing::warn!(
                        expected = core::any::type_name::<N>(),
                        "cleanup node type does not match the renderer"
                    );
                    callback(&[]).boxed_local()
                }
            })),
        );
    }

    /// Waits for the next props. Resolves to `None` once the component unmounts.
    ///
    /// Only meaningful inside generator bodies.
    pub fn next_props(&self) -> NextProps {
        NextProps::new(self.mailbox.clone())
    }

    /// Renders `child` and suspends the body until the engine resumes it.
    ///
    /// Only meaningful inside generator bodies.
    pub fn emit(&self, child: impl Into<Child>) -> Emit {
        Emit::new(self.mailbox.clone(), child.into())
    }
}
