//! Tearing down retainers.

use alloc::vec::Vec;
use core::{
    mem,
    pin::Pin,
    task::{Context as TaskContext, Poll},
};

use futures::{
    FutureExt,
    future::{LocalBoxFuture, join_all},
    task::noop_waker_ref,
};

use super::{Engine, Kind, Retainer, RetainerFlags};
use crate::{
    arena::NodeId,
    component::ComponentKind,
    controller::{Cleanup, Controller, ControllerFlags},
    host::Host,
};

impl<H: Host> Engine<H> {
    /// Unmounts a child dropped by a committed pass.
    ///
    /// Its host nodes are removed by the next arrangement of its host owner,
    /// unless async teardown is pending; then they stay in place until every
    /// cleanup has settled. Nodes the subtree created are released to the
    /// host once they are gone for good.
    pub(crate) fn bury(&self, id: NodeId) {
        let owner = self.parent(id).and_then(|parent| self.host_owner(parent));
        let nodes = self.host_nodes(id);
        let mut teardown = Vec::new();
        let mut removed = Vec::new();
        self.unmount(id, &mut teardown, &mut removed);
        let created: Vec<H::Node> = {
            let mut tree = self.tree.borrow_mut();
            removed
                .into_iter()
                .filter_map(|node| tree.remove(node))
                .filter_map(Retainer::into_created_node)
                .collect()
        };

        if teardown.is_empty() {
            self.release(&created);
            return;
        }
        let Some(owner) = owner else {
            let engine = self.this.clone();
            self.spawn(async move {
                join_all(teardown).await;
                if let Some(engine) = engine.upgrade() {
                    engine.release(&created);
                }
            });
            return;
        };

        tracing::debug!(?id, nodes = nodes.len(), "host nodes linger until async cleanup settles");
        {
            let mut lingering = self.lingering.borrow_mut();
            for node in &nodes {
                lingering.insert(node.clone(), owner);
            }
        }
        let engine = self.this.clone();
        self.spawn(async move {
            join_all(teardown).await;
            if let Some(engine) = engine.upgrade() {
                engine.finish_linger(nodes);
                engine.release(&created);
            }
        });
    }

    pub(crate) fn release(&self, nodes: &[H::Node]) {
        if nodes.is_empty() {
            return;
        }
        tracing::trace!(count = nodes.len(), "releasing host nodes");
        let mut host = self.host.borrow_mut();
        for node in nodes {
            host.release(node);
        }
    }

    fn finish_linger(&self, nodes: Vec<H::Node>) {
        let _batch = self.batch();
        for node in nodes {
            let Some(owner) = self.lingering.borrow_mut().remove(&node) else {
                continue;
            };
            let still_arranged = self.with_mut(owner, |retainer| {
                let before = retainer.arranged.len();
                retainer.arranged.retain(|existing| *existing != node);
                let parent = retainer.host.clone();
                parent.filter(|_| retainer.arranged.len() != before)
            });
            if let Some(Some(parent)) = still_arranged {
                self.host.borrow_mut().remove_child(&parent, &node);
            }
        }
    }

    /// Marks `id` and its subtree as unmounted and runs component teardown,
    /// parents before children. Collected ids are freed by the caller.
    pub(crate) fn unmount(
        &self,
        id: NodeId,
        teardown: &mut Vec<LocalBoxFuture<'static, ()>>,
        removed: &mut Vec<NodeId>,
    ) {
        let Some((kind, controller, children)) = self.with_mut(id, |retainer| {
            retainer.flags.insert(RetainerFlags::UNMOUNTED);
            (
                retainer.kind.clone(),
                retainer.controller.clone(),
                retainer.all_children(),
            )
        }) else {
            return;
        };
        tracing::trace!(?id, "unmounting");
        removed.push(id);

        if let Some(controller) = controller {
            self.unmount_component(id, &controller, teardown);
        }
        for child in children {
            self.unmount(child, teardown, removed);
        }

        if let Kind::Portal = kind {
            let detached = self.with_mut(id, |retainer| {
                (retainer.host.clone(), mem::take(&mut retainer.arranged))
            });
            if let Some((Some(root), arranged)) = detached {
                let mut host = self.host.borrow_mut();
                for node in &arranged {
                    host.remove_child(&root, node);
                }
            }
        }
    }

    fn unmount_component(
        &self,
        id: NodeId,
        controller: &Controller,
        teardown: &mut Vec<LocalBoxFuture<'static, ()>>,
    ) {
        controller.set(ControllerFlags::UNMOUNTED, true);
        controller.mailbox.close();
        controller.scheduled.borrow_mut().clear();
        controller.after.borrow_mut().clear();

        let nodes = self.host_nodes(id);
        let cleanups = mem::take(&mut *controller.cleanups.borrow_mut());
        for cleanup in cleanups {
            match cleanup {
                Cleanup::Sync(callback) => callback(&nodes),
                Cleanup::Async(callback) => teardown.push(callback(&nodes)),
            }
        }

        match controller.component.kind() {
            ComponentKind::Generator => {
                // the closed mailbox lets the body run to completion
                let body = controller.body.borrow_mut().take();
                if let Some(mut body) = body {
                    let mut cx = TaskContext::from_waker(noop_waker_ref());
                    if let Poll::Ready(Err(error)) = Pin::new(&mut body).poll(&mut cx) {
                        tracing::error!(component = %controller.name(), error = %format_args!("{error:#}"), "generator failed while unmounting");
                    }
                }
            }
            ComponentKind::AsyncGenerator if !controller.has(ControllerFlags::FINISHED) => {
                // host nodes stay until the body has returned
                let driver = controller.emits.borrow().driver.clone();
                if let Some(driver) = driver {
                    teardown.push(driver.boxed_local());
                }
            }
            _ => {}
        }

        controller.emits.borrow_mut().races.settle_all(&Ok(()));
        controller.listeners.borrow_mut().clear();
    }
}
