//! Running component bodies and coalescing their updates.

use alloc::{boxed::Box, rc::Rc, rc::Weak};
use core::{
    pin::Pin,
    task::{Context as TaskContext, Poll},
};

use futures::{FutureExt, channel::oneshot, future::LocalBoxFuture, task::noop_waker_ref};
use pin_project_lite::pin_project;

use super::Engine;
use crate::{
    arena::NodeId,
    component::Body,
    controller::{Cascade, Controller, ControllerFlags, Mailbox},
    element::Child,
    error::Error,
    host::Host,
    spawn::{Pending, RenderFuture},
};

type BodyFuture = LocalBoxFuture<'static, anyhow::Result<Child>>;

impl<H: Host> Engine<H> {
    /// Runs one step of the component at `id` with its current props.
    pub(crate) fn step(&self, id: NodeId) -> Result<Option<Pending>, Error> {
        let Some(controller) = self.controller(id) else {
            return Ok(None);
        };
        match controller.component.body().clone() {
            Body::Function(_) | Body::Generator(_) => self.step_sync(id, &controller),
            Body::AsyncFunction(_) => Ok(Some(self.step_async_function(id, &controller))),
            Body::AsyncGenerator(_) => Ok(Some(self.step_async_generator(id, &controller))),
        }
    }

    pub(crate) fn refresh_component(
        &self,
        id: NodeId,
        before: Option<Box<dyn FnOnce()>>,
    ) -> RenderFuture {
        let Some(controller) = self.live_controller(id) else {
            tracing::error!(?id, "refresh called on an unmounted component");
            return RenderFuture::ready(Ok(()));
        };
        if let Some(before) = before {
            before();
        }

        if controller.has(ControllerFlags::STEPPING) {
            if controller.has(ControllerFlags::CASCADED) {
                tracing::debug!(component = %controller.name(), "refresh ignored during a cascaded render");
            } else if !controller.has(ControllerFlags::ENQUEUED) {
                tracing::warn!(
                    component = %controller.name(),
                    "cascading refresh: component refreshed while it was rendering"
                );
                controller.set(ControllerFlags::ENQUEUED, true);
            }
            return RenderFuture::pending(self.cascade(&controller));
        }

        let _batch = self.batch();
        RenderFuture::from_step(self.step(id))
    }

    /// Function and generator components run to completion right away.
    ///
    /// A refresh that arrives while the body runs or its output is diffed
    /// buys exactly one more step before control returns to the caller.
    fn step_sync(&self, id: NodeId, controller: &Controller) -> Result<Option<Pending>, Error> {
        controller.set(ControllerFlags::STEPPING, true);
        let result = loop {
            controller.set(ControllerFlags::ENQUEUED, false);
            let rendered = match self.run_sync(controller) {
                Ok(child) => {
                    let diffed = self.update_children(id, child);
                    match diffed {
                        Err(error) if controller.body.borrow().is_some() => {
                            self.intercept(id, controller, error)
                        }
                        diffed => diffed,
                    }
                }
                Err(error) => Err(error),
            };
            if controller.has(ControllerFlags::ENQUEUED)
                && !controller.has(ControllerFlags::CASCADED)
                && !controller.has(ControllerFlags::UNMOUNTED)
            {
                controller.set(ControllerFlags::CASCADED, true);
                continue;
            }
            break rendered;
        };
        controller.set(
            ControllerFlags::STEPPING | ControllerFlags::ENQUEUED | ControllerFlags::CASCADED,
            false,
        );
        let cascade = controller.cascade.borrow_mut().take();
        if let Some(cascade) = cascade {
            let _ = cascade.tx.send(result.clone());
        }
        result
    }

    /// The future for refreshes that arrive while `controller` is stepping.
    ///
    /// It settles once the step that runs after them has committed.
    fn cascade(&self, controller: &Controller) -> Pending {
        if let Some(cascade) = controller.cascade.borrow().as_ref() {
            return cascade.pending.clone();
        }
        let (tx, rx) = oneshot::channel::<Result<Option<Pending>, Error>>();
        let pending = self.eager(async move {
            match rx.await {
                Ok(Ok(Some(step))) => step.await,
                Ok(Ok(None)) | Err(oneshot::Canceled) => Ok(()),
                Ok(Err(error)) => Err(error),
            }
        });
        *controller.cascade.borrow_mut() = Some(Cascade {
            tx,
            pending: pending.clone(),
        });
        pending
    }

    fn run_sync(&self, controller: &Controller) -> Result<Child, Error> {
        match controller.component.body().clone() {
            Body::Function(body) => {
                let props = controller.props.borrow().clone();
                body(&props, &controller.context)
                    .map_err(|error| Error::component(controller.name(), error))
            }
            Body::Generator(make) => {
                let existing = controller.body.borrow_mut().take();
                let body = match existing {
                    Some(body) if !controller.has(ControllerFlags::FINISHED) => body,
                    _ => {
                        controller.set(ControllerFlags::FINISHED, false);
                        controller.mailbox.reopen();
                        make(controller.context.clone())
                    }
                };
                controller.mailbox.push(controller.props.borrow().clone());
                Self::resume(controller, body)
            }
            Body::AsyncFunction(_) | Body::AsyncGenerator(_) => {
                Err(Error::invalid("async components cannot run synchronously"))
            }
        }
    }

    /// Polls a sync generator body until its next emit.
    fn resume(controller: &Controller, mut body: BodyFuture) -> Result<Child, Error> {
        let mut cx = TaskContext::from_waker(noop_waker_ref());
        match body.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(child)) => {
                controller.set(ControllerFlags::FINISHED, true);
                Ok(child)
            }
            Poll::Ready(Err(error)) => {
                controller.set(ControllerFlags::FINISHED, true);
                Err(Error::component(controller.name(), error))
            }
            Poll::Pending => match controller.mailbox.take_emitted() {
                Some(child) => {
                    *controller.body.borrow_mut() = Some(body);
                    Ok(child)
                }
                None => Err(Error::GeneratorSuspended {
                    name: controller.name(),
                }),
            },
        }
    }

    /// Hands a child failure to the generator body, once per step.
    fn intercept(
        &self,
        id: NodeId,
        controller: &Controller,
        error: Error,
    ) -> Result<Option<Pending>, Error> {
        let Some(body) = controller.body.borrow_mut().take() else {
            return Err(error);
        };
        tracing::debug!(component = %controller.name(), %error, "throwing child error into generator");
        controller.mailbox.throw(error);
        let child = Self::resume(controller, body)?;
        self.update_children(id, child)
    }

    /// Async functions keep at most one call in flight and one queued.
    ///
    /// Updates arriving while a call is in flight share the queued call, which
    /// starts with the latest props once the in-flight call has returned.
    fn step_async_function(&self, id: NodeId, controller: &Controller) -> Pending {
        let (inflight, enqueued) = {
            let steps = controller.steps.borrow();
            (steps.inflight.clone(), steps.enqueued.clone())
        };
        let Some(inflight) = inflight else {
            let (block, value) = self.run_async_function(id, controller);
            controller.steps.borrow_mut().inflight = Some(block);
            return value;
        };
        if let Some(enqueued) = enqueued {
            return enqueued;
        }

        let engine = self.this.clone();
        let enqueued = self.eager(async move {
            let _ = inflight.await;
            let Some(value) = engine.upgrade().and_then(|engine| engine.run_enqueued(id)) else {
                return Ok(());
            };
            value.await
        });
        controller.steps.borrow_mut().enqueued = Some(enqueued.clone());
        enqueued
    }

    /// Calls the body once. Returns the future that settles when the call
    /// returns and the one that settles when its output has been committed.
    fn run_async_function(&self, id: NodeId, controller: &Controller) -> (Pending, Pending) {
        let step = {
            let mut steps = controller.steps.borrow_mut();
            steps.step += 1;
            steps.step
        };
        let name = controller.name();
        let output = match controller.component.body().clone() {
            Body::AsyncFunction(body) => {
                let props = controller.props.borrow().clone();
                body(props, controller.context.clone())
                    .map(move |result| result.map_err(|error| Error::component(name, error)))
                    .boxed_local()
            }
            _ => futures::future::ready(Err(Error::invalid("not an async function component")))
                .boxed_local(),
        }
        .shared();
        tracing::trace!(?id, step, "async function step started");

        let block = {
            let output = output.clone();
            let engine = self.this.clone();
            self.eager(async move {
                let _ = output.await;
                if let Some(engine) = engine.upgrade() {
                    engine.settle_block(id, step);
                }
                Ok(())
            })
        };
        let engine = self.this.clone();
        let value = self.eager(async move {
            let child = output.await?;
            let Some(engine) = engine.upgrade() else {
                return Ok(());
            };
            let pending = engine.render_component_child(id, child)?;
            match pending {
                Some(pending) => pending.await,
                None => Ok(()),
            }
        });
        (block, value)
    }

    fn settle_block(&self, id: NodeId, step: u64) {
        let Some(controller) = self.controller(id) else {
            return;
        };
        let mut steps = controller.steps.borrow_mut();
        if steps.step == step && steps.enqueued.is_none() {
            steps.inflight = None;
        }
    }

    fn run_enqueued(&self, id: NodeId) -> Option<Pending> {
        let controller = self.live_controller(id)?;
        controller.steps.borrow_mut().enqueued = None;
        let (block, value) = self.run_async_function(id, &controller);
        controller.steps.borrow_mut().inflight = Some(block);
        Some(value)
    }

    /// Diffs the output of an asynchronous step, unless the component is gone.
    fn render_component_child(&self, id: NodeId, child: Child) -> Result<Option<Pending>, Error> {
        let _batch = self.batch();
        if self.live_controller(id).is_none() {
            tracing::trace!(?id, "dropping output of an unmounted component");
            return Ok(None);
        }
        self.update_children(id, child)
    }

    /// Async generators run on their own; an update only hands over props.
    ///
    /// The returned future settles when the first emit after this update, or
    /// a later one, has been committed.
    fn step_async_generator(&self, id: NodeId, controller: &Controller) -> Pending {
        let running = controller.emits.borrow().driver.is_some()
            && !controller.has(ControllerFlags::FINISHED);
        if !running {
            self.start_driver(id, controller);
        }
        controller.mailbox.push(controller.props.borrow().clone());
        let mut emits = controller.emits.borrow_mut();
        let threshold = emits.emitted + 1;
        emits.races.register(threshold)
    }

    fn start_driver(&self, id: NodeId, controller: &Controller) {
        let Body::AsyncGenerator(make) = controller.component.body().clone() else {
            return;
        };
        controller.set(ControllerFlags::FINISHED, false);
        controller.mailbox.reopen();
        let driver = Driver {
            body: make(controller.context.clone()),
            engine: self.this.clone(),
            id,
            mailbox: controller.mailbox.clone(),
        };
        tracing::trace!(?id, "starting async generator");
        let done = self.eager(driver);
        controller.emits.borrow_mut().driver = Some(done);
    }

    /// Renders a child emitted by an async generator.
    fn generator_emit(&self, id: NodeId, child: Child) {
        let _batch = self.batch();
        let Some(controller) = self.live_controller(id) else {
            return;
        };
        let sequence = {
            let mut emits = controller.emits.borrow_mut();
            emits.emitted += 1;
            emits.emitted
        };
        match self.update_children(id, child) {
            Ok(None) => self.emit_settled(id, sequence, &Ok(())),
            Ok(Some(pending)) => {
                let engine = self.this.clone();
                self.spawn(async move {
                    let result = pending.await;
                    if let Some(engine) = engine.upgrade() {
                        engine.emit_settled(id, sequence, &result);
                    }
                });
            }
            // Waiters stay pending: the body settles them with its next emit,
            // or rejects them by returning the error.
            Err(error) if controller.has(ControllerFlags::FINISHED) => {
                controller.emits.borrow_mut().races.settle_all(&Err(error));
            }
            Err(error) => controller.mailbox.throw(error),
        }
    }

    fn emit_settled(&self, id: NodeId, sequence: u64, result: &Result<(), Error>) {
        let Some(controller) = self.controller(id) else {
            return;
        };
        let mut emits = controller.emits.borrow_mut();
        if sequence <= emits.committed {
            return;
        }
        emits.committed = sequence;
        emits.races.settle_through(sequence, result);
        if controller.has(ControllerFlags::FINISHED) {
            emits.races.settle_all(result);
        }
    }

    fn generator_returned(&self, id: NodeId, result: anyhow::Result<Child>) {
        let Some(controller) = self.live_controller(id) else {
            if let Err(error) = result {
                tracing::error!(?id, error = %format_args!("{error:#}"), "async generator failed after unmounting");
            }
            return;
        };
        controller.set(ControllerFlags::FINISHED, true);
        match result {
            Ok(child) => self.generator_emit(id, child),
            Err(error) => {
                let error = Error::component(controller.name(), error);
                let mut emits = controller.emits.borrow_mut();
                if emits.races.len() == 0 {
                    tracing::error!(%error, "async generator failed with nobody waiting");
                }
                emits.races.settle_all(&Err(error));
            }
        }
    }
}

pin_project! {
    /// Drives an async generator body and renders whatever it emits.
    struct Driver<F, H: Host> {
        #[pin]
        body: F,
        engine: Weak<Engine<H>>,
        id: NodeId,
        mailbox: Rc<Mailbox>,
    }
}

impl<F, H> Future for Driver<F, H>
where
    F: Future<Output = anyhow::Result<Child>>,
    H: Host,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        let this = self.project();
        match this.body.poll(cx) {
            Poll::Ready(result) => {
                if let Some(engine) = this.engine.upgrade() {
                    engine.generator_returned(*this.id, result);
                }
                Poll::Ready(())
            }
            Poll::Pending => {
                if let Some(child) = this.mailbox.take_emitted() {
                    let Some(engine) = this.engine.upgrade() else {
                        return Poll::Ready(());
                    };
                    engine.generator_emit(*this.id, child);
                    // resume the body past its emit on the next poll
                    cx.waker().wake_by_ref();
                }
                Poll::Pending
            }
        }
    }
}
