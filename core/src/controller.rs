//! Per-instance component state.

use alloc::{boxed::Box, collections::BTreeMap, rc::Rc, vec::Vec};
use core::{
    any::Any,
    cell::{Cell, RefCell},
    pin::Pin,
    task::{Context as TaskContext, Poll, Waker},
};

use bitflags::bitflags;
use futures::{
    channel::oneshot,
    future::{LocalBoxFuture, Shared},
};

use crate::{
    component::Component,
    context::Context,
    element::Child,
    error::Error,
    event::Listener,
    props::{Props, Str},
    race::RaceRecord,
    spawn::Pending,
};

bitflags! {
    /// Execution state of a component instance.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub(crate) struct ControllerFlags: u8 {
        /// The body is running or its output is being diffed.
        const STEPPING = 1;
        /// A refresh arrived while stepping.
        const ENQUEUED = 1 << 1;
        /// The extra step caused by a refresh while stepping is running.
        const CASCADED = 1 << 2;
        /// The instance has been torn down.
        const UNMOUNTED = 1 << 3;
        /// The generator body returned.
        const FINISHED = 1 << 4;
    }
}

pub(crate) type NodesCallback = Box<dyn FnOnce(&dyn Any)>;
pub(crate) type AsyncNodesCallback = Box<dyn FnOnce(&dyn Any) -> LocalBoxFuture<'static, ()>>;

pub(crate) enum Cleanup {
    Sync(NodesCallback),
    Async(AsyncNodesCallback),
}

/// State for async function components.
#[derive(Default)]
pub(crate) struct AsyncSteps {
    /// Incremented for every call of the body.
    pub(crate) step: u64,
    /// Settles when the in-flight call returns.
    pub(crate) inflight: Option<Pending>,
    /// The queued call, shared by every update that arrived meanwhile.
    pub(crate) enqueued: Option<Pending>,
}

/// State for async generator components.
#[derive(Default)]
pub(crate) struct Emits {
    /// Number of emits rendered so far.
    pub(crate) emitted: u64,
    /// Highest emit that has been committed.
    pub(crate) committed: u64,
    /// Settles when the driver task finishes.
    pub(crate) driver: Option<Shared<LocalBoxFuture<'static, ()>>>,
    pub(crate) races: RaceRecord,
}

pub(crate) struct Controller {
    pub(crate) component: Component,
    pub(crate) context: Context,
    pub(crate) props: RefCell<Props>,
    pub(crate) flags: Cell<ControllerFlags>,
    pub(crate) provisions: RefCell<BTreeMap<Str, Rc<dyn Any>>>,
    pub(crate) listeners: RefCell<Vec<Listener>>,
    pub(crate) scheduled: RefCell<Vec<NodesCallback>>,
    pub(crate) after: RefCell<Vec<NodesCallback>>,
    pub(crate) cleanups: RefCell<Vec<Cleanup>>,
    pub(crate) mailbox: Rc<Mailbox>,
    /// The suspended body of a sync generator. Taken while it is polled.
    pub(crate) body: RefCell<Option<LocalBoxFuture<'static, anyhow::Result<Child>>>>,
    pub(crate) steps: RefCell<AsyncSteps>,
    pub(crate) emits: RefCell<Emits>,
    /// Handed to refreshes that arrive while a sync step runs; settles with
    /// the step that follows them.
    pub(crate) cascade: RefCell<Option<Cascade>>,
}

pub(crate) struct Cascade {
    pub(crate) tx: oneshot::Sender<Result<Option<Pending>, Error>>,
    pub(crate) pending: Pending,
}

impl Controller {
    pub(crate) fn new(component: Component, props: Props, context: Context) -> Self {
        let mailbox = context.mailbox().clone();
        Self {
            component,
            context,
            props: RefCell::new(props),
            flags: Cell::new(ControllerFlags::empty()),
            provisions: RefCell::default(),
            listeners: RefCell::default(),
            scheduled: RefCell::default(),
            after: RefCell::default(),
            cleanups: RefCell::default(),
            mailbox,
            body: RefCell::new(None),
            steps: RefCell::default(),
            emits: RefCell::default(),
            cascade: RefCell::new(None),
        }
    }

    pub(crate) fn has(&self, flag: ControllerFlags) -> bool {
        self.flags.get().contains(flag)
    }

    pub(crate) fn set(&self, flag: ControllerFlags, value: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, value);
        self.flags.set(flags);
    }

    pub(crate) fn name(&self) -> Str {
        self.component.name_str()
    }
}

#[derive(Debug, Default)]
struct MailboxState {
    props: Option<Props>,
    closed: bool,
    waker: Option<Waker>,
    emitted: Option<Child>,
    thrown: Option<Error>,
}

/// Single-slot channel between the engine and a generator body.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    state: RefCell<MailboxState>,
}

impl Mailbox {
    /// Stores fresh props, replacing any the body has not picked up yet.
    pub(crate) fn push(&self, props: Props) {
        let waker = {
            let mut state = self.state.borrow_mut();
            state.props = Some(props);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn close(&self) {
        let waker = {
            let mut state = self.state.borrow_mut();
            state.closed = true;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn reopen(&self) {
        let mut state = self.state.borrow_mut();
        state.closed = false;
        state.emitted = None;
        state.thrown = None;
    }

    pub(crate) fn take_emitted(&self) -> Option<Child> {
        self.state.borrow_mut().emitted.take()
    }

    /// Makes the pending `emit` of the body resolve with `error`.
    pub(crate) fn throw(&self, error: Error) {
        self.state.borrow_mut().thrown = Some(error);
    }
}

/// Future returned by [`Context::next_props`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct NextProps {
    mailbox: Rc<Mailbox>,
}

impl NextProps {
    pub(crate) const fn new(mailbox: Rc<Mailbox>) -> Self {
        Self { mailbox }
    }
}

impl Future for NextProps {
    type Output = Option<Props>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let mut state = self.mailbox.state.borrow_mut();
        if let Some(props) = state.props.take() {
            return Poll::Ready(Some(props));
        }
        if state.closed {
            return Poll::Ready(None);
        }
        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

/// Future returned by [`Context::emit`].
///
/// The first poll hands the child to the engine and suspends the body. The
/// next poll resumes it with the outcome of rendering that child: `Err` when a
/// child failed synchronously, which the body may handle or propagate. Once
/// the component is unmounted, emits are dropped and resolve right away.
#[must_use = "nothing is rendered unless the emit is awaited"]
pub struct Emit {
    mailbox: Rc<Mailbox>,
    child: Option<Child>,
    handed_over: bool,
}

impl core::fmt::Debug for Emit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Emit")
            .field("handed_over", &self.handed_over)
            .finish_non_exhaustive()
    }
}

impl Emit {
    pub(crate) const fn new(mailbox: Rc<Mailbox>, child: Child) -> Self {
        Self {
            mailbox,
            child: Some(child),
            handed_over: false,
        }
    }
}

impl Future for Emit {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        if !self.handed_over {
            self.handed_over = true;
            let child = self.child.take();
            let mut state = self.mailbox.state.borrow_mut();
            if state.closed {
                return Poll::Ready(Ok(()));
            }
            state.emitted = child;
            return Poll::Pending;
        }
        let thrown = self.mailbox.state.borrow_mut().thrown.take();
        Poll::Ready(thrown.map_or(Ok(()), Err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{FutureExt, task::noop_waker_ref};

    fn poll<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
        future.poll_unpin(&mut TaskContext::from_waker(noop_waker_ref()))
    }

    #[test]
    fn next_props_takes_the_latest_update() {
        let mailbox = Rc::new(Mailbox::default());
        mailbox.push(Props::new().with("n", 1));
        mailbox.push(Props::new().with("n", 2));
        let mut next = NextProps::new(mailbox.clone());
        let Poll::Ready(Some(props)) = poll(&mut next) else {
            panic!("props should be available");
        };
        assert_eq!(props.get_int("n"), Some(2));
        assert!(poll(&mut NextProps::new(mailbox.clone())).is_pending());
        mailbox.close();
        assert!(matches!(poll(&mut NextProps::new(mailbox)), Poll::Ready(None)));
    }

    #[test]
    fn emit_suspends_once_and_reports_thrown_errors() {
        let mailbox = Rc::new(Mailbox::default());
        let mut emit = Emit::new(mailbox.clone(), Child::from("hi"));
        assert!(poll(&mut emit).is_pending());
        assert!(matches!(mailbox.take_emitted(), Some(Child::Text(_))));
        mailbox.throw(Error::Canceled);
        assert!(matches!(poll(&mut emit), Poll::Ready(Err(Error::Canceled))));
    }

    #[test]
    fn emits_after_close_are_dropped() {
        let mailbox = Rc::new(Mailbox::default());
        mailbox.close();
        let mut emit = Emit::new(mailbox.clone(), Child::from("late"));
        assert!(matches!(poll(&mut emit), Poll::Ready(Ok(()))));
        assert!(mailbox.take_emitted().is_none());
    }
}
