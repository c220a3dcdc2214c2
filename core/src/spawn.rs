//! Executor plumbing.
//!
//! Every asynchronous continuation the engine creates is spawned right away,
//! so work proceeds whether or not anybody polls the [`RenderFuture`] handed
//! back to the caller. Dropping that future never cancels a render.

use alloc::rc::Rc;
use core::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{
    FutureExt,
    future::{LocalBoxFuture, Shared},
    task::{LocalFutureObj, LocalSpawn},
};

use crate::error::Error;

/// A shared handle to work that is already running.
pub type Pending = Shared<LocalBoxFuture<'static, Result<(), Error>>>;

/// Something that can run `!Send` futures to completion on the current thread.
pub trait Spawn {
    /// Starts running `future` in the background.
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>);
}

impl Spawn for futures::executor::LocalSpawner {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        if let Err(error) = self.spawn_local_obj(LocalFutureObj::from(future)) {
            tracing::error!(%error, "local executor rejected a render task");
        }
    }
}

impl Spawn for smol::LocalExecutor<'static> {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        self.spawn(future).detach();
    }
}

impl<S: Spawn + ?Sized> Spawn for Rc<S> {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) {
        (**self).spawn_local(future);
    }
}

/// Turns `future` into a shared handle and starts driving it immediately.
pub(crate) fn eager<T: Clone + 'static>(
    spawner: &dyn Spawn,
    future: impl Future<Output = T> + 'static,
) -> Shared<LocalBoxFuture<'static, T>> {
    let shared = future.boxed_local().shared();
    spawner.spawn_local(shared.clone().map(drop).boxed_local());
    shared
}

enum State {
    Ready(Option<Result<(), Error>>),
    Pending(Pending),
}

/// Resolves once a render has been committed to the host.
///
/// Synchronous renders come back already settled; check with
/// [`RenderFuture::is_settled`] to avoid polling.
pub struct RenderFuture {
    state: State,
}

impl fmt::Debug for RenderFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderFuture")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl RenderFuture {
    pub(crate) const fn ready(result: Result<(), Error>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }

    pub(crate) const fn pending(pending: Pending) -> Self {
        Self {
            state: State::Pending(pending),
        }
    }

    pub(crate) fn from_step(step: Result<Option<Pending>, Error>) -> Self {
        match step {
            Ok(None) => Self::ready(Ok(())),
            Ok(Some(pending)) => Self::pending(pending),
            Err(error) => Self::ready(Err(error)),
        }
    }

    /// Returns `true` when the render has already finished.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        match &self.state {
            State::Ready(_) => true,
            State::Pending(pending) => pending.peek().is_some(),
        }
    }

    /// Returns the result of a finished render without polling.
    #[must_use]
    pub fn peek(&self) -> Option<Result<(), Error>> {
        match &self.state {
            State::Ready(result) => result.clone(),
            State::Pending(pending) => pending.peek().cloned(),
        }
    }
}

impl Future for RenderFuture {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            State::Ready(result) => Poll::Ready(result.take().unwrap_or(Ok(()))),
            State::Pending(pending) => pending.poll_unpin(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{channel::oneshot, executor::LocalPool};

    #[test]
    fn eager_work_runs_without_being_polled() {
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = eager(&spawner, async move {
            let _ = rx.await;
            Ok::<(), Error>(())
        });
        let render = RenderFuture::pending(handle);
        assert!(!render.is_settled());
        tx.send(()).unwrap();
        pool.run_until_stalled();
        assert!(render.is_settled());
        assert!(matches!(render.peek(), Some(Ok(()))));
    }

    #[test]
    fn ready_futures_resolve_immediately() {
        let render = RenderFuture::ready(Err(Error::Canceled));
        assert!(render.is_settled());
        let result = futures::executor::block_on(render);
        assert!(matches!(result, Err(Error::Canceled)));
    }
}
