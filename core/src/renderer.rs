use alloc::rc::Rc;
use core::{
    cell::{Ref, RefMut},
    fmt,
};

use crate::{
    element::Child,
    engine::Engine,
    error::Error,
    host::Host,
    spawn::{RenderFuture, Spawn},
};

/// Renders element trees into a [`Host`].
///
/// A renderer may manage any number of roots; each root is a host node the
/// renderer owns the children of.
pub struct Renderer<H: Host> {
    engine: Rc<Engine<H>>,
}

impl<H: Host> fmt::Debug for Renderer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("retained", &self.engine.retained())
            .finish_non_exhaustive()
    }
}

impl<H: Host> Renderer<H> {
    /// Creates a renderer that spawns its async work on `spawner`.
    pub fn new(host: H, spawner: impl Spawn + 'static) -> Self {
        Self {
            engine: Engine::new(host, Rc::new(spawner)),
        }
    }

    /// Starts configuring a renderer.
    pub fn builder(host: H) -> RendererBuilder<H> {
        RendererBuilder::new(host)
    }

    /// Renders `child` into `root`, replacing whatever was rendered there.
    ///
    /// Synchronous trees are committed before this returns. The returned
    /// future resolves once the whole tree, async components included, has
    /// been committed, and carries the first component failure.
    pub fn render(&self, child: impl Into<Child>, root: &H::Node) -> RenderFuture {
        self.engine.render(child.into(), root)
    }

    /// Removes everything rendered into `root`. Running it twice is harmless.
    pub fn unmount(&self, root: &H::Node) -> RenderFuture {
        self.engine.render(Child::Empty, root)
    }

    /// Whether something is rendered into `root`.
    #[must_use]
    pub fn is_mounted(&self, root: &H::Node) -> bool {
        self.engine.is_root_mounted(root)
    }

    /// Borrows the host.
    ///
    /// # Panics
    ///
    /// Panics when called from component code while the host is being mutated.
    #[must_use]
    pub fn host(&self) -> Ref<'_, H> {
        self.engine.host()
    }

    /// Mutably borrows the host.
    ///
    /// # Panics
    ///
    /// Panics when called from component code during a render.
    #[must_use]
    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.engine.host_mut()
    }

    /// Number of rendered nodes the renderer keeps track of.
    #[must_use]
    pub fn retained(&self) -> usize {
        self.engine.retained()
    }
}

/// Builder for [`Renderer`] instances.
pub struct RendererBuilder<H: Host> {
    host: H,
    spawner: Option<Rc<dyn Spawn>>,
}

impl<H: Host> fmt::Debug for RendererBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererBuilder")
            .field("spawner", &self.spawner.is_some())
            .finish_non_exhaustive()
    }
}

impl<H: Host> RendererBuilder<H> {
    /// Creates a builder around `host`.
    #[must_use]
    pub const fn new(host: H) -> Self {
        Self {
            host,
            spawner: None,
        }
    }

    /// Sets the executor async components run on.
    #[must_use]
    pub fn spawner(mut self, spawner: impl Spawn + 'static) -> Self {
        self.spawner = Some(Rc::new(spawner));
        self
    }

    /// Consumes the builder and produces a [`Renderer`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::SpawnerUnavailable`] if no spawner was configured.
    pub fn build(self) -> Result<Renderer<H>, Error> {
        let spawner = self.spawner.ok_or(Error::SpawnerUnavailable)?;
        Ok(Renderer {
            engine: Engine::new(self.host, spawner),
        })
    }
}
