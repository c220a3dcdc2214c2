use std::cell::Ref;

use eddy_core::{Child, Host, Props, RenderFuture, Renderer};
use futures::executor::LocalPool;

use crate::{
    document::{Document, NodeId},
    error::DomError,
};

/// Builder for [`DomApp`].
#[derive(Debug, Clone)]
pub struct DomAppBuilder {
    root_tag: String,
    root_id: Option<String>,
    record_mutations: bool,
}

impl Default for DomAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DomAppBuilder {
    /// Creates a builder rendering into a `div`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root_tag: "div".to_owned(),
            root_id: None,
            record_mutations: false,
        }
    }

    /// Sets the tag of the root container.
    #[must_use]
    pub fn with_root_tag(mut self, tag: impl Into<String>) -> Self {
        self.root_tag = tag.into();
        self
    }

    /// Gives the root container an `id` attribute.
    #[must_use]
    pub fn with_root_id(mut self, id: impl Into<String>) -> Self {
        self.root_id = Some(id.into());
        self
    }

    /// Logs every change made to the document, see [`Document::take_mutations`].
    ///
    /// The log grows until it is drained, so leave this off for long-lived apps.
    #[must_use]
    pub const fn record_mutations(mut self, record: bool) -> Self {
        self.record_mutations = record;
        self
    }

    /// Finalises the builder and creates a [`DomApp`].
    #[must_use]
    pub fn build(self) -> DomApp {
        let pool = LocalPool::new();
        let mut document = Document::new();
        let root = document.create_container(&self.root_tag);
        if let Some(id) = self.root_id {
            let props = Props::new().with("id", id);
            document.patch(&root, &self.root_tag, &props.diff(None));
        }
        document.set_recording(self.record_mutations);
        let renderer = Renderer::new(document, pool.spawner());
        tracing::debug!(tag = %self.root_tag, ?root, "document app created");
        DomApp {
            pool,
            renderer,
            root,
        }
    }
}

/// A document, a renderer and the executor driving its async components.
///
/// Nodes dropped by a render are released and their slots reused, so the
/// document stays as large as what is mounted, plus nodes kept around by
/// pending async cleanups. Mutation logging is off unless enabled with
/// [`DomAppBuilder::record_mutations`].
#[derive(Debug)]
pub struct DomApp {
    pool: LocalPool,
    renderer: Renderer<Document>,
    root: NodeId,
}

impl Default for DomApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DomApp {
    /// Creates an app with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        DomAppBuilder::new().build()
    }

    /// Starts configuring an app.
    #[must_use]
    pub fn builder() -> DomAppBuilder {
        DomAppBuilder::new()
    }

    /// Renders `child` into the root container.
    ///
    /// Async components only make progress while the executor runs, see
    /// [`DomApp::run_until_stalled`] and [`DomApp::block_on`].
    pub fn render(&self, child: impl Into<Child>) -> RenderFuture {
        self.renderer.render(child, &self.root)
    }

    /// Removes everything from the root container.
    pub fn unmount(&self) -> RenderFuture {
        self.renderer.unmount(&self.root)
    }

    /// Runs spawned work until nothing can make progress without outside help.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Runs spawned work until it stalls, then reports how `render` ended.
    ///
    /// # Errors
    ///
    /// Returns [`DomError::Stalled`] if `render` is still waiting on something
    /// outside the executor, or the render error.
    pub fn settle(&mut self, render: &RenderFuture) -> Result<(), DomError> {
        self.pool.run_until_stalled();
        render.peek().ok_or(DomError::Stalled)??;
        Ok(())
    }

    /// Blocks the thread until `render` settles, then drains remaining work.
    ///
    /// # Errors
    ///
    /// Returns the render error.
    pub fn block_on(&mut self, render: RenderFuture) -> Result<(), DomError> {
        let result = self.pool.run_until(render);
        self.pool.run_until_stalled();
        result.map_err(DomError::from)
    }

    /// The root container.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Serialises the contents of the root container.
    #[must_use]
    pub fn html(&self) -> String {
        self.renderer.host().inner_html(self.root)
    }

    /// Borrows the document.
    #[must_use]
    pub fn document(&self) -> Ref<'_, Document> {
        self.renderer.host()
    }

    /// The underlying renderer, for rendering into other containers.
    #[must_use]
    pub const fn renderer(&self) -> &Renderer<Document> {
        &self.renderer
    }
}

/// Renders `child` to an HTML string, waiting for async components.
///
/// # Errors
///
/// Returns the first component failure.
pub fn render_to_string(child: impl Into<Child>) -> Result<String, DomError> {
    let mut app = DomApp::new();
    let render = app.render(child);
    app.block_on(render)?;
    let html = app.html();
    app.unmount();
    app.run_until_stalled();
    Ok(html)
}
