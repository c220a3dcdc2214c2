/// Error type produced by the document backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomError {
    /// Rendering failed.
    #[error(transparent)]
    Render(#[from] eddy_core::Error),
    /// The render future can no longer make progress.
    #[error("rendering stalled before every component settled")]
    Stalled,
}
