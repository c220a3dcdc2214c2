use alloc::sync::Arc;

use crate::props::Str;

/// Errors produced while rendering.
///
/// The type is cheap to clone so a single failure can be handed to every
/// caller waiting on a shared render.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A component body returned an error.
    #[error("component `{name}` failed: {error:#}")]
    Component {
        /// Name of the failing component.
        name: Str,
        /// The error returned by the component body.
        error: Arc<anyhow::Error>,
    },
    /// A synchronous generator awaited something other than its props or an emit.
    #[error("generator component `{name}` suspended outside of `next_props` or `emit`")]
    GeneratorSuspended {
        /// Name of the offending component.
        name: Str,
    },
    /// The element tree is malformed.
    #[error("invalid element: {0}")]
    InvalidElement(Str),
    /// The renderer owning the component has been dropped.
    #[error("the renderer has been dropped")]
    Unmounted,
    /// A render was abandoned before it settled.
    #[error("render was canceled before it settled")]
    Canceled,
    /// The renderer was built without a spawner.
    #[error("no spawner configured for the renderer")]
    SpawnerUnavailable,
}

impl Error {
    /// Wraps a component failure.
    ///
    /// Errors that are already an [`Error`] (for example a child failure a
    /// generator rethrew from `emit`) are passed through unchanged.
    pub fn component(name: impl Into<Str>, error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => error,
            Err(error) => Self::Component {
                name: name.into(),
                error: Arc::new(error),
            },
        }
    }

    /// Creates an [`Error::InvalidElement`].
    pub fn invalid(message: impl Into<Str>) -> Self {
        Self::InvalidElement(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rethrown_errors_are_not_wrapped_twice() {
        let inner = Error::invalid("text elements cannot have children");
        let rethrown = Error::component("Outer", anyhow::Error::new(inner));
        assert!(matches!(rethrown, Error::InvalidElement(_)));
    }

    #[test]
    fn component_errors_show_the_whole_chain() {
        let error = Error::component(
            "Profile",
            anyhow::anyhow!("connection reset").context("loading profile"),
        );
        assert_eq!(
            error.to_string(),
            "component `Profile` failed: loading profile: connection reset"
        );
    }
}
