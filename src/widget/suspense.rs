//! Shows a fallback while slow children are loading.
//!
//! [`Suspense`] renders its children straight away. If they have not settled
//! once the timeout elapses, the fallback is shown until they do.
//!
//! ```
//! use std::time::Duration;
//! use eddy::{prelude::*, widget::Suspense};
//!
//! let page = Suspense::new(element("article").child("ready"))
//!     .fallback("loading")
//!     .timeout(Duration::from_millis(200));
//! assert_eq!(render_to_string(page).unwrap(), "<article>ready</article>");
//! ```

use core::time::Duration;

use eddy_core::{Child, Component, Context, Element, Props, Value};

/// How long children may take before the fallback appears.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);

thread_local! {
    static SUSPENSE: Component = Component::async_generator("Suspense", run_suspense);
    static FALLBACK: Component = Component::async_function("Fallback", run_fallback);
}

/// Declarative suspense boundary.
#[derive(Debug, Clone)]
pub struct Suspense {
    children: Child,
    fallback: Child,
    timeout: Duration,
}

impl Suspense {
    /// Wraps `children`, showing nothing while they load.
    pub fn new(children: impl Into<Child>) -> Self {
        Self {
            children: children.into(),
            fallback: Child::Empty,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets what to show while the children are loading.
    #[must_use]
    pub fn fallback(mut self, fallback: impl Into<Child>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Sets how long to wait before showing the fallback.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the element.
    #[must_use]
    pub fn into_element(self) -> Element {
        let timeout = i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX);
        SUSPENSE
            .with(Component::element)
            .prop("timeout", timeout)
            .prop("fallback", Value::shared(self.fallback))
            .child(self.children)
    }
}

impl From<Suspense> for Element {
    fn from(value: Suspense) -> Self {
        value.into_element()
    }
}

impl From<Suspense> for Child {
    fn from(value: Suspense) -> Self {
        Self::Element(value.into_element())
    }
}

/// Convenience function to create a [`Suspense`].
pub fn suspense(children: impl Into<Child>) -> Suspense {
    Suspense::new(children)
}

fn timeout_of(props: &Props) -> Duration {
    props
        .get_int("timeout")
        .and_then(|millis| u64::try_from(millis).ok())
        .map_or(DEFAULT_TIMEOUT, Duration::from_millis)
}

async fn run_suspense(ctx: Context) -> anyhow::Result<Child> {
    while let Some(props) = ctx.next_props().await {
        let fallback = props
            .get_shared::<Child>("fallback")
            .cloned()
            .unwrap_or_default();
        let delayed = FALLBACK
            .with(Component::element)
            .prop("timeout", props.get("timeout").cloned().unwrap_or_default())
            .child(fallback);
        ctx.emit(delayed).await?;
        ctx.emit(Child::List(props.children().to_vec())).await?;
    }
    Ok(Child::Empty)
}

/// Renders its children after the timeout.
async fn run_fallback(props: Props, _ctx: Context) -> anyhow::Result<Child> {
    smol::Timer::after(timeout_of(&props)).await;
    Ok(Child::List(props.children().to_vec()))
}
