//! Component definitions.
//!
//! A [`Component`] is a named body plus an execution strategy. The strategy
//! is fixed when the component is defined:
//!
//! | Constructor | Body | Runs |
//! |---|---|---|
//! | [`Component::function`] | `Fn(&Props, &Context) -> Result<Child>` | once per render |
//! | [`Component::async_function`] | `Fn(Props, Context) -> Future<Result<Child>>` | at most one call in flight, one queued |
//! | [`Component::generator`] | `Fn(Context) -> Future<Result<Child>>` | resumed synchronously per render |
//! | [`Component::async_generator`] | `Fn(Context) -> Future<Result<Child>>` | continuously, on the executor |
//!
//! Generator bodies loop over [`Context::next_props`] and hand each render to
//! [`Context::emit`]:
//!
//! ```
//! use eddy_core::{Component, element::element};
//!
//! let counter = Component::generator("Counter", |ctx| async move {
//!     let mut count = 0;
//!     while let Some(props) = ctx.next_props().await {
//!         count += 1;
//!         let label = props.get_str("label").unwrap_or("count").to_owned();
//!         ctx.emit(element("p").child(format!("{label}: {count}"))).await?;
//!     }
//!     Ok(())
//! });
//! assert_eq!(counter.name(), "Counter");
//! ```

use alloc::rc::Rc;
use core::fmt;

use futures::{FutureExt, future::LocalBoxFuture};

use crate::{
    context::Context,
    element::{Child, Element},
    props::{Props, Str},
};

/// Execution strategy of a component.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ComponentKind {
    /// Called once per render.
    Function,
    /// Called once per render, result awaited.
    AsyncFunction,
    /// A coroutine resumed synchronously on every render.
    Generator,
    /// A coroutine running on the executor.
    AsyncGenerator,
}

impl ComponentKind {
    /// Returns `true` for kinds that may render asynchronously.
    #[must_use]
    pub const fn is_async(self) -> bool {
        matches!(self, Self::AsyncFunction | Self::AsyncGenerator)
    }
}

pub(crate) type FunctionBody = Rc<dyn Fn(&Props, &Context) -> anyhow::Result<Child>>;
pub(crate) type AsyncFunctionBody =
    Rc<dyn Fn(Props, Context) -> LocalBoxFuture<'static, anyhow::Result<Child>>>;
pub(crate) type GeneratorBody = Rc<dyn Fn(Context) -> LocalBoxFuture<'static, anyhow::Result<Child>>>;

#[derive(Clone)]
pub(crate) enum Body {
    Function(FunctionBody),
    AsyncFunction(AsyncFunctionBody),
    Generator(GeneratorBody),
    AsyncGenerator(GeneratorBody),
}

struct Definition {
    name: Str,
    body: Body,
}

/// A reusable component definition.
///
/// Two elements refer to the same component when their definitions are the
/// same allocation, so define a component once and clone the handle.
#[derive(Clone)]
pub struct Component(Rc<Definition>);

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.0.name)
            .field("kind", &self.kind())
            .finish()
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Component {}

impl Component {
    fn from_body(name: impl Into<Str>, body: Body) -> Self {
        Self(Rc::new(Definition {
            name: name.into(),
            body,
        }))
    }

    /// Defines a function component.
    pub fn function<F, C>(name: impl Into<Str>, body: F) -> Self
    where
        F: Fn(&Props, &Context) -> anyhow::Result<C> + 'static,
        C: Into<Child>,
    {
        Self::from_body(
            name,
            Body::Function(Rc::new(move |props: &Props, ctx: &Context| {
                body(props, ctx).map(Into::into)
            })),
        )
    }

    /// Defines an async function component.
    pub fn async_function<F, Fut, C>(name: impl Into<Str>, body: F) -> Self
    where
        F: Fn(Props, Context) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<C>> + 'static,
        C: Into<Child>,
    {
        Self::from_body(
            name,
            Body::AsyncFunction(Rc::new(move |props: Props, ctx: Context| {
                body(props, ctx).map(|result| result.map(Into::into)).boxed_local()
            })),
        )
    }

    /// Defines a generator component.
    ///
    /// The body must only await [`Context::next_props`] and [`Context::emit`];
    /// awaiting anything else fails the render with
    /// [`Error::GeneratorSuspended`](crate::Error::GeneratorSuspended).
    pub fn generator<F, Fut, C>(name: impl Into<Str>, body: F) -> Self
    where
        F: Fn(Context) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<C>> + 'static,
        C: Into<Child>,
    {
        Self::from_body(name, Body::Generator(generator_body(body)))
    }

    /// Defines an async generator component.
    pub fn async_generator<F, Fut, C>(name: impl Into<Str>, body: F) -> Self
    where
        F: Fn(Context) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<C>> + 'static,
        C: Into<Child>,
    {
        Self::from_body(name, Body::AsyncGenerator(generator_body(body)))
    }

    /// The component's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub(crate) fn name_str(&self) -> Str {
        self.0.name.clone()
    }

    /// The component's execution strategy.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        match self.0.body {
            Body::Function(_) => ComponentKind::Function,
            Body::AsyncFunction(_) => ComponentKind::AsyncFunction,
            Body::Generator(_) => ComponentKind::Generator,
            Body::AsyncGenerator(_) => ComponentKind::AsyncGenerator,
        }
    }

    pub(crate) fn body(&self) -> &Body {
        &self.0.body
    }

    /// Creates an element rendering this component.
    #[must_use]
    pub fn element(&self) -> Element {
        Element::new(self)
    }
}

fn generator_body<F, Fut, C>(body: F) -> GeneratorBody
where
    F: Fn(Context) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<C>> + 'static,
    C: Into<Child>,
{
    Rc::new(move |ctx: Context| body(ctx).map(|result| result.map(Into::into)).boxed_local())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_per_definition() {
        let a = Component::function("Same", |_, _| Ok(()));
        let b = Component::function("Same", |_, _| Ok(()));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn kinds_follow_the_constructor() {
        let function = Component::function("F", |_, _| Ok(()));
        let async_function = Component::async_function("A", |_, _| async { Ok(()) });
        let generator = Component::async_generator("G", |_| async { Ok(()) });
        assert_eq!(function.kind(), ComponentKind::Function);
        assert_eq!(async_function.kind(), ComponentKind::AsyncFunction);
        assert!(generator.kind().is_async());
        assert!(!function.kind().is_async());
    }
}
