#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::future_not_send)]

pub mod debug;
pub mod widget;

#[doc(inline)]
pub use eddy_core::{
    Child, Component, ComponentKind, Context, Element, Emit, Error, Event, Host, Key, ListenerId,
    NextProps, NodeRef, Phase, PropPatch, Props, RenderFuture, Renderer, RendererBuilder,
    SVG_NAMESPACE, Spawn, Str, Tag, Value, arrange, element, event, host, props,
};
#[cfg(feature = "dom")]
#[doc(inline)]
pub use eddy_dom as dom;

pub mod prelude {
    //! Commonly used types and constructors.
    //!
    //! ```
    //! use eddy::prelude::*;
    //!
    //! let hello = Component::function("Hello", |_, _| Ok(element("b").child("hi")));
    //! assert_eq!(render_to_string(hello.element()).unwrap(), "<b>hi</b>");
    //! ```
    pub use eddy_core::element::{copy, element, fragment, portal, raw_markup, raw_node, text};
    pub use eddy_core::{
        Child, Component, Context, Element, Error, Event, Phase, Props, Renderer, Value,
    };
    #[cfg(feature = "dom")]
    pub use eddy_dom::{DomApp, render_to_string};

    pub use crate::widget::{Suspense, suspense};
}
