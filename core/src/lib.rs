//! # eddy-core
//!
//! The reconciler behind `eddy`: an element model, four kinds of components
//! and an engine that keeps a host tree in sync with the elements you render.
//!
//! ```
//! use eddy_core::{Component, element::element};
//!
//! let greeting = Component::function("Greeting", |props, _ctx| {
//!     let name = props.get_str("name").unwrap_or("world").to_owned();
//!     Ok(element("p").child(format!("Hello, {name}!")))
//! });
//! let page = element("main").child(greeting.element().prop("name", "eddy"));
//! assert_eq!(page.props().children().len(), 1);
//! ```
//!
//! The engine does not know about any concrete render target. Implement
//! [`Host`] for your target, or use the in-memory document from `eddy-dom`.
#![allow(clippy::future_not_send)]
#![allow(clippy::multiple_crate_versions)]

extern crate alloc;

mod arena;
pub mod arrange;
pub mod component;
mod context;
mod controller;
pub mod element;
mod engine;
mod error;
pub mod event;
pub mod host;
pub mod props;
mod race;
mod renderer;
mod spawn;


pub use arena::NodeId;
pub use component::{Component, ComponentKind};
pub use context::Context;
pub use controller::{Emit, NextProps};
pub use element::{Child, Element, Key, NodeRef, Tag};
pub use error::Error;
pub use event::{Event, ListenerId, Phase};
pub use host::{Host, SVG_NAMESPACE};
pub use props::{PropPatch, Props, Str, Value};
pub use renderer::{Renderer, RendererBuilder};
pub use spawn::{Pending, RenderFuture, Spawn};
