//! In-memory document backend for `eddy`.
//!
//! [`Document`] implements [`eddy_core::Host`] over an arena of element, text
//! and raw nodes, and serialises to HTML. [`DomApp`] pairs a document with a
//! renderer and a local executor; [`render_to_string`] is the one-shot form.
//!
//! ```
//! use eddy_core::element::element;
//!
//! let html = eddy_dom::render_to_string(element("p").child("Hello & welcome")).unwrap();
//! assert_eq!(html, "<p>Hello &amp; welcome</p>");
//! ```
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::future_not_send)]

mod app;
mod document;
mod error;
pub mod html;

#[cfg(test)]
mod tests;

pub use app::{DomApp, DomAppBuilder, render_to_string};
pub use document::{Document, Mutation, NodeId, NodeKind};
pub use error::DomError;
