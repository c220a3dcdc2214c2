//! Reusable components built on the core primitives.

pub mod suspense;

pub use suspense::{Suspense, suspense};
