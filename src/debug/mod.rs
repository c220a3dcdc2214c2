//! Development helpers.

pub mod logging;

pub use logging::install;
