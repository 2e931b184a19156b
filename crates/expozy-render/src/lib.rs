//! # Expozy Render
//!
//! Sanitizer and HTML renderer for validated template packages.
//! Both halves are pure functions: no database,
//! no queue, no filesystem, no configuration. The Worker is the only
//! caller — it hands this crate an already-[`expozy_validator::validate`]d
//! template and writes the returned string to `index.html` itself.

pub mod renderer;
pub mod sanitizer;
pub mod sections;

pub use renderer::render_page;
