//! # skiff-renderer
//!
//! Tera-based rendering of the files Skiff generates into a project checkout,
//! currently the `start.js` launcher that pm2 supervises.
//!
//! ```rust,no_run
//! use skiff_renderer::{LaunchContext, Renderer};
//!
//! fn launcher(ctx: &LaunchContext) -> Option<String> {
//!     Renderer::new().ok()?.render_launcher(ctx).ok()
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::LaunchContext;
pub use engine::Renderer;
pub use error::RenderError;
