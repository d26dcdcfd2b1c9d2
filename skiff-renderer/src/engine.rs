//! Tera rendering engine for generated deploy artifacts.
//!
//! | Artifact    | Template                | Written to                    |
//! |-------------|-------------------------|-------------------------------|
//! | launcher    | `launch/start.js.tera`  | `<base_dir>/<project>/start.js` |

use tera::Tera;

use crate::context::LaunchContext;
use crate::error::RenderError;

// Embedded at compile time via include_str!
const TPLS: &[(&str, &str)] = &[("launch/start.js.tera", include_str!("templates/start.js.tera"))];

const LAUNCHER: &str = "launch/start.js.tera";

/// Owns a compiled [`Tera`] instance with every embedded template loaded.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TPLS.iter().copied())?;
        Ok(Self { tera })
    }

    /// Render the process-start descriptor pm2 runs for a project.
    pub fn render_launcher(&self, ctx: &LaunchContext) -> Result<String, RenderError> {
        Ok(self.tera.render(LAUNCHER, &ctx.to_tera()?)?)
    }
}
