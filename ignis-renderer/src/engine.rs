//! Tera rendering engine for the generated nginx files.
//!
//! | Template           | Output file(s)              |
//! |--------------------|-----------------------------|
//! | `nginx.conf`       | `nginx.conf`                |
//! | `host.conf`        | `host-<id>.conf`            |
//! | `stream.conf`      | `stream-<id>.conf`          |
//! | `access-list.conf` | `access-list-<id>.conf`     |
//!
//! Template names deliberately avoid `.html`/`.xml` suffixes so Tera never
//! autoescapes directive text.

use serde::Serialize;
use tera::Tera;

use crate::error::RenderError;

pub const MAIN_TEMPLATE: &str = "nginx.conf";
pub const HOST_TEMPLATE: &str = "host.conf";
pub const STREAM_TEMPLATE: &str = "stream.conf";
pub const ACCESS_LIST_TEMPLATE: &str = "access-list.conf";

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    (MAIN_TEMPLATE, include_str!("templates/nginx.conf.tera")),
    (HOST_TEMPLATE, include_str!("templates/host.conf.tera")),
    (STREAM_TEMPLATE, include_str!("templates/stream.conf.tera")),
    (
        ACCESS_LIST_TEMPLATE,
        include_str!("templates/access-list.conf.tera"),
    ),
];

/// Tera-based engine holding every embedded template.
///
/// Build once per synthesis pass (or once per process) and share by
/// reference; rendering takes `&self`.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new() -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(TPLS.iter().copied())?;
        Ok(TemplateEngine { tera })
    }

    /// Render `template` with any serializable context.
    pub fn render<C: Serialize>(&self, template: &str, ctx: &C) -> Result<String, RenderError> {
        let tera_ctx = tera::Context::from_serialize(ctx)?;
        let rendered = self.tera.render(template, &tera_ctx)?;
        Ok(rendered)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
