use ignis_core::types::{CodeLanguage, RouteType};

use crate::context::{names, ConfigurationFile, SynthesisContext};
use crate::error::RenderError;

use super::FileProvider;

/// `host-<id>-route-<priority>.js` for every enabled JavaScript
/// code-execution route. Lua code is inlined into the host file instead.
pub struct HostRouteSourceCodeProvider;

impl FileProvider for HostRouteSourceCodeProvider {
    fn name(&self) -> &'static str {
        "route source code"
    }

    fn provide(&self, ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
        let mut files = Vec::new();
        for host in &ctx.hosts {
            for route in host.enabled_routes() {
                if route.kind != RouteType::ExecuteCode {
                    continue;
                }
                let Some(code) = &route.source_code else {
                    continue;
                };
                if code.language != CodeLanguage::Javascript {
                    continue;
                }
                if !ctx.features.run_code_type.is_supported() {
                    return Err(RenderError::Unsupported {
                        feature: "code execution",
                        subject: format!("route {} of host {}", route.priority, host.id),
                    });
                }
                files.push(ConfigurationFile::text(
                    names::route_source(&host.id, route.priority),
                    code.code.clone(),
                ));
            }
        }
        Ok(files)
    }
}
