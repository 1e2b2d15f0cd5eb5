use ignis_core::types::RouteType;

use crate::context::{names, ConfigurationFile, SynthesisContext};
use crate::error::RenderError;

use super::FileProvider;

/// `host-<id>-route-<priority>.payload` for every enabled static-response
/// route; the body is the literal payload, empty when none is set.
pub struct HostRouteStaticResponseProvider;

impl FileProvider for HostRouteStaticResponseProvider {
    fn name(&self) -> &'static str {
        "static responses"
    }

    fn provide(&self, ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
        let files = ctx
            .hosts
            .iter()
            .flat_map(|host| {
                host.enabled_routes()
                    .into_iter()
                    .filter(|route| route.kind == RouteType::StaticResponse)
                    .map(move |route| {
                        let payload = route
                            .response
                            .as_ref()
                            .and_then(|r| r.payload.clone())
                            .unwrap_or_default();
                        ConfigurationFile::text(names::route_payload(&host.id, route.priority), payload)
                    })
            })
            .collect();
        Ok(files)
    }
}
