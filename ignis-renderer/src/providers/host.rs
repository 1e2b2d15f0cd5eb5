//! `host-<id>.conf`: one `server {}` block per effective binding of every
//! enabled host, each carrying the host's routes as `location` blocks.

use serde::Serialize;

use ignis_core::types::{
    Binding, BindingType, CodeLanguage, Host, Route, RouteType, SourceCode, StaticResponse,
};

use crate::context::{names, ConfigurationFile, SynthesisContext};
use crate::engine::HOST_TEMPLATE;
use crate::error::RenderError;

use super::cache::{cache_directives, on_off};
use super::FileProvider;

/// Reserved status the public location of a static-response route returns
/// so `error_page` can hand the request to the internal payload location.
pub const STATIC_RESPONSE_SENTINEL: u16 = 599;
const DEFAULT_REDIRECT_CODE: u16 = 302;
const DEFAULT_JS_FUNCTION: &str = "handler";

pub struct HostConfigurationProvider;

// ---------------------------------------------------------------------------
// Template payload
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HostTemplate<'a> {
    host_id: &'a str,
    servers: Vec<ServerTemplate<'a>>,
}

#[derive(Serialize)]
struct ServerTemplate<'a> {
    access_log: String,
    error_log: String,
    gzip: &'static str,
    max_body_size: String,
    access_list: Option<String>,
    cache: &'a [String],
    redirect_to_https: bool,
    http2: bool,
    listen: String,
    certificate: Option<String>,
    server_name: String,
    stats: &'a [String],
    locations: &'a [LocationTemplate],
}

#[derive(Serialize)]
struct LocationTemplate {
    target: String,
    lines: Vec<String>,
}

impl FileProvider for HostConfigurationProvider {
    fn name(&self) -> &'static str {
        "host configuration"
    }

    fn provide(&self, ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
        ctx.hosts.iter().map(|host| render_host(ctx, host)).collect()
    }
}

fn render_host(ctx: &SynthesisContext<'_>, host: &Host) -> Result<ConfigurationFile, RenderError> {
    let nginx = &ctx.settings.nginx;

    let access_list = match &host.access_list_id {
        Some(id) => Some(ctx.config_path(&names::access_list_conf(&ctx.access_list(id)?.id))),
        None => None,
    };
    let cache = match &host.cache_id {
        Some(id) => cache_directives(ctx.cache(id)?),
        None => Vec::new(),
    };
    let stats = stats_lines(ctx, host)?;

    let mut locations = Vec::new();
    for route in host.enabled_routes() {
        locations.extend(route_locations(ctx, host, route)?);
    }

    let access_log = if nginx.logs.access_logs_enabled {
        ctx.paths
            .log_file(&names::host_access_log(&host.id))
            .display()
            .to_string()
    } else {
        "off".to_string()
    };
    let error_log = if nginx.logs.error_logs_enabled {
        format!(
            "{} {}",
            ctx.paths.log_file(&names::host_error_log(&host.id)).display(),
            nginx.logs.error_logs_level
        )
    } else {
        "/dev/null crit".to_string()
    };
    let server_name = if host.default_server || host.domain_names.is_empty() {
        "_".to_string()
    } else {
        host.domain_names.join(" ")
    };

    let mut servers = Vec::new();
    for binding in host.effective_bindings(&ctx.settings.global_bindings) {
        let certificate = match binding.kind {
            BindingType::Https => {
                let id = binding
                    .certificate_id
                    .as_ref()
                    .ok_or_else(|| RenderError::MissingField {
                        subject: format!(
                            "HTTPS binding {} of host {}",
                            listen_address(binding),
                            host.id
                        ),
                        field: "certificate_id",
                    })?;
                Some(ctx.config_path(&names::certificate(id)))
            }
            BindingType::Http => None,
        };
        servers.push(ServerTemplate {
            access_log: access_log.clone(),
            error_log: error_log.clone(),
            gzip: on_off(nginx.gzip),
            max_body_size: format!("{}m", nginx.maximum_body_size_mb),
            access_list: access_list.clone(),
            cache: &cache,
            redirect_to_https: binding.kind == BindingType::Http
                && host.feature_set.redirect_http_to_https,
            http2: host.feature_set.http2_support,
            listen: listen_line(binding, host.default_server),
            certificate,
            server_name: server_name.clone(),
            stats: &stats,
            locations: &locations,
        });
    }

    let body = ctx.templates.render(
        HOST_TEMPLATE,
        &HostTemplate {
            host_id: &host.id.0,
            servers,
        },
    )?;
    Ok(ConfigurationFile::text(names::host(&host.id), body))
}

fn listen_address(binding: &Binding) -> String {
    if binding.ip.contains(':') && !binding.ip.starts_with('[') {
        format!("[{}]:{}", binding.ip, binding.port)
    } else {
        format!("{}:{}", binding.ip, binding.port)
    }
}

fn listen_line(binding: &Binding, default_server: bool) -> String {
    let mut line = listen_address(binding);
    if binding.kind == BindingType::Https {
        line.push_str(" ssl");
    }
    if default_server {
        line.push_str(" default_server");
    }
    line
}

fn stats_lines(ctx: &SynthesisContext<'_>, host: &Host) -> Result<Vec<String>, RenderError> {
    if !ctx.settings.stats.enabled {
        return Ok(Vec::new());
    }
    if !ctx.stats_enabled_for(host) {
        return Ok(vec!["vhost_traffic_status off;".to_string()]);
    }
    if !ctx.features.stats_type.is_supported() {
        return Err(RenderError::Unsupported {
            feature: "traffic statistics",
            subject: format!("host {}", host.id),
        });
    }
    Ok(vec![
        "vhost_traffic_status on;".to_string(),
        format!("vhost_traffic_status_filter_by_set_key {} host::*;", host.id),
    ])
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

fn route_subject(host: &Host, route: &Route) -> String {
    format!("{} route {} of host {}", route.kind, route.priority, host.id)
}

fn route_locations(
    ctx: &SynthesisContext<'_>,
    host: &Host,
    route: &Route,
) -> Result<Vec<LocationTemplate>, RenderError> {
    let missing = |field: &'static str| RenderError::MissingField {
        subject: route_subject(host, route),
        field,
    };

    // Location-level proxy_set_header lines stop nginx inheriting the
    // host access list's Authorization clearing, so repeat it here.
    let clear_authorization = match (&route.access_list_id, &host.access_list_id) {
        (None, Some(id)) => !ctx.access_list(id)?.forward_authentication_header,
        _ => false,
    };

    let mut extra = Vec::new();
    let mut lines = match route.kind {
        RouteType::Proxy => {
            let target = route.target_uri.as_deref().ok_or_else(|| missing("target_uri"))?;
            proxy_lines(host, route, target, clear_authorization)
        }
        RouteType::Redirect => {
            let target = route.target_uri.as_deref().ok_or_else(|| missing("target_uri"))?;
            let code = route.redirect_code.unwrap_or(DEFAULT_REDIRECT_CODE);
            vec![format!("return {code} {target};")]
        }
        RouteType::StaticResponse => {
            let response = route.response.as_ref().ok_or_else(|| missing("response"))?;
            extra.push(static_payload_location(ctx, host, route, response));
            vec![
                format!(
                    "error_page {STATIC_RESPONSE_SENTINEL} ={} @route_{};",
                    response.status_code, route.priority
                ),
                format!("return {STATIC_RESPONSE_SENTINEL};"),
            ]
        }
        RouteType::Integration => {
            let integration = route.integration.as_ref().ok_or_else(|| missing("integration"))?;
            let resolved = ctx
                .integrations
                .option_url(&integration.integration_id, &integration.option_id)?;
            let url = resolved.url.ok_or_else(|| missing("resolvable integration URL"))?;
            let mut lines = Vec::new();
            if !resolved.dns_resolvers.is_empty() {
                lines.push(format!("resolver {};", resolved.dns_resolvers.join(" ")));
            }
            lines.extend(proxy_lines(host, route, &url, clear_authorization));
            lines
        }
        RouteType::ExecuteCode => {
            if !ctx.features.run_code_type.is_supported() {
                return Err(RenderError::Unsupported {
                    feature: "code execution",
                    subject: route_subject(host, route),
                });
            }
            let code = route.source_code.as_ref().ok_or_else(|| missing("source_code"))?;
            code_lines(ctx, host, route, code)
        }
        RouteType::StaticFiles => {
            let root = route.target_uri.as_deref().ok_or_else(|| missing("target_uri"))?;
            static_files_lines(route, root)
        }
    };

    if route.kind != RouteType::Proxy && route.kind != RouteType::Integration {
        lines.extend(custom_lines(route));
    }
    if let Some(id) = &route.access_list_id {
        lines.push(format!(
            "include {};",
            ctx.config_path(&names::access_list_conf(&ctx.access_list(id)?.id))
        ));
    }
    if let Some(id) = &route.cache_id {
        lines.extend(cache_directives(ctx.cache(id)?));
    }

    let target = match route.kind {
        RouteType::StaticFiles => with_trailing_slash(&route.source_path),
        _ => route.source_path.clone(),
    };
    extra.push(LocationTemplate { target, lines });
    Ok(extra)
}

fn proxy_lines(
    host: &Host,
    route: &Route,
    target: &str,
    clear_authorization: bool,
) -> Vec<String> {
    let mut lines = vec![format!("proxy_pass {target};")];
    if route.settings.keep_original_domain_name {
        lines.push("proxy_set_header Host $host;".to_string());
    }
    if route.settings.proxy_ssl_server_name {
        lines.push("proxy_ssl_server_name on;".to_string());
    }
    if host.feature_set.websocket_support {
        lines.push("proxy_http_version 1.1;".to_string());
        lines.push("proxy_set_header Upgrade $http_upgrade;".to_string());
        lines.push("proxy_set_header Connection \"upgrade\";".to_string());
    }
    if route.settings.include_forward_headers {
        lines.push("proxy_set_header X-Real-IP $remote_addr;".to_string());
        lines.push("proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;".to_string());
        lines.push("proxy_set_header X-Forwarded-Proto $scheme;".to_string());
        lines.push("proxy_set_header X-Forwarded-Host $host;".to_string());
        lines.push("proxy_set_header X-Forwarded-Port $server_port;".to_string());
    }
    if clear_authorization {
        lines.push("proxy_set_header Authorization \"\";".to_string());
    }
    lines.extend(custom_lines(route));
    lines
}

fn custom_lines(route: &Route) -> Vec<String> {
    route
        .settings
        .custom
        .as_deref()
        .map(|custom| {
            custom
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Internal named location serving the route's `.payload` file.
fn static_payload_location(
    ctx: &SynthesisContext<'_>,
    host: &Host,
    route: &Route,
    response: &StaticResponse,
) -> LocationTemplate {
    let content_type = response
        .content_type
        .as_deref()
        .unwrap_or(&ctx.settings.nginx.default_content_type);

    let mut lines = vec![
        "internal;".to_string(),
        format!("root {};", ctx.paths.config_dir().display()),
        format!("default_type {content_type};"),
    ];
    for header in &response.headers {
        lines.push(format!(
            "add_header {} \"{}\" always;",
            header.name,
            header.value.replace('"', "\\\"")
        ));
    }
    lines.push(format!(
        "try_files /{} ={};",
        names::route_payload(&host.id, route.priority),
        response.status_code
    ));

    LocationTemplate {
        target: format!("@route_{}", route.priority),
        lines,
    }
}

fn code_lines(
    ctx: &SynthesisContext<'_>,
    host: &Host,
    route: &Route,
    code: &SourceCode,
) -> Vec<String> {
    match code.language {
        CodeLanguage::Javascript => {
            let module = format!("route_{}", route.priority);
            let function = code.main_function.as_deref().unwrap_or(DEFAULT_JS_FUNCTION);
            vec![
                format!(
                    "js_import {module} from {};",
                    ctx.config_path(&names::route_source(&host.id, route.priority))
                ),
                format!("js_content {module}.{function};"),
            ]
        }
        CodeLanguage::Lua => {
            let mut lines = vec!["content_by_lua_block {".to_string()];
            lines.extend(code.code.lines().map(|l| format!("    {l}")));
            lines.push("}".to_string());
            lines
        }
    }
}

fn static_files_lines(route: &Route, root: &str) -> Vec<String> {
    let prefix = with_trailing_slash(&route.source_path);
    let mut lines = vec![
        format!("rewrite ^{prefix}(.*)$ /$1 break;"),
        format!("root {root};"),
    ];
    if route.settings.directory_listing_enabled {
        lines.push("autoindex on;".to_string());
    }
    if let Some(index) = &route.settings.index_file {
        lines.push(format!("index {index};"));
    }
    lines
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}
