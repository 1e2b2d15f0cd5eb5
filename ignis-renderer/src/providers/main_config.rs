//! `nginx.conf`: process settings, module loading and the `http {}` /
//! `stream {}` wrappers that include every host and stream file.

use serde::Serialize;

use ignis_detector::SupportType;

use crate::context::{names, ConfigurationFile, SynthesisContext};
use crate::engine::MAIN_TEMPLATE;
use crate::error::RenderError;

use super::cache::{cache_path_directive, on_off};
use super::FileProvider;

pub struct MainConfigurationProvider;

#[derive(Serialize)]
struct MainTemplate {
    user: Option<String>,
    load_modules: Vec<String>,
    worker_processes: u32,
    pid: String,
    error_log: String,
    worker_connections: u32,
    http: HttpTemplate,
    custom: Vec<String>,
    cache_paths: Vec<String>,
    stats: Option<StatsTemplate>,
    host_includes: Vec<String>,
    stream: Option<StreamTemplate>,
}

#[derive(Serialize)]
struct HttpTemplate {
    mime_types: String,
    default_type: String,
    sendfile: &'static str,
    server_tokens: &'static str,
    tcp_nodelay: &'static str,
    max_body_size: String,
    client_body_buffer: String,
    client_header_buffer: String,
    large_client_header_buffers: String,
    output_buffers: String,
    keepalive_timeout: String,
    connect_timeout: String,
    read_timeout: String,
    send_timeout: String,
}

#[derive(Serialize)]
struct StatsTemplate {
    zone_size: String,
    dump: Option<String>,
    socket: String,
}

#[derive(Serialize)]
struct StreamTemplate {
    includes: Vec<String>,
}

impl FileProvider for MainConfigurationProvider {
    fn name(&self) -> &'static str {
        "main configuration"
    }

    fn provide(&self, ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
        let nginx = &ctx.settings.nginx;
        let stats_settings = &ctx.settings.stats;

        if stats_settings.enabled && !ctx.features.stats_type.is_supported() {
            return Err(RenderError::Unsupported {
                feature: "traffic statistics",
                subject: "global stats settings".to_string(),
            });
        }

        let error_log = if nginx.logs.server_logs_enabled {
            format!(
                "{} {}",
                ctx.paths.main_log().display(),
                nginx.logs.server_logs_level
            )
        } else {
            "/dev/null crit".to_string()
        };

        let stats = stats_settings.enabled.then(|| StatsTemplate {
            zone_size: format!("{}m", stats_settings.maximum_size_mb),
            dump: stats_settings
                .persistent
                .then(|| ctx.paths.stats_dump().display().to_string()),
            socket: ctx.paths.stats_socket().display().to_string(),
        });

        let stream = ctx
            .features
            .stream_type
            .is_supported()
            .then(|| StreamTemplate {
                includes: ctx
                    .streams
                    .iter()
                    .map(|s| ctx.config_path(&names::stream(&s.id)))
                    .collect(),
            });

        let buffers = &nginx.buffers;
        let timeouts = &nginx.timeouts;
        let template = MainTemplate {
            user: nginx.runtime_user.clone().filter(|u| !u.trim().is_empty()),
            load_modules: load_modules(ctx),
            worker_processes: nginx.worker_processes,
            pid: ctx.paths.pid_file().display().to_string(),
            error_log,
            worker_connections: nginx.worker_connections,
            http: HttpTemplate {
                mime_types: ctx.config_path(names::MIME_TYPES),
                default_type: nginx.default_content_type.clone(),
                sendfile: on_off(nginx.sendfile),
                server_tokens: on_off(nginx.server_tokens),
                tcp_nodelay: on_off(nginx.tcp_no_delay),
                max_body_size: format!("{}m", nginx.maximum_body_size_mb),
                client_body_buffer: format!("{}k", buffers.client_body_kb),
                client_header_buffer: format!("{}k", buffers.client_header_kb),
                large_client_header_buffers: format!(
                    "{} {}k",
                    buffers.large_client_header.amount, buffers.large_client_header.size_kb
                ),
                output_buffers: format!("{} {}k", buffers.output.amount, buffers.output.size_kb),
                keepalive_timeout: format!("{}s", timeouts.keepalive),
                connect_timeout: format!("{}s", timeouts.connect),
                read_timeout: format!("{}s", timeouts.read),
                send_timeout: format!("{}s", timeouts.send),
            },
            custom: nginx
                .custom
                .as_deref()
                .map(|c| c.lines().map(str::to_string).collect())
                .unwrap_or_default(),
            cache_paths: ctx
                .caches
                .iter()
                .map(|c| cache_path_directive(ctx.paths, c))
                .collect(),
            stats,
            host_includes: ctx
                .hosts
                .iter()
                .map(|h| ctx.config_path(&names::host(&h.id)))
                .collect(),
            stream,
        };

        let body = ctx.templates.render(MAIN_TEMPLATE, &template)?;
        Ok(vec![ConfigurationFile::text(names::MAIN_CONFIG, body)])
    }
}

/// `load_module` targets for features that are only available as dynamic
/// modules. NDK must load before Lua.
fn load_modules(ctx: &SynthesisContext<'_>) -> Vec<String> {
    let features = ctx.features;
    let mut modules = Vec::new();

    if features.run_code_type == SupportType::Dynamic {
        modules.extend(["ndk_http_module", "ngx_http_lua_module", "ngx_http_js_module"]);
    }
    if features.stream_type == SupportType::Dynamic {
        modules.push("ngx_stream_module");
    }
    if features.stats_type == SupportType::Dynamic && ctx.settings.stats.enabled {
        modules.push("ngx_http_vhost_traffic_status_module");
    }

    modules
        .into_iter()
        .map(|m| match &features.modules_path {
            Some(dir) => dir.join(format!("{m}.so")).display().to_string(),
            None => format!("modules/{m}.so"),
        })
        .collect()
}
