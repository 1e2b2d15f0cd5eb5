//! `stream-<id>.conf`: layer-4 listeners, their upstream pools and, for SNI
//! routers, the `$ssl_preread_server_name` routing map.

use serde::Serialize;

use ignis_core::types::{
    nginx_identifier, Stream, StreamBackend, StreamProtocol, StreamType,
};

use crate::context::{names, ConfigurationFile, SynthesisContext};
use crate::engine::STREAM_TEMPLATE;
use crate::error::RenderError;

use super::FileProvider;

pub struct StreamProvider;

#[derive(Serialize)]
struct StreamTemplate<'a> {
    stream_id: &'a str,
    upstreams: Vec<UpstreamTemplate>,
    sni_map: Option<SniMapTemplate>,
    listen: String,
    lines: Vec<String>,
}

#[derive(Serialize)]
struct UpstreamTemplate {
    name: String,
    servers: Vec<String>,
}

#[derive(Serialize)]
struct SniMapTemplate {
    variable: String,
    entries: Vec<SniEntry>,
    default_upstream: String,
}

#[derive(Serialize)]
struct SniEntry {
    domain: String,
    upstream: String,
}

impl FileProvider for StreamProvider {
    fn name(&self) -> &'static str {
        "streams"
    }

    fn provide(&self, ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
        if ctx.streams.is_empty() {
            return Ok(Vec::new());
        }
        if !ctx.features.stream_type.is_supported() {
            return Err(RenderError::Unsupported {
                feature: "the stream module",
                subject: format!("{} enabled stream(s)", ctx.streams.len()),
            });
        }
        ctx.streams
            .iter()
            .map(|stream| render_stream(ctx, stream))
            .collect()
    }
}

fn render_stream(ctx: &SynthesisContext<'_>, stream: &Stream) -> Result<ConfigurationFile, RenderError> {
    let key = nginx_identifier(&stream.id.0);
    let default_upstream = format!("stream_{key}_default");

    let mut upstreams = vec![UpstreamTemplate {
        name: default_upstream.clone(),
        servers: vec![server_line(&stream.default_backend)],
    }];
    let mut lines = feature_lines(stream);
    let mut sni_map = None;

    match stream.kind {
        StreamType::Simple => {
            lines.push(format!("proxy_pass {default_upstream};"));
        }
        StreamType::SniRouter => {
            if !ctx.features.tls_sni.is_supported() {
                return Err(RenderError::Unsupported {
                    feature: "TLS SNI",
                    subject: format!("SNI router stream {}", stream.id),
                });
            }
            let mut entries = Vec::new();
            for (index, route) in stream.routes.iter().enumerate() {
                let name = format!("stream_{key}_route_{index}");
                upstreams.push(UpstreamTemplate {
                    name: name.clone(),
                    servers: route.backends.iter().map(server_line).collect(),
                });
                entries.extend(route.domain_names.iter().map(|domain| SniEntry {
                    domain: domain.clone(),
                    upstream: name.clone(),
                }));
            }
            let variable = format!("$stream_{key}_backend");
            lines.push("ssl_preread on;".to_string());
            lines.push(format!("proxy_pass {variable};"));
            sni_map = Some(SniMapTemplate {
                variable,
                entries,
                default_upstream,
            });
        }
    }

    let body = ctx.templates.render(
        STREAM_TEMPLATE,
        &StreamTemplate {
            stream_id: &stream.id.0,
            upstreams,
            sni_map,
            listen: listen_line(stream),
            lines,
        },
    )?;
    Ok(ConfigurationFile::text(names::stream(&stream.id), body))
}

fn listen_line(stream: &Stream) -> String {
    let binding = &stream.binding;
    let features = &stream.feature_set;

    let mut line = match (binding.protocol, binding.port) {
        (StreamProtocol::Socket, _) => format!("unix:{}", binding.address),
        (_, Some(port)) => format!("{}:{port}", bracketed(&binding.address)),
        (_, None) => binding.address.clone(),
    };
    if binding.protocol == StreamProtocol::Udp {
        line.push_str(" udp");
    }
    if binding.protocol == StreamProtocol::Tcp {
        if features.tcp_deferred {
            line.push_str(" deferred");
        }
        if features.socket_keep_alive {
            line.push_str(" so_keepalive=on");
        }
    }
    line.push_str(" reuseport");
    line
}

fn feature_lines(stream: &Stream) -> Vec<String> {
    let features = &stream.feature_set;
    let mut lines = Vec::new();
    if features.use_proxy_protocol {
        lines.push("proxy_protocol on;".to_string());
    }
    if features.tcp_keep_alive {
        lines.push("proxy_socket_keepalive on;".to_string());
    }
    if features.tcp_no_delay {
        lines.push("tcp_nodelay on;".to_string());
    }
    lines
}

/// `addr[:port] [weight=] [max_fails=] [fail_timeout=]`
fn server_line(backend: &StreamBackend) -> String {
    let mut line = match backend.port {
        Some(port) => format!("{}:{port}", bracketed(&backend.address)),
        None => backend.address.clone(),
    };
    if let Some(weight) = backend.weight {
        line.push_str(&format!(" weight={weight}"));
    }
    if let Some(breaker) = &backend.circuit_breaker {
        line.push_str(&format!(
            " max_fails={} fail_timeout={}s",
            breaker.max_failures, breaker.open_seconds
        ));
    }
    line
}

fn bracketed(address: &str) -> String {
    if address.contains(':') && !address.starts_with('[') && !address.starts_with("unix:") {
        format!("[{address}]")
    } else {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_core::types::{CircuitBreaker, StreamAddress, StreamFeatureSet, StreamId};

    fn stream(protocol: StreamProtocol, port: Option<u16>) -> Stream {
        Stream {
            id: StreamId::from("db-1"),
            enabled: true,
            binding: StreamAddress {
                protocol,
                address: "0.0.0.0".into(),
                port,
            },
            kind: StreamType::Simple,
            default_backend: StreamBackend {
                address: "10.0.0.1".into(),
                port: Some(5432),
                weight: None,
                circuit_breaker: None,
            },
            routes: vec![],
            feature_set: StreamFeatureSet::default(),
        }
    }

    #[test]
    fn listen_lines_always_reuseport() {
        assert_eq!(listen_line(&stream(StreamProtocol::Tcp, Some(5432))), "0.0.0.0:5432 reuseport");
        assert_eq!(listen_line(&stream(StreamProtocol::Udp, Some(53))), "0.0.0.0:53 udp reuseport");

        let mut socket = stream(StreamProtocol::Socket, None);
        socket.binding.address = "/run/db.sock".into();
        assert_eq!(listen_line(&socket), "unix:/run/db.sock reuseport");
    }

    #[test]
    fn tcp_listen_flags() {
        let mut s = stream(StreamProtocol::Tcp, Some(5432));
        s.feature_set.tcp_deferred = true;
        s.feature_set.socket_keep_alive = true;
        assert_eq!(listen_line(&s), "0.0.0.0:5432 deferred so_keepalive=on reuseport");
    }

    #[test]
    fn server_line_with_weight_and_breaker() {
        let backend = StreamBackend {
            address: "10.0.0.2".into(),
            port: Some(443),
            weight: Some(3),
            circuit_breaker: Some(CircuitBreaker {
                max_failures: 2,
                open_seconds: 30,
            }),
        };
        assert_eq!(server_line(&backend), "10.0.0.2:443 weight=3 max_fails=2 fail_timeout=30s");
    }

    #[test]
    fn identifiers_are_sanitised() {
        assert_eq!(nginx_identifier("db-1.main"), "db_1_main");
    }
}
