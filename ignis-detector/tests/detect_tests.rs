//! Capability parsing and probing tests for `ignis-detector`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use ignis_detector::{parse_output, probe, Capabilities, DetectError, SupportType};
use rstest::rstest;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DEBIAN_OUTPUT: &str = "\
nginx version: nginx/1.24.0
built by gcc 12.2.0 (Debian 12.2.0-14)
built with OpenSSL 3.0.11 19 Sep 2023
TLS SNI support enabled
configure arguments: --prefix=/etc/nginx --with-cc-opt='-g -O2 -ffile-prefix-map=/build=.' \
--with-http_ssl_module --with-http_v2_module --with-stream=dynamic \
--with-stream_ssl_preread_module --with-threads --with-http_xslt_module=dynamic \
--add-dynamic-module=/build/modules/nginx-module-vts-0.2.2 --with-threads
";

fn configure(args: &str) -> Capabilities {
    parse_output(&format!("nginx version: nginx/1.25.3\nconfigure arguments: {args}\n"))
}

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"").expect("write fixture");
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

#[test]
fn version_build_and_sni_are_read() {
    let caps = parse_output(DEBIAN_OUTPUT);
    assert_eq!(caps.version.as_deref(), Some("1.24.0"));
    assert_eq!(
        caps.build.as_deref(),
        Some("by gcc 12.2.0 (Debian 12.2.0-14); with OpenSSL 3.0.11 19 Sep 2023")
    );
    assert!(caps.tls_sni);
}

#[test]
fn static_and_dynamic_modules_in_first_seen_order() {
    let caps = parse_output(DEBIAN_OUTPUT);
    assert_eq!(
        caps.modules,
        vec![
            "http_ssl_module",
            "http_v2_module",
            "stream_ssl_preread_module",
            "threads",
            "ngx_stream_module",
            "http_xslt_module",
            "ngx_http_xslt_module",
            "nginx-module-vts-0.2.2",
            "nginx-module-vts",
        ]
    );
}

#[test]
fn missing_sections_yield_empty_capabilities() {
    let caps = parse_output("nginx: [emerg] something odd\n");
    assert_eq!(caps, Capabilities::default());
}

// ---------------------------------------------------------------------------
// Derived feature support
// ---------------------------------------------------------------------------

#[rstest]
#[case("--with-stream", SupportType::Static)]
#[case("--with-stream=dynamic", SupportType::Dynamic)]
#[case("--with-http_ssl_module", SupportType::None)]
fn stream_support(#[case] args: &str, #[case] expected: SupportType) {
    assert_eq!(configure(args).stream_type(), expected);
}

#[rstest]
#[case("--add-dynamic-module=/src/nginx-module-vts", SupportType::Dynamic)]
#[case("--add-dynamic-module=/src/nginx-module-vts-0.2.2/", SupportType::Dynamic)]
#[case("--with-http_stub_status_module", SupportType::None)]
fn stats_support(#[case] args: &str, #[case] expected: SupportType) {
    assert_eq!(configure(args).stats_type(), expected);
}

#[test]
fn run_code_requires_all_three_modules() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), "ngx_http_js_module.so");
    touch(dir.path(), "ngx_http_lua_module.so");

    let args = format!("--modules-path={}", dir.path().display());
    let output = format!("configure arguments: {args}\n");
    assert_eq!(
        Capabilities::from_output(&output).run_code_type(),
        SupportType::None
    );

    touch(dir.path(), "ndk_http_module.so");
    assert_eq!(
        Capabilities::from_output(&output).run_code_type(),
        SupportType::Dynamic
    );
}

#[test]
fn sni_absent_means_unsupported() {
    let caps = configure("--with-stream");
    assert_eq!(caps.tls_sni_type(), SupportType::None);
    assert_eq!(parse_output(DEBIAN_OUTPUT).tls_sni_type(), SupportType::Static);
}

// ---------------------------------------------------------------------------
// Modules directory
// ---------------------------------------------------------------------------

#[test]
fn modules_directory_is_unioned_without_duplicates() {
    let dir = TempDir::new().expect("tempdir");
    touch(dir.path(), "ngx_stream_module.so");
    touch(dir.path(), "ngx_http_geoip2_module.so");
    touch(dir.path(), "README.txt");

    let output = format!(
        "configure arguments: --with-stream=dynamic --modules-path={}\n",
        dir.path().display()
    );
    let caps = Capabilities::from_output(&output);
    assert_eq!(caps.modules_path.as_deref(), Some(dir.path()));
    assert_eq!(
        caps.modules,
        vec!["ngx_stream_module", "ngx_http_geoip2_module"]
    );

    let features = caps.supported_features();
    assert_eq!(features.stream_type, SupportType::Dynamic);
    assert_eq!(features.modules_path.as_deref(), Some(dir.path()));
}

#[test]
fn unreadable_modules_directory_is_not_fatal() {
    let caps = Capabilities::from_output(
        "configure arguments: --with-stream --modules-path=/nonexistent/ignis/modules\n",
    );
    assert_eq!(caps.modules, vec!["stream"]);
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_binary_is_a_spawn_error() {
    let err = probe(Path::new("/nonexistent/ignis/nginx"), Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, DetectError::Spawn { .. }), "got: {err}");
}

#[cfg(unix)]
#[tokio::test]
async fn probe_reads_stderr_of_a_fake_binary() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("tempdir");
    let script = dir.path().join("nginx");
    fs::write(
        &script,
        "#!/bin/sh\necho 'nginx version: nginx/1.25.3' >&2\necho 'configure arguments: --with-stream' >&2\n",
    )
    .expect("write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");

    let caps = probe(&script, Duration::from_secs(10)).await.expect("probe");
    assert_eq!(caps.version.as_deref(), Some("1.25.3"));
    assert_eq!(caps.stream_type(), SupportType::Static);
}
