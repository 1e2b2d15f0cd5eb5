//! Directive helpers shared by host-level and route-level cache references
//! and by the main configuration's `proxy_cache_path` lines.

use ignis_core::types::Cache;

use crate::context::{names, ConfigPaths};

/// Variable set to 1 when a request's extension is outside the cache's
/// allow-list.
const SKIP_VARIABLE: &str = "$ignis_cache_skip";

/// Directive lines that attach `cache` to a `server` or `location` block.
pub fn cache_directives(cache: &Cache) -> Vec<String> {
    let mut lines = vec![format!("proxy_cache {};", cache.zone_name())];

    for duration in &cache.durations {
        let codes = if duration.status_codes.is_empty() {
            "any".to_string()
        } else {
            duration.status_codes.join(" ")
        };
        lines.push(format!(
            "proxy_cache_valid {codes} {}s;",
            duration.valid_time_seconds
        ));
    }

    if !cache.allowed_methods.is_empty() {
        lines.push(format!(
            "proxy_cache_methods {};",
            cache.allowed_methods.join(" ")
        ));
    }

    lines.push(format!(
        "proxy_cache_min_uses {};",
        cache.minimum_uses_before_caching.max(1)
    ));
    lines.push(format!(
        "proxy_cache_background_update {};",
        on_off(cache.background_update)
    ));
    lines.push(format!("proxy_cache_revalidate {};", on_off(cache.revalidate)));
    let stale = if cache.use_stale.is_empty() {
        "off".to_string()
    } else {
        cache.use_stale.join(" ")
    };
    lines.push(format!("proxy_cache_use_stale {stale};"));

    let lock = &cache.concurrency_lock;
    if lock.enabled {
        lines.push("proxy_cache_lock on;".to_string());
        if let Some(timeout) = lock.timeout_seconds {
            lines.push(format!("proxy_cache_lock_timeout {timeout}s;"));
        }
        if let Some(age) = lock.age_seconds {
            lines.push(format!("proxy_cache_lock_age {age}s;"));
        }
    }

    let mut bypass = cache.bypass_rules.clone();
    let mut no_cache = cache.no_cache_rules.clone();

    if !cache.file_extensions.is_empty() {
        let extensions: Vec<String> = cache
            .file_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        lines.push(format!("set {SKIP_VARIABLE} 0;"));
        lines.push(format!(
            "if ($uri !~* \"\\.({})$\") {{ set {SKIP_VARIABLE} 1; }}",
            extensions.join("|")
        ));
        bypass.push(SKIP_VARIABLE.to_string());
        no_cache.push(SKIP_VARIABLE.to_string());
    }

    if !bypass.is_empty() {
        lines.push(format!("proxy_cache_bypass {};", bypass.join(" ")));
    }
    if !no_cache.is_empty() {
        lines.push(format!("proxy_no_cache {};", no_cache.join(" ")));
    }

    lines
}

/// Arguments of the `proxy_cache_path` directive for `cache`.
pub fn cache_path_directive(paths: &ConfigPaths, cache: &Cache) -> String {
    let storage = cache
        .storage_path
        .clone()
        .unwrap_or_else(|| paths.cache_dir().join(names::default_cache_dir(&cache.id)));

    let mut directive = format!(
        "{} levels=1:2 keys_zone={}:10m",
        storage.display(),
        cache.zone_name()
    );
    if let Some(inactive) = cache.inactive_seconds {
        directive.push_str(&format!(" inactive={inactive}s"));
    }
    if let Some(size) = cache.maximum_size_mb {
        directive.push_str(&format!(" max_size={size}m"));
    }
    directive.push_str(" use_temp_path=off");
    directive
}

pub(crate) fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
