use serde::Serialize;

use ignis_core::types::AccessList;

use crate::context::{names, ConfigurationFile, SynthesisContext};
use crate::engine::ACCESS_LIST_TEMPLATE;
use crate::error::RenderError;
use crate::htpasswd;

use super::FileProvider;

const DEFAULT_REALM: &str = "Restricted";

/// `access-list-<id>.conf` for every list, plus `access-list-<id>.htpasswd`
/// when the list carries credentials.
pub struct AccessListProvider;

#[derive(Serialize)]
struct AccessListTemplate<'a> {
    id: &'a str,
    rules: Vec<String>,
    default_outcome: &'static str,
    satisfy: &'static str,
    auth: Option<AuthTemplate>,
    clear_authorization: bool,
}

#[derive(Serialize)]
struct AuthTemplate {
    realm: String,
    user_file: String,
}

impl FileProvider for AccessListProvider {
    fn name(&self) -> &'static str {
        "access lists"
    }

    fn provide(&self, ctx: &SynthesisContext<'_>) -> Result<Vec<ConfigurationFile>, RenderError> {
        let mut files = Vec::new();
        for list in &ctx.access_lists {
            files.push(render_conf(ctx, list)?);
            if !list.credentials.is_empty() {
                files.push(render_htpasswd(list));
            }
        }
        Ok(files)
    }
}

fn render_conf(ctx: &SynthesisContext<'_>, list: &AccessList) -> Result<ConfigurationFile, RenderError> {
    let rules = list
        .entries
        .iter()
        .flat_map(|entry| {
            entry
                .source_addresses
                .iter()
                .map(move |addr| format!("{} {addr}", entry.outcome.directive()))
        })
        .collect();

    let has_credentials = !list.credentials.is_empty();
    let satisfy = if list.satisfy_all && has_credentials && !list.entries.is_empty() {
        "all"
    } else {
        "any"
    };

    let auth = has_credentials.then(|| AuthTemplate {
        realm: list
            .realm
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_REALM)
            .replace('"', "\\\""),
        user_file: ctx.config_path(&names::access_list_htpasswd(&list.id)),
    });

    let body = ctx.templates.render(
        ACCESS_LIST_TEMPLATE,
        &AccessListTemplate {
            id: &list.id.0,
            rules,
            default_outcome: list.default_outcome.directive(),
            satisfy,
            auth,
            clear_authorization: !list.forward_authentication_header,
        },
    )?;
    Ok(ConfigurationFile::text(names::access_list_conf(&list.id), body))
}

fn render_htpasswd(list: &AccessList) -> ConfigurationFile {
    let body: String = list
        .credentials
        .iter()
        .map(|c| format!("{}:{}\n", c.username, htpasswd::hash(&c.password)))
        .collect();
    ConfigurationFile::text(names::access_list_htpasswd(&list.id), body)
}
