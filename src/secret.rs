/*
 * Copyright 2021 Daniel Bornkessel
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The credentials secret of a postgres user: connection strings, the plain
//! credentials and whatever the user's secret template renders to.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context as _};
use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::ResourceExt;
use serde::Serialize;
use url::{form_urlencoded, Url};

use crate::config::Config;
use crate::postgres_user::PostgresUser;

pub const DEFAULT_PORT: &str = "5432";

/// What a secret template can refer to.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateContext {
    pub host: String,
    pub role: String,
    pub database: String,
    pub password: String,
    /// host without port
    pub hostname: String,
    pub port: String,
    pub uri_args: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub role: &'a str,
    pub login: &'a str,
    pub password: &'a str,
    pub database: &'a str,
}

/// `{{mergeUriArgs "a=b"}}`: the given query string merged with the
/// configured connection arguments. Given values win.
struct MergeUriArgs {
    uri_args: String,
}

impl HelperDef for MergeUriArgs {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let args = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| RenderError::new("mergeUriArgs expects a query string"))?;
        out.write(&merge_uri_args(&self.uri_args, args))?;
        Ok(())
    }
}

pub fn merge_uri_args(configured: &str, args: &str) -> String {
    let mut merged: BTreeMap<String, String> = form_urlencoded::parse(configured.as_bytes())
        .into_owned()
        .collect();
    merged.extend(form_urlencoded::parse(args.as_bytes()).into_owned());

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(merged.iter())
        .finish()
}

pub fn render_templates(
    templates: &BTreeMap<String, String>,
    context: &TemplateContext,
) -> anyhow::Result<BTreeMap<String, String>> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.register_helper(
        "mergeUriArgs",
        Box::new(MergeUriArgs {
            uri_args: context.uri_args.clone(),
        }),
    );

    let mut rendered = BTreeMap::new();
    for (key, template) in templates {
        handlebars
            .register_template_string(key, template)
            .with_context(|| format!("parse template {}", key))?;
        let value = handlebars
            .render(key, context)
            .with_context(|| format!("execute template {}", key))?;
        rendered.insert(key.clone(), value);
    }
    Ok(rendered)
}

/// Splits `host:port`; the port defaults to 5432.
pub fn split_host(host: &str) -> (String, String) {
    match host.rsplit_once(':') {
        Some((hostname, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
            (hostname.to_string(), port.to_string())
        }
        _ => (host.to_string(), DEFAULT_PORT.to_string()),
    }
}

pub fn connection_url(host: &str, credentials: &Credentials) -> anyhow::Result<String> {
    let mut url = Url::parse(&format!("postgresql://{}", host))
        .with_context(|| format!("invalid postgres host {}", host))?;
    url.set_username(credentials.login)
        .map_err(|_| anyhow!("cannot use login {} in a connection url", credentials.login))?;
    url.set_password(Some(credentials.password))
        .map_err(|_| anyhow!("cannot use password in a connection url"))?;
    url.set_path(&format!("/{}", credentials.database));
    Ok(url.to_string())
}

pub fn template_context(config: &Config, credentials: &Credentials) -> TemplateContext {
    let (hostname, port) = split_host(&config.host);
    TemplateContext {
        host: config.host.clone(),
        role: credentials.role.to_string(),
        database: credentials.database.to_string(),
        password: credentials.password.to_string(),
        hostname,
        port,
        uri_args: config.uri_args.clone(),
    }
}

/// The standard keys, overridden by rendered template keys.
pub fn secret_data(
    config: &Config,
    credentials: &Credentials,
    templates: Option<&BTreeMap<String, String>>,
) -> anyhow::Result<BTreeMap<String, String>> {
    let context = template_context(config, credentials);
    let host = &config.host;
    let database = credentials.database;

    let mut data = BTreeMap::new();
    data.insert(
        "POSTGRES_URL".to_string(),
        connection_url(host, credentials)?,
    );
    data.insert(
        "POSTGRES_JDBC_URL".to_string(),
        format!("jdbc:postgresql://{}/{}", host, database),
    );
    data.insert(
        "POSTGRES_DOTNET_URL".to_string(),
        format!(
            "User ID={};Password={};Host={};Port={};Database={};",
            credentials.login, credentials.password, context.hostname, context.port, database
        ),
    );
    data.insert("HOST".to_string(), host.clone());
    data.insert("HOSTNAME".to_string(), context.hostname.clone());
    data.insert("PORT".to_string(), context.port.clone());
    data.insert("DATABASE_NAME".to_string(), database.to_string());
    data.insert("URI_ARGS".to_string(), config.uri_args.clone());
    data.insert("ROLE".to_string(), credentials.role.to_string());
    data.insert("PASSWORD".to_string(), credentials.password.to_string());
    data.insert("LOGIN".to_string(), credentials.login.to_string());

    if let Some(templates) = templates {
        data.extend(render_templates(templates, &context)?);
    }
    Ok(data)
}

/// `<secretName>-<resource name>`, or `secretName` alone if configured so.
pub fn secret_name(user: &PostgresUser, keep_secret_name: bool) -> String {
    if keep_secret_name {
        user.spec.secret_name.clone()
    } else {
        format!("{}-{}", user.spec.secret_name, user.name_any())
    }
}

pub fn new_secret(
    user: &PostgresUser,
    config: &Config,
    credentials: &Credentials,
) -> anyhow::Result<Secret> {
    let data = secret_data(config, credentials, user.spec.secret_template.as_ref())?;

    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), user.name_any());
    labels.extend(user.spec.labels.clone());

    let annotations = Some(user.spec.annotations.clone()).filter(|a| !a.is_empty());

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(secret_name(user, config.keep_secret_name)),
            namespace: user.namespace(),
            labels: Some(labels),
            annotations,
            owner_references: Some(vec![OwnerReference::from(user)]),
            ..Default::default()
        },
        data: Some(
            data.into_iter()
                .map(|(k, v)| (k, ByteString(v.into_bytes())))
                .collect(),
        ),
        ..Default::default()
    })
}
