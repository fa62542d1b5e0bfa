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

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};

pub const DEFAULT_DATABASE: &str = "postgres";

/// Connection and behaviour settings of the operator, each backed by an
/// environment variable. Host and login are checked when the [`Config`] is
/// built, so the commands printing manifests work without them.
#[derive(Args, Debug, Clone)]
pub struct PostgresArgs {
    /// administrative postgres host, optionally with port (host:port)
    #[arg(long = "postgres-host", env = "POSTGRES_HOST")]
    pub host: Option<String>,

    /// administrative login
    #[arg(long = "postgres-user", env = "POSTGRES_USER")]
    pub user: Option<String>,

    /// password of the administrative login
    #[arg(long = "postgres-pass", env = "POSTGRES_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// extra connection arguments, e.g. 'sslmode=disable'
    #[arg(long = "postgres-uri-args", env = "POSTGRES_URI_ARGS", default_value = "")]
    pub uri_args: String,

    /// database the administrative connection is opened against
    #[arg(
        long = "postgres-default-database",
        env = "POSTGRES_DEFAULT_DATABASE",
        default_value = DEFAULT_DATABASE
    )]
    pub default_database: String,

    /// one of AWS, Azure, GCP, AlloyDB (leave empty for self hosted postgres)
    #[arg(
        long = "postgres-cloud-provider",
        env = "POSTGRES_CLOUD_PROVIDER",
        default_value = ""
    )]
    pub cloud_provider: String,

    /// only handle resources whose instance annotation carries this value
    #[arg(long = "postgres-instance", env = "POSTGRES_INSTANCE", default_value = "")]
    pub instance: String,

    /// use the secret name of a user resource verbatim instead of appending the resource name
    #[arg(
        long = "keep-secret-name",
        env = "KEEP_SECRET_NAME",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value_t = false
    )]
    pub keep_secret_name: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
}

impl FromStr for CloudProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "azure" => Ok(CloudProvider::Azure),
            "gcp" | "alloydb" => Ok(CloudProvider::Gcp),
            _ => Err(anyhow!(
                "unknown cloud provider '{}' (expected one of AWS, Azure, GCP, AlloyDB)",
                s
            )),
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudProvider::Aws => write!(f, "AWS"),
            CloudProvider::Azure => write!(f, "Azure"),
            CloudProvider::Gcp => write!(f, "GCP"),
        }
    }
}

/// Immutable operator configuration, built once at startup and shared by
/// the driver and both operators.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub user: String,
    pub password: String,
    pub uri_args: String,
    pub default_database: String,
    pub cloud_provider: Option<CloudProvider>,
    pub instance_filter: String,
    pub keep_secret_name: bool,
}

impl Config {
    /// The role name behind the administrative login. Azure single server
    /// logins look like `role@server`; everywhere else login and role match.
    pub fn operator_role(&self) -> &str {
        match self.cloud_provider {
            Some(CloudProvider::Azure) => self.user.split('@').next().unwrap_or(&self.user),
            _ => &self.user,
        }
    }
}

impl TryFrom<PostgresArgs> for Config {
    type Error = anyhow::Error;

    fn try_from(args: PostgresArgs) -> anyhow::Result<Self> {
        let host = match args.host {
            Some(host) if !host.trim().is_empty() => host,
            _ => bail!("POSTGRES_HOST must not be empty"),
        };
        let user = match args.user {
            Some(user) if !user.trim().is_empty() => user,
            _ => bail!("POSTGRES_USER must not be empty"),
        };

        let cloud_provider = match args.cloud_provider.trim() {
            "" => None,
            provider => Some(provider.parse::<CloudProvider>()?),
        };

        let default_database = if args.default_database.trim().is_empty() {
            DEFAULT_DATABASE.to_string()
        } else {
            args.default_database
        };

        Ok(Config {
            host,
            user,
            password: args.password.unwrap_or_default(),
            uri_args: args.uri_args,
            default_database,
            cloud_provider,
            instance_filter: args.instance,
            keep_secret_name: args.keep_secret_name,
        })
    }
}
