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

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{CustomResource, Resource, ResourceExt};
pub use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::postgres::{Postgres, Sample};
use crate::postgres_user::PostgresUserStatus;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default, JsonSchema)]
pub enum Privileges {
    #[serde(rename = "READ")]
    Read,
    #[serde(rename = "WRITE")]
    Write,
    /// also used for unknown values
    #[default]
    #[serde(rename = "OWNER", other)]
    Owner,
}

impl Privileges {
    /// The group role of `postgres` this privilege level maps to.
    pub fn group_role(self, postgres: &Postgres) -> Option<&str> {
        let roles = &postgres.status.as_ref()?.roles;
        let role = match self {
            Privileges::Read => &roles.reader,
            Privileges::Write => &roles.writer,
            Privileges::Owner => &roles.owner,
        };
        Some(role.as_str()).filter(|r| !r.is_empty())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseGrant {
    /// name of a postgres resource in the same namespace
    pub database: String,
    #[serde(default)]
    pub privileges: Privileges,
}

#[derive(CustomResource, Serialize, Deserialize, PartialEq, Default, Debug, Clone, JsonSchema)]
/// a login role with access to one or more self service postgres databases
#[serde(rename_all = "camelCase")]
#[kube(
    group = "selfservice.innoq.io",
    version = "v1",
    kind = "PostgresUser",
    plural = "postgresusers",
    namespaced,
    status = "PostgresUserStatus",
    shortname = "sspsqluser",
    printcolumn = r#"{"name":"Role", "type":"string", "description":"generated login role", "jsonPath":".status.postgresRole"}"#,
    printcolumn = r#"{"name":"Succeeded", "type":"boolean", "description":"role and secret exist", "jsonPath":".status.succeeded"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "description":"how old this resource is", "jsonPath":".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name":"Status summary", "type":"string", "description":"last error", "jsonPath":".status.summary"}"#
)]
pub struct PostgresUserSpec {
    /// prefix of the generated role name
    pub role: String,

    pub databases: Vec<DatabaseGrant>,

    /// name of the secret holding the credentials
    pub secret_name: String,

    /// additional secret keys, rendered as handlebars templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_template: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl Sample for PostgresUserSpec {
    fn sample() -> Self {
        PostgresUserSpec {
            role: "orders-app".to_string(),
            databases: vec![DatabaseGrant {
                database: "sample-self-service-postgres".to_string(),
                privileges: Privileges::Write,
            }],
            secret_name: "orders-credentials".to_string(),
            secret_template: Some(
                vec![(
                    "DATABASE_URL".to_string(),
                    "postgres://{{role}}:{{password}}@{{host}}/{{database}}?{{mergeUriArgs \"application_name=orders\"}}"
                        .to_string(),
                )]
                .into_iter()
                .collect(),
            ),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }
}

impl Sample for PostgresUser {
    fn sample() -> Self {
        PostgresUser::new("sample-self-service-postgres-user", PostgresUserSpec::sample())
    }
}

/// The credentials secret is controlled by its user resource.
impl From<&PostgresUser> for OwnerReference {
    fn from(u: &PostgresUser) -> OwnerReference {
        OwnerReference {
            api_version: PostgresUser::api_version(&()).to_string(),
            block_owner_deletion: None,
            controller: Some(true),
            kind: PostgresUser::kind(&()).to_string(),
            name: u.name_any(),
            uid: u.uid().unwrap_or_default(),
        }
    }
}
