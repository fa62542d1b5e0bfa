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

use crate::postgres::PostgresStatus;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{CustomResource, Resource, ResourceExt};
pub use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub trait Sample {
    fn sample() -> Self;
}

#[derive(CustomResource, Serialize, Deserialize, PartialEq, Default, Debug, Clone, JsonSchema)]
/// a self service postgres database together with an owner, a reader and a writer role
#[serde(rename_all = "camelCase")]
#[kube(
    group = "selfservice.innoq.io",
    version = "v1",
    kind = "Postgres",
    plural = "postgres",
    namespaced,
    status = "PostgresStatus",
    shortname = "sspsql",
    printcolumn = r#"{"name":"Database", "type":"string", "description":"name of the database", "jsonPath":".status.dbName"}"#,
    printcolumn = r#"{"name":"Succeeded", "type":"boolean", "description":"database and roles exist", "jsonPath":".status.succeeded"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "description":"how old this resource is", "jsonPath":".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name":"Status summary", "type":"string", "description":"last error", "jsonPath":".status.summary"}"#
)]
pub struct PostgresSpec {
    /// name of the database to create
    pub database: String,

    /// name of the owner role; defaults to `<database>-group`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_role: Option<String>,

    /// drop roles and database when this resource is deleted and no other
    /// resource claims the same database
    #[serde(default)]
    pub drop_on_delete: bool,

    #[serde(default)]
    pub schemas: Vec<String>,

    #[serde(default)]
    pub extensions: Vec<String>,
}

impl Sample for PostgresSpec {
    fn sample() -> Self {
        PostgresSpec {
            database: "orders".to_string(),
            master_role: None,
            drop_on_delete: false,
            schemas: vec!["stores".to_string()],
            extensions: vec!["hstore".to_string()],
        }
    }
}

impl Postgres {
    pub fn owner_role(&self) -> String {
        match self.spec.master_role.as_deref() {
            Some(role) if !role.is_empty() => role.to_string(),
            _ => format!("{}-group", self.spec.database),
        }
    }

    pub fn reader_role(&self) -> String {
        format!("{}-reader", self.spec.database)
    }

    pub fn writer_role(&self) -> String {
        format!("{}-writer", self.spec.database)
    }

    /// The database this resource stands for: the one created, or the one
    /// it is going to create.
    pub fn database_name(&self) -> &str {
        match self.status.as_ref() {
            Some(status) if !status.db_name.is_empty() => &status.db_name,
            _ => &self.spec.database,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status.as_ref().map(|s| s.succeeded).unwrap_or(false)
    }
}

/// Users referencing a database are garbage collected together with it.
/// The reference is not a controller reference.
impl From<&Postgres> for OwnerReference {
    fn from(p: &Postgres) -> OwnerReference {
        OwnerReference {
            api_version: Postgres::api_version(&()).to_string(),
            block_owner_deletion: None,
            controller: None,
            kind: Postgres::kind(&()).to_string(),
            name: p.name_any(),
            uid: p.uid().unwrap_or_default(),
        }
    }
}

impl Sample for Postgres {
    fn sample() -> Self {
        Postgres::new("sample-self-service-postgres", PostgresSpec::sample())
    }
}
