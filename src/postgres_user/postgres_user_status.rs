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

pub use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[doc = "Reflects the status of the current self service postgres user"]
pub struct PostgresUserStatus {
    #[serde(default)]
    pub succeeded: bool,
    /// generated role, `<spec.role>-<suffix>`
    #[serde(default)]
    pub postgres_role: String,
    /// what clients log in with; differs from the role on Azure single server
    #[serde(default)]
    pub postgres_login: String,
    /// database name -> group role granted to the login
    #[serde(default)]
    pub grants: BTreeMap<String, String>,
    /// the first granted database, used in the connection strings
    #[serde(default)]
    pub database_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl PostgresUserStatus {
    pub fn json_patch(&self) -> serde_json::Value {
        debug!("json_patch called {:?}", self);
        serde_json::json!({
            "status": {
                "succeeded": self.succeeded,
                "postgresRole": self.postgres_role,
                "postgresLogin": self.postgres_login,
                "grants": self.grants,
                "databaseName": self.database_name,
                "summary": self.summary,
            }
        })
    }

    pub fn failed(&mut self, e: &str) {
        self.succeeded = false;
        self.set_error(e);
    }

    pub fn set_error(&mut self, e: &str) {
        self.summary = Some(crate::utils::shorten_string(&format!("error: {}", e)));
    }
}
