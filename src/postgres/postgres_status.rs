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

pub use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostgresRoles {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub reader: String,
    #[serde(default)]
    pub writer: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[doc = "Reflects the status of the current self service postgres database"]
pub struct PostgresStatus {
    #[serde(default)]
    pub succeeded: bool,
    #[serde(default)]
    pub db_name: String,
    #[serde(default)]
    pub roles: PostgresRoles,
    /// schemas applied so far; entries are never removed
    #[serde(default)]
    pub schemas: Vec<String>,
    /// extensions applied so far; entries are never removed
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl PostgresStatus {
    pub fn json_patch(&self) -> serde_json::Value {
        debug!("json_patch called {:?}", self);
        // summary is always sent so that a merge patch clears an old error
        serde_json::json!({
            "status": {
                "succeeded": self.succeeded,
                "dbName": self.db_name,
                "roles": self.roles,
                "schemas": self.schemas,
                "extensions": self.extensions,
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

    pub(crate) fn has_schema(&self, schema: &str) -> bool {
        self.schemas.iter().any(|s| s == schema)
    }

    pub(crate) fn has_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }
}
