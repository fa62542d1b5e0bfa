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

use async_trait::async_trait;

use crate::pg::executor::SqlError;
use crate::pg::{Driver, SchemaPrivileges};

/// Azure Database for PostgreSQL. Single server logins carry a `@<server>`
/// suffix which the flexible server does not know about.
pub struct AzureDriver {
    inner: Box<dyn Driver>,
    server: Option<String>,
}

impl AzureDriver {
    /// `login` is the administrative login, `role@server` on single servers.
    pub fn new(inner: Box<dyn Driver>, login: &str) -> Self {
        let server = login
            .split_once('@')
            .map(|(_, server)| server.to_string())
            .filter(|server| !server.is_empty());
        AzureDriver { inner, server }
    }

    pub fn is_single_server(&self) -> bool {
        self.server.is_some()
    }

    fn strip_server<'a>(&self, role: &'a str) -> &'a str {
        match (&self.server, role.split_once('@')) {
            (Some(_), Some((role, _))) => role,
            _ => role,
        }
    }
}

#[async_trait]
impl Driver for AzureDriver {
    fn user(&self) -> &str {
        self.inner.user()
    }

    fn default_database(&self) -> &str {
        self.inner.default_database()
    }

    async fn create_db(&self, db: &str, owner: &str) -> Result<(), SqlError> {
        self.inner.create_db(db, owner).await
    }

    async fn create_schema(&self, db: &str, owner: &str, schema: &str) -> Result<(), SqlError> {
        self.inner.create_schema(db, owner, schema).await
    }

    async fn create_extension(&self, db: &str, extension: &str) -> Result<(), SqlError> {
        self.inner.create_extension(db, extension).await
    }

    async fn create_group_role(&self, role: &str) -> Result<(), SqlError> {
        self.inner.create_group_role(role).await
    }

    async fn create_user_role(&self, role: &str, password: &str) -> Result<String, SqlError> {
        let login = self.inner.create_user_role(role, password).await?;
        Ok(match &self.server {
            Some(server) => format!("{}@{}", login, server),
            None => login,
        })
    }

    async fn update_password(&self, role: &str, password: &str) -> Result<(), SqlError> {
        self.inner.update_password(role, password).await
    }

    async fn grant_role(&self, role: &str, grantee: &str) -> Result<(), SqlError> {
        self.inner.grant_role(role, grantee).await
    }

    async fn revoke_role(&self, role: &str, revoked: &str) -> Result<(), SqlError> {
        self.inner.revoke_role(role, revoked).await
    }

    async fn is_member(&self, role: &str, member: &str) -> Result<bool, SqlError> {
        self.inner
            .is_member(self.strip_server(role), self.strip_server(member))
            .await
    }

    async fn alter_database_owner(&self, db: &str, owner: &str) -> Result<(), SqlError> {
        self.inner.alter_database_owner(db, owner).await
    }

    async fn alter_default_login_role(&self, login: &str, group: &str) -> Result<(), SqlError> {
        self.inner
            .alter_default_login_role(self.strip_server(login), group)
            .await
    }

    async fn reset_default_login_role(&self, login: &str) -> Result<(), SqlError> {
        self.inner
            .reset_default_login_role(self.strip_server(login))
            .await
    }

    async fn set_schema_privileges(
        &self,
        privileges: &SchemaPrivileges<'_>,
    ) -> Result<(), SqlError> {
        self.inner.set_schema_privileges(privileges).await
    }

    async fn database_owner(&self, db: &str) -> Result<Option<String>, SqlError> {
        self.inner.database_owner(db).await
    }

    async fn drop_role_multi(
        &self,
        role: &str,
        owners: &BTreeMap<String, String>,
    ) -> Result<(), SqlError> {
        let owners: BTreeMap<String, String> = owners
            .iter()
            .map(|(db, owner)| (db.clone(), self.strip_server(owner).to_string()))
            .collect();
        self.inner
            .drop_role_multi(self.strip_server(role), &owners)
            .await
    }

    async fn drop_database(&self, db: &str) -> Result<(), SqlError> {
        self.inner.drop_database(db).await
    }
}
