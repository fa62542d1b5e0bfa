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
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::pg::executor::{Condition, Connector, Session, SqlError, Tolerate};
use crate::pg::sql::{self, ObjectKind};
use crate::pg::{is_reserved_role, Driver, SchemaPrivileges};

/// Plain postgres: one administrative session against the default database
/// plus short lived sessions for statements that need a specific database.
pub struct BaseDriver {
    connector: Arc<dyn Connector>,
    admin: Mutex<Option<Arc<dyn Session>>>,
    user: String,
    default_database: String,
}

impl BaseDriver {
    pub fn new(connector: Arc<dyn Connector>, user: &str, default_database: &str) -> Self {
        BaseDriver {
            connector,
            admin: Mutex::new(None),
            user: user.to_string(),
            default_database: default_database.to_string(),
        }
    }

    /// The administrative session, reconnected if the server closed it.
    async fn admin(&self) -> Result<Arc<dyn Session>, SqlError> {
        let mut admin = self.admin.lock().await;
        if let Some(session) = admin.as_ref() {
            if !session.is_closed() {
                return Ok(Arc::clone(session));
            }
            info!("administrative connection was closed, reconnecting");
        }

        let session: Arc<dyn Session> =
            Arc::from(self.connector.connect(&self.default_database).await?);
        *admin = Some(Arc::clone(&session));
        Ok(session)
    }

    async fn exec(&self, statement: &str) -> Result<(), SqlError> {
        debug!("{}", sql::redact(statement));
        self.admin().await?.execute(statement).await
    }

    async fn exec_in(&self, session: &dyn Session, db: &str, statement: &str) -> Result<(), SqlError> {
        debug!("[{}] {}", db, sql::redact(statement));
        session.execute(statement).await
    }

    async fn grant_to_operator(&self, role: &str) -> Result<(), SqlError> {
        if role == self.user {
            return Ok(());
        }
        self.exec(&sql::grant_role(role, &self.user))
            .await
            .tolerate(&[Condition::AlreadyMember])
    }

    async fn drop_owned_in(&self, role: &str, db: &str, new_owner: &str) -> Result<(), SqlError> {
        // REASSIGN OWNED only sees objects of the database the session is connected to
        let session = match self.connector.connect(db).await {
            Ok(session) => session,
            Err(e) if e.is(Condition::InvalidCatalogName) => {
                info!("database {} does not exist anymore, nothing to reassign for {}", db, role);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        self.exec_in(session.as_ref(), db, &sql::reassign_owned(role, new_owner))
            .await
            .tolerate(&[Condition::UndefinedObject])?;
        self.exec_in(session.as_ref(), db, &sql::drop_owned(role))
            .await
            .tolerate(&[Condition::UndefinedObject])
    }
}

#[async_trait]
impl Driver for BaseDriver {
    fn user(&self) -> &str {
        &self.user
    }

    fn default_database(&self) -> &str {
        &self.default_database
    }

    async fn create_db(&self, db: &str, owner: &str) -> Result<(), SqlError> {
        self.exec(&sql::create_database(db))
            .await
            .tolerate(&[Condition::DuplicateDatabase])?;
        self.alter_database_owner(db, owner).await?;

        for privilege in ["CREATE", "CONNECT"] {
            self.exec(&sql::grant_on_database(privilege, db, &self.user))
                .await?;
            self.exec(&sql::grant_on_database(privilege, db, owner))
                .await?;
        }
        Ok(())
    }

    async fn create_schema(&self, db: &str, owner: &str, schema: &str) -> Result<(), SqlError> {
        let session = self.connector.connect(db).await?;
        self.exec_in(session.as_ref(), db, &sql::create_schema(schema, owner))
            .await
    }

    async fn create_extension(&self, db: &str, extension: &str) -> Result<(), SqlError> {
        let session = self.connector.connect(db).await?;
        self.exec_in(session.as_ref(), db, &sql::create_extension(extension))
            .await
    }

    async fn create_group_role(&self, role: &str) -> Result<(), SqlError> {
        self.exec(&sql::create_group_role(role))
            .await
            .tolerate(&[Condition::DuplicateObject])?;
        self.grant_to_operator(role).await
    }

    async fn create_user_role(&self, role: &str, password: &str) -> Result<String, SqlError> {
        self.exec(&sql::create_login_role(role, password)).await?;
        self.grant_to_operator(role).await?;
        Ok(role.to_string())
    }

    async fn update_password(&self, role: &str, password: &str) -> Result<(), SqlError> {
        self.exec(&sql::alter_password(role, password)).await
    }

    async fn grant_role(&self, role: &str, grantee: &str) -> Result<(), SqlError> {
        self.exec(&sql::grant_role(role, grantee))
            .await
            .tolerate(&[Condition::AlreadyMember])
    }

    async fn revoke_role(&self, role: &str, revoked: &str) -> Result<(), SqlError> {
        self.exec(&sql::revoke_role(role, revoked)).await
    }

    async fn is_member(&self, role: &str, member: &str) -> Result<bool, SqlError> {
        debug!("{} [{},{}]", sql::ROLE_MEMBERSHIP, role, member);
        let found = self
            .admin()
            .await?
            .query_string(sql::ROLE_MEMBERSHIP, &[role, member])
            .await?;
        Ok(found.is_some())
    }

    async fn alter_database_owner(&self, db: &str, owner: &str) -> Result<(), SqlError> {
        if owner.is_empty() {
            return Ok(());
        }
        self.exec(&sql::alter_database_owner(db, owner)).await
    }

    async fn alter_default_login_role(&self, login: &str, group: &str) -> Result<(), SqlError> {
        self.exec(&sql::set_default_role(login, group)).await
    }

    async fn reset_default_login_role(&self, login: &str) -> Result<(), SqlError> {
        self.exec(&sql::reset_default_role(login)).await
    }

    async fn set_schema_privileges(
        &self,
        privileges: &SchemaPrivileges<'_>,
    ) -> Result<(), SqlError> {
        let SchemaPrivileges {
            database,
            schema,
            role,
            creator,
            ..
        } = *privileges;
        let session = self.connector.connect(database).await?;
        let session = session.as_ref();

        self.exec_in(session, database, &sql::grant_usage_on_schema(schema, role))
            .await?;

        let kinds = [
            (ObjectKind::Tables, Some(privileges.table_privileges)),
            (ObjectKind::Sequences, privileges.sequence_privileges),
            (ObjectKind::Functions, privileges.function_privileges),
        ];
        for (kind, privs) in kinds {
            let privs = match privs {
                Some(privs) => privs,
                None => continue,
            };
            // existing objects and future objects need separate grants
            self.exec_in(session, database, &sql::grant_on_all(privs, kind, schema, role))
                .await?;
            self.exec_in(
                session,
                database,
                &sql::alter_default_privileges(creator, schema, privs, kind, role),
            )
            .await?;
        }

        if privileges.grant_create {
            self.exec_in(session, database, &sql::grant_create_on_schema(schema, role))
                .await?;
        }
        Ok(())
    }

    async fn database_owner(&self, db: &str) -> Result<Option<String>, SqlError> {
        debug!("{} [{}]", sql::DATABASE_OWNER, db);
        self.admin()
            .await?
            .query_string(sql::DATABASE_OWNER, &[db])
            .await
    }

    async fn drop_role_multi(
        &self,
        role: &str,
        owners: &BTreeMap<String, String>,
    ) -> Result<(), SqlError> {
        if is_reserved_role(role, &self.user) {
            info!("refusing to drop reserved role {}", role);
            return Ok(());
        }

        for (db, new_owner) in owners {
            self.drop_owned_in(role, db, new_owner).await?;
        }

        self.exec(&sql::drop_role(role))
            .await
            .tolerate(&[Condition::UndefinedObject])
    }

    async fn drop_database(&self, db: &str) -> Result<(), SqlError> {
        self.exec(&sql::revoke_connect_from_public(db))
            .await
            .tolerate(&[Condition::InvalidCatalogName])?;

        debug!("{} [{}]", sql::TERMINATE_BACKENDS, db);
        self.admin()
            .await?
            .execute_with(sql::TERMINATE_BACKENDS, &[db])
            .await
            .tolerate(&[Condition::InvalidCatalogName])?;

        match self.exec(&sql::drop_database_force(db)).await {
            Err(e) if e.is(Condition::SyntaxError) => {
                debug!("server does not support DROP DATABASE ... WITH (FORCE), retrying without");
                self.exec(&sql::drop_database(db))
                    .await
                    .tolerate(&[Condition::InvalidCatalogName])?;
            }
            result => result.tolerate(&[Condition::InvalidCatalogName])?,
        }

        info!("dropped database {}", db);
        Ok(())
    }
}
