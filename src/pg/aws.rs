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

use crate::pg::escalate::{join_role, leave_role, with_login_role, Membership};
use crate::pg::executor::{Condition, SqlError};
use crate::pg::{is_reserved_role, Driver, SchemaPrivileges};

/// RDS: the master login is no superuser, so it has to be a member of a role
/// before it may hand over ownership, change its settings or drop it.
pub struct AwsDriver {
    inner: Box<dyn Driver>,
}

impl AwsDriver {
    pub fn new(inner: Box<dyn Driver>) -> Self {
        AwsDriver { inner }
    }

    /// Grants `role` to the operator without revoking it afterwards.
    async fn join_persistently(&self, role: &str) -> Result<(), SqlError> {
        if role == self.user() {
            return Ok(());
        }
        self.inner.grant_role(role, self.user()).await
    }
}

#[async_trait]
impl Driver for AwsDriver {
    fn user(&self) -> &str {
        self.inner.user()
    }

    fn default_database(&self) -> &str {
        self.inner.default_database()
    }

    async fn create_db(&self, db: &str, owner: &str) -> Result<(), SqlError> {
        // membership in the owner role stays, the operator keeps managing it
        self.join_persistently(owner).await?;
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
        self.inner.create_user_role(role, password).await
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
        self.inner.is_member(role, member).await
    }

    async fn alter_database_owner(&self, db: &str, owner: &str) -> Result<(), SqlError> {
        if owner.is_empty() {
            return Ok(());
        }
        self.join_persistently(owner).await?;
        self.inner.alter_database_owner(db, owner).await
    }

    async fn alter_default_login_role(&self, login: &str, group: &str) -> Result<(), SqlError> {
        with_login_role(self.inner.as_ref(), login, Some(group)).await
    }

    async fn reset_default_login_role(&self, login: &str) -> Result<(), SqlError> {
        with_login_role(self.inner.as_ref(), login, None).await
    }

    async fn set_schema_privileges(
        &self,
        privileges: &SchemaPrivileges<'_>,
    ) -> Result<(), SqlError> {
        // ALTER DEFAULT PRIVILEGES FOR ROLE needs membership in that role
        if let Some(creator) = privileges.creator {
            self.join_persistently(creator).await?;
        }
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
        if is_reserved_role(role, self.user()) {
            info!("refusing to drop reserved role {}", role);
            return Ok(());
        }

        let inner = self.inner.as_ref();
        let membership = join_role(inner, role).await?;
        if membership == Membership::Missing {
            info!("role {} does not exist, nothing to drop", role);
            return Ok(());
        }

        // REASSIGN OWNED needs membership in the receiving roles as well
        let mut reassign_to = BTreeMap::new();
        for (db, new_owner) in owners {
            let new_owner = match self.join_persistently(new_owner).await {
                Ok(()) => new_owner.clone(),
                Err(e) if e.is(Condition::UndefinedObject) => {
                    info!(
                        "role {} does not exist anymore, reassigning objects of {} in {} to {}",
                        new_owner,
                        role,
                        db,
                        self.user()
                    );
                    self.user().to_string()
                }
                Err(e) => {
                    leave_role(inner, role, membership).await;
                    return Err(e);
                }
            };
            reassign_to.insert(db.clone(), new_owner);
        }

        let result = inner.drop_role_multi(role, &reassign_to).await;
        if result.is_err() {
            // on success the membership is gone together with the role
            leave_role(inner, role, membership).await;
        }
        result
    }

    async fn drop_database(&self, db: &str) -> Result<(), SqlError> {
        self.inner.drop_database(db).await
    }
}
