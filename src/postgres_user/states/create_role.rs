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

use crate::error::Error;
use crate::pg::Driver;
use crate::postgres_user::{PostgresUser, PostgresUserStatus};
use crate::utils::{random_string, secure_random_string};

pub(crate) const ROLE_SUFFIX_LENGTH: usize = 6;
pub(crate) const PASSWORD_LENGTH: usize = 15;

/// A login role created during this reconcile, together with its password.
pub(crate) struct CreatedRole {
    pub password: String,
}

/// Creates the login role unless the status already names one.
pub(crate) async fn create_role(
    driver: &dyn Driver,
    user: &PostgresUser,
    status: &mut PostgresUserStatus,
) -> Result<Option<CreatedRole>, Error> {
    if !status.postgres_role.is_empty() {
        return Ok(None);
    }
    if user.spec.role.is_empty() {
        return Err(Error::Invalid("spec.role must not be empty".to_string()));
    }

    let role = format!("{}-{}", user.spec.role, random_string(ROLE_SUFFIX_LENGTH));
    let password = secure_random_string(PASSWORD_LENGTH);

    info!("creating login role {}", role);
    let login = driver.create_user_role(&role, &password).await?;

    status.postgres_role = role;
    status.postgres_login = login;
    Ok(Some(CreatedRole { password }))
}
