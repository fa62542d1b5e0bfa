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
use crate::postgres_user::states::ResolvedDatabase;
use crate::postgres_user::PostgresUserStatus;

/// Grants the group role of every database not yet in `status.grants`.
///
/// A login with exactly one grant gets that group as its default session
/// role, so the objects it creates belong to the group. Once a second
/// database is granted the default is reset and the login relies on
/// inherited privileges of all its groups.
pub(crate) async fn grant_databases(
    driver: &dyn Driver,
    databases: &[ResolvedDatabase],
    status: &mut PostgresUserStatus,
) -> Result<(), Error> {
    let role = status.postgres_role.as_str();
    let mut new_grants: Vec<&ResolvedDatabase> = Vec::new();
    for db in databases {
        if !status.grants.contains_key(&db.database)
            && !new_grants.iter().any(|g| g.database == db.database)
        {
            new_grants.push(db);
        }
    }
    if new_grants.is_empty() {
        return Ok(());
    }

    for db in &new_grants {
        info!("granting {} to {}", db.group, role);
        driver.grant_role(&db.group, role).await?;
    }

    // grants are only recorded once the default role matches them
    let granted_before = status.grants.len();
    match (granted_before, granted_before + new_grants.len()) {
        (0, 1) => driver.alter_default_login_role(role, &new_grants[0].group).await?,
        (1, granted) => {
            info!(
                "{} has access to {} databases, resetting its default role",
                role, granted
            );
            driver.reset_default_login_role(role).await?
        }
        _ => {}
    }

    for db in new_grants {
        status
            .grants
            .insert(db.database.clone(), db.group.clone());
    }
    Ok(())
}
