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

use kube::ResourceExt;

use crate::error::Error;
use crate::pg::Driver;
use crate::postgres::Postgres;
use crate::postgres_user::{PostgresUser, PostgresUserStatus};
use crate::store::ResourceStore;

/// Drops the login role. Whatever it owns in a granted database goes back to
/// the group it was granted; for databases whose resource is gone the
/// default database is used instead.
///
/// REASSIGN OWNED moves everything the role owns in a database at once, so
/// the default database gets a single new owner: the first fallback group in
/// database order.
pub(crate) async fn release<S>(
    store: &S,
    driver: &dyn Driver,
    user: &PostgresUser,
    status: &PostgresUserStatus,
) -> Result<(), Error>
where
    S: ResourceStore<Postgres> + ?Sized,
{
    if status.postgres_role.is_empty() {
        debug!("postgres user {} never created a role", user.name_any());
        return Ok(());
    }

    let namespace = user.namespace();
    let claimed: Vec<String> = store
        .list()
        .await?
        .iter()
        .filter(|p| p.namespace() == namespace)
        .map(|p| p.database_name().to_string())
        .collect();

    let mut owners = BTreeMap::new();
    for (db, group) in &status.grants {
        if claimed.contains(db) {
            owners.insert(db.clone(), group.clone());
        } else {
            let fallback = owners
                .entry(driver.default_database().to_string())
                .or_insert_with(|| group.clone())
                .clone();
            if fallback == *group {
                info!(
                    "database resource for {} is gone, reassigning in {} to {}",
                    db,
                    driver.default_database(),
                    group
                );
            } else {
                info!(
                    "database resource for {} is gone, objects in {} already go to {} instead of {}",
                    db,
                    driver.default_database(),
                    fallback,
                    group
                );
            }
        }
    }
    if owners.is_empty() {
        owners.insert(
            driver.default_database().to_string(),
            driver.user().to_string(),
        );
    }

    info!("dropping login role {}", status.postgres_role);
    driver
        .drop_role_multi(&status.postgres_role, &owners)
        .await?;
    Ok(())
}
