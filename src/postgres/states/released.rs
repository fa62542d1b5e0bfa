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

use kube::ResourceExt;

use crate::error::Error;
use crate::pg::Driver;
use crate::postgres::{Postgres, PostgresStatus};
use crate::store::ResourceStore;

/// Roles and database are only dropped if the resource asks for it, got as
/// far as creating them, and no other resource claims the same database.
async fn should_drop<S>(store: &S, postgres: &Postgres) -> Result<bool, Error>
where
    S: ResourceStore<Postgres> + ?Sized,
{
    if !postgres.spec.drop_on_delete || !postgres.is_ready() {
        return Ok(false);
    }

    let db = postgres.database_name();
    for other in store.list().await? {
        if other.name_any() == postgres.name_any() && other.namespace() == postgres.namespace() {
            continue;
        }
        if other.database_name() == db {
            info!(
                "database {} is still claimed by {}/{}, not dropping it",
                db,
                other.namespace().unwrap_or_default(),
                other.name_any()
            );
            return Ok(false);
        }
    }
    Ok(true)
}

/// Cleanup when a database resource was deleted. Every dropped role is
/// cleared from `status` right away, so a retry only handles what is left.
pub(crate) async fn release<S>(
    store: &S,
    driver: &dyn Driver,
    postgres: &Postgres,
    status: &mut PostgresStatus,
) -> Result<(), Error>
where
    S: ResourceStore<Postgres> + ?Sized,
{
    if !should_drop(store, postgres).await? {
        info!(
            "releasing {} without dropping database {}",
            postgres.name_any(),
            postgres.database_name()
        );
        return Ok(());
    }

    let db = postgres.database_name().to_string();
    for role in [
        &mut status.roles.owner,
        &mut status.roles.reader,
        &mut status.roles.writer,
    ] {
        if role.is_empty() {
            continue;
        }
        info!("dropping role {}", role);
        driver.drop_role(role, driver.user(), &db).await?;
        role.clear();
    }

    info!("dropping database {}", db);
    driver.drop_database(&db).await?;
    Ok(())
}
