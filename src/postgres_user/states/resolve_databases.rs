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
use crate::postgres::Postgres;
use crate::postgres_user::PostgresUser;
use crate::store::ResourceStore;
use crate::utils::matches_instance_annotation;

#[derive(Debug, Clone)]
pub(crate) struct ResolvedDatabase {
    pub resource: Postgres,
    pub database: String,
    pub group: String,
}

/// Looks up every database resource the user refers to. All of them have to
/// exist, be handled by this instance and be ready.
pub(crate) async fn resolve_databases<S>(
    store: &S,
    user: &PostgresUser,
    instance: &str,
) -> Result<Vec<ResolvedDatabase>, Error>
where
    S: ResourceStore<Postgres> + ?Sized,
{
    let namespace = user.namespace().unwrap_or_default();
    if user.spec.databases.is_empty() {
        return Err(Error::Invalid(format!(
            "postgres user {}/{} does not reference any database",
            namespace,
            user.name_any()
        )));
    }

    let mut resolved = Vec::with_capacity(user.spec.databases.len());
    for grant in &user.spec.databases {
        let postgres = store
            .get(&namespace, &grant.database)
            .await?
            .ok_or_else(|| {
                Error::NotReady(format!(
                    "postgres {}/{} does not exist",
                    namespace, grant.database
                ))
            })?;

        if !matches_instance_annotation(postgres.metadata.annotations.as_ref(), instance) {
            return Err(Error::NotManaged(format!(
                "postgres {}/{} is not managed by this operator instance",
                namespace, grant.database
            )));
        }

        let group = match (postgres.is_ready(), grant.privileges.group_role(&postgres)) {
            (true, Some(group)) => group.to_string(),
            _ => {
                return Err(Error::NotReady(format!(
                    "postgres {}/{} is not ready yet",
                    namespace, grant.database
                )))
            }
        };

        resolved.push(ResolvedDatabase {
            database: postgres.database_name().to_string(),
            group,
            resource: postgres,
        });
    }
    Ok(resolved)
}
