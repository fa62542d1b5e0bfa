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

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Controller};
use kube_runtime::watcher;

use crate::config::Config;
use crate::error::Error;
use crate::pg::Driver;
use crate::postgres::operator::{RESYNC_PERIOD, RETRY_DELAY};
use crate::postgres::Postgres;
use crate::postgres_user::states::{
    create_role, ensure_secret, grant_databases, release, resolve_databases,
};
use crate::postgres_user::{PostgresUser, PostgresUserStatus};
use crate::store::{KubeStore, ResourceStore};
use crate::utils::{
    finalizers_with_ours, finalizers_without_ours, has_finalizer, matches_instance_annotation,
};

pub struct PostgresUserOperator<S> {
    store: Arc<S>,
    driver: Arc<dyn Driver>,
    config: Arc<Config>,
}

impl<S> PostgresUserOperator<S>
where
    S: ResourceStore<PostgresUser> + ResourceStore<Postgres> + ResourceStore<Secret>,
{
    pub fn new(store: Arc<S>, driver: Arc<dyn Driver>, config: Arc<Config>) -> Self {
        PostgresUserOperator {
            store,
            driver,
            config,
        }
    }

    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let user = match ResourceStore::<PostgresUser>::get(self.store.as_ref(), namespace, name)
            .await?
        {
            Some(user) => user,
            None => {
                debug!("postgres user {}/{} is gone", namespace, name);
                return Ok(());
            }
        };

        if !matches_instance_annotation(
            user.metadata.annotations.as_ref(),
            &self.config.instance_filter,
        ) {
            debug!(
                "postgres user {}/{} belongs to another operator instance",
                namespace, name
            );
            return Ok(());
        }

        let before = user.status.clone().unwrap_or_default();
        let mut status = before.clone();

        if user.metadata.deletion_timestamp.is_some() {
            if !has_finalizer(&user.metadata) {
                return Ok(());
            }
            info!("postgres user {}/{} was deleted", namespace, name);

            let released = release(self.store.as_ref(), self.driver.as_ref(), &user, &status).await;
            if let Err(e) = &released {
                error!("cleanup of postgres user {}/{} failed: {}", namespace, name, e);
                status.set_error(&e.to_string());
                if let Err(e) = self.patch_status(namespace, name, &before, &status).await {
                    warn!(
                        "could not update status of postgres user {}/{}: {}",
                        namespace, name, e
                    );
                }
            }
            released?;

            let patch = serde_json::json!({
                "metadata": { "finalizers": finalizers_without_ours(&user.metadata) }
            });
            ResourceStore::<PostgresUser>::patch_metadata(self.store.as_ref(), namespace, name, &patch)
                .await?;
            return Ok(());
        }

        info!("reconciling postgres user {}/{}", namespace, name);
        let converged = self.converge(&user, &mut status).await;
        match &converged {
            Ok(()) => status.summary = None,
            Err(e) => {
                error!("reconciling postgres user {}/{} failed: {}", namespace, name, e);
                status.failed(&e.to_string());
            }
        }
        let patched = self.patch_status(namespace, name, &before, &status).await;
        converged?;
        patched?;

        debug!("postgres user {}/{} reconciled", namespace, name);
        Ok(())
    }

    async fn converge(&self, user: &PostgresUser, status: &mut PostgresUserStatus) -> Result<(), Error> {
        let namespace = user.namespace().unwrap_or_default();
        let name = user.name_any();
        let driver = self.driver.as_ref();

        let databases =
            resolve_databases(self.store.as_ref(), user, &self.config.instance_filter).await?;

        let created = create_role(driver, user, status).await?;
        if created.is_some() {
            // without this record the role would be orphaned by a later failure
            ResourceStore::<PostgresUser>::patch_status(
                self.store.as_ref(),
                &namespace,
                &name,
                &status.json_patch(),
            )
            .await?;
        }

        if let Some(first) = databases.first() {
            status.database_name = first.database.clone();
        }
        grant_databases(driver, &databases, status).await?;

        if let Some(first) = databases.first() {
            self.add_owner_reference_and_finalizer(user, &first.resource)
                .await?;
        }

        ensure_secret(
            self.store.as_ref(),
            driver,
            &self.config,
            user,
            status,
            created.as_ref(),
        )
        .await
    }

    async fn add_owner_reference_and_finalizer(
        &self,
        user: &PostgresUser,
        postgres: &Postgres,
    ) -> Result<(), Error> {
        let owner = OwnerReference::from(postgres);
        let mut owner_references = user.metadata.owner_references.clone().unwrap_or_default();
        let owned = owner_references
            .iter()
            .any(|r| r.kind == owner.kind && r.name == owner.name && r.uid == owner.uid);

        if owned && has_finalizer(&user.metadata) {
            return Ok(());
        }
        if !owned {
            owner_references.push(owner);
        }

        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers_with_ours(&user.metadata),
                "ownerReferences": owner_references,
            }
        });
        ResourceStore::<PostgresUser>::patch_metadata(
            self.store.as_ref(),
            &user.namespace().unwrap_or_default(),
            &user.name_any(),
            &patch,
        )
        .await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        before: &PostgresUserStatus,
        status: &PostgresUserStatus,
    ) -> Result<(), Error> {
        if before == status {
            return Ok(());
        }
        ResourceStore::<PostgresUser>::patch_status(
            self.store.as_ref(),
            namespace,
            name,
            &status.json_patch(),
        )
        .await?;
        Ok(())
    }
}

impl PostgresUserOperator<KubeStore> {
    /// Watches all postgres users and the secrets they own until the stream ends.
    pub async fn run(self) {
        let client = self.store.client();
        Controller::new(Api::<PostgresUser>::all(client.clone()), watcher::Config::default())
            .owns(Api::<Secret>::all(client), watcher::Config::default())
            .run(reconcile, error_policy, Arc::new(self))
            .for_each(|result| async move {
                match result {
                    Ok((object, _)) => debug!("reconciled {}", object),
                    Err(e) => warn!("postgres user controller: {}", e),
                }
            })
            .await;
    }
}

async fn reconcile(
    user: Arc<PostgresUser>,
    operator: Arc<PostgresUserOperator<KubeStore>>,
) -> Result<Action, Error> {
    let namespace = user.namespace().unwrap_or_default();
    operator.reconcile(&namespace, &user.name_any()).await?;
    Ok(Action::requeue(RESYNC_PERIOD))
}

fn error_policy(
    user: Arc<PostgresUser>,
    error: &Error,
    _operator: Arc<PostgresUserOperator<KubeStore>>,
) -> Action {
    warn!(
        "retrying postgres user {} in {:?}: {}",
        user.name_any(),
        RETRY_DELAY,
        error
    );
    Action::requeue(RETRY_DELAY)
}
