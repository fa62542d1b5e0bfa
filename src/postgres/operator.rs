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
use std::time::Duration;

use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Controller};
use kube_runtime::watcher;

use crate::config::Config;
use crate::error::Error;
use crate::pg::Driver;
use crate::postgres::states::{apply_extensions, apply_schemas, create_database, release};
use crate::postgres::{Postgres, PostgresStatus};
use crate::store::{KubeStore, ResourceStore};
use crate::utils::{
    finalizers_with_ours, finalizers_without_ours, has_finalizer, matches_instance_annotation,
};

pub const RESYNC_PERIOD: Duration = Duration::from_secs(300);
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

pub struct PostgresOperator<S> {
    store: Arc<S>,
    driver: Arc<dyn Driver>,
    config: Arc<Config>,
}

impl<S> PostgresOperator<S>
where
    S: ResourceStore<Postgres>,
{
    pub fn new(store: Arc<S>, driver: Arc<dyn Driver>, config: Arc<Config>) -> Self {
        PostgresOperator {
            store,
            driver,
            config,
        }
    }

    /// One pass for the resource `namespace/name`. Safe to repeat; the
    /// status records which steps are done.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let postgres = match self.store.get(namespace, name).await? {
            Some(postgres) => postgres,
            None => {
                debug!("postgres {}/{} is gone", namespace, name);
                return Ok(());
            }
        };

        if !matches_instance_annotation(
            postgres.metadata.annotations.as_ref(),
            &self.config.instance_filter,
        ) {
            debug!(
                "postgres {}/{} belongs to another operator instance",
                namespace, name
            );
            return Ok(());
        }

        let before = postgres.status.clone().unwrap_or_default();
        let mut status = before.clone();

        if postgres.metadata.deletion_timestamp.is_some() {
            if !has_finalizer(&postgres.metadata) {
                return Ok(());
            }
            info!("postgres {}/{} was deleted", namespace, name);

            let released = release(
                self.store.as_ref(),
                self.driver.as_ref(),
                &postgres,
                &mut status,
            )
            .await;
            if let Err(e) = &released {
                error!("cleanup of postgres {}/{} failed: {}", namespace, name, e);
                status.set_error(&e.to_string());
            }
            if let Err(e) = self.patch_status(namespace, name, &before, &status).await {
                warn!("could not update status of postgres {}/{}: {}", namespace, name, e);
            }
            released?;

            let patch = serde_json::json!({
                "metadata": { "finalizers": finalizers_without_ours(&postgres.metadata) }
            });
            self.store.patch_metadata(namespace, name, &patch).await?;
            return Ok(());
        }

        info!("reconciling postgres {}/{}", namespace, name);
        let converged = self.converge(&postgres, &mut status).await;
        match &converged {
            Ok(()) => status.summary = None,
            Err(e) => {
                error!("reconciling postgres {}/{} failed: {}", namespace, name, e);
                status.failed(&e.to_string());
            }
        }
        let patched = self.patch_status(namespace, name, &before, &status).await;
        converged?;
        patched?;

        if !has_finalizer(&postgres.metadata) {
            let patch = serde_json::json!({
                "metadata": { "finalizers": finalizers_with_ours(&postgres.metadata) }
            });
            self.store.patch_metadata(namespace, name, &patch).await?;
        }

        debug!("postgres {}/{} reconciled", namespace, name);
        Ok(())
    }

    async fn converge(&self, postgres: &Postgres, status: &mut PostgresStatus) -> Result<(), Error> {
        let driver = self.driver.as_ref();
        if !status.succeeded {
            create_database(driver, postgres, status).await?;
        }
        apply_extensions(driver, postgres, status).await;
        apply_schemas(driver, postgres, status).await;
        Ok(())
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        before: &PostgresStatus,
        status: &PostgresStatus,
    ) -> Result<(), Error> {
        if before == status {
            return Ok(());
        }
        self.store
            .patch_status(namespace, name, &status.json_patch())
            .await?;
        Ok(())
    }
}

impl PostgresOperator<KubeStore> {
    /// Watches all postgres resources until the stream ends.
    pub async fn run(self) {
        let api: Api<Postgres> = Api::all(self.store.client());
        Controller::new(api, watcher::Config::default())
            .run(reconcile, error_policy, Arc::new(self))
            .for_each(|result| async move {
                match result {
                    Ok((object, _)) => debug!("reconciled {}", object),
                    Err(e) => warn!("postgres controller: {}", e),
                }
            })
            .await;
    }
}

async fn reconcile(
    postgres: Arc<Postgres>,
    operator: Arc<PostgresOperator<KubeStore>>,
) -> Result<Action, Error> {
    let namespace = postgres.namespace().unwrap_or_default();
    operator.reconcile(&namespace, &postgres.name_any()).await?;
    Ok(Action::requeue(RESYNC_PERIOD))
}

fn error_policy(
    postgres: Arc<Postgres>,
    error: &Error,
    _operator: Arc<PostgresOperator<KubeStore>>,
) -> Action {
    warn!(
        "retrying postgres {} in {:?}: {}",
        postgres.name_any(),
        RETRY_DELAY,
        error
    );
    Action::requeue(RETRY_DELAY)
}
