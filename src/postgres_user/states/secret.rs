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

use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;

use crate::config::Config;
use crate::error::Error;
use crate::pg::Driver;
use crate::postgres_user::states::create_role::PASSWORD_LENGTH;
use crate::postgres_user::states::CreatedRole;
use crate::postgres_user::{PostgresUser, PostgresUserStatus};
use crate::secret::{new_secret, secret_name, Credentials};
use crate::store::ResourceStore;
use crate::utils::secure_random_string;

/// Creates the credentials secret if it does not exist. The password of a
/// role created in an earlier reconcile is not known anymore, so it is
/// rotated first. An existing secret is left alone.
pub(crate) async fn ensure_secret<S>(
    store: &S,
    driver: &dyn Driver,
    config: &Config,
    user: &PostgresUser,
    status: &mut PostgresUserStatus,
    created: Option<&CreatedRole>,
) -> Result<(), Error>
where
    S: ResourceStore<Secret> + ?Sized,
{
    let namespace = user.namespace().unwrap_or_default();
    let name = secret_name(user, config.keep_secret_name);

    if store.get(&namespace, &name).await?.is_some() {
        debug!("secret {}/{} exists", namespace, name);
        status.succeeded = true;
        return Ok(());
    }

    let password = match created {
        Some(created) => created.password.clone(),
        None => {
            info!(
                "secret {}/{} is missing, rotating password of {}",
                namespace, name, status.postgres_role
            );
            let password = secure_random_string(PASSWORD_LENGTH);
            driver
                .update_password(&status.postgres_role, &password)
                .await?;
            password
        }
    };

    let secret = new_secret(
        user,
        config,
        &Credentials {
            role: &status.postgres_role,
            login: &status.postgres_login,
            password: &password,
            database: &status.database_name,
        },
    )?;

    info!("creating secret {}/{}", namespace, name);
    store.create(&namespace, &secret).await?;
    status.succeeded = true;
    Ok(())
}
