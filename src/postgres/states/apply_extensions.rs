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

use crate::pg::Driver;
use crate::postgres::{Postgres, PostgresStatus};

/// Creates every extension not yet in the status. A failing extension is
/// logged and retried on the next reconcile.
pub(crate) async fn apply_extensions(
    driver: &dyn Driver,
    postgres: &Postgres,
    status: &mut PostgresStatus,
) {
    for extension in &postgres.spec.extensions {
        if status.has_extension(extension) {
            continue;
        }

        info!("creating extension {} in {}", extension, status.db_name);
        match driver.create_extension(&status.db_name, extension).await {
            Ok(()) => status.extensions.push(extension.clone()),
            Err(e) => warn!(
                "could not create extension {} in {}: {}",
                extension, status.db_name, e
            ),
        }
    }
}
