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

use anyhow::Result;
use k8s_openapi::api::core::v1::Secret;

use self_service_postgres_operator::config::Config;
use self_service_postgres_operator::postgres::operator::PostgresOperator;
use self_service_postgres_operator::postgres_user::operator::PostgresUserOperator;

use crate::common::{fake_driver, postgres, FakePostgres, FakeStore, NAMESPACE};

pub struct Harness {
    pub fake: FakePostgres,
    pub store: Arc<FakeStore>,
    pub databases: PostgresOperator<FakeStore>,
    pub users: PostgresUserOperator<FakeStore>,
}

/// Both controllers on one store and server, with `databases` already
/// reconciled.
pub async fn harness(config: Config, databases: &[&str]) -> Result<Harness> {
    let (fake, driver) = fake_driver(&config);
    let store = Arc::new(FakeStore::new());
    let config = Arc::new(config);
    let h = Harness {
        fake,
        databases: PostgresOperator::new(Arc::clone(&store), Arc::clone(&driver), Arc::clone(&config)),
        users: PostgresUserOperator::new(Arc::clone(&store), driver, config),
        store,
    };

    for db in databases {
        h.store.insert(&postgres(db, db));
        h.databases.reconcile(NAMESPACE, db).await?;
    }
    h.fake.clear();
    Ok(h)
}

pub fn secret_value(secret: &Secret, key: &str) -> String {
    let data = secret.data.as_ref().unwrap();
    let value = data
        .get(key)
        .unwrap_or_else(|| panic!("secret has no key {}", key));
    String::from_utf8(value.0.clone()).unwrap()
}
