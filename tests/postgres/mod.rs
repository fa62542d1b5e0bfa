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

use self_service_postgres_operator::config::Config;
use self_service_postgres_operator::postgres::operator::PostgresOperator;

use crate::common::{fake_driver, FakePostgres, FakeStore};

pub struct Harness {
    pub fake: FakePostgres,
    pub store: Arc<FakeStore>,
    pub operator: PostgresOperator<FakeStore>,
}

pub fn harness(config: Config) -> Harness {
    let (fake, driver) = fake_driver(&config);
    let store = Arc::new(FakeStore::new());
    let operator = PostgresOperator::new(Arc::clone(&store), driver, Arc::new(config));
    Harness {
        fake,
        store,
        operator,
    }
}
