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
use crate::postgres::{Postgres, PostgresRoles, PostgresStatus};

/// Creates owner role, database, reader and writer role. Roles and database
/// name are only written to the status once all of them exist.
pub(crate) async fn create_database(
    driver: &dyn Driver,
    postgres: &Postgres,
    status: &mut PostgresStatus,
) -> Result<(), Error> {
    let db = postgres.spec.database.as_str();
    if db.is_empty() {
        return Err(Error::Invalid("spec.database must not be empty".to_string()));
    }

    let owner = postgres.owner_role();
    info!("creating database {} owned by {}", db, owner);
    driver.create_group_role(&owner).await?;
    driver.create_db(db, &owner).await?;

    let reader = postgres.reader_role();
    driver.create_group_role(&reader).await?;

    let writer = postgres.writer_role();
    driver.create_group_role(&writer).await?;

    status.db_name = db.to_string();
    status.roles = PostgresRoles {
        owner,
        reader,
        writer,
    };
    status.succeeded = true;
    Ok(())
}
