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

use crate::pg::sql::{
    FUNCTION_PRIVILEGES, READER_PRIVILEGES, READER_SEQUENCE_PRIVILEGES, WRITER_PRIVILEGES,
    WRITER_SEQUENCE_PRIVILEGES,
};
use crate::pg::{Driver, SchemaPrivileges, SqlError};
use crate::postgres::{Postgres, PostgresStatus};

/// Creates every schema not yet in the status, owned by the owner role, and
/// grants reader and writer access to it.
pub(crate) async fn apply_schemas(
    driver: &dyn Driver,
    postgres: &Postgres,
    status: &mut PostgresStatus,
) {
    for schema in &postgres.spec.schemas {
        if status.has_schema(schema) {
            continue;
        }

        info!("creating schema {} in {}", schema, status.db_name);
        match apply_schema(driver, status, schema).await {
            Ok(()) => status.schemas.push(schema.clone()),
            Err(e) => warn!(
                "could not set up schema {} in {}: {}",
                schema, status.db_name, e
            ),
        }
    }
}

async fn apply_schema(
    driver: &dyn Driver,
    status: &PostgresStatus,
    schema: &str,
) -> Result<(), SqlError> {
    let database = status.db_name.as_str();
    let owner = status.roles.owner.as_str();

    driver.create_schema(database, owner, schema).await?;

    driver
        .set_schema_privileges(&SchemaPrivileges {
            database,
            schema,
            role: &status.roles.reader,
            creator: Some(owner),
            table_privileges: READER_PRIVILEGES,
            sequence_privileges: Some(READER_SEQUENCE_PRIVILEGES),
            function_privileges: Some(FUNCTION_PRIVILEGES),
            grant_create: false,
        })
        .await?;

    driver
        .set_schema_privileges(&SchemaPrivileges {
            database,
            schema,
            role: &status.roles.writer,
            creator: Some(owner),
            table_privileges: WRITER_PRIVILEGES,
            sequence_privileges: Some(WRITER_SEQUENCE_PRIVILEGES),
            function_privileges: Some(FUNCTION_PRIVILEGES),
            grant_create: false,
        })
        .await
}
