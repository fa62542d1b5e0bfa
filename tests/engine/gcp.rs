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

use anyhow::Result;

use self_service_postgres_operator::config::CloudProvider;

use crate::common::{fake_driver, test_config};

const GCP: Option<CloudProvider> = Some(CloudProvider::Gcp);

#[tokio::test]
async fn create_db_grants_the_owner_to_the_operator() -> Result<()> {
    let (fake, driver) = fake_driver(&test_config(GCP));
    fake.fail_on(r#"GRANT "orders-group" TO "operator""#, "0LP01");

    driver.create_db("orders", "orders-group").await?;

    let statements = fake.statements();
    assert_eq!(statements[0], r#"GRANT "orders-group" TO "operator""#);
    assert_eq!(statements[1], r#"CREATE DATABASE "orders""#);
    Ok(())
}

#[tokio::test]
async fn database_owners_are_never_dropped() -> Result<()> {
    let (fake, driver) = fake_driver(&test_config(GCP));
    fake.answer("orders", "orders-group");

    driver.drop_role("orders-group", "operator", "orders").await?;

    assert!(!fake.executed("DROP ROLE"));
    assert!(!fake.executed("REASSIGN OWNED"));
    Ok(())
}

#[tokio::test]
async fn other_roles_are_dropped() -> Result<()> {
    let (fake, driver) = fake_driver(&test_config(GCP));
    fake.answer("orders", "orders-group");

    driver.drop_role("orders-reader", "operator", "orders").await?;

    assert!(fake.executed(r#"REASSIGN OWNED BY "orders-reader" TO "operator""#));
    assert!(fake.executed(r#"DROP ROLE "orders-reader""#));
    Ok(())
}

#[tokio::test]
async fn cloud_sql_roles_are_reserved() -> Result<()> {
    let (fake, driver) = fake_driver(&test_config(GCP));

    for role in ["postgres", "cloudsqlimportexport", "alloydbreplica", "cloudsqlsuperuser"] {
        driver.drop_role(role, "operator", "orders").await?;
    }

    assert!(fake.statements().is_empty());
    Ok(())
}
