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

mod connector;
mod gcp;

use anyhow::Result;

use self_service_postgres_operator::config::CloudProvider;

use crate::common::{fake_driver, test_config};

const PROVIDERS: [Option<CloudProvider>; 4] = [
    None,
    Some(CloudProvider::Aws),
    Some(CloudProvider::Azure),
    Some(CloudProvider::Gcp),
];

#[tokio::test]
async fn dropping_a_missing_role_succeeds_for_every_provider() -> Result<()> {
    for provider in PROVIDERS {
        let (fake, driver) = fake_driver(&test_config(provider));
        fake.fail_on("\"ghost-abc123\"", "42704");

        driver
            .drop_role("ghost-abc123", "orders-group", "orders")
            .await
            .map_err(|e| anyhow::anyhow!("{:?}: {}", provider, e))?;
    }
    Ok(())
}

#[tokio::test]
async fn reserved_roles_are_never_dropped() -> Result<()> {
    for provider in PROVIDERS {
        let (fake, driver) = fake_driver(&test_config(provider));
        for role in [
            driver.user().to_string(),
            "pg_monitor".to_string(),
            "rds_superuser".to_string(),
            "azure_pg_admin".to_string(),
            "cloudsqlsuperuser".to_string(),
            "alloydbadmin".to_string(),
        ] {
            driver.drop_role(&role, "orders-group", "orders").await?;
        }
        assert!(
            !fake.executed("DROP ROLE"),
            "{:?} dropped a reserved role: {:?}",
            provider,
            fake.statements()
        );
        assert!(!fake.executed("REASSIGN OWNED"));
    }
    Ok(())
}

#[tokio::test]
async fn per_database_sessions_are_closed_after_errors() -> Result<()> {
    for provider in PROVIDERS {
        let (fake, driver) = fake_driver(&test_config(provider));
        fake.fail_on("REASSIGN OWNED", "42501");
        fake.fail_on("CREATE EXTENSION", "0A000");

        assert!(driver.drop_role("app-abc123", "orders-group", "orders").await.is_err());
        assert!(driver.create_extension("orders", "broken").await.is_err());

        assert_eq!(fake.open_sessions("orders"), 0, "{:?}", provider);
    }
    Ok(())
}
