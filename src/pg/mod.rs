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

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{CloudProvider, Config};

pub use aws::AwsDriver;
pub use azure::AzureDriver;
pub use base::BaseDriver;
pub use executor::{
    Condition, Connector, PgConnector, PgSession, Session, SqlError, Tolerate, BENIGN_CONDITIONS,
    CONDITIONS,
};
pub use gcp::GcpDriver;
pub use tls::TlsMode;

mod aws;
mod azure;
mod base;
mod escalate;
pub mod executor;
mod gcp;
pub mod sql;
pub mod tls;

/// Role names that are managed by the platform and must never be dropped.
pub const RESERVED_ROLES: &[&str] = &[
    "rdsadmin",
    "rds_superuser",
    "rdsrepladmin",
    "rds_replication",
    "rds_password",
    "azure_superuser",
    "azure_pg_admin",
    "azuresu",
    "cloudsqlsuperuser",
    "cloudsqladmin",
    "cloudsqlagent",
    "cloudsqliamuser",
    "alloydbadmin",
    "alloydbsuperuser",
];

/// Additional roles refused on Cloud SQL and AlloyDB.
pub const GCP_RESERVED_ROLES: &[&str] = &[
    "postgres",
    "cloudsqlimportexport",
    "cloudsqlreplica",
    "cloudsqlobservability",
    "alloydbreplica",
    "alloydbmetadata",
];

/// True for the operator's own role, built-in `pg_*` roles and [`RESERVED_ROLES`].
pub fn is_reserved_role(role: &str, operator: &str) -> bool {
    role == operator || role.starts_with("pg_") || RESERVED_ROLES.contains(&role)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaPrivileges<'a> {
    pub database: &'a str,
    pub schema: &'a str,
    /// role receiving the privileges
    pub role: &'a str,
    /// role whose future objects the default privileges apply to
    pub creator: Option<&'a str>,
    pub table_privileges: &'a str,
    pub sequence_privileges: Option<&'a str>,
    pub function_privileges: Option<&'a str>,
    pub grant_create: bool,
}

/// Database, role and privilege operations against one postgres server.
///
/// Implemented by [`BaseDriver`] and by the cloud adapters that wrap it.
#[async_trait]
pub trait Driver: Send + Sync {
    /// the role behind the operator's administrative login
    fn user(&self) -> &str;

    fn default_database(&self) -> &str;

    async fn create_db(&self, db: &str, owner: &str) -> Result<(), SqlError>;

    async fn create_schema(&self, db: &str, owner: &str, schema: &str) -> Result<(), SqlError>;

    async fn create_extension(&self, db: &str, extension: &str) -> Result<(), SqlError>;

    async fn create_group_role(&self, role: &str) -> Result<(), SqlError>;

    /// Creates a login role and returns the login string clients have to use.
    async fn create_user_role(&self, role: &str, password: &str) -> Result<String, SqlError>;

    async fn update_password(&self, role: &str, password: &str) -> Result<(), SqlError>;

    async fn grant_role(&self, role: &str, grantee: &str) -> Result<(), SqlError>;

    async fn revoke_role(&self, role: &str, revoked: &str) -> Result<(), SqlError>;

    /// Whether `member` has been granted `role` directly.
    async fn is_member(&self, role: &str, member: &str) -> Result<bool, SqlError>;

    async fn alter_database_owner(&self, db: &str, owner: &str) -> Result<(), SqlError>;

    async fn alter_default_login_role(&self, login: &str, group: &str) -> Result<(), SqlError>;

    async fn reset_default_login_role(&self, login: &str) -> Result<(), SqlError>;

    async fn set_schema_privileges(&self, privileges: &SchemaPrivileges<'_>)
        -> Result<(), SqlError>;

    async fn database_owner(&self, db: &str) -> Result<Option<String>, SqlError>;

    /// Reassigns what `role` owns in every database of `owners` to the mapped
    /// role, drops its remaining privileges there and finally drops the role.
    async fn drop_role_multi(
        &self,
        role: &str,
        owners: &BTreeMap<String, String>,
    ) -> Result<(), SqlError>;

    async fn drop_role(&self, role: &str, new_owner: &str, database: &str) -> Result<(), SqlError> {
        let mut owners = BTreeMap::new();
        owners.insert(database.to_string(), new_owner.to_string());
        self.drop_role_multi(role, &owners).await
    }

    async fn drop_database(&self, db: &str) -> Result<(), SqlError>;
}

/// Builds the driver for the configured cloud provider on top of real
/// postgres connections.
pub fn new_driver(config: &Config) -> Result<Arc<dyn Driver>, SqlError> {
    let connector = PgConnector::new(
        &config.host,
        &config.user,
        &config.password,
        &config.uri_args,
    )?;
    info!("postgres connections use sslmode {:?}", connector.tls_mode());
    Ok(new_driver_with_connector(config, Arc::new(connector)))
}

pub fn new_driver_with_connector(config: &Config, connector: Arc<dyn Connector>) -> Arc<dyn Driver> {
    let base = BaseDriver::new(
        connector,
        config.operator_role(),
        &config.default_database,
    );

    match config.cloud_provider {
        None => {
            info!("using plain postgres driver");
            Arc::new(base)
        }
        Some(CloudProvider::Aws) => {
            info!("using AWS postgres driver");
            Arc::new(AwsDriver::new(Box::new(base)))
        }
        Some(CloudProvider::Azure) => {
            let driver = AzureDriver::new(Box::new(AwsDriver::new(Box::new(base))), &config.user);
            info!(
                "using Azure {} server postgres driver",
                if driver.is_single_server() { "single" } else { "flexible" }
            );
            Arc::new(driver)
        }
        Some(CloudProvider::Gcp) => {
            info!("using GCP postgres driver");
            Arc::new(GcpDriver::new(Box::new(base)))
        }
    }
}
