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

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kube::error::ErrorResponse;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use self_service_postgres_operator::config::{CloudProvider, Config};
use self_service_postgres_operator::pg::{self, Connector, Driver, Session, SqlError};
use self_service_postgres_operator::postgres::{Postgres, PostgresSpec};
use self_service_postgres_operator::postgres_user::{
    DatabaseGrant, PostgresUser, PostgresUserSpec, Privileges,
};
use self_service_postgres_operator::store::ResourceStore;

pub const NAMESPACE: &str = "default";

#[derive(Default)]
struct FakeState {
    /// (database, statement)
    statements: Vec<(String, String)>,
    /// (statement fragment, sqlstate)
    failures: Vec<(String, String)>,
    /// first query parameter -> answer
    answers: BTreeMap<String, String>,
    missing_databases: BTreeSet<String>,
    connections: Vec<String>,
    open_sessions: BTreeMap<String, usize>,
    /// (role, member) after successful GRANT / REVOKE of roles
    memberships: BTreeSet<(String, String)>,
}

fn unquote(name: &str) -> String {
    name.trim_matches('"').replace("\"\"", "\"")
}

impl FakeState {
    fn track_membership(&mut self, sql: &str) {
        if sql.contains(" ON ") {
            return;
        }
        if let Some(rest) = sql.strip_prefix("GRANT ") {
            if let Some((role, member)) = rest.split_once(" TO ") {
                self.memberships.insert((unquote(role), unquote(member)));
            }
        } else if let Some(rest) = sql.strip_prefix("REVOKE ") {
            if let Some((role, member)) = rest.split_once(" FROM ") {
                self.memberships.remove(&(unquote(role), unquote(member)));
            }
        } else if let Some(role) = sql.strip_prefix("DROP ROLE ") {
            let role = unquote(role);
            self.memberships.retain(|(r, m)| *r != role && *m != role);
        }
    }
}

/// Records statements instead of running them. Statements containing a
/// registered fragment fail with the registered SQLSTATE.
#[derive(Clone, Default)]
pub struct FakePostgres {
    state: Arc<Mutex<FakeState>>,
}

impl FakePostgres {
    pub fn new() -> Self {
        FakePostgres::default()
    }

    pub fn fail_on(&self, fragment: &str, code: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((fragment.to_string(), code.to_string()));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn answer(&self, param: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .answers
            .insert(param.to_string(), value.to_string());
    }

    pub fn missing_database(&self, db: &str) {
        self.state
            .lock()
            .unwrap()
            .missing_databases
            .insert(db.to_string());
    }

    pub fn statements(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .statements
            .iter()
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn statements_in(&self, db: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .statements
            .iter()
            .filter(|(d, _)| d == db)
            .map(|(_, s)| s.clone())
            .collect()
    }

    /// Statements that change something, without the catalog queries.
    pub fn commands(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| !s.starts_with("SELECT"))
            .collect()
    }

    pub fn is_member(&self, role: &str, member: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .memberships
            .contains(&(role.to_string(), member.to_string()))
    }

    pub fn count(&self, fragment: &str) -> usize {
        self.statements()
            .iter()
            .filter(|s| s.contains(fragment))
            .count()
    }

    pub fn executed(&self, fragment: &str) -> bool {
        self.count(fragment) > 0
    }

    pub fn connections_to(&self, db: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .connections
            .iter()
            .filter(|d| *d == db)
            .count()
    }

    pub fn open_sessions(&self, db: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .open_sessions
            .get(db)
            .copied()
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().statements.clear();
    }
}

#[async_trait]
impl Connector for FakePostgres {
    async fn connect(&self, database: &str) -> Result<Box<dyn Session>, SqlError> {
        let mut state = self.state.lock().unwrap();
        if state.missing_databases.contains(database) {
            return Err(SqlError::backend(
                "3D000",
                format!("database \"{}\" does not exist", database),
            ));
        }
        state.connections.push(database.to_string());
        *state.open_sessions.entry(database.to_string()).or_insert(0) += 1;
        Ok(Box::new(FakeSession {
            database: database.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    database: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeSession {
    fn record(&self, sql: &str) -> Result<(), SqlError> {
        let mut state = self.state.lock().unwrap();
        state
            .statements
            .push((self.database.clone(), sql.to_string()));
        match state.failures.iter().find(|(f, _)| sql.contains(f.as_str())) {
            Some((fragment, code)) => Err(SqlError::backend(code, format!("injected failure on '{}'", fragment))),
            None => {
                state.track_membership(sql);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn execute(&self, sql: &str) -> Result<(), SqlError> {
        self.record(sql)
    }

    async fn execute_with(&self, sql: &str, params: &[&str]) -> Result<u64, SqlError> {
        self.record(&format!("{} [{}]", sql, params.join(",")))?;
        Ok(0)
    }

    async fn query_string(&self, sql: &str, params: &[&str]) -> Result<Option<String>, SqlError> {
        self.record(&format!("{} [{}]", sql, params.join(",")))?;
        let state = self.state.lock().unwrap();
        if sql == pg::sql::ROLE_MEMBERSHIP {
            let (role, member) = (params[0].to_string(), params[1].to_string());
            return Ok(state.memberships.contains(&(role.clone(), member)).then_some(role));
        }
        Ok(params.first().and_then(|p| state.answers.get(*p).cloned()))
    }

    fn is_closed(&self) -> bool {
        false
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap();
        if let Some(open) = state.open_sessions.get_mut(&self.database) {
            *open -= 1;
        }
    }
}

pub fn test_config(provider: Option<CloudProvider>) -> Config {
    Config {
        host: "db.example.com:5432".to_string(),
        user: match provider {
            Some(CloudProvider::Azure) => "operator@myserver".to_string(),
            _ => "operator".to_string(),
        },
        password: "secret".to_string(),
        uri_args: "sslmode=disable".to_string(),
        default_database: "postgres".to_string(),
        cloud_provider: provider,
        instance_filter: String::new(),
        keep_secret_name: false,
    }
}

pub fn fake_driver(config: &Config) -> (FakePostgres, Arc<dyn Driver>) {
    let fake = FakePostgres::new();
    let driver = pg::new_driver_with_connector(config, Arc::new(fake.clone()));
    (fake, driver)
}

type Key = (String, String, String);

/// In-memory resource store applying JSON merge patches. An object with a
/// deletion timestamp disappears once its finalizers are gone.
#[derive(Clone, Default)]
pub struct FakeStore {
    objects: Arc<Mutex<BTreeMap<Key, Value>>>,
    uids: Arc<Mutex<u64>>,
}

fn key<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> Key {
    (
        K::kind(&()).to_string(),
        namespace.to_string(),
        name.to_string(),
    )
}

fn not_found(name: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} not found", name),
        reason: "NotFound".to_string(),
        code: 404,
    })
}

pub fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(patch) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let target = target.as_object_mut().unwrap();
            for (k, v) in patch {
                if v.is_null() {
                    target.remove(k);
                } else {
                    merge_patch(target.entry(k.clone()).or_insert(Value::Null), v);
                }
            }
        }
        _ => *target = patch.clone(),
    }
}

impl FakeStore {
    pub fn new() -> Self {
        FakeStore::default()
    }

    /// Stores `object` as is, assigning a uid and the test namespace if missing.
    pub fn insert<K: Resource<DynamicType = ()> + Serialize>(&self, object: &K) {
        let mut value = serde_json::to_value(object).unwrap();
        let namespace = object
            .meta()
            .namespace
            .clone()
            .unwrap_or_else(|| NAMESPACE.to_string());
        let name = object.meta().name.clone().unwrap();
        {
            let metadata = value["metadata"].as_object_mut().unwrap();
            metadata.insert("namespace".to_string(), Value::String(namespace.clone()));
            if !metadata.contains_key("uid") {
                let mut uids = self.uids.lock().unwrap();
                *uids += 1;
                metadata.insert("uid".to_string(), Value::String(format!("uid-{}", uids)));
            }
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key::<K>(&namespace, &name), value);
    }

    pub fn object<K: Resource<DynamicType = ()> + DeserializeOwned>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<K> {
        self.objects
            .lock()
            .unwrap()
            .get(&key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    pub fn remove<K: Resource<DynamicType = ()>>(&self, namespace: &str, name: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&key::<K>(namespace, name));
    }

    /// What the api server does on delete when finalizers are present.
    pub fn mark_deleted<K: Resource<DynamicType = ()>>(&self, namespace: &str, name: &str) {
        let mut objects = self.objects.lock().unwrap();
        let object = objects.get_mut(&key::<K>(namespace, name)).unwrap();
        object["metadata"]["deletionTimestamp"] = Value::String("2021-06-01T12:00:00Z".to_string());
    }
}

#[async_trait]
impl<K> ResourceStore<K> for FakeStore
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, kube::Error> {
        Ok(self.object::<K>(namespace, name))
    }

    async fn list(&self) -> Result<Vec<K>, kube::Error> {
        let kind = K::kind(&()).to_string();
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, v)| serde_json::from_value(v.clone()).unwrap())
            .collect())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error> {
        let name = object.meta().name.clone().unwrap();
        if self.object::<K>(namespace, &name).is_some() {
            return Err(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{} already exists", name),
                reason: "AlreadyExists".to_string(),
                code: 409,
            }));
        }
        self.insert(object);
        Ok(self.object::<K>(namespace, &name).unwrap())
    }

    async fn patch_metadata(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, kube::Error> {
        let key = key::<K>(namespace, name);
        let mut objects = self.objects.lock().unwrap();
        let object = objects.get_mut(&key).ok_or_else(|| not_found(name))?;
        merge_patch(object, patch);

        let result: K = serde_json::from_value(object.clone()).unwrap();
        let finalizers_left = object["metadata"]["finalizers"]
            .as_array()
            .map(|f| !f.is_empty())
            .unwrap_or(false);
        if !object["metadata"]["deletionTimestamp"].is_null() && !finalizers_left {
            objects.remove(&key);
        }
        Ok(result)
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, kube::Error> {
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get_mut(&key::<K>(namespace, name))
            .ok_or_else(|| not_found(name))?;
        if let Some(status) = patch.get("status") {
            merge_patch(&mut object["status"], status);
        }
        Ok(serde_json::from_value(object.clone()).unwrap())
    }
}

pub fn postgres(name: &str, database: &str) -> Postgres {
    let mut postgres = Postgres::new(
        name,
        PostgresSpec {
            database: database.to_string(),
            ..Default::default()
        },
    );
    postgres.metadata.namespace = Some(NAMESPACE.to_string());
    postgres
}

pub fn postgres_user(name: &str, role: &str, databases: &[(&str, Privileges)]) -> PostgresUser {
    let mut user = PostgresUser::new(
        name,
        PostgresUserSpec {
            role: role.to_string(),
            databases: databases
                .iter()
                .map(|(database, privileges)| DatabaseGrant {
                    database: database.to_string(),
                    privileges: *privileges,
                })
                .collect(),
            secret_name: format!("{}-credentials", role),
            ..Default::default()
        },
    );
    user.metadata.namespace = Some(NAMESPACE.to_string());
    user
}
