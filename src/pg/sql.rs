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

//! Statement builders. Every identifier is double quoted and every literal
//! single quoted, with embedded quotes doubled.

use std::fmt;

pub const DATABASE_OWNER: &str = "SELECT pg_catalog.pg_get_userbyid(d.datdba) FROM pg_catalog.pg_database d WHERE d.datname = $1";

/// One row if `$2` is a direct member of `$1`.
pub const ROLE_MEMBERSHIP: &str = "SELECT r.rolname::text FROM pg_catalog.pg_auth_members m JOIN pg_catalog.pg_roles r ON r.oid = m.roleid JOIN pg_catalog.pg_roles u ON u.oid = m.member WHERE r.rolname = $1 AND u.rolname = $2";

pub const TERMINATE_BACKENDS: &str = "SELECT pg_terminate_backend(pg_stat_activity.pid) FROM pg_stat_activity WHERE pg_stat_activity.datname = $1 AND pid <> pg_backend_pid()";

pub const READER_PRIVILEGES: &str = "SELECT";
pub const WRITER_PRIVILEGES: &str = "SELECT,INSERT,DELETE,UPDATE";
pub const READER_SEQUENCE_PRIVILEGES: &str = "SELECT";
pub const WRITER_SEQUENCE_PRIVILEGES: &str = "USAGE,SELECT";
pub const FUNCTION_PRIVILEGES: &str = "EXECUTE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Tables,
    Sequences,
    Functions,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Tables => write!(f, "TABLES"),
            ObjectKind::Sequences => write!(f, "SEQUENCES"),
            ObjectKind::Functions => write!(f, "FUNCTIONS"),
        }
    }
}

pub fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Replaces everything after a PASSWORD keyword so statements can be logged.
pub fn redact(statement: &str) -> String {
    match statement.find(" PASSWORD ") {
        Some(idx) => format!("{} PASSWORD '********'", &statement[..idx]),
        None => statement.to_string(),
    }
}

pub fn create_database(db: &str) -> String {
    format!("CREATE DATABASE {}", ident(db))
}

pub fn alter_database_owner(db: &str, owner: &str) -> String {
    format!("ALTER DATABASE {} OWNER TO {}", ident(db), ident(owner))
}

pub fn grant_on_database(privilege: &str, db: &str, role: &str) -> String {
    format!("GRANT {} ON DATABASE {} TO {}", privilege, ident(db), ident(role))
}

pub fn create_schema(schema: &str, owner: &str) -> String {
    format!(
        "CREATE SCHEMA IF NOT EXISTS {} AUTHORIZATION {}",
        ident(schema),
        ident(owner)
    )
}

pub fn create_extension(extension: &str) -> String {
    format!("CREATE EXTENSION IF NOT EXISTS {}", ident(extension))
}

pub fn create_group_role(role: &str) -> String {
    format!("CREATE ROLE {}", ident(role))
}

pub fn create_login_role(role: &str, password: &str) -> String {
    format!(
        "CREATE ROLE {} WITH LOGIN PASSWORD {}",
        ident(role),
        literal(password)
    )
}

pub fn alter_password(role: &str, password: &str) -> String {
    format!("ALTER ROLE {} WITH PASSWORD {}", ident(role), literal(password))
}

pub fn grant_role(role: &str, grantee: &str) -> String {
    format!("GRANT {} TO {}", ident(role), ident(grantee))
}

pub fn revoke_role(role: &str, member: &str) -> String {
    format!("REVOKE {} FROM {}", ident(role), ident(member))
}

pub fn set_default_role(login: &str, group: &str) -> String {
    format!("ALTER USER {} SET ROLE {}", ident(login), ident(group))
}

pub fn reset_default_role(login: &str) -> String {
    format!("ALTER USER {} RESET ROLE", ident(login))
}

pub fn grant_usage_on_schema(schema: &str, role: &str) -> String {
    format!("GRANT USAGE ON SCHEMA {} TO {}", ident(schema), ident(role))
}

pub fn grant_create_on_schema(schema: &str, role: &str) -> String {
    format!("GRANT CREATE ON SCHEMA {} TO {}", ident(schema), ident(role))
}

pub fn grant_on_all(privileges: &str, kind: ObjectKind, schema: &str, role: &str) -> String {
    format!(
        "GRANT {} ON ALL {} IN SCHEMA {} TO {}",
        privileges,
        kind,
        ident(schema),
        ident(role)
    )
}

pub fn alter_default_privileges(
    creator: Option<&str>,
    schema: &str,
    privileges: &str,
    kind: ObjectKind,
    role: &str,
) -> String {
    let for_role = creator
        .map(|c| format!(" FOR ROLE {}", ident(c)))
        .unwrap_or_default();
    format!(
        "ALTER DEFAULT PRIVILEGES{} IN SCHEMA {} GRANT {} ON {} TO {}",
        for_role,
        ident(schema),
        privileges,
        kind,
        ident(role)
    )
}

pub fn reassign_owned(role: &str, new_owner: &str) -> String {
    format!("REASSIGN OWNED BY {} TO {}", ident(role), ident(new_owner))
}

pub fn drop_owned(role: &str) -> String {
    format!("DROP OWNED BY {}", ident(role))
}

pub fn drop_role(role: &str) -> String {
    format!("DROP ROLE {}", ident(role))
}

pub fn revoke_connect_from_public(db: &str) -> String {
    format!("REVOKE CONNECT ON DATABASE {} FROM PUBLIC", ident(db))
}

pub fn drop_database_force(db: &str) -> String {
    format!("DROP DATABASE {} WITH (FORCE)", ident(db))
}

pub fn drop_database(db: &str) -> String {
    format!("DROP DATABASE {}", ident(db))
}
