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

use self_service_postgres_operator::pg::tls::{client_config, connection_query};
use self_service_postgres_operator::pg::{PgConnector, TlsMode};

#[test]
fn sslmode_follows_libpq() -> Result<()> {
    assert_eq!(TlsMode::from_uri_args("")?, TlsMode::Prefer);
    assert_eq!(TlsMode::from_uri_args("connect_timeout=5")?, TlsMode::Prefer);
    assert_eq!(TlsMode::from_uri_args("sslmode=disable")?, TlsMode::Disable);
    assert_eq!(TlsMode::from_uri_args("sslmode=allow")?, TlsMode::Prefer);
    assert_eq!(TlsMode::from_uri_args("sslmode=require")?, TlsMode::Require);
    assert_eq!(TlsMode::from_uri_args("sslmode=verify-ca")?, TlsMode::VerifyFull);
    assert_eq!(
        TlsMode::from_uri_args("connect_timeout=5&sslmode=verify-full")?,
        TlsMode::VerifyFull
    );
    Ok(())
}

#[test]
fn unknown_sslmode_is_rejected() {
    let err = TlsMode::from_uri_args("sslmode=always").unwrap_err();
    assert!(err.message.contains("unknown sslmode 'always'"), "{}", err);
    assert!(PgConnector::new("localhost", "postgres", "pw", "sslmode=always").is_err());
}

#[test]
fn connection_query_keeps_other_arguments() {
    assert_eq!(
        connection_query("connect_timeout=5&sslmode=verify-full", TlsMode::VerifyFull),
        "connect_timeout=5&sslmode=require"
    );
    assert_eq!(connection_query("", TlsMode::Prefer), "sslmode=prefer");
    assert_eq!(
        connection_query("sslmode=disable", TlsMode::Disable),
        "sslmode=disable"
    );
}

#[test]
fn only_disabled_tls_goes_without_client_config() -> Result<()> {
    assert!(client_config(TlsMode::Disable)?.is_none());
    for mode in [TlsMode::Prefer, TlsMode::Require, TlsMode::VerifyFull] {
        assert!(client_config(mode)?.is_some(), "{:?}", mode);
    }
    Ok(())
}

#[test]
fn connection_url_carries_database_and_sslmode() -> Result<()> {
    let connector = PgConnector::new(
        "db.example.com:5432",
        "operator",
        "s3cr/t",
        "sslmode=verify-full&application_name=operator",
    )?;

    assert_eq!(connector.tls_mode(), TlsMode::VerifyFull);
    let url = connector.connection_url("orders")?;
    assert_eq!(url.path(), "/orders");
    assert_eq!(url.username(), "operator");
    assert_eq!(url.host_str(), Some("db.example.com"));
    assert_eq!(url.port(), Some(5432));
    assert_eq!(url.query(), Some("application_name=operator&sslmode=require"));
    Ok(())
}
