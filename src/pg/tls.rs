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

//! Transport security for postgres connections, following libpq's `sslmode`.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use url::form_urlencoded;

use crate::pg::executor::SqlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// plain connections only
    Disable,
    /// TLS if the server offers it, without verifying the server
    Prefer,
    /// TLS, without verifying the server
    Require,
    /// TLS with a server certificate from a well known CA, matching the host name
    VerifyFull,
}

impl TlsMode {
    /// The `sslmode` of a connection query string. Without one libpq uses `prefer`.
    pub fn from_uri_args(uri_args: &str) -> Result<TlsMode, SqlError> {
        let mode = form_urlencoded::parse(uri_args.as_bytes())
            .filter(|(k, _)| k == "sslmode")
            .map(|(_, v)| v.into_owned())
            .last();

        match mode.as_deref() {
            None | Some("prefer") | Some("allow") => Ok(TlsMode::Prefer),
            Some("disable") => Ok(TlsMode::Disable),
            Some("require") => Ok(TlsMode::Require),
            Some("verify-ca") | Some("verify-full") => Ok(TlsMode::VerifyFull),
            Some(other) => Err(SqlError::client(format!(
                "unknown sslmode '{}' (expected one of disable, allow, prefer, require, verify-ca, verify-full)",
                other
            ))),
        }
    }

    /// The `sslmode` handed to tokio-postgres, which only knows three of them.
    pub fn ssl_mode(self) -> &'static str {
        match self {
            TlsMode::Disable => "disable",
            TlsMode::Prefer => "prefer",
            TlsMode::Require | TlsMode::VerifyFull => "require",
        }
    }
}

/// `uri_args` with `sslmode` replaced by what tokio-postgres understands for `mode`.
pub fn connection_query(uri_args: &str, mode: TlsMode) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (k, v) in form_urlencoded::parse(uri_args.as_bytes()) {
        if k != "sslmode" {
            query.append_pair(&k, &v);
        }
    }
    query.append_pair("sslmode", mode.ssl_mode());
    query.finish()
}

/// The rustls client configuration for `mode`; `None` for plain connections.
pub fn client_config(mode: TlsMode) -> Result<Option<ClientConfig>, SqlError> {
    if mode == TlsMode::Disable {
        return Ok(None);
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| SqlError::client(format!("cannot set up tls: {}", e)))?;

    let config = match mode {
        TlsMode::VerifyFull => {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        _ => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth(),
    };
    Ok(Some(config))
}

/// libpq's `prefer` and `require` encrypt without checking who is on the other end.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
