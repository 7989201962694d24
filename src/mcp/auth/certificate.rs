//! Client certificate credentials: PKCS#12 loading and signed JWT client
//! assertions for the app-only certificate flow.

use std::{fs, path::Path};

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use openssl::{
    error::ErrorStack,
    hash::MessageDigest,
    pkcs12::Pkcs12,
    pkey::{PKey, Private},
    sign::Signer,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use uuid::Uuid;

use crate::mcp::error::GraphError;

/// Assertions are accepted for at most ten minutes by Entra ID.
const ASSERTION_LIFETIME_SECS: i64 = 600;

pub struct ClientCertificate {
    key: PKey<Private>,
    /// Base64url SHA-1 thumbprint, sent as `x5t`.
    thumbprint: String,
    /// Base64 DER certificates, leaf first, sent as `x5c`.
    chain: Vec<String>,
}

impl ClientCertificate {
    /// Loads a PKCS#12 (`.pfx`) bundle holding the private key and certificate.
    ///
    /// # Errors
    /// `MissingConfig` when the file cannot be read, `Authentication` when it
    /// cannot be decrypted or lacks a key or certificate.
    pub fn from_pkcs12_file(
        path: &Path,
        password: Option<&SecretString>,
    ) -> Result<Self, GraphError> {
        let der = fs::read(path).map_err(|e| {
            GraphError::MissingConfig(format!("cannot read certificate {}: {e}", path.display()))
        })?;
        Self::from_pkcs12_der(&der, password)
    }

    /// # Errors
    /// `Authentication` when the bundle cannot be decrypted or is incomplete.
    pub fn from_pkcs12_der(
        der: &[u8],
        password: Option<&SecretString>,
    ) -> Result<Self, GraphError> {
        let parsed = Pkcs12::from_der(der)
            .and_then(|bundle| bundle.parse2(password.map_or("", |p| p.expose_secret())))
            .map_err(certificate_error)?;

        let key = parsed.pkey.ok_or_else(|| {
            GraphError::Authentication("certificate bundle has no private key".to_string())
        })?;
        let cert = parsed.cert.ok_or_else(|| {
            GraphError::Authentication("certificate bundle has no certificate".to_string())
        })?;

        let thumbprint = URL_SAFE_NO_PAD.encode(
            cert.digest(MessageDigest::sha1())
                .map_err(certificate_error)?,
        );
        let mut chain = vec![STANDARD.encode(cert.to_der().map_err(certificate_error)?)];
        if let Some(authorities) = parsed.ca {
            for authority in &authorities {
                chain.push(STANDARD.encode(authority.to_der().map_err(certificate_error)?));
            }
        }

        Ok(Self {
            key,
            thumbprint,
            chain,
        })
    }

    #[cfg(test)]
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }

    /// RS256 JWT proving possession of the certificate to `audience`
    /// (the tenant's token endpoint).
    ///
    /// # Errors
    /// `Authentication` when signing fails.
    pub fn assertion(&self, client_id: &str, audience: &str) -> Result<String, GraphError> {
        let now = chrono::Utc::now().timestamp();
        let header = json!({
            "alg": "RS256",
            "typ": "JWT",
            "x5t": self.thumbprint,
            "x5c": self.chain,
        });
        let claims = json!({
            "aud": audience,
            "iss": client_id,
            "sub": client_id,
            "jti": Uuid::new_v4().to_string(),
            "nbf": now,
            "iat": now,
            "exp": now + ASSERTION_LIFETIME_SECS,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let mut signer = Signer::new(MessageDigest::sha256(), &self.key).map_err(certificate_error)?;
        signer
            .update(signing_input.as_bytes())
            .map_err(certificate_error)?;
        let signature = signer.sign_to_vec().map_err(certificate_error)?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}

fn certificate_error(err: ErrorStack) -> GraphError {
    GraphError::Authentication(format!("client certificate: {err}"))
}
