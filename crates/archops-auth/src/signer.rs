//! Request signer
//!
//! Every call to the architecture service carries its own proof of key
//! possession; no session is shared between requests.
//!
//! ```text
//! digest  = md5_hex(body) | EMPTY_BODY_DIGEST
//! message = method \n path \n digest \n content-type \n nonce \n
//! mac     = base64(hmac_sha256(secret, message))
//!
//! X-Authorization: <key>:<mac>
//! Nonce:           <nonce>
//! ```

use crate::error::SignError;
use archops_core::ApiConfig;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Digest used when a request has no body (MD5 of the empty string)
pub const EMPTY_BODY_DIGEST: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// Header carrying `key:mac`
pub const AUTHORIZATION_HEADER: &str = "X-Authorization";

/// Header carrying the request nonce
pub const NONCE_HEADER: &str = "Nonce";

/// Random bytes per nonce (before base64)
pub const NONCE_LEN: usize = 8;

/// API key/secret pair
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    /// Build credentials; `None` when either half is empty
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let secret = secret.into();
        if key.is_empty() || secret.is_empty() {
            None
        } else {
            Some(Self { key, secret })
        }
    }

    /// API key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The fields covered by a signature, plus the resulting mac
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// HTTP method, e.g. `GET`
    pub method: String,
    /// Signed path (service prefix + resource path, no query)
    pub path: String,
    /// Body digest or [`EMPTY_BODY_DIGEST`]
    pub body_digest: String,
    /// Content type, empty when absent
    pub content_type: String,
    /// Base64 nonce
    pub nonce: String,
    /// Base64 HMAC-SHA256 over [`SignedRequest::message`]
    pub mac: String,
}

impl SignedRequest {
    /// The exact string fed to the HMAC
    #[must_use]
    pub fn message(&self) -> String {
        signing_string(
            &self.method,
            &self.path,
            &self.body_digest,
            &self.content_type,
            &self.nonce,
        )
    }
}

/// Authentication headers for one request
///
/// Empty when signing is disabled; callers send the request unsigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedHeaders {
    entries: Vec<(&'static str, String)>,
}

impl SignedHeaders {
    fn from_request(key: &str, request: &SignedRequest) -> Self {
        Self {
            entries: vec![
                (AUTHORIZATION_HEADER, format!("{key}:{}", request.mac)),
                (NONCE_HEADER, request.nonce.clone()),
            ],
        }
    }

    /// No authentication headers (unsigned call)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Header name/value pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(name, value)| (*name, value.as_str()))
    }

    /// Look up a header by name (case-insensitive)
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `X-Authorization` value
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.get(AUTHORIZATION_HEADER)
    }

    /// `Nonce` value
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.get(NONCE_HEADER)
    }
}

/// Computes per-request authentication headers
#[derive(Debug, Clone, Default)]
pub struct RequestSigner {
    credentials: Option<Credentials>,
}

impl RequestSigner {
    /// Signer for a key/secret pair; disabled when either is empty
    #[must_use]
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(key, secret),
        }
    }

    /// Signer that never adds headers
    #[inline]
    #[must_use]
    pub fn unsigned() -> Self {
        Self { credentials: None }
    }

    /// Signer from API configuration
    #[must_use]
    pub fn from_config(api: &ApiConfig) -> Self {
        if !api.has_credentials() && (!api.key.is_empty() || !api.secret.is_empty()) {
            tracing::warn!("api key or secret missing, requests will be sent unsigned");
        }
        Self::new(api.key.clone(), api.secret.clone())
    }

    /// Whether requests get signed
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.credentials.is_some()
    }

    /// Sign a request with a fresh random nonce
    ///
    /// # Errors
    /// Returns [`SignError::InvalidKey`] if the HMAC cannot be keyed
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
        content_type: Option<&str>,
    ) -> Result<SignedHeaders, SignError> {
        if !self.is_enabled() {
            return Ok(SignedHeaders::default());
        }
        self.sign_with_nonce(method, path, body, content_type, &generate_nonce())
    }

    /// Sign a request with a caller-provided nonce
    ///
    /// Deterministic: identical inputs give identical headers.
    ///
    /// # Errors
    /// Returns [`SignError::InvalidKey`] if the HMAC cannot be keyed
    pub fn sign_with_nonce(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
        content_type: Option<&str>,
        nonce: &str,
    ) -> Result<SignedHeaders, SignError> {
        let Some(credentials) = &self.credentials else {
            return Ok(SignedHeaders::default());
        };
        let request = build_request(
            &credentials.secret,
            method,
            path,
            body,
            content_type,
            nonce,
        )?;
        Ok(SignedHeaders::from_request(&credentials.key, &request))
    }
}

/// Digest of the request body as sent on the wire
#[must_use]
pub fn content_digest(body: Option<&[u8]>) -> String {
    match body {
        None => EMPTY_BODY_DIGEST.to_string(),
        Some(bytes) => hex::encode(Md5::digest(bytes)),
    }
}

/// Newline-joined signing string, newline terminated
#[must_use]
pub fn signing_string(
    method: &str,
    path: &str,
    digest: &str,
    content_type: &str,
    nonce: &str,
) -> String {
    format!("{method}\n{path}\n{digest}\n{content_type}\n{nonce}\n")
}

/// Build the full [`SignedRequest`] for a secret
///
/// # Errors
/// Returns [`SignError::InvalidKey`] if the HMAC cannot be keyed
pub fn build_request(
    secret: &str,
    method: &str,
    path: &str,
    body: Option<&[u8]>,
    content_type: Option<&str>,
    nonce: &str,
) -> Result<SignedRequest, SignError> {
    let mut request = SignedRequest {
        method: method.to_string(),
        path: path.to_string(),
        body_digest: content_digest(body),
        content_type: content_type.unwrap_or_default().to_string(),
        nonce: nonce.to_string(),
        mac: String::new(),
    };
    request.mac = compute_mac(secret, &request.message())?;
    Ok(request)
}

/// Base64 HMAC-SHA256 of `message` keyed by `secret`
///
/// # Errors
/// Returns [`SignError::InvalidKey`] if the HMAC cannot be keyed
pub fn compute_mac(secret: &str, message: &str) -> Result<String, SignError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SignError::InvalidKey(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn generate_nonce() -> String {
    let bytes: [u8; NONCE_LEN] = rand::random();
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_digest_matches_md5_of_nothing() {
        assert_eq!(content_digest(Some(b"")), EMPTY_BODY_DIGEST);
        assert_eq!(content_digest(None), EMPTY_BODY_DIGEST);
    }

    #[test]
    fn body_digest_is_hex_md5() {
        assert_eq!(
            content_digest(Some(b"hello")),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn signing_string_layout() {
        let s = signing_string("GET", "/architecture-center/index", EMPTY_BODY_DIGEST, "", "bm9uY2U=");
        assert_eq!(
            s,
            "GET\n/architecture-center/index\nd41d8cd98f00b204e9800998ecf8427e\n\nbm9uY2U=\n"
        );
    }

    #[test]
    fn unsigned_when_key_missing() {
        let signer = RequestSigner::new("", "secret");
        assert!(!signer.is_enabled());
        assert!(signer.sign("GET", "/x", None, None).unwrap().is_empty());
    }

    #[test]
    fn unsigned_when_secret_missing() {
        let signer = RequestSigner::new("key", "");
        assert!(signer.sign("GET", "/x", None, None).unwrap().is_empty());
    }

    #[test]
    fn signed_headers_present_with_credentials() {
        let signer = RequestSigner::new("key", "secret");
        let headers = signer.sign("GET", "/x", None, None).unwrap();

        let auth = headers.authorization().unwrap();
        assert!(auth.starts_with("key:"));
        let nonce = headers.nonce().unwrap();
        let raw = STANDARD.decode(nonce).unwrap();
        assert_eq!(raw.len(), NONCE_LEN);
    }

    #[test]
    fn mac_is_verifiable_from_headers() {
        let signer = RequestSigner::new("key", "secret");
        let headers = signer
            .sign("POST", "/svc/terraform", Some(b"{}"), Some("application/json"))
            .unwrap();

        let nonce = headers.nonce().unwrap();
        let expected = build_request(
            "secret",
            "POST",
            "/svc/terraform",
            Some(b"{}"),
            Some("application/json"),
            nonce,
        )
        .unwrap();
        assert_eq!(
            headers.authorization().unwrap(),
            format!("key:{}", expected.mac)
        );
    }

    #[test]
    fn fresh_nonce_per_request() {
        let signer = RequestSigner::new("key", "secret");
        let a = signer.sign("GET", "/x", None, None).unwrap();
        let b = signer.sign("GET", "/x", None, None).unwrap();
        assert_ne!(a.nonce(), b.nonce());
    }

    #[test]
    fn debug_redacts_secret() {
        let creds = Credentials::new("key", "top-secret").unwrap();
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("top-secret"));
    }
}
