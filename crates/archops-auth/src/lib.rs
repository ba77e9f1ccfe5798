//! archops request authentication
//!
//! Signs outbound calls to the architecture service with an HMAC over the
//! request line, body digest, content type and a fresh nonce. When no key or
//! secret is configured the signer is disabled and requests go out unsigned.
//!
//! # Example
//!
//! ```rust,ignore
//! use archops_auth::RequestSigner;
//!
//! let signer = RequestSigner::new("key", "secret");
//! let headers = signer.sign("GET", "/architecture-center/index", None, None)?;
//! for (name, value) in headers.iter() {
//!     request = request.header(name, value);
//! }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod signer;

pub use error::SignError;
pub use signer::{
    build_request, compute_mac, content_digest, signing_string, Credentials, RequestSigner,
    SignedHeaders, SignedRequest, AUTHORIZATION_HEADER, EMPTY_BODY_DIGEST, NONCE_HEADER,
    NONCE_LEN,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
