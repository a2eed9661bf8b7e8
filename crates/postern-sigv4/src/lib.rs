//! AWS Signature Version 4 (SigV4) request signing.
//!
//! Used by the API Gateway client in `postern-pipeline` to authenticate
//! import and deployment calls. Works on plain strings and byte slices, so
//! it has no dependency on any HTTP client.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

// --- Public types ---

/// AWS credentials, as handed over by a credential store.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    /// For STS / AssumeRole / OIDC temporary credentials.
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Credential scope (region + service), e.g. `us-east-1` / `apigateway`.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub region: &'a str,
    pub service: &'a str,
}

/// An outbound request to sign.
pub struct SigningRequest<'a> {
    /// HTTP method (will be uppercased).
    pub method: &'a str,
    /// Request path as sent, percent-encoded again by [`canonical_uri`].
    pub path: &'a str,
    /// Raw (unencoded) query parameters.
    pub query: &'a [(String, String)],
    /// Headers to sign besides `x-amz-date` and `x-amz-security-token`,
    /// which [`sign`] adds itself. Must include `host`.
    pub headers: &'a BTreeMap<String, String>,
    /// Exact bytes that will be sent as the request body.
    pub body: &'a [u8],
}

/// Headers produced by [`sign`] that must be attached to the request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// Value for the `Authorization` request header.
    pub authorization: String,
    /// Value for the `x-amz-date` request header.
    pub x_amz_date: String,
    /// Value for `x-amz-security-token` (only present with temporary credentials).
    pub x_amz_security_token: Option<String>,
}

impl SignedHeaders {
    /// Header name/value pairs to add to the outbound request.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![
            ("authorization", self.authorization.as_str()),
            ("x-amz-date", self.x_amz_date.as_str()),
        ];
        if let Some(token) = &self.x_amz_security_token {
            pairs.push(("x-amz-security-token", token.as_str()));
        }
        pairs
    }
}

// --- Public functions ---

/// Format a Unix timestamp (seconds since epoch) into SigV4 datetime strings.
///
/// Returns `("YYYYMMDDTHHMMSSZ", "YYYYMMDD")`.
pub fn format_datetime(unix_secs: u64) -> (String, String) {
    let at = i64::try_from(unix_secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default();
    (
        at.format("%Y%m%dT%H%M%SZ").to_string(),
        at.format("%Y%m%d").to_string(),
    )
}

/// Compute SHA-256 of `data` and return the lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Percent-encode a request path for the canonical request.
///
/// Everything except unreserved characters and `/` is encoded. A leading
/// `/` is added when missing.
pub fn canonical_uri(path: &str) -> String {
    let mut result = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        result.push('/');
    }
    percent_encode_into(&mut result, path, true);
    result
}

/// Build the canonical query string: each key and value percent-encoded,
/// pairs sorted by key then value, joined with `&`.
pub fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort_unstable();

    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign `request` at `unix_secs` and return the headers to attach.
pub fn sign(
    request: &SigningRequest,
    creds: &Credentials,
    scope: Scope,
    unix_secs: u64,
) -> SignedHeaders {
    let (datetime, date) = format_datetime(unix_secs);

    let mut headers: BTreeMap<String, String> = request
        .headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    headers.insert("x-amz-date".to_string(), datetime.clone());
    if let Some(token) = &creds.session_token {
        headers.insert("x-amz-security-token".to_string(), token.clone());
    }

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();
    let signed_header_names = headers.keys().cloned().collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method.to_uppercase(),
        canonical_uri(request.path),
        canonical_query(request.query),
        canonical_headers,
        signed_header_names,
        sha256_hex(request.body),
    );

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        date, scope.region, scope.service
    );

    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        datetime,
        credential_scope,
        sha256_hex(canonical_request.as_bytes()),
    );

    let signature = hex::encode(hmac_sha256(
        &signing_key(&creds.secret_access_key, &date, scope),
        string_to_sign.as_bytes(),
    ));

    // No spaces after the commas.
    let authorization = format!(
        "{} Credential={}/{},SignedHeaders={},Signature={}",
        ALGORITHM, creds.access_key_id, credential_scope, signed_header_names, signature,
    );

    SignedHeaders {
        authorization,
        x_amz_date: datetime,
        x_amz_security_token: creds.session_token.clone(),
    }
}

// --- Private helpers ---

fn signing_key(secret: &str, date: &str, scope: Scope) -> Vec<u8> {
    let k_secret = format!("AWS4{}", secret);
    let k_date = hmac_sha256(k_secret.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, scope.region.as_bytes());
    let k_service = hmac_sha256(&k_region, scope.service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    percent_encode_into(&mut result, s, false);
    result
}

fn percent_encode_into(out: &mut String, s: &str, keep_slash: bool) {
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b'/' if keep_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
}

// --- Tests ---
