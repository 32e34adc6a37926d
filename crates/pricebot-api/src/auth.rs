//! Request authentication
//!
//! Two independent gates:
//!
//! - the WhatsApp intake token + optional HMAC signature over
//!   `timestamp + "." + raw_body`, bounded by a freshness TTL
//! - HTTP Basic over `/admin/*`, active outside the local environment when
//!   credentials are configured

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Validate the intake token per environment rules.
///
/// Production without a configured token answers 503; any mismatch is 401.
/// Outside production an unset token leaves the endpoint open (dev/test).
pub fn check_ingest_token(
    configured: Option<&str>,
    provided: Option<&str>,
    is_production: bool,
) -> Result<(), ApiError> {
    match configured {
        None if is_production => Err(ApiError::Unavailable(
            "ingest disabled: missing token configuration".into(),
        )),
        None => Ok(()),
        Some(expected) => {
            if provided == Some(expected) {
                Ok(())
            } else {
                Err(ApiError::Unauthorized("invalid ingest token".into()))
            }
        }
    }
}

/// Reasons a signature check can fail; mapped to metrics labels
#[derive(Debug, PartialEq, Eq)]
pub enum SignatureRejection {
    MissingHeaders,
    MalformedTimestamp,
    Stale,
    Mismatch,
}

impl SignatureRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingHeaders | Self::MalformedTimestamp | Self::Mismatch => "invalid_signature",
            Self::Stale => "stale_signature",
        }
    }
}

/// Verify `hex(HMAC-SHA256(secret, timestamp + "." + body))` within the TTL
pub fn check_signature(
    secret: &str,
    timestamp_header: Option<&str>,
    signature_header: Option<&str>,
    body: &[u8],
    ttl_seconds: i64,
) -> Result<(), SignatureRejection> {
    let (timestamp, signature) = match (timestamp_header, signature_header) {
        (Some(timestamp), Some(signature)) => (timestamp, signature),
        _ => return Err(SignatureRejection::MissingHeaders),
    };

    let issued_at: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureRejection::MalformedTimestamp)?;
    let now = Utc::now().timestamp();
    if (now - issued_at).abs() > ttl_seconds {
        return Err(SignatureRejection::Stale);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureRejection::Mismatch)?;
    mac.update(timestamp.trim().as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    // Constant-time-ish comparison over the hex encoding
    if expected.len() == signature.len()
        && expected
            .bytes()
            .zip(signature.to_lowercase().bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    {
        Ok(())
    } else {
        Err(SignatureRejection::Mismatch)
    }
}

/// Compute the signature a well-behaved collector would send (test helper
/// and outbound relay support)
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// HTTP Basic gate for `/admin/*`
///
/// Disabled in the local environment; with no credentials configured the
/// routes answer 503 rather than silently opening up.
pub async fn admin_basic_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let config = &state.config;
    if config.server.is_local() {
        return next.run(request).await;
    }
    if !config.admin.is_configured() {
        return ApiError::Unavailable("admin credentials not configured".into()).into_response();
    }

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| BASE64.decode(encoded).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .is_some_and(|credentials| {
            let expected = format!(
                "{}:{}",
                config.admin.username.as_deref().unwrap_or_default(),
                config.admin.password.as_deref().unwrap_or_default()
            );
            credentials == expected
        });

    if authorized {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"pricebot-admin\"")],
            "authentication required",
        )
            .into_response()
    }
}
