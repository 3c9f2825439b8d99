//! Web push delivery (RFC 8030) with VAPID identification (RFC 8292) and
//! aes128gcm payload encryption (RFC 8291).

use std::{fmt, str::FromStr, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use p256::{
    elliptic_curve::{rand_core::OsRng, sec1::ToEncodedPoint},
    pkcs8::EncodePrivateKey,
    SecretKey,
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Url,
};
use thiserror::Error;

use crate::{
    configuration::{Config, VapidCredentials},
    error::Error,
    model::Subscription,
    types::{Claims, PushHeader},
};

/// VAPID tokens must expire within 24h of signing.
const TOKEN_LIFETIME_IN_SEC: i64 = 12 * 60 * 60;

/// Why a single delivery did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The push service says the endpoint no longer exists.
    #[error("endpoint gone (HTTP {0})")]
    Gone(u16),

    #[error("{0}")]
    Transient(String),
}

impl SendError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, SendError::Gone(_))
    }
}

#[async_trait]
pub trait PushClient: Send + Sync + fmt::Debug {
    async fn send(
        &self,
        subscription: &Subscription,
        payload: &str,
    ) -> Result<(), SendError>;
}

pub struct WebPushClient {
    http: Client,
    key: EncodingKey,
    public_key: String,
    subject: String,
    push_header: PushHeader,
    timeout: Duration,
    status_code_to_delete: Vec<u16>,
}

impl fmt::Debug for WebPushClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebPushClient")
            .field("subject", &self.subject)
            .field("push_header", &self.push_header)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl WebPushClient {
    pub fn new(
        config: &Config,
        credentials: VapidCredentials,
    ) -> Result<WebPushClient, Error> {
        let key = signing_key(&credentials.private_key)?;
        validate_public_key(&credentials.public_key)?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.push_timeout))
            .build()?;

        Ok(WebPushClient {
            http,
            key,
            public_key: credentials.public_key,
            subject: credentials.subject,
            push_header: PushHeader {
                ttl: config.push_ttl,
                urgency: config.push_urgency,
            },
            timeout: Duration::from_secs(config.push_timeout),
            status_code_to_delete: config.status_code_to_delete.clone(),
        })
    }

    fn vapid_token(&self, endpoint: &Url) -> Result<String, Error> {
        let aud = endpoint.origin().ascii_serialization();
        if aud == "null" {
            return Err(Error::InvalidOption {
                option: String::from("host"),
            });
        }

        let claims = Claims {
            aud,
            sub: self.subject.to_owned(),
            exp: Utc::now().timestamp() + TOKEN_LIFETIME_IN_SEC,
        };

        Ok(encode(&Header::new(Algorithm::ES256), &claims, &self.key)?)
    }

    async fn post_push(
        &self,
        subscription: &Subscription,
        payload: &str,
    ) -> Result<u16, Error> {
        let url = Url::parse(&subscription.endpoint)?;
        let token = self.vapid_token(&url)?;

        let p256dh = decode_key(&subscription.keys.p256dh)?;
        let auth = decode_key(&subscription.keys.auth)?;
        let data = ece::encrypt(&p256dh, &auth, payload.as_bytes())?;

        let mut header_map = HeaderMap::new();
        header_map.insert(
            HeaderName::from_str("User-Agent")?,
            HeaderValue::from_static("pushcast"),
        );
        header_map.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!(
                "vapid t={}, k={}",
                token, self.public_key
            ))?,
        );
        header_map.insert(
            HeaderName::from_static("content-encoding"),
            HeaderValue::from_static("aes128gcm"),
        );
        header_map.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/octet-stream"),
        );
        header_map.insert(
            HeaderName::from_static("ttl"),
            HeaderValue::from_str(&self.push_header.ttl.to_string())?,
        );
        header_map.insert(
            HeaderName::from_static("urgency"),
            HeaderValue::from_str(&self.push_header.urgency.to_string())?,
        );

        let response = self
            .http
            .post(url)
            .headers(header_map)
            .body(data)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl PushClient for WebPushClient {
    async fn send(
        &self,
        subscription: &Subscription,
        payload: &str,
    ) -> Result<(), SendError> {
        match tokio::time::timeout(
            self.timeout,
            self.post_push(subscription, payload),
        )
        .await
        {
            Ok(Ok(status)) => classify(status, &self.status_code_to_delete),
            Ok(Err(e)) => Err(SendError::Transient(e.to_string())),
            Err(_) => Err(SendError::Transient(format!(
                "no answer within {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

pub fn classify(
    status: u16,
    status_code_to_delete: &[u16],
) -> Result<(), SendError> {
    if (200..300).contains(&status) {
        return Ok(());
    }

    if status_code_to_delete.contains(&status) {
        return Err(SendError::Gone(status));
    }

    Err(SendError::Transient(format!(
        "push service answered HTTP {}",
        status
    )))
}

/// Accepts either a PKCS#8 PEM block or the raw 32-byte scalar in base64url.
fn signing_key(private_key: &str) -> Result<EncodingKey, Error> {
    if private_key.contains("-----BEGIN") {
        return Ok(EncodingKey::from_ec_pem(private_key.as_bytes())?);
    }

    let bytes = decode_key(private_key)?;
    let secret = SecretKey::from_slice(&bytes).map_err(|_| {
        Error::ConfigurationError(String::from(
            "VAPID_PRIVATE_KEY is not a valid P-256 scalar",
        ))
    })?;
    let der = secret.to_pkcs8_der().map_err(|e| {
        Error::ConfigurationError(format!("VAPID_PRIVATE_KEY: {}", e))
    })?;

    Ok(EncodingKey::from_ec_der(der.as_bytes()))
}

fn validate_public_key(public_key: &str) -> Result<(), Error> {
    let bytes = decode_key(public_key)?;
    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(Error::ConfigurationError(String::from(
            "VAPID_PUBLIC_KEY must be an uncompressed P-256 point",
        )));
    }
    Ok(())
}

fn decode_key(value: &str) -> Result<Vec<u8>, Error> {
    Ok(BASE64_URL.decode(value.trim().trim_end_matches('='))?)
}

/// Fresh `(public, private)` VAPID pair, both base64url.
pub fn generate_vapid_keys() -> (String, String) {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key().to_encoded_point(false);

    (
        BASE64_URL.encode(public.as_bytes()),
        BASE64_URL.encode(secret.to_bytes()),
    )
}
