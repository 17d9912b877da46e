//! Short-lived download links for exported CSV files.
//!
//! A link is produced by the first [`LinkIssuer`] in a [`ShareService`] that
//! succeeds. Three issuers exist:
//!
//! - [`SignedUrlIssuer`]: upload to object storage and hand out a signed URL.
//! - [`PayloadIssuer`]: pack the bytes into the link itself (`?payload=`), no state kept.
//! - [`TokenIssuer`]: keep the bytes in a [`TokenStore`] and hand out `?token=`.
//!
//! Redeeming a link always resolves to a [`Redemption`]; it never errors.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, expiry_after};
use crate::downloader::CSV_FILE_NAME;
use crate::error::ShareError;
use crate::payload;

#[cfg(feature = "web")]
mod signed;
mod store;
mod url;

#[cfg(feature = "web")]
pub use signed::SignedUrlIssuer;
pub use store::{ShareRecord, TokenStore};
pub use url::{normalize_public_url, payload_link, token_link};

/// Which mechanism produced a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SignedUrl,
    Payload,
    Token,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::SignedUrl => "signed URL",
            Strategy::Payload => "payload link",
            Strategy::Token => "token link",
        };
        f.write_str(name)
    }
}

/// An issued link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLink {
    pub url: String,
    pub strategy: Strategy,
    pub expires_at: DateTime<Utc>,
    /// Set when earlier issuers failed before this one succeeded.
    pub warning: Option<String>,
}

/// A download ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub data: Vec<u8>,
    pub filename: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of following a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    Ready(Download),
    /// The link was genuine but its time is up.
    Expired { expired_at: Option<DateTime<Utc>> },
    /// No such token (never issued, or already reclaimed).
    NotFound,
    /// The payload could not be read at all.
    Invalid,
}

impl Redemption {
    /// Text shown to the person holding the link.
    pub fn message(&self) -> &'static str {
        match self {
            Redemption::Ready(_) => "The download is ready.",
            Redemption::Expired { .. } => {
                "This link has expired. Create a new one on the device that made it."
            }
            Redemption::NotFound => {
                "This link is invalid or has expired. Create a new one on the device that made it."
            }
            Redemption::Invalid => "This link is damaged or holds data this app cannot read.",
        }
    }
}

/// Something that can turn CSV bytes into a time-limited link.
#[async_trait]
pub trait LinkIssuer: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn issue(&self, data: &[u8], filename: &str, ttl_minutes: i64) -> Result<ShareLink, ShareError>;
}

/// Links that carry the whole CSV in the query string.
pub struct PayloadIssuer {
    base_url: String,
    max_link_len: usize,
    clock: Arc<dyn Clock>,
}

impl PayloadIssuer {
    pub fn new(base_url: impl Into<String>, max_link_len: usize, clock: Arc<dyn Clock>) -> Self {
        PayloadIssuer {
            base_url: base_url.into(),
            max_link_len,
            clock,
        }
    }
}

#[async_trait]
impl LinkIssuer for PayloadIssuer {
    fn strategy(&self) -> Strategy {
        Strategy::Payload
    }

    async fn issue(&self, data: &[u8], _filename: &str, ttl_minutes: i64) -> Result<ShareLink, ShareError> {
        if self.base_url.is_empty() {
            return Err(ShareError::NotConfigured("public base URL"));
        }

        let now = self.clock.now();
        let expires_at = expiry_after(now, ttl_minutes).ok_or(ShareError::Lifetime(ttl_minutes))?;
        let token = payload::encode_at(data, ttl_minutes, now)?;
        let url = payload_link(&self.base_url, &token);
        if url.len() > self.max_link_len {
            return Err(ShareError::PayloadTooLarge {
                len: url.len(),
                limit: self.max_link_len,
            });
        }

        Ok(ShareLink {
            url,
            strategy: Strategy::Payload,
            expires_at,
            warning: None,
        })
    }
}

/// Links backed by the in-memory [`TokenStore`].
pub struct TokenIssuer {
    base_url: String,
    store: Arc<TokenStore>,
}

impl TokenIssuer {
    pub fn new(base_url: impl Into<String>, store: Arc<TokenStore>) -> Self {
        TokenIssuer {
            base_url: base_url.into(),
            store,
        }
    }
}

#[async_trait]
impl LinkIssuer for TokenIssuer {
    fn strategy(&self) -> Strategy {
        Strategy::Token
    }

    async fn issue(&self, data: &[u8], filename: &str, ttl_minutes: i64) -> Result<ShareLink, ShareError> {
        let (token, expires_at) = self.store.issue(data.to_vec(), filename, ttl_minutes)?;
        Ok(ShareLink {
            url: token_link(&self.base_url, &token),
            strategy: Strategy::Token,
            expires_at,
            warning: None,
        })
    }
}

/// Issues links through a prioritized list of issuers and redeems them.
pub struct ShareService {
    issuers: Vec<Box<dyn LinkIssuer>>,
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
}

impl ShareService {
    /// A service with no issuers yet; add them in priority order.
    pub fn new(store: Arc<TokenStore>, clock: Arc<dyn Clock>) -> Self {
        ShareService {
            issuers: Vec::new(),
            store,
            clock,
        }
    }

    pub fn with_issuer(mut self, issuer: impl LinkIssuer + 'static) -> Self {
        self.issuers.push(Box::new(issuer));
        self
    }

    /// Strategies in the order they will be tried.
    pub fn strategies(&self) -> Vec<Strategy> {
        self.issuers.iter().map(|issuer| issuer.strategy()).collect()
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Try each issuer in turn and return the first link produced.
    ///
    /// # Arguments
    /// * `data` - The file to share
    /// * `filename` - Name the file is served under (token links only)
    /// * `ttl_minutes` - Lifetime of the link
    ///
    /// # Returns
    /// The first link produced. Failures are logged and collected into its
    /// `warning`; only when every issuer fails is [`ShareError::Exhausted`]
    /// returned. A lifetime no issuer can represent fails every issuer and
    /// ends up there too.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use tasksheet::clock::SystemClock;
    /// use tasksheet::share::{ShareService, Strategy, TokenIssuer, TokenStore};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let store = Arc::new(TokenStore::new(Arc::new(SystemClock)));
    /// let service = ShareService::new(store.clone(), Arc::new(SystemClock))
    ///     .with_issuer(TokenIssuer::new("http://10.0.0.7:8501", store));
    ///
    /// let link = service.issue(b"a,b\n", "tasks.csv", 10).await.unwrap();
    /// assert_eq!(link.strategy, Strategy::Token);
    /// assert!(link.url.starts_with("http://10.0.0.7:8501/?token="));
    /// # }
    /// ```
    pub async fn issue(&self, data: &[u8], filename: &str, ttl_minutes: i64) -> Result<ShareLink, ShareError> {
        let mut failures = Vec::new();

        for issuer in &self.issuers {
            match issuer.issue(data, filename, ttl_minutes).await {
                Ok(mut link) => {
                    log::info!(
                        "issued {} for {} ({} bytes, expires {})",
                        link.strategy,
                        filename,
                        data.len(),
                        link.expires_at
                    );
                    if !failures.is_empty() {
                        link.warning = Some(failures.join("; "));
                    }
                    return Ok(link);
                }
                Err(e) => {
                    log::warn!("{} unavailable: {}", issuer.strategy(), e);
                    failures.push(format!("{}: {}", issuer.strategy(), e));
                }
            }
        }

        Err(ShareError::Exhausted(if failures.is_empty() {
            "no issuers configured".to_string()
        } else {
            failures.join("; ")
        }))
    }

    /// Follow a `?token=` link.
    pub fn redeem_token(&self, token: &str) -> Redemption {
        let outcome = self.store.redeem(token.trim());
        log::debug!("token redemption: {}", outcome_name(&outcome));
        outcome
    }

    /// Follow a `?payload=` link.
    pub fn redeem_payload(&self, payload: &str) -> Redemption {
        let decoded = payload::decode_at(payload, self.clock.now());
        let outcome = match (decoded.data, decoded.exp) {
            (Some(data), Some(exp)) => Redemption::Ready(Download {
                data,
                filename: CSV_FILE_NAME.to_string(),
                expires_at: unix_to_utc(exp),
            }),
            (None, Some(exp)) => Redemption::Expired {
                expired_at: Some(unix_to_utc(exp)),
            },
            _ => Redemption::Invalid,
        };
        log::debug!("payload redemption: {}", outcome_name(&outcome));
        outcome
    }
}

fn unix_to_utc(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn outcome_name(outcome: &Redemption) -> &'static str {
    match outcome {
        Redemption::Ready(_) => "ready",
        Redemption::Expired { .. } => "expired",
        Redemption::NotFound => "not found",
        Redemption::Invalid => "invalid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;

    struct Failing;

    #[async_trait]
    impl LinkIssuer for Failing {
        fn strategy(&self) -> Strategy {
            Strategy::SignedUrl
        }

        async fn issue(&self, _: &[u8], _: &str, _: i64) -> Result<ShareLink, ShareError> {
            Err(ShareError::Upload("503".into()))
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 9, 9, 9, 0, 0).unwrap()))
    }

    #[tokio::test]
    async fn falls_back_in_order_and_reports_failures() {
        let clock = clock();
        let store = Arc::new(TokenStore::new(clock.clone()));
        let service = ShareService::new(store.clone(), clock.clone())
            .with_issuer(Failing)
            .with_issuer(PayloadIssuer::new("https://a.app", 2000, clock.clone()))
            .with_issuer(TokenIssuer::new("https://a.app", store.clone()));

        let link = service.issue(b"x,y\n", "tasks.csv", 10).await.unwrap();
        assert_eq!(link.strategy, Strategy::Payload);
        assert!(link.url.starts_with("https://a.app/?payload="));
        assert!(link.warning.unwrap().contains("503"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn oversized_payload_goes_to_the_token_store() {
        let clock = clock();
        let store = Arc::new(TokenStore::new(clock.clone()));
        let service = ShareService::new(store.clone(), clock.clone())
            .with_issuer(PayloadIssuer::new("https://a.app", 40, clock.clone()))
            .with_issuer(TokenIssuer::new("https://a.app", store.clone()));

        let link = service.issue(b"x,y\n", "tasks.csv", 10).await.unwrap();
        assert_eq!(link.strategy, Strategy::Token);
        assert_eq!(store.len(), 1);

        let token = link.url.rsplit('=').next().unwrap();
        assert!(matches!(service.redeem_token(token), Redemption::Ready(_)));
    }

    #[tokio::test]
    async fn no_issuers_is_an_error() {
        let clock = clock();
        let store = Arc::new(TokenStore::new(clock.clone()));
        let service = ShareService::new(store, clock);
        assert!(matches!(
            service.issue(b"", "tasks.csv", 10).await,
            Err(ShareError::Exhausted(_))
        ));
    }

    #[tokio::test]
    async fn unusable_lifetime_fails_every_issuer() {
        let clock = clock();
        let store = Arc::new(TokenStore::new(clock.clone()));
        let service = ShareService::new(store.clone(), clock.clone())
            .with_issuer(PayloadIssuer::new("https://a.app", 2000, clock.clone()))
            .with_issuer(TokenIssuer::new("https://a.app", store.clone()));

        match service.issue(b"x,y\n", "tasks.csv", 999_999_999_999).await {
            Err(ShareError::Exhausted(reasons)) => {
                assert!(reasons.contains("payload link"));
                assert!(reasons.contains("token link"));
                assert!(reasons.contains("out of range"));
            }
            other => panic!("expected exhausted, got {:?}", other),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn payload_redemption_outcomes() {
        let clock = clock();
        let store = Arc::new(TokenStore::new(clock.clone()));
        let service = ShareService::new(store, clock.clone());
        let token = payload::encode_at(b"abc", 10, clock.now()).unwrap();

        match service.redeem_payload(&token) {
            Redemption::Ready(download) => {
                assert_eq!(download.data, b"abc");
                assert_eq!(download.filename, CSV_FILE_NAME);
                assert_eq!(download.expires_at, clock.now() + Duration::minutes(10));
            }
            other => panic!("expected ready, got {:?}", other),
        }

        clock.advance(Duration::minutes(11));
        assert!(matches!(
            service.redeem_payload(&token),
            Redemption::Expired { expired_at: Some(_) }
        ));
        assert_eq!(service.redeem_payload("corrupt"), Redemption::Invalid);
    }
}
