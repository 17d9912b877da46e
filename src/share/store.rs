use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Download, Redemption};
use crate::clock::{Clock, expiry_after};
use crate::error::ShareError;

/// Random bytes per token (144 bits, 24 URL-safe characters).
const TOKEN_BYTES: usize = 18;

/// A stored download waiting to be fetched.
#[derive(Debug, Clone)]
pub struct ShareRecord {
    pub data: Vec<u8>,
    pub filename: String,
    pub expires_at: DateTime<Utc>,
}

/// In-memory map from opaque token to pending download.
///
/// Created once at startup and shared by reference. Nothing is written to
/// disk, and expired records are only reclaimed when [`TokenStore::issue`] or
/// [`TokenStore::redeem`] runs; there is no background sweeper.
pub struct TokenStore {
    records: Mutex<HashMap<String, ShareRecord>>,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        TokenStore {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Store `data` under a fresh token valid for `ttl_minutes`.
    ///
    /// Returns the token and its expiry, or [`ShareError::Lifetime`] when
    /// `ttl_minutes` is not positive or too large; nothing is stored then.
    pub fn issue(
        &self,
        data: Vec<u8>,
        filename: &str,
        ttl_minutes: i64,
    ) -> Result<(String, DateTime<Utc>), ShareError> {
        let now = self.clock.now();
        let expires_at = expiry_after(now, ttl_minutes).ok_or(ShareError::Lifetime(ttl_minutes))?;
        let mut records = self.lock();
        purge_expired(&mut records, now);

        let mut token = generate_token();
        while records.contains_key(&token) {
            token = generate_token();
        }

        records.insert(
            token.clone(),
            ShareRecord {
                data,
                filename: filename.to_string(),
                expires_at,
            },
        );
        log::debug!("stored share token, {} live record(s)", records.len());

        Ok((token, expires_at))
    }

    /// Look up `token`.
    ///
    /// A live record stays in the store so the same link can be retried until
    /// it expires. An expired record is removed and reported as expired once;
    /// after that the token is unknown.
    pub fn redeem(&self, token: &str) -> Redemption {
        let now = self.clock.now();
        let mut records = self.lock();

        let outcome = match records.get(token) {
            None => Redemption::NotFound,
            Some(record) if record.expires_at <= now => {
                let expired_at = record.expires_at;
                records.remove(token);
                Redemption::Expired {
                    expired_at: Some(expired_at),
                }
            }
            Some(record) => Redemption::Ready(Download {
                data: record.data.clone(),
                filename: record.filename.clone(),
                expires_at: record.expires_at,
            }),
        };

        purge_expired(&mut records, now);
        outcome
    }

    /// Drop every expired record; returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        purge_expired(&mut self.lock(), now)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ShareRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn purge_expired(records: &mut HashMap<String, ShareRecord>, now: DateTime<Utc>) -> usize {
    let before = records.len();
    records.retain(|_, record| record.expires_at > now);
    before - records.len()
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
