use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::sync::Arc;

use super::{LinkIssuer, ShareLink, Strategy};
use crate::clock::{Clock, expiry_after};
use crate::config::ObjectStorageConfig;
use crate::error::ShareError;

const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Uploads the CSV to object storage and returns a signed download URL.
///
/// Speaks the storage REST API used by Supabase: `POST /storage/v1/object/...`
/// to upload and `POST /storage/v1/object/sign/...` to sign. Every failure,
/// including timeouts, is returned as a [`ShareError`] so the caller can fall back.
pub struct SignedUrlIssuer {
    config: ObjectStorageConfig,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl SignedUrlIssuer {
    pub fn new(config: ObjectStorageConfig, clock: Arc<dyn Clock>) -> Result<Self, ShareError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ShareError::Upload(format!("HTTP client setup failed: {}", e)))?;

        Ok(SignedUrlIssuer {
            config,
            client,
            clock,
        })
    }

    /// Store `data` at `object_path` (overwriting any existing object).
    pub async fn upload(&self, object_path: &str, data: &[u8], content_type: &str) -> Result<(), ShareError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, self.config.bucket, object_path
        );

        let mut headers = self.auth_headers()?;
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type).map_err(|e| ShareError::Upload(e.to_string()))?,
        );
        headers.insert("x-upsert", HeaderValue::from_static("true"));

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| ShareError::Upload(format!("request error: {}", e)))?;

        let status = response.status();
        if status.as_u16() != 200 && status.as_u16() != 201 {
            return Err(ShareError::Upload(format!("status {}", status.as_u16())));
        }

        Ok(())
    }

    /// Ask for a signed URL to `object_path`, valid for `ttl_seconds`.
    ///
    /// Three request layouts are tried in turn because storage API versions
    /// disagree on where the path goes; the first usable answer wins.
    pub async fn sign(&self, object_path: &str, ttl_seconds: i64) -> Result<String, ShareError> {
        let base = format!("{}/storage/v1/object/sign/{}", self.config.url, self.config.bucket);
        let attempts = [
            (
                format!("{}/{}", base, object_path),
                json!({ "expiresIn": ttl_seconds }),
            ),
            (
                base.clone(),
                json!({ "path": object_path, "expiresIn": ttl_seconds }),
            ),
            (
                base.clone(),
                json!({ "paths": [object_path], "expiresIn": ttl_seconds }),
            ),
        ];

        let mut last_error = String::new();
        for (url, body) in attempts {
            match self.sign_once(&url, &body).await {
                Ok(signed) => return Ok(self.resolve_signed_url(&signed)),
                Err(e) => {
                    log::debug!("sign attempt at {} failed: {}", url, e);
                    last_error = e;
                }
            }
        }

        Err(ShareError::Sign(last_error))
    }

    async fn sign_once(&self, url: &str, body: &Value) -> Result<String, String> {
        let headers = self.auth_headers().map_err(|e| e.to_string())?;
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request error: {}", e))?;

        let status = response.status();
        if status.as_u16() != 200 {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(format!("status {} {}", status.as_u16(), snippet));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("unreadable response: {}", e))?;

        extract_signed_url(&body).ok_or_else(|| "response carried no signed URL".to_string())
    }

    /// Turn whatever the API returned into an absolute URL.
    fn resolve_signed_url(&self, signed: &str) -> String {
        let base = &self.config.url;
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else if signed.starts_with("/storage/v1/") {
            format!("{}{}", base, signed)
        } else if signed.starts_with("/object/") {
            format!("{}/storage/v1{}", base, signed)
        } else if signed.starts_with("object/") {
            format!("{}/storage/v1/{}", base, signed)
        } else {
            format!("{}/{}", base, signed.trim_start_matches('/'))
        }
    }

    fn auth_headers(&self) -> Result<HeaderMap, ShareError> {
        let key = &self.config.service_key;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|_| ShareError::NotConfigured("object storage key"))?;
        let apikey = HeaderValue::from_str(key).map_err(|_| ShareError::NotConfigured("object storage key"))?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("apikey", apikey);
        Ok(headers)
    }
}

#[async_trait]
impl LinkIssuer for SignedUrlIssuer {
    fn strategy(&self) -> Strategy {
        Strategy::SignedUrl
    }

    async fn issue(&self, data: &[u8], _filename: &str, ttl_minutes: i64) -> Result<ShareLink, ShareError> {
        let now = self.clock.now();
        let expires_at = expiry_after(now, ttl_minutes).ok_or(ShareError::Lifetime(ttl_minutes))?;
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let object_path = format!("tmp/tasks_{}_{}.csv", now.format("%Y%m%d_%H%M%S"), &suffix[..8]);

        self.upload(&object_path, data, "text/csv").await?;
        let url = self.sign(&object_path, (expires_at - now).num_seconds()).await?;

        Ok(ShareLink {
            url,
            strategy: Strategy::SignedUrl,
            expires_at,
            warning: None,
        })
    }
}

/// Pull the signed URL out of a sign response.
///
/// Accepts `{"signedURL": ...}` and the batch form
/// `{"signedUrls": [{"signedURL": ...}]}` / `{"signedUrls": ["..."]}`.
fn extract_signed_url(body: &Value) -> Option<String> {
    if let Some(url) = body.get("signedURL").and_then(Value::as_str).filter(|s| !s.is_empty()) {
        return Some(url.to_string());
    }

    let first = body.get("signedUrls")?.as_array()?.first()?;
    let url = match first {
        Value::String(url) => url.as_str(),
        Value::Object(_) => first
            .get("signedURL")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| first.get("signedUrl").and_then(Value::as_str))?,
        _ => return None,
    };

    if url.is_empty() { None } else { Some(url.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_each_response_shape() {
        assert_eq!(
            extract_signed_url(&json!({"signedURL": "/object/sign/b/p?token=t"})).as_deref(),
            Some("/object/sign/b/p?token=t")
        );
        assert_eq!(
            extract_signed_url(&json!({"signedUrls": [{"signedUrl": "u1"}]})).as_deref(),
            Some("u1")
        );
        assert_eq!(
            extract_signed_url(&json!({"signedUrls": [{"signedURL": "u2", "signedUrl": "x"}]})).as_deref(),
            Some("u2")
        );
        assert_eq!(extract_signed_url(&json!({"signedUrls": ["u3"]})).as_deref(), Some("u3"));
        assert_eq!(extract_signed_url(&json!({"signedUrls": []})), None);
        assert_eq!(extract_signed_url(&json!({"signedURL": ""})), None);
        assert_eq!(extract_signed_url(&json!({"error": "nope"})), None);
    }

    #[test]
    fn resolves_relative_paths() {
        let issuer = SignedUrlIssuer::new(
            ObjectStorageConfig {
                url: "https://xyz.supabase.co".into(),
                service_key: "k".into(),
                bucket: "b".into(),
            },
            Arc::new(crate::clock::SystemClock),
        )
        .unwrap();

        let base = "https://xyz.supabase.co";
        assert_eq!(issuer.resolve_signed_url("https://cdn.example/x"), "https://cdn.example/x");
        assert_eq!(
            issuer.resolve_signed_url("/storage/v1/object/sign/b/p"),
            format!("{}/storage/v1/object/sign/b/p", base)
        );
        assert_eq!(
            issuer.resolve_signed_url("/object/sign/b/p"),
            format!("{}/storage/v1/object/sign/b/p", base)
        );
        assert_eq!(
            issuer.resolve_signed_url("object/sign/b/p"),
            format!("{}/storage/v1/object/sign/b/p", base)
        );
        assert_eq!(issuer.resolve_signed_url("/other/p"), format!("{}/other/p", base));
    }
}
