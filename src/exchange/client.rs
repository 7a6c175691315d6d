use crate::exchange::signer::Signer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seam between the aggregation core and the exchange transport. The engine
/// only ever needs "send this method with these params, give me the raw body".
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn call(&self, method: &str, params: BTreeMap<String, String>) -> Result<String>;
}

pub struct ExmoClient {
    base_url: String, // e.g. https://api.exmo.com/v1.1
    signer: Signer,
    client: Client,
    // Strictly increasing across calls; the exchange rejects replayed nonces.
    nonce: AtomicI64,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

impl ExmoClient {
    pub fn new(
        base_url: String,
        signer: Signer,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        // Bounded timeouts so a stalled upstream cannot hang an aggregation
        // call; the failure surfaces as a snapshot-level error, not a retry.
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url,
            signer,
            client,
            nonce: AtomicI64::new(now_ms()),
        })
    }

    fn next_nonce(&self) -> i64 {
        self.nonce.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn form_body(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[async_trait]
impl ExchangeApi for ExmoClient {
    async fn call(&self, method: &str, mut params: BTreeMap<String, String>) -> Result<String> {
        params.insert("nonce".to_string(), self.next_nonce().to_string());

        let body = Self::form_body(&params);
        let sign = self.signer.sign(&body)?;
        let url = format!("{}/{}", self.base_url, method);

        let resp = self
            .client
            .post(url)
            .header("Key", self.signer.api_key())
            .header("Sign", sign)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .with_context(|| format!("exmo {} request failed", method))?
            .error_for_status()
            .with_context(|| format!("exmo {} returned error status", method))?
            .text()
            .await
            .with_context(|| format!("exmo {} body read failed", method))?;

        Ok(resp)
    }
}
