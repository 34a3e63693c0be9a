//! Scan-history persistence against the hosted PostgREST backend.
//!
//! The backend is an opaque collaborator: this module only knows how to
//! upsert rows into its `scans` table over REST. History is best-effort on
//! the lookup path (failures are logged and swallowed there), while the
//! explicit save-expiry endpoint surfaces backend errors to its caller.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::BackendConfig;
use crate::models::ScanRecord;

/// REST client for the scan-history table.
pub struct ScanStore {
    client: reqwest::Client,
    base: String,
    key: String,
}

impl ScanStore {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
        })
    }

    fn scans_url(&self) -> String {
        format!("{}/rest/v1/scans", self.base)
    }

    /// Upserts one scan row, keyed on barcode.
    pub async fn record_scan(&self, record: &ScanRecord) -> Result<()> {
        debug!(barcode = %record.barcode, source = record.source.as_str(), "recording scan");
        let resp = self
            .client
            .post(self.scans_url())
            .query(&[("on_conflict", "barcode")])
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "resolution=merge-duplicates")
            .json(record)
            .send()
            .await
            .context("scan history request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("scan history write failed ({}): {}", status, body);
        }
        Ok(())
    }

    /// Patches a scan row's expiry fields, computing the expired flag
    /// server-side from today's date.
    pub async fn save_expiry(&self, barcode: &str, expiry_date: &str) -> Result<()> {
        let is_expired = parse_expiry(expiry_date).map(|d| d < Utc::now().date_naive());
        let body = json!({
            "barcode": barcode,
            "expiry_date": expiry_date,
            "is_expired": is_expired,
        });
        let resp = self
            .client
            .post(self.scans_url())
            .query(&[("on_conflict", "barcode")])
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&body)
            .send()
            .await
            .context("expiry save request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("expiry save failed ({}): {}", status, body);
        }
        Ok(())
    }
}

fn parse_expiry(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}
