//! Site rows in the Supabase datastore, reached through its PostgREST API.

use crate::{Result, SiteContractConfig, SiteContractError};
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait SiteStore: Send + Sync {
    /// Set `site_contract` on the row with the given id.
    async fn update_site_contract(&self, site_id: &str, contract_address: Address) -> Result<()>;

    /// Id of the first site whose `domain` equals `full_domain`, if any.
    async fn find_site_id_by_domain(&self, full_domain: &str) -> Result<Option<String>>;
}

#[derive(Debug, Serialize)]
struct SiteContractPatch {
    site_contract: String,
}

#[derive(Debug, Deserialize)]
struct SiteIdRow {
    id: serde_json::Value,
}

/// PostgREST client for the sites table.
pub struct SupabaseSiteStore {
    client: reqwest::Client,
    table_url: String,
}

impl SupabaseSiteStore {
    pub fn new(config: &SiteContractConfig) -> Result<Self> {
        let key = config.supabase_service_role_key.trim();

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(key).map_err(|e| {
                SiteContractError::Configuration(format!("invalid service role key: {}", e))
            })?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e| {
                SiteContractError::Configuration(format!("invalid service role key: {}", e))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                SiteContractError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        let table_url = format!(
            "{}/rest/v1/{}",
            config.supabase_url.trim_end_matches('/'),
            config.sites_table
        );

        Ok(Self { client, table_url })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SiteContractError::DatastoreStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SiteStore for SupabaseSiteStore {
    async fn update_site_contract(&self, site_id: &str, contract_address: Address) -> Result<()> {
        let response = self
            .client
            .patch(&self.table_url)
            .query(&[("id", format!("eq.{}", site_id))])
            .header("Prefer", "return=minimal")
            .json(&SiteContractPatch {
                site_contract: contract_address.to_checksum(None),
            })
            .send()
            .await?;

        Self::check_status(response).await?;
        debug!(site_id, contract = %contract_address, "site_contract updated");
        Ok(())
    }

    async fn find_site_id_by_domain(&self, full_domain: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.table_url)
            .query(&[("select", "id".to_string()), ("domain", format!("eq.{}", full_domain))])
            .send()
            .await?;

        let rows: Vec<SiteIdRow> = Self::check_status(response).await?.json().await?;

        Ok(rows.into_iter().next().map(|row| match row.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        }))
    }
}
