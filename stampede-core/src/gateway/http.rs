//! HTTP client for a real cluster.
//!
//! Data-plane traffic (objects, queries, the TTL ledger) goes to the data
//! endpoint; tenant management, cluster statistics and backup control go to
//! the control endpoint. Both default to the same host when the deployment
//! does not separate them.

use super::{GatewayError, GatewayResult, TenantStore};
use crate::config::GatewayConfig;
use crate::lifecycle::ActivityStatus;
use crate::types::{
    BackupStatus, ConsistencyLevel, DataObject, NodeStats, ObjectWriteFailure, QueryHit, TenantName,
    Timestamp, TtlEntry, TtlRecord,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Gateway implementation backed by the cluster's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    data_base: String,
    control_base: String,
}

#[derive(Serialize)]
struct CreateTenantsRequest<'a> {
    tenants: &'a [TenantName],
}

#[derive(Serialize)]
struct UpdateTenantsRequest {
    updates: Vec<TenantStatusDto>,
}

#[derive(Serialize, Deserialize)]
struct TenantStatusDto {
    name: TenantName,
    activity_status: ActivityStatus,
}

#[derive(Deserialize)]
struct TenantListResponse {
    tenants: Vec<TenantStatusDto>,
}

#[derive(Serialize)]
struct TenantNamesRequest<'a> {
    names: &'a [TenantName],
}

#[derive(Serialize)]
struct ObjectBatchRequest<'a> {
    objects: &'a [DataObject],
}

#[derive(Deserialize)]
struct BatchFailuresResponse {
    #[serde(default)]
    failures: Vec<ObjectWriteFailure>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    consistency: Option<ConsistencyLevel>,
}

#[derive(Deserialize)]
struct QueryResponse {
    hits: Vec<QueryHit>,
}

#[derive(Deserialize)]
struct NodeStatsResponse {
    nodes: Vec<NodeStats>,
}

#[derive(Serialize)]
struct TtlBatchRequest<'a> {
    records: &'a [TtlRecord],
}

#[derive(Deserialize)]
struct TtlExpiredResponse {
    entries: Vec<TtlEntry>,
}

#[derive(Serialize)]
struct TtlRefreshRequest<'a> {
    tenant_name: &'a TenantName,
    expiration: Timestamp,
}

#[derive(Deserialize)]
struct BackupStatusResponse {
    status: BackupStatus,
}

impl HttpGateway {
    /// Build a gateway client for the configured endpoints.
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(240))
            .connect_timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            data_base: format!("http://{}:{}", config.host, config.port),
            control_base: format!("http://{}:{}", config.control_host, config.control_port),
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
        let response = Self::check_status(response).await?;
        response.json::<T>().await.map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> GatewayResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Backend(format!("{status}: {body}")))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

#[async_trait]
impl TenantStore for HttpGateway {
    async fn create_tenants(&self, names: &[TenantName]) -> GatewayResult<()> {
        let url = format!("{}/v1/tenants", self.control_base);
        let response = self.client.post(url).json(&CreateTenantsRequest { tenants: names }).send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn update_tenants(&self, updates: &[(TenantName, ActivityStatus)]) -> GatewayResult<()> {
        let url = format!("{}/v1/tenants/status", self.control_base);
        let body = UpdateTenantsRequest {
            updates: updates
                .iter()
                .map(|(name, status)| TenantStatusDto { name: name.clone(), activity_status: *status })
                .collect(),
        };
        let response = self.client.put(url).json(&body).send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn get_tenants(&self) -> GatewayResult<HashMap<TenantName, ActivityStatus>> {
        let url = format!("{}/v1/tenants", self.control_base);
        let listing: TenantListResponse = Self::decode(self.client.get(url).send().await?).await?;
        Ok(listing.tenants.into_iter().map(|t| (t.name, t.activity_status)).collect())
    }

    async fn get_tenants_by_name(
        &self,
        names: &[TenantName],
    ) -> GatewayResult<HashMap<TenantName, ActivityStatus>> {
        let url = format!("{}/v1/tenants/by-name", self.control_base);
        let response = self.client.post(url).json(&TenantNamesRequest { names }).send().await?;
        let listing: TenantListResponse = Self::decode(response).await?;
        Ok(listing.tenants.into_iter().map(|t| (t.name, t.activity_status)).collect())
    }

    async fn upsert_objects(
        &self,
        tenant: &TenantName,
        objects: &[DataObject],
    ) -> GatewayResult<Vec<ObjectWriteFailure>> {
        let url = format!("{}/v1/objects/{}/batch", self.data_base, tenant);
        let response = self.client.post(url).json(&ObjectBatchRequest { objects }).send().await?;
        let failures: BatchFailuresResponse = Self::decode(response).await?;
        Ok(failures.failures)
    }

    async fn query_similar(
        &self,
        tenant: &TenantName,
        vector: &[f32],
        limit: usize,
        consistency: Option<ConsistencyLevel>,
    ) -> GatewayResult<Vec<QueryHit>> {
        let url = format!("{}/v1/query/{}", self.data_base, tenant);
        let response = self
            .client
            .post(url)
            .json(&QueryRequest { vector, limit, consistency })
            .send()
            .await?;
        let result: QueryResponse = Self::decode(response).await?;
        Ok(result.hits)
    }

    async fn node_stats(&self) -> GatewayResult<Vec<NodeStats>> {
        let url = format!("{}/v1/cluster/stats", self.control_base);
        let stats: NodeStatsResponse = Self::decode(self.client.get(url).send().await?).await?;
        Ok(stats.nodes)
    }

    async fn put_ttl_records(&self, records: &[TtlRecord]) -> GatewayResult<Vec<ObjectWriteFailure>> {
        let url = format!("{}/v1/ttl/batch", self.data_base);
        let response = self.client.post(url).json(&TtlBatchRequest { records }).send().await?;
        let failures: BatchFailuresResponse = Self::decode(response).await?;
        Ok(failures.failures)
    }

    async fn expired_ttl_records(&self, now: Timestamp, limit: usize) -> GatewayResult<Vec<TtlEntry>> {
        let url = format!("{}/v1/ttl/expired", self.data_base);
        let response = self
            .client
            .get(url)
            .query(&[("now", now.to_rfc3339()), ("limit", limit.to_string())])
            .send()
            .await?;
        let expired: TtlExpiredResponse = Self::decode(response).await?;
        Ok(expired.entries)
    }

    async fn delete_ttl_record(&self, id: Uuid) -> GatewayResult<()> {
        let url = format!("{}/v1/ttl/{}", self.data_base, id);
        let response = self.client.delete(url).send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn refresh_ttl(&self, tenant: &TenantName, expiration: Timestamp) -> GatewayResult<()> {
        let url = format!("{}/v1/ttl/refresh", self.data_base);
        let response = self
            .client
            .put(url)
            .json(&TtlRefreshRequest { tenant_name: tenant, expiration })
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn create_backup(&self, id: &str) -> GatewayResult<BackupStatus> {
        let url = format!("{}/v1/backups/{}", self.control_base, id);
        let status: BackupStatusResponse = Self::decode(self.client.post(url).send().await?).await?;
        Ok(status.status)
    }

    async fn backup_status(&self, id: &str) -> GatewayResult<BackupStatus> {
        let url = format!("{}/v1/backups/{}", self.control_base, id);
        let status: BackupStatusResponse = Self::decode(self.client.get(url).send().await?).await?;
        Ok(status.status)
    }

    async fn restore_backup(&self, id: &str) -> GatewayResult<BackupStatus> {
        let url = format!("{}/v1/backups/{}/restore", self.control_base, id);
        let status: BackupStatusResponse = Self::decode(self.client.post(url).send().await?).await?;
        Ok(status.status)
    }

    async fn restore_status(&self, id: &str) -> GatewayResult<BackupStatus> {
        let url = format!("{}/v1/backups/{}/restore", self.control_base, id);
        let status: BackupStatusResponse = Self::decode(self.client.get(url).send().await?).await?;
        Ok(status.status)
    }
}
