//! HTTP client for the knowledge-base service

use super::endpoints;
use super::types::{Resource, ResourceKey, ResourcePayload, SearchQuery};
use super::{KnowledgeBase, RemoteResult};
use crate::config::{EndpointConfig, Target};
use async_trait::async_trait;
use kbm_common::{ErrorKind, KbmError, RemoteError};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Header carrying the service-account key
const AUTH_HEADER: &str = "X-NUCLIA-SERVICEACCOUNT";

#[derive(Debug, Deserialize)]
struct CreatedResource {
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    resources: BTreeMap<String, Resource>,
}

/// Knowledge-base client over the service's REST API
pub struct NucliaClient {
    client: Client,
    base_url: String,
}

impl NucliaClient {
    pub fn new(config: &EndpointConfig) -> kbm_common::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| KbmError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder, target: &Target) -> RequestBuilder {
        request.header(AUTH_HEADER, format!("Bearer {}", target.api_key))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> RemoteResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::new(
            ErrorKind::from_status(status.as_u16()),
            format!("{} returned {}: {}", what, status, body.trim()),
        ))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
        response
            .json()
            .await
            .map_err(|e| RemoteError::new(ErrorKind::Decode, e.to_string()))
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    let kind = if e.is_decode() {
        ErrorKind::Decode
    } else {
        ErrorKind::Network
    };
    RemoteError::new(kind, e.to_string())
}

#[async_trait]
impl KnowledgeBase for NucliaClient {
    async fn create(&self, target: &Target, payload: &ResourcePayload) -> RemoteResult<String> {
        let url = endpoints::resources_url(&self.base_url, &target.knowledge_box);
        let request = self.authorized(self.client.post(&url), target).json(payload);
        let response = self.send(request, "create").await?;
        let created: CreatedResource = Self::decode(response).await?;
        Ok(created.uuid)
    }

    async fn update(
        &self,
        target: &Target,
        key: &ResourceKey,
        payload: &ResourcePayload,
    ) -> RemoteResult<()> {
        let url = endpoints::resource_url(&self.base_url, &target.knowledge_box, key);
        let request = self.authorized(self.client.patch(&url), target).json(payload);
        self.send(request, "update").await?;
        Ok(())
    }

    async fn delete(&self, target: &Target, key: &ResourceKey) -> RemoteResult<()> {
        let url = endpoints::resource_url(&self.base_url, &target.knowledge_box, key);
        let request = self.authorized(self.client.delete(&url), target);
        self.send(request, "delete").await?;
        Ok(())
    }

    async fn get(&self, target: &Target, key: &ResourceKey) -> RemoteResult<Resource> {
        let url = endpoints::resource_url(&self.base_url, &target.knowledge_box, key);
        let request = self
            .authorized(self.client.get(&url), target)
            .query(&[("show", "basic"), ("show", "origin"), ("show", "extra")]);
        let response = self.send(request, "get").await?;
        Self::decode(response).await
    }

    async fn search(&self, target: &Target, query: &SearchQuery) -> RemoteResult<Vec<Resource>> {
        let url = endpoints::search_url(&self.base_url, &target.knowledge_box);
        let request = self.authorized(self.client.post(&url), target).json(query);
        let response = self.send(request, "search").await?;
        let results: SearchResponse = Self::decode(response).await?;
        Ok(results.resources.into_values().collect())
    }
}
