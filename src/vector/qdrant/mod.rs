//! Qdrant REST backend. Creates the collection on first use with cosine
//! distance. Qdrant requires UUID point ids, so chunk ids are mapped to
//! deterministic v5 UUIDs and the original id travels in the payload.


use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::QdrantConfig;
use crate::vector::transport::{self, Method};
use crate::vector::{BackendStats, ChunkPayload, ScoredMatch, VectorBackend, VectorRecord};
use crate::{RagError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct QdrantBackend {
    base_url: String,
    collection: String,
    api_key: Option<String>,
    dimension: u32,
    agent: ureq::Agent,
}

impl QdrantBackend {
    #[inline]
    pub fn new(config: &QdrantConfig, dimension: u32) -> Result<Self> {
        Ok(Self {
            base_url: transport::normalize_base(&config.url),
            collection: config.collection.clone(),
            api_key: config.api_key(),
            dimension,
            agent: ureq::Agent::config_builder()
                .timeout_global(Some(REQUEST_TIMEOUT))
                .build()
                .into(),
        })
    }

    /// Stable UUID for a chunk id, so repeated upserts overwrite in place.
    #[inline]
    pub fn point_id(chunk_id: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Content-Type", "application/json".to_string())];
        if let Some(key) = &self.api_key {
            headers.push(("api-key", key.clone()));
        }
        headers
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        transport::send_json(&self.agent, method, url, &self.headers(), body)
            .map_err(|e| RagError::Retrieval(format!("Qdrant request failed: {}", e)))
    }

    fn session_filter(session_id: Option<&str>) -> Option<Value> {
        session_id.map(|sid| {
            json!({
                "must": [{ "key": "session_id", "match": { "value": sid } }]
            })
        })
    }
}

impl VectorBackend for QdrantBackend {
    #[inline]
    fn name(&self) -> &'static str {
        "qdrant"
    }

    #[inline]
    fn initialize(&self) -> Result<()> {
        let url = self.collection_url("");
        match transport::send_json(&self.agent, Method::Get, &url, &self.headers(), None) {
            Ok(_) => Ok(()),
            Err(_) => {
                info!("Creating Qdrant collection {}", self.collection);
                self.send(
                    Method::Put,
                    &url,
                    Some(&json!({
                        "vectors": { "size": self.dimension, "distance": "Cosine" }
                    })),
                )?;
                Ok(())
            }
        }
    }

    #[inline]
    fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let points: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": Self::point_id(&record.id).to_string(),
                    "vector": record.values,
                    "payload": record.payload,
                })
            })
            .collect();

        self.send(
            Method::Put,
            &format!("{}?wait=true", self.collection_url("/points")),
            Some(&json!({ "points": points })),
        )?;
        Ok(())
    }

    #[inline]
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<ScoredMatch>> {
        let mut body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
        });
        if let Some(filter) = Self::session_filter(session_id) {
            body["filter"] = filter;
        }

        let response = self.send(Method::Post, &self.collection_url("/points/search"), Some(&body))?;
        let matches = response["result"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(parse_point)
            .collect();
        Ok(matches)
    }

    #[inline]
    fn delete_by_document(&self, document_id: &str) -> Result<()> {
        self.send(
            Method::Post,
            &format!("{}?wait=true", self.collection_url("/points/delete")),
            Some(&json!({
                "filter": {
                    "must": [{ "key": "document_id", "match": { "value": document_id } }]
                }
            })),
        )?;
        Ok(())
    }

    #[inline]
    fn stats(&self) -> Result<BackendStats> {
        let response = self.send(Method::Get, &self.collection_url(""), None)?;
        let result = &response["result"];
        Ok(BackendStats {
            total_vectors: result["points_count"].as_u64().unwrap_or(0),
            dimension: result["config"]["params"]["vectors"]["size"]
                .as_u64()
                .unwrap_or(0) as u32,
        })
    }
}

fn parse_point(value: &Value) -> Option<ScoredMatch> {
    let payload: ChunkPayload = serde_json::from_value(value["payload"].clone()).ok()?;
    Some(ScoredMatch {
        id: payload.chunk_id.clone(),
        score: value["score"].as_f64()? as f32,
        payload,
    })
}
