//! Weaviate REST backend. Objects are stored with externally supplied
//! vectors (vectorizer "none") and queried through the GraphQL endpoint
//! with `nearVector`. Certainty is Weaviate's [0, 1] cosine mapping, so it
//! compares directly against the retrieval threshold.


use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::WeaviateConfig;
use crate::vector::transport::{self, Method};
use crate::vector::{BackendStats, ChunkPayload, ScoredMatch, VectorBackend, VectorRecord};
use crate::{RagError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WeaviateBackend {
    base_url: String,
    class_name: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl WeaviateBackend {
    #[inline]
    pub fn new(config: &WeaviateConfig) -> Result<Self> {
        Ok(Self {
            base_url: transport::normalize_base(&config.url),
            class_name: config.class_name.clone(),
            api_key: config.api_key(),
            agent: ureq::Agent::config_builder()
                .timeout_global(Some(REQUEST_TIMEOUT))
                .build()
                .into(),
        })
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Content-Type", "application/json".to_string())];
        if let Some(key) = &self.api_key {
            headers.push(("Authorization", format!("Bearer {}", key)));
        }
        headers
    }

    fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        transport::send_json(
            &self.agent,
            method,
            &format!("{}{}", self.base_url, path),
            &self.headers(),
            body,
        )
        .map_err(|e| RagError::Retrieval(format!("Weaviate request failed: {}", e)))
    }

    fn graphql(&self, query: String) -> Result<Value> {
        let response = self.send(Method::Post, "/v1/graphql", Some(&json!({ "query": query })))?;
        if let Some(errors) = response["errors"].as_array() {
            if !errors.is_empty() {
                return Err(RagError::Retrieval(format!(
                    "Weaviate GraphQL error: {}",
                    errors[0]["message"].as_str().unwrap_or("unknown")
                )));
            }
        }
        Ok(response)
    }
}

impl VectorBackend for WeaviateBackend {
    #[inline]
    fn name(&self) -> &'static str {
        "weaviate"
    }

    #[inline]
    fn initialize(&self) -> Result<()> {
        let path = format!("/v1/schema/{}", self.class_name);
        if self.send(Method::Get, &path, None).is_ok() {
            return Ok(());
        }

        info!("Creating Weaviate class {}", self.class_name);
        self.send(
            Method::Post,
            "/v1/schema",
            Some(&json!({
                "class": self.class_name,
                "vectorizer": "none",
                "properties": [
                    { "name": "chunk_id", "dataType": ["text"] },
                    { "name": "document_id", "dataType": ["text"] },
                    { "name": "session_id", "dataType": ["text"] },
                    { "name": "file_name", "dataType": ["text"] },
                    { "name": "chunk_index", "dataType": ["int"] },
                    { "name": "text", "dataType": ["text"] },
                ],
            })),
        )?;
        Ok(())
    }

    #[inline]
    fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let objects: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "class": self.class_name,
                    "id": Uuid::new_v5(&Uuid::NAMESPACE_OID, record.id.as_bytes()).to_string(),
                    "vector": record.values,
                    "properties": record.payload,
                })
            })
            .collect();

        self.send(Method::Post, "/v1/batch/objects", Some(&json!({ "objects": objects })))?;
        Ok(())
    }

    #[inline]
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        session_id: Option<&str>,
    ) -> Result<Vec<ScoredMatch>> {
        let vector_json = serde_json::to_string(vector)
            .map_err(|e| RagError::Retrieval(format!("Failed to encode query vector: {}", e)))?;
        let where_clause = session_id
            .map(|sid| {
                format!(
                    r#", where: {{path: ["session_id"], operator: Equal, valueText: "{}"}}"#,
                    sid.replace('"', "")
                )
            })
            .unwrap_or_default();

        let query = format!(
            "{{ Get {{ {class}(nearVector: {{vector: {vector}}}, limit: {limit}{filter}) \
             {{ chunk_id document_id session_id file_name chunk_index text \
             _additional {{ certainty }} }} }} }}",
            class = self.class_name,
            vector = vector_json,
            limit = top_k,
            filter = where_clause,
        );

        let response = self.graphql(query)?;
        let matches = response["data"]["Get"][&self.class_name]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(parse_object)
            .collect();
        Ok(matches)
    }

    #[inline]
    fn delete_by_document(&self, document_id: &str) -> Result<()> {
        self.send(
            Method::Delete,
            "/v1/batch/objects",
            Some(&json!({
                "match": {
                    "class": self.class_name,
                    "where": {
                        "path": ["document_id"],
                        "operator": "Equal",
                        "valueText": document_id,
                    },
                }
            })),
        )?;
        Ok(())
    }

    #[inline]
    fn stats(&self) -> Result<BackendStats> {
        let query = format!(
            "{{ Aggregate {{ {class} {{ meta {{ count }} }} }} }}",
            class = self.class_name
        );
        let response = self.graphql(query)?;
        let count = response["data"]["Aggregate"][&self.class_name][0]["meta"]["count"]
            .as_u64()
            .unwrap_or(0);
        // The schema does not expose the vector dimension.
        Ok(BackendStats {
            total_vectors: count,
            dimension: 0,
        })
    }
}

fn parse_object(value: &Value) -> Option<ScoredMatch> {
    Some(ScoredMatch {
        id: value["chunk_id"].as_str()?.to_string(),
        score: value["_additional"]["certainty"].as_f64()? as f32,
        payload: ChunkPayload {
            chunk_id: value["chunk_id"].as_str()?.to_string(),
            document_id: value["document_id"].as_str()?.to_string(),
            session_id: value["session_id"].as_str().unwrap_or_default().to_string(),
            file_name: value["file_name"].as_str().unwrap_or_default().to_string(),
            chunk_index: value["chunk_index"].as_u64().unwrap_or(0) as usize,
            text: value["text"].as_str().unwrap_or_default().to_string(),
        },
    })
}
