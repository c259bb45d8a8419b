//! Pinecone REST backend. Talks directly to an index host; vectors carry
//! the chunk payload as flat metadata and live under a configured namespace.

#[cfg(test)]
mod tests;

use anyhow::Context;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::PineconeConfig;
use crate::vector::transport::{self, Method};
use crate::vector::{BackendStats, ChunkPayload, ScoredMatch, VectorBackend, VectorRecord};
use crate::{RagError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PineconeBackend {
    host: String,
    api_key: String,
    namespace: String,
    agent: ureq::Agent,
}

impl PineconeBackend {
    #[inline]
    pub fn new(config: &PineconeConfig) -> Result<Self> {
        let api_key = config
            .api_key()
            .map_err(|e| RagError::Config(e.to_string()))?;
        Ok(Self {
            host: transport::normalize_base(&config.index_host),
            api_key,
            namespace: config.namespace.clone(),
            agent: ureq::Agent::config_builder()
                .timeout_global(Some(REQUEST_TIMEOUT))
                .build()
                .into(),
        })
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Api-Key", self.api_key.clone()),
            ("Content-Type", "application/json".to_string()),
        ]
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        transport::send_json(
            &self.agent,
            Method::Post,
            &format!("{}{}", self.host, path),
            &self.headers(),
            Some(body),
        )
        .map_err(|e| RagError::Retrieval(format!("Pinecone request failed: {}", e)))
    }
}

impl VectorBackend for PineconeBackend {
    #[inline]
    fn name(&self) -> &'static str {
        "pinecone"
    }

    #[inline]
    fn initialize(&self) -> Result<()> {
        // Index creation is managed in the Pinecone console; a stats call
        // both verifies connectivity and validates the API key.
        self.post("/describe_index_stats", &json!({}))?;
        Ok(())
    }

    #[inline]
    fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let vectors: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "values": record.values,
                    "metadata": {
                        "chunk_id": record.payload.chunk_id,
                        "document_id": record.payload.document_id,
                        "session_id": record.payload.session_id,
                        "file_name": record.payload.file_name,
                        "chunk_index": record.payload.chunk_index,
                        "text": record.payload.text,
                    },
                })
            })
            .collect();

        self.post(
            "/vectors/upsert",
            &json!({ "vectors": vectors, "namespace": self.namespace }),
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
            "topK": top_k,
            "includeMetadata": true,
            "namespace": self.namespace,
        });
        if let Some(sid) = session_id {
            body["filter"] = json!({ "session_id": { "$eq": sid } });
        }

        let response = self.post("/query", &body)?;
        let matches = response["matches"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(parse_match)
            .collect();
        Ok(matches)
    }

    #[inline]
    fn delete_by_document(&self, document_id: &str) -> Result<()> {
        self.post(
            "/vectors/delete",
            &json!({
                "filter": { "document_id": { "$eq": document_id } },
                "namespace": self.namespace,
            }),
        )?;
        Ok(())
    }

    #[inline]
    fn stats(&self) -> Result<BackendStats> {
        let response = self.post("/describe_index_stats", &json!({}))?;
        Ok(BackendStats {
            total_vectors: response["totalVectorCount"].as_u64().unwrap_or(0),
            dimension: u32::try_from(response["dimension"].as_u64().unwrap_or(0))
                .context("Index dimension out of range")
                .map_err(|e| RagError::Retrieval(e.to_string()))?,
        })
    }
}

fn parse_match(value: &Value) -> Option<ScoredMatch> {
    let metadata = &value["metadata"];
    Some(ScoredMatch {
        id: value["id"].as_str()?.to_string(),
        score: value["score"].as_f64()? as f32,
        payload: ChunkPayload {
            chunk_id: metadata["chunk_id"].as_str().unwrap_or_default().to_string(),
            document_id: metadata["document_id"].as_str()?.to_string(),
            session_id: metadata["session_id"].as_str().unwrap_or_default().to_string(),
            file_name: metadata["file_name"].as_str().unwrap_or_default().to_string(),
            chunk_index: metadata["chunk_index"].as_u64().unwrap_or(0) as usize,
            text: metadata["text"].as_str().unwrap_or_default().to_string(),
        },
    })
}
