//! Astra DB vector index over the Data API.
//!
//! Each search embeds the query text, then issues a single `find` command
//! sorted by `$vector` with `includeSimilarity`, constrained by the
//! retrieval filter on the document's `metadata` fields:
//!
//! ```json
//! { "find": {
//!     "filter":  { "metadata.brand": "Stanley" },
//!     "sort":    { "$vector": [0.01, ...] },
//!     "options": { "limit": 10, "includeSimilarity": true } } }
//! ```
//!
//! The index is read-only from this service's point of view.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use product_search_core::embedding::Embedder;
use product_search_core::index::{RetrievalFilter, ScoredProduct, VectorIndex};
use serde_json::{json, Map, Value};

use crate::config::{AstraCredentials, IndexConfig};
use crate::openai::transport_error;

/// Field under which product metadata is stored in each document.
const METADATA_FIELD: &str = "metadata";

/// Vector index backed by an Astra DB collection.
pub struct AstraIndex {
    client: reqwest::Client,
    url: String,
    token: String,
    embedder: Arc<dyn Embedder>,
}

impl AstraIndex {
    pub fn new(
        config: &IndexConfig,
        credentials: &AstraCredentials,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let endpoint = config
            .api_endpoint
            .as_deref()
            .ok_or_else(|| anyhow!("index.api_endpoint required for Astra provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        tracing::info!(
            client_id = %credentials.client_id,
            keyspace = %config.keyspace,
            collection = %config.collection,
            "using Astra DB index"
        );

        Ok(Self {
            client,
            url: collection_url(endpoint, &config.keyspace, &config.collection),
            token: credentials.client_secret.clone(),
            embedder,
        })
    }
}

/// `{endpoint}/api/json/v1/{keyspace}/{collection}`
pub fn collection_url(endpoint: &str, keyspace: &str, collection: &str) -> String {
    format!(
        "{}/api/json/v1/{}/{}",
        endpoint.trim_end_matches('/'),
        keyspace,
        collection
    )
}

/// Build the `find` command for one similarity query.
pub fn find_command(vector: &[f32], k: usize, filter: &RetrievalFilter) -> Value {
    let filter: Map<String, Value> = filter
        .iter()
        .map(|(key, value)| (format!("{}.{}", METADATA_FIELD, key), json!(value)))
        .collect();

    json!({
        "find": {
            "filter": filter,
            "sort": { "$vector": vector },
            "options": { "limit": k, "includeSimilarity": true }
        }
    })
}

/// Parse a `find` response into scored products, keeping the API's order.
pub fn parse_find_response(json: &Value) -> Result<Vec<ScoredProduct>> {
    if let Some(errors) = json.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
                .collect();
            bail!("Astra DB error: {}", messages.join("; "));
        }
    }

    let documents = json
        .get("data")
        .and_then(|d| d.get("documents"))
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid Astra DB response: missing data.documents"))?;

    documents
        .iter()
        .map(|doc| {
            let obj = doc
                .as_object()
                .ok_or_else(|| anyhow!("Invalid Astra DB response: document is not an object"))?;
            let score = obj
                .get("$similarity")
                .and_then(Value::as_f64)
                .ok_or_else(|| anyhow!("Invalid Astra DB response: missing $similarity"))?;

            let metadata = match obj.get(METADATA_FIELD) {
                Some(Value::Object(m)) => m.clone(),
                _ => obj
                    .iter()
                    .filter(|(k, _)| !matches!(k.as_str(), "_id" | "$vector" | "$similarity"))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            };

            Ok(ScoredProduct { metadata, score })
        })
        .collect()
}

#[async_trait]
impl VectorIndex for AstraIndex {
    fn name(&self) -> &str {
        "astra"
    }

    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
        filter: &RetrievalFilter,
    ) -> Result<Vec<ScoredProduct>> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .with_context(|| format!("embedding with {} failed", self.embedder.model_name()))?;

        let body = find_command(&vector, k, filter);
        let response = self
            .client
            .post(&self.url)
            .header("Token", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Astra DB", e, "Astra DB request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Astra DB error {}: {}", status, body_text);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| transport_error("Astra DB", e, "invalid JSON in Astra DB response"))?;
        parse_find_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_url() {
        assert_eq!(
            collection_url("https://db-us.apps.astra.datastax.com/", "ecommerce", "central_openai_en"),
            "https://db-us.apps.astra.datastax.com/api/json/v1/ecommerce/central_openai_en"
        );
    }

    #[test]
    fn test_find_command_prefixes_metadata() {
        let mut filter = RetrievalFilter::new();
        filter.insert("brand", "Stanley");
        filter.insert("product_categories", "เครื่องมือช่าง");
        let cmd = find_command(&[0.5, -0.25], 10, &filter);
        let find = &cmd["find"];
        assert_eq!(find["filter"]["metadata.brand"], "Stanley");
        assert_eq!(find["filter"]["metadata.product_categories"], "เครื่องมือช่าง");
        assert_eq!(find["sort"]["$vector"], json!([0.5, -0.25]));
        assert_eq!(find["options"]["limit"], 10);
        assert_eq!(find["options"]["includeSimilarity"], true);
    }

    #[test]
    fn test_find_command_empty_filter() {
        let cmd = find_command(&[1.0], 3, &RetrievalFilter::new());
        assert_eq!(cmd["find"]["filter"], json!({}));
    }

    #[test]
    fn test_parse_documents() {
        let resp = json!({
            "data": {
                "documents": [
                    {
                        "_id": "1",
                        "$similarity": 0.93,
                        "content": "Stanley 6-piece screwdriver set",
                        "metadata": {"product_id": "sd-1", "brand": "Stanley", "sale_price": 390}
                    },
                    {
                        "_id": "2",
                        "$similarity": 0.81,
                        "$vector": [0.1],
                        "product_id": "sd-2",
                        "brand": "Bosch"
                    }
                ],
                "nextPageState": null
            }
        });
        let products = parse_find_response(&resp).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].score, 0.93);
        assert_eq!(products[0].metadata["product_id"], "sd-1");
        assert_eq!(products[0].metadata["sale_price"], 390);
        assert!(!products[0].metadata.contains_key("content"));

        assert_eq!(products[1].metadata["product_id"], "sd-2");
        assert!(!products[1].metadata.contains_key("_id"));
        assert!(!products[1].metadata.contains_key("$vector"));
        assert!(!products[1].metadata.contains_key("$similarity"));
    }

    #[test]
    fn test_parse_errors() {
        let resp = json!({"errors": [{"message": "Collection does not exist", "errorCode": "COLLECTION_NOT_EXIST"}]});
        let err = parse_find_response(&resp).unwrap_err();
        assert!(err.to_string().contains("Collection does not exist"));

        assert!(parse_find_response(&json!({"data": {}})).is_err());
        assert!(parse_find_response(&json!({"data": {"documents": [{"_id": "x"}]}})).is_err());
    }
}
