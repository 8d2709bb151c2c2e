//! Test doubles shared by unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::embedding::Embedder;
use crate::error::Timeout;
use crate::extract::{LanguageModel, StructuredOutputRequest};
use crate::index::{RetrievalFilter, ScoredProduct, VectorIndex};
use crate::models::StructuredQuery;
use crate::vocabulary::Vocabulary;

pub fn vocabulary() -> Vocabulary {
    Vocabulary::from_json(
        r#"[
            ["เครื่องมือช่าง", "hand tools"],
            ["เครื่องมือไฟฟ้า", "power tools"],
            ["สีทาบ้าน", "paint"]
        ]"#,
        r#"{
            "เครื่องมือช่าง": ["Stanley", "Bosch"],
            "เครื่องมือไฟฟ้า": ["Bosch", "Makita"]
        }"#,
    )
    .unwrap()
}

pub fn structured(category: &str, brand: Option<&str>) -> StructuredQuery {
    StructuredQuery {
        original_query: "query".to_string(),
        translated_query: None,
        product_category: category.to_string(),
        brand: brand.map(String::from),
        specs: BTreeMap::new(),
    }
}

pub fn product(id: &str, score: f64) -> ScoredProduct {
    let mut metadata = Map::new();
    metadata.insert("product_id".to_string(), json!(id));
    ScoredProduct { metadata, score }
}

/// Canned result for a mock call.
#[derive(Clone)]
enum Outcome<T> {
    Answer(T),
    Fail(String),
    TimedOut(&'static str),
}

impl<T: Clone> Outcome<T> {
    fn result(&self) -> Result<T> {
        match self {
            Outcome::Answer(v) => Ok(v.clone()),
            Outcome::Fail(m) => Err(anyhow!(m.clone())),
            Outcome::TimedOut(service) => Err(anyhow::Error::new(Timeout::new(service))),
        }
    }
}

/// Owned copy of a structured-output request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub schema: Value,
}

/// Language model that returns a canned answer or error and counts calls.
pub struct MockModel {
    answer: Outcome<Value>,
    calls: AtomicUsize,
    last: Mutex<Option<RecordedRequest>>,
}

impl MockModel {
    pub fn answering(answer: Value) -> Self {
        Self {
            answer: Outcome::Answer(answer),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Outcome::Fail(message.to_string()),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn timing_out() -> Self {
        Self {
            answer: Outcome::TimedOut("mock model"),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn structured_output(&self, request: &StructuredOutputRequest<'_>) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(RecordedRequest {
            system_prompt: request.system_prompt.to_string(),
            user_message: request.user_message.to_string(),
            schema: request.schema.clone(),
        });
        self.answer.result()
    }
}

/// Vector index that returns canned results and records each call.
pub struct MockIndex {
    results: Outcome<Vec<ScoredProduct>>,
    calls: AtomicUsize,
    last: Mutex<Option<(String, usize, RetrievalFilter)>>,
}

impl MockIndex {
    pub fn returning(results: Vec<ScoredProduct>) -> Self {
        Self {
            results: Outcome::Answer(results),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            results: Outcome::Fail(message.to_string()),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn timing_out() -> Self {
        Self {
            results: Outcome::TimedOut("mock index"),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_call(&self) -> Option<(String, usize, RetrievalFilter)> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for MockIndex {
    fn name(&self) -> &str {
        "mock"
    }

    async fn similarity_search(
        &self,
        text: &str,
        k: usize,
        filter: &RetrievalFilter,
    ) -> Result<Vec<ScoredProduct>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((text.to_string(), k, filter.clone()));
        self.results.result()
    }
}

/// Embedder that maps every text to the same vector.
pub struct FixedEmbedder {
    vector: Vec<f32>,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}
