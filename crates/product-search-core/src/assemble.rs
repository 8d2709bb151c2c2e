//! Response assembly. Pure; no I/O.

use serde_json::Value;

use crate::index::ScoredProduct;
use crate::models::{ProductResult, SearchResponse, StructuredQuery};
use crate::vocabulary::Vocabulary;

/// Stringify a relevance score for transport.
///
/// Uses the shortest representation that parses back to the same `f64`,
/// so `0.92` becomes `"0.92"` and nothing is lost.
pub fn format_score(score: f64) -> String {
    score.to_string()
}

/// Copy a product's stored metadata verbatim and add its `score`.
///
/// A stored field named `score` is replaced by the relevance score.
pub fn to_product(product: ScoredProduct) -> ProductResult {
    let mut fields = product.metadata;
    fields.insert("score".to_string(), Value::String(format_score(product.score)));
    ProductResult { fields }
}

/// Build the response envelope for one request.
///
/// `available_brands` is the vocabulary's list for the query's category,
/// empty when the category is unknown.
pub fn assemble(
    query: StructuredQuery,
    results: Vec<ScoredProduct>,
    vocabulary: &Vocabulary,
) -> SearchResponse {
    let available_brands = vocabulary.brands_for(&query.product_category).to_vec();
    SearchResponse {
        products: results.into_iter().map(to_product).collect(),
        query,
        available_brands,
    }
}
