//! `psearch search`: run one query through the pipeline and print the result.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::service;

pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }

    let pipeline = service::build_pipeline(config)?;
    let response = pipeline.handle(query).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    if response.products.is_empty() {
        eprintln!("No products found.");
    }

    Ok(())
}
