//! Controlled vocabulary of product categories and brands.
//!
//! Loaded once at startup from two JSON documents and never mutated:
//!
//! - the **category list**, an array of `[localized, canonical]` name pairs,
//!   e.g. `[["เครื่องมือช่าง", "hand tools"], ...]`;
//! - the **brand map**, an object from localized category name to the
//!   brands sold in that category, e.g. `{"เครื่องมือช่าง": ["Stanley"]}`.
//!
//! The language model works with canonical (English) names, while the
//! index stores products under the localized name, so the vocabulary is
//! also the bridge between the two.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::ConfigError;

/// One category: its canonical identifier and its localized display form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    pub canonical: String,
    pub localized: String,
}

/// Immutable category and brand lookup tables.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    categories: Vec<CategoryEntry>,
    by_canonical: HashMap<String, usize>,
    brands_by_localized: HashMap<String, Vec<String>>,
    /// Lowercased brand name → spelling used in the brand map.
    known_brands: HashMap<String, String>,
}

impl Vocabulary {
    /// Read and validate both vocabulary files.
    pub fn load(categories_path: &Path, brands_path: &Path) -> Result<Self, ConfigError> {
        let categories = read(categories_path)?;
        let brands = read(brands_path)?;
        Self::from_json(&categories, &brands)
    }

    /// Parse both vocabulary documents from JSON text.
    pub fn from_json(categories_json: &str, brands_json: &str) -> Result<Self, ConfigError> {
        let pairs: Vec<(String, String)> =
            serde_json::from_str(categories_json).map_err(|source| ConfigError::Parse {
                what: "category list",
                source,
            })?;
        let brands: HashMap<String, Vec<String>> =
            serde_json::from_str(brands_json).map_err(|source| ConfigError::Parse {
                what: "brand map",
                source,
            })?;
        Self::new(pairs, brands)
    }

    /// Build from `(localized, canonical)` pairs and a localized-keyed brand map.
    pub fn new(
        pairs: Vec<(String, String)>,
        brands_by_localized: HashMap<String, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        let mut categories = Vec::with_capacity(pairs.len());
        let mut by_canonical = HashMap::with_capacity(pairs.len());

        for (localized, canonical) in pairs {
            let localized = localized.trim().to_string();
            let canonical = canonical.trim().to_string();
            if localized.is_empty() || canonical.is_empty() {
                return Err(ConfigError::Vocabulary(
                    "category names must not be empty".to_string(),
                ));
            }
            if by_canonical.contains_key(&canonical) {
                return Err(ConfigError::Vocabulary(format!(
                    "duplicate category: {}",
                    canonical
                )));
            }
            by_canonical.insert(canonical.clone(), categories.len());
            categories.push(CategoryEntry {
                canonical,
                localized,
            });
        }

        let localized: HashSet<&str> = categories.iter().map(|c| c.localized.as_str()).collect();
        let mut trimmed = HashMap::with_capacity(brands_by_localized.len());
        let mut known_brands = HashMap::new();
        for (category, brands) in brands_by_localized {
            let category = category.trim().to_string();
            if !localized.contains(category.as_str()) {
                tracing::warn!(category = %category, "brand list for a category that is not in the category list");
            }
            let brands: Vec<String> = brands
                .iter()
                .map(|b| b.trim())
                .filter(|b| !b.is_empty())
                .map(String::from)
                .collect();
            for brand in &brands {
                known_brands
                    .entry(brand.to_lowercase())
                    .or_insert_with(|| brand.clone());
            }
            if trimmed.insert(category.clone(), brands).is_some() {
                return Err(ConfigError::Vocabulary(format!(
                    "duplicate brand list for category: {}",
                    category
                )));
            }
        }
        let brands_by_localized = trimmed;

        Ok(Self {
            categories,
            by_canonical,
            brands_by_localized,
            known_brands,
        })
    }

    /// Canonical category names, in file order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.canonical.as_str())
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.categories
    }

    pub fn contains_category(&self, canonical: &str) -> bool {
        self.by_canonical.contains_key(canonical)
    }

    /// The localized name the index stores for a canonical category.
    pub fn localized(&self, canonical: &str) -> Option<&str> {
        self.by_canonical
            .get(canonical)
            .map(|&i| self.categories[i].localized.as_str())
    }

    /// Brands known for a canonical category. Empty for unknown categories.
    pub fn brands_for(&self, canonical: &str) -> &[String] {
        self.localized(canonical)
            .and_then(|l| self.brands_by_localized.get(l))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Look up a brand anywhere in the brand map, case-insensitively.
    ///
    /// Returns the vocabulary's own spelling.
    pub fn known_brand(&self, brand: &str) -> Option<&str> {
        self.known_brands
            .get(&brand.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Look up a brand within one category's list, case-insensitively.
    pub fn known_brand_in(&self, canonical: &str, brand: &str) -> Option<&str> {
        let needle = brand.trim().to_lowercase();
        self.brands_for(canonical)
            .iter()
            .find(|b| b.trim().to_lowercase() == needle)
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
