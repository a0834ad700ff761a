//! # Disease-to-Remedy Index
//!
//! Static reference data about crop diseases and the active ingredients that
//! treat them, and the two-pass matching that marks catalog products as
//! "Đề xuất Wiki" (wiki-recommended).
//!
//! ## Matching
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  query "vàng lá"                                                        │
//! │       │                                                                 │
//! │       ▼  pass 1: folded substring of disease name / description         │
//! │  [ "Vàng lá chín sớm" ]                                                 │
//! │       │                                                                 │
//! │       ▼  union of recommended ingredients                               │
//! │  { "Azoxystrobin", "Propiconazole", ... }                               │
//! │       │                                                                 │
//! │       ▼  pass 2: folded substring of product active ingredient          │
//! │  products: [recommended..., others...]   (stable otherwise)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both passes are plain substring checks on folded text (lowercase, no
//! diacritics). "Azoxy" in a disease record matches "Azoxystrobin 200g/l".

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::catalog::Product;
use crate::error::{CoreError, CoreResult};
use crate::text::{contains_folded, fold};

/// Built-in reference set, used when no file is configured.
const BUILTIN_DISEASES: &str = include_str!("../data/diseases.toml");

// =============================================================================
// Disease Record
// =============================================================================

/// One disease entry of the reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiseaseRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub cause: String,
    #[serde(default)]
    pub recommended_ingredients: Vec<String>,
    #[serde(default)]
    pub stages: Vec<String>,
}

impl DiseaseRecord {
    /// Pass 1: does the folded query occur in the name or description?
    pub fn matches(&self, folded_query: &str) -> bool {
        contains_folded(&self.name, folded_query) || contains_folded(&self.description, folded_query)
    }
}

#[derive(Debug, Deserialize)]
struct DiseaseFile {
    #[serde(default, rename = "disease")]
    diseases: Vec<DiseaseRecord>,
}

// =============================================================================
// Index
// =============================================================================

/// A catalog product with its recommendation flag.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedProduct {
    pub product: Product,
    pub recommended: bool,
}

/// Immutable set of disease records.
#[derive(Debug, Clone, Default)]
pub struct DiseaseIndex {
    records: Vec<DiseaseRecord>,
}

impl DiseaseIndex {
    pub fn new(records: Vec<DiseaseRecord>) -> Self {
        DiseaseIndex { records }
    }

    /// The reference set compiled into the binary.
    pub fn builtin() -> CoreResult<Self> {
        Self::from_toml_str(BUILTIN_DISEASES)
    }

    /// Parses `[[disease]]` tables.
    pub fn from_toml_str(input: &str) -> CoreResult<Self> {
        let file: DiseaseFile =
            toml::from_str(input).map_err(|e| CoreError::InvalidReferenceData(e.to_string()))?;
        Self::checked(file.diseases)
    }

    /// Parses a JSON array of records.
    pub fn from_json_str(input: &str) -> CoreResult<Self> {
        let records: Vec<DiseaseRecord> = serde_json::from_str(input)
            .map_err(|e| CoreError::InvalidReferenceData(e.to_string()))?;
        Self::checked(records)
    }

    fn checked(records: Vec<DiseaseRecord>) -> CoreResult<Self> {
        for (i, record) in records.iter().enumerate() {
            if record.id.trim().is_empty() || record.name.trim().is_empty() {
                return Err(CoreError::InvalidReferenceData(format!(
                    "record #{} needs an id and a name",
                    i + 1
                )));
            }
            if records[..i].iter().any(|r| r.id == record.id) {
                return Err(CoreError::InvalidReferenceData(format!(
                    "duplicate disease id '{}'",
                    record.id
                )));
            }
        }
        Ok(DiseaseIndex { records })
    }

    pub fn records(&self) -> &[DiseaseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&DiseaseRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Pass 1: diseases whose name or description contains the query.
    pub fn match_query(&self, query: &str) -> Vec<&DiseaseRecord> {
        let folded = fold(query);
        if folded.is_empty() {
            return Vec::new();
        }
        self.records.iter().filter(|r| r.matches(&folded)).collect()
    }

    /// Union of recommended ingredients over the given diseases, folded and
    /// de-duplicated, in first-seen order.
    pub fn recommended_ingredients(diseases: &[&DiseaseRecord]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for ingredient in diseases.iter().flat_map(|d| d.recommended_ingredients.iter()) {
            let folded = fold(ingredient);
            if !folded.is_empty() && !out.contains(&folded) {
                out.push(folded);
            }
        }
        out
    }

    /// Runs both passes and orders `products` with recommended ones first.
    /// Relative order inside each group is the catalog's.
    pub fn rank(&self, query: &str, products: Vec<Product>) -> (Vec<&DiseaseRecord>, Vec<RankedProduct>) {
        let diseases = self.match_query(query);
        let ingredients = Self::recommended_ingredients(&diseases);

        let (mut recommended, others): (Vec<_>, Vec<_>) = products
            .into_iter()
            .map(|product| {
                let recommended = is_recommended(&product, &ingredients);
                RankedProduct {
                    product,
                    recommended,
                }
            })
            .partition(|p| p.recommended);

        recommended.extend(others);
        (diseases, recommended)
    }
}

/// Pass 2: does any active-ingredient text of the product contain one of the
/// folded ingredients?
pub fn is_recommended(product: &Product, folded_ingredients: &[String]) -> bool {
    if folded_ingredients.is_empty() {
        return false;
    }
    product.active_ingredients().iter().any(|text| {
        folded_ingredients
            .iter()
            .any(|ingredient| contains_folded(text, ingredient))
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
