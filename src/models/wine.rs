use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Parses a float that may arrive as a string, a number, or an empty CSV
/// field. Unparseable values become 0.0 so the loader can substitute a
/// placeholder instead of rejecting the row.
fn deserialize_lenient_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f32),
        Null,
    }

    match StringOrFloat::deserialize(deserializer)? {
        StringOrFloat::String(s) => Ok(f32::from_str(s.trim()).unwrap_or(0.0)),
        StringOrFloat::Float(f) => Ok(f),
        StringOrFloat::Null => Ok(0.0),
    }
}

fn default_f32() -> f32 {
    0.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wine {
    /// Assigned from the row position when the source has no id column.
    #[serde(default)]
    pub id: u32,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, alias = "region_1", alias = "province")]
    pub region: Option<String>,
    #[serde(default)]
    pub winery: Option<String>,
    #[serde(
        default = "default_f32",
        deserialize_with = "deserialize_lenient_f32"
    )]
    pub price: f32,
    #[serde(
        alias = "points",
        default = "default_f32",
        deserialize_with = "deserialize_lenient_f32"
    )]
    pub rating: f32,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor_profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tannins: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acidity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aroma: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing_suggestions: Option<String>,
}

/// A catalog record paired with its relevance score for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredWine {
    #[serde(flatten)]
    pub wine: Wine,
    pub similarity_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_comment: Option<String>,
}

impl ScoredWine {
    pub fn new(wine: Wine, similarity_score: f32) -> Self {
        Self {
            wine,
            similarity_score,
            llm_comment: None,
        }
    }
}

/// Hard constraints applied before ranking. Every present field must hold
/// for a record to stay in the candidate set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WineFilter {
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, alias = "maxPrice")]
    pub max_price: Option<f32>,
}

impl WineFilter {
    pub fn is_empty(&self) -> bool {
        self.variety.is_none() && self.country.is_none() && self.max_price.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarietyCount {
    pub variety: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub count: usize,
}

/// Taste profile derived from a set of selected wines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceProfile {
    pub favorite_varieties: Vec<VarietyCount>,
    pub preferred_countries: Vec<CountryCount>,
    pub average_price: f32,
    pub average_rating: f32,
    pub price_range: PriceRange,
}

impl PreferenceProfile {
    /// The profile of an empty selection.
    pub fn empty() -> Self {
        Self {
            favorite_varieties: Vec::new(),
            preferred_countries: Vec::new(),
            average_price: 0.0,
            average_rating: 0.0,
            price_range: PriceRange { min: 0.0, max: 0.0 },
        }
    }
}
