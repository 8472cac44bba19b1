use serde::{Deserialize, Serialize};

pub use wine::{
    CountryCount, PreferenceProfile, PriceRange, ScoredWine, VarietyCount, Wine, WineFilter,
};

mod wine;

/// Request structure for query-driven recommendations
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    /// Free-text description of the wine the user is after
    pub query: String,
    /// Optional hard constraints on the candidate set
    #[serde(default)]
    pub filters: Option<WineFilter>,
    /// Optional number of recommendations to return
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Request structure for taste-based recommendations
#[derive(Debug, Clone, Deserialize)]
pub struct TasteRecommendationRequest {
    /// Ids of the wines the user picked
    pub selected_wines: Vec<u32>,
    /// Optional number of recommendations to return
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Response structure for query-driven recommendations
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<ScoredWine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_comment: Option<String>,
}

/// Response structure for taste-based recommendations
#[derive(Debug, Clone, Serialize)]
pub struct TasteRecommendationResponse {
    pub recommendations: Vec<ScoredWine>,
    pub preference_analysis: PreferenceProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_comment: Option<String>,
}

/// Facets payload for building search filters client-side
#[derive(Debug, Clone, Serialize)]
pub struct FiltersResponse {
    pub countries: Vec<String>,
    pub varieties: Vec<String>,
    pub price_range: PriceRange,
}

/// Compact listing entry for the catalog overview
#[derive(Debug, Clone, Serialize)]
pub struct WineSummary {
    pub id: u32,
    pub name: String,
    pub variety: Option<String>,
    pub country: Option<String>,
    pub price: f32,
    pub rating: f32,
    pub description: String,
}

impl From<&Wine> for WineSummary {
    fn from(wine: &Wine) -> Self {
        Self {
            id: wine.id,
            name: wine.title.clone(),
            variety: wine.variety.clone(),
            country: wine.country.clone(),
            price: wine.price,
            rating: wine.rating,
            description: wine.description.clone(),
        }
    }
}

/// Health check response structure
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairingResponse {
    pub pairing: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OccasionResponse {
    pub occasion: String,
}
