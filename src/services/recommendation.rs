use crate::catalog::{tokenize, CatalogIndex};
use crate::ml::{EmbeddingTable, TextEmbedder};
use crate::models::{PreferenceProfile, ScoredWine, Wine, WineFilter};
use crate::services::preferences::analyze_preferences;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Score assigned to every candidate when the query is blank and the
/// caller is browsing within filters.
const NEUTRAL_SCORE: f32 = 0.5;

const TITLE_WEIGHT: f32 = 1.0;
const VARIETY_WEIGHT: f32 = 0.6;
const COUNTRY_WEIGHT: f32 = 0.3;
const DESCRIPTION_WEIGHT: f32 = 0.3;
const HIGH_RATING_BONUS: f32 = 0.05;
const HIGH_RATING_THRESHOLD: f32 = 90.0;

const PROFILE_BASE_SCORE: f32 = 0.5;
const PROFILE_VARIETY_WEIGHT: f32 = 0.2;
const PROFILE_COUNTRY_WEIGHT: f32 = 0.15;
const PROFILE_PRICE_WEIGHT: f32 = 0.15;
const PROFILE_RATING_WEIGHT: f32 = 0.1;

/// Dot product over the product of magnitudes. Unequal lengths and zero
/// vectors compare as 0.0 rather than erroring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Result of a taste-based recommendation call.
pub struct TasteRecommendations {
    pub recommendations: Vec<ScoredWine>,
    pub profile: PreferenceProfile,
}

/// Ranks catalog records against a free-text query or a taste profile,
/// scoring with embedding cosine similarity when vectors are available
/// and degrading to keyword heuristics per call or per record otherwise.
pub struct RecommendationService {
    catalog: Arc<CatalogIndex>,
    embeddings: Option<EmbeddingTable>,
    embedder: Option<Arc<dyn TextEmbedder>>,
    embed_timeout: Duration,
}

impl RecommendationService {
    pub fn new(
        catalog: Arc<CatalogIndex>,
        embeddings: Option<EmbeddingTable>,
        embedder: Option<Arc<dyn TextEmbedder>>,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            embeddings,
            embedder,
            embed_timeout,
        }
    }

    /// Query-driven search over the filtered candidate set. Never fails:
    /// embedding problems degrade to keyword scoring transparently.
    pub async fn search(&self, query: &str, filter: &WineFilter, limit: usize) -> Vec<ScoredWine> {
        let candidates = self.catalog.apply_filters(filter);
        info!(
            "Searching wines for query '{}' ({} candidates after filters)",
            query,
            candidates.len()
        );

        let trimmed = query.trim();
        if trimmed.is_empty() {
            debug!("Blank query, browsing within filters at neutral score");
            return candidates
                .into_iter()
                .take(limit)
                .map(|wine| ScoredWine::new(wine.clone(), NEUTRAL_SCORE))
                .collect();
        }

        let tokens = tokenize(trimmed);
        let query_vector = self.embed_query(trimmed).await;

        let mut scored: Vec<ScoredWine> = candidates
            .into_iter()
            .map(|wine| {
                let score = match (&query_vector, &self.embeddings) {
                    (Some(query_vec), Some(table)) => match table.get(wine.id) {
                        Some(record_vec) => cosine_similarity(query_vec, record_vec),
                        None => self.keyword_score(wine, &tokens),
                    },
                    _ => self.keyword_score(wine, &tokens),
                };
                ScoredWine::new(wine.clone(), score)
            })
            .collect();

        sort_descending(&mut scored);
        scored.truncate(limit);

        debug!(
            "Top result for '{}': {:?}",
            trimmed,
            scored.first().map(|s| s.wine.title.as_str())
        );
        scored
    }

    /// Taste-based recommendation: derives a preference profile from the
    /// selection and ranks the rest of the catalog by affinity. Selected
    /// wines are never recommended back; unknown ids are dropped.
    pub fn recommend_for_selection(
        &self,
        selected_ids: &[u32],
        limit: usize,
    ) -> TasteRecommendations {
        let selected: Vec<&Wine> = selected_ids
            .iter()
            .filter_map(|id| self.catalog.lookup_by_id(*id))
            .collect();

        if selected.len() < selected_ids.len() {
            debug!(
                "Dropped {} unknown ids from selection",
                selected_ids.len() - selected.len()
            );
        }

        if selected.is_empty() {
            return TasteRecommendations {
                recommendations: Vec::new(),
                profile: PreferenceProfile::empty(),
            };
        }

        info!(
            "Generating taste recommendations from {} selected wines",
            selected.len()
        );

        let profile = analyze_preferences(&selected);
        let selected_set: HashSet<u32> = selected.iter().map(|w| w.id).collect();
        let selected_vectors: Vec<&[f32]> = match &self.embeddings {
            Some(table) => selected_set
                .iter()
                .filter_map(|id| table.get(*id))
                .collect(),
            None => Vec::new(),
        };

        let mut scored: Vec<ScoredWine> = self
            .catalog
            .wines()
            .iter()
            .filter(|wine| !selected_set.contains(&wine.id))
            .map(|wine| {
                let score = self
                    .mean_selection_similarity(wine, &selected_vectors)
                    .unwrap_or_else(|| self.profile_score(wine, &profile));
                ScoredWine::new(wine.clone(), score)
            })
            .collect();

        sort_descending(&mut scored);
        scored.truncate(limit);

        TasteRecommendations {
            recommendations: scored,
            profile,
        }
    }

    /// Embeds the query when both a table and an embedder are present.
    /// Timeouts, transport failures, and dimension mismatches all resolve
    /// to `None` so the caller degrades to keyword scoring.
    async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        let table = self.embeddings.as_ref()?;
        let embedder = self.embedder.as_ref()?;

        match tokio::time::timeout(self.embed_timeout, embedder.embed(query)).await {
            Ok(Ok(vector)) => {
                if vector.len() == table.dim() {
                    Some(vector)
                } else {
                    warn!(
                        "Query embedding has {} dimensions but the table has {}, falling back to keyword scoring",
                        vector.len(),
                        table.dim()
                    );
                    None
                }
            }
            Ok(Err(e)) => {
                warn!(
                    "Query embedding unavailable ({}), falling back to keyword scoring",
                    e
                );
                None
            }
            Err(_) => {
                warn!(
                    "Query embedding timed out after {:?}, falling back to keyword scoring",
                    self.embed_timeout
                );
                None
            }
        }
    }

    /// Weighted token-overlap heuristic: each query token contributes the
    /// weight of the best field it appears in, normalized by the number
    /// of query tokens, plus a small bonus for highly rated wines.
    fn keyword_score(&self, wine: &Wine, tokens: &[String]) -> f32 {
        if tokens.is_empty() {
            return 0.0;
        }

        let mut weighted_hits = 0.0;
        for token in tokens {
            if !self.catalog.record_has_token(wine.id, token) {
                continue;
            }
            weighted_hits += if field_has_token(&wine.title, token) {
                TITLE_WEIGHT
            } else if wine
                .variety
                .as_deref()
                .map(|v| field_has_token(v, token))
                .unwrap_or(false)
            {
                VARIETY_WEIGHT
            } else if wine
                .country
                .as_deref()
                .map(|c| field_has_token(c, token))
                .unwrap_or(false)
            {
                COUNTRY_WEIGHT
            } else {
                DESCRIPTION_WEIGHT
            };
        }

        let mut score = weighted_hits / tokens.len() as f32;
        if wine.rating > HIGH_RATING_THRESHOLD {
            score += HIGH_RATING_BONUS;
        }
        score.clamp(0.0, 1.0)
    }

    /// Mean cosine between the candidate's vector and every selected
    /// vector. `None` when either side has no usable embedding.
    fn mean_selection_similarity(&self, wine: &Wine, selected_vectors: &[&[f32]]) -> Option<f32> {
        if selected_vectors.is_empty() {
            return None;
        }
        let candidate = self.embeddings.as_ref()?.get(wine.id)?;

        let total: f32 = selected_vectors
            .iter()
            .map(|selected| cosine_similarity(candidate, selected))
            .sum();
        Some(total / selected_vectors.len() as f32)
    }

    /// Profile affinity heuristic for candidates without embeddings.
    fn profile_score(&self, wine: &Wine, profile: &PreferenceProfile) -> f32 {
        let mut score = PROFILE_BASE_SCORE;

        if let Some(variety) = wine.variety.as_deref() {
            if let Some(rank) = profile
                .favorite_varieties
                .iter()
                .position(|entry| entry.variety.eq_ignore_ascii_case(variety))
            {
                score += PROFILE_VARIETY_WEIGHT / (rank + 1) as f32;
            }
        }

        if let Some(country) = wine.country.as_deref() {
            if let Some(rank) = profile
                .preferred_countries
                .iter()
                .position(|entry| entry.country.eq_ignore_ascii_case(country))
            {
                score += PROFILE_COUNTRY_WEIGHT / (rank + 1) as f32;
            }
        }

        if profile.average_price > 0.0 && wine.price > 0.0 {
            let distance = (wine.price - profile.average_price).abs() / profile.average_price;
            score += (1.0 - distance) * PROFILE_PRICE_WEIGHT;
        }

        if profile.average_rating > 0.0 && wine.rating > 0.0 {
            let distance = (wine.rating - profile.average_rating).abs() / 100.0;
            score += (1.0 - distance) * PROFILE_RATING_WEIGHT;
        }

        score.clamp(0.0, 1.0)
    }
}

fn field_has_token(field: &str, token: &str) -> bool {
    tokenize(field).iter().any(|t| t == token)
}

/// Stable descending sort: equal scores keep catalog order.
fn sort_descending(scored: &mut [ScoredWine]) {
    scored.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, Result};
    use async_trait::async_trait;

    struct StubEmbedder {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl TextEmbedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.vector.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl TextEmbedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(ApiError::EmbeddingError("service unavailable".to_string()))
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl TextEmbedder for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0, 0.0])
        }
    }

    fn create_test_wine(
        id: u32,
        title: &str,
        variety: Option<&str>,
        country: Option<&str>,
        price: f32,
        rating: f32,
    ) -> Wine {
        Wine {
            id,
            title: title.to_string(),
            variety: variety.map(String::from),
            country: country.map(String::from),
            region: None,
            winery: None,
            price,
            rating,
            description: String::new(),
            flavor_profile: None,
            body: None,
            tannins: None,
            acidity: None,
            aroma: None,
            pairing_suggestions: None,
        }
    }

    fn create_test_catalog() -> Arc<CatalogIndex> {
        Arc::new(CatalogIndex::build(vec![
            create_test_wine(
                1,
                "Cabernet Sauvignon Reserve",
                Some("Cabernet Sauvignon"),
                Some("France"),
                125.0,
                96.0,
            ),
            create_test_wine(
                2,
                "Chardonnay Barrel Select",
                Some("Chardonnay"),
                Some("USA"),
                45.0,
                92.0,
            ),
        ]))
    }

    fn create_test_service(
        embeddings: Option<EmbeddingTable>,
        embedder: Option<Arc<dyn TextEmbedder>>,
    ) -> RecommendationService {
        RecommendationService::new(
            create_test_catalog(),
            embeddings,
            embedder,
            Duration::from_millis(100),
        )
    }

    fn create_test_table() -> EmbeddingTable {
        EmbeddingTable::build(&[1, 2], vec![Some(vec![1.0, 0.0]), Some(vec![0.0, 1.0])])
            .unwrap()
    }

    #[test]
    fn test_cosine_similarity_properties() {
        let v = vec![0.3, 0.5, 0.2];
        let scaled: Vec<f32> = v.iter().map(|x| x * 7.5).collect();
        let w = vec![0.9, 0.1, 0.4];

        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&v, &scaled) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&v, &w) - cosine_similarity(&w, &v)).abs() < 1e-6);
        assert_eq!(cosine_similarity(&v, &[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&v, &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_blank_query_returns_neutral_scores_in_catalog_order() {
        let service = create_test_service(None, None);

        let results = service.search("", &WineFilter::default(), 10).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].wine.id, 1);
        assert_eq!(results[1].wine.id, 2);
        assert!(results.iter().all(|r| r.similarity_score == NEUTRAL_SCORE));
    }

    #[tokio::test]
    async fn test_blank_query_with_filter_returns_matching_subset() {
        let service = create_test_service(None, None);

        let filter = WineFilter {
            variety: Some("Chardonnay".to_string()),
            ..Default::default()
        };
        let results = service.search("", &filter, 10).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].wine.id, 2);
        assert_eq!(results[0].similarity_score, NEUTRAL_SCORE);
    }

    #[tokio::test]
    async fn test_keyword_search_ranks_title_match_first() {
        let service = create_test_service(None, None);

        let results = service.search("cabernet", &WineFilter::default(), 10).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].wine.id, 1);
        assert!(results[0].similarity_score > results[1].similarity_score);
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_sorts_descending() {
        let service = create_test_service(None, None);

        let results = service.search("wine", &WineFilter::default(), 1).await;
        assert!(results.len() <= 1);

        let all = service.search("cabernet reserve", &WineFilter::default(), 10).await;
        for pair in all.windows(2) {
            assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
    }

    #[tokio::test]
    async fn test_search_scores_stay_in_unit_interval_without_embeddings() {
        let service = create_test_service(None, None);

        let results = service
            .search("cabernet sauvignon reserve france", &WineFilter::default(), 10)
            .await;

        for result in results {
            assert!(result.similarity_score >= 0.0);
            assert!(result.similarity_score <= 1.0);
        }
    }

    #[tokio::test]
    async fn test_search_uses_embeddings_when_available() {
        // The stub maps every query onto wine 2's direction, overriding
        // the keyword signal that favors wine 1.
        let embedder: Arc<dyn TextEmbedder> = Arc::new(StubEmbedder {
            vector: vec![0.0, 1.0],
        });
        let service = create_test_service(Some(create_test_table()), Some(embedder));

        let results = service.search("cabernet", &WineFilter::default(), 10).await;

        assert_eq!(results[0].wine.id, 2);
        assert!((results[0].similarity_score - 1.0).abs() < 1e-6);
        assert!(results[1].similarity_score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_falls_back_per_record_without_vector() {
        let table = EmbeddingTable::build(&[1, 2], vec![None, Some(vec![0.0, 1.0])]).unwrap();
        let embedder: Arc<dyn TextEmbedder> = Arc::new(StubEmbedder {
            vector: vec![0.0, 1.0],
        });
        let service = create_test_service(Some(table), Some(embedder));

        let results = service.search("cabernet", &WineFilter::default(), 10).await;

        // Wine 2 scores 1.0 by cosine; wine 1 gets its keyword score.
        assert_eq!(results[0].wine.id, 2);
        assert_eq!(results[1].wine.id, 1);
        assert!(results[1].similarity_score > 0.0);
        assert!(results[1].similarity_score <= 1.0);
    }

    #[tokio::test]
    async fn test_search_degrades_when_embedder_fails() {
        let service = create_test_service(Some(create_test_table()), Some(Arc::new(FailingEmbedder)));

        let results = service.search("cabernet", &WineFilter::default(), 10).await;

        assert_eq!(results[0].wine.id, 1);
        assert!(results[0].similarity_score > results[1].similarity_score);
    }

    #[tokio::test]
    async fn test_search_degrades_when_embedder_times_out() {
        let service = create_test_service(Some(create_test_table()), Some(Arc::new(SlowEmbedder)));

        let results = service.search("cabernet", &WineFilter::default(), 10).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].wine.id, 1);
    }

    #[tokio::test]
    async fn test_search_degrades_on_dimension_mismatch() {
        let embedder: Arc<dyn TextEmbedder> = Arc::new(StubEmbedder {
            vector: vec![0.0, 1.0, 0.5],
        });
        let service = create_test_service(Some(create_test_table()), Some(embedder));

        let results = service.search("cabernet", &WineFilter::default(), 10).await;

        assert_eq!(results[0].wine.id, 1);
    }

    #[test]
    fn test_recommend_empty_selection_short_circuits() {
        let service = create_test_service(None, None);

        let outcome = service.recommend_for_selection(&[], 10);

        assert!(outcome.recommendations.is_empty());
        assert_eq!(outcome.profile, PreferenceProfile::empty());
    }

    #[test]
    fn test_recommend_never_returns_selected_ids() {
        let service = create_test_service(None, None);

        let outcome = service.recommend_for_selection(&[1], 10);

        assert!(outcome.recommendations.iter().all(|r| r.wine.id != 1));
        assert_eq!(outcome.recommendations.len(), 1);
        assert_eq!(outcome.recommendations[0].wine.id, 2);
    }

    #[test]
    fn test_recommend_single_selection_profile_and_scores() {
        let service = create_test_service(None, None);

        let outcome = service.recommend_for_selection(&[1], 10);

        assert_eq!(outcome.profile.favorite_varieties.len(), 1);
        assert_eq!(outcome.profile.favorite_varieties[0].variety, "Cabernet Sauvignon");
        assert_eq!(outcome.profile.favorite_varieties[0].count, 1);
        assert_eq!(outcome.profile.average_price, 125.0);
        assert_eq!(outcome.profile.average_rating, 96.0);

        let score = outcome.recommendations[0].similarity_score;
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_recommend_drops_unknown_ids() {
        let service = create_test_service(None, None);

        let with_unknown = service.recommend_for_selection(&[1, 999], 10);
        let without = service.recommend_for_selection(&[1], 10);

        assert_eq!(with_unknown.profile, without.profile);
        assert_eq!(
            with_unknown.recommendations.len(),
            without.recommendations.len()
        );
    }

    #[test]
    fn test_recommend_only_unknown_ids_is_empty_selection() {
        let service = create_test_service(None, None);

        let outcome = service.recommend_for_selection(&[777, 999], 10);

        assert!(outcome.recommendations.is_empty());
        assert_eq!(outcome.profile, PreferenceProfile::empty());
    }

    #[test]
    fn test_recommend_uses_mean_cosine_when_vectors_align() {
        let service = create_test_service(Some(create_test_table()), None);

        let outcome = service.recommend_for_selection(&[1], 10);

        // Wine 2's vector is orthogonal to the selected wine 1.
        assert_eq!(outcome.recommendations[0].wine.id, 2);
        assert!(outcome.recommendations[0].similarity_score.abs() < 1e-6);
    }

    #[test]
    fn test_profile_score_prefers_top_ranked_variety() {
        let catalog = Arc::new(CatalogIndex::build(vec![
            create_test_wine(1, "Merlot One", Some("Merlot"), Some("France"), 50.0, 90.0),
            create_test_wine(2, "Merlot Two", Some("Merlot"), Some("France"), 50.0, 90.0),
            create_test_wine(3, "Merlot Three", Some("Merlot"), Some("France"), 50.0, 90.0),
            create_test_wine(4, "Syrah Match", Some("Merlot"), Some("France"), 50.0, 90.0),
            create_test_wine(5, "Riesling Other", Some("Riesling"), Some("Germany"), 50.0, 90.0),
        ]));
        let service =
            RecommendationService::new(catalog, None, None, Duration::from_millis(100));

        let outcome = service.recommend_for_selection(&[1, 2, 3], 10);

        // The Merlot candidate outranks the Riesling one against a
        // Merlot-heavy profile.
        assert_eq!(outcome.recommendations[0].wine.id, 4);
        assert!(
            outcome.recommendations[0].similarity_score
                > outcome.recommendations[1].similarity_score
        );
    }

    #[tokio::test]
    async fn test_equal_scores_keep_catalog_order() {
        let catalog = Arc::new(CatalogIndex::build(vec![
            create_test_wine(10, "Twin Red", Some("Merlot"), Some("France"), 30.0, 88.0),
            create_test_wine(20, "Twin Red", Some("Merlot"), Some("France"), 30.0, 88.0),
        ]));
        let service =
            RecommendationService::new(catalog, None, None, Duration::from_millis(100));

        let results = service.search("twin", &WineFilter::default(), 10).await;

        assert_eq!(results[0].wine.id, 10);
        assert_eq!(results[1].wine.id, 20);
        assert_eq!(results[0].similarity_score, results[1].similarity_score);
    }
}
