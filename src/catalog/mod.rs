use crate::models::{PriceRange, Wine, WineFilter};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Fallback facet range when the catalog has no positive prices.
const DEFAULT_PRICE_RANGE: PriceRange = PriceRange {
    min: 10.0,
    max: 500.0,
};

/// Placeholder values some datasets use where a facet is missing.
const SENTINEL_VALUES: [&str; 3] = ["unknown", "n/a", "null"];

/// Lowercases and whitespace-tokenizes text, trimming non-alphanumeric
/// edges and discarding tokens of length <= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| token.len() > 2)
        .collect()
}

/// Owns the immutable wine collection for a session: derived facets,
/// an inverted token index over the records' text fields, and id lookup.
pub struct CatalogIndex {
    wines: Vec<Wine>,
    countries: Vec<String>,
    varieties: Vec<String>,
    price_range: PriceRange,
    token_index: HashMap<String, Vec<usize>>,
    id_index: HashMap<u32, usize>,
}

impl CatalogIndex {
    pub fn build(wines: Vec<Wine>) -> Self {
        let countries = distinct_facet(wines.iter().map(|w| w.country.as_deref()));
        let varieties = distinct_facet(wines.iter().map(|w| w.variety.as_deref()));

        let positive_prices: Vec<f32> =
            wines.iter().map(|w| w.price).filter(|p| *p > 0.0).collect();
        let price_range = if positive_prices.is_empty() {
            DEFAULT_PRICE_RANGE
        } else {
            PriceRange {
                min: positive_prices.iter().copied().fold(f32::INFINITY, f32::min),
                max: positive_prices
                    .iter()
                    .copied()
                    .fold(f32::NEG_INFINITY, f32::max),
            }
        };

        let mut token_index: HashMap<String, Vec<usize>> = HashMap::new();
        let mut id_index = HashMap::with_capacity(wines.len());
        for (idx, wine) in wines.iter().enumerate() {
            id_index.insert(wine.id, idx);

            let mut seen = HashSet::new();
            for field in [
                Some(wine.title.as_str()),
                wine.variety.as_deref(),
                wine.country.as_deref(),
                Some(wine.description.as_str()),
            ]
            .into_iter()
            .flatten()
            {
                for token in tokenize(field) {
                    if seen.insert(token.clone()) {
                        token_index.entry(token).or_default().push(idx);
                    }
                }
            }
        }

        info!(
            "Catalog index built: {} wines, {} countries, {} varieties, {} tokens",
            wines.len(),
            countries.len(),
            varieties.len(),
            token_index.len()
        );

        Self {
            wines,
            countries,
            varieties,
            price_range,
            token_index,
            id_index,
        }
    }

    pub fn wines(&self) -> &[Wine] {
        &self.wines
    }

    pub fn len(&self) -> usize {
        self.wines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wines.is_empty()
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    pub fn varieties(&self) -> &[String] {
        &self.varieties
    }

    pub fn price_range(&self) -> PriceRange {
        self.price_range
    }

    /// Returns the records satisfying every present filter field, in
    /// catalog order. Variety and country match on case-insensitive
    /// substring containment, max_price is an inclusive upper bound.
    pub fn apply_filters(&self, filter: &WineFilter) -> Vec<&Wine> {
        let variety = filter.variety.as_ref().map(|v| v.to_lowercase());
        let country = filter.country.as_ref().map(|c| c.to_lowercase());

        self.wines
            .iter()
            .filter(|wine| {
                if let Some(wanted) = &variety {
                    let held = wine
                        .variety
                        .as_ref()
                        .map(|v| v.to_lowercase().contains(wanted.as_str()))
                        .unwrap_or(false);
                    if !held {
                        return false;
                    }
                }
                if let Some(wanted) = &country {
                    let held = wine
                        .country
                        .as_ref()
                        .map(|c| c.to_lowercase().contains(wanted.as_str()))
                        .unwrap_or(false);
                    if !held {
                        return false;
                    }
                }
                if let Some(max_price) = filter.max_price {
                    if wine.price > max_price {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    pub fn lookup_by_id(&self, id: u32) -> Option<&Wine> {
        self.id_index.get(&id).map(|idx| &self.wines[*idx])
    }

    /// Whether the record's indexed text contains the given token.
    pub fn record_has_token(&self, id: u32, token: &str) -> bool {
        let Some(idx) = self.id_index.get(&id) else {
            return false;
        };
        self.token_index
            .get(token)
            .map(|postings| postings.binary_search(idx).is_ok())
            .unwrap_or(false)
    }
}

fn distinct_facet<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    let mut distinct: Vec<String> = values
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !SENTINEL_VALUES.contains(&v.to_lowercase().as_str()))
        .map(str::to_string)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    distinct.sort();
    distinct
}
