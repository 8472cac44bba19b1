use crate::models::{CountryCount, PreferenceProfile, PriceRange, VarietyCount, Wine};

/// Derives an aggregate taste profile from the wines a user selected.
/// Pure and deterministic: identical input order yields an identical
/// profile. An empty selection yields the zero profile.
pub fn analyze_preferences(selected: &[&Wine]) -> PreferenceProfile {
    if selected.is_empty() {
        return PreferenceProfile::empty();
    }

    let mut varieties: Vec<(String, usize)> = Vec::new();
    let mut countries: Vec<(String, usize)> = Vec::new();
    let mut total_price = 0.0;
    let mut price_count = 0usize;
    let mut total_rating = 0.0;
    let mut rating_count = 0usize;
    let mut min_price = f32::INFINITY;
    let mut max_price = f32::NEG_INFINITY;

    for wine in selected {
        if let Some(variety) = wine.variety.as_deref() {
            count_value(&mut varieties, variety);
        }
        if let Some(country) = wine.country.as_deref() {
            count_value(&mut countries, country);
        }
        if wine.price > 0.0 {
            total_price += wine.price;
            price_count += 1;
            min_price = min_price.min(wine.price);
            max_price = max_price.max(wine.price);
        }
        if wine.rating > 0.0 {
            total_rating += wine.rating;
            rating_count += 1;
        }
    }

    // Stable sort keeps first-encountered order for equal counts.
    varieties.sort_by(|a, b| b.1.cmp(&a.1));
    countries.sort_by(|a, b| b.1.cmp(&a.1));

    PreferenceProfile {
        favorite_varieties: varieties
            .into_iter()
            .map(|(variety, count)| VarietyCount { variety, count })
            .collect(),
        preferred_countries: countries
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect(),
        average_price: if price_count > 0 {
            total_price / price_count as f32
        } else {
            0.0
        },
        average_rating: if rating_count > 0 {
            total_rating / rating_count as f32
        } else {
            0.0
        },
        price_range: if price_count > 0 {
            PriceRange {
                min: min_price,
                max: max_price,
            }
        } else {
            PriceRange { min: 0.0, max: 0.0 }
        },
    }
}

fn count_value(counts: &mut Vec<(String, usize)>, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    match counts.iter_mut().find(|(existing, _)| existing == value) {
        Some((_, count)) => *count += 1,
        None => counts.push((value.to_string(), 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_wine(
        id: u32,
        variety: Option<&str>,
        country: Option<&str>,
        price: f32,
        rating: f32,
    ) -> Wine {
        Wine {
            id,
            title: format!("Wine {}", id),
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

    #[test]
    fn test_empty_selection_yields_zero_profile() {
        let profile = analyze_preferences(&[]);
        assert_eq!(profile, PreferenceProfile::empty());
    }

    #[test]
    fn test_counts_sorted_descending() {
        let a = create_test_wine(1, Some("Merlot"), Some("France"), 20.0, 90.0);
        let b = create_test_wine(2, Some("Merlot"), Some("Italy"), 30.0, 91.0);
        let c = create_test_wine(3, Some("Syrah"), Some("France"), 40.0, 92.0);

        let profile = analyze_preferences(&[&a, &b, &c]);

        assert_eq!(profile.favorite_varieties[0].variety, "Merlot");
        assert_eq!(profile.favorite_varieties[0].count, 2);
        assert_eq!(profile.favorite_varieties[1].variety, "Syrah");
        assert_eq!(profile.preferred_countries[0].country, "France");
        assert_eq!(profile.preferred_countries[0].count, 2);
    }

    #[test]
    fn test_count_ties_keep_first_encountered_order() {
        let a = create_test_wine(1, Some("Riesling"), Some("Germany"), 20.0, 90.0);
        let b = create_test_wine(2, Some("Malbec"), Some("Argentina"), 30.0, 91.0);

        let profile = analyze_preferences(&[&a, &b]);

        assert_eq!(profile.favorite_varieties[0].variety, "Riesling");
        assert_eq!(profile.favorite_varieties[1].variety, "Malbec");
        assert_eq!(profile.preferred_countries[0].country, "Germany");
        assert_eq!(profile.preferred_countries[1].country, "Argentina");
    }

    #[test]
    fn test_averages_skip_non_positive_values() {
        let priced = create_test_wine(1, None, None, 100.0, 95.0);
        let unpriced = create_test_wine(2, None, None, 0.0, 0.0);

        let profile = analyze_preferences(&[&priced, &unpriced]);

        assert_eq!(profile.average_price, 100.0);
        assert_eq!(profile.average_rating, 95.0);
        assert_eq!(profile.price_range, PriceRange { min: 100.0, max: 100.0 });
    }

    #[test]
    fn test_no_positive_values_yield_zeroes() {
        let bare = create_test_wine(1, Some("Merlot"), None, 0.0, 0.0);

        let profile = analyze_preferences(&[&bare]);

        assert_eq!(profile.average_price, 0.0);
        assert_eq!(profile.average_rating, 0.0);
        assert_eq!(profile.price_range, PriceRange { min: 0.0, max: 0.0 });
    }

    #[test]
    fn test_single_selection_profile() {
        let cabernet = create_test_wine(1, Some("Cabernet Sauvignon"), Some("France"), 125.0, 96.0);

        let profile = analyze_preferences(&[&cabernet]);

        assert_eq!(profile.favorite_varieties.len(), 1);
        assert_eq!(profile.favorite_varieties[0].variety, "Cabernet Sauvignon");
        assert_eq!(profile.favorite_varieties[0].count, 1);
        assert_eq!(profile.average_price, 125.0);
        assert_eq!(profile.average_rating, 96.0);
        assert_eq!(profile.price_range, PriceRange { min: 125.0, max: 125.0 });
    }
}
