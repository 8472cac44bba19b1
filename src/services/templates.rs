use crate::models::{PreferenceProfile, ScoredWine, Wine, WineFilter};
use lazy_static::lazy_static;

lazy_static! {
    /// Variety keywords that mark a wine as red for pairing purposes.
    pub static ref RED_VARIETY_KEYWORDS: Vec<&'static str> = vec![
        "red", "cabernet", "merlot", "pinot noir", "syrah", "shiraz", "malbec",
        "zinfandel", "sangiovese", "tempranillo",
    ];

    static ref RED_PAIRINGS: Vec<&'static str> = vec![
        "Ribeye steak with rosemary",
        "Aged parmesan",
        "Pasta bolognese",
        "Grilled mushrooms",
    ];

    static ref LIGHT_PAIRINGS: Vec<&'static str> = vec![
        "Seafood with lemon",
        "Chicken in a cream sauce",
        "Fresh salads",
        "Goat cheese with honey",
    ];

    static ref PREMIUM_OCCASIONS: Vec<&'static str> = vec![
        "A festive dinner",
        "A romantic evening",
        "A business meeting",
        "A special celebration",
    ];

    static ref CASUAL_OCCASIONS: Vec<&'static str> = vec![
        "A relaxed dinner at home",
        "A family lunch",
        "A movie night",
        "Watching the sunset",
    ];
}

/// Context handed to the commentary generator, one variant per comment
/// kind. The variant selects both the prompt template and the local
/// fallback text.
pub enum CommentContext<'a> {
    Filtered {
        query: &'a str,
        filters: &'a WineFilter,
        recommendations: &'a [ScoredWine],
    },
    Taste {
        selected: &'a [&'a Wine],
        profile: &'a PreferenceProfile,
        recommendations: &'a [ScoredWine],
    },
    Simple {
        query: &'a str,
        recommendations: &'a [ScoredWine],
    },
    WineDetails {
        wine: &'a Wine,
    },
    Pairing {
        wine: &'a Wine,
    },
    Occasion {
        wine: &'a Wine,
    },
}

impl CommentContext<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            CommentContext::Filtered { .. } => "filtered",
            CommentContext::Taste { .. } => "taste",
            CommentContext::Simple { .. } => "simple",
            CommentContext::WineDetails { .. } => "wine_details",
            CommentContext::Pairing { .. } => "pairing",
            CommentContext::Occasion { .. } => "occasion",
        }
    }

    /// Deterministic cache key: the kind plus the identifying parts of
    /// the context.
    pub fn cache_key(&self) -> String {
        match self {
            CommentContext::Filtered {
                query,
                recommendations,
                ..
            }
            | CommentContext::Simple {
                query,
                recommendations,
            } => format!(
                "{}:{}:{}",
                self.kind(),
                query,
                recommendations.first().map(|r| r.wine.id).unwrap_or(0)
            ),
            CommentContext::Taste {
                selected,
                recommendations,
                ..
            } => {
                let ids: Vec<String> = selected.iter().map(|w| w.id.to_string()).collect();
                format!(
                    "{}:{}:{}",
                    self.kind(),
                    ids.join(","),
                    recommendations.first().map(|r| r.wine.id).unwrap_or(0)
                )
            }
            CommentContext::WineDetails { wine }
            | CommentContext::Pairing { wine }
            | CommentContext::Occasion { wine } => format!("{}:{}", self.kind(), wine.id),
        }
    }
}

const SYSTEM_PROMPT_BASE: &str = "You are an experienced sommelier and wine assistant. \
Be friendly, informative, and professional.";

pub fn system_prompt(context: &CommentContext<'_>) -> String {
    let suffix = match context {
        CommentContext::Filtered { .. } => {
            "Explain why the wine fits the user's search and filters."
        }
        CommentContext::Taste { .. } => {
            "Analyze the user's preferences and give a personalized recommendation."
        }
        CommentContext::Simple { .. } => "Help the user find the right wine for their request.",
        CommentContext::WineDetails { .. } => "Give an expert characterization of the wine.",
        CommentContext::Pairing { .. } => "Give concrete food pairing recommendations.",
        CommentContext::Occasion { .. } => "Suggest the best occasions for drinking this wine.",
    };
    format!("{} {}", SYSTEM_PROMPT_BASE, suffix)
}

/// Renders the context into the user prompt for the completion request.
pub fn build_prompt(context: &CommentContext<'_>) -> String {
    match context {
        CommentContext::Filtered {
            query,
            filters,
            recommendations,
        } => {
            let top = recommendations.first();
            format!(
                "Explain why these wines fit the user's request.\n\n\
                 User request: \"{}\"\n\n\
                 Filters:\n\
                 - Variety: {}\n\
                 - Country: {}\n\
                 - Max price: {}\n\n\
                 Top recommendation:\n{}\n\n\
                 Give a short but informative explanation (2-3 sentences) of why this wine \
                 is a great match for the request.",
                query,
                filters.variety.as_deref().unwrap_or("any"),
                filters.country.as_deref().unwrap_or("any"),
                filters
                    .max_price
                    .map(|p| format!("${:.0}", p))
                    .unwrap_or_else(|| "unlimited".to_string()),
                top.map(|r| describe_result(&r.wine)).unwrap_or_default()
            )
        }
        CommentContext::Taste {
            selected,
            profile,
            recommendations,
        } => {
            let names: Vec<&str> = selected.iter().map(|w| w.title.as_str()).collect();
            let varieties: Vec<String> = profile
                .favorite_varieties
                .iter()
                .map(|v| format!("{} ({}x)", v.variety, v.count))
                .collect();
            let countries: Vec<String> = profile
                .preferred_countries
                .iter()
                .map(|c| format!("{} ({}x)", c.country, c.count))
                .collect();
            format!(
                "Analyze the user's preferences and explain why these recommendations fit.\n\n\
                 The user picked these wines: {}\n\n\
                 Preference analysis:\n\
                 - Favorite varieties: {}\n\
                 - Preferred countries: {}\n\
                 - Average price: ${:.2}\n\
                 - Average rating: {:.1}/100\n\n\
                 Best recommendation:\n{}\n\n\
                 Give a personal recommendation (2-3 sentences) explaining why this wine \
                 matches the user's taste.",
                names.join(", "),
                join_or(&varieties, "varied"),
                join_or(&countries, "varied"),
                profile.average_price,
                profile.average_rating,
                recommendations
                    .first()
                    .map(|r| describe_result(&r.wine))
                    .unwrap_or_default()
            )
        }
        CommentContext::Simple {
            query,
            recommendations,
        } => format!(
            "The user is looking for: \"{}\"\n\n\
             Top match:\n{}\n\n\
             Give a short recommendation (2-3 sentences) on why this wine fits the request.",
            query,
            recommendations
                .first()
                .map(|r| describe_result(&r.wine))
                .unwrap_or_default()
        ),
        CommentContext::WineDetails { wine } => format!(
            "Give an expert characterization of this wine.\n\n\
             Wine information:\n\
             - Name: {}\n\
             - Variety: {}\n\
             - Country: {}\n\
             - Region: {}\n\
             - Winery: {}\n\
             - Price: ${:.0}\n\
             - Rating: {:.0}/100\n\n\
             Characteristics:\n\
             - Flavor profile: {}\n\
             - Aroma: {}\n\
             - Body: {}\n\
             - Tannins: {}\n\
             - Acidity: {}\n\n\
             Description: {}\n\n\
             Give a detailed expert assessment (3-4 sentences): its character, potential, \
             and the best moments to enjoy it.",
            wine.title,
            wine.variety.as_deref().unwrap_or("not specified"),
            wine.country.as_deref().unwrap_or("not specified"),
            wine.region.as_deref().unwrap_or("not specified"),
            wine.winery.as_deref().unwrap_or("not specified"),
            wine.price,
            wine.rating,
            wine.flavor_profile.as_deref().unwrap_or("not specified"),
            wine.aroma.as_deref().unwrap_or("not specified"),
            wine.body.as_deref().unwrap_or("not specified"),
            wine.tannins.as_deref().unwrap_or("not specified"),
            wine.acidity.as_deref().unwrap_or("not specified"),
            describe_or(&wine.description)
        ),
        CommentContext::Pairing { wine } => format!(
            "Suggest ideal pairings for this wine.\n\n\
             Wine:\n\
             - Name: {}\n\
             - Variety: {}\n\
             - Characteristics: {} body, {} tannins\n\
             - Flavor profile: {}\n\
             - Aromas: {}\n\n\
             Give concrete food pairing suggestions (3-4 dishes), the serving temperature, \
             and possible alternatives.",
            wine.title,
            wine.variety.as_deref().unwrap_or("not specified"),
            wine.body.as_deref().unwrap_or("medium"),
            wine.tannins.as_deref().unwrap_or("moderate"),
            wine.flavor_profile.as_deref().unwrap_or("fruity"),
            wine.aroma.as_deref().unwrap_or("berry notes"),
        ),
        CommentContext::Occasion { wine } => format!(
            "What occasion is this wine ideal for?\n\n\
             Wine: {} ({})\n\
             Characteristics: {} body, {}\n\
             Price: ${:.0}\n\
             Rating: {:.0}/100\n\n\
             List 3-4 fitting occasions for this wine with practical advice.",
            wine.title,
            wine.variety.as_deref().unwrap_or("unknown variety"),
            wine.body.as_deref().unwrap_or("medium"),
            wine.flavor_profile.as_deref().unwrap_or("a balanced flavor"),
            wine.price,
            wine.rating,
        ),
    }
}

/// Deterministic comment used when the completion API is unavailable or
/// not configured.
pub fn local_comment(context: &CommentContext<'_>) -> String {
    match context {
        CommentContext::Filtered {
            query,
            recommendations,
            ..
        } => {
            let top = recommendations.first();
            format!(
                "Excellent choice! \"{}\" is a great match for your search \"{}\". This {} from {} \
                 has a rich flavor and pairs well with hearty dishes.",
                top.map(|r| r.wine.title.as_str()).unwrap_or("our top pick"),
                query,
                top.and_then(|r| r.wine.variety.as_deref()).unwrap_or("wine"),
                top.and_then(|r| r.wine.country.as_deref())
                    .unwrap_or("a renowned region"),
            )
        }
        CommentContext::Taste {
            profile,
            recommendations,
            ..
        } => {
            let top = recommendations.first();
            let favorite = profile
                .favorite_varieties
                .first()
                .map(|v| v.variety.as_str())
                .unwrap_or("similar varieties");
            format!(
                "Based on your preferences, \"{}\" looks like an ideal match. It is a {} that \
                 fits your taste for {}, with fine balance and a long finish.",
                top.map(|r| r.wine.title.as_str()).unwrap_or("our top pick"),
                top.and_then(|r| r.wine.variety.as_deref()).unwrap_or("wine"),
                favorite,
            )
        }
        CommentContext::Simple {
            query,
            recommendations,
        } => {
            let top = recommendations.first();
            format!(
                "For \"{}\" we recommend \"{}\". This lovely {} at ${:.0} delivers a balanced \
                 flavor and aroma.",
                query,
                top.map(|r| r.wine.title.as_str()).unwrap_or("our top pick"),
                top.and_then(|r| r.wine.variety.as_deref()).unwrap_or("wine"),
                top.map(|r| r.wine.price).unwrap_or(0.0),
            )
        }
        CommentContext::WineDetails { wine } => format!(
            "Expert note: a {} from {} in the {} price segment. {} body, {}. A wine with good \
             potential that suits newcomers and seasoned enthusiasts alike.",
            wine.variety.as_deref().unwrap_or("wine"),
            wine.country.as_deref().unwrap_or("a renowned region"),
            price_category(wine.price),
            capitalize_first(wine.body.as_deref().unwrap_or("medium")),
            wine.aroma.as_deref().unwrap_or("a pleasant aroma"),
        ),
        CommentContext::Pairing { wine } => {
            let red = is_red_variety(wine.variety.as_deref());
            let pairings = if red { &*RED_PAIRINGS } else { &*LIGHT_PAIRINGS };
            let temperature = if red { "16-18°C" } else { "8-12°C" };
            format!(
                "Ideal pairings: {}. Serving temperature: {}. Pour 15-30 minutes after opening.",
                pairings[..3].join(", "),
                temperature,
            )
        }
        CommentContext::Occasion { wine } => {
            let occasions = if wine.price > 100.0 {
                &*PREMIUM_OCCASIONS
            } else {
                &*CASUAL_OCCASIONS
            };
            let listed: Vec<String> = occasions
                .iter()
                .enumerate()
                .map(|(i, occasion)| format!("{}. {}", i + 1, occasion))
                .collect();
            format!(
                "Ideal for: {}. This wine will set the mood for any of these moments.",
                listed.join(" "),
            )
        }
    }
}

pub fn is_red_variety(variety: Option<&str>) -> bool {
    let Some(variety) = variety else {
        return false;
    };
    let lower = variety.to_lowercase();
    RED_VARIETY_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

pub fn price_category(price: f32) -> &'static str {
    if price < 30.0 {
        "budget"
    } else if price < 100.0 {
        "mid-range"
    } else {
        "premium"
    }
}

fn describe_result(wine: &Wine) -> String {
    format!(
        "- Name: {}\n- Variety: {}\n- Country: {}\n- Price: ${:.0}\n- Rating: {:.0}/100\n- Description: {}",
        wine.title,
        wine.variety.as_deref().unwrap_or("not specified"),
        wine.country.as_deref().unwrap_or("not specified"),
        wine.price,
        wine.rating,
        describe_or(&wine.description),
    )
}

fn describe_or(description: &str) -> &str {
    if description.trim().is_empty() {
        "no description available"
    } else {
        description
    }
}

fn join_or(parts: &[String], fallback: &str) -> String {
    if parts.is_empty() {
        fallback.to_string()
    } else {
        parts.join(", ")
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_wine(variety: Option<&str>, price: f32) -> Wine {
        Wine {
            id: 1,
            title: "Test Estate".to_string(),
            variety: variety.map(String::from),
            country: Some("France".to_string()),
            region: None,
            winery: None,
            price,
            rating: 92.0,
            description: "Dark fruit and firm structure.".to_string(),
            flavor_profile: None,
            body: None,
            tannins: None,
            acidity: None,
            aroma: None,
            pairing_suggestions: None,
        }
    }

    #[test]
    fn test_is_red_variety_detection() {
        assert!(is_red_variety(Some("Cabernet Sauvignon")));
        assert!(is_red_variety(Some("Red Blend")));
        assert!(is_red_variety(Some("Syrah")));
        assert!(!is_red_variety(Some("Chardonnay")));
        assert!(!is_red_variety(None));
    }

    #[test]
    fn test_price_category_boundaries() {
        assert_eq!(price_category(10.0), "budget");
        assert_eq!(price_category(30.0), "mid-range");
        assert_eq!(price_category(99.9), "mid-range");
        assert_eq!(price_category(100.0), "premium");
    }

    #[test]
    fn test_pairing_comment_follows_wine_color() {
        let red = create_test_wine(Some("Merlot"), 40.0);
        let white = create_test_wine(Some("Riesling"), 40.0);

        let red_comment = local_comment(&CommentContext::Pairing { wine: &red });
        let white_comment = local_comment(&CommentContext::Pairing { wine: &white });

        assert!(red_comment.contains("16-18°C"));
        assert!(red_comment.contains("steak"));
        assert!(white_comment.contains("8-12°C"));
        assert!(white_comment.contains("Seafood"));
    }

    #[test]
    fn test_occasion_comment_follows_price_tier() {
        let premium = create_test_wine(Some("Pinot Noir"), 150.0);
        let casual = create_test_wine(Some("Pinot Noir"), 25.0);

        let premium_comment = local_comment(&CommentContext::Occasion { wine: &premium });
        let casual_comment = local_comment(&CommentContext::Occasion { wine: &casual });

        assert!(premium_comment.contains("celebration"));
        assert!(casual_comment.contains("movie night"));
    }

    #[test]
    fn test_build_prompt_includes_query_and_top_wine() {
        let wine = create_test_wine(Some("Malbec"), 35.0);
        let recommendations = vec![ScoredWine::new(wine, 0.9)];

        let prompt = build_prompt(&CommentContext::Simple {
            query: "bold red for steak",
            recommendations: &recommendations,
        });

        assert!(prompt.contains("bold red for steak"));
        assert!(prompt.contains("Test Estate"));
        assert!(prompt.contains("Malbec"));
    }

    #[test]
    fn test_cache_keys_distinguish_kinds() {
        let wine = create_test_wine(Some("Malbec"), 35.0);

        let pairing = CommentContext::Pairing { wine: &wine }.cache_key();
        let occasion = CommentContext::Occasion { wine: &wine }.cache_key();

        assert_ne!(pairing, occasion);
        assert!(pairing.starts_with("pairing:"));
    }

    #[test]
    fn test_local_comment_handles_empty_recommendations() {
        let comment = local_comment(&CommentContext::Simple {
            query: "anything",
            recommendations: &[],
        });
        assert!(comment.contains("our top pick"));
    }
}
