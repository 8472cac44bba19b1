pub mod commentary;
pub mod preferences;
pub mod recommendation;
pub mod templates;

// Re-export public types
pub use commentary::CommentaryGenerator;
pub use preferences::analyze_preferences;
pub use recommendation::{RecommendationService, TasteRecommendations};
pub use templates::CommentContext;
