use crate::{
    catalog::CatalogIndex,
    models::{
        RecommendationRequest, RecommendationResponse, ScoredWine, TasteRecommendationRequest,
        TasteRecommendationResponse, Wine, WineFilter,
    },
    services::{CommentContext, CommentaryGenerator, RecommendationService},
};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};
use futures::future::join_all;

/// Default result counts per endpoint.
const FILTERED_LIMIT: usize = 20;
const SIMPLE_LIMIT: usize = 15;
const TASTE_LIMIT: usize = 12;

/// How many of the top results receive an individual comment.
const TOP_COMMENTED: usize = 3;

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/recommendations").route(web::post().to(get_filtered_recommendations)),
    )
    .service(
        web::resource("/recommendations/simple").route(web::post().to(get_simple_recommendations)),
    )
    .service(
        web::resource("/recommendations/taste").route(web::post().to(get_taste_recommendations)),
    );
}

/// Query search constrained by the caller's filters. A blank query is
/// valid and means "browse within filters".
pub async fn get_filtered_recommendations(
    request: Json<RecommendationRequest>,
    ranker: web::Data<RecommendationService>,
    commentary: web::Data<CommentaryGenerator>,
) -> HttpResponse {
    let filter = request.filters.clone().unwrap_or_default();
    let limit = request.limit.unwrap_or(FILTERED_LIMIT);

    let mut recommendations = ranker.search(&request.query, &filter, limit).await;

    let llm_comment = commentary
        .generate_comment(&CommentContext::Filtered {
            query: &request.query,
            filters: &filter,
            recommendations: &recommendations,
        })
        .await;

    attach_wine_comments(&commentary, &mut recommendations).await;

    HttpResponse::Ok().json(RecommendationResponse {
        recommendations,
        llm_comment: Some(llm_comment),
    })
}

/// Unfiltered query search with a smaller default result count.
pub async fn get_simple_recommendations(
    request: Json<RecommendationRequest>,
    ranker: web::Data<RecommendationService>,
    commentary: web::Data<CommentaryGenerator>,
) -> HttpResponse {
    let limit = request.limit.unwrap_or(SIMPLE_LIMIT);

    let mut recommendations = ranker
        .search(&request.query, &WineFilter::default(), limit)
        .await;

    let llm_comment = commentary
        .generate_comment(&CommentContext::Simple {
            query: &request.query,
            recommendations: &recommendations,
        })
        .await;

    attach_wine_comments(&commentary, &mut recommendations).await;

    HttpResponse::Ok().json(RecommendationResponse {
        recommendations,
        llm_comment: Some(llm_comment),
    })
}

/// Recommendations derived from a set of selected wines. An empty or
/// unresolvable selection yields an empty list, not an error.
pub async fn get_taste_recommendations(
    request: Json<TasteRecommendationRequest>,
    catalog: web::Data<CatalogIndex>,
    ranker: web::Data<RecommendationService>,
    commentary: web::Data<CommentaryGenerator>,
) -> HttpResponse {
    let limit = request.limit.unwrap_or(TASTE_LIMIT);

    let result = ranker.recommend_for_selection(&request.selected_wines, limit);

    let selected: Vec<&Wine> = request
        .selected_wines
        .iter()
        .filter_map(|id| catalog.lookup_by_id(*id))
        .collect();

    let llm_comment = commentary
        .generate_comment(&CommentContext::Taste {
            selected: &selected,
            profile: &result.profile,
            recommendations: &result.recommendations,
        })
        .await;

    HttpResponse::Ok().json(TasteRecommendationResponse {
        recommendations: result.recommendations,
        preference_analysis: result.profile,
        llm_comment: Some(llm_comment),
    })
}

async fn attach_wine_comments(commentary: &CommentaryGenerator, wines: &mut [ScoredWine]) {
    let comments = join_all(wines.iter().take(TOP_COMMENTED).map(|scored| {
        let context = CommentContext::WineDetails { wine: &scored.wine };
        async move { commentary.generate_comment(&context).await }
    }))
    .await;

    for (scored, comment) in wines.iter_mut().zip(comments) {
        scored.llm_comment = Some(comment);
    }
}
