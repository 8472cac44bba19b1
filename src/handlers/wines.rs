use crate::{
    catalog::CatalogIndex,
    error::ApiError,
    models::{CommentResponse, OccasionResponse, PairingResponse, Wine, WineSummary},
    services::{CommentContext, CommentaryGenerator},
};
use actix_web::{web, HttpResponse};

pub fn wines_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/wines").route(web::get().to(list_wines)))
        .service(web::resource("/wines/{id}").route(web::get().to(get_wine)))
        .service(web::resource("/wines/{id}/comment").route(web::get().to(get_wine_comment)))
        .service(web::resource("/wines/{id}/pairing").route(web::get().to(get_wine_pairing)))
        .service(web::resource("/wines/{id}/occasion").route(web::get().to(get_wine_occasion)));
}

pub async fn list_wines(catalog: web::Data<CatalogIndex>) -> HttpResponse {
    let wines: Vec<WineSummary> = catalog.wines().iter().map(WineSummary::from).collect();
    HttpResponse::Ok().json(wines)
}

pub async fn get_wine(
    path: web::Path<u32>,
    catalog: web::Data<CatalogIndex>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let wine = lookup_wine(&catalog, id)?;

    Ok(HttpResponse::Ok().json(wine))
}

pub async fn get_wine_comment(
    path: web::Path<u32>,
    catalog: web::Data<CatalogIndex>,
    commentary: web::Data<CommentaryGenerator>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let wine = lookup_wine(&catalog, id)?;

    let comment = commentary
        .generate_comment(&CommentContext::WineDetails { wine })
        .await;

    Ok(HttpResponse::Ok().json(CommentResponse { comment }))
}

pub async fn get_wine_pairing(
    path: web::Path<u32>,
    catalog: web::Data<CatalogIndex>,
    commentary: web::Data<CommentaryGenerator>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let wine = lookup_wine(&catalog, id)?;

    let pairing = commentary
        .generate_comment(&CommentContext::Pairing { wine })
        .await;

    Ok(HttpResponse::Ok().json(PairingResponse { pairing }))
}

pub async fn get_wine_occasion(
    path: web::Path<u32>,
    catalog: web::Data<CatalogIndex>,
    commentary: web::Data<CommentaryGenerator>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let wine = lookup_wine(&catalog, id)?;

    let occasion = commentary
        .generate_comment(&CommentContext::Occasion { wine })
        .await;

    Ok(HttpResponse::Ok().json(OccasionResponse { occasion }))
}

fn lookup_wine(catalog: &CatalogIndex, id: u32) -> Result<&Wine, ApiError> {
    catalog
        .lookup_by_id(id)
        .ok_or_else(|| ApiError::NotFound(format!("Wine {} not found", id)))
}
