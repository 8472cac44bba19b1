use crate::{catalog::CatalogIndex, models::FiltersResponse};
use actix_web::{get, web, HttpResponse};

#[get("/filters")]
pub async fn get_filters(catalog: web::Data<CatalogIndex>) -> HttpResponse {
    HttpResponse::Ok().json(FiltersResponse {
        countries: catalog.countries().to_vec(),
        varieties: catalog.varieties().to_vec(),
        price_range: catalog.price_range(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Wine;
    use actix_web::{body::to_bytes, App};

    fn create_test_wine(id: u32, title: &str, variety: &str, country: &str) -> Wine {
        Wine {
            id,
            title: title.to_string(),
            variety: Some(variety.to_string()),
            country: Some(country.to_string()),
            region: None,
            winery: None,
            price: 30.0,
            rating: 90.0,
            description: String::new(),
            flavor_profile: None,
            body: None,
            tannins: None,
            acidity: None,
            aroma: None,
            pairing_suggestions: None,
        }
    }

    #[actix_web::test]
    async fn test_filters_expose_catalog_facets() {
        let catalog = CatalogIndex::build(vec![
            create_test_wine(1, "Malbec Alta 2019", "Malbec", "Argentina"),
            create_test_wine(2, "Riesling Mosel 2021", "Riesling", "Germany"),
        ]);

        let app = actix_web::test::init_service(
            App::new()
                .app_data(web::Data::new(catalog))
                .service(get_filters),
        )
        .await;
        let request = actix_web::test::TestRequest::get()
            .uri("/filters")
            .to_request();

        let response = actix_web::test::call_service(&app, request).await;
        assert!(response.status().is_success());

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["countries"], serde_json::json!(["Argentina", "Germany"]));
        assert_eq!(json["varieties"], serde_json::json!(["Malbec", "Riesling"]));
        assert_eq!(json["price_range"]["min"], 30.0);
    }
}
