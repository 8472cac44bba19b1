use crate::models::HealthResponse;
use actix_web::{get, HttpResponse};

#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{body::to_bytes, App};

    #[actix_web::test]
    async fn test_health_check_reports_ok() {
        let app = actix_web::test::init_service(App::new().service(health_check)).await;
        let request = actix_web::test::TestRequest::get()
            .uri("/health")
            .to_request();

        let response = actix_web::test::call_service(&app, request).await;
        assert!(response.status().is_success());

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["timestamp"].as_str().is_some());
    }
}
