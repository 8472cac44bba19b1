use crate::{
    catalog::CatalogIndex,
    config::Config,
    dataset::DatasetLoader,
    error::Result,
    ml::{HuggingFaceEmbedder, TextEmbedder},
    routes::api_routes,
    services::{CommentaryGenerator, RecommendationService},
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use log::info;
use std::{net::TcpListener, sync::Arc, time::Duration};

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.port,
            host: config.host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        // Always bind to 0.0.0.0 for Docker/Render compatibility
        let bind_address = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}:{}", self.host, self.port);

        self.run_with_listener(listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        // Load the catalog and its embeddings
        let loader = DatasetLoader::new(&self.config).context("Failed to create dataset loader")?;
        let dataset = loader.load().await?;

        // The query embedder is optional; without it the ranker scores
        // every query with the keyword heuristic
        let embedder: Option<Arc<dyn TextEmbedder>> =
            if self.config.huggingface_api_key.is_some() {
                let embedder = HuggingFaceEmbedder::new(&self.config)
                    .context("Failed to create the query embedder")?;
                Some(Arc::new(embedder))
            } else {
                info!("No HuggingFace API key configured, queries use keyword scoring");
                None
            };

        let catalog = Arc::new(CatalogIndex::build(dataset.wines));

        let recommendation_service = web::Data::new(RecommendationService::new(
            catalog.clone(),
            dataset.embeddings,
            embedder,
            Duration::from_secs(self.config.embed_timeout_secs),
        ));
        let commentary = web::Data::new(CommentaryGenerator::new(&self.config));
        let catalog_data = web::Data::from(catalog);

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(catalog_data.clone())
                .app_data(recommendation_service.clone())
                .app_data(commentary.clone())
                .service(api_routes())
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
