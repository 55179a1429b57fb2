// Wind Report API v0.1
use axum::http::{HeaderValue, Method};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod routes;
mod services;

use config::AppConfig;
use routes::reports::AppState;
use services::power::PowerClient;
use services::storage::ArtifactStore;

/// Wind Report API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wind Report API",
        version = "0.1.0",
        description = "Fetches daily wind and solar observations from the NASA POWER \
            climate-data API for a geographic point, aggregates them into monthly \
            summaries, renders polar wind charts, and packages everything into a \
            downloadable Excel workbook with embedded chart images.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Reports", description = "Report generation and download"),
    ),
    paths(
        routes::health::health_check,
        routes::reports::generate_files,
        routes::reports::download_file,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::reports::GenerateRequest,
            routes::reports::GenerateResponse,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wind_report_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Open the artifact store and spawn the retention sweeper
    let store = ArtifactStore::new(
        &config.reports_dir,
        Duration::from_secs(config.retention_hours * 3600),
    )
    .expect("Failed to create reports directory");
    tokio::spawn(services::storage::run_retention_sweeper(store.clone()));

    // Create NASA POWER client
    let power_client = PowerClient::new(&config.power_base_url);

    let app_state = AppState {
        power_client,
        store,
    };

    // CORS — frontend origins depend on the deployment environment
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .map(|o| o.parse().expect("Invalid CORS origin"))
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any);

    // Build router
    let app = Router::new()
        .route("/generate-files", post(routes::reports::generate_files))
        .route("/download/:filename", get(routes::reports::download_file))
        .with_state(app_state)
        .route("/api/v1/health", get(routes::health::health_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
