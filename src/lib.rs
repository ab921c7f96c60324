//! E-learning curriculum service.
//!
//! Lecturers build the curriculum of a course as an ordered list of chapters
//! ("babs"), each holding lessons, quizzes and assignments. A build either
//! appends chapters (`POST /courses/{id}/materials`) or replaces the whole
//! tree (`PUT /courses/{id}/materials`), always inside one SQLite transaction.
//!
//! # Endpoints
//!
//! | Method | Path                          | Purpose                         |
//! |--------|-------------------------------|---------------------------------|
//! | GET    | `/health`                     | liveness                        |
//! | POST   | `/courses`                    | create a course (lecturer)      |
//! | DELETE | `/courses/{id}`               | delete a course (owner)         |
//! | GET    | `/courses/{id}/materials`     | read the ordered curriculum     |
//! | POST   | `/courses/{id}/materials`     | append chapters (owner)         |
//! | PUT    | `/courses/{id}/materials`     | replace the curriculum (owner)  |
//!
//! Identity comes from the upstream session layer through the `x-user-id`
//! and `x-user-role` headers.
//!
//! # Configuration
//!
//! ```sh
//! PORT=3000 DATABASE_PATH=data/elearning.db LOG_LEVEL=info cargo run
//! ```
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{delete, get, post},
    Router,
};
use log::{error, info};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use config::Config;
use routes::{
    create_course_handler, create_materials_handler, delete_course_handler, get_materials_handler,
    health_handler, replace_materials_handler, USER_ID_HEADER, USER_ROLE_HEADER,
};
use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, USER_ID_HEADER, USER_ROLE_HEADER])
        .max_age(Duration::from_secs(state.config.cors_max_age_secs));

    Router::new()
        .route("/health", get(health_handler))
        .route("/courses", post(create_course_handler))
        .route("/courses/{course_id}", delete(delete_course_handler))
        .route(
            "/courses/{course_id}/materials",
            get(get_materials_handler)
                .post(create_materials_handler)
                .put(replace_materials_handler),
        )
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(config: Config) -> anyhow::Result<()> {
    info!("Initializing state...");
    let state = AppState::open(config)?;

    info!("Starting server...");
    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
