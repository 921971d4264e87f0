//! API Routes
//!
//! Configures the Axum router with all demo server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    add_members_handler, create_record_handler, delete_record_handler, get_record_handler,
    get_related_handler, health_handler, remove_members_handler, stats_handler,
    update_record_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/records/:entity", post(create_record_handler))
        .route(
            "/records/:entity/:pk",
            get(get_record_handler)
                .put(update_record_handler)
                .delete(delete_record_handler),
        )
        .route("/records/:entity/:pk/:relation", get(get_related_handler))
        .route("/records/:entity/:pk/:relation/add", post(add_members_handler))
        .route(
            "/records/:entity/:pk/:relation/remove",
            post(remove_members_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tower::util::ServiceExt;

    async fn status_of(app: &Router, method: Method, uri: &str, body: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    fn create_test_app() -> Router {
        create_router(AppState::from_config(&Config::default()).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_stats_routes() {
        let app = create_test_app();

        assert_eq!(status_of(&app, Method::GET, "/health", "").await, StatusCode::OK);
        assert_eq!(status_of(&app, Method::GET, "/stats", "").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_record_routes_by_method() {
        let app = create_test_app();
        let person = r#"{"fields":{"name":"Dickens"}}"#;

        let created = status_of(&app, Method::POST, "/records/library.Person", person).await;
        assert_eq!(created, StatusCode::CREATED);

        let uri = "/records/library.Person/1";
        assert_eq!(status_of(&app, Method::GET, uri, "").await, StatusCode::OK);
        assert_eq!(status_of(&app, Method::PUT, uri, person).await, StatusCode::OK);
        assert_eq!(status_of(&app, Method::DELETE, uri, "").await, StatusCode::OK);
        assert_eq!(status_of(&app, Method::GET, uri, "").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_relation_routes() {
        let app = create_test_app();
        status_of(&app, Method::POST, "/records/library.Book", r#"{"fields":{"title":"Emma"}}"#)
            .await;

        let related = status_of(&app, Method::GET, "/records/library.Book/1/editors", "").await;
        assert_eq!(related, StatusCode::OK);

        let uri = "/records/library.Book/1/editors/remove";
        let removed = status_of(&app, Method::POST, uri, r#"{"members":[5]}"#).await;
        assert_eq!(removed, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unmatched_routes() {
        let app = create_test_app();

        let missing = status_of(&app, Method::GET, "/records", "").await;
        assert_eq!(missing, StatusCode::NOT_FOUND);
        let wrong_method = status_of(&app, Method::DELETE, "/records/library.Book", "").await;
        assert_eq!(wrong_method, StatusCode::METHOD_NOT_ALLOWED);
    }
}
