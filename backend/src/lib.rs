//! # Ministério Infantil Backend
//!
//! REST backend of the children's ministry points board.
//!
//! ## Architecture
//!
//! ```text
//! IO Layer (REST handlers, auth middleware)
//!     ↓
//! Domain Layer (point ledger, services)
//!     ↓
//! Storage Layer (SQLite repositories)
//! ```
//!
//! [`initialize_backend`] wires the layers together over one database pool
//! and [`create_router`] exposes them over HTTP.

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{
    auth::TokenIssuer, user_service::AVATAR_URL_PREFIX, AdminService, ChildService, PointLedger, PresenceService,
    UserService,
};
use crate::storage::{ChildRepository, DbConnection, PointRepository, PresenceRepository, UserRepository};

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub ledger: PointLedger,
    pub child_service: ChildService,
    pub user_service: UserService,
    pub presence_service: PresenceService,
    pub admin_service: AdminService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build every service over an open database
    pub fn new(db: DbConnection, config: Config) -> Self {
        let children = Arc::new(ChildRepository::new(db.clone()));
        let points = Arc::new(PointRepository::new(db.clone()));
        let users = Arc::new(UserRepository::new(db.clone()));
        let presence = Arc::new(PresenceRepository::new(db));

        let ledger = PointLedger::new(children.clone(), users.clone(), points.clone(), config.ledger);
        let child_service = ChildService::new(children, points.clone(), users.clone(), config.ledger.window);
        let user_service = UserService::new(
            users.clone(),
            presence.clone(),
            TokenIssuer::new(&config.jwt_secret, Duration::hours(config.token_ttl_hours)),
            config.upload_dir.clone(),
        );
        let presence_service = PresenceService::new(users.clone(), presence);
        let admin_service = AdminService::new(users, points);

        Self {
            ledger,
            child_service,
            user_service,
            presence_service,
            admin_service,
            config: Arc::new(config),
        }
    }
}

/// Initialize the backend with all required services
pub async fn initialize_backend(config: Config) -> Result<AppState> {
    info!("Setting up database at {}", config.database_url);
    let db = DbConnection::new(&config.database_url).await?;

    info!(
        "Point ledger: {} points per {}h, retraction {:?}",
        config.ledger.award_limit,
        config.ledger.window.num_hours(),
        config.ledger.retraction
    );
    Ok(AppState::new(db, config))
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router {
    let cors = cors_layer(app_state.config.cors_origin.as_deref());
    let uploads = ServeDir::new(&app_state.config.upload_dir);

    let public_routes = Router::new()
        .route("/", get(io::root))
        .route("/register", post(io::register))
        .route("/login", post(io::login));

    let protected_routes = Router::new()
        .route("/children", get(io::list_children).post(io::create_children))
        .route("/children/batch", post(io::create_children_batch))
        .route("/children/filterByAge", get(io::filter_by_age))
        .route("/children/:id", get(io::get_child).put(io::update_child))
        .route("/children/:id/points", get(io::get_points))
        .route("/children/:id/points/all", get(io::get_all_points))
        .route("/delete", delete(io::delete_children))
        .route("/addPoint/:idChild/:idUser", post(io::add_point))
        .route("/deletePoint/:id", delete(io::delete_point))
        .route("/resetPoints", delete(io::reset_points))
        .route("/resetChildren", delete(io::reset_children))
        .route("/users", get(io::list_users))
        .route("/users/fixUsernames", post(io::fix_usernames))
        .route("/users/refreshAvatars", post(io::refresh_avatars))
        .route("/users/:id", put(io::update_user).delete(io::delete_user))
        .route("/users/:id/avatar", post(io::upload_avatar))
        .route("/presence/:id", post(io::add_presence).delete(io::remove_presence))
        .route("/admin/defaults", post(io::backfill_defaults))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), io::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(AVATAR_URL_PREFIX, uploads)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    match origin.map(str::parse::<HeaderValue>) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Ignoring invalid CORS_ORIGIN: {}", e);
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LedgerConfig;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use tower::ServiceExt;

    async fn setup_test() -> Router {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        let config = Config {
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 12,
            cors_origin: None,
            upload_dir: PathBuf::from("target/test-uploads"),
            ledger: LedgerConfig::default(),
        };
        create_router(AppState::new(db, config))
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Register a user and log in; returns (user id, token)
    async fn sign_in(app: &Router) -> (i64, String) {
        let registered = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/register",
                None,
                json!({"username": "Tia Ana", "password": "segredo", "level": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(registered.status(), StatusCode::CREATED);
        let user_id = body_json(registered).await["id"].as_i64().unwrap();

        let login = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                json!({"username": "tia ana", "password": "segredo"}),
            ))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        let token = body_json(login).await["token"].as_str().unwrap().to_string();
        (user_id, token)
    }

    #[tokio::test]
    async fn test_root_is_public() {
        let app = setup_test().await;
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Hello World");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = setup_test().await;
        let response = app
            .oneshot(Request::builder().uri("/children").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Token not provided");
    }

    #[tokio::test]
    async fn test_garbage_token_is_forbidden() {
        let app = setup_test().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/children")
                    .header(header::AUTHORIZATION, "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let app = setup_test().await;
        sign_in(&app).await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/login",
                None,
                json!({"username": "tia ana", "password": "errada"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_award_limit_and_retraction_over_http() {
        let app = setup_test().await;
        let (user_id, token) = sign_in(&app).await;

        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/children",
                Some(&token),
                json!([{"name": "Ana", "dateOfBirth": "2015-06-15"}]),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let child_id = body_json(created).await[0]["id"].as_i64().unwrap();

        let award_uri = format!("/addPoint/{}/{}", child_id, user_id);
        for _ in 0..4 {
            let response = app
                .clone()
                .oneshot(json_request("POST", &award_uri, Some(&token), json!({})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let limited = app
            .clone()
            .oneshot(json_request("POST", &award_uri, Some(&token), json!({})))
            .await
            .unwrap();
        assert_eq!(limited.status(), StatusCode::BAD_REQUEST);

        let retract_uri = format!("/deletePoint/{}", child_id);
        let retracted = app
            .clone()
            .oneshot(json_request("DELETE", &retract_uri, Some(&token), json!({})))
            .await
            .unwrap();
        assert_eq!(retracted.status(), StatusCode::OK);

        let summary = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/children/{}", child_id))
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let summary = body_json(summary).await;
        assert_eq!(summary["points"], 3);
        assert_eq!(summary["pointsAdded"], 3);
        assert_eq!(summary["dateOfBirth"], "15/06/2015");
        assert_eq!(summary["nome"], "Ana");
        assert!(summary["idade"].is_number());
    }

    #[tokio::test]
    async fn test_unknown_child_is_not_found() {
        let app = setup_test().await;
        let (user_id, token) = sign_in(&app).await;

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/addPoint/999/{}", user_id),
                Some(&token),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Child not found");
    }

    #[tokio::test]
    async fn test_duplicate_presence_over_http() {
        let app = setup_test().await;
        let (user_id, token) = sign_in(&app).await;
        let uri = format!("/presence/{}", user_id);
        let body = json!({"createdAt": "2024-06-02", "period": "MORNING"});

        let first = app
            .clone()
            .oneshot(json_request("POST", &uri, Some(&token), body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(body_json(first).await["day"], "2024-06-02");

        let second = app
            .oneshot(json_request("POST", &uri, Some(&token), body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filter_by_age_requires_both_bounds() {
        let app = setup_test().await;
        let (_, token) = sign_in(&app).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/children/filterByAge?minAge=6")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "maxAge is required");
    }

    #[tokio::test]
    async fn test_malformed_requests_get_json_errors() {
        let app = setup_test().await;
        let (_, token) = sign_in(&app).await;

        let bad_path = json_request("POST", "/addPoint/abc/1", Some(&token), json!({}));
        let bad_query = Request::builder()
            .uri("/users?page=abc")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let bad_body = Request::builder()
            .method("POST")
            .uri("/children")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from("[{\"nome\": "))
            .unwrap();

        for request in [bad_path, bad_query, bad_body] {
            let uri = request.uri().to_string();
            let response = app.clone().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/json",
                "{}",
                uri
            );
            assert!(body_json(response).await["error"].is_string(), "{}", uri);
        }
    }
}
