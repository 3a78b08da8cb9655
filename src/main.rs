use axum::http::HeaderValue;
use axum::{middleware, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use opsdesk_api::config;
use opsdesk_api::database::DatabaseManager;
use opsdesk_api::middleware::jwt_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting opsdesk API in {:?} mode", config.environment);

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("OPSDESK_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("opsdesk API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    // Everything under /api re-validates the bearer token per request.
    let protected = Router::new()
        .merge(auth_routes())
        .merge(org_routes())
        .layer(middleware::from_fn(jwt_auth_middleware));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_auth_routes())
        .merge(protected)
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
}

fn cors_layer() -> CorsLayer {
    let security = &config::config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

fn public_auth_routes() -> Router {
    use axum::routing::post;
    use opsdesk_api::handlers::public::auth;

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

fn auth_routes() -> Router {
    use axum::routing::{delete, put};
    use opsdesk_api::handlers::protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/auth/password", put(auth::update_password))
        .route("/api/auth/session", delete(auth::logout))
}

fn org_routes() -> Router {
    use axum::routing::{delete, post};
    use opsdesk_api::handlers::protected::{audit, members, orgs, tags, tickets};

    Router::new()
        .route("/api/orgs", get(orgs::list).post(orgs::create))
        .route("/api/orgs/:org", get(orgs::overview).delete(orgs::delete))
        // Tickets and timeline
        .route(
            "/api/orgs/:org/tickets",
            get(tickets::list).post(tickets::create),
        )
        .route(
            "/api/orgs/:org/tickets/:id",
            get(tickets::show).patch(tickets::update),
        )
        .route(
            "/api/orgs/:org/tickets/:id/comments",
            post(tickets::comment),
        )
        .route(
            "/api/orgs/:org/tickets/:id/tags/:tag",
            post(tickets::attach_tag).delete(tickets::detach_tag),
        )
        // Tags
        .route("/api/orgs/:org/tags", get(tags::list).post(tags::create))
        // Members
        .route(
            "/api/orgs/:org/members",
            get(members::list).post(members::add),
        )
        .route(
            "/api/orgs/:org/members/:user",
            delete(members::remove).patch(members::update_role),
        )
        // Audit trail
        .route("/api/orgs/:org/audit", get(audit::list))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "opsdesk API",
            "version": version,
            "description": "Multi-tenant support ticket API",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "public_auth": "/auth/register, /auth/login (public - token acquisition)",
                "auth": "/api/auth/* (protected - account management)",
                "orgs": "/api/orgs[/:org] (protected)",
                "tickets": "/api/orgs/:org/tickets[/:id] (protected)",
                "tags": "/api/orgs/:org/tags (protected)",
                "members": "/api/orgs/:org/members[/:user] (protected, admin)",
                "audit": "/api/orgs/:org/audit (protected)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
