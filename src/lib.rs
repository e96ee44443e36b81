pub mod api;
pub mod auth;
pub mod codec;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod identifier;
pub mod middleware;
pub mod state;
pub mod value;

#[cfg(test)]
pub mod testing;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::middleware::request_gate_middleware;
use crate::state::AppState;

/// Builds the complete router for `state`, nested under the configured base path.
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut data = data_routes(config.server.read_only);
    if state.gate.is_some() {
        data = data.layer(from_fn_with_state(state.clone(), request_gate_middleware));
    }

    let mut routes = Router::new()
        .merge(system_routes())
        .merge(file_routes())
        .merge(data);
    if state.auth.is_some() {
        routes = routes.merge(auth_routes());
    } else {
        info!("No JWT secret configured, /auth routes are not mounted");
    }

    let routes = routes.fallback(handlers::system::not_found).with_state(state);

    let mut app = if config.server.base == "/" {
        routes
    } else {
        Router::new()
            .nest(&config.server.base, routes)
            .fallback(handlers::system::not_found)
    };

    app = app.layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));
    if config.server.disable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    info!(
        "Routes mounted at {} ({})",
        config.server.base,
        if config.server.read_only { "read-only" } else { "read-write" }
    );
    app
}

fn system_routes() -> Router<AppState> {
    use handlers::system;

    Router::new()
        .route("/ping", get(system::ping))
        .route("/health", get(system::health))
}

fn file_routes() -> Router<AppState> {
    Router::new().route("/file/:collection/:object_id/:file/:type/:prop", get(handlers::file::get))
}

fn data_routes(read_only: bool) -> Router<AppState> {
    use handlers::data::{collection, document};

    if read_only {
        return Router::new()
            .route("/:collection", get(collection::get))
            .route("/:collection/:id", get(document::get));
    }

    Router::new()
        // Collection-level operations
        .route(
            "/:collection",
            get(collection::get)
                .post(collection::post)
                .patch(collection::patch)
                .put(collection::put)
                .delete(collection::delete),
        )
        // Document-level operations
        .route(
            "/:collection/:id",
            get(document::get)
                .post(document::post)
                .patch(document::patch)
                .put(document::put)
                .delete(document::delete),
        )
}

fn auth_routes() -> Router<AppState> {
    use handlers::auth::{recovery, session, social};

    Router::new()
        .route("/auth/register", post(session::register))
        .route("/auth/login", post(session::login))
        .route("/auth/session", get(session::session))
        .route("/auth/updatePassword", post(session::update_password))
        .route("/auth/activation", post(recovery::request_activation))
        .route("/auth/activate", post(recovery::activate))
        .route("/auth/password_recovery", post(recovery::password_recovery))
        .route("/auth/validate_recovery_hash/:recovery_hash", get(recovery::validate_recovery_hash))
        .route("/auth/social/google", post(social::google))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::testing::TestContext;
    use crate::value::Value;

    #[tokio::test]
    async fn ping_and_health_are_open() {
        let ctx = TestContext::new();
        let res = ctx.get("/ping", None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json(), json!({ "status": "OK" }));

        let res = ctx.get("/health", None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json()["store"], "memory");
    }

    #[tokio::test]
    async fn unknown_routes_are_404() {
        let ctx = TestContext::new();
        let res = ctx.get("/a/b/c", None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.json(), json!({ "status": 404 }));
    }

    #[tokio::test]
    async fn data_routes_require_a_token() {
        let ctx = TestContext::new();
        let res = ctx.get("/widgets", None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.json(), json!({ "status": "failed", "message": "Auth failure" }));

        let res = ctx.get("/widgets", Some("not-a-jwt")).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);

        let token = ctx.session_token(&Value::Int(1));
        let res = ctx.get(&format!("/widgets?token={}", token), None).await;
        assert_eq!(res.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn excluded_paths_skip_the_gate() {
        let mut config = TestContext::config();
        config.security.exclude = vec!["/public".to_string()];
        let ctx = TestContext::with_config(config);
        let token = ctx.session_token(&Value::Int(1));
        ctx.send(Method::POST, "/public/anything", r#"{"v":1}"#, Some(&token)).await;

        let res = ctx.get("/public/anything", None).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.json(), json!({ "_id": "anything", "v": 1 }));
        assert_eq!(ctx.get("/private/anything", None).await.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn shared_token_gate() {
        let mut config = TestContext::config();
        config.security.jwt_key = None;
        config.security.auth_token = Some("s3cret".to_string());
        let ctx = TestContext::with_config(config);
        assert!(ctx.state.auth.is_none());

        assert_eq!(ctx.get("/widgets", Some("s3cret")).await.status, StatusCode::OK);
        assert_eq!(ctx.get("/widgets?token=s3cret", None).await.status, StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.get("/widgets", Some("wrong")).await.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn no_credentials_means_open_routes() {
        let mut config = TestContext::config();
        config.security.jwt_key = None;
        let ctx = TestContext::with_config(config);
        assert!(ctx.state.gate.is_none());
        assert_eq!(ctx.get("/widgets", None).await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn routes_nest_under_the_base_path() {
        let mut config = TestContext::config();
        config.server.base = "/api".to_string();
        let ctx = TestContext::with_config(config);
        assert_eq!(ctx.get("/api/ping", None).await.status, StatusCode::OK);
        let res = ctx.get("/ping", None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.json(), json!({ "status": 404 }));

        let token = ctx.session_token(&Value::Int(1));
        assert_eq!(ctx.get("/api/widgets", Some(&token)).await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn read_only_mode_mounts_only_reads() {
        let mut config = TestContext::config();
        config.server.read_only = true;
        let ctx = TestContext::with_config(config);
        let token = ctx.session_token(&Value::Int(1));

        assert_eq!(ctx.get("/widgets", Some(&token)).await.status, StatusCode::OK);
        let res = ctx.send(Method::POST, "/widgets/1", r#"{"v":1}"#, Some(&token)).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
