// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, generate, student, tests},
    state::AppState,
    utils::{
        jwt::{auth_middleware, student_middleware, teacher_middleware},
        rate_limit::{UserKeyExtractor, refill_millis},
    },
};

/// Assembles the main application router.
///
/// * Public: registration and login.
/// * Teacher: test authoring, analytics and the AI wizard.
/// * Student: joining by key, taking tests, results.
///
/// Protected groups run auth first, then the role gate, then the per-user rate cap.
/// Both groups share one cap of `RATE_LIMIT_PER_MINUTE` requests per user.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let per_minute = state.config.rate_limit_per_minute.max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(UserKeyExtractor)
            .per_millisecond(refill_millis(per_minute))
            .burst_size(per_minute)
            .finish()
            .expect("per-user quota is non-zero"),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        );

    let teacher_routes = Router::new()
        .route("/api/tests", get(tests::list_tests).post(tests::create_test))
        .route("/api/tests/{id}", put(tests::update_test).delete(tests::delete_test))
        .route("/api/tests/{id}/publish", post(tests::publish_test))
        .route(
            "/api/tests/{id}/questions",
            get(tests::list_questions).post(tests::add_question),
        )
        .route("/api/tests/{id}/questions/{qid}", delete(tests::delete_question))
        .route("/api/tests/{id}/analytics", get(tests::analytics))
        .route("/api/generate", post(generate::generate))
        .route("/api/generate/save", post(generate::save))
        .layer(GovernorLayer::new(governor_conf.clone()))
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let student_routes = Router::new()
        .route("/tests", get(student::list_published))
        .route("/tests/key/{key}", get(student::find_by_key))
        .route("/tests/{id}/start", post(student::start))
        .route("/tests/{id}/submit", post(student::submit))
        .route("/attempts", get(student::list_attempts))
        .route("/attempts/{id}", get(student::attempt_results))
        .route("/improvement", get(student::improvement))
        .layer(GovernorLayer::new(governor_conf))
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(teacher_routes)
        .nest("/api/student", student_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
