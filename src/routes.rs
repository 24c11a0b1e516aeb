use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{protected, public};
use crate::middleware::security_middleware;
use crate::state::AppState;

/// The full application. Every route, known or not, runs through the security pipeline.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(public_routes())
        .merge(auth_routes())
        .merge(client_routes())
        .merge(task_routes())
        .merge(inquiry_routes())
        .merge(user_routes())
        .merge(audit_routes())
        .layer(middleware::from_fn_with_state(state.clone(), security_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/auth/csrf", get(auth::csrf))
        .route("/api/auth/roles", get(auth::roles))
}

fn client_routes() -> Router<AppState> {
    use protected::{clients, interactions};

    Router::new()
        .route("/api/clients", get(clients::list).post(clients::create))
        .route(
            "/api/clients/:id",
            get(clients::get).patch(clients::update).delete(clients::delete),
        )
        .route(
            "/api/clients/:id/interactions",
            get(interactions::list).post(interactions::create),
        )
}

fn task_routes() -> Router<AppState> {
    use protected::tasks;

    Router::new()
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/tasks/:id",
            get(tasks::get).patch(tasks::update).delete(tasks::delete),
        )
        .route("/api/tasks/:id/assign", post(tasks::assign))
}

fn inquiry_routes() -> Router<AppState> {
    use protected::inquiries;

    Router::new()
        // Submission is anonymous; listing is not
        .route("/api/inquiries", post(public::inquiry_submit).get(inquiries::list))
        .route("/api/inquiries/:id/status", patch(inquiries::update_status))
}

fn user_routes() -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::provision))
        .route("/api/users/:id", get(users::get).patch(users::update_profile))
        .route("/api/users/:id/role", put(users::change_role))
        .route("/api/users/:id/deactivate", post(users::deactivate))
        .route("/api/users/:id/reactivate", post(users::reactivate))
}

fn audit_routes() -> Router<AppState> {
    use protected::audit;

    Router::new()
        .route("/api/audit/logs", get(audit::logs))
        .route("/api/audit/alerts", get(audit::alerts))
        .route("/api/audit/report", get(audit::report))
        .route("/api/audit/activity/:actor", get(audit::activity))
}
