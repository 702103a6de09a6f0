pub mod admin;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod embed;
pub mod error;
pub mod extract;
pub mod html;
pub mod mail;
pub mod middleware;
pub mod oauth;
pub mod posts;
pub mod sitemap;
pub mod state;
pub mod support;
pub mod viz;


use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::viz::routes as viz_routes;

/// Every API, auth, sitemap and embed route. The server adds static files,
/// health and the outer layers.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/confirm", get(auth::confirm_email))
        .route("/auth/password-reset", post(auth::request_password_reset))
        .route("/auth/password-reset/confirm", post(auth::confirm_password_reset))
        .route("/auth/oauth/{provider}/start", get(oauth::start))
        .route("/auth/oauth/{provider}/callback", get(oauth::callback))
        .route("/api/feed", get(posts::feed))
        .route("/api/posts", get(posts::grid))
        .route("/api/posts/{post}", get(posts::get_post))
        .route("/api/posts/{post}/view", post(posts::record_view))
        .route("/api/posts/{post}/share", post(posts::record_share))
        .route("/api/posts/{post}/comments", get(comments::list_comments))
        .route("/api/categories", get(categories::list_categories))
        .route("/api/categories/{id}/posts", get(categories::category_posts))
        .route("/api/contact-messages", post(support::create_contact_message))
        .route("/api/send-contact-message", post(support::send_contact_message))
        .route("/api/error-reports", post(support::create_error_report))
        .route("/api/send-error-report", post(support::send_error_report))
        .route("/api/sitemap-tree", get(sitemap::sitemap_tree))
        .route("/api/viz/sessions", post(viz_routes::mount_session))
        .route(
            "/api/viz/sessions/{id}",
            get(viz_routes::get_session).delete(viz_routes::unmount_session),
        )
        .route("/api/viz/sessions/{id}/events", post(viz_routes::report_event))
        .route("/sitemap.xml", get(sitemap::sitemap_xml))
        .route("/embed/{slug}", get(embed::embed_page));

    let protected_routes = Router::new()
        .route(
            "/api/posts/{post}/like",
            get(posts::like_status).post(posts::toggle_like),
        )
        .route("/api/posts/{post}/comments", post(comments::create_comment))
        .route(
            "/api/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route("/api/admin/posts", post(admin::create_post))
        .route(
            "/api/admin/posts/{id}",
            put(admin::update_post).delete(admin::delete_post),
        )
        .route("/api/admin/categories", post(admin::create_category))
        .route("/api/admin/settings/{key}", put(admin::update_setting))
        .route_layer(from_fn_with_state(state.clone(), require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state)
}
