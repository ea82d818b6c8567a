// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{delete, get, patch, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, comment, friend, message, notification, post as posts, profile},
    live,
    state::AppState,
    utils::jwt::{auth_middleware, optional_auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, friends, posts, comments,
///   notifications, messages, live socket).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify", get(auth::verify));

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me).delete(profile::delete_me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let friend_routes = Router::new()
        .route("/", get(friend::list_friends))
        .route("/request", post(friend::send_request))
        .route("/requests", get(friend::list_pending))
        .route("/{id}", patch(friend::respond).delete(friend::remove_friend))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The feed and post details serve anonymous viewers too; a valid
    // token only widens what the Visibility Resolver lets through.
    let post_read_routes = Router::new()
        .route("/", get(posts::list_feed))
        .route("/{id}", get(posts::get_post))
        .route("/{id}/comments", get(comment::list_comments))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let post_write_routes = Router::new()
        .route("/", post(posts::create_post))
        .route("/bookmarks", get(posts::list_bookmarks))
        .route("/{id}", patch(posts::update_post).delete(posts::delete_post))
        .route("/{id}/like", post(posts::toggle_like))
        .route("/{id}/bookmark", post(posts::toggle_bookmark))
        .route("/{id}/share", post(posts::share_post))
        .route("/{id}/comments", post(comment::create_comment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let comment_routes = Router::new()
        .route("/{id}", delete(comment::delete_comment))
        .route("/{id}/replies", post(comment::create_reply))
        .route("/{id}/like", post(comment::toggle_comment_like))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let notification_routes = Router::new()
        .route("/", get(notification::list_notifications))
        .route("/unread-count", get(notification::unread_count))
        .route("/read-all", patch(notification::mark_all_read))
        .route("/{id}/read", patch(notification::mark_read))
        .route("/{id}", delete(notification::delete_notification))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let message_routes = Router::new()
        .route("/", get(message::list_conversations))
        .route(
            "/{id}",
            get(message::fetch_thread)
                .post(message::send_message)
                .patch(message::update_message)
                .delete(message::delete_message),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/friends", friend_routes)
        .nest("/api/posts", post_read_routes.merge(post_write_routes))
        .nest("/api/comments", comment_routes)
        .nest("/api/notifications", notification_routes)
        .nest("/api/messages", message_routes)
        .route("/api/ws", get(live::ws_handler))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
