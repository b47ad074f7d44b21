use axum::Router;

pub mod conversations;
pub mod documents;

/// All HTTP routes; the DI provider is attached by the caller.
pub fn router() -> Router {
    Router::new()
        .nest("/conversations", conversations::router())
        .nest("/documents", documents::router())
}
