//! Documentation Q&A assistant service
//!
//! (c) Softlandia 2025

use docs_assistant_api::api;
use docs_assistant_api::config::AssistantConfig;
use docs_assistant_api::core::documents::DocumentCatalog;
use docs_assistant_api::core::generator::DocsAnswerGenerator;
use docs_assistant_api::core::services::DocsConversationService;
use docs_assistant_api::infrastructure::registry::InMemoryConversationRegistry;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::{info, warn};
use tokio::runtime::{Builder, Runtime};
use tower_http::cors::{Any, CorsLayer};

fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt::init();

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(web_server_task())
}

async fn web_server_task() -> anyhow::Result<()> {
    let provider = ServiceCollection::new()
        .add(AssistantConfig::singleton())
        .add(DocumentCatalog::singleton())
        .add(DocsAnswerGenerator::singleton())
        .add(InMemoryConversationRegistry::singleton())
        .add(DocsConversationService::scoped())
        .build_provider()
        .map_err(|e| anyhow::anyhow!("failed to build service provider: {e:?}"))?;
    let config = provider.get_required::<AssistantConfig>();

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();

    let app = api::router()
        .layer(
            CorsLayer::new()
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_origin(origins),
        )
        .with_provider(provider);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    info!("Shutting down...");

    Ok(())
}
