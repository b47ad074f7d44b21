//! Documentation summaries endpoint

use crate::core::documents::{DocumentCatalog, DocumentSummary};
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;
use serde::Serialize;

pub fn router() -> Router {
    Router::new().route("/", get(list_documents))
}

#[derive(Serialize, Debug)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
}

async fn list_documents(Inject(catalog): Inject<DocumentCatalog>) -> Json<DocumentList> {
    Json(DocumentList {
        documents: catalog.documents().to_vec(),
    })
}
