use axum::{Json, extract::State, response::IntoResponse};
use tracing::warn;
use uuid::Uuid;

use arcadia_types::api::{
    CatalogListResponse, DeleteCatalogRequest, ImportCatalogRequest, ImportCatalogResponse,
    OkResponse, UpsertCatalogRequest,
};
use arcadia_types::models::CatalogItem;

use crate::AppState;
use crate::error::ApiError;

/// GET /catalog — public listing, newest first.
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_catalog()?;

    let items = rows
        .into_iter()
        .map(|row| CatalogItem {
            id: row.id.parse().unwrap_or_else(|e| {
                warn!("Corrupt catalog id '{}': {}", row.id, e);
                Uuid::default()
            }),
            title: row.title,
            link: row.link,
            image: row.image,
            category: row.category,
            premium: row.premium,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(CatalogListResponse { ok: true, items }))
}

/// POST /admin/catalog — create or update, keyed on the unique link.
pub async fn upsert(
    State(state): State<AppState>,
    Json(req): Json<UpsertCatalogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim();
    let link = req.link.trim();
    if title.is_empty() || link.is_empty() {
        return Err(ApiError::Validation("TITLE_AND_LINK_REQUIRED"));
    }

    state.db.upsert_catalog_item(
        &Uuid::new_v4().to_string(),
        title,
        link,
        req.image.trim(),
        req.category.trim(),
        req.premium,
        state.clock.now_ms(),
    )?;

    Ok(Json(OkResponse::new()))
}

pub async fn delete(
    State(state): State<AppState>,
    Json(req): Json<DeleteCatalogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let link = req.link.trim();
    if link.is_empty() {
        return Err(ApiError::Validation("LINK_REQUIRED"));
    }

    state.db.delete_catalog_item(link)?;
    Ok(Json(OkResponse::new()))
}

pub async fn clear(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.db.clear_catalog()?;
    Ok(Json(OkResponse::new()))
}

/// POST /admin/catalog/import — fetch a JSON array of entries from a remote
/// listing and upsert each one. Entries missing a title or link are skipped,
/// not fatal.
pub async fn import(
    State(state): State<AppState>,
    Json(req): Json<ImportCatalogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = req.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::Validation("URL_REQUIRED"));
    }

    let entries: Vec<UpsertCatalogRequest> = reqwest::get(&url)
        .await
        .map_err(|e| {
            warn!("Catalog import fetch failed for {}: {}", url, e);
            ApiError::Validation("IMPORT_FETCH_FAILED")
        })?
        .json()
        .await
        .map_err(|e| {
            warn!("Catalog import payload invalid from {}: {}", url, e);
            ApiError::Validation("IMPORT_PAYLOAD_INVALID")
        })?;

    let now_ms = state.clock.now_ms();
    let mut imported = 0;

    for entry in entries {
        let title = entry.title.trim();
        let link = entry.link.trim();
        if title.is_empty() || link.is_empty() {
            warn!("Skipping catalog entry without title/link");
            continue;
        }

        state.db.upsert_catalog_item(
            &Uuid::new_v4().to_string(),
            title,
            link,
            entry.image.trim(),
            entry.category.trim(),
            entry.premium,
            now_ms,
        )?;
        imported += 1;
    }

    Ok(Json(ImportCatalogResponse { ok: true, imported }))
}
