//! `/api/models` handlers.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use vitrine_shared::constants::{FIELD_MODEL_FILE, FIELD_THUMBNAIL_FILE};
use vitrine_shared::format::extension_of;
use vitrine_shared::{Model, ModelFormat, RecordId};
use vitrine_store::{FormatFilter, ModelPatch, NewModel};

use crate::api::{json_integer, AppState, MessageResponse};
use crate::asset_store::AssetKind;
use crate::error::ServerError;
use crate::upload::UploadForm;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchDeleteResponse {
    message: String,
    deleted_count: usize,
    remaining_count: usize,
}

pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<Model>>, ServerError> {
    Ok(Json(state.models.list().await?))
}

pub async fn create_model(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Model>), ServerError> {
    let mut form = UploadForm::read(multipart).await?;

    let (Some(name), Some(model_file), Some(thumbnail_file)) = (
        form.required_text("name"),
        form.take_file(FIELD_MODEL_FILE),
        form.take_file(FIELD_THUMBNAIL_FILE),
    ) else {
        return Err(ServerError::BadRequest(
            "name, modelFile and thumbnailFile are required".into(),
        ));
    };

    // The stored format keeps the uploaded spelling; validation is
    // case-insensitive.
    ModelFormat::from_file_name(&model_file.file_name)
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;
    let format = extension_of(&model_file.file_name)
        .unwrap_or_default()
        .to_string();

    let path = state
        .assets
        .store_upload(
            AssetKind::Model,
            FIELD_MODEL_FILE,
            &model_file.file_name,
            &model_file.data,
        )
        .await?;
    let thumbnail = match state
        .assets
        .store_upload(
            AssetKind::Image,
            FIELD_THUMBNAIL_FILE,
            &thumbnail_file.file_name,
            &thumbnail_file.data,
        )
        .await
    {
        Ok(uri) => uri,
        Err(e) => {
            state.assets.discard(&path).await;
            return Err(e);
        }
    };

    let new = NewModel {
        name,
        description: form.text("description"),
        path: path.clone(),
        format,
        thumbnail: thumbnail.clone(),
        order: form.order(),
        background_id: form.background_id()?.flatten(),
    };

    match state.models.add(new).await {
        Ok(model) => {
            info!(id = model.id, format = %model.format, path = %model.path, "Model created");
            Ok((StatusCode::CREATED, Json(model)))
        }
        Err(e) => {
            state.assets.discard(&path).await;
            state.assets.discard(&thumbnail).await;
            Err(e.into())
        }
    }
}

pub async fn update_model(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    multipart: Multipart,
) -> Result<Json<Model>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;

    let thumbnail = match form.take_file(FIELD_THUMBNAIL_FILE) {
        Some(file) => Some(
            state
                .assets
                .store_upload(
                    AssetKind::Image,
                    FIELD_THUMBNAIL_FILE,
                    &file.file_name,
                    &file.data,
                )
                .await?,
        ),
        None => None,
    };

    let patch = ModelPatch {
        name: form.text("name"),
        description: form.text("description"),
        order: form.order(),
        thumbnail: thumbnail.clone(),
        background_id: form.background_id()?,
    };

    let update = match state.models.update(id, patch).await {
        Ok(update) => update,
        Err(e) => {
            if let Some(uri) = &thumbnail {
                state.assets.discard(uri).await;
            }
            return Err(e.into());
        }
    };

    if let Some(old) = &update.replaced_thumbnail {
        remove_unreferenced(&state, old).await;
    }

    info!(id, "Model updated");
    Ok(Json(update.model))
}

pub async fn delete_model(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Result<Json<MessageResponse>, ServerError> {
    let removed = state.models.remove(id).await?;

    remove_unreferenced(&state, &removed.path).await;
    remove_unreferenced(&state, &removed.thumbnail).await;

    info!(id, name = %removed.name, "Model deleted");
    Ok(Json(MessageResponse {
        message: "Model deleted".into(),
    }))
}

pub async fn reorder_models(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Vec<Model>>, ServerError> {
    let id = json_integer(&body, "modelId")?;
    let position = json_integer(&body, "newPosition")?;

    let models = state.models.reorder(id, position).await?;
    info!(id, position, "Models reordered");
    Ok(Json(models))
}

pub async fn batch_delete_models(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<BatchDeleteResponse>, ServerError> {
    let selector = body
        .get("format")
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::BadRequest("Missing field 'format'".into()))?;
    let filter = FormatFilter::parse(selector)?;

    let removal = state.models.batch_remove(filter).await?;
    for model in &removal.removed {
        remove_unreferenced(&state, &model.path).await;
        remove_unreferenced(&state, &model.thumbnail).await;
    }

    info!(
        selector,
        deleted = removal.removed.len(),
        remaining = removal.remaining,
        "Batch delete finished"
    );
    Ok(Json(BatchDeleteResponse {
        message: format!("Deleted {} models", removal.removed.len()),
        deleted_count: removal.removed.len(),
        remaining_count: removal.remaining,
    }))
}

/// Delete an asset file unless a remaining model still points at it.
/// Sample models share one mesh file, so blind deletion would break them.
async fn remove_unreferenced(state: &AppState, uri: &str) {
    match state.models.list().await {
        Ok(models) if models.iter().any(|m| m.path == uri || m.thumbnail == uri) => {
            info!(uri = %uri, "Asset still referenced, keeping file");
        }
        Ok(_) => state.assets.discard(uri).await,
        Err(e) => warn!(uri = %uri, error = %e, "Could not check asset references"),
    }
}
