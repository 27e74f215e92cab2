//! `/api/backgrounds` handlers.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::{info, warn};

use vitrine_shared::constants::FIELD_BACKGROUND_FILE;
use vitrine_shared::{Background, RecordId};
use vitrine_store::{BackgroundPatch, NewBackground};

use crate::api::{json_integer, AppState, MessageResponse};
use crate::asset_store::AssetKind;
use crate::error::ServerError;
use crate::upload::UploadForm;

pub async fn list_backgrounds(
    State(state): State<AppState>,
) -> Result<Json<Vec<Background>>, ServerError> {
    Ok(Json(state.backgrounds.list().await?))
}

pub async fn create_background(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Background>), ServerError> {
    let mut form = UploadForm::read(multipart).await?;

    let (Some(name), Some(file)) = (
        form.required_text("name"),
        form.take_file(FIELD_BACKGROUND_FILE),
    ) else {
        return Err(ServerError::BadRequest(
            "name and backgroundFile are required".into(),
        ));
    };

    let path = state
        .assets
        .store_upload(
            AssetKind::Image,
            FIELD_BACKGROUND_FILE,
            &file.file_name,
            &file.data,
        )
        .await?;

    let new = NewBackground {
        name,
        description: form.text("description"),
        path: path.clone(),
        order: form.order(),
    };

    match state.backgrounds.add(new).await {
        Ok(background) => {
            info!(id = background.id, path = %background.path, "Background created");
            Ok((StatusCode::CREATED, Json(background)))
        }
        Err(e) => {
            state.assets.discard(&path).await;
            Err(e.into())
        }
    }
}

pub async fn update_background(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    multipart: Multipart,
) -> Result<Json<Background>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;

    let path = match form.take_file(FIELD_BACKGROUND_FILE) {
        Some(file) => Some(
            state
                .assets
                .store_upload(
                    AssetKind::Image,
                    FIELD_BACKGROUND_FILE,
                    &file.file_name,
                    &file.data,
                )
                .await?,
        ),
        None => None,
    };

    let patch = BackgroundPatch {
        name: form.text("name"),
        description: form.text("description"),
        order: form.order(),
        path: path.clone(),
    };

    let update = match state.backgrounds.update(id, patch).await {
        Ok(update) => update,
        Err(e) => {
            if let Some(uri) = &path {
                state.assets.discard(uri).await;
            }
            return Err(e.into());
        }
    };

    if let Some(old) = &update.replaced_path {
        state.assets.discard(old).await;
    }

    info!(id, "Background updated");
    Ok(Json(update.background))
}

pub async fn delete_background(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Result<Json<MessageResponse>, ServerError> {
    let removed = state.backgrounds.remove(id).await?;
    state.assets.discard(&removed.path).await;

    match state.models.count_with_background(id).await {
        Ok(0) => {}
        Ok(count) => warn!(
            id,
            count, "Deleted background is still referenced by models"
        ),
        Err(e) => warn!(id, error = %e, "Could not check background references"),
    }

    info!(id, name = %removed.name, "Background deleted");
    Ok(Json(MessageResponse {
        message: "Background deleted".into(),
    }))
}

pub async fn reorder_backgrounds(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Vec<Background>>, ServerError> {
    let id = json_integer(&body, "backgroundId")?;
    let position = json_integer(&body, "newPosition")?;

    let backgrounds = state.backgrounds.reorder(id, position).await?;
    info!(id, position, "Backgrounds reordered");
    Ok(Json(backgrounds))
}
