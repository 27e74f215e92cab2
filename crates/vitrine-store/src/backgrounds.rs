//! The background catalog: typed operations over `backgrounds.json`.

use std::path::PathBuf;

use tracing::debug;

use vitrine_shared::{Background, RecordId};

use crate::error::Result;
use crate::models::non_empty;
use crate::ordering::{move_to, next_id, position_of, renumber, sort_by_order};
use crate::store::JsonStore;

#[derive(Debug, Clone)]
pub struct NewBackground {
    pub name: String,
    pub description: Option<String>,
    pub path: String,
    pub order: Option<i64>,
}

/// Same empty-means-keep rules as [`crate::ModelPatch`].
#[derive(Debug, Clone, Default)]
pub struct BackgroundPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub order: Option<i64>,
    pub path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackgroundUpdate {
    pub background: Background,
    /// Image URI that was replaced and whose file can now be removed.
    pub replaced_path: Option<String>,
}

pub struct BackgroundCatalog {
    store: JsonStore<Background>,
}

impl BackgroundCatalog {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            store: JsonStore::open(path).await?,
        })
    }

    pub async fn list(&self) -> Result<Vec<Background>> {
        self.store.get().await
    }

    pub async fn add(&self, new: NewBackground) -> Result<Background> {
        self.store
            .mutate(move |backgrounds| {
                let id = next_id(backgrounds);
                let order = new
                    .order
                    .filter(|o| *o > 0)
                    .unwrap_or(backgrounds.len() as i64 + 1);

                backgrounds.push(Background {
                    id,
                    name: new.name,
                    description: new.description,
                    path: new.path,
                    order,
                });
                sort_by_order(backgrounds);
                renumber(backgrounds);

                let idx = position_of(backgrounds, id)?;
                debug!(id, "Background added");
                Ok(backgrounds[idx].clone())
            })
            .await
    }

    pub async fn update(&self, id: RecordId, patch: BackgroundPatch) -> Result<BackgroundUpdate> {
        self.store
            .mutate(move |backgrounds| {
                let idx = position_of(backgrounds, id)?;
                let background = &mut backgrounds[idx];

                if let Some(name) = non_empty(patch.name) {
                    background.name = name;
                }
                if let Some(description) = non_empty(patch.description) {
                    background.description = Some(description);
                }
                let replaced_path = patch
                    .path
                    .map(|path| std::mem::replace(&mut background.path, path));

                if let Some(order) = patch.order.filter(|o| *o != 0) {
                    background.order = order;
                }
                sort_by_order(backgrounds);
                renumber(backgrounds);

                let idx = position_of(backgrounds, id)?;
                Ok(BackgroundUpdate {
                    background: backgrounds[idx].clone(),
                    replaced_path,
                })
            })
            .await
    }

    pub async fn remove(&self, id: RecordId) -> Result<Background> {
        self.store
            .mutate(move |backgrounds| {
                let idx = position_of(backgrounds, id)?;
                let removed = backgrounds.remove(idx);
                renumber(backgrounds);
                Ok(removed)
            })
            .await
    }

    pub async fn reorder(&self, id: RecordId, position: i64) -> Result<Vec<Background>> {
        self.store
            .mutate(move |backgrounds| {
                move_to(backgrounds, id, position)?;
                Ok(backgrounds.clone())
            })
            .await
    }
}
