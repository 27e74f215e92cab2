//! The model catalog: typed operations over `models.json`.

use std::path::PathBuf;

use tracing::debug;

use vitrine_shared::constants::FORMAT_ALL;
use vitrine_shared::{Model, RecordId};

use crate::error::{Result, StoreError};
use crate::ordering::{move_to, next_id, position_of, renumber, sort_by_order};
use crate::store::JsonStore;

/// Fields of a model about to be created. Paths point at files the caller
/// has already written.
#[derive(Debug, Clone)]
pub struct NewModel {
    pub name: String,
    pub description: Option<String>,
    pub path: String,
    pub format: String,
    pub thumbnail: String,
    /// Requested 1-based position; `None` or a non-positive value appends.
    pub order: Option<i64>,
    pub background_id: Option<RecordId>,
}

/// A partial update. `None` keeps the stored value.
///
/// Empty strings and an `order` of zero are treated like `None`: a
/// description cannot be cleared through a patch.
#[derive(Debug, Clone, Default)]
pub struct ModelPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub order: Option<i64>,
    pub thumbnail: Option<String>,
    /// `Some(None)` clears the background, `Some(Some(id))` sets it.
    pub background_id: Option<Option<RecordId>>,
}

/// Result of [`ModelCatalog::update`].
#[derive(Debug, Clone)]
pub struct ModelUpdate {
    pub model: Model,
    /// Thumbnail URI that was replaced and whose file can now be removed.
    pub replaced_thumbnail: Option<String>,
}

/// Which records a batch removal targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatFilter {
    All,
    Format(String),
}

impl FormatFilter {
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(StoreError::Invalid("format selector is empty".into()));
        }
        if selector == FORMAT_ALL {
            Ok(Self::All)
        } else {
            Ok(Self::Format(selector.to_string()))
        }
    }

    pub fn matches(&self, model: &Model) -> bool {
        match self {
            Self::All => true,
            Self::Format(format) => model.has_format(format),
        }
    }
}

/// Result of [`ModelCatalog::batch_remove`].
#[derive(Debug, Clone)]
pub struct BatchRemoval {
    pub removed: Vec<Model>,
    pub remaining: usize,
}

pub struct ModelCatalog {
    store: JsonStore<Model>,
}

impl ModelCatalog {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            store: JsonStore::open(path).await?,
        })
    }

    pub async fn list(&self) -> Result<Vec<Model>> {
        self.store.get().await
    }

    pub async fn add(&self, new: NewModel) -> Result<Model> {
        self.store
            .mutate(move |models| {
                let id = next_id(models);
                let order = new
                    .order
                    .filter(|o| *o > 0)
                    .unwrap_or(models.len() as i64 + 1);

                models.push(Model {
                    id,
                    name: new.name,
                    description: new.description,
                    path: new.path,
                    format: new.format,
                    thumbnail: new.thumbnail,
                    order,
                    background_id: new.background_id,
                });
                sort_by_order(models);
                renumber(models);

                let idx = position_of(models, id)?;
                debug!(id, order = models[idx].order, "Model added");
                Ok(models[idx].clone())
            })
            .await
    }

    pub async fn update(&self, id: RecordId, patch: ModelPatch) -> Result<ModelUpdate> {
        self.store
            .mutate(move |models| {
                let idx = position_of(models, id)?;
                let model = &mut models[idx];

                if let Some(name) = non_empty(patch.name) {
                    model.name = name;
                }
                if let Some(description) = non_empty(patch.description) {
                    model.description = Some(description);
                }
                if let Some(background_id) = patch.background_id {
                    model.background_id = background_id;
                }
                let replaced_thumbnail = patch
                    .thumbnail
                    .map(|thumb| std::mem::replace(&mut model.thumbnail, thumb));

                if let Some(order) = patch.order.filter(|o| *o != 0) {
                    model.order = order;
                }
                sort_by_order(models);
                renumber(models);

                let idx = position_of(models, id)?;
                Ok(ModelUpdate {
                    model: models[idx].clone(),
                    replaced_thumbnail,
                })
            })
            .await
    }

    /// Remove one model and return it so the caller can delete its files.
    pub async fn remove(&self, id: RecordId) -> Result<Model> {
        self.store
            .mutate(move |models| {
                let idx = position_of(models, id)?;
                let removed = models.remove(idx);
                renumber(models);
                Ok(removed)
            })
            .await
    }

    /// Move a model to the 0-based `position` and return the whole list.
    pub async fn reorder(&self, id: RecordId, position: i64) -> Result<Vec<Model>> {
        self.store
            .mutate(move |models| {
                move_to(models, id, position)?;
                Ok(models.clone())
            })
            .await
    }

    pub async fn batch_remove(&self, filter: FormatFilter) -> Result<BatchRemoval> {
        self.store
            .mutate(move |models| {
                let (removed, kept): (Vec<Model>, Vec<Model>) =
                    models.drain(..).partition(|m| filter.matches(m));

                if removed.is_empty() {
                    *models = kept;
                    let selector = match filter {
                        FormatFilter::All => FORMAT_ALL.to_string(),
                        FormatFilter::Format(f) => f,
                    };
                    return Err(StoreError::NoMatch(selector));
                }

                *models = kept;
                renumber(models);
                Ok(BatchRemoval {
                    removed,
                    remaining: models.len(),
                })
            })
            .await
    }

    /// Number of models pointing at `background_id`.
    pub async fn count_with_background(&self, background_id: RecordId) -> Result<usize> {
        let models = self.store.get().await?;
        Ok(models
            .iter()
            .filter(|m| m.background_id == Some(background_id))
            .count())
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
