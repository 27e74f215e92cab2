//! Buffering of multipart form submissions.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;

use vitrine_shared::RecordId;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// A fully read multipart form: text fields and file fields by name.
#[derive(Debug, Default)]
pub struct UploadForm {
    text: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name.is_empty() {
                continue;
            }

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let data = field.bytes().await.map_err(|e| {
                        ServerError::BadRequest(format!("Failed to read field: {}", e))
                    })?;
                    // Browsers send an empty part for an untouched file input.
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.insert(name, UploadedFile { file_name, data });
                }
                None => {
                    let value = field.text().await.map_err(|e| {
                        ServerError::BadRequest(format!("Failed to read field: {}", e))
                    })?;
                    form.text.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.text.get(name).cloned()
    }

    /// Text field that must be present and non-empty. Whitespace counts as
    /// a value.
    pub fn required_text(&self, name: &str) -> Option<String> {
        self.text(name).filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    /// `order` as an integer; absent or unparsable values yield `None`.
    pub fn order(&self) -> Option<i64> {
        self.text("order").and_then(|v| v.trim().parse().ok())
    }

    /// `backgroundId`: absent keeps, empty or `null` clears, a number sets.
    pub fn background_id(&self) -> Result<Option<Option<RecordId>>, ServerError> {
        let Some(raw) = self.text("backgroundId") else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() || raw == "null" {
            return Ok(Some(None));
        }
        raw.parse::<RecordId>()
            .map(|id| Some(Some(id)))
            .map_err(|_| ServerError::BadRequest(format!("Invalid backgroundId: {raw}")))
    }

    #[cfg(test)]
    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.text.insert(name.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_parsing() {
        assert_eq!(UploadForm::default().order(), None);
        assert_eq!(UploadForm::default().with_text("order", " 3 ").order(), Some(3));
        assert_eq!(UploadForm::default().with_text("order", "x").order(), None);
    }

    #[test]
    fn test_background_id_parsing() {
        assert_eq!(UploadForm::default().background_id().unwrap(), None);
        assert_eq!(
            UploadForm::default()
                .with_text("backgroundId", "")
                .background_id()
                .unwrap(),
            Some(None)
        );
        assert_eq!(
            UploadForm::default()
                .with_text("backgroundId", "7")
                .background_id()
                .unwrap(),
            Some(Some(7))
        );
        assert!(UploadForm::default()
            .with_text("backgroundId", "seven")
            .background_id()
            .is_err());
    }

    #[test]
    fn test_required_text_rejects_only_empty() {
        let form = UploadForm::default().with_text("name", "").with_text("label", "  ");
        assert!(form.required_text("name").is_none());
        assert!(form.text("name").is_some());
        assert_eq!(form.required_text("label").as_deref(), Some("  "));
        assert!(form.required_text("missing").is_none());
    }
}
