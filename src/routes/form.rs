//! Buffers a multipart body into text fields and file parts.

use std::collections::HashMap;

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::error::{AppError, AppResult};
use crate::uploads::Upload;

/// An oversized body is its own error; anything else is a malformed form.
fn rejected(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::validation("body", e.body_text())
    }
}

#[derive(Debug, Default)]
pub struct MultipartForm {
    texts: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(rejected)?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(rejected)?;
                    // Browsers send an empty part when no file was picked
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(name, Upload { file_name, bytes });
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(rejected)?;
                    form.texts.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// The value as sent, blank or not.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.texts.get(name).map(String::as_str)
    }

    /// Trimmed text value, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.texts
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn required(&self, name: &'static str) -> AppResult<String> {
        self.text(name)
            .ok_or_else(|| AppError::validation(name, "is required"))
    }

    pub fn take_file(&mut self, name: &str) -> Option<Upload> {
        self.files.remove(name)
    }
}
