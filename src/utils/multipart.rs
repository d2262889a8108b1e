use actix_multipart::Multipart;
use futures::TryStreamExt;
use std::collections::HashMap;

use crate::utils::error::AppError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// A fully buffered `multipart/form-data` body: text parts by name plus the first file
/// uploaded under each file field.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub async fn collect(mut payload: Multipart, max_bytes: usize) -> Result<Self, AppError> {
        let mut form = FormData::default();
        let mut total = 0usize;

        while let Some(mut field) = payload.try_next().await? {
            let name = match field.name() {
                Some(name) => name.to_string(),
                None => continue,
            };
            let file_name = field
                .content_disposition()
                .and_then(|cd| cd.get_filename())
                .map(|f| f.to_string());
            let content_type = field.content_type().map(|m| m.to_string());

            let mut bytes = Vec::new();
            while let Some(chunk) = field.try_next().await? {
                total += chunk.len();
                if total > max_bytes {
                    return Err(AppError::BadRequest(format!(
                        "Upload exceeds the {} byte limit",
                        max_bytes
                    )));
                }
                bytes.extend_from_slice(&chunk);
            }

            match file_name {
                // Browsers send an empty part when no file was picked
                Some(file_name) if file_name.is_empty() && bytes.is_empty() => {}
                Some(file_name) => {
                    form.files.entry(name).or_insert(UploadedFile {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                None => {
                    let text = String::from_utf8(bytes).map_err(|_| {
                        AppError::BadRequest(format!("Field '{}' is not valid UTF-8", name))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed text value; blank values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Untrimmed value for secrets such as passwords; blank values count as absent.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

#[cfg(test)]
pub mod test_support {
    use super::{FormData, UploadedFile};

    pub const BOUNDARY: &str = "----portal-test-boundary";

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    /// Encodes text fields and `(field, file_name, bytes)` files as a multipart body.
    pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        for (name, file_name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    /// Builds an already collected form without going through the multipart parser.
    pub fn form(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> FormData {
        let mut form = FormData::default();
        for (name, value) in fields {
            form.fields.insert(name.to_string(), value.to_string());
        }
        for (name, file_name, bytes) in files {
            form.files.insert(
                name.to_string(),
                UploadedFile {
                    file_name: file_name.to_string(),
                    content_type: None,
                    bytes: bytes.to_vec(),
                },
            );
        }
        form
    }
}
