use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{ApiError, ApiResult};

/// File part of a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Buffered multipart form.
///
/// Repeated keys are kept in order and `name[]` is treated as `name`.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<UploadedFile>>,
}

fn field_key(raw: &str) -> String {
    raw.trim().trim_end_matches("[]").to_string()
}

/// Split one list value: JSON arrays and comma separated strings are both accepted
pub fn split_list(value: &str) -> Vec<String> {
    let value = value.trim();

    if value.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(value) {
            return items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl MultipartForm {
    pub async fn from_multipart(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await? {
            let key = field_key(field.name().unwrap_or_default());

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;

                    // Browsers send an empty part for untouched file inputs
                    if bytes.is_empty() {
                        continue;
                    }

                    form.insert_file(UploadedFile {
                        field: key,
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                None => {
                    let value = field.text().await?;
                    form.insert_text(&key, value);
                }
            }
        }

        Ok(form)
    }

    pub fn insert_text(&mut self, key: &str, value: impl Into<String>) {
        self.fields.entry(field_key(key)).or_default().push(value.into());
    }

    pub fn insert_file(&mut self, file: UploadedFile) {
        self.files.entry(field_key(&file.field)).or_default().push(file);
    }

    /// First value of a text field
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value, trimmed, `None` when blank
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.text(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// All values of a list field, flattened
    pub fn list(&self, key: &str) -> Vec<String> {
        self.fields
            .get(key)
            .map(|values| values.iter().flat_map(|v| split_list(v)).collect())
            .unwrap_or_default()
    }

    /// Values of a list field that parse as UUIDs; anything else is dropped
    pub fn uuid_list(&self, key: &str) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for id in self.list(key).iter().filter_map(|v| Uuid::parse_str(v).ok()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn files(&self, key: &str) -> &[UploadedFile] {
        self.files.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// At most one file under `key`
    pub fn single_file(&self, key: &str) -> ApiResult<Option<&UploadedFile>> {
        match self.files(key) {
            [] => Ok(None),
            [file] => Ok(Some(file)),
            _ => Err(ApiError::bad_request(format!("Only one {} file is allowed", key))),
        }
    }

    /// Files under `key`, rejecting more than `max`
    pub fn files_at_most(&self, key: &str, max: usize) -> ApiResult<&[UploadedFile]> {
        let files = self.files(key);
        if files.len() > max {
            return Err(ApiError::bad_request(format!(
                "At most {} {} files are allowed",
                max, key
            )));
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::FromRequest, http::Request};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c"), vec!["a", "b", "c"]);
        assert_eq!(split_list(r#"["x", " y "]"#), vec!["x", "y"]);
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_uuid_list_filters_and_dedups() {
        let id = Uuid::new_v4();
        let mut form = MultipartForm::default();
        form.insert_text("categoryIds[]", id.to_string());
        form.insert_text("categoryIds", format!("not-a-uuid,{}", id));

        assert_eq!(form.uuid_list("categoryIds"), vec![id]);
    }

    #[test]
    fn test_file_limits() {
        let mut form = MultipartForm::default();
        for i in 0..3 {
            form.insert_file(UploadedFile {
                field: "images".into(),
                file_name: format!("{}.jpg", i),
                content_type: Some("image/jpeg".into()),
                bytes: Bytes::from_static(b"x"),
            });
        }

        assert!(form.files_at_most("images", 3).is_ok());
        assert!(form.files_at_most("images", 2).is_err());
        assert!(form.single_file("images").is_err());
        assert!(form.single_file("image").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_from_multipart_collects_fields_and_files() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nBall Valve\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"v.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\nJPEGDATA\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\r\n\
             --{b}--\r\n",
            b = boundary
        );

        let request = Request::builder()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let multipart = Multipart::from_request(request, &()).await.unwrap();
        let form = MultipartForm::from_multipart(multipart).await.unwrap();

        assert_eq!(form.text("title"), Some("Ball Valve"));
        let image = form.single_file("image").unwrap().unwrap();
        assert_eq!(image.file_name, "v.jpg");
        assert_eq!(image.bytes.as_ref(), b"JPEGDATA");
        assert!(form.files("images").is_empty());
    }
}
