use crate::config::get_config;
use crate::error::{Error, Result};
use crate::utils::codes::generate_file_stem;
use std::path::PathBuf;

/// A file already written to disk but not yet referenced by any row.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    /// Public path under which the file is served.
    pub file_path: String,
    pub disk_path: PathBuf,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

pub struct UploadService;

impl UploadService {
    pub async fn store(
        file_name: &str,
        content_type: Option<String>,
        bytes: &[u8],
    ) -> Result<StoredFile> {
        let config = get_config();
        if bytes.len() > config.max_upload_bytes {
            return Err(Error::BadRequest(format!(
                "File exceeds upload limit of {} bytes",
                config.max_upload_bytes
            )));
        }

        let sanitized = sanitize_file_name(file_name);
        let stored_name = format!("{}_{}", generate_file_stem(12), sanitized);
        let disk_path = PathBuf::from(&config.uploads_dir).join(&stored_name);

        tokio::fs::create_dir_all(&config.uploads_dir).await?;
        tokio::fs::write(&disk_path, bytes).await?;

        Ok(StoredFile {
            file_name: sanitized,
            file_path: format!("/uploads/{}", stored_name),
            disk_path,
            content_type,
            size_bytes: bytes.len() as i64,
        })
    }

    /// Unlinks files whose database rows never materialized. Removal failures
    /// are logged, not propagated; the caller is already on an error path.
    pub async fn discard(files: &[StoredFile]) {
        for file in files {
            if let Err(e) = tokio::fs::remove_file(&file.disk_path).await {
                tracing::warn!(path = %file.disk_path.display(), error = %e, "failed to remove orphaned upload");
            }
        }
    }

    pub async fn remove_by_public_path(public_path: &str) {
        let config = get_config();
        let Some(stored_name) = public_path.strip_prefix("/uploads/") else {
            return;
        };
        let disk_path = PathBuf::from(&config.uploads_dir).join(stored_name);
        if let Err(e) = tokio::fs::remove_file(&disk_path).await {
            tracing::warn!(path = %disk_path.display(), error = %e, "failed to remove attachment file");
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("report final.pdf"), "report_final.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name(""), "file");
    }
}
