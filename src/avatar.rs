use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::fs::TempFile;
use tracing::{info, instrument};

use crate::error::AppError;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

static DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:image/[\w.+-]+(?:;[^,]*)?,(?P<payload>.*)$")
        .expect("data URL pattern is valid")
});

/// Writes student avatars into one directory, named after the student's idno.
#[derive(Debug, Clone)]
pub struct AvatarStore {
    dir: PathBuf,
}

impl AvatarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Copies an uploaded file under `file_name`, as produced by
    /// [`upload_file_name`].
    #[instrument(skip(self, file))]
    pub async fn save_upload(
        &self,
        file_name: &str,
        file: &mut TempFile<'_>,
    ) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        file.copy_to(self.path_for(file_name)).await?;

        info!(%file_name, "Saved uploaded avatar");
        Ok(())
    }

    /// Writes decoded camera-capture bytes to `<idno>.png`.
    #[instrument(skip(self, bytes))]
    pub async fn save_captured(&self, idno: &str, bytes: &[u8]) -> Result<String, AppError> {
        let file_name = captured_file_name(idno)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(&file_name), bytes).await?;

        info!(%file_name, "Saved captured avatar");
        Ok(file_name)
    }
}

pub fn allowed_extensions_message() -> String {
    let listed: Vec<String> = ALLOWED_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect();
    format!("Invalid file type. Allowed: {}", listed.join(", "))
}

fn check_idno(idno: &str) -> Result<(), AppError> {
    let usable = !idno.is_empty()
        && idno
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if usable {
        Ok(())
    } else {
        Err(AppError::Upload(format!(
            "Student ID '{}' cannot be used as an avatar file name",
            idno
        )))
    }
}

/// `<idno><ext>` with the extension lower-cased, or an error naming the
/// allowed extensions.
pub fn upload_file_name(idno: &str, original_name: &str) -> Result<String, AppError> {
    check_idno(idno)?;

    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => {
            Ok(format!("{}.{}", idno, ext))
        }
        _ => Err(AppError::Upload(allowed_extensions_message())),
    }
}

pub fn captured_file_name(idno: &str) -> Result<String, AppError> {
    check_idno(idno)?;
    Ok(format!("{}.png", idno))
}

pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, AppError> {
    let captures = DATA_URL
        .captures(data_url)
        .ok_or_else(|| AppError::Upload("Avatar is not an image data URL".to_string()))?;

    let payload: String = captures["payload"]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| AppError::Upload(format!("Avatar data is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(AppError::Upload("Avatar data is empty".to_string()));
    }

    Ok(bytes)
}
