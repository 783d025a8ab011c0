use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://attendance.db";
pub const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub static_dir: PathBuf,
    /// Uploaded avatars live here and are served under `/static/images`.
    pub avatar_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url =
            dotenvy::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let static_dir = dotenvy::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATIC_DIR));

        let avatar_dir = dotenvy::var("AVATAR_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| static_dir.join("images"));

        Self {
            database_url,
            static_dir,
            avatar_dir,
        }
    }
}
