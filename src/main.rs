#[macro_use]
extern crate rocket;

mod admin;
mod auth;
mod avatar;
mod config;
mod database;
mod db;
mod env;
mod error;
mod models;
mod routes;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::sync::Mutex;

use admin::{
    add_student, add_student_page, admin_page, delete_student, delete_user, edit_student,
    edit_student_page, save_student_upload, save_user, student_mngt,
};
use auth::{login, logout, process_login, process_register, register, unauthorized};
use avatar::AvatarStore;
use config::AppConfig;
use error::AppError;
use once_cell::sync::Lazy;
use rocket::data::{Limits, ToByteUnit};
use rocket::fs::{FileServer, Options};
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use routes::{
    attend, check_student, clean_duplicates, index, record_attendance, view_all_attendance,
};
use sqlx::SqlitePool;
use telemetry::{OtelGuard, TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::{error, info};

/// Largest accepted avatar upload.
pub const MAX_AVATAR_BYTES: u64 = 2 * 1024 * 1024;

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let env_files = env::load_environment()?;

    let guard = init_tracing();
    if let Ok(mut slot) = TELEMETRY_GUARD.lock() {
        *slot = Some(guard);
    }
    env::log_env_files(&env_files);

    let config = AppConfig::from_env();
    info!(database_url = %config.database_url, "Starting student attendance");

    let result = match database::connect(&config.database_url).await {
        Ok(pool) => init_rocket(pool, config)
            .launch()
            .await
            .map(|_| ())
            .map_err(Error::from),
        Err(err) => {
            error!("Failed to open database: {}", err);
            Err(err.into())
        }
    };

    shutdown_telemetry();
    result
}

fn shutdown_telemetry() {
    let guard = TELEMETRY_GUARD.lock().ok().and_then(|mut slot| slot.take());
    drop(guard);
}

pub fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    let limits = Limits::default()
        .limit("file", MAX_AVATAR_BYTES.bytes())
        .limit("data-form", (MAX_AVATAR_BYTES + 1024 * 1024).bytes())
        .limit("form", 4.mebibytes());

    let figment = rocket::Config::figment().merge(("limits", limits));

    rocket::custom(figment)
        .manage(pool)
        .manage(AvatarStore::new(config.avatar_dir.clone()))
        .mount(
            "/",
            routes![
                index,
                check_student,
                record_attendance,
                attend,
                clean_duplicates,
                view_all_attendance,
                login,
                process_login,
                register,
                process_register,
                logout,
                admin_page,
                save_user,
                delete_user,
                student_mngt,
                save_student_upload,
                add_student_page,
                add_student,
                edit_student_page,
                edit_student,
                delete_student,
            ],
        )
        .mount(
            "/static/images",
            FileServer::new(config.avatar_dir, Options::Missing).rank(9),
        )
        .mount(
            "/static",
            FileServer::new(config.static_dir, Options::Index | Options::Missing),
        )
        .register("/", catchers![unauthorized])
        .attach(Template::fairing())
        .attach(TelemetryFairing)
}
