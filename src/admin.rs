use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::response::Redirect;
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::User;
use crate::avatar::{self, AvatarStore};
use crate::db;
use crate::error::AppError;
use crate::models::{DEFAULT_AVATAR, Student, StudentData};
use crate::validation::ValidateExt;

// ---- users ----

#[get("/admin?<edit_id>")]
pub async fn admin_page(
    edit_id: Option<i64>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Template {
    let users = db::list_users(db).await.unwrap_or_else(|err| {
        err.log_and_record("Listing users");
        Vec::new()
    });

    let edit_user = match edit_id {
        Some(id) => db::get_user(db, id).await.ok(),
        None => None,
    };

    Template::render(
        "admin",
        context! {
            title: "User Management",
            current_user: user,
            users: users,
            edit_user: edit_user,
        },
    )
}

#[derive(FromForm, Validate)]
pub struct UserForm {
    #[validate(email(message = "Please enter a valid email address."))]
    email: String,
    password: String,
    edit_id: Option<i64>,
}

#[post("/admin", data = "<form>")]
pub async fn save_user(
    form: Form<UserForm>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, AppError> {
    let mut form = form.into_inner();
    form.email = form.email.trim().to_string();
    form.password = form.password.trim().to_string();
    let form = form.validate_form()?;

    match form.edit_id {
        Some(id) => db::update_user(db, id, &form.email, &form.password).await?,
        None => {
            if form.password.is_empty() {
                return Err(AppError::Validation(
                    "Password must not be empty.".to_string(),
                ));
            }
            db::create_user(db, &form.email, &form.password).await?;
        }
    }

    Ok(Redirect::to(uri!("/admin")))
}

#[get("/admin/delete/<id>")]
pub async fn delete_user(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, AppError> {
    if user.id == id {
        return Err(AppError::Validation(
            "You cannot delete the account you are signed in with.".to_string(),
        ));
    }

    if !db::delete_user(db, id).await? {
        warn!(id, "Delete requested for unknown user");
    }

    Ok(Redirect::to(uri!("/admin")))
}

// ---- students ----

#[get("/studentmngt?<edit_id>")]
pub async fn student_mngt(
    edit_id: Option<i64>,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Template {
    let students = db::list_students(db).await.unwrap_or_else(|err| {
        err.log_and_record("Listing students");
        Vec::new()
    });

    let edit_student = match edit_id {
        Some(id) => db::get_student(db, id).await.ok(),
        None => None,
    };

    Template::render(
        "studentmngt",
        context! {
            title: "Student Management",
            students: students,
            edit_student: edit_student,
        },
    )
}

#[derive(FromForm)]
pub struct StudentUpload<'r> {
    idno: String,
    lastname: String,
    firstname: String,
    course: String,
    level: String,
    edit_id: Option<i64>,
    profile_picture: Option<TempFile<'r>>,
}

fn student_data(
    idno: &str,
    lastname: &str,
    firstname: &str,
    course: &str,
    level: &str,
) -> StudentData {
    StudentData {
        idno: idno.trim().to_string(),
        lastname: lastname.trim().to_string(),
        firstname: firstname.trim().to_string(),
        course: course.trim().to_string(),
        level: level.trim().to_string(),
        avatar: None,
    }
}

/// Points the student back at `fallback` after their new avatar file could
/// not be written, then hands back the write error.
async fn restore_avatar(
    db: &Pool<Sqlite>,
    idno: &str,
    fallback: &str,
    err: AppError,
) -> AppError {
    if let Err(reset_err) = db::set_student_avatar(db, idno, fallback).await {
        reset_err.log_and_record("Restoring avatar after failed write");
    }
    err
}

/// The browser-supplied name of a non-empty uploaded file.
fn uploaded_name(file: &TempFile<'_>) -> Option<String> {
    if file.len() == 0 {
        return None;
    }

    file.raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .filter(|name| !name.is_empty())
}

/// Add or edit a student from the management page, with an optional file upload.
#[post("/studentmngt", data = "<form>")]
pub async fn save_student_upload(
    form: Form<StudentUpload<'_>>,
    _user: User,
    db: &State<Pool<Sqlite>>,
    avatars: &State<AvatarStore>,
) -> Result<Redirect, AppError> {
    let mut form = form.into_inner();
    let mut data = student_data(
        &form.idno,
        &form.lastname,
        &form.firstname,
        &form.course,
        &form.level,
    )
    .validate_form()?;

    // The extension is checked before anything touches the database or disk.
    let upload = match form.profile_picture.as_mut() {
        Some(file) => match uploaded_name(file) {
            Some(original_name) => {
                let file_name = avatar::upload_file_name(&data.idno, &original_name)?;
                Some((file_name, file))
            }
            None => None,
        },
        None => None,
    };
    data.avatar = upload.as_ref().map(|(file_name, _)| file_name.clone());

    let previous_avatar = match form.edit_id {
        Some(id) => db::update_student(db, id, &data).await?.avatar,
        None => {
            db::create_student(db, &data).await?;
            DEFAULT_AVATAR.to_string()
        }
    };

    if let Some((file_name, file)) = upload {
        if let Err(err) = avatars.save_upload(&file_name, file).await {
            return Err(restore_avatar(db, &data.idno, &previous_avatar, err).await);
        }
    }

    Ok(Redirect::to(uri!("/studentmngt")))
}

#[get("/student/add")]
pub fn add_student_page(_user: User) -> Template {
    Template::render(
        "student",
        context! {
            title: "Add Student",
            student: Option::<Student>::None,
        },
    )
}

#[derive(FromForm)]
pub struct StudentCaptureForm {
    idno: String,
    lastname: String,
    firstname: String,
    course: String,
    level: String,
    avatar: Option<String>,
}

/// Decodes a captured avatar, logging and discarding anything malformed.
fn captured_avatar(idno: &str, data_url: Option<&str>) -> Option<(String, Vec<u8>)> {
    let data_url = data_url.filter(|d| d.starts_with("data:image/"))?;

    let decoded = avatar::decode_data_url(data_url)
        .and_then(|bytes| avatar::captured_file_name(idno).map(|name| (name, bytes)));

    match decoded {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            err.log_and_record("Decoding captured avatar");
            None
        }
    }
}

#[post("/student/add", data = "<form>")]
pub async fn add_student(
    form: Form<StudentCaptureForm>,
    _user: User,
    db: &State<Pool<Sqlite>>,
    avatars: &State<AvatarStore>,
) -> Result<Redirect, AppError> {
    let mut data = student_data(
        &form.idno,
        &form.lastname,
        &form.firstname,
        &form.course,
        &form.level,
    )
    .validate_form()?;

    let captured = captured_avatar(&data.idno, form.avatar.as_deref());
    data.avatar = captured.as_ref().map(|(file_name, _)| file_name.clone());

    db::create_student(db, &data).await?;

    if let Some((_, bytes)) = captured {
        if let Err(err) = avatars.save_captured(&data.idno, &bytes).await {
            return Err(restore_avatar(db, &data.idno, DEFAULT_AVATAR, err).await);
        }
    }

    info!(idno = %data.idno, "Added student");
    Ok(Redirect::to(uri!("/studentmngt")))
}

#[get("/student/edit/<id>")]
pub async fn edit_student_page(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Template, AppError> {
    let student = db::get_student(db, id).await?;

    Ok(Template::render(
        "student",
        context! {
            title: "Edit Student",
            student: Some(student),
        },
    ))
}

#[post("/student/edit/<id>", data = "<form>")]
pub async fn edit_student(
    id: i64,
    form: Form<StudentCaptureForm>,
    _user: User,
    db: &State<Pool<Sqlite>>,
    avatars: &State<AvatarStore>,
) -> Result<Redirect, AppError> {
    let mut data = student_data(
        &form.idno,
        &form.lastname,
        &form.firstname,
        &form.course,
        &form.level,
    )
    .validate_form()?;

    // No capture keeps whatever avatar the student already has.
    let captured = captured_avatar(&data.idno, form.avatar.as_deref());
    data.avatar = captured.as_ref().map(|(file_name, _)| file_name.clone());

    let old = db::update_student(db, id, &data).await?;

    if let Some((_, bytes)) = captured {
        if let Err(err) = avatars.save_captured(&data.idno, &bytes).await {
            return Err(restore_avatar(db, &data.idno, &old.avatar, err).await);
        }
    }

    Ok(Redirect::to(uri!("/studentmngt")))
}

#[get("/student/delete/<id>")]
pub async fn delete_student(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, AppError> {
    match db::delete_student(db, id).await? {
        Some(student) => info!(idno = %student.idno, "Deleted student"),
        None => warn!(id, "Delete requested for unknown student"),
    }

    Ok(Redirect::to(uri!("/studentmngt")))
}
