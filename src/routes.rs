use rocket::State;
use rocket::form::Form;
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::{error, info};

use crate::auth::User;
use crate::database::{Direction, Table, get_all};
use crate::db;
use crate::error::AppError;
use crate::models::{DbStudent, Student};

#[get("/")]
pub fn index() -> Template {
    Template::render(
        "index",
        context! {
            title: "Attendance",
            show_login: true,
        },
    )
}

#[derive(Responder)]
pub enum CheckResponse {
    Found(Template),
    #[response(status = 200, content_type = "plain")]
    Missing(&'static str),
}

/// Records attendance and returns the student card fragment shown on the
/// check-in page.
#[get("/check?<idno>")]
pub async fn check_student(
    idno: Option<String>,
    db: &State<Pool<Sqlite>>,
) -> Result<CheckResponse, AppError> {
    let idno = idno.unwrap_or_default();
    let idno = idno.trim();
    info!(%idno, "Checking student");

    match db::check_in(db, idno).await? {
        Some(check_in) => Ok(CheckResponse::Found(Template::render(
            "check_result",
            context! { student: check_in.student, record: check_in.record },
        ))),
        None => Ok(CheckResponse::Missing("STUDENT NOT FOUND")),
    }
}

#[derive(FromForm)]
pub struct AttendanceForm {
    idno: String,
}

#[derive(Responder)]
pub enum AttendanceResponse {
    #[response(status = 200, content_type = "plain")]
    Recorded(&'static str),
    #[response(status = 404, content_type = "plain")]
    Missing(&'static str),
}

#[post("/attendance", data = "<form>")]
pub async fn record_attendance(
    form: Form<AttendanceForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<AttendanceResponse, AppError> {
    match db::check_in(db, form.idno.trim()).await? {
        Some(_) => Ok(AttendanceResponse::Recorded("Attendance recorded successfully!")),
        None => Ok(AttendanceResponse::Missing("Student not found")),
    }
}

#[get("/attend?<date>")]
pub async fn attend(date: Option<String>, db: &State<Pool<Sqlite>>) -> Template {
    let selected_date = date
        .map(|d| d.trim().to_string())
        .filter(|d| db::is_valid_date(d))
        .unwrap_or_else(db::today);

    let records = db::get_attendance_for_date(db, &selected_date)
        .await
        .unwrap_or_else(|err| {
            err.log_and_record("Listing attendance for date");
            Vec::new()
        });

    Template::render(
        "attend",
        context! {
            title: "Attendance",
            records: records,
            selected_date: selected_date,
        },
    )
}

#[get("/clean_duplicates")]
pub async fn clean_duplicates(_user: User, db: &State<Pool<Sqlite>>) -> Result<String, AppError> {
    let deleted = db::clean_duplicate_attendance(db).await?;
    Ok(format!("Cleaned {} duplicate attendance records", deleted))
}

#[get("/view_all_attendance")]
pub async fn view_all_attendance(_user: User, db: &State<Pool<Sqlite>>) -> Template {
    let records = db::get_all_attendance(db).await.unwrap_or_else(|err| {
        error!("Failed to list attendance: {}", err);
        Vec::new()
    });

    let students: Vec<Student> =
        get_all::<DbStudent>(db, Table::Students, &[("lastname", Direction::Asc)])
            .await
            .into_iter()
            .map(Student::from)
            .collect();

    Template::render(
        "view_all_attendance",
        context! {
            title: "Attendance Debug View",
            total_records: records.len(),
            total_students: students.len(),
            records: records,
            students: students,
        },
    )
}
