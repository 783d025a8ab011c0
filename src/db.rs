use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{Executor, Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::{DbUser, LoginOutcome, User, hash_password};
use crate::database::{
    Direction, Table, Value, try_delete, try_fetch_all, try_fetch_where, try_insert, try_update,
};
use crate::error::AppError;
use crate::models::{
    AttendanceRecord, CheckIn, DEFAULT_AVATAR, DbAttendanceRecord, DbStudent, Student,
    StudentData,
};

pub const TIME_IN_FORMAT: &str = "%I:%M %p";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---- students ----

#[instrument(skip(pool))]
pub async fn get_student(pool: &Pool<Sqlite>, id: i64) -> Result<Student, AppError> {
    let rows: Vec<DbStudent> =
        try_fetch_where(pool, Table::Students, &[("id", Value::from(id))]).await?;

    match rows.into_iter().next() {
        Some(student) => Ok(Student::from(student)),
        None => Err(AppError::NotFound(format!(
            "Student with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_student_by_idno(
    pool: &Pool<Sqlite>,
    idno: &str,
) -> Result<Option<Student>, AppError> {
    let rows: Vec<DbStudent> =
        try_fetch_where(pool, Table::Students, &[("idno", Value::from(idno))]).await?;

    Ok(rows.into_iter().next().map(Student::from))
}

#[instrument(skip(pool))]
pub async fn list_students(pool: &Pool<Sqlite>) -> Result<Vec<Student>, AppError> {
    let rows: Vec<DbStudent> = try_fetch_all(
        pool,
        Table::Students,
        &[("lastname", Direction::Asc), ("firstname", Direction::Asc)],
    )
    .await?;

    Ok(rows.into_iter().map(Student::from).collect())
}

#[instrument(skip(pool))]
pub async fn create_student(pool: &Pool<Sqlite>, data: &StudentData) -> Result<i64, AppError> {
    info!("Creating student");

    if find_student_by_idno(pool, &data.idno).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Student ID {} already exists",
            data.idno
        )));
    }

    let avatar = data
        .avatar
        .clone()
        .unwrap_or_else(|| DEFAULT_AVATAR.to_string());

    try_insert(
        pool,
        Table::Students,
        &[
            ("idno", Value::from(data.idno.as_str())),
            ("lastname", Value::from(data.lastname.as_str())),
            ("firstname", Value::from(data.firstname.as_str())),
            ("course", Value::from(data.course.as_str())),
            ("level", Value::from(data.level.as_str())),
            ("avatar", Value::from(avatar)),
        ],
    )
    .await
}

/// Updates a student and refreshes the snapshot fields of their attendance
/// rows in one transaction. Returns the student as it was before the edit.
#[instrument(skip(pool))]
pub async fn update_student(
    pool: &Pool<Sqlite>,
    id: i64,
    data: &StudentData,
) -> Result<Student, AppError> {
    info!("Updating student");
    let old = get_student(pool, id).await?;

    if data.idno != old.idno && find_student_by_idno(pool, &data.idno).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Student ID {} already exists",
            data.idno
        )));
    }

    let mut values = vec![
        ("idno", Value::from(data.idno.as_str())),
        ("lastname", Value::from(data.lastname.as_str())),
        ("firstname", Value::from(data.firstname.as_str())),
        ("course", Value::from(data.course.as_str())),
        ("level", Value::from(data.level.as_str())),
    ];
    if let Some(avatar) = &data.avatar {
        values.push(("avatar", Value::from(avatar)));
    }

    let mut tx = pool.begin().await?;

    try_update(&mut *tx, Table::Students, &values, &[("id", Value::from(id))]).await?;
    sync_attendance(&mut *tx, &old, data).await?;

    tx.commit().await?;

    Ok(old)
}

/// Points the student with `idno` at a different avatar file.
#[instrument(skip(pool))]
pub async fn set_student_avatar(
    pool: &Pool<Sqlite>,
    idno: &str,
    avatar: &str,
) -> Result<u64, AppError> {
    try_update(
        pool,
        Table::Students,
        &[("avatar", Value::from(avatar))],
        &[("idno", Value::from(idno))],
    )
    .await
}

/// Rewrites the denormalized fields of `old`'s attendance rows when the idno,
/// name or course/level changed. Returns the number of rows rewritten.
#[instrument(skip(executor, old, new), fields(old_idno = %old.idno, new_idno = %new.idno))]
pub async fn sync_attendance<'c, E>(
    executor: E,
    old: &Student,
    new: &StudentData,
) -> Result<u64, AppError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let new_name = new.full_name();
    let new_course_level = new.course_level();

    let unchanged = new.idno == old.idno
        && new_name == old.full_name()
        && new_course_level == old.course_level();
    if unchanged {
        return Ok(0);
    }

    let rewritten = try_update(
        executor,
        Table::Attendance,
        &[
            ("idno", Value::from(new.idno.as_str())),
            ("name", Value::from(new_name)),
            ("course_level", Value::from(new_course_level)),
        ],
        &[("idno", Value::from(old.idno.as_str()))],
    )
    .await?;

    info!(rows = rewritten, "Synced attendance snapshots");
    Ok(rewritten)
}

/// Deletes a student and every attendance row for their idno in one
/// transaction. Returns the removed student, or `None` when the id did not
/// exist.
#[instrument(skip(pool))]
pub async fn delete_student(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Student>, AppError> {
    let student = match get_student(pool, id).await {
        Ok(student) => student,
        Err(AppError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut tx = pool.begin().await?;

    let removed = try_delete(
        &mut *tx,
        Table::Attendance,
        &[("idno", Value::from(student.idno.as_str()))],
    )
    .await?;
    try_delete(&mut *tx, Table::Students, &[("id", Value::from(id))]).await?;

    tx.commit().await?;
    info!(idno = %student.idno, rows = removed, "Deleted student and attendance records");

    Ok(Some(student))
}

// ---- attendance ----

/// Records a check-in for `idno` at the current local time.
pub async fn check_in(pool: &Pool<Sqlite>, idno: &str) -> Result<Option<CheckIn>, AppError> {
    check_in_at(pool, idno, Local::now().naive_local()).await
}

/// Inserts or refreshes the `(idno, date)` attendance row. Returns `None` and
/// writes nothing when no student has this idno.
#[instrument(skip(pool))]
pub async fn check_in_at(
    pool: &Pool<Sqlite>,
    idno: &str,
    now: NaiveDateTime,
) -> Result<Option<CheckIn>, AppError> {
    let student = match find_student_by_idno(pool, idno).await? {
        Some(student) => student,
        None => {
            warn!("Check-in for unknown student");
            return Ok(None);
        }
    };

    let name = student.full_name();
    let course_level = student.course_level();
    let time_in = now.format(TIME_IN_FORMAT).to_string();
    let date = now.format(DATE_FORMAT).to_string();

    let mut tx = pool.begin().await?;

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM attendance WHERE idno = ? AND date = ?")
            .bind(&student.idno)
            .bind(&date)
            .fetch_optional(&mut *tx)
            .await?;

    let row: DbAttendanceRecord = sqlx::query_as(
        "INSERT INTO attendance (idno, name, course_level, time_in, date)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT (idno, date) DO UPDATE
         SET time_in = excluded.time_in,
             name = excluded.name,
             course_level = excluded.course_level
         RETURNING *",
    )
    .bind(&student.idno)
    .bind(&name)
    .bind(&course_level)
    .bind(&time_in)
    .bind(&date)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let created = existing.is_none();
    info!(%name, %date, %time_in, created, "Attendance recorded");

    Ok(Some(CheckIn {
        student,
        record: AttendanceRecord::from(row),
        created,
    }))
}

fn parse_time_in(time_in: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(time_in, TIME_IN_FORMAT).ok()
}

/// Today's date in the format stored in `attendance.date`.
pub fn today() -> String {
    Local::now().date_naive().format(DATE_FORMAT).to_string()
}

pub fn is_valid_date(date: &str) -> bool {
    NaiveDate::parse_from_str(date, DATE_FORMAT).is_ok()
}

/// Attendance for one day, earliest check-in first.
#[instrument(skip(pool))]
pub async fn get_attendance_for_date(
    pool: &Pool<Sqlite>,
    date: &str,
) -> Result<Vec<AttendanceRecord>, AppError> {
    let rows: Vec<DbAttendanceRecord> =
        try_fetch_where(pool, Table::Attendance, &[("date", Value::from(date))]).await?;

    let mut records: Vec<AttendanceRecord> =
        rows.into_iter().map(AttendanceRecord::from).collect();
    // time_in is 12-hour text, so sort on the parsed value.
    records.sort_by_key(|r| (parse_time_in(&r.time_in), r.id));

    info!(count = records.len(), "Fetched attendance for date");
    Ok(records)
}

/// Every attendance row, newest date and latest check-in first.
#[instrument(skip(pool))]
pub async fn get_all_attendance(pool: &Pool<Sqlite>) -> Result<Vec<AttendanceRecord>, AppError> {
    let rows: Vec<DbAttendanceRecord> =
        try_fetch_all(pool, Table::Attendance, &[("date", Direction::Desc)]).await?;

    let mut records: Vec<AttendanceRecord> =
        rows.into_iter().map(AttendanceRecord::from).collect();
    records.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| parse_time_in(&b.time_in).cmp(&parse_time_in(&a.time_in)))
    });

    Ok(records)
}

/// Keeps only the highest-id row per `(idno, date)`.
#[instrument(skip(pool))]
pub async fn clean_duplicate_attendance(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    let res = sqlx::query(
        "DELETE FROM attendance
         WHERE id NOT IN (
             SELECT MAX(id)
             FROM attendance
             GROUP BY idno, date
         )",
    )
    .execute(pool)
    .await?;

    info!(rows = res.rows_affected(), "Cleaned duplicate attendance records");
    Ok(res.rows_affected())
}

// ---- users ----

async fn find_db_user_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<DbUser>, AppError> {
    let rows: Vec<DbUser> =
        try_fetch_where(pool, Table::User, &[("email", Value::from(email))]).await?;
    Ok(rows.into_iter().next())
}

#[instrument(skip(pool))]
pub async fn find_user_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<User>, AppError> {
    Ok(find_db_user_by_email(pool, email).await?.map(User::from))
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    let rows: Vec<DbUser> =
        try_fetch_where(pool, Table::User, &[("id", Value::from(id))]).await?;

    match rows.into_iter().next() {
        Some(user) => Ok(User::from(user)),
        None => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn list_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    let rows: Vec<DbUser> = try_fetch_all(pool, Table::User, &[("email", Direction::Asc)]).await?;
    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument(skip(pool, password))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_db_user_by_email(pool, email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered.".to_string()));
    }

    let hashed_password = hash_password(password)?;

    try_insert(
        pool,
        Table::User,
        &[("email", Value::from(email)), ("password", Value::from(hashed_password))],
    )
    .await
}

/// An empty `password` keeps the stored hash.
#[instrument(skip(pool, password))]
pub async fn update_user(
    pool: &Pool<Sqlite>,
    id: i64,
    email: &str,
    password: &str,
) -> Result<(), AppError> {
    info!("Updating user");

    if let Some(existing) = find_db_user_by_email(pool, email).await? {
        if existing.id != Some(id) {
            return Err(AppError::Conflict("Email already registered.".to_string()));
        }
    }

    let mut values = vec![("email", Value::from(email))];
    if !password.is_empty() {
        values.push(("password", Value::from(hash_password(password)?)));
    }

    let updated = try_update(pool, Table::User, &values, &[("id", Value::from(id))]).await?;
    if updated == 0 {
        return Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        )));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_user(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
    let removed = try_delete(pool, Table::User, &[("id", Value::from(id))]).await?;
    Ok(removed > 0)
}

#[instrument(skip(pool, password))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, AppError> {
    info!("Authenticating user");

    match find_db_user_by_email(pool, email).await? {
        Some(user) if user.verify_password(password) => Ok(LoginOutcome::Success(User::from(user))),
        Some(_) => Ok(LoginOutcome::WrongPassword),
        None => Ok(LoginOutcome::UnknownEmail),
    }
}
