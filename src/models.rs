use serde::Serialize;
use validator::Validate;

pub const DEFAULT_AVATAR: &str = "default_avatar.png";

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: i64,
    pub idno: String,
    pub lastname: String,
    pub firstname: String,
    pub course: String,
    pub level: String,
    pub avatar: String,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbStudent {
    pub id: Option<i64>,
    pub idno: Option<String>,
    pub lastname: Option<String>,
    pub firstname: Option<String>,
    pub course: Option<String>,
    pub level: Option<String>,
    pub avatar: Option<String>,
}

impl From<DbStudent> for Student {
    fn from(student: DbStudent) -> Self {
        Self {
            id: student.id.unwrap_or_default(),
            idno: student.idno.unwrap_or_default(),
            lastname: student.lastname.unwrap_or_default(),
            firstname: student.firstname.unwrap_or_default(),
            course: student.course.unwrap_or_default(),
            level: student.level.unwrap_or_default(),
            avatar: student
                .avatar
                .filter(|avatar| !avatar.is_empty())
                .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
        }
    }
}

impl Student {
    /// Name as snapshotted into attendance rows.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    pub fn course_level(&self) -> String {
        format!("{} {}", self.course, self.level)
    }
}

/// The editable fields of a student, as submitted by the admin forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct StudentData {
    #[validate(length(min = 1, message = "Student ID is required."))]
    pub idno: String,
    #[validate(length(min = 1, message = "Last name is required."))]
    pub lastname: String,
    #[validate(length(min = 1, message = "First name is required."))]
    pub firstname: String,
    pub course: String,
    pub level: String,
    pub avatar: Option<String>,
}

impl StudentData {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    pub fn course_level(&self) -> String {
        format!("{} {}", self.course, self.level)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub id: i64,
    pub idno: String,
    pub name: String, // Denormalized snapshot of the student's name
    pub course_level: String,
    pub time_in: String,
    pub date: String,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbAttendanceRecord {
    pub id: Option<i64>,
    pub idno: Option<String>,
    pub name: Option<String>,
    pub course_level: Option<String>,
    pub time_in: Option<String>,
    pub date: Option<String>,
}

impl From<DbAttendanceRecord> for AttendanceRecord {
    fn from(record: DbAttendanceRecord) -> Self {
        Self {
            id: record.id.unwrap_or_default(),
            idno: record.idno.unwrap_or_default(),
            name: record.name.unwrap_or_default(),
            course_level: record.course_level.unwrap_or_default(),
            time_in: record.time_in.unwrap_or_default(),
            date: record.date.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct CheckIn {
    pub student: Student,
    pub record: AttendanceRecord,
    /// `false` when an existing row for the day was refreshed.
    pub created: bool,
}
