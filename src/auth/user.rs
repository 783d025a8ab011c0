use serde::Serialize;

use crate::error::AppError;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
// Full-cost hashing makes the test suite crawl.
#[cfg(test)]
const HASH_COST: u32 = 4;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbUser {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
        }
    }
}

impl DbUser {
    pub fn verify_password(&self, password: &str) -> bool {
        match &self.password {
            Some(hash) => verify_password(password, hash),
            None => false,
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, HASH_COST)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[derive(Debug)]
pub enum LoginOutcome {
    Success(User),
    WrongPassword,
    UnknownEmail,
}
