use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use rocket::{Request, State};
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::{Instrument, info, warn};
use validator::Validate;

use crate::db;
use crate::error::AppError;
use crate::validation::ValidateExt;

use super::{LoginOutcome, User};

pub const SESSION_COOKIE: &str = "user";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        session_user(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

async fn session_user(request: &Request<'_>) -> Outcome<User, ()> {
    let email = request
        .cookies()
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string());

    let Some(email) = email else {
        return Outcome::Error((Status::Unauthorized, ()));
    };

    let pool = match request.rocket().state::<SqlitePool>() {
        Some(pool) => pool,
        None => {
            tracing::error!("Database pool not found in managed state");
            return Outcome::Error((Status::InternalServerError, ()));
        }
    };

    match db::find_user_by_email(pool, &email).await {
        Ok(Some(user)) => Outcome::Success(user),
        Ok(None) => {
            tracing::warn!(%email, "Session refers to a user that no longer exists");
            request.cookies().remove_private(Cookie::build(SESSION_COOKIE));
            Outcome::Error((Status::Unauthorized, ()))
        }
        Err(err) => {
            err.log_and_record("Resolving session user");
            Outcome::Error((Status::InternalServerError, ()))
        }
    }
}

#[get("/login")]
pub fn login() -> Template {
    Template::render(
        "login",
        context! {
            title: "Login",
            error: Option::<String>::None,
        },
    )
}

#[derive(FromForm)]
pub struct LoginForm {
    email: String,
    password: String,
}

fn login_error(email: &str, error: &str) -> Template {
    Template::render(
        "login",
        context! {
            title: "Login",
            email: email,
            error: error,
        },
    )
}

#[post("/login", data = "<form>")]
pub async fn process_login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, Template> {
    let email = form.email.trim();
    let password = form.password.trim();
    info!("Login attempt: {}", email);

    match db::authenticate_user(db, email, password).await {
        Ok(LoginOutcome::Success(user)) => {
            info!("Authentication successful for {}", user.email);
            cookies.add_private(
                Cookie::build((SESSION_COOKIE, user.email))
                    .same_site(SameSite::Lax)
                    .http_only(true),
            );
            Ok(Redirect::to(uri!("/admin")))
        }
        Ok(LoginOutcome::WrongPassword) => {
            AppError::Authentication(format!("Wrong password for {}", email))
                .log_and_record("Login");
            Err(login_error(email, "Invalid email or password"))
        }
        Ok(LoginOutcome::UnknownEmail) => {
            AppError::Authentication(format!("Unknown email {}", email)).log_and_record("Login");
            Err(login_error(
                email,
                "Email not registered. Please register first.",
            ))
        }
        Err(err) => {
            err.log_and_record("Login");
            Err(login_error(email, "Login is unavailable right now"))
        }
    }
}

#[get("/register")]
pub fn register() -> Template {
    Template::render("register", context! { title: "Register" })
}

#[derive(FromForm, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "Please enter a valid email address."))]
    email: String,
    #[validate(length(min = 1, message = "Password must not be empty."))]
    password: String,
    confirm_password: String,
}

impl RegisterForm {
    fn trimmed(self) -> Self {
        Self {
            email: self.email.trim().to_string(),
            password: self.password.trim().to_string(),
            confirm_password: self.confirm_password.trim().to_string(),
        }
    }
}

#[post("/register", data = "<form>")]
pub async fn process_register(
    form: Form<RegisterForm>,
    db: &State<Pool<Sqlite>>,
) -> Result<Redirect, AppError> {
    let form = form.into_inner().trimmed();

    if form.password != form.confirm_password {
        return Err(AppError::Validation("Passwords do not match!".to_string()));
    }

    let form = form.validate_form()?;

    db::create_user(db, &form.email, &form.password).await?;
    info!("Registered {}", form.email);

    Ok(Redirect::to(uri!("/login")))
}

#[get("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Redirect {
    cookies.remove_private(Cookie::build(SESSION_COOKIE));
    Redirect::to(uri!("/"))
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Redirect {
    warn!("Unauthorized access attempt");
    Redirect::to(uri!("/login"))
}
