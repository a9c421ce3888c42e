use actix_web::{web, HttpResponse, HttpRequest, ResponseError};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::auth::cookies::{read_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::credentials::{is_valid_email, normalize_email, MIN_PASSWORD_LEN};
use crate::auth::rate_limit::AttemptStatus;
use crate::auth::reset::ConsumeOutcome;
use crate::auth::service::{Principal, TokenKind};
use crate::error::AppError;
use tracing::{info, warn, error};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub message: &'static str,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub user: SessionUser,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequestResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub token: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetConfirmRequest {
    pub email: Option<String>,
    pub token: Option<String>,
    pub new_password: Option<String>,
}

const RESET_REQUESTED: &str = "If an account exists for that email, a password reset link has been sent";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Registers every session route on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Invalid request body: {}", err)).into()
    }))
    .service(
        web::resource("/auth/token")
            .route(web::post().to(login))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/auth/refresh")
            .route(web::post().to(refresh))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/auth/validate")
            .route(web::get().to(validate))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/auth/user")
            .route(web::get().to(current_user))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/auth/logout")
            .route(web::post().to(logout))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/auth/resetPassword")
            .route(web::post().to(request_password_reset))
            .route(web::get().to(validate_reset_token))
            .route(web::put().to(confirm_password_reset))
            .default_service(web::route().to(method_not_allowed)),
    );
}

pub async fn method_not_allowed() -> Result<HttpResponse, AppError> {
    Err(AppError::MethodNotAllowed)
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

fn required_email(field: Option<String>) -> Result<Option<String>, AppError> {
    match required(field) {
        Some(email) => {
            let email = normalize_email(&email);
            if !is_valid_email(&email) {
                return Err(AppError::validation("Invalid email address"));
            }
            Ok(Some(email))
        }
        None => Ok(None),
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let (email, password) = match (required_email(req.email)?, required(req.password)) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(AppError::validation("Email and password are required")),
    };
    info!("Received login request for email: {}", email);

    if let AttemptStatus::Locked { remaining_minutes } = state.attempts.check(&email) {
        warn!("Rejected login for locked account: {}", email);
        return Err(AppError::Lockout { remaining_minutes });
    }

    let account = state.credentials.verify(&email, &password).map_err(|e| {
        error!("Credential check failed for email: {}: {}", email, e);
        AppError::Internal(e.to_string())
    })?;

    let account = match account {
        Some(account) => account,
        None => {
            return match state.attempts.record_failure(&email) {
                AttemptStatus::Allowed { remaining_attempts } => {
                    warn!(
                        "Login failed for email: {} ({} attempts remaining)",
                        email, remaining_attempts
                    );
                    Err(AppError::Authentication {
                        message: "Invalid credentials".into(),
                        remaining_attempts: Some(remaining_attempts),
                    })
                }
                AttemptStatus::Locked { remaining_minutes } => {
                    Err(AppError::Lockout { remaining_minutes })
                }
            };
        }
    };

    state.attempts.record_success(&email);
    let principal = account.principal();
    let access_token = state.tokens.issue_access_token(&principal)?;
    let refresh_token = state.tokens.issue_refresh_token(&principal)?;
    info!("Login successful for email: {}", email);

    Ok(HttpResponse::Ok()
        .cookie(state.cookies.access_cookie(&access_token))
        .cookie(state.cookies.refresh_cookie(&refresh_token))
        .json(LoginResponse {
            message: "Login successful",
            user: UserResponse {
                id: account.id.to_string(),
                name: account.name,
                email: account.email,
            },
        }))
}

/// 401 that also tells the client to drop both session cookies.
fn reject_and_clear_session(state: &AppState, message: &str) -> HttpResponse {
    let mut response = AppError::unauthenticated(message).error_response();
    for cookie in [
        state.cookies.clear_access_cookie(),
        state.cookies.clear_refresh_cookie(),
    ] {
        if let Err(e) = response.add_cookie(&cookie) {
            error!("Failed to attach clearing cookie {}: {}", cookie.name(), e);
        }
    }
    response
}

pub async fn refresh(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = match read_cookie(&req, REFRESH_COOKIE) {
        Some(token) => token,
        None => return Ok(reject_and_clear_session(&state, "No refresh token provided")),
    };

    let principal = match state.tokens.verify_as(&token, TokenKind::Refresh) {
        Ok(principal) => principal,
        Err(rejection) => {
            warn!("Refresh rejected: {}", rejection);
            return Ok(reject_and_clear_session(&state, "Invalid or expired refresh token"));
        }
    };

    // The refresh token is reused as-is; only the access cookie is rewritten.
    let access_token = state.tokens.issue_access_token(&principal)?;
    info!("Refreshed access token for email: {}", principal.email);

    Ok(HttpResponse::Ok()
        .cookie(state.cookies.access_cookie(&access_token))
        .json(RefreshResponse {
            message: "Token refreshed",
            access_token,
        }))
}

/// Resolves the principal behind the request's access cookie.
pub fn authenticated_principal(req: &HttpRequest, state: &AppState) -> Result<Principal, AppError> {
    let token = read_cookie(req, ACCESS_COOKIE)
        .ok_or_else(|| AppError::unauthenticated("Not authenticated"))?;

    state
        .tokens
        .verify_as(&token, TokenKind::Access)
        .map_err(|rejection| {
            warn!("Access token rejected: {}", rejection);
            AppError::unauthenticated("Invalid or expired token")
        })
}

pub async fn validate(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let principal = authenticated_principal(&req, &state)?;

    Ok(HttpResponse::Ok().json(ValidateResponse {
        valid: true,
        user: SessionUser {
            user_id: principal.subject_id,
            email: principal.email,
        },
    }))
}

pub async fn current_user(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let principal = authenticated_principal(&req, &state)?;

    let user = match state.credentials.find(&principal.email) {
        Some(account) => UserResponse {
            id: account.id.to_string(),
            name: account.name,
            email: account.email,
        },
        None => UserResponse {
            name: principal
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
            id: principal.subject_id,
            email: principal.email,
        },
    };

    Ok(HttpResponse::Ok().json(user))
}

pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    info!("Logout requested");
    HttpResponse::Ok()
        .cookie(state.cookies.clear_access_cookie())
        .cookie(state.cookies.clear_refresh_cookie())
        .json(serde_json::json!({
            "message": "Logged out successfully"
        }))
}

pub async fn request_password_reset(
    req: web::Json<ResetRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = required_email(req.into_inner().email)?
        .ok_or_else(|| AppError::validation("Email is required"))?;

    // A token is issued whether or not the account exists so both cases
    // look the same from outside.
    let token = state.resets.create(&email);
    info!("Password reset requested for email: {}", email);

    let debug_token = if state.config.is_production() {
        None
    } else {
        Some(token)
    };

    Ok(HttpResponse::Ok().json(ResetRequestResponse {
        message: RESET_REQUESTED,
        debug_token,
    }))
}

pub async fn validate_reset_token(
    query: web::Query<ResetQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let query = query.into_inner();
    let valid = match (required(query.token), required(query.email)) {
        (Some(token), Some(email)) => state.resets.validate(&token, &normalize_email(&email)),
        _ => false,
    };

    HttpResponse::Ok().json(serde_json::json!({ "valid": valid }))
}

pub async fn confirm_password_reset(
    req: web::Json<ResetConfirmRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let (email, token, new_password) =
        match (required_email(req.email)?, required(req.token), required(req.new_password)) {
            (Some(email), Some(token), Some(new_password)) => (email, token, new_password),
            _ => {
                return Err(AppError::validation(
                    "Email, token and new password are required",
                ))
            }
        };
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    // Hash outside the reset store lock; only the swap runs under it.
    let password_hash = state.credentials.hash_password(&new_password).map_err(|e| {
        error!("Password hashing failed for email: {}: {}", email, e);
        e
    })?;

    let outcome = state.resets.consume(&token, &email, |email| {
        if state.credentials.set_password_hash(email, &password_hash) {
            Ok(())
        } else {
            Err(AppError::validation(INVALID_RESET_TOKEN))
        }
    });

    match outcome {
        Ok(ConsumeOutcome::Updated) => {
            info!("Password reset completed for email: {}", email);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Password has been reset successfully"
            })))
        }
        Ok(ConsumeOutcome::Rejected) => {
            warn!("Rejected password reset for email: {}", email);
            Err(AppError::validation(INVALID_RESET_TOKEN))
        }
        Err(e) => {
            if !matches!(e, AppError::Validation(_)) {
                error!("Password update failed for email: {}: {}", email, e);
            }
            Err(e)
        }
    }
}
