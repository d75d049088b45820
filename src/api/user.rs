use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use crate::{
    auth::{
        auth::AuthUser,
        jwt::generate_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    model::{
        role::{AccountStatus, Role},
        user::{ChatListEntry, User, UserView},
    },
    models::{LoginReq, RegisterReq, UserSql},
    utils::{email_cache, email_filter},
};

const USER_COLUMNS: &str = "id, full_name, email, password, role, status, \
     profile_picture_url, birthday, last_login_at, created_at, updated_at";

/// Login / profile payload the frontend keeps in local storage.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub profile_picture_url: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub birthday: Option<NaiveDate>,
    pub status: String,
    pub token: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileReq {
    pub full_name: Option<String>,
    pub profile_picture_url: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub birthday: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordReq {
    pub current_password: String,
    pub new_password: String,
}

/// true  => email AVAILABLE
/// false => email TAKEN
pub async fn is_email_available(email: &str, pool: &MySqlPool) -> bool {
    let email = email.to_lowercase();

    // 1️⃣ Cuckoo filter — fast negative
    // if filter says not exist then it is saying true, else it may exist or not.
    if !email_filter::might_exist(&email) {
        return true;
    }

    // 2️⃣ Moka cache — fast positive
    if email_cache::is_taken(&email).await {
        return false;
    }

    // 3️⃣ Database fallback
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(&email)
    .fetch_one(pool)
    .await
    .unwrap_or(true); // fail-safe

    !exists
}

#[utoipa::path(
    post,
    path = "/api/users/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account created, pending approval"),
        (status = 400, description = "Invalid data or email already registered")
    ),
    tag = "Users"
)]
pub async fn register(
    payload: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> impl Responder {
    let full_name = payload.full_name.trim();
    let email = payload.email.trim().to_lowercase();

    if full_name.is_empty() || email.is_empty() || payload.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "message": "Invalid user data"
        }));
    }

    if !is_email_available(&email, pool.get_ref()).await {
        return HttpResponse::BadRequest().json(json!({
            "message": "User already exists"
        }));
    }

    let hashed = hash_password(&payload.password);

    let result = sqlx::query(
        r#"
        INSERT INTO users (full_name, email, password, role, status, birthday)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(full_name)
    .bind(&email)
    .bind(&hashed)
    .bind(Role::Employee.to_string())
    .bind(AccountStatus::Pending.to_string())
    .bind(payload.birthday)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            // keep filter and cache in sync with the new row
            email_filter::insert(&email);
            email_cache::mark_taken(&email).await;

            HttpResponse::Created().json(json!({
                "message": "Registration successful! Your account is pending admin approval."
            }))
        }
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code() == Some("23000".into()) {
                    return HttpResponse::BadRequest().json(json!({
                        "message": "User already exists"
                    }));
                }
            }

            error!(error = %e, "Failed to register user");
            HttpResponse::InternalServerError().json(json!({
                "message": "Server error during registration"
            }))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/users/login",
    request_body = LoginReq,
    responses(
        (status = 200, body = AuthResponse),
        (status = 401, description = "Bad credentials"),
        (status = 403, description = "Account not approved")
    ),
    tag = "Users"
)]
#[instrument(
    name = "user_login",
    skip(pool, config, payload),
    fields(email = %payload.email)
)]
pub async fn login(
    payload: web::Json<LoginReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    let email = payload.email.trim().to_lowercase();

    if email.is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty email or password");
        return HttpResponse::BadRequest().json(json!({
            "message": "Invalid email or password"
        }));
    }

    debug!("Fetching user from database");

    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, full_name, email, password, role, status, profile_picture_url, birthday
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().json(json!({
                "message": "Invalid email or password"
            }));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().json(json!({
                "message": "Server error during login"
            }));
        }
    };

    debug!("Verifying password");

    if !verify_password(&payload.password, &db_user.password) {
        info!("Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({
            "message": "Invalid email or password"
        }));
    }

    // Account must be approved before it can sign in
    match db_user.status.parse::<AccountStatus>() {
        Ok(AccountStatus::Pending) => {
            info!("Login blocked: account pending");
            return HttpResponse::Forbidden().json(json!({
                "message": "Account is pending admin approval."
            }));
        }
        Ok(AccountStatus::Rejected) => {
            info!("Login blocked: account rejected");
            return HttpResponse::Forbidden().json(json!({
                "message": "Account access has been rejected."
            }));
        }
        Ok(AccountStatus::Approved) => {}
        Err(_) => {
            return HttpResponse::Forbidden().json(json!({
                "message": "Account is not yet approved."
            }));
        }
    }

    debug!("Generating token");

    let token = generate_token(
        db_user.id,
        db_user.email.clone(),
        db_user.role.clone(),
        &config.jwt_secret,
        config.token_ttl,
    );

    // non-fatal
    debug!("Updating last_login_at");

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");

    HttpResponse::Ok().json(AuthResponse {
        id: db_user.id,
        full_name: db_user.full_name,
        email: db_user.email,
        role: db_user.role,
        profile_picture_url: db_user.profile_picture_url,
        birthday: db_user.birthday,
        status: db_user.status,
        token,
    })
}

#[utoipa::path(
    get,
    path = "/api/users/profile",
    responses(
        (status = 200, body = UserView),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let user = fetch_user(auth.user_id, pool.get_ref()).await?;

    match user {
        Some(u) => Ok(HttpResponse::Ok().json(UserView::from(u))),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "User not found"
        }))),
    }
}

#[utoipa::path(
    put,
    path = "/api/users/profile",
    request_body = UpdateProfileReq,
    responses(
        (status = 200, body = AuthResponse),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<UpdateProfileReq>,
) -> actix_web::Result<impl Responder> {
    let user = match fetch_user(auth.user_id, pool.get_ref()).await? {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "User not found"
            })));
        }
    };

    let full_name = match payload.full_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => user.full_name,
    };
    let profile_picture_url = payload
        .profile_picture_url
        .clone()
        .or(user.profile_picture_url);
    // birthday can only be set once
    let birthday = user.birthday.or(payload.birthday);

    let result = sqlx::query(
        r#"
        UPDATE users
        SET full_name = ?, profile_picture_url = ?, birthday = ?
        WHERE id = ?
        "#,
    )
    .bind(&full_name)
    .bind(&profile_picture_url)
    .bind(birthday)
    .bind(user.id)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        error!(error = %e, user_id = user.id, "Failed to update profile");
        return Ok(HttpResponse::InternalServerError().json(json!({
            "message": "Server error updating profile"
        })));
    }

    // the frontend replaces its stored session with this response
    let token = generate_token(
        user.id,
        user.email.clone(),
        user.role.clone(),
        &config.jwt_secret,
        config.token_ttl,
    );

    Ok(HttpResponse::Ok().json(AuthResponse {
        id: user.id,
        full_name,
        email: user.email,
        role: user.role,
        profile_picture_url,
        birthday,
        status: user.status,
        token,
    }))
}

#[utoipa::path(
    put,
    path = "/api/users/change-password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password mismatch")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangePasswordReq>,
) -> actix_web::Result<impl Responder> {
    let user = match fetch_user(auth.user_id, pool.get_ref()).await? {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "User not found"
            })));
        }
    };

    if !verify_password(&payload.current_password, &user.password) {
        return Ok(HttpResponse::Unauthorized().json(json!({
            "message": "Incorrect current password"
        })));
    }

    if payload.new_password.len() < 6 {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "New password must be at least 6 characters long."
        })));
    }

    let hashed = hash_password(&payload.new_password);

    let result = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(user.id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({
            "message": "Password updated successfully"
        }))),
        Err(e) => {
            error!(error = %e, user_id = user.id, "Failed to change password");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Server error changing password"
            })))
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}/approve",
    params(("user_id", description = "User ID")),
    responses(
        (status = 200, description = "User approved"),
        (status = 400, description = "Already approved or target is admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn approve_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    set_account_status(pool.get_ref(), path.into_inner(), AccountStatus::Approved).await
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}/decline",
    params(("user_id", description = "User ID")),
    responses(
        (status = 200, description = "User declined"),
        (status = 400, description = "Already rejected or target is admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn decline_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    set_account_status(pool.get_ref(), path.into_inner(), AccountStatus::Rejected).await
}

async fn set_account_status(
    pool: &MySqlPool,
    user_id: u64,
    target: AccountStatus,
) -> actix_web::Result<HttpResponse> {
    let server_error = match target {
        AccountStatus::Rejected => "Server error declining user.",
        _ => "Server error approving user",
    };

    let user = match fetch_user(user_id, pool).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "User not found"
            })));
        }
        Err(_) => {
            return Ok(HttpResponse::InternalServerError().json(json!({
                "message": server_error
            })));
        }
    };

    if user.role.parse::<Role>() == Ok(Role::Admin) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Cannot change status of an admin."
        })));
    }

    if user.status == target.to_string() {
        let message = match target {
            AccountStatus::Rejected => "User is already rejected.",
            _ => "User is already approved",
        };
        return Ok(HttpResponse::BadRequest().json(json!({ "message": message })));
    }

    let result = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
        .bind(target.to_string())
        .bind(user.id)
        .execute(pool)
        .await;

    match result {
        Ok(_) => {
            let message = match target {
                AccountStatus::Rejected => {
                    format!("User {} declined successfully.", user.full_name)
                }
                _ => format!("User {} approved successfully.", user.full_name),
            };
            Ok(HttpResponse::Ok().json(json!({ "message": message })))
        }
        Err(e) => {
            error!(error = %e, user_id, "Failed to update account status");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": server_error
            })))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/users/pending",
    responses(
        (status = 200, body = [UserView])
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn pending_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE status = 'pending' AND role != 'admin'
        ORDER BY created_at DESC
        "#
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch pending users");
        actix_web::error::ErrorInternalServerError("Server error fetching pending users")
    })?;

    let views: Vec<UserView> = users.into_iter().map(UserView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    get,
    path = "/api/users/chat-list",
    responses(
        (status = 200, body = [ChatListEntry])
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn chat_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    // admins see approved employees, employees see admins
    let sql = if auth.role == Role::Admin {
        r#"
        SELECT id, full_name, profile_picture_url, email
        FROM users
        WHERE role = 'employee' AND status = 'approved' AND id != ?
        ORDER BY full_name
        "#
    } else {
        r#"
        SELECT id, full_name, profile_picture_url, email
        FROM users
        WHERE role = 'admin' AND id != ?
        ORDER BY full_name
        "#
    };

    let entries = sqlx::query_as::<_, ChatListEntry>(sql)
        .bind(auth.user_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch chat list");
            actix_web::error::ErrorInternalServerError("Server error fetching users.")
        })?;

    Ok(HttpResponse::Ok().json(entries))
}

#[utoipa::path(
    get,
    path = "/api/users/all",
    responses(
        (status = 200, body = [UserView])
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_all_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY full_name"
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch users");
        actix_web::error::ErrorInternalServerError("Server error fetching employees.")
    })?;

    let views: Vec<UserView> = users.into_iter().map(UserView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, body = [UserView])
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {USER_COLUMNS}
        FROM users
        WHERE role = 'employee' AND status = 'approved'
        ORDER BY full_name
        "#
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch approved employees");
        actix_web::error::ErrorInternalServerError("Server error fetching approved employees.")
    })?;

    let views: Vec<UserView> = users.into_iter().map(UserView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(("user_id", description = "User ID")),
    responses(
        (status = 200, body = UserView),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let user_id = path.into_inner();

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, user_id, "Failed to fetch employee");
        actix_web::error::ErrorInternalServerError("Server error fetching employee data.")
    })?;

    match user {
        Some(u) => Ok(HttpResponse::Ok().json(UserView::from(u))),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found."
        }))),
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id", description = "User ID")),
    responses(
        (status = 200, description = "Employee deleted"),
        (status = 403, description = "Target is an admin"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let user_id = path.into_inner();

    let user = match fetch_user(user_id, pool.get_ref()).await? {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "Employee not found."
            })));
        }
    };

    if user.role.parse::<Role>() == Ok(Role::Admin) {
        return Ok(HttpResponse::Forbidden().json(json!({
            "message": "Cannot delete an admin account."
        })));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            // the address becomes registrable again
            email_filter::remove(&user.email);
            email_cache::release(&user.email).await;

            Ok(HttpResponse::Ok().json(json!({
                "message": "Employee account deleted successfully."
            })))
        }
        Err(e) => {
            error!(error = %e, user_id, "Failed to delete employee");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Server error deleting employee account."
            })))
        }
    }
}

async fn fetch_user(user_id: u64, pool: &MySqlPool) -> actix_web::Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        error!(error = %e, user_id, "Failed to fetch user");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })
}
