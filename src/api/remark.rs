use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

use crate::{auth::auth::AuthUser, model::remark::Remark, period};

const REMARK_COLUMNS: &str = "id, employee_id, text, date, created_at, updated_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateRemark {
    #[schema(example = "Asked for the 16th off")]
    pub text: String,
    #[schema(example = "2026-03-08", value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateRemark {
    pub text: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/remarks",
    params(("user_id", description = "Employee ID")),
    responses(
        (status = 200, body = [Remark])
    ),
    security(("bearer_auth" = [])),
    tag = "Remarks"
)]
pub async fn list_remarks(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let remarks = sqlx::query_as::<_, Remark>(&format!(
        r#"
        SELECT {REMARK_COLUMNS}
        FROM remarks
        WHERE employee_id = ?
        ORDER BY date DESC
        "#
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch remarks");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    Ok(HttpResponse::Ok().json(remarks))
}

#[utoipa::path(
    post,
    path = "/api/users/{user_id}/remarks",
    request_body = CreateRemark,
    params(("user_id", description = "Employee ID")),
    responses(
        (status = 201, body = Remark),
        (status = 400, description = "Text missing")
    ),
    security(("bearer_auth" = [])),
    tag = "Remarks"
)]
pub async fn create_remark(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CreateRemark>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let text = payload.text.trim();
    if text.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Text is required"
        })));
    }

    let date = payload.date.unwrap_or_else(period::today);

    let result = sqlx::query("INSERT INTO remarks (employee_id, text, date) VALUES (?, ?, ?)")
        .bind(employee_id)
        .bind(text)
        .bind(date)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to create remark");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    let remark = sqlx::query_as::<_, Remark>(&format!(
        "SELECT {REMARK_COLUMNS} FROM remarks WHERE id = ?"
    ))
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch created remark");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    Ok(HttpResponse::Created().json(remark))
}

#[utoipa::path(
    put,
    path = "/api/remarks/{remark_id}",
    request_body = UpdateRemark,
    params(("remark_id", description = "Remark ID")),
    responses(
        (status = 200, body = Remark),
        (status = 404, description = "Remark not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Remarks"
)]
pub async fn update_remark(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateRemark>,
) -> actix_web::Result<impl Responder> {
    let remark_id = path.into_inner();

    let existing = sqlx::query_as::<_, Remark>(&format!(
        "SELECT {REMARK_COLUMNS} FROM remarks WHERE id = ?"
    ))
    .bind(remark_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, remark_id, "Failed to fetch remark");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let existing = match existing {
        Some(r) => r,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "Remark not found"
            })));
        }
    };

    let text = payload
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&existing.text);
    let date = payload.date.unwrap_or(existing.date);

    sqlx::query("UPDATE remarks SET text = ?, date = ? WHERE id = ?")
        .bind(text)
        .bind(date)
        .bind(remark_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, remark_id, "Failed to update remark");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    let remark = sqlx::query_as::<_, Remark>(&format!(
        "SELECT {REMARK_COLUMNS} FROM remarks WHERE id = ?"
    ))
    .bind(remark_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, remark_id, "Failed to fetch updated remark");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    Ok(HttpResponse::Ok().json(remark))
}

#[utoipa::path(
    delete,
    path = "/api/remarks/{remark_id}",
    params(("remark_id", description = "Remark ID")),
    responses(
        (status = 200, description = "Remark deleted")
    ),
    security(("bearer_auth" = [])),
    tag = "Remarks"
)]
pub async fn delete_remark(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let remark_id = path.into_inner();

    sqlx::query("DELETE FROM remarks WHERE id = ?")
        .bind(remark_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, remark_id, "Failed to delete remark");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Remark deleted" })))
}
