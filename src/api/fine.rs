use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    model::{fine::Fine, user::UserBrief},
    utils::db_utils::{build_update_sql, execute_update},
};

const FINE_COLUMNS: &str =
    "id, employee_id, amount, date, description, status, created_at, updated_at";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFine {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = 5000.0)]
    pub amount: f64,
    #[schema(example = "2026-03-08", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FineSummaryEntry {
    pub employee: UserBrief,
    pub total_fines: f64,
    #[schema(value_type = String, format = "date")]
    pub last_date: NaiveDate,
}

#[derive(sqlx::FromRow)]
struct FineEmployeeRow {
    employee_id: u64,
    full_name: String,
    profile_picture_url: Option<String>,
    amount: f64,
    date: NaiveDate,
}

#[utoipa::path(
    get,
    path = "/api/fines/summary",
    responses(
        (status = 200, body = [FineSummaryEntry])
    ),
    security(("bearer_auth" = [])),
    tag = "Fines"
)]
pub async fn fine_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let rows = sqlx::query_as::<_, FineEmployeeRow>(
        r#"
        SELECT f.employee_id, u.full_name, u.profile_picture_url, f.amount, f.date
        FROM fines f
        JOIN users u ON u.id = f.employee_id
        ORDER BY f.date
        "#,
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch fine summary");
        actix_web::error::ErrorInternalServerError("Error fetching fine summary")
    })?;

    let mut order: Vec<u64> = Vec::new();
    let mut entries: HashMap<u64, FineSummaryEntry> = HashMap::new();

    for row in rows {
        let entry = entries.entry(row.employee_id).or_insert_with(|| {
            order.push(row.employee_id);
            FineSummaryEntry {
                employee: UserBrief {
                    id: row.employee_id,
                    full_name: row.full_name.clone(),
                    profile_picture_url: row.profile_picture_url.clone(),
                },
                total_fines: 0.0,
                last_date: row.date,
            }
        });
        entry.total_fines += row.amount;
        if row.date > entry.last_date {
            entry.last_date = row.date;
        }
    }

    let summary: Vec<FineSummaryEntry> = order
        .iter()
        .filter_map(|id| entries.remove(id))
        .collect();

    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    get,
    path = "/api/fines/employee/{employee_id}",
    params(("employee_id", description = "Employee ID")),
    responses(
        (status = 200, body = [Fine])
    ),
    security(("bearer_auth" = [])),
    tag = "Fines"
)]
pub async fn employee_fines(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let fines = sqlx::query_as::<_, Fine>(&format!(
        r#"
        SELECT {FINE_COLUMNS}
        FROM fines
        WHERE employee_id = ?
        ORDER BY date DESC
        "#
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch employee fines");
        actix_web::error::ErrorInternalServerError("Error fetching fines")
    })?;

    Ok(HttpResponse::Ok().json(fines))
}

#[utoipa::path(
    post,
    path = "/api/fines",
    request_body = CreateFine,
    responses(
        (status = 201, body = Fine)
    ),
    security(("bearer_auth" = [])),
    tag = "Fines"
)]
pub async fn create_fine(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateFine>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let result = sqlx::query(
        r#"
        INSERT INTO fines (employee_id, amount, date, description, status)
        VALUES (?, ?, ?, ?, 'Pending')
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.amount)
    .bind(payload.date)
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create fine");
        actix_web::error::ErrorInternalServerError("Error creating fine")
    })?;

    let fine = sqlx::query_as::<_, Fine>(&format!(
        "SELECT {FINE_COLUMNS} FROM fines WHERE id = ?"
    ))
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch created fine");
        actix_web::error::ErrorInternalServerError("Error creating fine")
    })?;

    Ok(HttpResponse::Created().json(fine))
}

#[utoipa::path(
    put,
    path = "/api/fines/{fine_id}",
    request_body = serde_json::Value,
    params(("fine_id", description = "Fine ID")),
    responses(
        (status = 200, body = Fine),
        (status = 404, description = "Fine not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Fines"
)]
pub async fn update_fine(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<serde_json::Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let fine_id = path.into_inner();

    let update = build_update_sql(
        "fines",
        &payload,
        &[
            ("amount", "amount"),
            ("date", "date"),
            ("description", "description"),
        ],
        "id",
        fine_id,
    )?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, fine_id, "Failed to update fine");
        actix_web::error::ErrorInternalServerError("Error updating fine")
    })?;

    let fine = sqlx::query_as::<_, Fine>(&format!(
        "SELECT {FINE_COLUMNS} FROM fines WHERE id = ?"
    ))
    .bind(fine_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, fine_id, "Failed to fetch fine");
        actix_web::error::ErrorInternalServerError("Error updating fine")
    })?;

    match fine {
        Some(f) => Ok(HttpResponse::Ok().json(f)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Fine not found"
        }))),
    }
}

#[utoipa::path(
    delete,
    path = "/api/fines/{fine_id}",
    params(("fine_id", description = "Fine ID")),
    responses(
        (status = 200, description = "Fine deleted")
    ),
    security(("bearer_auth" = [])),
    tag = "Fines"
)]
pub async fn delete_fine(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let fine_id = path.into_inner();

    sqlx::query("DELETE FROM fines WHERE id = ?")
        .bind(fine_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, fine_id, "Failed to delete fine");
            actix_web::error::ErrorInternalServerError("Error deleting fine")
        })?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Fine deleted" })))
}
