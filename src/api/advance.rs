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
    model::{
        advance::{Advance, AdvanceView, Settlement, SettlementType, recalculated_status},
        user::UserBrief,
    },
    utils::db_utils::{build_update_sql, execute_update},
};

const ADVANCE_COLUMNS: &str = "id, employee_id, amount, paid_amount, status, date, \
     description, created_at, updated_at";

const SETTLEMENT_COLUMNS: &str = "id, advance_id, amount, date, settlement_type, \
     description, created_at";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdvance {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = 50000.0)]
    pub amount: f64,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct SettleAdvance {
    /// "Full" clears the open balance, "Partial" pays `amount`.
    #[serde(rename = "type")]
    #[schema(example = "Partial")]
    pub settlement_type: String,
    #[schema(example = 10000.0)]
    pub amount: Option<f64>,
    #[schema(example = "2026-03-20", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceSummaryEntry {
    pub employee: UserBrief,
    pub total_balance: f64,
    #[schema(value_type = String, format = "date")]
    pub last_date: NaiveDate,
}

#[derive(sqlx::FromRow)]
struct AdvanceEmployeeRow {
    employee_id: u64,
    full_name: String,
    profile_picture_url: Option<String>,
    amount: f64,
    paid_amount: f64,
    date: NaiveDate,
}

#[utoipa::path(
    get,
    path = "/api/advances/summary",
    responses(
        (status = 200, body = [AdvanceSummaryEntry])
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn advance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let rows = sqlx::query_as::<_, AdvanceEmployeeRow>(
        r#"
        SELECT a.employee_id, u.full_name, u.profile_picture_url,
               a.amount, a.paid_amount, a.date
        FROM advances a
        JOIN users u ON u.id = a.employee_id
        WHERE a.status = 'Ongoing'
        ORDER BY a.date
        "#,
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch advance summary");
        actix_web::error::ErrorInternalServerError("Error fetching summary")
    })?;

    let mut order: Vec<u64> = Vec::new();
    let mut entries: HashMap<u64, AdvanceSummaryEntry> = HashMap::new();

    for row in rows {
        let entry = entries.entry(row.employee_id).or_insert_with(|| {
            order.push(row.employee_id);
            AdvanceSummaryEntry {
                employee: UserBrief {
                    id: row.employee_id,
                    full_name: row.full_name.clone(),
                    profile_picture_url: row.profile_picture_url.clone(),
                },
                total_balance: 0.0,
                last_date: row.date,
            }
        });
        entry.total_balance += row.amount - row.paid_amount;
        if row.date > entry.last_date {
            entry.last_date = row.date;
        }
    }

    let summary: Vec<AdvanceSummaryEntry> = order
        .iter()
        .filter_map(|id| entries.remove(id))
        .collect();

    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    get,
    path = "/api/advances/employee/{employee_id}",
    params(("employee_id", description = "Employee ID")),
    responses(
        (status = 200, body = [AdvanceView])
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn employee_advances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let advances = sqlx::query_as::<_, Advance>(&format!(
        r#"
        SELECT {ADVANCE_COLUMNS}
        FROM advances
        WHERE employee_id = ?
        ORDER BY date DESC
        "#
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch employee advances");
        actix_web::error::ErrorInternalServerError("Error fetching details")
    })?;

    let settlements = sqlx::query_as::<_, Settlement>(&format!(
        r#"
        SELECT s.id, s.advance_id, s.amount, s.date, s.settlement_type,
               s.description, s.created_at
        FROM advance_settlements s
        JOIN advances a ON a.id = s.advance_id
        WHERE a.employee_id = ?
        ORDER BY s.date, s.created_at
        "#
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch settlements");
        actix_web::error::ErrorInternalServerError("Error fetching details")
    })?;

    let mut by_advance: HashMap<u64, Vec<Settlement>> = HashMap::new();
    for settlement in settlements {
        by_advance
            .entry(settlement.advance_id)
            .or_default()
            .push(settlement);
    }

    let views: Vec<AdvanceView> = advances
        .into_iter()
        .map(|a| {
            let settlements = by_advance.remove(&a.id).unwrap_or_default();
            AdvanceView::from_parts(a, None, settlements)
        })
        .collect();

    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    get,
    path = "/api/advances/{advance_id}",
    params(("advance_id", description = "Advance ID")),
    responses(
        (status = 200, body = AdvanceView),
        (status = 404, description = "Advance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn get_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let advance_id = path.into_inner();

    let advance = match fetch_advance(pool.get_ref(), advance_id).await? {
        Some(a) => a,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "Advance not found"
            })));
        }
    };

    let employee = sqlx::query_as::<_, UserBrief>(
        "SELECT id, full_name, profile_picture_url FROM users WHERE id = ?",
    )
    .bind(advance.employee_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, advance_id, "Failed to fetch advance employee");
        actix_web::error::ErrorInternalServerError("Error fetching advance")
    })?;

    let settlements = fetch_settlements(pool.get_ref(), advance_id).await?;

    Ok(HttpResponse::Ok().json(AdvanceView::from_parts(advance, employee, settlements)))
}

#[utoipa::path(
    post,
    path = "/api/advances",
    request_body = CreateAdvance,
    responses(
        (status = 201, body = AdvanceView)
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn create_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAdvance>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let result = sqlx::query(
        r#"
        INSERT INTO advances (employee_id, amount, paid_amount, status, date, description)
        VALUES (?, ?, 0, 'Ongoing', ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.amount)
    .bind(payload.date)
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create advance");
        actix_web::error::ErrorInternalServerError("Error creating advance")
    })?;

    let advance = fetch_advance(pool.get_ref(), result.last_insert_id())
        .await?
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Error creating advance"))?;

    Ok(HttpResponse::Created().json(AdvanceView::from_parts(advance, None, Vec::new())))
}

#[utoipa::path(
    put,
    path = "/api/advances/{advance_id}/settle",
    request_body = SettleAdvance,
    params(("advance_id", description = "Advance ID")),
    responses(
        (status = 200, body = AdvanceView),
        (status = 400, description = "Invalid settlement"),
        (status = 404, description = "Advance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn settle_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<SettleAdvance>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let advance_id = path.into_inner();

    let settlement_type = match payload.settlement_type.parse::<SettlementType>() {
        Ok(t) => t,
        Err(_) => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Invalid settlement type"
            })));
        }
    };

    let advance = match fetch_advance(pool.get_ref(), advance_id).await? {
        Some(a) => a,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "Advance not found"
            })));
        }
    };

    let settle_amount = match settlement_type {
        SettlementType::Full => (advance.amount - advance.paid_amount).max(0.0),
        SettlementType::Partial => match payload.amount {
            Some(amount) if amount > 0.0 => amount,
            _ => {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "message": "Settlement amount is required"
                })));
            }
        },
    };

    sqlx::query(
        r#"
        INSERT INTO advance_settlements (advance_id, amount, date, settlement_type, description)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(advance_id)
    .bind(settle_amount)
    .bind(payload.date)
    .bind(settlement_type.to_string())
    .bind(&payload.description)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, advance_id, "Failed to insert settlement");
        actix_web::error::ErrorInternalServerError("Error settling advance")
    })?;

    recalculate_advance(pool.get_ref(), advance_id)
        .await
        .map_err(|e| {
            error!(error = %e, advance_id, "Failed to recalculate advance");
            actix_web::error::ErrorInternalServerError("Error settling advance")
        })?;

    advance_response(pool.get_ref(), advance_id).await
}

#[utoipa::path(
    put,
    path = "/api/advances/{advance_id}/settlements/{settlement_id}",
    request_body = serde_json::Value,
    params(
        ("advance_id", description = "Advance ID"),
        ("settlement_id", description = "Settlement ID")
    ),
    responses(
        (status = 200, body = AdvanceView),
        (status = 404, description = "Advance or settlement not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn update_settlement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
    payload: web::Json<serde_json::Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let (advance_id, settlement_id) = path.into_inner();

    if fetch_advance(pool.get_ref(), advance_id).await?.is_none() {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Advance not found"
        })));
    }

    let owned = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM advance_settlements WHERE id = ? AND advance_id = ?)",
    )
    .bind(settlement_id)
    .bind(advance_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, settlement_id, "Failed to look up settlement");
        actix_web::error::ErrorInternalServerError("Error updating settlement")
    })?;

    if !owned {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Settlement not found"
        })));
    }

    if let Some(settlement_type) = payload.get("type").and_then(|v| v.as_str()) {
        if settlement_type.parse::<SettlementType>().is_err() {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Invalid settlement type"
            })));
        }
    }

    let update = build_update_sql(
        "advance_settlements",
        &payload,
        &[
            ("amount", "amount"),
            ("date", "date"),
            ("type", "settlement_type"),
            ("description", "description"),
        ],
        "id",
        settlement_id,
    )?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, settlement_id, "Failed to update settlement");
        actix_web::error::ErrorInternalServerError("Error updating settlement")
    })?;

    recalculate_advance(pool.get_ref(), advance_id)
        .await
        .map_err(|e| {
            error!(error = %e, advance_id, "Failed to recalculate advance");
            actix_web::error::ErrorInternalServerError("Error updating settlement")
        })?;

    advance_response(pool.get_ref(), advance_id).await
}

#[utoipa::path(
    delete,
    path = "/api/advances/{advance_id}/settlements/{settlement_id}",
    params(
        ("advance_id", description = "Advance ID"),
        ("settlement_id", description = "Settlement ID")
    ),
    responses(
        (status = 200, body = AdvanceView),
        (status = 404, description = "Advance or settlement not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn delete_settlement(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let (advance_id, settlement_id) = path.into_inner();

    if fetch_advance(pool.get_ref(), advance_id).await?.is_none() {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Advance not found"
        })));
    }

    let result = sqlx::query(
        "DELETE FROM advance_settlements WHERE id = ? AND advance_id = ?",
    )
    .bind(settlement_id)
    .bind(advance_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, settlement_id, "Failed to delete settlement");
        actix_web::error::ErrorInternalServerError("Error deleting settlement")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Settlement not found"
        })));
    }

    recalculate_advance(pool.get_ref(), advance_id)
        .await
        .map_err(|e| {
            error!(error = %e, advance_id, "Failed to recalculate advance");
            actix_web::error::ErrorInternalServerError("Error deleting settlement")
        })?;

    advance_response(pool.get_ref(), advance_id).await
}

#[utoipa::path(
    put,
    path = "/api/advances/{advance_id}",
    request_body = serde_json::Value,
    params(("advance_id", description = "Advance ID")),
    responses(
        (status = 200, body = AdvanceView),
        (status = 404, description = "Advance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn update_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<serde_json::Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let advance_id = path.into_inner();

    if fetch_advance(pool.get_ref(), advance_id).await?.is_none() {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Advance not found"
        })));
    }

    let update = build_update_sql(
        "advances",
        &payload,
        &[
            ("amount", "amount"),
            ("date", "date"),
            ("description", "description"),
        ],
        "id",
        advance_id,
    )?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, advance_id, "Failed to update advance");
        actix_web::error::ErrorInternalServerError("Error updating")
    })?;

    // an amount edit can flip the settled status either way
    recalculate_advance(pool.get_ref(), advance_id)
        .await
        .map_err(|e| {
            error!(error = %e, advance_id, "Failed to recalculate advance");
            actix_web::error::ErrorInternalServerError("Error updating")
        })?;

    advance_response(pool.get_ref(), advance_id).await
}

#[utoipa::path(
    delete,
    path = "/api/advances/{advance_id}",
    params(("advance_id", description = "Advance ID")),
    responses(
        (status = 200, description = "Advance deleted")
    ),
    security(("bearer_auth" = [])),
    tag = "Advances"
)]
pub async fn delete_advance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let advance_id = path.into_inner();

    sqlx::query("DELETE FROM advances WHERE id = ?")
        .bind(advance_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, advance_id, "Failed to delete advance");
            actix_web::error::ErrorInternalServerError("Error deleting")
        })?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Deleted successfully" })))
}

async fn fetch_advance(
    pool: &MySqlPool,
    advance_id: u64,
) -> actix_web::Result<Option<Advance>> {
    sqlx::query_as::<_, Advance>(&format!(
        "SELECT {ADVANCE_COLUMNS} FROM advances WHERE id = ?"
    ))
    .bind(advance_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        error!(error = %e, advance_id, "Failed to fetch advance");
        actix_web::error::ErrorInternalServerError("Error fetching advance")
    })
}

async fn fetch_settlements(
    pool: &MySqlPool,
    advance_id: u64,
) -> actix_web::Result<Vec<Settlement>> {
    sqlx::query_as::<_, Settlement>(&format!(
        r#"
        SELECT {SETTLEMENT_COLUMNS}
        FROM advance_settlements
        WHERE advance_id = ?
        ORDER BY date, created_at
        "#
    ))
    .bind(advance_id)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        error!(error = %e, advance_id, "Failed to fetch settlements");
        actix_web::error::ErrorInternalServerError("Error fetching advance")
    })
}

/// paid_amount is always the settlement sum; status follows from it.
async fn recalculate_advance(pool: &MySqlPool, advance_id: u64) -> Result<(), sqlx::Error> {
    let paid: f64 = sqlx::query_scalar::<_, Option<f64>>(
        "SELECT SUM(amount) FROM advance_settlements WHERE advance_id = ?",
    )
    .bind(advance_id)
    .fetch_one(pool)
    .await?
    .unwrap_or(0.0);

    let amount = sqlx::query_scalar::<_, f64>("SELECT amount FROM advances WHERE id = ?")
        .bind(advance_id)
        .fetch_optional(pool)
        .await?;

    if let Some(amount) = amount {
        let status = recalculated_status(amount, paid);
        sqlx::query("UPDATE advances SET paid_amount = ?, status = ? WHERE id = ?")
            .bind(paid)
            .bind(status.to_string())
            .bind(advance_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

async fn advance_response(
    pool: &MySqlPool,
    advance_id: u64,
) -> actix_web::Result<HttpResponse> {
    let advance = fetch_advance(pool, advance_id)
        .await?
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Error fetching advance"))?;
    let settlements = fetch_settlements(pool, advance_id).await?;

    Ok(HttpResponse::Ok().json(AdvanceView::from_parts(advance, None, settlements)))
}
