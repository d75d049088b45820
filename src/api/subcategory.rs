use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    model::subcategory::{PaymentType, SubcategoryJoined, SubcategoryView},
    utils::db_utils::{build_update_sql, execute_update},
};

const SUBCATEGORY_JOIN: &str = r#"
    SELECT s.id, s.name, s.main_category_id, m.name AS main_category_name,
           s.payment_type, s.rate, s.sort_order, s.group_type,
           s.created_at, s.updated_at
    FROM subcategories s
    JOIN main_categories m ON m.id = s.main_category_id
"#;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubcategory {
    #[schema(example = "Collar stitching")]
    pub name: String,
    #[schema(example = 3)]
    pub main_category: u64,
    #[schema(example = "perPiece")]
    pub payment_type: String,
    #[schema(example = 150.0)]
    pub rate: f64,
    pub group_type: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReorderItem {
    pub id: u64,
    pub order: i32,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderReq {
    pub new_order: Vec<ReorderItem>,
}

#[utoipa::path(
    get,
    path = "/api/subcategories",
    responses(
        (status = 200, body = [SubcategoryView])
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn list_subcategories(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let rows = sqlx::query_as::<_, SubcategoryJoined>(&format!(
        "{SUBCATEGORY_JOIN} ORDER BY s.sort_order, s.name"
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch subcategories");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let views: Vec<SubcategoryView> = rows.into_iter().map(SubcategoryView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    post,
    path = "/api/subcategories",
    request_body = CreateSubcategory,
    responses(
        (status = 201, body = SubcategoryView),
        (status = 400, description = "Missing fields or invalid payment type")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn create_subcategory(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateSubcategory>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() || payload.rate <= 0.0 {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "All fields are required"
        })));
    }

    if !PaymentType::is_rate_table_type(&payload.payment_type) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": format!(
                "Invalid payment type. Must be one of: {}",
                PaymentType::rate_table_types()
            )
        })));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO subcategories (name, main_category_id, payment_type, rate, group_type)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(name)
    .bind(payload.main_category)
    .bind(&payload.payment_type)
    .bind(payload.rate)
    .bind(payload.group_type.as_deref().unwrap_or(""))
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create subcategory");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let view = fetch_subcategory_view(pool.get_ref(), result.last_insert_id()).await?;

    match view {
        Some(v) => Ok(HttpResponse::Created().json(v)),
        None => Ok(HttpResponse::InternalServerError().json(json!({
            "message": "Server Error"
        }))),
    }
}

#[utoipa::path(
    put,
    path = "/api/subcategories/{subcategory_id}",
    request_body = serde_json::Value,
    params(("subcategory_id", description = "Subcategory ID")),
    responses(
        (status = 200, body = SubcategoryView),
        (status = 400, description = "Invalid payment type or unknown field"),
        (status = 404, description = "Subcategory not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn update_subcategory(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<serde_json::Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let subcategory_id = path.into_inner();

    if let Some(payment_type) = payload.get("paymentType").and_then(|v| v.as_str()) {
        if !PaymentType::is_rate_table_type(payment_type) {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": format!(
                    "Invalid payment type. Must be one of: {}",
                    PaymentType::rate_table_types()
                )
            })));
        }
    }

    let update = build_update_sql(
        "subcategories",
        &payload,
        &[
            ("name", "name"),
            ("rate", "rate"),
            ("mainCategory", "main_category_id"),
            ("paymentType", "payment_type"),
            ("groupType", "group_type"),
            ("order", "sort_order"),
        ],
        "id",
        subcategory_id,
    )?;

    let affected = execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, subcategory_id, "Failed to update subcategory");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    if affected == 0 {
        // rows_affected is 0 for a no-op update too, so confirm absence
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM subcategories WHERE id = ?)",
        )
        .bind(subcategory_id)
        .fetch_one(pool.get_ref())
        .await
        .unwrap_or(false);

        if !exists {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "Subcategory not found"
            })));
        }
    }

    let view = fetch_subcategory_view(pool.get_ref(), subcategory_id).await?;

    match view {
        Some(v) => Ok(HttpResponse::Ok().json(v)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Subcategory not found"
        }))),
    }
}

#[utoipa::path(
    delete,
    path = "/api/subcategories/{subcategory_id}",
    params(("subcategory_id", description = "Subcategory ID")),
    responses(
        (status = 200, description = "Subcategory removed"),
        (status = 404, description = "Subcategory not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn delete_subcategory(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let subcategory_id = path.into_inner();

    let result = sqlx::query("DELETE FROM subcategories WHERE id = ?")
        .bind(subcategory_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, subcategory_id, "Failed to delete subcategory");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Subcategory not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Subcategory removed" })))
}

#[utoipa::path(
    post,
    path = "/api/subcategories/reorder",
    request_body = ReorderReq,
    responses(
        (status = 200, description = "Order updated"),
        (status = 400, description = "Invalid data")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn reorder_subcategories(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<serde_json::Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let items: ReorderReq = match serde_json::from_value(payload.into_inner()) {
        Ok(req) => req,
        Err(_) => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Invalid data"
            })));
        }
    };

    for item in &items.new_order {
        sqlx::query("UPDATE subcategories SET sort_order = ? WHERE id = ?")
            .bind(item.order)
            .bind(item.id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, subcategory_id = item.id, "Failed to reorder subcategory");
                actix_web::error::ErrorInternalServerError("Server Error")
            })?;
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Order updated" })))
}

async fn fetch_subcategory_view(
    pool: &MySqlPool,
    subcategory_id: u64,
) -> actix_web::Result<Option<SubcategoryView>> {
    let row = sqlx::query_as::<_, SubcategoryJoined>(&format!(
        "{SUBCATEGORY_JOIN} WHERE s.id = ?"
    ))
    .bind(subcategory_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        error!(error = %e, subcategory_id, "Failed to fetch subcategory");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    Ok(row.map(SubcategoryView::from))
}
