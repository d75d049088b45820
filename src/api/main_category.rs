use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

use crate::{auth::auth::AuthUser, model::main_category::MainCategory};

#[derive(Deserialize, ToSchema)]
pub struct CreateMainCategory {
    #[schema(example = "Sewing")]
    pub name: String,
}

#[utoipa::path(
    get,
    path = "/api/main-categories",
    responses(
        (status = 200, body = [MainCategory])
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn list_main_categories(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let categories = sqlx::query_as::<_, MainCategory>(
        "SELECT id, name, created_at, updated_at FROM main_categories ORDER BY name",
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch main categories");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    Ok(HttpResponse::Ok().json(categories))
}

#[utoipa::path(
    post,
    path = "/api/main-categories",
    request_body = CreateMainCategory,
    responses(
        (status = 201, body = MainCategory),
        (status = 400, description = "Name missing")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn create_main_category(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateMainCategory>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Name is required"
        })));
    }

    let result = sqlx::query("INSERT INTO main_categories (name) VALUES (?)")
        .bind(name)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create main category");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    let category = sqlx::query_as::<_, MainCategory>(
        "SELECT id, name, created_at, updated_at FROM main_categories WHERE id = ?",
    )
    .bind(result.last_insert_id())
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch created main category");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    Ok(HttpResponse::Created().json(category))
}

#[utoipa::path(
    delete,
    path = "/api/main-categories/{category_id}",
    params(("category_id", description = "Main category ID")),
    responses(
        (status = 200, description = "Category and its subcategories removed"),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn delete_main_category(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let category_id = path.into_inner();

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM main_categories WHERE id = ?)",
    )
    .bind(category_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, category_id, "Failed to look up main category");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    if !exists {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Category not found"
        })));
    }

    // subcategories first, the FK blocks the category delete otherwise
    sqlx::query("DELETE FROM subcategories WHERE main_category_id = ?")
        .bind(category_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, category_id, "Failed to delete subcategories");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    sqlx::query("DELETE FROM main_categories WHERE id = ?")
        .bind(category_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, category_id, "Failed to delete main category");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Main Category and its subcategories removed"
    })))
}
