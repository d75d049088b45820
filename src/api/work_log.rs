use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    model::{
        subcategory::{PaymentType, Subcategory},
        work_log::{PaymentStatus, WorkLog, WorkLogAdminRow, WorkLogView},
    },
    period,
    utils::db_utils::{build_update_sql, execute_update},
};

const WORK_LOG_COLUMNS: &str = "id, employee_id, subcategory_id, main_category_id, \
     work_date, quantity, hours_worked, rate_at_time, payment_type_at_time, \
     subcategory_name_at_time, payment_status, payment_date, location, \
     edited_total_payment, is_admin_edited, created_at, updated_at";

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkLog {
    #[schema(example = 12)]
    pub subcategory_id: Option<u64>,
    #[schema(example = 24.0)]
    pub quantity: Option<f64>,
    #[schema(example = 7.5)]
    pub hours_worked: Option<f64>,
    #[schema(example = "2026-03-10", value_type = Option<String>, format = "date")]
    pub work_date: Option<NaiveDate>,
    pub location: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryLog {
    pub main_category_id: Option<u64>,
    #[schema(example = "Fabric run to the 28th street shop")]
    pub description: Option<String>,
    #[schema(example = 3.0)]
    pub quantity: Option<f64>,
    #[schema(example = "2026-03-10", value_type = Option<String>, format = "date")]
    pub work_date: Option<NaiveDate>,
    pub location: Option<String>,
}

/// Date filters shared by the admin and personal listings. The first
/// matching filter wins; later ones are ignored.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct WorkLogFilter {
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub custom_date: Option<String>,
    pub custom_month: Option<String>,
    pub selected_year: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSalary {
    pub total_salary: f64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

/// Filter precedence: customDate > customMonth > selectedYear >
/// startDate+endDate > period. Unparseable values fall through to the
/// next filter; `period=all` and unknown periods mean no date bound.
pub fn resolve_range(
    filter: &WorkLogFilter,
    today: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    if let Some(date) = parse_date(filter.custom_date.as_deref()) {
        return Some(period::single_day(date));
    }

    if let Some((year, month)) = parse_month(filter.custom_month.as_deref()) {
        if let Some(range) = period::month_range(year, month) {
            return Some(range);
        }
    }

    if let Some(year) = parse_year(filter.selected_year.as_deref()) {
        if let Some(range) = period::year_range(year) {
            return Some(range);
        }
    }

    if let (Some(start), Some(end)) = (
        parse_date(filter.start_date.as_deref()),
        parse_date(filter.end_date.as_deref()),
    ) {
        return Some((start, end));
    }

    match filter.period.as_deref() {
        Some("day") => Some(period::single_day(today)),
        Some("month") => Some(period::monthly(today)),
        Some("year") => period::year_range(today.year()),
        _ => None,
    }
}

fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}

fn parse_month(value: Option<&str>) -> Option<(i32, u32)> {
    let (year, month) = value?.split_once('-')?;
    Some((year.parse().ok()?, month.parse().ok()?))
}

fn parse_year(value: Option<&str>) -> Option<i32> {
    value.and_then(|v| v.parse().ok())
}

#[utoipa::path(
    post,
    path = "/api/worklogs",
    request_body = CreateWorkLog,
    responses(
        (status = 201, body = WorkLogView),
        (status = 400, description = "Subcategory ID or work date missing"),
        (status = 404, description = "Subcategory not found")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLogs"
)]
pub async fn create_work_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWorkLog>,
) -> actix_web::Result<impl Responder> {
    let (subcategory_id, work_date) = match (payload.subcategory_id, payload.work_date) {
        (Some(s), Some(d)) => (s, d),
        _ => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Subcategory ID and work date are required"
            })));
        }
    };

    let subcat = sqlx::query_as::<_, Subcategory>(
        r#"
        SELECT id, name, main_category_id, payment_type, rate, sort_order,
               group_type, created_at, updated_at
        FROM subcategories
        WHERE id = ?
        "#,
    )
    .bind(subcategory_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, subcategory_id, "Failed to fetch subcategory");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let subcat = match subcat {
        Some(s) => s,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "Subcategory not found"
            })));
        }
    };

    // freeze the rate table values so later edits never change past pay
    let payment_type = subcat.payment_type.parse::<PaymentType>().ok();
    let quantity = match payment_type {
        Some(PaymentType::PerPiece) | Some(PaymentType::PerDozen) => {
            payload.quantity.unwrap_or(0.0)
        }
        _ => 0.0,
    };
    let hours_worked = match payment_type {
        Some(PaymentType::PerHour) => payload.hours_worked.unwrap_or(0.0),
        _ => 0.0,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO work_logs
        (employee_id, subcategory_id, work_date, quantity, hours_worked,
         rate_at_time, payment_type_at_time, subcategory_name_at_time,
         payment_status, location)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(subcat.id)
    .bind(work_date)
    .bind(quantity)
    .bind(hours_worked)
    .bind(subcat.rate)
    .bind(&subcat.payment_type)
    .bind(&subcat.name)
    .bind(PaymentStatus::Unpaid.to_string())
    .bind(payload.location.as_deref().unwrap_or("N/A"))
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create work log");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let log = fetch_work_log(pool.get_ref(), result.last_insert_id()).await?;

    match log {
        Some(l) => Ok(HttpResponse::Created().json(WorkLogView::from(l))),
        None => Ok(HttpResponse::InternalServerError().json(json!({
            "message": "Server Error"
        }))),
    }
}

#[utoipa::path(
    post,
    path = "/api/worklogs/delivery",
    request_body = CreateDeliveryLog,
    responses(
        (status = 201, body = WorkLogView),
        (status = 400, description = "Description or work date missing")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLogs"
)]
pub async fn create_delivery_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDeliveryLog>,
) -> actix_web::Result<impl Responder> {
    let description = payload
        .description
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    let work_date = match payload.work_date {
        Some(d) if !description.is_empty() => d,
        _ => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Description and work date are required"
            })));
        }
    };

    // deliveries carry no rate and never enter payroll
    let result = sqlx::query(
        r#"
        INSERT INTO work_logs
        (employee_id, main_category_id, work_date, quantity, rate_at_time,
         payment_type_at_time, subcategory_name_at_time, payment_status, location)
        VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.main_category_id)
    .bind(work_date)
    .bind(payload.quantity.unwrap_or(0.0))
    .bind(PaymentType::Delivery.to_string())
    .bind(description)
    .bind(PaymentStatus::Na.to_string())
    .bind(payload.location.as_deref().unwrap_or("N/A"))
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create delivery log");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let log = fetch_work_log(pool.get_ref(), result.last_insert_id()).await?;

    match log {
        Some(l) => Ok(HttpResponse::Created().json(WorkLogView::from(l))),
        None => Ok(HttpResponse::InternalServerError().json(json!({
            "message": "Server Error"
        }))),
    }
}

#[utoipa::path(
    get,
    path = "/api/worklogs/all",
    params(WorkLogFilter),
    responses(
        (status = 200, body = [WorkLogAdminRow])
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLogs"
)]
pub async fn list_all_work_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    filter: web::Query<WorkLogFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let range = resolve_range(&filter, period::today());

    let mut sql = String::from(
        r#"
        SELECT w.id, w.employee_id, u.full_name AS employee_name,
               w.subcategory_id, w.main_category_id, w.work_date, w.quantity,
               w.hours_worked, w.rate_at_time, w.payment_type_at_time,
               w.subcategory_name_at_time, w.payment_status, w.payment_date,
               w.location, w.edited_total_payment, w.is_admin_edited,
               w.created_at, w.updated_at
        FROM work_logs w
        JOIN users u ON u.id = w.employee_id
        "#,
    );
    if range.is_some() {
        sql.push_str(" WHERE w.work_date BETWEEN ? AND ?");
    }
    sql.push_str(" ORDER BY w.work_date DESC, w.created_at DESC");

    let mut query = sqlx::query_as::<_, WorkLogAdminRow>(&sql);
    if let Some((start, end)) = range {
        query = query.bind(start).bind(end);
    }

    let logs = query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to fetch work logs");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    Ok(HttpResponse::Ok().json(logs))
}

#[utoipa::path(
    get,
    path = "/api/worklogs/my-logs",
    params(WorkLogFilter),
    responses(
        (status = 200, body = [WorkLogView])
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLogs"
)]
pub async fn my_work_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    filter: web::Query<WorkLogFilter>,
) -> actix_web::Result<impl Responder> {
    let range = resolve_range(&filter, period::today());

    let mut sql = format!(
        "SELECT {WORK_LOG_COLUMNS} FROM work_logs WHERE employee_id = ?"
    );
    if range.is_some() {
        sql.push_str(" AND work_date BETWEEN ? AND ?");
    }
    sql.push_str(" ORDER BY work_date DESC, created_at DESC");

    let mut query = sqlx::query_as::<_, WorkLog>(&sql).bind(auth.user_id);
    if let Some((start, end)) = range {
        query = query.bind(start).bind(end);
    }

    let logs = query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to fetch work logs");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let views: Vec<WorkLogView> = logs.into_iter().map(WorkLogView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    get,
    path = "/api/worklogs/current-salary",
    responses(
        (status = 200, body = CurrentSalary)
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLogs"
)]
pub async fn current_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let (start_date, end_date) = period::semi_monthly(period::today());

    let logs = sqlx::query_as::<_, WorkLog>(&format!(
        r#"
        SELECT {WORK_LOG_COLUMNS}
        FROM work_logs
        WHERE employee_id = ? AND work_date BETWEEN ? AND ?
        "#
    ))
    .bind(auth.user_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch work logs for salary");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let total_salary: f64 = logs.iter().map(WorkLog::salary).sum();

    Ok(HttpResponse::Ok().json(CurrentSalary {
        total_salary,
        start_date,
        end_date,
    }))
}

#[utoipa::path(
    put,
    path = "/api/worklogs/{log_id}",
    request_body = serde_json::Value,
    params(("log_id", description = "Work log ID")),
    responses(
        (status = 200, body = WorkLogView),
        (status = 400, description = "Unknown field or invalid payment status"),
        (status = 404, description = "Work log not found")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLogs"
)]
pub async fn update_work_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<serde_json::Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let log_id = path.into_inner();
    let mut payload = payload.into_inner();

    if let Some(status) = payload.get("paymentStatus").and_then(|v| v.as_str()) {
        if status.parse::<PaymentStatus>().is_err() {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Invalid payment status"
            })));
        }
    }

    let mut allowed: Vec<(&str, &str)> = vec![
        ("quantity", "quantity"),
        ("hoursWorked", "hours_worked"),
        ("workDate", "work_date"),
        ("location", "location"),
        ("paymentStatus", "payment_status"),
        ("paymentDate", "payment_date"),
        ("editedTotalPayment", "edited_total_payment"),
    ];

    // an explicit override amount flips the audit flag with it
    if let Some(obj) = payload.as_object_mut() {
        if let Some(edited) = obj.get("editedTotalPayment") {
            let flagged = !edited.is_null();
            obj.insert("isAdminEdited".to_string(), json!(flagged));
            allowed.push(("isAdminEdited", "is_admin_edited"));
        }
    }

    let update = build_update_sql("work_logs", &payload, &allowed, "id", log_id)?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, log_id, "Failed to update work log");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let log = fetch_work_log(pool.get_ref(), log_id).await?;

    match log {
        Some(l) => Ok(HttpResponse::Ok().json(WorkLogView::from(l))),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Work log not found"
        }))),
    }
}

#[utoipa::path(
    delete,
    path = "/api/worklogs/{log_id}",
    params(("log_id", description = "Work log ID")),
    responses(
        (status = 200, description = "Work log removed"),
        (status = 404, description = "Work log not found")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLogs"
)]
pub async fn delete_work_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let log_id = path.into_inner();

    let result = sqlx::query("DELETE FROM work_logs WHERE id = ?")
        .bind(log_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, log_id, "Failed to delete work log");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Work log not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Work log removed" })))
}

async fn fetch_work_log(pool: &MySqlPool, log_id: u64) -> actix_web::Result<Option<WorkLog>> {
    sqlx::query_as::<_, WorkLog>(&format!(
        "SELECT {WORK_LOG_COLUMNS} FROM work_logs WHERE id = ?"
    ))
    .bind(log_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        error!(error = %e, log_id, "Failed to fetch work log");
        actix_web::error::ErrorInternalServerError("Server Error")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn filter() -> WorkLogFilter {
        WorkLogFilter::default()
    }

    #[test]
    fn custom_date_wins_over_everything() {
        let f = WorkLogFilter {
            custom_date: Some("2026-03-05".into()),
            custom_month: Some("2026-01".into()),
            period: Some("year".into()),
            ..filter()
        };
        assert_eq!(
            resolve_range(&f, d(2026, 8, 21)),
            Some((d(2026, 3, 5), d(2026, 3, 5)))
        );
    }

    #[test]
    fn custom_month_expands_to_the_calendar_month() {
        let f = WorkLogFilter {
            custom_month: Some("2026-02".into()),
            ..filter()
        };
        assert_eq!(
            resolve_range(&f, d(2026, 8, 21)),
            Some((d(2026, 2, 1), d(2026, 2, 28)))
        );
    }

    #[test]
    fn selected_year_beats_explicit_range() {
        let f = WorkLogFilter {
            selected_year: Some("2025".into()),
            start_date: Some("2026-01-01".into()),
            end_date: Some("2026-01-31".into()),
            ..filter()
        };
        assert_eq!(
            resolve_range(&f, d(2026, 8, 21)),
            Some((d(2025, 1, 1), d(2025, 12, 31)))
        );
    }

    #[test]
    fn explicit_range_requires_both_ends() {
        let f = WorkLogFilter {
            start_date: Some("2026-01-01".into()),
            ..filter()
        };
        assert_eq!(resolve_range(&f, d(2026, 8, 21)), None);

        let f = WorkLogFilter {
            start_date: Some("2026-01-01".into()),
            end_date: Some("2026-01-31".into()),
            ..filter()
        };
        assert_eq!(
            resolve_range(&f, d(2026, 8, 21)),
            Some((d(2026, 1, 1), d(2026, 1, 31)))
        );
    }

    #[test]
    fn period_keywords_resolve_against_today() {
        let today = d(2026, 8, 21);

        let f = WorkLogFilter { period: Some("day".into()), ..filter() };
        assert_eq!(resolve_range(&f, today), Some((today, today)));

        let f = WorkLogFilter { period: Some("month".into()), ..filter() };
        assert_eq!(resolve_range(&f, today), Some((d(2026, 8, 1), d(2026, 8, 31))));

        let f = WorkLogFilter { period: Some("year".into()), ..filter() };
        assert_eq!(resolve_range(&f, today), Some((d(2026, 1, 1), d(2026, 12, 31))));
    }

    #[test]
    fn all_and_unknown_periods_mean_no_bound() {
        let f = WorkLogFilter { period: Some("all".into()), ..filter() };
        assert_eq!(resolve_range(&f, d(2026, 8, 21)), None);

        let f = WorkLogFilter { period: Some("fortnight".into()), ..filter() };
        assert_eq!(resolve_range(&f, d(2026, 8, 21)), None);

        assert_eq!(resolve_range(&filter(), d(2026, 8, 21)), None);
    }

    #[test]
    fn garbage_values_fall_through_to_the_next_filter() {
        let f = WorkLogFilter {
            custom_date: Some("not-a-date".into()),
            custom_month: Some("2026-13".into()),
            selected_year: Some("twenty".into()),
            period: Some("day".into()),
            ..filter()
        };
        let today = d(2026, 8, 21);
        assert_eq!(resolve_range(&f, today), Some((today, today)));
    }
}
