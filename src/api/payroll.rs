use std::collections::HashMap;

use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    model::{
        advance::{Advance, SettlementType, plan_deduction, recalculated_status},
        fine::{Fine, FineStatus},
        payroll::{Payroll, PayrollView},
        work_log::{WorkLog, WorkLogAdminRow},
    },
    period,
};

const PAYROLL_COLUMNS: &str = "id, employee_id, start_date, end_date, gross_amount, \
     advance_deduction, fine_deduction, total_salary, status, created_at";

#[derive(Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// "semi-monthly" or "monthly" (default)
    #[serde(rename = "type")]
    pub period_type: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct EmployeeSummaryQuery {
    /// "monthly", "secondHalf" or "firstHalf" (default)
    pub period: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeePeriodEntry {
    pub employee_id: u64,
    pub full_name: String,
    pub total_salary: f64,
    pub log_count: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub payroll: Vec<EmployeePeriodEntry>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub total_salary: f64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub period: String,
    pub work_log_count: i64,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePayroll {
    #[schema(example = 7)]
    pub employee_id: u64,
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-15", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 20000.0)]
    pub advance_deduction: Option<f64>,
    pub deduct_fines: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/payroll/current-period-summary",
    params(SummaryQuery),
    responses(
        (status = 200, body = PeriodSummary)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn current_period_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let today = period::today();
    let (start_date, end_date) = match query.period_type.as_deref() {
        Some("semi-monthly") => period::semi_monthly(today),
        _ => period::monthly(today),
    };

    let logs = sqlx::query_as::<_, WorkLogAdminRow>(
        r#"
        SELECT w.id, w.employee_id, u.full_name AS employee_name,
               w.subcategory_id, w.main_category_id, w.work_date, w.quantity,
               w.hours_worked, w.rate_at_time, w.payment_type_at_time,
               w.subcategory_name_at_time, w.payment_status, w.payment_date,
               w.location, w.edited_total_payment, w.is_admin_edited,
               w.created_at, w.updated_at
        FROM work_logs w
        JOIN users u ON u.id = w.employee_id
        WHERE w.work_date BETWEEN ? AND ?
          AND w.payment_type_at_time != 'delivery'
        "#,
    )
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch period work logs");
        actix_web::error::ErrorInternalServerError("Server error fetching salary summary.")
    })?;

    // fold per employee, keeping first-seen order
    let mut order: Vec<u64> = Vec::new();
    let mut entries: HashMap<u64, EmployeePeriodEntry> = HashMap::new();

    for log in &logs {
        let entry = entries.entry(log.employee_id).or_insert_with(|| {
            order.push(log.employee_id);
            EmployeePeriodEntry {
                employee_id: log.employee_id,
                full_name: log.employee_name.clone(),
                total_salary: 0.0,
                log_count: 0,
            }
        });
        entry.total_salary += log.salary();
        entry.log_count += 1;
    }

    let payroll: Vec<EmployeePeriodEntry> = order
        .iter()
        .filter_map(|id| entries.remove(id))
        .collect();

    Ok(HttpResponse::Ok().json(PeriodSummary {
        start_date,
        end_date,
        payroll,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/employee-summary/{employee_id}",
    params(
        ("employee_id", description = "Employee ID"),
        EmployeeSummaryQuery
    ),
    responses(
        (status = 200, body = EmployeeSummary)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn employee_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<EmployeeSummaryQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();
    let today = period::today();

    let period_name = query.period.as_deref().unwrap_or("firstHalf");
    let (start_date, end_date) = match period_name {
        "monthly" => period::monthly(today),
        "secondHalf" => period::second_half(today),
        _ => period::first_half(today),
    };

    let logs = sqlx::query_as::<_, WorkLog>(
        r#"
        SELECT id, employee_id, subcategory_id, main_category_id, work_date,
               quantity, hours_worked, rate_at_time, payment_type_at_time,
               subcategory_name_at_time, payment_status, payment_date, location,
               edited_total_payment, is_admin_edited, created_at, updated_at
        FROM work_logs
        WHERE employee_id = ? AND work_date BETWEEN ? AND ?
          AND payment_type_at_time != 'delivery'
        "#,
    )
    .bind(employee_id)
    .bind(start_date)
    .bind(end_date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch employee work logs");
        actix_web::error::ErrorInternalServerError("Server error")
    })?;

    let total_salary: f64 = logs.iter().map(WorkLog::salary).sum();

    Ok(HttpResponse::Ok().json(EmployeeSummary {
        total_salary,
        start_date,
        end_date,
        period: period_name.to_string(),
        work_log_count: logs.len() as i64,
    }))
}

#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = GeneratePayroll,
    responses(
        (status = 201, body = PayrollView),
        (status = 400, description = "No unpaid work logs in the period")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
#[instrument(
    name = "payroll_generate",
    skip(auth, pool, payload),
    fields(employee_id = payload.employee_id)
)]
pub async fn generate_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GeneratePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let today = period::today();

    // 1️⃣ Gross pay from the employee's unpaid logs in range
    let logs = sqlx::query_as::<_, WorkLog>(
        r#"
        SELECT id, employee_id, subcategory_id, main_category_id, work_date,
               quantity, hours_worked, rate_at_time, payment_type_at_time,
               subcategory_name_at_time, payment_status, payment_date, location,
               edited_total_payment, is_admin_edited, created_at, updated_at
        FROM work_logs
        WHERE employee_id = ? AND work_date BETWEEN ? AND ?
          AND payment_status = 'unpaid'
          AND payment_type_at_time != 'delivery'
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch unpaid work logs");
        actix_web::error::ErrorInternalServerError("Server error generating payroll.")
    })?;

    if logs.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "No unpaid work logs in this period"
        })));
    }

    let gross_amount: f64 = logs.iter().map(WorkLog::salary).sum();
    let log_ids: Vec<u64> = logs.iter().map(|l| l.id).collect();

    // 2️⃣ Spread the requested advance deduction across open advances
    let requested = payload.advance_deduction.unwrap_or(0.0);
    let mut advance_deduction = 0.0;

    if requested > 0.0 {
        let advances = sqlx::query_as::<_, Advance>(
            r#"
            SELECT id, employee_id, amount, paid_amount, status, date,
                   description, created_at, updated_at
            FROM advances
            WHERE employee_id = ? AND status = 'Ongoing'
            ORDER BY date, created_at
            "#,
        )
        .bind(payload.employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch open advances");
            actix_web::error::ErrorInternalServerError("Server error generating payroll.")
        })?;

        let open: Vec<(u64, f64)> = advances
            .iter()
            .map(|a| (a.id, a.amount - a.paid_amount))
            .collect();
        let plan = plan_deduction(&open, requested);

        for allocation in &plan.allocations {
            let settlement_type = if allocation.settles {
                SettlementType::Full
            } else {
                SettlementType::Partial
            };

            sqlx::query(
                r#"
                INSERT INTO advance_settlements
                (advance_id, amount, date, settlement_type, description)
                VALUES (?, ?, ?, ?, 'Payroll deduction')
                "#,
            )
            .bind(allocation.advance_id)
            .bind(allocation.amount)
            .bind(today)
            .bind(settlement_type.to_string())
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, advance_id = allocation.advance_id,
                       "Failed to record payroll settlement");
                actix_web::error::ErrorInternalServerError("Server error generating payroll.")
            })?;

            // advances list came ordered, so the allocation matches by id
            if let Some(advance) = advances.iter().find(|a| a.id == allocation.advance_id) {
                let new_paid = advance.paid_amount + allocation.amount;
                let status = recalculated_status(advance.amount, new_paid);

                sqlx::query("UPDATE advances SET paid_amount = ?, status = ? WHERE id = ?")
                    .bind(new_paid)
                    .bind(status.to_string())
                    .bind(advance.id)
                    .execute(pool.get_ref())
                    .await
                    .map_err(|e| {
                        error!(error = %e, advance_id = advance.id,
                               "Failed to update advance after deduction");
                        actix_web::error::ErrorInternalServerError(
                            "Server error generating payroll.",
                        )
                    })?;
            }
        }

        advance_deduction = plan.total;
    }

    // 3️⃣ Pending fines are cleared whole
    let mut fine_deduction = 0.0;

    if payload.deduct_fines.unwrap_or(false) {
        let fines = sqlx::query_as::<_, Fine>(
            r#"
            SELECT id, employee_id, amount, date, description, status,
                   created_at, updated_at
            FROM fines
            WHERE employee_id = ? AND status = 'Pending'
            "#,
        )
        .bind(payload.employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch pending fines");
            actix_web::error::ErrorInternalServerError("Server error generating payroll.")
        })?;

        fine_deduction = fines.iter().map(|f| f.amount).sum();

        if !fines.is_empty() {
            sqlx::query(
                "UPDATE fines SET status = ? WHERE employee_id = ? AND status = 'Pending'",
            )
            .bind(FineStatus::Deducted.to_string())
            .bind(payload.employee_id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to clear pending fines");
                actix_web::error::ErrorInternalServerError("Server error generating payroll.")
            })?;
        }
    }

    let total_salary = gross_amount - advance_deduction - fine_deduction;

    // 4️⃣ Mark the logs paid
    let placeholders = vec!["?"; log_ids.len()].join(", ");
    let mark_paid = format!(
        "UPDATE work_logs SET payment_status = 'paid', payment_date = ? WHERE id IN ({placeholders})"
    );
    let mut mark_query = sqlx::query(&mark_paid).bind(today);
    for id in &log_ids {
        mark_query = mark_query.bind(id);
    }
    mark_query.execute(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to mark work logs paid");
        actix_web::error::ErrorInternalServerError("Server error generating payroll.")
    })?;

    // 5️⃣ Persist the snapshot
    let result = sqlx::query(
        r#"
        INSERT INTO payrolls
        (employee_id, start_date, end_date, gross_amount, advance_deduction,
         fine_deduction, total_salary, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'Paid')
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(gross_amount)
    .bind(advance_deduction)
    .bind(fine_deduction)
    .bind(total_salary)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to insert payroll");
        actix_web::error::ErrorInternalServerError("Server error generating payroll.")
    })?;

    let payroll_id = result.last_insert_id();

    for log_id in &log_ids {
        sqlx::query("INSERT INTO payroll_work_logs (payroll_id, work_log_id) VALUES (?, ?)")
            .bind(payroll_id)
            .bind(log_id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, payroll_id, "Failed to link work log to payroll");
                actix_web::error::ErrorInternalServerError("Server error generating payroll.")
            })?;
    }

    let payroll = sqlx::query_as::<_, Payroll>(&format!(
        "SELECT {PAYROLL_COLUMNS} FROM payrolls WHERE id = ?"
    ))
    .bind(payroll_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, payroll_id, "Failed to fetch payroll");
        actix_web::error::ErrorInternalServerError("Server error generating payroll.")
    })?;

    info!(
        payroll_id,
        gross = gross_amount,
        advance = advance_deduction,
        fine = fine_deduction,
        net = total_salary,
        "Payroll generated"
    );

    Ok(HttpResponse::Created().json(PayrollView::from_parts(payroll, log_ids)))
}

#[utoipa::path(
    get,
    path = "/api/payroll/history/{employee_id}",
    params(("employee_id", description = "Employee ID")),
    responses(
        (status = 200, body = [PayrollView])
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payroll_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let payrolls = sqlx::query_as::<_, Payroll>(&format!(
        r#"
        SELECT {PAYROLL_COLUMNS}
        FROM payrolls
        WHERE employee_id = ?
        ORDER BY created_at DESC
        "#
    ))
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch payroll history");
        actix_web::error::ErrorInternalServerError("Server error fetching payroll history.")
    })?;

    let links = sqlx::query_as::<_, (u64, u64)>(
        r#"
        SELECT pwl.payroll_id, pwl.work_log_id
        FROM payroll_work_logs pwl
        JOIN payrolls p ON p.id = pwl.payroll_id
        WHERE p.employee_id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch payroll work logs");
        actix_web::error::ErrorInternalServerError("Server error fetching payroll history.")
    })?;

    let mut by_payroll: HashMap<u64, Vec<u64>> = HashMap::new();
    for (payroll_id, work_log_id) in links {
        by_payroll.entry(payroll_id).or_default().push(work_log_id);
    }

    let views: Vec<PayrollView> = payrolls
        .into_iter()
        .map(|p| {
            let work_logs = by_payroll.remove(&p.id).unwrap_or_default();
            PayrollView::from_parts(p, work_logs)
        })
        .collect();

    Ok(HttpResponse::Ok().json(views))
}
