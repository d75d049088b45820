use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, sqlx::FromRow)]
pub struct Payroll {
    pub id: u64,
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub gross_amount: f64,
    pub advance_deduction: f64,
    pub fine_deduction: f64,
    pub total_salary: f64,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Deductions {
    pub advance: f64,
    pub fine: f64,
}

/// Persisted snapshot of one employee's net pay for one period.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollView {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub gross_amount: f64,
    pub deductions: Deductions,
    pub total_salary: f64,
    pub status: String,
    pub work_logs: Vec<u64>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
}

impl PayrollView {
    pub fn from_parts(p: Payroll, work_logs: Vec<u64>) -> Self {
        PayrollView {
            id: p.id,
            employee_id: p.employee_id,
            start_date: p.start_date,
            end_date: p.end_date,
            gross_amount: p.gross_amount,
            deductions: Deductions {
                advance: p.advance_deduction,
                fine: p.fine_deduction,
            },
            total_salary: p.total_salary,
            status: p.status,
            work_logs,
            created_at: p.created_at,
        }
    }
}
