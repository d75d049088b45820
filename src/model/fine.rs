use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Pending fines wait for the next payroll run to be deducted.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
pub enum FineStatus {
    Pending,
    Deducted,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fine {
    pub id: u64,
    pub employee_id: u64,
    pub amount: f64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub description: Option<String>,
    pub status: String,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}
