use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::subcategory::PaymentType;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Na,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WorkLog {
    pub id: u64,
    pub employee_id: u64,
    pub subcategory_id: Option<u64>,
    pub main_category_id: Option<u64>,
    pub work_date: NaiveDate,
    pub quantity: f64,
    pub hours_worked: f64,
    pub rate_at_time: f64,
    pub payment_type_at_time: String,
    pub subcategory_name_at_time: String,
    pub payment_status: String,
    pub payment_date: Option<NaiveDate>,
    pub location: String,
    pub edited_total_payment: Option<f64>,
    pub is_admin_edited: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Pay for one log. An explicit admin override wins; otherwise the payment
/// type frozen at creation decides the formula. Delivery and unrecognized
/// types earn nothing.
pub fn salary_of(
    payment_type: &str,
    quantity: f64,
    hours_worked: f64,
    rate: f64,
    override_amount: Option<f64>,
) -> f64 {
    if let Some(amount) = override_amount {
        return amount;
    }

    match payment_type.parse::<PaymentType>() {
        Ok(PaymentType::PerPiece) | Ok(PaymentType::PerDozen) => quantity * rate,
        Ok(PaymentType::PerHour) => hours_worked * rate,
        Ok(PaymentType::PerDay) => rate,
        Ok(PaymentType::Delivery) | Err(_) => 0.0,
    }
}

impl WorkLog {
    pub fn salary(&self) -> f64 {
        let override_amount = if self.is_admin_edited {
            self.edited_total_payment
        } else {
            None
        };
        salary_of(
            &self.payment_type_at_time,
            self.quantity,
            self.hours_worked,
            self.rate_at_time,
            override_amount,
        )
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkLogView {
    pub id: u64,
    pub employee_id: u64,
    pub subcategory_id: Option<u64>,
    pub main_category_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub work_date: NaiveDate,
    pub quantity: f64,
    pub hours_worked: f64,
    pub rate_at_time: f64,
    pub payment_type_at_time: String,
    pub subcategory_name_at_time: String,
    pub payment_status: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub payment_date: Option<NaiveDate>,
    pub location: String,
    pub edited_total_payment: Option<f64>,
    pub is_admin_edited: bool,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}

impl From<WorkLog> for WorkLogView {
    fn from(w: WorkLog) -> Self {
        WorkLogView {
            id: w.id,
            employee_id: w.employee_id,
            subcategory_id: w.subcategory_id,
            main_category_id: w.main_category_id,
            work_date: w.work_date,
            quantity: w.quantity,
            hours_worked: w.hours_worked,
            rate_at_time: w.rate_at_time,
            payment_type_at_time: w.payment_type_at_time,
            subcategory_name_at_time: w.subcategory_name_at_time,
            payment_status: w.payment_status,
            payment_date: w.payment_date,
            location: w.location,
            edited_total_payment: w.edited_total_payment,
            is_admin_edited: w.is_admin_edited,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

/// Admin listing row carrying the employee's name alongside the log.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkLogAdminRow {
    pub id: u64,
    pub employee_id: u64,
    pub employee_name: String,
    pub subcategory_id: Option<u64>,
    pub main_category_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub work_date: NaiveDate,
    pub quantity: f64,
    pub hours_worked: f64,
    pub rate_at_time: f64,
    pub payment_type_at_time: String,
    pub subcategory_name_at_time: String,
    pub payment_status: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub payment_date: Option<NaiveDate>,
    pub location: String,
    pub edited_total_payment: Option<f64>,
    pub is_admin_edited: bool,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}

impl WorkLogAdminRow {
    pub fn salary(&self) -> f64 {
        let override_amount = if self.is_admin_edited {
            self.edited_total_payment
        } else {
            None
        };
        salary_of(
            &self.payment_type_at_time,
            self.quantity,
            self.hours_worked,
            self.rate_at_time,
            override_amount,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(payment_type: &str) -> WorkLog {
        let midnight = NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        WorkLog {
            id: 1,
            employee_id: 7,
            subcategory_id: Some(3),
            main_category_id: None,
            work_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
            quantity: 12.0,
            hours_worked: 5.5,
            rate_at_time: 200.0,
            payment_type_at_time: payment_type.to_string(),
            subcategory_name_at_time: "Collar stitching".to_string(),
            payment_status: "unpaid".to_string(),
            payment_date: None,
            location: "N/A".to_string(),
            edited_total_payment: None,
            is_admin_edited: false,
            created_at: midnight,
            updated_at: midnight,
        }
    }

    #[test]
    fn piece_and_dozen_pay_quantity_times_rate() {
        assert_eq!(log("perPiece").salary(), 2400.0);
        assert_eq!(log("perDozen").salary(), 2400.0);
    }

    #[test]
    fn hourly_pays_hours_times_rate() {
        assert_eq!(log("perHour").salary(), 1100.0);
    }

    #[test]
    fn daily_pays_flat_rate_ignoring_quantity() {
        assert_eq!(log("perDay").salary(), 200.0);
    }

    #[test]
    fn delivery_and_unknown_types_pay_nothing() {
        assert_eq!(log("delivery").salary(), 0.0);
        assert_eq!(log("perViss").salary(), 0.0);
    }

    #[test]
    fn admin_override_supersedes_formula() {
        let mut l = log("perPiece");
        l.is_admin_edited = true;
        l.edited_total_payment = Some(999.0);
        assert_eq!(l.salary(), 999.0);
    }

    #[test]
    fn admin_flag_without_amount_falls_back_to_formula() {
        let mut l = log("perPiece");
        l.is_admin_edited = true;
        l.edited_total_payment = None;
        assert_eq!(l.salary(), 2400.0);
    }
}
