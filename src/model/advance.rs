use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::user::UserBrief;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
pub enum AdvanceStatus {
    Ongoing,
    Settled,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
pub enum SettlementType {
    Partial,
    Full,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Advance {
    pub id: u64,
    pub employee_id: u64,
    pub amount: f64,
    pub paid_amount: f64,
    pub status: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub id: u64,
    pub advance_id: u64,
    pub amount: f64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub settlement_type: String,
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceView {
    pub id: u64,
    pub employee_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee: Option<UserBrief>,
    pub amount: f64,
    pub paid_amount: f64,
    pub status: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub description: Option<String>,
    pub settlements: Vec<Settlement>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}

impl AdvanceView {
    pub fn from_parts(a: Advance, employee: Option<UserBrief>, settlements: Vec<Settlement>) -> Self {
        AdvanceView {
            id: a.id,
            employee_id: a.employee_id,
            employee,
            amount: a.amount,
            paid_amount: a.paid_amount,
            status: a.status,
            date: a.date,
            description: a.description,
            settlements,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// Status an advance should carry after its settlements change.
pub fn recalculated_status(amount: f64, paid_amount: f64) -> AdvanceStatus {
    if paid_amount >= amount {
        AdvanceStatus::Settled
    } else {
        AdvanceStatus::Ongoing
    }
}

#[derive(Debug, PartialEq)]
pub struct Allocation {
    pub advance_id: u64,
    pub amount: f64,
    /// True when this allocation clears the advance entirely.
    pub settles: bool,
}

#[derive(Debug, Default)]
pub struct DeductionPlan {
    pub total: f64,
    pub allocations: Vec<Allocation>,
}

/// Spread a requested payroll deduction across open advances, oldest first.
/// Each advance gives up at most its remaining balance, so the plan total is
/// min(requested, sum of positive balances) and no balance goes negative.
/// `open` is (advance id, remaining balance) ordered by advance date.
pub fn plan_deduction(open: &[(u64, f64)], requested: f64) -> DeductionPlan {
    let mut remaining = if requested.is_finite() && requested > 0.0 {
        requested
    } else {
        0.0
    };

    let mut plan = DeductionPlan::default();
    for &(advance_id, balance) in open {
        if remaining <= 0.0 {
            break;
        }
        if balance <= 0.0 {
            continue;
        }
        let take = remaining.min(balance);
        plan.allocations.push(Allocation {
            advance_id,
            amount: take,
            settles: take >= balance,
        });
        plan.total += take;
        remaining -= take;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduction_takes_oldest_first() {
        let plan = plan_deduction(&[(1, 500.0), (2, 300.0)], 600.0);
        assert_eq!(plan.total, 600.0);
        assert_eq!(
            plan.allocations,
            vec![
                Allocation { advance_id: 1, amount: 500.0, settles: true },
                Allocation { advance_id: 2, amount: 100.0, settles: false },
            ]
        );
    }

    #[test]
    fn deduction_caps_at_sum_of_balances() {
        let plan = plan_deduction(&[(1, 200.0), (2, 100.0)], 10_000.0);
        assert_eq!(plan.total, 300.0);
        assert!(plan.allocations.iter().all(|a| a.settles));
    }

    #[test]
    fn deduction_never_drives_a_balance_negative() {
        let plan = plan_deduction(&[(1, 250.0)], 400.0);
        assert_eq!(plan.total, 250.0);
        assert_eq!(plan.allocations[0].amount, 250.0);
    }

    #[test]
    fn zero_or_negative_requests_deduct_nothing() {
        assert_eq!(plan_deduction(&[(1, 500.0)], 0.0).total, 0.0);
        assert_eq!(plan_deduction(&[(1, 500.0)], -50.0).total, 0.0);
        assert!(plan_deduction(&[(1, 500.0)], f64::NAN).allocations.is_empty());
    }

    #[test]
    fn overpaid_records_are_skipped() {
        let plan = plan_deduction(&[(1, -25.0), (2, 80.0)], 100.0);
        assert_eq!(plan.total, 80.0);
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].advance_id, 2);
    }

    #[test]
    fn settled_threshold_flips_status() {
        assert_eq!(recalculated_status(500.0, 499.99), AdvanceStatus::Ongoing);
        assert_eq!(recalculated_status(500.0, 500.0), AdvanceStatus::Settled);
        assert_eq!(recalculated_status(500.0, 650.0), AdvanceStatus::Settled);
    }
}
