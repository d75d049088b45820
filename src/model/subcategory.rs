use chrono::NaiveDateTime;
use serde::Serialize;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// How one unit of work on a subcategory is paid. `Delivery` never appears
/// in the rate table itself; it marks courier logs rated at zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum PaymentType {
    PerPiece,
    PerDozen,
    PerHour,
    PerDay,
    Delivery,
}

impl PaymentType {
    /// Types assignable to a subcategory.
    pub const RATE_TABLE: [PaymentType; 4] = [
        PaymentType::PerPiece,
        PaymentType::PerDozen,
        PaymentType::PerHour,
        PaymentType::PerDay,
    ];

    pub fn is_rate_table_type(s: &str) -> bool {
        Self::RATE_TABLE.iter().any(|t| t.to_string() == s)
    }

    pub fn rate_table_types() -> String {
        Self::RATE_TABLE
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct Subcategory {
    pub id: u64,
    pub name: String,
    pub main_category_id: u64,
    pub payment_type: String,
    pub rate: f64,
    pub sort_order: i32,
    pub group_type: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Flat row from the rate-table listing join.
#[derive(Debug, sqlx::FromRow)]
pub struct SubcategoryJoined {
    pub id: u64,
    pub name: String,
    pub main_category_id: u64,
    pub main_category_name: String,
    pub payment_type: String,
    pub rate: f64,
    pub sort_order: i32,
    pub group_type: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MainCategoryRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryView {
    pub id: u64,
    pub name: String,
    pub main_category: MainCategoryRef,
    pub payment_type: String,
    pub rate: f64,
    #[serde(rename = "order")]
    pub sort_order: i32,
    pub group_type: Option<String>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}

impl From<SubcategoryJoined> for SubcategoryView {
    fn from(s: SubcategoryJoined) -> Self {
        SubcategoryView {
            id: s.id,
            name: s.name,
            main_category: MainCategoryRef {
                id: s.main_category_id,
                name: s.main_category_name,
            },
            payment_type: s.payment_type,
            rate: s.rate,
            sort_order: s.sort_order,
            group_type: s.group_type,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_type_round_trips_camel_case() {
        assert_eq!(PaymentType::PerPiece.to_string(), "perPiece");
        assert_eq!(PaymentType::PerDozen.to_string(), "perDozen");
        assert_eq!("perHour".parse::<PaymentType>().unwrap(), PaymentType::PerHour);
        assert_eq!("delivery".parse::<PaymentType>().unwrap(), PaymentType::Delivery);
        assert!("perViss".parse::<PaymentType>().is_err());
    }

    #[test]
    fn delivery_is_not_a_rate_table_type() {
        assert!(PaymentType::is_rate_table_type("perDay"));
        assert!(!PaymentType::is_rate_table_type("delivery"));
        assert_eq!(
            PaymentType::rate_table_types(),
            "perPiece, perDozen, perHour, perDay"
        );
    }
}
