use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, FromRow)]
pub struct User {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub status: String,
    pub profile_picture_url: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub last_login_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Password-free projection returned by every user-facing endpoint.
#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub profile_picture_url: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub birthday: Option<NaiveDate>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        UserView {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
            role: u.role,
            status: u.status,
            profile_picture_url: u.profile_picture_url,
            birthday: u.birthday,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Minimal shape embedded in chat payloads and summaries.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBrief {
    pub id: u64,
    pub full_name: String,
    pub profile_picture_url: Option<String>,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatListEntry {
    pub id: u64,
    pub full_name: String,
    pub profile_picture_url: Option<String>,
    pub email: String,
}
