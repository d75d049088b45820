use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    #[schema(example = "Aye Chan")]
    pub full_name: String,
    #[schema(example = "aye.chan@example.com", format = "email")]
    pub email: String,
    pub password: String,
    #[schema(example = "1998-04-12", value_type = Option<String>, format = "date")]
    pub birthday: Option<chrono::NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReq {
    #[schema(example = "aye.chan@example.com", format = "email")]
    pub email: String,
    pub password: String,
}

#[derive(FromRow)]
pub struct UserSql {
    pub id: u64, // matches BIGINT UNSIGNED
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub status: String,
    pub profile_picture_url: Option<String>,
    pub birthday: Option<chrono::NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String, // email
    pub role: String,
    pub exp: usize,
    pub jti: String,
}
