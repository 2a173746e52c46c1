//! User projection lookups for the PostgreSQL store

use async_trait::async_trait;

use super::{postgres::PgUnitOfWork, UserDirectory};
use crate::{
    error::AppResult,
    models::{id::UserId, user::UserSummary},
};

#[async_trait]
impl UserDirectory for PgUnitOfWork {
    async fn find_user(&mut self, user_id: UserId) -> AppResult<Option<UserSummary>> {
        let user = sqlx::query_as::<_, UserSummary>("SELECT id, username, role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }
}
