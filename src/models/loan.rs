//! Loan model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use super::book::BookSummary;
use super::id::{BookId, LoanId, UserId};
use super::user::UserSummary;

/// Loan lifecycle state. `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "returned" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// Stored as TEXT
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan record. Never deleted; a returned loan stays as an audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: LoanId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_at < now
    }
}

/// Loan enriched with read-only projections for listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    pub loan: Loan,
    /// None when the book no longer exists in the catalog
    pub book: Option<BookSummary>,
    /// Only present in the administrator listing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    pub is_overdue: bool,
}

/// Administrator request to issue a loan on a user's behalf
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AdminIssue {
    #[validate(range(min = 1, message = "book_id must be positive"))]
    pub book_id: i64,
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: i64,
    /// Due date (ISO 8601), must be in the future
    pub due_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(status: LoanStatus, due_in_days: i64) -> Loan {
        let now = Utc::now();
        Loan {
            id: LoanId(1),
            book_id: BookId(2),
            user_id: UserId(3),
            issued_at: now,
            due_at: now + Duration::days(due_in_days),
            returned_at: None,
            status,
        }
    }

    #[test]
    fn test_overdue_only_when_active_and_past_due() {
        let now = Utc::now();
        assert!(loan(LoanStatus::Active, -1).is_overdue(now));
        assert!(!loan(LoanStatus::Active, 1).is_overdue(now));
        assert!(!loan(LoanStatus::Returned, -1).is_overdue(now));
    }

    #[test]
    fn test_status_text_form() {
        assert_eq!("returned".parse::<LoanStatus>(), Ok(LoanStatus::Returned));
        assert!("lost".parse::<LoanStatus>().is_err());
        assert_eq!(serde_json::to_value(LoanStatus::Active).unwrap(), "active");
    }

    #[test]
    fn test_admin_issue_rejects_non_positive_ids() {
        let request = AdminIssue {
            book_id: 0,
            user_id: 4,
            due_at: Utc::now(),
        };
        assert!(request.validate().is_err());
    }
}
