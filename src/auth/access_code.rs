use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::accounts::normalize_email;
use super::{Account, AccountDirectory, AuthService, Role, SessionToken};
use crate::entities::access_code;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Hands a freshly issued login code to its owner. Email delivery itself is
/// outside this crate; deployments plug their sender in here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(
        &self,
        account: &Account,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;
}

/// Writes codes to the log. Suitable for development only.
#[derive(Debug, Default, Clone)]
pub struct LoggingCodeDelivery;

#[async_trait]
impl CodeDelivery for LoggingCodeDelivery {
    async fn deliver(
        &self,
        account: &Account,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        info!(email = %account.email, role = %account.role, %code, %expires_at, "login code issued");
        Ok(())
    }
}

/// What the caller learns about an issued code. The code itself only
/// travels through [`CodeDelivery`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssuedCode {
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Clone)]
pub struct AccessCodeService {
    db: Arc<DatabaseConnection>,
    directory: AccountDirectory,
    auth: Arc<AuthService>,
    delivery: Arc<dyn CodeDelivery>,
    event_sender: Arc<EventSender>,
    code_length: usize,
    ttl: Duration,
}

impl AccessCodeService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: Arc<AuthService>,
        delivery: Arc<dyn CodeDelivery>,
        event_sender: Arc<EventSender>,
        code_length: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            directory: AccountDirectory::new(db.clone()),
            db,
            auth,
            delivery,
            event_sender,
            code_length,
            ttl,
        }
    }

    /// Issues a new login code for an active account, invalidating any code
    /// the email still had outstanding.
    #[instrument(skip(self))]
    pub async fn issue(&self, email: &str, role: Role) -> Result<IssuedCode, ServiceError> {
        let account = self
            .directory
            .find_active_by_email(role, email)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No active {} account for {}", role, email))
            })?;

        let code = generate_code(self.code_length);
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.ttl)
            .map_err(|_| ServiceError::InternalError("Invalid code lifetime".to_string()))?;
        let expires_at = now + ttl;

        let txn = self.db.begin().await?;

        access_code::Entity::update_many()
            .col_expr(access_code::Column::Used, Expr::value(true))
            .filter(access_code::Column::Email.eq(account.email.as_str()))
            .filter(access_code::Column::Used.eq(false))
            .exec(&txn)
            .await?;

        access_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(account.email.clone()),
            code: Set(code.clone()),
            role: Set(role),
            expires_at: Set(expires_at),
            used: Set(false),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        self.delivery.deliver(&account, &code, expires_at).await?;

        self.event_sender
            .send_or_log(Event::AccessCodeIssued {
                email: account.email.clone(),
                role,
            })
            .await;

        Ok(IssuedCode {
            email: account.email,
            role,
            expires_at,
        })
    }

    /// Exchanges a valid code for a session token. A code works once.
    #[instrument(skip(self, code))]
    pub async fn redeem(&self, email: &str, code: &str) -> Result<SessionToken, ServiceError> {
        let email = normalize_email(email);
        let code = code.trim().to_uppercase();
        let now = Utc::now();

        let stored = access_code::Entity::find()
            .filter(access_code::Column::Email.eq(email.as_str()))
            .filter(access_code::Column::Code.eq(code.as_str()))
            .filter(access_code::Column::Used.eq(false))
            .filter(access_code::Column::ExpiresAt.gt(now))
            .order_by_desc(access_code::Column::CreatedAt)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid or expired code".to_string()))?;

        // Claim the code; a concurrent redeem of the same code loses here.
        let claimed = access_code::Entity::update_many()
            .col_expr(access_code::Column::Used, Expr::value(true))
            .filter(access_code::Column::Id.eq(stored.id))
            .filter(access_code::Column::Used.eq(false))
            .exec(&*self.db)
            .await?;
        if claimed.rows_affected != 1 {
            warn!(email = %email, "login code redeemed concurrently");
            return Err(ServiceError::Unauthorized(
                "Invalid or expired code".to_string(),
            ));
        }

        let account = self
            .directory
            .find_active_by_email(stored.role, &email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Account is not active".to_string()))?;

        let token = self.auth.generate_token(&account)?;
        info!(actor_id = %account.id, role = %account.role, "session started");
        Ok(token)
    }

    /// Deletes used and expired codes. Returns how many rows went away.
    pub async fn purge_expired(&self) -> Result<u64, ServiceError> {
        let result = access_code::Entity::delete_many()
            .filter(
                Condition::any()
                    .add(access_code::Column::ExpiresAt.lt(Utc::now()))
                    .add(access_code::Column::Used.eq(true)),
            )
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_use_the_expected_alphabet() {
        for length in [4, 6, 12] {
            let code = generate_code(length);
            assert_eq!(code.len(), length);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn mock_delivery_receives_code_and_account() {
        let account = Account {
            id: Uuid::new_v4(),
            role: Role::Supplier,
            name: "Malharia Sul".into(),
            email: "vendas@malharia.example".into(),
            school_id: None,
        };

        let mut delivery = MockCodeDelivery::new();
        delivery
            .expect_deliver()
            .withf(|acc, code, _| acc.role == Role::Supplier && code.len() == 6)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let code = generate_code(6);
        delivery
            .deliver(&account, &code, Utc::now())
            .await
            .unwrap();
    }
}
