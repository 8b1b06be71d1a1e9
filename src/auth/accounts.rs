use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::Role;
use crate::entities::{administrator, guardian, school_manager, student, supplier};
use crate::errors::ServiceError;

/// An active account of any role, reduced to what a session needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
    /// The manager's school, or the school of the guardian's student.
    pub school_id: Option<Uuid>,
}

/// Looks accounts up in the table that belongs to their role.
#[derive(Debug, Clone)]
pub struct AccountDirectory {
    db: Arc<DatabaseConnection>,
}

impl AccountDirectory {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Finds an active account by email. Emails are compared case-insensitively
    /// by normalising to lowercase on both write and read.
    #[instrument(skip(self))]
    pub async fn find_active_by_email(
        &self,
        role: Role,
        email: &str,
    ) -> Result<Option<Account>, ServiceError> {
        let email = normalize_email(email);
        let db = &*self.db;

        let account = match role {
            Role::Manager => school_manager::Entity::find()
                .filter(school_manager::Column::Email.eq(email.as_str()))
                .filter(school_manager::Column::Active.eq(true))
                .one(db)
                .await?
                .map(|m| Account {
                    id: m.id,
                    role,
                    name: m.name,
                    email: m.email,
                    school_id: Some(m.school_id),
                }),
            Role::Supplier => supplier::Entity::find()
                .filter(supplier::Column::Email.eq(email.as_str()))
                .filter(supplier::Column::Active.eq(true))
                .one(db)
                .await?
                .map(|s| Account {
                    id: s.id,
                    role,
                    name: s.name,
                    email: s.email,
                    school_id: None,
                }),
            Role::Guardian => {
                let found = guardian::Entity::find()
                    .filter(guardian::Column::Email.eq(email.as_str()))
                    .filter(guardian::Column::Active.eq(true))
                    .find_also_related(student::Entity)
                    .one(db)
                    .await?;
                found.map(|(g, s)| Account {
                    id: g.id,
                    role,
                    name: g.name,
                    email: g.email,
                    school_id: s.map(|s| s.school_id),
                })
            }
            Role::Admin => administrator::Entity::find()
                .filter(administrator::Column::Email.eq(email.as_str()))
                .filter(administrator::Column::Active.eq(true))
                .one(db)
                .await?
                .map(|a| Account {
                    id: a.id,
                    role,
                    name: a.name,
                    email: a.email,
                    school_id: None,
                }),
        };

        Ok(account)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
