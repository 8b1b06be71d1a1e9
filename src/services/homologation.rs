use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{homologation, school, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
};

fn ensure_school_manager(actor: &AuthUser, school_id: Uuid) -> Result<(), ServiceError> {
    if actor.can_manage_school(school_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Not allowed to manage school {}",
            school_id
        )))
    }
}

/// Which suppliers a school has approved to sell to its families.
#[derive(Clone)]
pub struct HomologationService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl HomologationService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Approves a supplier for a school. Re-approving reactivates the
    /// existing record and refreshes its approval time.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn approve(
        &self,
        actor: &AuthUser,
        school_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<homologation::Model, ServiceError> {
        ensure_school_manager(actor, school_id)?;

        let txn = self.db.begin().await?;

        school::Entity::find_by_id(school_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("School", school_id))?;
        let supplier = supplier::Entity::find_by_id(supplier_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Supplier", supplier_id))?;
        if !supplier.active {
            return Err(ServiceError::InvalidInput(format!(
                "Supplier {} is inactive",
                supplier.name
            )));
        }

        let existing = homologation::Entity::find()
            .filter(homologation::Column::SchoolId.eq(school_id))
            .filter(homologation::Column::SupplierId.eq(supplier_id))
            .one(&txn)
            .await?;

        let record = match existing {
            Some(current) => {
                let mut active: homologation::ActiveModel = current.into();
                active.active = Set(true);
                active.approved_at = Set(Utc::now());
                active.update(&txn).await?
            }
            None => {
                homologation::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    school_id: Set(school_id),
                    supplier_id: Set(supplier_id),
                    active: Set(true),
                    approved_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?
            }
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::SupplierHomologated {
                school_id,
                supplier_id,
            })
            .await;
        info!(%school_id, %supplier_id, "supplier approved for school");
        Ok(record)
    }

    /// Withdraws an approval. The record is kept, inactive.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn revoke(
        &self,
        actor: &AuthUser,
        school_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<homologation::Model, ServiceError> {
        ensure_school_manager(actor, school_id)?;

        let current = homologation::Entity::find()
            .filter(homologation::Column::SchoolId.eq(school_id))
            .filter(homologation::Column::SupplierId.eq(supplier_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Supplier {} was never approved for school {}",
                    supplier_id, school_id
                ))
            })?;

        let mut active: homologation::ActiveModel = current.into();
        active.active = Set(false);
        let record = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::HomologationRevoked {
                school_id,
                supplier_id,
            })
            .await;
        Ok(record)
    }

    pub async fn is_approved(&self, school_id: Uuid, supplier_id: Uuid) -> Result<bool, ServiceError> {
        let found = homologation::Entity::find()
            .filter(homologation::Column::SchoolId.eq(school_id))
            .filter(homologation::Column::SupplierId.eq(supplier_id))
            .filter(homologation::Column::Active.eq(true))
            .one(&*self.db)
            .await?;
        Ok(found.is_some())
    }

    pub(crate) async fn approved_supplier_ids(
        &self,
        school_id: Uuid,
    ) -> Result<HashSet<Uuid>, ServiceError> {
        let ids = homologation::Entity::find()
            .filter(homologation::Column::SchoolId.eq(school_id))
            .filter(homologation::Column::Active.eq(true))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|h| h.supplier_id)
            .collect();
        Ok(ids)
    }

    /// Active suppliers currently approved for the school, by name.
    pub async fn list_approved(&self, school_id: Uuid) -> Result<Vec<supplier::Model>, ServiceError> {
        let ids = self.approved_supplier_ids(school_id).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let suppliers = supplier::Entity::find()
            .filter(supplier::Column::Id.is_in(ids))
            .filter(supplier::Column::Active.eq(true))
            .order_by_asc(supplier::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(suppliers)
    }

    /// Active suppliers the school could still approve, by name.
    pub async fn list_available(&self, school_id: Uuid) -> Result<Vec<supplier::Model>, ServiceError> {
        let approved = self.approved_supplier_ids(school_id).await?;
        let suppliers = supplier::Entity::find()
            .filter(supplier::Column::Active.eq(true))
            .order_by_asc(supplier::Column::Name)
            .all(&*self.db)
            .await?
            .into_iter()
            .filter(|s| !approved.contains(&s.id))
            .collect();
        Ok(suppliers)
    }
}
