use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    entities::{product, product_variant},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Lowers a variant's stock by `quantity` only if enough is on hand.
///
/// Runs as a single conditional `UPDATE`, so two callers can never both take
/// the last unit. Returns `false` when the guard failed (or the variant does
/// not exist). Accepts any connection so it can join an open transaction.
pub async fn decrement_stock<C>(conn: &C, variant_id: Uuid, quantity: i32) -> Result<bool, ServiceError>
where
    C: ConnectionTrait,
{
    if quantity <= 0 {
        return Err(ServiceError::InvalidInput(format!(
            "Quantity to decrement must be positive, got {}",
            quantity
        )));
    }

    let result = product_variant::Entity::update_many()
        .col_expr(
            product_variant::Column::StockQuantity,
            Expr::col(product_variant::Column::StockQuantity).sub(quantity),
        )
        .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_variant::Column::Id.eq(variant_id))
        .filter(product_variant::Column::StockQuantity.gte(quantity))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// Suppliers may only touch their own products; admins may touch any.
pub(crate) fn ensure_product_owner(
    actor: &AuthUser,
    product: &product::Model,
) -> Result<(), ServiceError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Supplier if actor.actor_id == product.supplier_id => Ok(()),
        _ => Err(ServiceError::Forbidden(format!(
            "Product {} belongs to another supplier",
            product.id
        ))),
    }
}

/// Attributes of a variant to add to a product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewVariant {
    pub size: String,
    pub color: String,
    pub gender: String,
    pub initial_quantity: i32,
}

/// Result of [`InventoryService::add_variant`]. `merged` is set when an
/// identical variant already existed and only its stock grew.
#[derive(Debug, Clone)]
pub struct AddedVariant {
    pub variant: product_variant::Model,
    pub merged: bool,
}

/// Per-variant stock counters.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Standalone conditional decrement on the service's own connection.
    pub async fn decrement_stock(&self, variant_id: Uuid, quantity: i32) -> Result<bool, ServiceError> {
        decrement_stock(&*self.db, variant_id, quantity).await
    }

    #[instrument(skip(self))]
    pub async fn get_variant(&self, variant_id: Uuid) -> Result<product_variant::Model, ServiceError> {
        product_variant::Entity::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Variant", variant_id))
    }

    /// Variants of a product ordered by gender, then size.
    #[instrument(skip(self))]
    pub async fn list_variants(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<product_variant::Model>, ServiceError> {
        let variants = product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::Gender)
            .order_by_asc(product_variant::Column::Size)
            .all(&*self.db)
            .await?;
        Ok(variants)
    }

    /// Overwrites the stock of a variant with an absolute count.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn set_stock(
        &self,
        actor: &AuthUser,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<product_variant::Model, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::InvalidInput(format!(
                "Stock cannot be negative, got {}",
                quantity
            )));
        }

        let (variant, product) = product_variant::Entity::find_by_id(variant_id)
            .find_also_related(product::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Variant", variant_id))?;
        let product =
            product.ok_or_else(|| ServiceError::not_found("Product", variant.product_id))?;
        ensure_product_owner(actor, &product)?;

        let previous = variant.stock_quantity;
        let mut active: product_variant::ActiveModel = variant.into();
        active.stock_quantity = Set(quantity);
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::StockSet {
                variant_id,
                quantity,
            })
            .await;

        info!(%variant_id, previous, quantity, "stock overwritten");
        Ok(updated)
    }

    /// Adds a variant to a product. When the same size/color/gender already
    /// exists its stock grows by `initial_quantity` instead.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn add_variant(
        &self,
        actor: &AuthUser,
        product_id: Uuid,
        input: NewVariant,
    ) -> Result<AddedVariant, ServiceError> {
        if input.initial_quantity < 0 {
            return Err(ServiceError::InvalidInput(format!(
                "Initial quantity cannot be negative, got {}",
                input.initial_quantity
            )));
        }

        let size = input.size.trim().to_string();
        let color = input.color.trim().to_string();
        let gender = input.gender.trim().to_string();

        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;
        ensure_product_owner(actor, &product)?;

        let existing = product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .filter(product_variant::Column::Size.eq(size.as_str()))
            .filter(product_variant::Column::Color.eq(color.as_str()))
            .filter(product_variant::Column::Gender.eq(gender.as_str()))
            .one(&txn)
            .await?;

        let outcome = match existing {
            Some(variant) => {
                product_variant::Entity::update_many()
                    .col_expr(
                        product_variant::Column::StockQuantity,
                        Expr::col(product_variant::Column::StockQuantity)
                            .add(input.initial_quantity),
                    )
                    .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(product_variant::Column::Id.eq(variant.id))
                    .exec(&txn)
                    .await?;

                let variant = product_variant::Entity::find_by_id(variant.id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Variant", variant.id))?;
                AddedVariant {
                    variant,
                    merged: true,
                }
            }
            None => {
                let variant = product_variant::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(product_id),
                    size: Set(size),
                    color: Set(color),
                    gender: Set(gender),
                    stock_quantity: Set(input.initial_quantity),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                AddedVariant {
                    variant,
                    merged: false,
                }
            }
        };

        txn.commit().await?;

        if outcome.merged {
            warn!(variant_id = %outcome.variant.id, "variant already existed, stock merged");
        }
        self.event_sender
            .send_or_log(Event::VariantAdded {
                product_id,
                variant_id: outcome.variant.id,
                merged: outcome.merged,
            })
            .await;

        Ok(outcome)
    }
}
