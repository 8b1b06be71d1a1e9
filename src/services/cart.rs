use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{cart_line, product, product_variant},
    errors::ServiceError,
};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 999;

/// A cart line joined with the product and variant it points at.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartLineView {
    pub line_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub supplier_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub size: String,
    pub color: String,
    pub gender: String,
    pub quantity: i32,
    pub stock_quantity: i32,
    pub subtotal: Decimal,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartSummary {
    pub item_count: i64,
    pub total: Decimal,
}

/// A line asking for more units than its variant currently has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StockShortfall {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub requested: i32,
    pub available: i32,
}

/// Loads a guardian's cart lines with product and variant data.
///
/// Lines whose product or variant has disappeared are skipped.
pub async fn load_cart_lines<C>(
    conn: &C,
    guardian_id: Uuid,
    order: Order,
) -> Result<Vec<CartLineView>, ServiceError>
where
    C: ConnectionTrait,
{
    let lines = cart_line::Entity::find()
        .filter(cart_line::Column::GuardianId.eq(guardian_id))
        .order_by(cart_line::Column::CreatedAt, order)
        .all(conn)
        .await?;
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    let variant_ids: Vec<Uuid> = lines.iter().map(|l| l.variant_id).collect();

    let products: HashMap<Uuid, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let variants: HashMap<Uuid, product_variant::Model> = product_variant::Entity::find()
        .filter(product_variant::Column::Id.is_in(variant_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let views = lines
        .into_iter()
        .filter_map(|line| {
            let product = products.get(&line.product_id)?;
            let variant = variants.get(&line.variant_id)?;
            Some(CartLineView {
                line_id: line.id,
                product_id: product.id,
                variant_id: variant.id,
                supplier_id: product.supplier_id,
                product_name: product.name.clone(),
                unit_price: product.price,
                size: variant.size.clone(),
                color: variant.color.clone(),
                gender: variant.gender.clone(),
                quantity: line.quantity,
                stock_quantity: variant.stock_quantity,
                subtotal: product.price * Decimal::from(line.quantity),
                added_at: line.created_at,
            })
        })
        .collect();

    Ok(views)
}

/// Lines whose requested quantity exceeds current stock, in the given order.
pub fn shortfalls(lines: &[CartLineView]) -> Vec<StockShortfall> {
    lines
        .iter()
        .filter(|l| l.quantity > l.stock_quantity)
        .map(|l| StockShortfall {
            product_id: l.product_id,
            variant_id: l.variant_id,
            product_name: l.product_name.clone(),
            requested: l.quantity,
            available: l.stock_quantity,
        })
        .collect()
}

fn quantity_cap_exceeded() -> ServiceError {
    ServiceError::InvalidInput(format!(
        "A cart line holds at most {} units",
        MAX_LINE_QUANTITY
    ))
}

/// Per-guardian shopping cart. Lines are keyed by (product, variant); writes
/// are last-writer-wins.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds units of a variant, merging with an existing line for the same
    /// product and variant.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        guardian_id: Uuid,
        product_id: Uuid,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<cart_line::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(quantity_cap_exceeded());
        }

        let txn = self.db.begin().await?;

        let product = product::Entity::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;
        if !product.active {
            return Err(ServiceError::InvalidInput(format!(
                "Product {} is not available",
                product.name
            )));
        }

        let variant = product_variant::Entity::find_by_id(variant_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Variant", variant_id))?;
        if variant.product_id != product_id {
            return Err(ServiceError::InvalidInput(format!(
                "Variant {} does not belong to product {}",
                variant_id, product_id
            )));
        }

        let existing = cart_line::Entity::find()
            .filter(cart_line::Column::GuardianId.eq(guardian_id))
            .filter(cart_line::Column::ProductId.eq(product_id))
            .filter(cart_line::Column::VariantId.eq(variant_id))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let line = if let Some(line) = existing {
            let merged = line
                .quantity
                .checked_add(quantity)
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or_else(quantity_cap_exceeded)?;
            let mut line: cart_line::ActiveModel = line.into();
            line.quantity = Set(merged);
            line.updated_at = Set(now);
            line.update(&txn).await?
        } else {
            cart_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                guardian_id: Set(guardian_id),
                product_id: Set(product_id),
                variant_id: Set(variant_id),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?
        };

        txn.commit().await?;

        info!(%guardian_id, %variant_id, quantity = line.quantity, "cart line saved");
        Ok(line)
    }

    /// Sets a line's quantity; zero or less removes the line and returns `None`.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        guardian_id: Uuid,
        line_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_line::Model>, ServiceError> {
        let line = self.owned_line(guardian_id, line_id).await?;

        if quantity > MAX_LINE_QUANTITY {
            return Err(quantity_cap_exceeded());
        }
        if quantity <= 0 {
            cart_line::Entity::delete_by_id(line.id)
                .exec(&*self.db)
                .await?;
            return Ok(None);
        }

        let mut line: cart_line::ActiveModel = line.into();
        line.quantity = Set(quantity);
        line.updated_at = Set(Utc::now());
        Ok(Some(line.update(&*self.db).await?))
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, guardian_id: Uuid, line_id: Uuid) -> Result<(), ServiceError> {
        let line = self.owned_line(guardian_id, line_id).await?;
        cart_line::Entity::delete_by_id(line.id)
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Empties the cart. Returns the number of removed lines.
    #[instrument(skip(self))]
    pub async fn clear(&self, guardian_id: Uuid) -> Result<u64, ServiceError> {
        let result = cart_line::Entity::delete_many()
            .filter(cart_line::Column::GuardianId.eq(guardian_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Cart contents, newest line first.
    pub async fn list(&self, guardian_id: Uuid) -> Result<Vec<CartLineView>, ServiceError> {
        load_cart_lines(&*self.db, guardian_id, Order::Desc).await
    }

    /// Total number of units in the cart.
    pub async fn count_items(&self, guardian_id: Uuid) -> Result<i64, ServiceError> {
        let lines = cart_line::Entity::find()
            .filter(cart_line::Column::GuardianId.eq(guardian_id))
            .all(&*self.db)
            .await?;
        Ok(lines.iter().map(|l| i64::from(l.quantity)).sum())
    }

    /// Sum of price times quantity at current prices.
    pub async fn total(&self, guardian_id: Uuid) -> Result<Decimal, ServiceError> {
        let lines = self.list(guardian_id).await?;
        Ok(lines.iter().map(|l| l.subtotal).sum())
    }

    pub async fn summary(&self, guardian_id: Uuid) -> Result<CartSummary, ServiceError> {
        let lines = self.list(guardian_id).await?;
        Ok(CartSummary {
            item_count: lines.iter().map(|l| i64::from(l.quantity)).sum(),
            total: lines.iter().map(|l| l.subtotal).sum(),
        })
    }

    /// Reports every line that current stock cannot cover.
    #[instrument(skip(self))]
    pub async fn validate_stock(&self, guardian_id: Uuid) -> Result<Vec<StockShortfall>, ServiceError> {
        let lines = load_cart_lines(&*self.db, guardian_id, Order::Asc).await?;
        Ok(shortfalls(&lines))
    }

    async fn owned_line(
        &self,
        guardian_id: Uuid,
        line_id: Uuid,
    ) -> Result<cart_line::Model, ServiceError> {
        cart_line::Entity::find_by_id(line_id)
            .filter(cart_line::Column::GuardianId.eq(guardian_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cart line", line_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn view(quantity: i32, stock: i32) -> CartLineView {
        CartLineView {
            line_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variant_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            product_name: "Bermuda".into(),
            unit_price: dec!(25.00),
            size: "M".into(),
            color: "Azul".into(),
            gender: "Unissex".into(),
            quantity,
            stock_quantity: stock,
            subtotal: dec!(25.00) * Decimal::from(quantity),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn shortfalls_only_lists_uncovered_lines() {
        let lines = vec![view(2, 2), view(3, 1), view(1, 0)];
        let short = shortfalls(&lines);
        assert_eq!(short.len(), 2);
        assert_eq!((short[0].requested, short[0].available), (3, 1));
        assert_eq!((short[1].requested, short[1].available), (1, 0));
    }
}
