//! Order placement and order queries.
//!
//! [`OrderService::place_order`] turns a guardian's cart into an order in a
//! single database transaction: the order row, one item snapshot per cart
//! line, a guarded stock decrement per line and the cart clean-up either all
//! commit or all roll back.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    entities::{
        cart_line, guardian,
        order::{self, OrderStatus},
        order_item, product, product_variant, student, supplier,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        cart::{load_cart_lines, shortfalls},
        commission::compute_commission,
        inventory::decrement_stock,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub student_id: Uuid,
    pub school_id: Uuid,
}

/// An order together with its item snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// An item snapshot joined with the product, variant and supplier it was
/// bought from. Variant fields are empty when the variant no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemDetail {
    pub item: order_item::Model,
    pub product_name: String,
    pub supplier_name: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub gender: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Places an order from the acting guardian's cart.
    #[instrument(skip(self, actor), fields(guardian_id = %actor.actor_id, student_id = %request.student_id))]
    pub async fn place_order(
        &self,
        actor: &AuthUser,
        request: PlaceOrderRequest,
    ) -> Result<OrderWithItems, ServiceError> {
        actor.require_role(Role::Guardian)?;
        let started = Instant::now();
        let guardian_id = actor.actor_id;

        let lines = load_cart_lines(&*self.db, guardian_id, Order::Asc).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        self.check_student(guardian_id, &request).await?;

        if let Some(short) = shortfalls(&lines).into_iter().next() {
            counter!("order_stock_conflicts_total", 1);
            return Err(ServiceError::InsufficientStock {
                product_id: short.product_id,
                product_name: short.product_name,
                requested: short.requested,
                available: short.available,
            });
        }

        let total: Decimal = lines.iter().map(|l| l.subtotal).sum();
        let breakdown = compute_commission(total);

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            guardian_id: Set(guardian_id),
            student_id: Set(request.student_id),
            school_id: Set(request.school_id),
            total: Set(breakdown.total),
            commission: Set(breakdown.commission),
            status: Set(OrderStatus::Pending),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                supplier_id: Set(line.supplier_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                subtotal: Set(line.subtotal),
            }
            .insert(&txn)
            .await?;
            items.push(item);

            if !decrement_stock(&txn, line.variant_id, line.quantity).await? {
                // Someone took the stock between the pre-check and now.
                let available = product_variant::Entity::find_by_id(line.variant_id)
                    .one(&txn)
                    .await?
                    .map(|v| v.stock_quantity)
                    .unwrap_or(0);
                counter!("order_stock_conflicts_total", 1);
                warn!(
                    variant_id = %line.variant_id,
                    requested = line.quantity,
                    available,
                    "stock changed during placement, rolling back"
                );
                return Err(ServiceError::InsufficientStock {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    requested: line.quantity,
                    available,
                });
            }
        }

        cart_line::Entity::delete_many()
            .filter(cart_line::Column::GuardianId.eq(guardian_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        counter!("orders_placed_total", 1);
        histogram!("order_placement_duration_seconds", started.elapsed());
        info!(
            order_id = %order.id,
            total = %order.total,
            commission = %order.commission,
            items = items.len(),
            "order placed"
        );

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                guardian_id,
                school_id: order.school_id,
                total: order.total,
                commission: order.commission,
                item_count: items.len(),
            })
            .await;

        Ok(OrderWithItems { order, items })
    }

    /// The student must exist, be enrolled at the requested school and be
    /// the one linked to the ordering guardian.
    async fn check_student(
        &self,
        guardian_id: Uuid,
        request: &PlaceOrderRequest,
    ) -> Result<(), ServiceError> {
        let student = student::Entity::find_by_id(request.student_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Student", request.student_id))?;
        if student.school_id != request.school_id {
            return Err(ServiceError::InvalidInput(format!(
                "Student {} is not enrolled at school {}",
                student.id, request.school_id
            )));
        }

        let guardian = guardian::Entity::find_by_id(guardian_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Guardian", guardian_id))?;
        if guardian.student_id != Some(student.id) {
            return Err(ServiceError::Forbidden(format!(
                "Student {} is not linked to this guardian",
                student.id
            )));
        }
        Ok(())
    }

    /// Loads an order with items, if the actor may see it.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn get_order(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        let items = self.items_of(order_id).await?;

        let visible = match actor.role {
            Role::Admin => true,
            Role::Guardian => order.guardian_id == actor.actor_id,
            Role::Manager => actor.school_id == Some(order.school_id),
            Role::Supplier => items.iter().any(|i| i.supplier_id == actor.actor_id),
        };
        if !visible {
            return Err(ServiceError::Forbidden(format!(
                "Order {} is not visible to this account",
                order_id
            )));
        }

        Ok(OrderWithItems { order, items })
    }

    /// Item snapshots of a visible order with product, variant and supplier
    /// names attached.
    pub async fn get_order_items(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
    ) -> Result<Vec<OrderItemDetail>, ServiceError> {
        let order = self.get_order(actor, order_id).await?;
        self.describe_items(order.items).await
    }

    pub async fn describe_items(
        &self,
        items: Vec<order_item::Model>,
    ) -> Result<Vec<OrderItemDetail>, ServiceError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let products: HashMap<Uuid, String> = product::Entity::find()
            .filter(product::Column::Id.is_in(items.iter().map(|i| i.product_id)))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();
        let variants: HashMap<Uuid, product_variant::Model> = product_variant::Entity::find()
            .filter(product_variant::Column::Id.is_in(items.iter().map(|i| i.variant_id)))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();
        let suppliers: HashMap<Uuid, String> = supplier::Entity::find()
            .filter(supplier::Column::Id.is_in(items.iter().map(|i| i.supplier_id)))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let details = items
            .into_iter()
            .map(|item| {
                let variant = variants.get(&item.variant_id);
                OrderItemDetail {
                    product_name: products.get(&item.product_id).cloned().unwrap_or_default(),
                    supplier_name: suppliers.get(&item.supplier_id).cloned().unwrap_or_default(),
                    size: variant.map(|v| v.size.clone()),
                    color: variant.map(|v| v.color.clone()),
                    gender: variant.map(|v| v.gender.clone()),
                    item,
                }
            })
            .collect();
        Ok(details)
    }

    async fn items_of(&self, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError> {
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    /// Orders the actor is allowed to see, newest first.
    pub async fn list_visible(&self, actor: &AuthUser) -> Result<Vec<order::Model>, ServiceError> {
        match actor.role {
            Role::Guardian => self.list_for_guardian(actor.actor_id).await,
            Role::Supplier => self.list_for_supplier(actor.actor_id).await,
            Role::Manager => {
                let school_id = actor.school_id.ok_or_else(|| {
                    ServiceError::Forbidden("Manager is not attached to a school".to_string())
                })?;
                self.list_for_school(school_id).await
            }
            Role::Admin => {
                let orders = order::Entity::find()
                    .order_by_desc(order::Column::CreatedAt)
                    .all(&*self.db)
                    .await?;
                Ok(orders)
            }
        }
    }

    pub async fn list_for_guardian(&self, guardian_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::GuardianId.eq(guardian_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    pub async fn list_for_school(&self, school_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::SchoolId.eq(school_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    /// Orders holding at least one item of the supplier.
    pub async fn list_for_supplier(&self, supplier_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        let order_ids: BTreeSet<Uuid> = order_item::Entity::find()
            .select_only()
            .column(order_item::Column::OrderId)
            .filter(order_item::Column::SupplierId.eq(supplier_id))
            .into_tuple::<Uuid>()
            .all(&*self.db)
            .await?
            .into_iter()
            .collect();
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let orders = order::Entity::find()
            .filter(order::Column::Id.is_in(order_ids))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }
}

