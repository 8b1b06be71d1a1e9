use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    entities::{
        order::{self, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Statuses reachable from `from` in one step. Terminal statuses have none.
pub fn allowed_transitions(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match from {
        Pending => &[Approved, Cancelled],
        Approved => &[InProduction, Cancelled],
        InProduction => &[ReadyForPickup, Cancelled],
        ReadyForPickup => &[Delivered],
        Delivered | Cancelled => &[],
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Parses status text from a request.
pub fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(raw.trim())
        .map_err(|_| ServiceError::InvalidInput(format!("Unknown order status '{}'", raw)))
}

/// Supplier-driven lifecycle of placed orders.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Moves an order to `new_status`. The actor must be a supplier with at
    /// least one item in the order, and the move must be allowed from the
    /// order's current status.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id, order_id = %order_id, new_status = %new_status))]
    pub async fn transition(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(Role::Supplier)?;

        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let supplier_items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::SupplierId.eq(actor.actor_id))
            .count(&*self.db)
            .await?;
        if supplier_items == 0 {
            return Err(ServiceError::Forbidden(format!(
                "Order {} has no items from this supplier",
                order_id
            )));
        }

        let old_status = order.status;
        if !can_transition(old_status, new_status) {
            counter!("order_transitions_rejected_total", 1);
            warn!(from = %old_status, to = %new_status, "rejected status transition");
            return Err(ServiceError::InvalidTransition {
                from: old_status,
                to: new_status,
            });
        }

        // Compare-and-set on the status read above so a concurrent change wins cleanly.
        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(old_status))
            .exec(&*self.db)
            .await?;

        let updated = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        if result.rows_affected != 1 {
            counter!("order_transitions_rejected_total", 1);
            return Err(ServiceError::InvalidTransition {
                from: updated.status,
                to: new_status,
            });
        }

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                supplier_id: actor.actor_id,
                old_status,
                new_status,
            })
            .await;

        info!(from = %old_status, to = %new_status, "order status updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use sea_orm::Iterable;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Approved)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled)]
    #[case(OrderStatus::Approved, OrderStatus::InProduction)]
    #[case(OrderStatus::Approved, OrderStatus::Cancelled)]
    #[case(OrderStatus::InProduction, OrderStatus::ReadyForPickup)]
    #[case(OrderStatus::InProduction, OrderStatus::Cancelled)]
    #[case(OrderStatus::ReadyForPickup, OrderStatus::Delivered)]
    fn allowed_moves(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(can_transition(from, to));
    }

    #[rstest]
    #[case(OrderStatus::ReadyForPickup, OrderStatus::InProduction)]
    #[case(OrderStatus::ReadyForPickup, OrderStatus::Cancelled)]
    #[case(OrderStatus::Pending, OrderStatus::Delivered)]
    #[case(OrderStatus::Approved, OrderStatus::Pending)]
    #[case(OrderStatus::Delivered, OrderStatus::Cancelled)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending)]
    fn rejected_moves(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(!can_transition(from, to));
    }

    #[test]
    fn no_status_transitions_to_itself() {
        for status in OrderStatus::iter() {
            assert!(!can_transition(status, status), "{status} -> {status}");
        }
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        assert!(allowed_transitions(OrderStatus::Delivered).is_empty());
        assert!(allowed_transitions(OrderStatus::Cancelled).is_empty());
    }

    #[test]
    fn status_text_parsing() {
        assert_eq!(
            parse_status("ready_for_pickup").unwrap(),
            OrderStatus::ReadyForPickup
        );
        assert_matches!(parse_status("shipped"), Err(ServiceError::InvalidInput(_)));
    }
}
