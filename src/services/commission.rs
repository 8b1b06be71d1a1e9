//! Platform commission on supplier sales.
//!
//! Every order carries a 15 % platform fee computed once at placement.
//! Monthly statements aggregate the billable orders of each supplier into a
//! single row per (supplier, month) that an administrator later marks as paid.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{
        commission_statement::{self, StatementStatus},
        order::{self, OrderStatus},
        order_item, supplier,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Share of every sale retained by the platform.
pub const COMMISSION_RATE: Decimal = dec!(0.15);

/// How a sale splits between platform and supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CommissionBreakdown {
    pub total: Decimal,
    pub commission: Decimal,
    pub net: Decimal,
}

pub fn compute_commission(total: Decimal) -> CommissionBreakdown {
    let commission = total * COMMISSION_RATE;
    CommissionBreakdown {
        total,
        commission,
        net: total - commission,
    }
}

/// Half-open UTC window `[first day, first day of next month)` plus the
/// reference date stored on statements.
pub fn month_window(
    year: i32,
    month: u32,
) -> Result<(DateTime<Utc>, DateTime<Utc>, NaiveDate), ServiceError> {
    let invalid = || ServiceError::InvalidInput(format!("Invalid month {}-{:02}", year, month));
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let next = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(invalid)?;

    let start = Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0).ok_or_else(invalid)?);
    let end = Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0).ok_or_else(invalid)?);
    Ok((start, end, first))
}

/// One order's contribution to a supplier's monthly sales.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SupplierSale {
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub order_total: Decimal,
    pub supplier_amount: Decimal,
}

/// A statement together with the supplier it settles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementListing {
    pub statement: commission_statement::Model,
    pub supplier_name: String,
    pub supplier_email: String,
}

#[derive(Clone)]
pub struct CommissionService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CommissionService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Billable orders created inside the month together with their items.
    async fn billable_orders_in(
        &self,
        year: i32,
        month: u32,
    ) -> Result<(Vec<order::Model>, Vec<order_item::Model>), ServiceError> {
        let (start, end, _) = month_window(year, month)?;

        let orders = order::Entity::find()
            .filter(order::Column::Status.is_in(OrderStatus::BILLABLE))
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lt(end))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        if orders.is_empty() {
            return Ok((orders, Vec::new()));
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(orders.iter().map(|o| o.id)))
            .all(&*self.db)
            .await?;
        Ok((orders, items))
    }

    /// Computes (or recomputes) one statement per supplier with billable
    /// sales in the month. Totals are overwritten on regeneration; payment
    /// status and payment fields are kept.
    #[instrument(skip(self))]
    pub async fn generate_monthly_statement(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<commission_statement::Model>, ServiceError> {
        let (_, _, reference_month) = month_window(year, month)?;
        let (_, items) = self.billable_orders_in(year, month).await?;

        // Summed here rather than in SQL so decimal precision is backend independent.
        let mut sales_by_supplier: BTreeMap<Uuid, Decimal> = BTreeMap::new();
        for item in &items {
            *sales_by_supplier.entry(item.supplier_id).or_default() += item.subtotal;
        }

        let txn = self.db.begin().await?;
        let mut statements = Vec::with_capacity(sales_by_supplier.len());

        for (supplier_id, total_sales) in sales_by_supplier {
            let breakdown = compute_commission(total_sales);

            let now = Utc::now();

            commission_statement::Entity::insert(commission_statement::ActiveModel {
                id: Set(Uuid::new_v4()),
                supplier_id: Set(supplier_id),
                reference_month: Set(reference_month),
                total_sales: Set(breakdown.total),
                total_commission: Set(breakdown.commission),
                net_amount: Set(breakdown.net),
                status: Set(StatementStatus::Pending),
                payment_date: Set(None),
                amount_paid: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .on_conflict(
                OnConflict::columns([
                    commission_statement::Column::SupplierId,
                    commission_statement::Column::ReferenceMonth,
                ])
                .update_columns([
                    commission_statement::Column::TotalSales,
                    commission_statement::Column::TotalCommission,
                    commission_statement::Column::NetAmount,
                    commission_statement::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

            let statement = commission_statement::Entity::find()
                .filter(commission_statement::Column::SupplierId.eq(supplier_id))
                .filter(commission_statement::Column::ReferenceMonth.eq(reference_month))
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Statement for supplier {} in {} missing after upsert",
                        supplier_id, reference_month
                    ))
                })?;
            statements.push(statement);
        }

        txn.commit().await?;

        counter!("commission_statements_generated_total", statements.len() as u64);
        info!(
            %reference_month,
            statement_count = statements.len(),
            "commission statements generated"
        );
        self.event_sender
            .send_or_log(Event::StatementsGenerated {
                reference_month,
                statement_count: statements.len(),
            })
            .await;

        Ok(statements)
    }

    /// Marks a statement as paid. The amount is recorded as given, even when
    /// it differs from the statement's net amount.
    #[instrument(skip(self))]
    pub async fn register_payment(
        &self,
        statement_id: Uuid,
        amount_paid: Decimal,
        payment_date: Option<NaiveDate>,
    ) -> Result<commission_statement::Model, ServiceError> {
        if amount_paid.is_sign_negative() {
            return Err(ServiceError::InvalidInput(
                "Amount paid cannot be negative".to_string(),
            ));
        }

        let statement = self.get_statement(statement_id).await?;
        if amount_paid != statement.net_amount {
            warn!(
                %statement_id,
                %amount_paid,
                net_amount = %statement.net_amount,
                "payment differs from statement net amount"
            );
        }

        let mut active: commission_statement::ActiveModel = statement.into();
        active.status = Set(StatementStatus::Paid);
        active.amount_paid = Set(Some(amount_paid));
        active.payment_date = Set(Some(payment_date.unwrap_or_else(|| Utc::now().date_naive())));
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentRegistered {
                statement_id,
                amount_paid,
            })
            .await;

        Ok(updated)
    }

    pub async fn get_statement(
        &self,
        statement_id: Uuid,
    ) -> Result<commission_statement::Model, ServiceError> {
        commission_statement::Entity::find_by_id(statement_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Commission statement", statement_id))
    }

    /// A supplier's statements, most recent month first.
    pub async fn list_for_supplier(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<commission_statement::Model>, ServiceError> {
        let statements = commission_statement::Entity::find()
            .filter(commission_statement::Column::SupplierId.eq(supplier_id))
            .order_by_desc(commission_statement::Column::ReferenceMonth)
            .all(&*self.db)
            .await?;
        Ok(statements)
    }

    /// Every statement with its supplier's name and email, newest month first.
    pub async fn list_all(
        &self,
        status: Option<StatementStatus>,
    ) -> Result<Vec<StatementListing>, ServiceError> {
        let mut query = commission_statement::Entity::find().find_also_related(supplier::Entity);
        if let Some(status) = status {
            query = query.filter(commission_statement::Column::Status.eq(status));
        }
        let rows = query
            .order_by_desc(commission_statement::Column::ReferenceMonth)
            .order_by_asc(commission_statement::Column::SupplierId)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(statement, supplier)| {
                let (supplier_name, supplier_email) = supplier
                    .map(|s| (s.name, s.email))
                    .unwrap_or_default();
                StatementListing {
                    statement,
                    supplier_name,
                    supplier_email,
                }
            })
            .collect())
    }

    /// Per-order breakdown behind a supplier's monthly statement, newest first.
    #[instrument(skip(self))]
    pub async fn monthly_sales_detail(
        &self,
        supplier_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Vec<SupplierSale>, ServiceError> {
        let (orders, items) = self.billable_orders_in(year, month).await?;

        let mut amounts: HashMap<Uuid, Decimal> = HashMap::new();
        for item in items.iter().filter(|i| i.supplier_id == supplier_id) {
            *amounts.entry(item.order_id).or_default() += item.subtotal;
        }

        let sales = orders
            .into_iter()
            .filter_map(|o| {
                amounts.get(&o.id).map(|amount| SupplierSale {
                    order_id: o.id,
                    created_at: o.created_at,
                    status: o.status,
                    order_total: o.total,
                    supplier_amount: *amount,
                })
            })
            .collect();
        Ok(sales)
    }
}

/// The calendar month before `today`, as `(year, month)`.
pub fn previous_month(today: NaiveDate) -> (i32, u32) {
    if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn fifty_reais_yields_seven_fifty() {
        let split = compute_commission(dec!(50.00));
        assert_eq!(split.commission, dec!(7.50));
        assert_eq!(split.net, dec!(42.50));
    }

    #[test]
    fn zero_total_has_zero_commission() {
        let split = compute_commission(Decimal::ZERO);
        assert_eq!(split.commission, Decimal::ZERO);
        assert_eq!(split.net, Decimal::ZERO);
    }

    #[test]
    fn december_window_rolls_into_next_year() {
        let (start, end, reference) = month_window(2024, 12).unwrap();
        assert_eq!(reference, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(start.date_naive(), reference);
        assert_eq!(end.date_naive(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        assert_matches!(month_window(2024, 0), Err(ServiceError::InvalidInput(_)));
        assert_matches!(month_window(2024, 13), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn previous_month_wraps_january() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(previous_month(jan), (2024, 12));
        let jul = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert_eq!(previous_month(jul), (2025, 6));
    }

    proptest! {
        #[test]
        fn split_is_exact_for_cent_amounts(cents in 0i64..1_000_000_000) {
            let total = Decimal::new(cents, 2);
            let split = compute_commission(total);
            prop_assert_eq!(split.commission + split.net, total);
            prop_assert_eq!(split.commission, total * dec!(0.15));
            prop_assert!(split.commission <= total);
            prop_assert!(!split.net.is_sign_negative());
        }
    }
}
