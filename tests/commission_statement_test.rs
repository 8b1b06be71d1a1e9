mod common;

use assert_matches::assert_matches;
use chrono::{NaiveDate, TimeZone, Utc};
use common::{Family, TestApp};
use conecta_api::{
    entities::{
        commission_statement::StatementStatus,
        order::{self, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    services::commission::compute_commission,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

/// Inserts a one-item order for `supplier_id` placed at the given UTC time.
async fn seed_sale(
    app: &TestApp,
    family: &Family,
    supplier_id: Uuid,
    status: OrderStatus,
    placed_at: chrono::DateTime<Utc>,
    amount: Decimal,
) -> order::Model {
    let breakdown = compute_commission(amount);
    let order = order::ActiveModel {
        id: Set(Uuid::new_v4()),
        guardian_id: Set(family.guardian.actor_id),
        student_id: Set(family.student.id),
        school_id: Set(family.school.id),
        total: Set(breakdown.total),
        commission: Set(breakdown.commission),
        status: Set(status),
        created_at: Set(placed_at),
        ..Default::default()
    }
    .insert(app.db())
    .await
    .unwrap();

    order_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        product_id: Set(Uuid::new_v4()),
        variant_id: Set(Uuid::new_v4()),
        supplier_id: Set(supplier_id),
        quantity: Set(1),
        unit_price: Set(amount),
        subtotal: Set(amount),
    }
    .insert(app.db())
    .await
    .unwrap();

    order
}

fn march(day: u32, hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

#[tokio::test]
async fn statement_sums_billable_sales_of_the_month() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let supplier = family.supplier_row.id;

    seed_sale(&app, &family, supplier, OrderStatus::Approved, march(1, 0), dec!(50.00)).await;
    seed_sale(&app, &family, supplier, OrderStatus::Delivered, march(31, 23), dec!(25.00)).await;
    // Excluded: cancelled, not yet approved, and outside the month.
    seed_sale(&app, &family, supplier, OrderStatus::Cancelled, march(10, 9), dec!(50.00)).await;
    seed_sale(&app, &family, supplier, OrderStatus::Pending, march(11, 9), dec!(50.00)).await;
    seed_sale(
        &app,
        &family,
        supplier,
        OrderStatus::Approved,
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        dec!(50.00),
    )
    .await;

    let statements = app
        .state
        .services
        .commissions
        .generate_monthly_statement(2025, 3)
        .await
        .unwrap();

    assert_eq!(statements.len(), 1);
    let statement = &statements[0];
    assert_eq!(statement.supplier_id, supplier);
    assert_eq!(
        statement.reference_month,
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    );
    assert_eq!(statement.total_sales, dec!(75.00));
    assert_eq!(statement.total_commission, dec!(11.25));
    assert_eq!(statement.net_amount, dec!(63.75));
    assert_eq!(statement.status, StatementStatus::Pending);
}

#[tokio::test]
async fn regeneration_updates_totals_and_keeps_payment() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let supplier = family.supplier_row.id;
    let commissions = &app.state.services.commissions;

    seed_sale(&app, &family, supplier, OrderStatus::Approved, march(5, 12), dec!(50.00)).await;
    let first = commissions.generate_monthly_statement(2025, 3).await.unwrap();
    assert_eq!(first.len(), 1);

    let paid = commissions
        .register_payment(
            first[0].id,
            dec!(42.50),
            Some(NaiveDate::from_ymd_opt(2025, 4, 10).unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(paid.status, StatementStatus::Paid);

    // Same inputs, same result.
    let again = commissions.generate_monthly_statement(2025, 3).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].id, first[0].id);
    assert_eq!(again[0].total_sales, dec!(50.00));

    // A late sale moves the totals but not the payment.
    seed_sale(&app, &family, supplier, OrderStatus::Delivered, march(20, 8), dec!(50.00)).await;
    let refreshed = commissions.generate_monthly_statement(2025, 3).await.unwrap();
    assert_eq!(refreshed.len(), 1);
    let statement = &refreshed[0];
    assert_eq!(statement.id, first[0].id);
    assert_eq!(statement.total_sales, dec!(100.00));
    assert_eq!(statement.total_commission, dec!(15.00));
    assert_eq!(statement.status, StatementStatus::Paid);
    assert_eq!(statement.amount_paid, Some(dec!(42.50)));
    assert_eq!(
        statement.payment_date,
        NaiveDate::from_ymd_opt(2025, 4, 10)
    );

    assert_eq!(
        commissions
            .list_all(Some(StatementStatus::Paid))
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(commissions
        .list_all(Some(StatementStatus::Pending))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn one_statement_per_supplier() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let other = app.seed_supplier("Confecções Norte", "norte@test.dev").await;

    seed_sale(&app, &family, family.supplier_row.id, OrderStatus::Approved, march(2, 10), dec!(50.00)).await;
    seed_sale(&app, &family, other.id, OrderStatus::InProduction, march(3, 10), dec!(12.50)).await;

    let commissions = &app.state.services.commissions;
    let statements = commissions.generate_monthly_statement(2025, 3).await.unwrap();
    assert_eq!(statements.len(), 2);

    let mine = commissions.list_for_supplier(other.id).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].total_sales, dec!(12.50));

    let listing = commissions.list_all(None).await.unwrap();
    assert_eq!(listing.len(), 2);
    let north = listing
        .iter()
        .find(|l| l.statement.supplier_id == other.id)
        .unwrap();
    assert_eq!(north.supplier_name, "Confecções Norte");
    assert_eq!(north.supplier_email, "norte@test.dev");
}

#[tokio::test]
async fn simultaneous_generations_share_one_row() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    seed_sale(&app, &family, family.supplier_row.id, OrderStatus::Approved, march(4, 8), dec!(50.00)).await;
    let commissions = &app.state.services.commissions;

    let (first, second) = tokio::join!(
        commissions.generate_monthly_statement(2025, 3),
        commissions.generate_monthly_statement(2025, 3),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first[0].id, second[0].id);

    let all = commissions.list_all(None).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].statement.total_commission, dec!(7.50));
}

#[tokio::test]
async fn month_without_sales_yields_nothing() {
    let app = TestApp::new().await;
    let statements = app
        .state
        .services
        .commissions
        .generate_monthly_statement(2025, 2)
        .await
        .unwrap();
    assert!(statements.is_empty());
}

#[tokio::test]
async fn invalid_payments_and_months_are_rejected() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    seed_sale(
        &app,
        &family,
        family.supplier_row.id,
        OrderStatus::Approved,
        march(7, 7),
        dec!(50.00),
    )
    .await;
    let commissions = &app.state.services.commissions;
    let statements = commissions.generate_monthly_statement(2025, 3).await.unwrap();

    assert_matches!(
        commissions
            .register_payment(statements[0].id, dec!(-1.00), None)
            .await,
        Err(ServiceError::InvalidInput(_))
    );
    assert_matches!(
        commissions
            .register_payment(Uuid::new_v4(), dec!(10.00), None)
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        commissions.generate_monthly_statement(2025, 13).await,
        Err(ServiceError::InvalidInput(_))
    );

    // A mismatched amount is accepted as given.
    let paid = commissions
        .register_payment(statements[0].id, dec!(40.00), None)
        .await
        .unwrap();
    assert_eq!(paid.amount_paid, Some(dec!(40.00)));
    assert_eq!(paid.payment_date, Some(Utc::now().date_naive()));
}

#[tokio::test]
async fn sales_detail_lists_the_supplier_share_per_order() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let supplier = family.supplier_row.id;
    let older = seed_sale(&app, &family, supplier, OrderStatus::Approved, march(4, 9), dec!(25.00)).await;
    let newer = seed_sale(&app, &family, supplier, OrderStatus::Delivered, march(9, 9), dec!(50.00)).await;

    let sales = app
        .state
        .services
        .commissions
        .monthly_sales_detail(supplier, 2025, 3)
        .await
        .unwrap();
    assert_eq!(sales.len(), 2);
    assert_eq!(sales[0].order_id, newer.id);
    assert_eq!(sales[0].supplier_amount, dec!(50.00));
    assert_eq!(sales[1].order_id, older.id);
}
