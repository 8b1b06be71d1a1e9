mod common;

use assert_matches::assert_matches;
use common::{actor, TestApp};
use conecta_api::{
    auth::Role,
    entities::{order, order::OrderStatus, order_item, product_variant},
    errors::ServiceError,
    services::{catalog::ProductChanges, orders::PlaceOrderRequest},
};
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

async fn stock_of(app: &TestApp, variant_id: Uuid) -> i32 {
    product_variant::Entity::find_by_id(variant_id)
        .one(app.db())
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

#[tokio::test]
async fn placing_an_order_snapshots_prices_and_reserves_stock() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let product = app
        .seed_product(family.supplier_row.id, "Camiseta Polo", dec!(50.00))
        .await;
    let variant = app.seed_variant(product.id, "M", "Unissex", 5).await;

    let services = &app.state.services;
    services
        .cart
        .add_item(family.guardian.actor_id, product.id, variant.id, 1)
        .await
        .unwrap();

    let placed = services
        .orders
        .place_order(
            &family.guardian,
            PlaceOrderRequest {
                student_id: family.student.id,
                school_id: family.school.id,
            },
        )
        .await
        .unwrap();

    assert_eq!(placed.order.total, dec!(50.00));
    assert_eq!(placed.order.commission, dec!(7.50));
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].unit_price, dec!(50.00));
    assert_eq!(placed.items[0].supplier_id, family.supplier_row.id);

    assert_eq!(stock_of(&app, variant.id).await, 4);
    assert!(services
        .cart
        .list(family.guardian.actor_id)
        .await
        .unwrap()
        .is_empty());

    // Later price changes do not touch the snapshot.
    services
        .catalog
        .update_product(
            &family.supplier,
            product.id,
            ProductChanges {
                price: Some(dec!(60.00)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let stored = services
        .orders
        .get_order(&family.guardian, placed.order.id)
        .await
        .unwrap();
    assert_eq!(stored.items[0].subtotal, dec!(50.00));

    let details = services
        .orders
        .get_order_items(&family.guardian, placed.order.id)
        .await
        .unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].product_name, "Camiseta Polo");
    assert_eq!(details[0].supplier_name, family.supplier_row.name);
    assert_eq!(details[0].size.as_deref(), Some("M"));
    assert_eq!(details[0].color.as_deref(), Some("Branco"));
    assert_eq!(details[0].gender.as_deref(), Some("Unissex"));
    assert_eq!(details[0].item.unit_price, dec!(50.00));
}

#[tokio::test]
async fn shortfall_on_one_line_rolls_back_every_line() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let shirt = app
        .seed_product(family.supplier_row.id, "Camiseta", dec!(25.00))
        .await;
    let shorts = app
        .seed_product(family.supplier_row.id, "Bermuda", dec!(12.50))
        .await;
    let a = app.seed_variant(shirt.id, "P", "Unissex", 2).await;
    let b = app.seed_variant(shorts.id, "P", "Unissex", 0).await;

    let cart = &app.state.services.cart;
    cart.add_item(family.guardian.actor_id, shirt.id, a.id, 1)
        .await
        .unwrap();
    cart.add_item(family.guardian.actor_id, shorts.id, b.id, 1)
        .await
        .unwrap();

    let err = app
        .state
        .services
        .orders
        .place_order(
            &family.guardian,
            PlaceOrderRequest {
                student_id: family.student.id,
                school_id: family.school.id,
            },
        )
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ServiceError::InsufficientStock { product_id, requested: 1, available: 0, .. }
            if product_id == shorts.id
    );
    assert_eq!(stock_of(&app, a.id).await, 2);
    assert_eq!(stock_of(&app, b.id).await, 0);
    assert_eq!(cart.list(family.guardian.actor_id).await.unwrap().len(), 2);

    let orders = app
        .state
        .services
        .orders
        .list_for_guardian(family.guardian.actor_id)
        .await
        .unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;

    let err = app
        .state
        .services
        .orders
        .place_order(
            &family.guardian,
            PlaceOrderRequest {
                student_id: family.student.id,
                school_id: family.school.id,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::EmptyCart);
}

#[tokio::test]
async fn student_must_be_linked_to_the_guardian() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let product = app
        .seed_product(family.supplier_row.id, "Agasalho", dec!(50.00))
        .await;
    let variant = app.seed_variant(product.id, "G", "Unissex", 3).await;
    let other_student = app.seed_student(family.school.id, "Masculino").await;

    app.state
        .services
        .cart
        .add_item(family.guardian.actor_id, product.id, variant.id, 1)
        .await
        .unwrap();

    let services = &app.state.services;
    let err = services
        .orders
        .place_order(
            &family.guardian,
            PlaceOrderRequest {
                student_id: other_student.id,
                school_id: family.school.id,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let elsewhere = app.seed_school("Outra Escola").await;
    let err = services
        .orders
        .place_order(
            &family.guardian,
            PlaceOrderRequest {
                student_id: family.student.id,
                school_id: elsewhere.id,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
    assert_eq!(stock_of(&app, variant.id).await, 3);
}

#[tokio::test]
async fn only_guardians_place_orders() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;

    let err = app
        .state
        .services
        .orders
        .place_order(
            &family.supplier,
            PlaceOrderRequest {
                student_id: family.student.id,
                school_id: family.school.id,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));
}

#[tokio::test]
async fn order_visibility_follows_the_role() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let product = app
        .seed_product(family.supplier_row.id, "Calça", dec!(50.00))
        .await;
    let variant = app.seed_variant(product.id, "M", "Unissex", 2).await;
    let services = &app.state.services;

    services
        .cart
        .add_item(family.guardian.actor_id, product.id, variant.id, 1)
        .await
        .unwrap();
    let placed = services
        .orders
        .place_order(
            &family.guardian,
            PlaceOrderRequest {
                student_id: family.student.id,
                school_id: family.school.id,
            },
        )
        .await
        .unwrap();

    let manager = actor(Role::Manager, Uuid::new_v4(), Some(family.school.id));
    assert!(services.orders.get_order(&manager, placed.order.id).await.is_ok());
    assert!(services
        .orders
        .get_order(&family.supplier, placed.order.id)
        .await
        .is_ok());
    assert_eq!(
        services.orders.list_visible(&family.supplier).await.unwrap().len(),
        1
    );

    let stranger = actor(Role::Guardian, Uuid::new_v4(), Some(family.school.id));
    let err = services
        .orders
        .get_order(&stranger, placed.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Forbidden(_));

    let other_manager = actor(Role::Manager, Uuid::new_v4(), Some(Uuid::new_v4()));
    assert!(services
        .orders
        .get_order(&other_manager, placed.order.id)
        .await
        .is_err());
}

#[tokio::test]
async fn stock_taken_mid_transaction_rolls_back_the_whole_order() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let shirt = app
        .seed_product(family.supplier_row.id, "Camiseta", dec!(25.00))
        .await;
    let shorts = app
        .seed_product(family.supplier_row.id, "Bermuda", dec!(12.50))
        .await;
    let a = app.seed_variant(shirt.id, "P", "Unissex", 5).await;
    let b = app.seed_variant(shorts.id, "G", "Unissex", 4).await;

    let services = &app.state.services;
    let guardian = family.guardian.actor_id;
    services.cart.add_item(guardian, shirt.id, a.id, 1).await.unwrap();
    services.cart.add_item(guardian, shorts.id, b.id, 1).await.unwrap();

    // Drains the second line's variant once the order row exists, after the
    // stock pre-check has already passed.
    app.db()
        .execute_unprepared(
            "CREATE TRIGGER drain_size_g AFTER INSERT ON orders \
             BEGIN UPDATE product_variants SET stock_quantity = 0 WHERE size = 'G'; END",
        )
        .await
        .unwrap();

    let result = services
        .orders
        .place_order(
            &family.guardian,
            PlaceOrderRequest {
                student_id: family.student.id,
                school_id: family.school.id,
            },
        )
        .await;
    assert_matches!(
        result,
        Err(ServiceError::InsufficientStock { product_id, requested: 1, available: 0, .. })
            if product_id == shorts.id
    );

    assert!(order::Entity::find().all(app.db()).await.unwrap().is_empty());
    assert!(order_item::Entity::find().all(app.db()).await.unwrap().is_empty());
    assert_eq!(stock_of(&app, a.id).await, 5);
    assert_eq!(stock_of(&app, b.id).await, 4);
    assert_eq!(services.cart.list(guardian).await.unwrap().len(), 2);
}
