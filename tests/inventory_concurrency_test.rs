mod common;

use assert_matches::assert_matches;
use common::{actor, admin, TestApp};
use conecta_api::{
    auth::Role,
    errors::ServiceError,
    services::{inventory::NewVariant, orders::PlaceOrderRequest},
};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn concurrent_decrements_never_oversell() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Malharia", "m@test.dev").await;
    let product = app.seed_product(supplier.id, "Meia", dec!(12.50)).await;
    let variant = app.seed_variant(product.id, "U", "Unissex", 10).await;

    let inventory = app.state.services.inventory.clone();
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let inventory = inventory.clone();
        let variant_id = variant.id;
        tasks.push(tokio::spawn(async move {
            inventory.decrement_stock(variant_id, 1).await.unwrap_or(false)
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }
    assert_eq!(successes, 10, "exactly 10 decrements should succeed");
    assert_eq!(inventory.get_variant(variant.id).await.unwrap().stock_quantity, 0);
}

#[tokio::test]
async fn decrement_rejects_non_positive_quantities() {
    let app = TestApp::new().await;
    let inventory = &app.state.services.inventory;
    assert_matches!(
        inventory.decrement_stock(Uuid::new_v4(), 0).await,
        Err(ServiceError::InvalidInput(_))
    );
}

#[tokio::test]
async fn two_guardians_race_for_the_last_unit() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let product = app
        .seed_product(family.supplier_row.id, "Jaqueta", dec!(50.00))
        .await;
    let variant = app.seed_variant(product.id, "M", "Unissex", 1).await;

    let second_student = app.seed_student(family.school.id, "Masculino").await;
    let second = app
        .seed_guardian("segundo@test.dev", Some(second_student.id))
        .await;
    let second = actor(Role::Guardian, second.id, Some(family.school.id));

    let services = &app.state.services;
    for guardian in [&family.guardian, &second] {
        services
            .cart
            .add_item(guardian.actor_id, product.id, variant.id, 1)
            .await
            .unwrap();
    }

    let orders = services.orders.clone();
    let first_request = PlaceOrderRequest {
        student_id: family.student.id,
        school_id: family.school.id,
    };
    let second_request = PlaceOrderRequest {
        student_id: second_student.id,
        school_id: family.school.id,
    };
    let (a, b) = tokio::join!(
        orders.place_order(&family.guardian, first_request),
        orders.place_order(&second, second_request),
    );

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let failure = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
    assert_matches!(failure, ServiceError::InsufficientStock { available: 0, .. });

    let remaining = services.inventory.get_variant(variant.id).await.unwrap();
    assert_eq!(remaining.stock_quantity, 0);
}

#[tokio::test]
async fn adding_an_existing_variant_merges_stock() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let product = app
        .seed_product(family.supplier_row.id, "Camiseta", dec!(25.00))
        .await;
    let inventory = &app.state.services.inventory;

    let first = inventory
        .add_variant(
            &family.supplier,
            product.id,
            NewVariant {
                size: "P".into(),
                color: "Azul".into(),
                gender: "Unissex".into(),
                initial_quantity: 4,
            },
        )
        .await
        .unwrap();
    assert!(!first.merged);

    let second = inventory
        .add_variant(
            &family.supplier,
            product.id,
            NewVariant {
                size: "P".into(),
                color: "Azul".into(),
                gender: "Unissex".into(),
                initial_quantity: 3,
            },
        )
        .await
        .unwrap();
    assert!(second.merged);
    assert_eq!(second.variant.id, first.variant.id);
    assert_eq!(second.variant.stock_quantity, 7);

    assert_eq!(inventory.list_variants(product.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn set_stock_is_owner_only_and_non_negative() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let product = app
        .seed_product(family.supplier_row.id, "Bermuda", dec!(25.00))
        .await;
    let variant = app.seed_variant(product.id, "G", "Masculino", 2).await;
    let inventory = &app.state.services.inventory;

    let updated = inventory
        .set_stock(&family.supplier, variant.id, 9)
        .await
        .unwrap();
    assert_eq!(updated.stock_quantity, 9);

    assert_matches!(
        inventory.set_stock(&family.supplier, variant.id, -1).await,
        Err(ServiceError::InvalidInput(_))
    );

    let rival = actor(Role::Supplier, Uuid::new_v4(), None);
    assert_matches!(
        inventory.set_stock(&rival, variant.id, 0).await,
        Err(ServiceError::Forbidden(_))
    );

    let updated = inventory.set_stock(&admin(), variant.id, 0).await.unwrap();
    assert_eq!(updated.stock_quantity, 0);
}
