mod common;

use assert_matches::assert_matches;
use common::{actor, TestApp, GRADE};
use conecta_api::{
    auth::Role,
    errors::ServiceError,
    services::catalog::{NewProduct, ProductChanges},
};
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn managers_approve_suppliers_for_their_own_school() {
    let app = TestApp::new().await;
    let school = app.seed_school("Escola Central").await;
    let other_school = app.seed_school("Escola Norte").await;
    let alpha = app.seed_supplier("Alfa Uniformes", "alfa@test.dev").await;
    let beta = app.seed_supplier("Beta Malhas", "beta@test.dev").await;
    let manager = app.seed_manager(school.id, "gestora@test.dev").await;
    let manager = actor(Role::Manager, manager.id, Some(school.id));
    let homologations = &app.state.services.homologations;

    assert_eq!(homologations.list_available(school.id).await.unwrap().len(), 2);

    homologations
        .approve(&manager, school.id, alpha.id)
        .await
        .unwrap();
    assert!(homologations.is_approved(school.id, alpha.id).await.unwrap());

    let approved = homologations.list_approved(school.id).await.unwrap();
    assert_eq!(approved.iter().map(|s| s.id).collect::<Vec<_>>(), vec![alpha.id]);
    let available = homologations.list_available(school.id).await.unwrap();
    assert_eq!(available.iter().map(|s| s.id).collect::<Vec<_>>(), vec![beta.id]);

    assert_matches!(
        homologations.approve(&manager, other_school.id, beta.id).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        homologations.approve(&manager, school.id, Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );

    homologations
        .revoke(&manager, school.id, alpha.id)
        .await
        .unwrap();
    assert!(!homologations.is_approved(school.id, alpha.id).await.unwrap());
    assert!(homologations.list_approved(school.id).await.unwrap().is_empty());

    // Re-approval reactivates the same record.
    let first = homologations.approve(&manager, school.id, alpha.id).await.unwrap();
    let again = homologations.approve(&manager, school.id, alpha.id).await.unwrap();
    assert_eq!(first.id, again.id);
    assert!(again.active);
}

#[tokio::test]
async fn product_approval_requires_a_homologated_supplier() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let outsider = app.seed_supplier("Fora da Lista", "fora@test.dev").await;
    let manager = actor(Role::Manager, Uuid::new_v4(), Some(family.school.id));
    let catalog = &app.state.services.catalog;

    let listed = app
        .seed_product(family.supplier_row.id, "Camiseta", dec!(25.00))
        .await;
    let unlisted = app.seed_product(outsider.id, "Boné", dec!(12.50)).await;

    let approval = catalog
        .approve_product(&manager, listed.id, family.school.id, GRADE)
        .await
        .unwrap();
    let repeated = catalog
        .approve_product(&manager, listed.id, family.school.id, GRADE)
        .await
        .unwrap();
    assert_eq!(approval.id, repeated.id);

    assert_matches!(
        catalog
            .approve_product(&manager, unlisted.id, family.school.id, GRADE)
            .await,
        Err(ServiceError::InvalidInput(_))
    );
    assert_matches!(
        catalog
            .approve_product(&family.supplier, listed.id, family.school.id, GRADE)
            .await,
        Err(ServiceError::Forbidden(_))
    );

    assert!(catalog
        .revoke_product(&manager, listed.id, family.school.id, GRADE)
        .await
        .unwrap());
    assert!(!catalog
        .revoke_product(&manager, listed.id, family.school.id, GRADE)
        .await
        .unwrap());
}

#[tokio::test]
async fn catalog_filters_by_grade_gender_and_stock() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let catalog = &app.state.services.catalog;

    let skirt = app
        .seed_product(family.supplier_row.id, "Saia", dec!(50.00))
        .await;
    let skirt_f = app.seed_variant(skirt.id, "M", "Feminino", 3).await;
    app.seed_variant(skirt.id, "G", "Feminino", 0).await;
    app.seed_product_approval(skirt.id, family.school.id, GRADE).await;

    let shirt = app
        .seed_product(family.supplier_row.id, "Camiseta", dec!(25.00))
        .await;
    let shirt_u = app.seed_variant(shirt.id, "P", "Unissex", 2).await;
    app.seed_variant(shirt.id, "P", "Masculino", 4).await;
    app.seed_product_approval(shirt.id, family.school.id, GRADE).await;

    let shorts = app
        .seed_product(family.supplier_row.id, "Bermuda", dec!(25.00))
        .await;
    app.seed_variant(shorts.id, "M", "Masculino", 6).await;
    app.seed_product_approval(shorts.id, family.school.id, GRADE).await;

    let jacket = app
        .seed_product(family.supplier_row.id, "Jaqueta", dec!(50.00))
        .await;
    app.seed_variant(jacket.id, "M", "Unissex", 6).await;
    app.seed_product_approval(jacket.id, family.school.id, "9º ano").await;

    let entries = catalog
        .school_catalog(family.school.id, GRADE, "Feminino")
        .await
        .unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Camiseta", "Saia"]);

    let shirt_entry = &entries[0];
    assert_eq!(shirt_entry.supplier_name, family.supplier_row.name);
    assert_eq!(
        shirt_entry.variants.iter().map(|v| v.variant_id).collect::<Vec<_>>(),
        vec![shirt_u.id]
    );
    assert_eq!(
        entries[1].variants.iter().map(|v| v.variant_id).collect::<Vec<_>>(),
        vec![skirt_f.id]
    );

    // The guardian's student is "Feminino" in GRADE at the same school.
    let for_guardian = catalog
        .catalog_for_guardian(family.guardian.actor_id)
        .await
        .unwrap();
    assert_eq!(for_guardian, entries);
}

async fn catalog_size(app: &TestApp, school_id: Uuid) -> usize {
    app.state
        .services
        .catalog
        .school_catalog(school_id, GRADE, "Feminino")
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn revoked_suppliers_and_inactive_products_leave_the_catalog() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let services = &app.state.services;

    let shirt = app
        .seed_product(family.supplier_row.id, "Camiseta", dec!(25.00))
        .await;
    app.seed_variant(shirt.id, "M", "Unissex", 2).await;
    app.seed_product_approval(shirt.id, family.school.id, GRADE).await;
    assert_eq!(catalog_size(&app, family.school.id).await, 1);

    services
        .catalog
        .set_product_active(&family.supplier, shirt.id, false)
        .await
        .unwrap();
    assert_eq!(catalog_size(&app, family.school.id).await, 0);
    services
        .catalog
        .set_product_active(&family.supplier, shirt.id, true)
        .await
        .unwrap();
    assert_eq!(catalog_size(&app, family.school.id).await, 1);

    let manager = actor(Role::Manager, Uuid::new_v4(), Some(family.school.id));
    services
        .homologations
        .revoke(&manager, family.school.id, family.supplier_row.id)
        .await
        .unwrap();
    assert_eq!(catalog_size(&app, family.school.id).await, 0);
}

#[tokio::test]
async fn guardians_without_a_student_get_no_catalog() {
    let app = TestApp::new().await;
    let lonely = app.seed_guardian("sozinho@test.dev", None).await;
    let catalog = &app.state.services.catalog;

    assert_matches!(
        catalog.catalog_for_guardian(lonely.id).await,
        Err(ServiceError::InvalidInput(_))
    );
    assert_matches!(
        catalog.catalog_for_guardian(Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn suppliers_manage_only_their_own_products() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let catalog = &app.state.services.catalog;

    let created = catalog
        .create_product(
            &family.supplier,
            NewProduct {
                name: "Moletom".into(),
                description: Some("Algodão".into()),
                price: dec!(50.00),
            },
        )
        .await
        .unwrap();
    assert_eq!(created.supplier_id, family.supplier_row.id);
    assert!(created.active);

    let rival = actor(Role::Supplier, Uuid::new_v4(), None);
    assert_matches!(
        catalog
            .update_product(
                &rival,
                created.id,
                ProductChanges {
                    name: Some("Outro".into()),
                    ..Default::default()
                },
            )
            .await,
        Err(ServiceError::Forbidden(_))
    );

    let renamed = catalog
        .update_product(
            &family.supplier,
            created.id,
            ProductChanges {
                name: Some("Moletom Escolar".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Moletom Escolar");
    assert_eq!(renamed.price, dec!(50.00));

    let listed = catalog
        .list_supplier_products(family.supplier_row.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].product.id, created.id);
}
