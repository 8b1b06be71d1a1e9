mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::TestApp;
use conecta_api::{
    auth::Role,
    entities::access_code,
    errors::ServiceError,
};
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};

#[tokio::test]
async fn code_exchanges_for_a_session_once() {
    let app = TestApp::new().await;
    let family = app.seed_family().await;
    let email = family.guardian.email.clone();
    let codes = &app.state.services.access_codes;

    let issued = codes.issue(&email, Role::Guardian).await.unwrap();
    assert_eq!(issued.role, Role::Guardian);
    assert!(issued.expires_at > Utc::now());

    let code = app.delivery.last_code_for(&email).unwrap();
    assert_eq!(code.len(), app.state.config.access_code_length);

    // Case and whitespace do not matter on the way back in.
    let session = codes
        .redeem(&email.to_uppercase(), &format!(" {} ", code.to_lowercase()))
        .await
        .unwrap();
    assert_eq!(session.role, Role::Guardian);
    assert_eq!(session.actor_id, family.guardian.actor_id);

    let claims = app.state.auth.validate_token(&session.access_token).await.unwrap();
    assert_eq!(claims.school_id, Some(family.school.id.to_string()));

    assert_matches!(
        codes.redeem(&email, &code).await,
        Err(ServiceError::Unauthorized(_))
    );
}

#[tokio::test]
async fn unknown_accounts_receive_nothing() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Malharia", "malharia@test.dev").await;
    let codes = &app.state.services.access_codes;

    assert_matches!(
        codes.issue("ninguem@test.dev", Role::Guardian).await,
        Err(ServiceError::NotFound(_))
    );
    // The email exists, but not in the guardian table.
    assert_matches!(
        codes.issue(&supplier.email, Role::Guardian).await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(app.delivery.sent_count(), 0);

    codes.issue(&supplier.email, Role::Supplier).await.unwrap();
    assert_eq!(app.delivery.sent_count(), 1);
}

#[tokio::test]
async fn reissuing_invalidates_the_previous_code() {
    let app = TestApp::new().await;
    let school = app.seed_school("Escola Central").await;
    app.seed_manager(school.id, "gestora@test.dev").await;
    let codes = &app.state.services.access_codes;

    codes.issue("gestora@test.dev", Role::Manager).await.unwrap();
    let old = app.delivery.last_code_for("gestora@test.dev").unwrap();
    codes.issue("gestora@test.dev", Role::Manager).await.unwrap();
    let new = app.delivery.last_code_for("gestora@test.dev").unwrap();

    if old != new {
        assert_matches!(
            codes.redeem("gestora@test.dev", &old).await,
            Err(ServiceError::Unauthorized(_))
        );
    }
    let session = codes.redeem("gestora@test.dev", &new).await.unwrap();
    assert_eq!(session.role, Role::Manager);
}

#[tokio::test]
async fn expired_codes_are_refused_and_purged() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Malharia", "malharia@test.dev").await;
    let codes = &app.state.services.access_codes;

    codes.issue(&supplier.email, Role::Supplier).await.unwrap();
    let code = app.delivery.last_code_for(&supplier.email).unwrap();

    access_code::Entity::update_many()
        .col_expr(
            access_code::Column::ExpiresAt,
            Expr::value(Utc::now() - Duration::minutes(1)),
        )
        .filter(access_code::Column::Email.eq(supplier.email.as_str()))
        .exec(app.db())
        .await
        .unwrap();

    assert_matches!(
        codes.redeem(&supplier.email, &code).await,
        Err(ServiceError::Unauthorized(_))
    );

    // One fresh code survives the purge.
    codes.issue(&supplier.email, Role::Supplier).await.unwrap();
    assert_eq!(codes.purge_expired().await.unwrap(), 1);
    let remaining = access_code::Entity::find().all(app.db()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(!remaining[0].used);
}

#[tokio::test]
async fn revoked_sessions_stop_validating() {
    let app = TestApp::new().await;
    app.seed_supplier("Malharia", "malharia@test.dev").await;
    let codes = &app.state.services.access_codes;

    codes.issue("malharia@test.dev", Role::Supplier).await.unwrap();
    let code = app.delivery.last_code_for("malharia@test.dev").unwrap();
    let session = codes.redeem("malharia@test.dev", &code).await.unwrap();

    app.state.auth.revoke_token(&session.access_token).await.unwrap();
    assert!(app
        .state
        .auth
        .validate_token(&session.access_token)
        .await
        .is_err());
}
