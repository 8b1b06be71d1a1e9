#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use chrono::{DateTime, Utc};
use conecta_api::{
    auth::{Account, AuthConfig, AuthService, AuthUser, CodeDelivery, Role},
    config::AppConfig,
    db,
    entities::{
        guardian, homologation, product, product_approval, product_variant, school,
        school_manager, student, supplier,
    },
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const GRADE: &str = "5º ano";

/// Captures login codes instead of mailing them.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingDelivery {
    /// The most recent code sent to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl CodeDelivery for RecordingDelivery {
    async fn deliver(
        &self,
        account: &Account,
        code: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((account.email.clone(), code.to_string()));
        Ok(())
    }
}

/// Application state and router backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub delivery: Arc<RecordingDelivery>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps the in-memory database alive and shared.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let delivery = Arc::new(RecordingDelivery::default());

        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            auth_service.clone(),
            delivery.clone(),
            &cfg,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            auth: auth_service,
            services,
        };

        Self {
            router: conecta_api::app_router(state.clone()),
            state,
            delivery,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    /// Signs a session token for an account without going through a login code.
    pub fn token_for(&self, user: &AuthUser) -> String {
        let account = Account {
            id: user.actor_id,
            role: user.role,
            name: "Test".to_string(),
            email: user.email.clone(),
            school_id: user.school_id,
        };
        self.state
            .auth
            .generate_token(&account)
            .expect("token")
            .access_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    // Seeding helpers. Each returns the inserted row.

    pub async fn seed_school(&self, name: &str) -> school::Model {
        school::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed school")
    }

    pub async fn seed_manager(&self, school_id: Uuid, email: &str) -> school_manager::Model {
        school_manager::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Gestora".to_string()),
            email: Set(email.to_string()),
            phone: Set(None),
            school_id: Set(school_id),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed manager")
    }

    pub async fn seed_supplier(&self, name: &str, email: &str) -> supplier::Model {
        supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            phone: Set(None),
            tax_id: Set(None),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed supplier")
    }

    pub async fn seed_homologation(&self, school_id: Uuid, supplier_id: Uuid) {
        homologation::ActiveModel {
            id: Set(Uuid::new_v4()),
            school_id: Set(school_id),
            supplier_id: Set(supplier_id),
            active: Set(true),
            approved_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed homologation");
    }

    pub async fn seed_product(&self, supplier_id: Uuid, name: &str, price: Decimal) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            supplier_id: Set(supplier_id),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed product")
    }

    pub async fn seed_variant(
        &self,
        product_id: Uuid,
        size: &str,
        gender: &str,
        stock: i32,
    ) -> product_variant::Model {
        let now = Utc::now();
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            size: Set(size.to_string()),
            color: Set("Branco".to_string()),
            gender: Set(gender.to_string()),
            stock_quantity: Set(stock),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed variant")
    }

    pub async fn seed_product_approval(&self, product_id: Uuid, school_id: Uuid, grade: &str) {
        product_approval::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            school_id: Set(school_id),
            grade: Set(grade.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed product approval");
    }

    pub async fn seed_student(&self, school_id: Uuid, gender: &str) -> student::Model {
        student::ActiveModel {
            id: Set(Uuid::new_v4()),
            school_id: Set(school_id),
            name: Set("Aluno".to_string()),
            enrollment: Set(Uuid::new_v4().simple().to_string()),
            grade: Set(GRADE.to_string()),
            gender: Set(gender.to_string()),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed student")
    }

    pub async fn seed_guardian(&self, email: &str, student_id: Option<Uuid>) -> guardian::Model {
        guardian::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Responsável".to_string()),
            email: Set(email.to_string()),
            phone: Set(None),
            student_id: Set(student_id),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed guardian")
    }

    /// A school with one homologated supplier, a student and a linked guardian.
    pub async fn seed_family(&self) -> Family {
        let school = self.seed_school("Escola Central").await;
        let supplier = self
            .seed_supplier("Malharia Sul", &format!("sup-{}@test.dev", Uuid::new_v4().simple()))
            .await;
        self.seed_homologation(school.id, supplier.id).await;
        let student = self.seed_student(school.id, "Feminino").await;
        let guardian = self
            .seed_guardian(
                &format!("resp-{}@test.dev", Uuid::new_v4().simple()),
                Some(student.id),
            )
            .await;
        let guardian_user = AuthUser {
            email: guardian.email.clone(),
            ..actor(Role::Guardian, guardian.id, Some(school.id))
        };

        Family {
            guardian: guardian_user,
            supplier: actor(Role::Supplier, supplier.id, None),
            school,
            supplier_row: supplier,
            student,
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub struct Family {
    pub school: school::Model,
    pub supplier_row: supplier::Model,
    pub student: student::Model,
    pub guardian: AuthUser,
    pub supplier: AuthUser,
}

pub fn actor(role: Role, actor_id: Uuid, school_id: Option<Uuid>) -> AuthUser {
    AuthUser {
        actor_id,
        role,
        school_id,
        email: format!("{}@test.dev", actor_id.simple()),
        token_id: Uuid::new_v4().to_string(),
    }
}

pub fn admin() -> AuthUser {
    actor(Role::Admin, Uuid::new_v4(), None)
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
