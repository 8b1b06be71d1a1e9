use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    entities::{
        guardian, product, product_approval,
        product_variant::{self, UNISEX},
        student, supplier,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{homologation::HomologationService, inventory::ensure_product_owner},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

/// A supplier's product with its stock at a glance.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub product: product::Model,
    pub variant_count: usize,
    pub total_stock: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CatalogVariant {
    pub variant_id: Uuid,
    pub size: String,
    pub color: String,
    pub gender: String,
    pub stock_quantity: i32,
}

/// A product as a family sees it in the school catalog.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CatalogEntry {
    pub product_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub supplier_id: Uuid,
    pub supplier_name: String,
    pub variants: Vec<CatalogVariant>,
}

fn check_price(price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() {
        return Err(ServiceError::InvalidInput(
            "Price cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Supplier products, per-school approvals and the filtered school catalog.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    homologations: HomologationService,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            homologations: HomologationService::new(db.clone(), event_sender.clone()),
            db,
            event_sender,
        }
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn create_product(
        &self,
        actor: &AuthUser,
        input: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        actor.require_role(Role::Supplier)?;
        check_price(input.price)?;

        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            supplier_id: Set(actor.actor_id),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            price: Set(input.price),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;
        info!(product_id = %created.id, "product created");
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn update_product(
        &self,
        actor: &AuthUser,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> Result<product::Model, ServiceError> {
        let current = self.get_product(product_id).await?;
        ensure_product_owner(actor, &current)?;

        let mut active: product::ActiveModel = current.into();
        if let Some(name) = changes.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = changes.price {
            check_price(price)?;
            active.price = Set(price);
        }
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(updated)
    }

    /// Inactive products drop out of the catalog and cannot be added to carts.
    pub async fn set_product_active(
        &self,
        actor: &AuthUser,
        product_id: Uuid,
        is_active: bool,
    ) -> Result<product::Model, ServiceError> {
        let current = self.get_product(product_id).await?;
        ensure_product_owner(actor, &current)?;

        let mut active: product::ActiveModel = current.into();
        active.active = Set(is_active);
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        Ok(updated)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))
    }

    /// All products of a supplier, active or not, by name.
    pub async fn list_supplier_products(
        &self,
        supplier_id: Uuid,
    ) -> Result<Vec<ProductSummary>, ServiceError> {
        let products = product::Entity::find()
            .filter(product::Column::SupplierId.eq(supplier_id))
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?;
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let variants = product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.is_in(products.iter().map(|p| p.id)))
            .all(&*self.db)
            .await?;
        let mut stock: HashMap<Uuid, (usize, i64)> = HashMap::new();
        for v in &variants {
            let entry = stock.entry(v.product_id).or_default();
            entry.0 += 1;
            entry.1 += i64::from(v.stock_quantity);
        }

        Ok(products
            .into_iter()
            .map(|product| {
                let (variant_count, total_stock) =
                    stock.get(&product.id).copied().unwrap_or_default();
                ProductSummary {
                    product,
                    variant_count,
                    total_stock,
                }
            })
            .collect())
    }

    /// Makes a product available to one grade of a school. Approving twice
    /// returns the existing approval.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn approve_product(
        &self,
        actor: &AuthUser,
        product_id: Uuid,
        school_id: Uuid,
        grade: &str,
    ) -> Result<product_approval::Model, ServiceError> {
        if !actor.can_manage_school(school_id) {
            return Err(ServiceError::Forbidden(format!(
                "Not allowed to manage school {}",
                school_id
            )));
        }
        let product = self.get_product(product_id).await?;
        if !self
            .homologations
            .is_approved(school_id, product.supplier_id)
            .await?
        {
            return Err(ServiceError::InvalidInput(format!(
                "Supplier of product {} is not approved for this school",
                product.name
            )));
        }

        let grade = grade.trim().to_string();
        let existing = product_approval::Entity::find()
            .filter(product_approval::Column::ProductId.eq(product_id))
            .filter(product_approval::Column::SchoolId.eq(school_id))
            .filter(product_approval::Column::Grade.eq(grade.as_str()))
            .one(&*self.db)
            .await?;
        if let Some(approval) = existing {
            return Ok(approval);
        }

        let approval = product_approval::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            school_id: Set(school_id),
            grade: Set(grade),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;
        Ok(approval)
    }

    /// Removes a product approval; returns whether one existed.
    pub async fn revoke_product(
        &self,
        actor: &AuthUser,
        product_id: Uuid,
        school_id: Uuid,
        grade: &str,
    ) -> Result<bool, ServiceError> {
        if !actor.can_manage_school(school_id) {
            return Err(ServiceError::Forbidden(format!(
                "Not allowed to manage school {}",
                school_id
            )));
        }
        let result = product_approval::Entity::delete_many()
            .filter(product_approval::Column::ProductId.eq(product_id))
            .filter(product_approval::Column::SchoolId.eq(school_id))
            .filter(product_approval::Column::Grade.eq(grade.trim()))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Products a student of the given grade and gender can buy: active,
    /// approved for the grade, from an approved supplier, with at least one
    /// in-stock variant of that gender or unisex. Ordered by name.
    #[instrument(skip(self))]
    pub async fn school_catalog(
        &self,
        school_id: Uuid,
        grade: &str,
        gender: &str,
    ) -> Result<Vec<CatalogEntry>, ServiceError> {
        let approved_products: Vec<Uuid> = product_approval::Entity::find()
            .filter(product_approval::Column::SchoolId.eq(school_id))
            .filter(product_approval::Column::Grade.eq(grade.trim()))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|a| a.product_id)
            .collect();
        let approved_suppliers = self.homologations.approved_supplier_ids(school_id).await?;
        if approved_products.is_empty() || approved_suppliers.is_empty() {
            return Ok(Vec::new());
        }

        let products: Vec<product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(approved_products))
            .filter(product::Column::Active.eq(true))
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?
            .into_iter()
            .filter(|p| approved_suppliers.contains(&p.supplier_id))
            .collect();
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let suppliers: HashMap<Uuid, supplier::Model> = supplier::Entity::find()
            .filter(supplier::Column::Id.is_in(products.iter().map(|p| p.supplier_id)))
            .filter(supplier::Column::Active.eq(true))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut variants: BTreeMap<Uuid, Vec<CatalogVariant>> = BTreeMap::new();
        for v in product_variant::Entity::find()
            .filter(product_variant::Column::ProductId.is_in(products.iter().map(|p| p.id)))
            .filter(product_variant::Column::Gender.is_in([gender.trim(), UNISEX]))
            .filter(product_variant::Column::StockQuantity.gt(0))
            .order_by_asc(product_variant::Column::Gender)
            .order_by_asc(product_variant::Column::Size)
            .all(&*self.db)
            .await?
        {
            variants.entry(v.product_id).or_default().push(CatalogVariant {
                variant_id: v.id,
                size: v.size,
                color: v.color,
                gender: v.gender,
                stock_quantity: v.stock_quantity,
            });
        }

        let entries = products
            .into_iter()
            .filter_map(|p| {
                let supplier = suppliers.get(&p.supplier_id)?;
                let variants = variants.remove(&p.id)?;
                Some(CatalogEntry {
                    product_id: p.id,
                    name: p.name,
                    description: p.description,
                    price: p.price,
                    supplier_id: supplier.id,
                    supplier_name: supplier.name.clone(),
                    variants,
                })
            })
            .collect();
        Ok(entries)
    }

    /// The catalog for the student linked to a guardian.
    pub async fn catalog_for_guardian(
        &self,
        guardian_id: Uuid,
    ) -> Result<Vec<CatalogEntry>, ServiceError> {
        let (_, student) = guardian::Entity::find_by_id(guardian_id)
            .find_also_related(student::Entity)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Guardian", guardian_id))?;
        let student = student.ok_or_else(|| {
            ServiceError::InvalidInput("Guardian has no linked student".to_string())
        })?;

        self.school_catalog(student.school_id, &student.grade, &student.gender)
            .await
    }
}
