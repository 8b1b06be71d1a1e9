//! Administrator-maintained registry of schools, suppliers, school managers,
//! students and guardians.
//!
//! Rows are never deleted here: orders, statements and homologations keep
//! pointing at them, so retiring an entry means clearing its `active` flag.
//! Inactive accounts can no longer request login codes.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{accounts::normalize_email, AuthUser, Role},
    entities::{guardian, school, school_manager, student, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Genders a student may be registered with. Catalog variants may also be
/// unisex; students may not.
pub const STUDENT_GENDERS: [&str; 2] = ["Masculino", "Feminino"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegistryKind {
    Schools,
    Suppliers,
    Managers,
    Students,
    Guardians,
}

impl RegistryKind {
    fn entity_name(self) -> &'static str {
        match self {
            Self::Schools => "School",
            Self::Suppliers => "Supplier",
            Self::Managers => "School manager",
            Self::Students => "Student",
            Self::Guardians => "Guardian",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewSchool {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct SchoolChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewSupplier {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct SupplierChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 20))]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewManager {
    pub school_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct ManagerChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewStudent {
    pub school_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub enrollment: String,
    #[validate(length(min = 1, max = 50))]
    pub grade: String,
    pub gender: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct StudentChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub enrollment: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub grade: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewGuardian {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub student_id: Option<Uuid>,
}

/// `student_id` relinks the guardian; omitting it keeps the current link.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct GuardianChanges {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub student_id: Option<Uuid>,
}

fn required_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidInput(format!(
            "{} must not be blank",
            field
        )));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn student_gender(value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    STUDENT_GENDERS
        .iter()
        .find(|g| g.eq_ignore_ascii_case(trimmed))
        .map(|g| g.to_string())
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "Gender must be one of {}",
                STUDENT_GENDERS.join(", ")
            ))
        })
}

/// Creates, edits, lists and deactivates the people and schools the rest of
/// the system refers to. Every write needs an administrator.
#[derive(Clone)]
pub struct RegistryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl RegistryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn registered(&self, kind: RegistryKind, id: Uuid) {
        info!(%kind, %id, "registry entry created");
        self.event_sender
            .send_or_log(Event::RegistryEntryCreated { kind, id })
            .await;
    }

    /// Emails identify accounts at login, so they are unique per role table.
    async fn ensure_email_free(
        &self,
        kind: RegistryKind,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let db = &*self.db;
        let taken = match kind {
            RegistryKind::Suppliers => {
                let mut query = supplier::Entity::find().filter(supplier::Column::Email.eq(email));
                if let Some(id) = except {
                    query = query.filter(supplier::Column::Id.ne(id));
                }
                query.count(db).await? > 0
            }
            RegistryKind::Managers => {
                let mut query = school_manager::Entity::find()
                    .filter(school_manager::Column::Email.eq(email));
                if let Some(id) = except {
                    query = query.filter(school_manager::Column::Id.ne(id));
                }
                query.count(db).await? > 0
            }
            RegistryKind::Guardians => {
                let mut query = guardian::Entity::find().filter(guardian::Column::Email.eq(email));
                if let Some(id) = except {
                    query = query.filter(guardian::Column::Id.ne(id));
                }
                query.count(db).await? > 0
            }
            RegistryKind::Schools | RegistryKind::Students => false,
        };

        if taken {
            return Err(ServiceError::InvalidInput(format!(
                "{} email {} is already registered",
                kind.entity_name(),
                email
            )));
        }
        Ok(())
    }

    async fn ensure_school_exists(&self, school_id: Uuid) -> Result<(), ServiceError> {
        school::Entity::find_by_id(school_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("School", school_id))
    }

    async fn ensure_enrollment_free(
        &self,
        school_id: Uuid,
        enrollment: &str,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = student::Entity::find()
            .filter(student::Column::SchoolId.eq(school_id))
            .filter(student::Column::Enrollment.eq(enrollment));
        if let Some(id) = except {
            query = query.filter(student::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::InvalidInput(format!(
                "Enrollment {} already exists at school {}",
                enrollment, school_id
            )));
        }
        Ok(())
    }

    // Schools

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn create_school(
        &self,
        actor: &AuthUser,
        input: NewSchool,
    ) -> Result<school::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        input.validate()?;

        let created = school::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(required_text("name", &input.name)?),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.registered(RegistryKind::Schools, created.id).await;
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn update_school(
        &self,
        actor: &AuthUser,
        school_id: Uuid,
        changes: SchoolChanges,
    ) -> Result<school::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        changes.validate()?;

        let current = school::Entity::find_by_id(school_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("School", school_id))?;
        let mut active: school::ActiveModel = current.into();
        if let Some(name) = changes.name {
            active.name = Set(required_text("name", &name)?);
        }
        Ok(active.update(&*self.db).await?)
    }

    pub async fn list_schools(&self, actor: &AuthUser) -> Result<Vec<school::Model>, ServiceError> {
        actor.require_role(Role::Admin)?;
        let schools = school::Entity::find()
            .order_by_asc(school::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(schools)
    }

    // Suppliers

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn create_supplier(
        &self,
        actor: &AuthUser,
        input: NewSupplier,
    ) -> Result<supplier::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        input.validate()?;
        let email = normalize_email(&input.email);
        self.ensure_email_free(RegistryKind::Suppliers, &email, None)
            .await?;

        let created = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(required_text("name", &input.name)?),
            email: Set(email),
            phone: Set(optional_text(input.phone)),
            tax_id: Set(optional_text(input.tax_id)),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.registered(RegistryKind::Suppliers, created.id).await;
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn update_supplier(
        &self,
        actor: &AuthUser,
        supplier_id: Uuid,
        changes: SupplierChanges,
    ) -> Result<supplier::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        changes.validate()?;

        let current = supplier::Entity::find_by_id(supplier_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Supplier", supplier_id))?;
        let mut active: supplier::ActiveModel = current.into();
        if let Some(name) = changes.name {
            active.name = Set(required_text("name", &name)?);
        }
        if let Some(email) = changes.email {
            let email = normalize_email(&email);
            self.ensure_email_free(RegistryKind::Suppliers, &email, Some(supplier_id))
                .await?;
            active.email = Set(email);
        }
        if changes.phone.is_some() {
            active.phone = Set(optional_text(changes.phone));
        }
        if changes.tax_id.is_some() {
            active.tax_id = Set(optional_text(changes.tax_id));
        }
        Ok(active.update(&*self.db).await?)
    }

    pub async fn list_suppliers(
        &self,
        actor: &AuthUser,
    ) -> Result<Vec<supplier::Model>, ServiceError> {
        actor.require_role(Role::Admin)?;
        let suppliers = supplier::Entity::find()
            .order_by_asc(supplier::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(suppliers)
    }

    // School managers

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn create_manager(
        &self,
        actor: &AuthUser,
        input: NewManager,
    ) -> Result<school_manager::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        input.validate()?;
        self.ensure_school_exists(input.school_id).await?;
        let email = normalize_email(&input.email);
        self.ensure_email_free(RegistryKind::Managers, &email, None)
            .await?;

        let created = school_manager::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(required_text("name", &input.name)?),
            email: Set(email),
            phone: Set(optional_text(input.phone)),
            school_id: Set(input.school_id),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.registered(RegistryKind::Managers, created.id).await;
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn update_manager(
        &self,
        actor: &AuthUser,
        manager_id: Uuid,
        changes: ManagerChanges,
    ) -> Result<school_manager::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        changes.validate()?;

        let current = school_manager::Entity::find_by_id(manager_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("School manager", manager_id))?;
        let mut active: school_manager::ActiveModel = current.into();
        if let Some(name) = changes.name {
            active.name = Set(required_text("name", &name)?);
        }
        if let Some(email) = changes.email {
            let email = normalize_email(&email);
            self.ensure_email_free(RegistryKind::Managers, &email, Some(manager_id))
                .await?;
            active.email = Set(email);
        }
        if changes.phone.is_some() {
            active.phone = Set(optional_text(changes.phone));
        }
        Ok(active.update(&*self.db).await?)
    }

    /// Managers of one school, or of every school when `school_id` is absent.
    pub async fn list_managers(
        &self,
        actor: &AuthUser,
        school_id: Option<Uuid>,
    ) -> Result<Vec<school_manager::Model>, ServiceError> {
        match school_id {
            Some(id) if actor.can_manage_school(id) => {}
            _ => actor.require_role(Role::Admin)?,
        }

        let mut query = school_manager::Entity::find();
        if let Some(id) = school_id {
            query = query.filter(school_manager::Column::SchoolId.eq(id));
        }
        let managers = query
            .order_by_asc(school_manager::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(managers)
    }

    // Students

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn create_student(
        &self,
        actor: &AuthUser,
        input: NewStudent,
    ) -> Result<student::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        input.validate()?;
        self.ensure_school_exists(input.school_id).await?;
        let enrollment = required_text("enrollment", &input.enrollment)?;
        self.ensure_enrollment_free(input.school_id, &enrollment, None)
            .await?;

        let created = student::ActiveModel {
            id: Set(Uuid::new_v4()),
            school_id: Set(input.school_id),
            name: Set(required_text("name", &input.name)?),
            enrollment: Set(enrollment),
            grade: Set(required_text("grade", &input.grade)?),
            gender: Set(student_gender(&input.gender)?),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.registered(RegistryKind::Students, created.id).await;
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn update_student(
        &self,
        actor: &AuthUser,
        student_id: Uuid,
        changes: StudentChanges,
    ) -> Result<student::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        changes.validate()?;

        let current = student::Entity::find_by_id(student_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Student", student_id))?;
        let school_id = current.school_id;
        let mut active: student::ActiveModel = current.into();
        if let Some(name) = changes.name {
            active.name = Set(required_text("name", &name)?);
        }
        if let Some(enrollment) = changes.enrollment {
            let enrollment = required_text("enrollment", &enrollment)?;
            self.ensure_enrollment_free(school_id, &enrollment, Some(student_id))
                .await?;
            active.enrollment = Set(enrollment);
        }
        if let Some(grade) = changes.grade {
            active.grade = Set(required_text("grade", &grade)?);
        }
        if let Some(gender) = changes.gender {
            active.gender = Set(student_gender(&gender)?);
        }
        Ok(active.update(&*self.db).await?)
    }

    /// Students of a school by name. Managers see their own school.
    pub async fn list_students(
        &self,
        actor: &AuthUser,
        school_id: Uuid,
    ) -> Result<Vec<student::Model>, ServiceError> {
        if !actor.can_manage_school(school_id) {
            return Err(ServiceError::Forbidden(format!(
                "Not allowed to view school {}",
                school_id
            )));
        }
        let students = student::Entity::find()
            .filter(student::Column::SchoolId.eq(school_id))
            .order_by_asc(student::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(students)
    }

    // Guardians

    async fn ensure_student_exists(&self, student_id: Uuid) -> Result<(), ServiceError> {
        student::Entity::find_by_id(student_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Student", student_id))
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn create_guardian(
        &self,
        actor: &AuthUser,
        input: NewGuardian,
    ) -> Result<guardian::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        input.validate()?;
        if let Some(student_id) = input.student_id {
            self.ensure_student_exists(student_id).await?;
        }
        let email = normalize_email(&input.email);
        self.ensure_email_free(RegistryKind::Guardians, &email, None)
            .await?;

        let created = guardian::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(required_text("name", &input.name)?),
            email: Set(email),
            phone: Set(optional_text(input.phone)),
            student_id: Set(input.student_id),
            active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.registered(RegistryKind::Guardians, created.id).await;
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn update_guardian(
        &self,
        actor: &AuthUser,
        guardian_id: Uuid,
        changes: GuardianChanges,
    ) -> Result<guardian::Model, ServiceError> {
        actor.require_role(Role::Admin)?;
        changes.validate()?;

        let current = guardian::Entity::find_by_id(guardian_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Guardian", guardian_id))?;
        let mut active: guardian::ActiveModel = current.into();
        if let Some(name) = changes.name {
            active.name = Set(required_text("name", &name)?);
        }
        if let Some(email) = changes.email {
            let email = normalize_email(&email);
            self.ensure_email_free(RegistryKind::Guardians, &email, Some(guardian_id))
                .await?;
            active.email = Set(email);
        }
        if changes.phone.is_some() {
            active.phone = Set(optional_text(changes.phone));
        }
        if let Some(student_id) = changes.student_id {
            self.ensure_student_exists(student_id).await?;
            active.student_id = Set(Some(student_id));
        }
        Ok(active.update(&*self.db).await?)
    }

    pub async fn list_guardians(
        &self,
        actor: &AuthUser,
    ) -> Result<Vec<guardian::Model>, ServiceError> {
        actor.require_role(Role::Admin)?;
        let guardians = guardian::Entity::find()
            .order_by_asc(guardian::Column::Name)
            .all(&*self.db)
            .await?;
        Ok(guardians)
    }

    /// Activates or deactivates any registry entry.
    #[instrument(skip(self, actor), fields(actor_id = %actor.actor_id))]
    pub async fn set_active(
        &self,
        actor: &AuthUser,
        kind: RegistryKind,
        id: Uuid,
        active: bool,
    ) -> Result<(), ServiceError> {
        actor.require_role(Role::Admin)?;
        let db = &*self.db;

        let result = match kind {
            RegistryKind::Schools => {
                school::Entity::update_many()
                    .col_expr(school::Column::Active, Expr::value(active))
                    .filter(school::Column::Id.eq(id))
                    .exec(db)
                    .await?
            }
            RegistryKind::Suppliers => {
                supplier::Entity::update_many()
                    .col_expr(supplier::Column::Active, Expr::value(active))
                    .filter(supplier::Column::Id.eq(id))
                    .exec(db)
                    .await?
            }
            RegistryKind::Managers => {
                school_manager::Entity::update_many()
                    .col_expr(school_manager::Column::Active, Expr::value(active))
                    .filter(school_manager::Column::Id.eq(id))
                    .exec(db)
                    .await?
            }
            RegistryKind::Students => {
                student::Entity::update_many()
                    .col_expr(student::Column::Active, Expr::value(active))
                    .filter(student::Column::Id.eq(id))
                    .exec(db)
                    .await?
            }
            RegistryKind::Guardians => {
                guardian::Entity::update_many()
                    .col_expr(guardian::Column::Active, Expr::value(active))
                    .filter(guardian::Column::Id.eq(id))
                    .exec(db)
                    .await?
            }
        };

        if result.rows_affected == 0 {
            return Err(ServiceError::not_found(kind.entity_name(), id));
        }

        info!(%kind, %id, active, "registry entry activation changed");
        self.event_sender
            .send_or_log(Event::RegistryActivationChanged { kind, id, active })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn student_gender_is_normalised() {
        assert_eq!(student_gender(" feminino ").unwrap(), "Feminino");
        assert_eq!(student_gender("MASCULINO").unwrap(), "Masculino");
        assert_matches!(student_gender("Unissex"), Err(ServiceError::InvalidInput(_)));
    }

    #[test]
    fn blank_text_is_rejected_and_optional_text_collapses() {
        assert_matches!(required_text("name", "   "), Err(ServiceError::InvalidInput(_)));
        assert_eq!(required_text("name", " Escola ").unwrap(), "Escola");
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" 9999 ".into())), Some("9999".to_string()));
    }

    #[test]
    fn kinds_serialize_as_path_segments() {
        assert_eq!(RegistryKind::Managers.to_string(), "managers");
        assert_eq!(
            serde_json::from_str::<RegistryKind>("\"guardians\"").unwrap(),
            RegistryKind::Guardians
        );
    }
}
