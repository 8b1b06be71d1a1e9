use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Uniform vendor. Lists products, fulfils orders and receives monthly payouts.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "suppliers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(nullable)]
    pub phone: Option<String>,
    /// Company registration number.
    #[sea_orm(nullable)]
    pub tax_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    #[sea_orm(has_many = "super::homologation::Entity")]
    Homologations,
    #[sea_orm(has_many = "super::commission_statement::Entity")]
    CommissionStatements,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::homologation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Homologations.def()
    }
}

impl Related<super::commission_statement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommissionStatements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
