use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The four kinds of account. Each role has its own account table; see
/// [`super::accounts::AccountDirectory`] for the dispatch.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// School manager; runs homologation and product approval for one school.
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "supplier")]
    Supplier,
    #[sea_orm(string_value = "guardian")]
    Guardian,
    /// Platform administrator; settles commission statements.
    #[sea_orm(string_value = "admin")]
    Admin,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn text_forms_agree() {
        for (role, text) in [
            (Role::Manager, "manager"),
            (Role::Supplier, "supplier"),
            (Role::Guardian, "guardian"),
            (Role::Admin, "admin"),
        ] {
            assert_eq!(role.to_string(), text);
            assert_eq!(Role::from_str(text).unwrap(), role);
            assert_eq!(serde_json::to_string(&role).unwrap(), format!("\"{}\"", text));
        }
        assert!(Role::from_str("principal").is_err());
    }
}
