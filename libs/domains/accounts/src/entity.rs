use crate::models::{ModelPermission, User};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sea-ORM Entity for the accounts_users table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts_users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub iban: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub groups: Json,      // JSONB array of group names
    pub permissions: Json, // JSONB array of ModelPermission
    pub created_by: Option<Uuid>,
    pub last_login: Option<DateTimeWithTimeZone>,
    pub date_joined: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::CreatedBy",
        to = "Column::Id",
        on_delete = "SetNull"
    )]
    Creator,
}

impl ActiveModelBehavior for ActiveModel {}

// Conversion from Sea-ORM Model to domain User
impl From<Model> for User {
    fn from(model: Model) -> Self {
        let groups: Vec<String> = serde_json::from_value(model.groups).unwrap_or_default();
        let permissions: Vec<ModelPermission> =
            serde_json::from_value(model.permissions).unwrap_or_default();

        Self {
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            iban: model.iban,
            password_hash: model.password_hash,
            is_active: model.is_active,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            groups,
            permissions,
            created_by: model.created_by,
            last_login: model.last_login.map(Into::into),
            date_joined: model.date_joined.into(),
        }
    }
}

// Conversion from domain User to a Sea-ORM Model row
impl From<User> for Model {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            iban: user.iban,
            password_hash: user.password_hash,
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            groups: serde_json::json!(user.groups),
            permissions: serde_json::json!(user.permissions),
            created_by: user.created_by,
            last_login: user.last_login.map(Into::into),
            date_joined: user.date_joined.into(),
        }
    }
}
