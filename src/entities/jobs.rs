use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// `http` or `shell`
    pub kind: String,
    pub schedule: String,
    /// Kind-specific payload as JSON text
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub enabled: bool,
    pub retry_limit: i32,
    pub webhook_url: Option<String>,
    /// JSON array of dependency job ids
    #[sea_orm(column_type = "Text")]
    pub depends_on: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
