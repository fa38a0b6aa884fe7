//! Category registry per workspace.
//!
//! Categories are tags offered to the user; transactions store the category
//! as free text and never reference this table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{CategoryId, EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub is_income: bool,
}

pub(crate) fn normalize_category_name(name: &str) -> ResultEngine<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(
            "category name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub is_income: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Category {
    fn from(model: Model) -> Self {
        Self {
            id: CategoryId::new(model.id),
            name: model.name,
            is_income: model.is_income,
        }
    }
}
