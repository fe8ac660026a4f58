use crate::orders::comparisons::{deserialize_groups, multi_group_name, normalize_groups};
use sea_orm::entity::prelude::*;
use sea_orm::{NotSet, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "multi_group_comparison")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub sequence_no: i32,
    /// JSON array of group names
    #[sea_orm(column_type = "Text")]
    pub comparison_groups: String,
    pub comparison_name: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::orders::models::orders::Entity",
        from = "Column::OrderId",
        to = "crate::orders::models::orders::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Orders,
}

impl Related<crate::orders::models::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Comparison across a set of at least two groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct MultiGroupComparison {
    /// Accepts either an array or a comma-separated string
    #[serde(deserialize_with = "deserialize_groups")]
    pub comparison_groups: Vec<String>,
    pub comparison_name: Option<String>,
}

impl MultiGroupComparison {
    pub fn into_row(self, order_id: i32, sequence_no: i32) -> ActiveModel {
        let name = multi_group_name(&self.comparison_groups);
        let groups = serde_json::Value::from(self.comparison_groups).to_string();
        ActiveModel {
            id: NotSet,
            order_id: Set(order_id),
            sequence_no: Set(sequence_no),
            comparison_groups: Set(groups),
            comparison_name: Set(Some(name)),
        }
    }
}

impl From<Model> for MultiGroupComparison {
    fn from(model: Model) -> Self {
        // Older rows may hold a plain comma list
        let raw = serde_json::from_str(&model.comparison_groups)
            .unwrap_or(serde_json::Value::String(model.comparison_groups));
        Self {
            comparison_groups: normalize_groups(&raw),
            comparison_name: model.comparison_name,
        }
    }
}
