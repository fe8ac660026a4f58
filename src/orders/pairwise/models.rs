use crate::orders::comparisons::pairwise_name;
use sea_orm::entity::prelude::*;
use sea_orm::{NotSet, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "pairwise_comparison")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub sequence_no: i32,
    pub control_group: Option<String>,
    pub treatment_group: Option<String>,
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

/// Control group versus treatment group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PairwiseComparison {
    pub control_group: Option<String>,
    #[serde(alias = "experimentalGroup")]
    pub treatment_group: Option<String>,
    /// Derived as "treatment vs control"
    pub comparison_name: Option<String>,
}

impl PairwiseComparison {
    pub fn into_row(self, order_id: i32, sequence_no: i32) -> ActiveModel {
        let name = pairwise_name(self.treatment_group.as_deref(), self.control_group.as_deref());
        ActiveModel {
            id: NotSet,
            order_id: Set(order_id),
            sequence_no: Set(sequence_no),
            control_group: Set(self.control_group),
            treatment_group: Set(self.treatment_group),
            comparison_name: Set(name),
        }
    }
}

impl From<Model> for PairwiseComparison {
    fn from(model: Model) -> Self {
        Self {
            control_group: model.control_group,
            treatment_group: model.treatment_group,
            comparison_name: model.comparison_name,
        }
    }
}
