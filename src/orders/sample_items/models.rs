use crate::orders::fields::lenient_i32;
use sea_orm::entity::prelude::*;
use sea_orm::{NotSet, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sample_list")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub sequence_no: i32,
    pub sample_name: Option<String>,
    pub analysis_name: Option<String>,
    pub group_name: Option<String>,
    pub detection_or_storage: Option<String>,
    pub sample_tube_count: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub experiment_description: Option<String>,
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

/// One row of the sample table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SampleItem {
    pub sample_name: Option<String>,
    pub analysis_name: Option<String>,
    pub group_name: Option<String>,
    pub detection_or_storage: Option<String>,
    #[serde(deserialize_with = "lenient_i32")]
    pub sample_tube_count: Option<i32>,
    pub experiment_description: Option<String>,
}

fn blank(value: Option<&String>) -> bool {
    value.is_none_or(|s| s.trim().is_empty())
}

impl SampleItem {
    /// Template rows the customer never touched
    pub fn is_blank(&self) -> bool {
        blank(self.sample_name.as_ref())
            && blank(self.analysis_name.as_ref())
            && blank(self.group_name.as_ref())
            && blank(self.detection_or_storage.as_ref())
            && self.sample_tube_count.is_none()
            && blank(self.experiment_description.as_ref())
    }

    pub fn into_row(self, order_id: i32, sequence_no: i32) -> ActiveModel {
        ActiveModel {
            id: NotSet,
            order_id: Set(order_id),
            sequence_no: Set(sequence_no),
            sample_name: Set(self.sample_name),
            analysis_name: Set(self.analysis_name),
            group_name: Set(self.group_name),
            detection_or_storage: Set(self.detection_or_storage),
            sample_tube_count: Set(self.sample_tube_count),
            experiment_description: Set(self.experiment_description),
        }
    }
}

impl From<Model> for SampleItem {
    fn from(model: Model) -> Self {
        Self {
            sample_name: model.sample_name,
            analysis_name: model.analysis_name,
            group_name: model.group_name,
            detection_or_storage: model.detection_or_storage,
            sample_tube_count: model.sample_tube_count,
            experiment_description: model.experiment_description,
        }
    }
}
