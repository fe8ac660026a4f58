use super::fields::{lenient_bool, lenient_i32, lenient_timestamp};
use super::multi_group::models::MultiGroupComparison;
use super::pairwise::models::PairwiseComparison;
use super::sample_items::models::SampleItem;
use super::status::StatusView;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use orders::OrderStatus;

pub mod orders {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;

    /// Local lifecycle of an order, independent of the workflow label.
    #[derive(
        Debug,
        Clone,
        Copy,
        Default,
        PartialEq,
        Eq,
        EnumIter,
        DeriveActiveEnum,
        ToSchema,
        Serialize,
        Deserialize,
    )]
    #[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
    #[serde(rename_all = "snake_case")]
    pub enum OrderStatus {
        #[default]
        #[sea_orm(string_value = "draft")]
        Draft,
        #[sea_orm(string_value = "submitted")]
        Submitted,
    }

    /// Local order row; `uuid` is the workflow business key.
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "orders")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(unique)]
        pub uuid: String,
        pub customer_name: Option<String>,
        pub customer_unit: Option<String>,
        pub customer_phone: Option<String>,
        pub customer_email: Option<String>,
        pub customer_department: Option<String>,
        pub salesman_name: Option<String>,
        pub salesman_contact: Option<String>,
        pub species_name: Option<String>,
        pub species_latin_name: Option<String>,
        pub sample_type: Option<String>,
        #[sea_orm(column_type = "Text", nullable)]
        pub sample_type_detail: Option<String>,
        pub cell_count: Option<i32>,
        pub preservation_medium: Option<String>,
        #[sea_orm(column_type = "Text", nullable)]
        pub pre_processing: Option<String>,
        #[sea_orm(column_type = "Text", nullable)]
        pub special_instructions: Option<String>,
        pub remaining_sample_handling: Option<String>,
        pub detection_quantity: Option<i32>,
        pub shipping_method: Option<String>,
        pub express_company_waybill: Option<String>,
        pub shipping_time: Option<DateTime<Utc>>,
        pub need_bioinformatics_analysis: Option<bool>,
        pub status: OrderStatus,
        pub table_status: Option<String>,
        pub external_instance_id: Option<String>,
        #[sea_orm(unique)]
        pub samples_view_token: Option<String>,
        pub user_id: Option<String>,
        pub submitted_at: Option<DateTime<Utc>>,
        pub created_at: DateTime<Utc>,
        pub last_updated: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "crate::orders::sample_items::models::Entity")]
        SampleList,
        #[sea_orm(has_many = "crate::orders::pairwise::models::Entity")]
        PairwiseComparisons,
        #[sea_orm(has_many = "crate::orders::multi_group::models::Entity")]
        MultiGroupComparisons,
    }

    impl Related<crate::orders::sample_items::models::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::SampleList.def()
        }
    }

    impl Related<crate::orders::pairwise::models::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::PairwiseComparisons.def()
        }
    }

    impl Related<crate::orders::multi_group::models::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::MultiGroupComparisons.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl Model {
        /// A row whose customer identity never arrived is a failed partial sync.
        pub fn has_customer_data(&self) -> bool {
            [&self.customer_name, &self.customer_phone, &self.customer_unit]
                .into_iter()
                .any(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
        }

        /// Header state of a row nobody has worked on since it was created.
        /// Child rows are not visible from here.
        pub fn is_untouched_stub(&self) -> bool {
            !self.has_customer_data()
                && self.status == OrderStatus::Draft
                && self.submitted_at.is_none()
                && self.user_id.is_none()
                && self.last_updated == self.created_at
        }
    }
}

/// The customer-editable header of the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EditableFields {
    pub species_name: Option<String>,
    pub species_latin_name: Option<String>,
    pub sample_type: Option<String>,
    pub sample_type_detail: Option<String>,
    #[serde(deserialize_with = "lenient_i32")]
    pub cell_count: Option<i32>,
    pub preservation_medium: Option<String>,
    pub pre_processing: Option<String>,
    pub special_instructions: Option<String>,
    pub remaining_sample_handling: Option<String>,
    #[serde(deserialize_with = "lenient_i32")]
    pub detection_quantity: Option<i32>,
    pub shipping_method: Option<String>,
    pub express_company_waybill: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub shipping_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_bool")]
    pub need_bioinformatics_analysis: Option<bool>,
}

impl EditableFields {
    pub fn wants_bioinformatics(&self) -> bool {
        self.need_bioinformatics_analysis == Some(true)
    }
}

/// Order header in API shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderRecord {
    pub uuid: String,
    pub customer_name: Option<String>,
    pub customer_unit: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub customer_department: Option<String>,
    pub salesman_name: Option<String>,
    pub salesman_contact: Option<String>,
    #[serde(flatten)]
    pub fields: EditableFields,
    pub status: OrderStatus,
    pub table_status: Option<String>,
    pub external_instance_id: Option<String>,
    pub samples_view_token: Option<String>,
    pub user_id: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Body of save and submit requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderForm {
    #[serde(flatten)]
    pub fields: EditableFields,
    pub sample_list: Vec<SampleItem>,
    pub pairwise_comparisons: Vec<PairwiseComparison>,
    pub multi_group_comparisons: Vec<MultiGroupComparison>,
    /// `lastUpdated` of the copy the client edited; stale writes are refused
    pub expected_last_updated: Option<DateTime<Utc>>,
}

/// Everything the order page renders.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderRecord,
    pub sample_list: Vec<SampleItem>,
    pub pairwise_comparisons: Vec<PairwiseComparison>,
    pub multi_group_comparisons: Vec<MultiGroupComparison>,
    pub status_view: StatusView,
}

/// Lab-facing projection behind the samples link. Carries no customer identity.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SamplesView {
    pub uuid: String,
    pub species_name: Option<String>,
    pub species_latin_name: Option<String>,
    pub sample_type: Option<String>,
    pub sample_type_detail: Option<String>,
    pub detection_quantity: Option<i32>,
    pub need_bioinformatics_analysis: Option<bool>,
    pub table_status: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub sample_list: Vec<SampleItem>,
    pub pairwise_comparisons: Vec<PairwiseComparison>,
    pub multi_group_comparisons: Vec<MultiGroupComparison>,
}

impl From<OrderDetail> for SamplesView {
    fn from(detail: OrderDetail) -> Self {
        let OrderDetail {
            order,
            sample_list,
            pairwise_comparisons,
            multi_group_comparisons,
            ..
        } = detail;
        Self {
            uuid: order.uuid,
            species_name: order.fields.species_name,
            species_latin_name: order.fields.species_latin_name,
            sample_type: order.fields.sample_type,
            sample_type_detail: order.fields.sample_type_detail,
            detection_quantity: order.fields.detection_quantity,
            need_bioinformatics_analysis: order.fields.need_bioinformatics_analysis,
            table_status: order.table_status,
            submitted_at: order.submitted_at,
            sample_list,
            pairwise_comparisons,
            multi_group_comparisons,
        }
    }
}
