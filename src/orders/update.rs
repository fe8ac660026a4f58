//! Transactional order writes and the submission push to the workflow tool.

use super::comparisons::reconcile_comparisons;
use super::fields::{editable_column_values, submission_push_fields};
use super::models::{OrderForm, OrderRecord, OrderStatus, orders};
use super::multi_group::models as multi_group;
use super::pairwise::models as pairwise;
use super::sample_items::models as sample_items;
use super::status::SUBMITTED_LABEL;
use super::sync::{find_order, require_order};
use crate::common::errors::{BusinessError, BusinessResult, DbResultExt};
use crate::common::state::AppState;
use crate::external::workflow::WorkflowError;
use crate::not_found;
use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use sea_orm::sea_query::{Expr, Value as DbValue};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, IntoActiveModel, QueryFilter, TransactionTrait,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Rows per multi-row insert when replacing child lists
pub const CHILD_INSERT_BATCH: usize = 200;
const SAMPLES_VIEW_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    pub is_submit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExternalSync {
    Synced,
    Failed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub table_status: Option<String>,
    pub samples_view_url: String,
    pub external_sync: ExternalSync,
    /// Shown to the customer when the local save went through but the push did not
    pub warning: Option<String>,
}

fn new_samples_view_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SAMPLES_VIEW_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn sequence_no(index: usize) -> BusinessResult<i32> {
    i32::try_from(index).map_err(|_| BusinessError::ValidationError {
        field: "sampleList".to_string(),
        message: "too many rows".to_string(),
    })
}

async fn insert_batched<A>(txn: &DatabaseTransaction, rows: Vec<A>) -> BusinessResult<()>
where
    A: ActiveModelTrait + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    let mut rows = rows.into_iter().peekable();
    while rows.peek().is_some() {
        let batch: Vec<A> = rows.by_ref().take(CHILD_INSERT_BATCH).collect();
        <A::Entity as EntityTrait>::insert_many(batch)
            .exec_without_returning(txn)
            .await
            .for_write()?;
    }
    Ok(())
}

/// Delete-then-insert of the three child lists; array index becomes `sequence_no`.
async fn replace_children(
    txn: &DatabaseTransaction,
    order_id: i32,
    form: OrderForm,
) -> BusinessResult<()> {
    sample_items::Entity::delete_many()
        .filter(sample_items::Column::OrderId.eq(order_id))
        .exec(txn)
        .await
        .for_write()?;
    pairwise::Entity::delete_many()
        .filter(pairwise::Column::OrderId.eq(order_id))
        .exec(txn)
        .await
        .for_write()?;
    multi_group::Entity::delete_many()
        .filter(multi_group::Column::OrderId.eq(order_id))
        .exec(txn)
        .await
        .for_write()?;

    let samples = form
        .sample_list
        .into_iter()
        .enumerate()
        .map(|(i, item)| Ok(item.into_row(order_id, sequence_no(i)?)))
        .collect::<BusinessResult<Vec<_>>>()?;
    let pairs = form
        .pairwise_comparisons
        .into_iter()
        .enumerate()
        .map(|(i, item)| Ok(item.into_row(order_id, sequence_no(i)?)))
        .collect::<BusinessResult<Vec<_>>>()?;
    let groups = form
        .multi_group_comparisons
        .into_iter()
        .enumerate()
        .map(|(i, item)| Ok(item.into_row(order_id, sequence_no(i)?)))
        .collect::<BusinessResult<Vec<_>>>()?;

    insert_batched(txn, samples).await?;
    insert_batched(txn, pairs).await?;
    insert_batched(txn, groups).await
}

fn stale_write(order_id: &str) -> BusinessError {
    BusinessError::Conflict {
        message: format!("order {order_id} was changed after it was loaded"),
    }
}

/// Header update for one order. A guarded write only lands while the row
/// still carries the `last_updated` that `existing` was read with.
async fn write_header<C: ConnectionTrait>(
    conn: &C,
    existing: &orders::Model,
    header: Vec<(orders::Column, DbValue)>,
    options: UpdateOptions,
    guarded: bool,
    now: DateTime<Utc>,
) -> BusinessResult<()> {
    let mut update = orders::Entity::update_many()
        .col_expr(orders::Column::LastUpdated, Expr::value(now));
    for (column, value) in header {
        update = update.col_expr(column, Expr::value(value));
    }
    if options.is_submit {
        update = update
            .col_expr(
                orders::Column::Status,
                Expr::value(OrderStatus::Submitted.to_value()),
            )
            .col_expr(orders::Column::SubmittedAt, Expr::value(Some(now)));
        if existing.samples_view_token.is_none() {
            update = update.col_expr(
                orders::Column::SamplesViewToken,
                Expr::value(Some(new_samples_view_token())),
            );
        }
    }
    update = update.filter(orders::Column::Id.eq(existing.id));
    if guarded {
        update = update.filter(orders::Column::LastUpdated.eq(existing.last_updated));
    }

    let result = update.exec(conn).await.for_write()?;
    if result.rows_affected == 0 {
        return Err(stale_write(&existing.uuid));
    }
    Ok(())
}

/// Write the editable header and replace the child lists in one transaction.
///
/// With `expected_last_updated` set, a write based on an older copy fails
/// with a conflict; without it the last write wins. Submitting marks the order
/// submitted and mints the samples-view token the first time.
pub async fn update_order(
    db: &DatabaseConnection,
    order_id: &str,
    mut form: OrderForm,
    options: UpdateOptions,
) -> BusinessResult<orders::Model> {
    reconcile_comparisons(&mut form);
    let header = editable_column_values(&form.fields)?;

    let txn = db.begin().await.for_write()?;
    let existing = find_order(&txn, order_id)
        .await?
        .ok_or_else(|| not_found!("order", order_id))?;

    if let Some(expected) = form.expected_last_updated {
        if expected.timestamp_millis() != existing.last_updated.timestamp_millis() {
            return Err(stale_write(order_id));
        }
    }

    let now = Utc::now();
    let guarded = form.expected_last_updated.is_some();
    write_header(&txn, &existing, header, options, guarded, now).await?;

    let counts = (
        form.sample_list.len(),
        form.pairwise_comparisons.len(),
        form.multi_group_comparisons.len(),
    );
    replace_children(&txn, existing.id, form).await?;
    txn.commit().await.for_write()?;

    tracing::info!(
        order_id,
        submit = options.is_submit,
        samples = counts.0,
        pairwise = counts.1,
        multi_group = counts.2,
        "order saved"
    );
    require_order(db, order_id).await
}

/// Save as submitted, then mirror the submission into the workflow tool.
///
/// A failed push leaves the local submission in place and is reported as a
/// warning; the local label only changes once the workflow tool accepted it.
pub async fn submit_order(
    state: &AppState,
    order_id: &str,
    form: OrderForm,
) -> BusinessResult<SubmitOutcome> {
    let model = update_order(&state.db, order_id, form, UpdateOptions { is_submit: true }).await?;
    let token = model
        .samples_view_token
        .as_deref()
        .ok_or_else(|| BusinessError::InternalError {
            message: format!("order {order_id} submitted without a samples view token"),
        })?;
    let samples_view_url = state.config.samples_view_url(&model.uuid, token);
    let push = submission_push_fields(
        &OrderRecord::from_model(&model),
        SUBMITTED_LABEL,
        &samples_view_url,
    );

    let pushed = match model.external_instance_id.as_deref() {
        Some(instance_id) => state.workflow.update_instance(instance_id, push).await,
        None => Err(WorkflowError::Upstream("order has no workflow instance".to_string())),
    };

    match pushed {
        Ok(()) => {
            if let Err(err) = orders::Entity::update_many()
                .col_expr(orders::Column::TableStatus, Expr::value(SUBMITTED_LABEL))
                .filter(orders::Column::Id.eq(model.id))
                .exec(&state.db)
                .await
            {
                tracing::error!(
                    order_id,
                    error = %err,
                    "workflow accepted submission but local label was not stored"
                );
            }
            tracing::info!(order_id, "submission pushed to workflow");
            Ok(SubmitOutcome {
                table_status: Some(SUBMITTED_LABEL.to_string()),
                samples_view_url,
                external_sync: ExternalSync::Synced,
                warning: None,
            })
        }
        Err(err) => {
            tracing::warn!(
                order_id,
                error = %err,
                "submission saved locally but workflow push failed"
            );
            Ok(SubmitOutcome {
                table_status: model.table_status,
                samples_view_url,
                external_sync: ExternalSync::Failed,
                warning: Some("订单已保存，但同步到流程系统失败，请稍后重新提交".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_helpers::{setup_test_db, test_state};
    use crate::external::workflow::InMemoryWorkflowClient;
    use crate::orders::models::EditableFields;
    use crate::orders::multi_group::models::MultiGroupComparison;
    use crate::orders::pairwise::models::PairwiseComparison;
    use crate::orders::sample_items::models::SampleItem;
    use crate::orders::sync::load_detail;
    use sea_orm::Set;
    use std::sync::Arc;

    async fn seed_order(
        db: &DatabaseConnection,
        uuid: &str,
        instance: Option<&str>,
    ) -> orders::Model {
        let now = Utc::now();
        orders::ActiveModel {
            uuid: Set(uuid.to_string()),
            customer_name: Set(Some("张三".to_string())),
            status: Set(OrderStatus::Draft),
            table_status: Set(Some("客户编辑中".to_string())),
            external_instance_id: Set(instance.map(ToString::to_string)),
            created_at: Set(now),
            last_updated: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    fn sample(name: &str, group: &str) -> SampleItem {
        SampleItem {
            sample_name: Some(name.to_string()),
            group_name: Some(group.to_string()),
            detection_or_storage: Some("检测".to_string()),
            sample_tube_count: Some(1),
            ..Default::default()
        }
    }

    fn form() -> OrderForm {
        OrderForm {
            fields: EditableFields {
                species_name: Some("小鼠".to_string()),
                detection_quantity: Some(2),
                ..Default::default()
            },
            sample_list: vec![sample("S1", "A"), sample("S2", "B")],
            pairwise_comparisons: vec![PairwiseComparison {
                control_group: Some("A".to_string()),
                treatment_group: Some("B".to_string()),
                comparison_name: None,
            }],
            multi_group_comparisons: vec![MultiGroupComparison {
                comparison_groups: vec!["A".into(), "B".into(), "gone".into()],
                comparison_name: None,
            }],
            expected_last_updated: None,
        }
    }

    #[tokio::test]
    async fn test_update_writes_header_and_children() {
        let db = setup_test_db().await;
        seed_order(&db, "ORD-1", Some("INST-1")).await;

        let model = update_order(&db, "ORD-1", form(), UpdateOptions::default()).await.unwrap();
        assert_eq!(model.species_name.as_deref(), Some("小鼠"));
        assert_eq!(model.customer_name.as_deref(), Some("张三"));
        assert_eq!(model.status, OrderStatus::Draft);
        assert!(model.samples_view_token.is_none());

        let detail = load_detail(&db, model).await.unwrap();
        assert_eq!(detail.sample_list.len(), 2);
        assert_eq!(detail.sample_list[1].sample_name.as_deref(), Some("S2"));
        assert_eq!(detail.pairwise_comparisons[0].comparison_name.as_deref(), Some("B vs A"));
        assert_eq!(detail.multi_group_comparisons[0].comparison_groups, vec!["A", "B"]);
        assert_eq!(detail.multi_group_comparisons[0].comparison_name.as_deref(), Some("A vs B"));
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let db = setup_test_db().await;
        seed_order(&db, "ORD-1", None).await;

        let first = update_order(&db, "ORD-1", form(), UpdateOptions::default()).await.unwrap();
        let first = load_detail(&db, first).await.unwrap();
        let second = update_order(&db, "ORD-1", form(), UpdateOptions::default()).await.unwrap();
        let second = load_detail(&db, second).await.unwrap();

        assert_eq!(first.sample_list, second.sample_list);
        assert_eq!(first.pairwise_comparisons, second.pairwise_comparisons);
        assert_eq!(first.multi_group_comparisons, second.multi_group_comparisons);
        assert_eq!(first.order.fields, second.order.fields);
        let rows = sample_items::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_children_replaced_in_batches() {
        let db = setup_test_db().await;
        seed_order(&db, "ORD-1", None).await;
        let mut big = form();
        big.sample_list = (0..450).map(|i| sample(&format!("S{i}"), "A")).collect();

        let model = update_order(&db, "ORD-1", big, UpdateOptions::default()).await.unwrap();
        let detail = load_detail(&db, model).await.unwrap();
        assert_eq!(detail.sample_list.len(), 450);
        assert_eq!(detail.sample_list[449].sample_name.as_deref(), Some("S449"));

        let model = update_order(&db, "ORD-1", form(), UpdateOptions::default()).await.unwrap();
        let detail = load_detail(&db, model).await.unwrap();
        assert_eq!(detail.sample_list.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let db = setup_test_db().await;
        let err = update_order(&db, "MISSING", form(), UpdateOptions::default()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_stale_write_conflicts_and_changes_nothing() {
        let db = setup_test_db().await;
        let seeded = seed_order(&db, "ORD-1", None).await;

        let mut stale = form();
        stale.expected_last_updated = Some(seeded.last_updated - chrono::Duration::seconds(5));
        let err = update_order(&db, "ORD-1", stale, UpdateOptions::default()).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        let unchanged = require_order(&db, "ORD-1").await.unwrap();
        assert!(unchanged.species_name.is_none());

        let mut fresh = form();
        fresh.expected_last_updated = Some(seeded.last_updated);
        assert!(update_order(&db, "ORD-1", fresh, UpdateOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_save_with_same_copy_conflicts() {
        let db = setup_test_db().await;
        let seeded = seed_order(&db, "ORD-1", None).await;

        // Both writers loaded `seeded`; the first one lands
        let mut first = form();
        first.expected_last_updated = Some(seeded.last_updated);
        update_order(&db, "ORD-1", first, UpdateOptions::default()).await.unwrap();

        let header = editable_column_values(&EditableFields {
            species_name: Some("大鼠".to_string()),
            ..Default::default()
        })
        .unwrap();
        let err = write_header(&db, &seeded, header, UpdateOptions::default(), true, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        let stored = require_order(&db, "ORD-1").await.unwrap();
        assert_eq!(stored.species_name.as_deref(), Some("小鼠"));
    }

    #[tokio::test]
    async fn test_submit_pushes_and_stores_label() {
        let db = setup_test_db().await;
        seed_order(&db, "ORD-1", Some("INST-1")).await;
        let workflow = Arc::new(InMemoryWorkflowClient::default());
        workflow.insert("ORD-1", "INST-1", serde_json::json!({ "CustomerName": "张三" }));
        let state = test_state(&db, workflow.clone());

        let outcome = submit_order(&state, "ORD-1", form()).await.unwrap();
        assert_eq!(outcome.external_sync, ExternalSync::Synced);
        assert_eq!(outcome.table_status.as_deref(), Some(SUBMITTED_LABEL));
        assert!(outcome.samples_view_url.starts_with("https://lims.test/order/ORD-1/view/"));

        let model = require_order(&db, "ORD-1").await.unwrap();
        assert_eq!(model.status, OrderStatus::Submitted);
        assert!(model.submitted_at.is_some());
        assert_eq!(model.table_status.as_deref(), Some(SUBMITTED_LABEL));
        let token = model.samples_view_token.clone().unwrap();
        assert_eq!(token.len(), SAMPLES_VIEW_TOKEN_LEN);

        let pushed = workflow.pushed.lock().unwrap().clone();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].0, "INST-1");
        assert_eq!(pushed[0].1["TableStatus"], SUBMITTED_LABEL);
        assert_eq!(pushed[0].1["SpeciesName"], "小鼠");
        assert_eq!(pushed[0].1["SamplesViewUrl"], outcome.samples_view_url.as_str());

        // the token survives resubmission
        submit_order(&state, "ORD-1", form()).await.unwrap();
        let again = require_order(&db, "ORD-1").await.unwrap();
        assert_eq!(again.samples_view_token, Some(token));
    }

    #[tokio::test]
    async fn test_submit_push_failure_is_a_warning() {
        let db = setup_test_db().await;
        seed_order(&db, "ORD-1", Some("INST-1")).await;
        let workflow = Arc::new(InMemoryWorkflowClient::default());
        *workflow.update_failure.lock().unwrap() = Some(WorkflowError::Upstream("down".into()));
        let state = test_state(&db, workflow);

        let outcome = submit_order(&state, "ORD-1", form()).await.unwrap();
        assert_eq!(outcome.external_sync, ExternalSync::Failed);
        assert!(outcome.warning.is_some());
        assert_eq!(outcome.table_status.as_deref(), Some("客户编辑中"));

        let model = require_order(&db, "ORD-1").await.unwrap();
        assert_eq!(model.status, OrderStatus::Submitted);
        assert_eq!(model.table_status.as_deref(), Some("客户编辑中"));
    }

    #[tokio::test]
    async fn test_submit_without_instance_is_a_warning() {
        let db = setup_test_db().await;
        seed_order(&db, "ORD-1", None).await;
        let state = test_state(&db, Arc::new(InMemoryWorkflowClient::default()));

        let outcome = submit_order(&state, "ORD-1", form()).await.unwrap();
        assert_eq!(outcome.external_sync, ExternalSync::Failed);
    }
}
