//! Lazy import of orders from the workflow tool and first-touch binding.

use super::access::check_access;
use super::fields::{self, FieldOwner};
use super::models::{OrderDetail, OrderRecord, OrderStatus, orders};
use super::multi_group::models as multi_group;
use super::pairwise::models as pairwise;
use super::sample_items::models as sample_items;
use super::status::{is_editable, resolve_status};
use crate::common::auth::Caller;
use crate::common::errors::{BusinessError, BusinessResult, DbErrorExt, DbResultExt};
use crate::external::workflow::{ExternalRecord, WorkflowClient};
use crate::not_found;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use serde_json::{Map, Value};

pub async fn find_order<C: ConnectionTrait>(
    conn: &C,
    order_id: &str,
) -> BusinessResult<Option<orders::Model>> {
    orders::Entity::find()
        .filter(orders::Column::Uuid.eq(order_id))
        .one(conn)
        .await
        .in_context("order")
}

pub async fn require_order<C: ConnectionTrait>(
    conn: &C,
    order_id: &str,
) -> BusinessResult<orders::Model> {
    find_order(conn, order_id)
        .await?
        .ok_or_else(|| not_found!("order", order_id))
}

/// Header plus the three child lists in display order.
pub async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    model: orders::Model,
) -> BusinessResult<OrderDetail> {
    let samples = sample_items::Entity::find()
        .filter(sample_items::Column::OrderId.eq(model.id))
        .order_by_asc(sample_items::Column::SequenceNo)
        .all(conn)
        .await
        .in_context("sample list")?;
    let pairwise = pairwise::Entity::find()
        .filter(pairwise::Column::OrderId.eq(model.id))
        .order_by_asc(pairwise::Column::SequenceNo)
        .all(conn)
        .await
        .in_context("pairwise comparison")?;
    let multi_group = multi_group::Entity::find()
        .filter(multi_group::Column::OrderId.eq(model.id))
        .order_by_asc(multi_group::Column::SequenceNo)
        .all(conn)
        .await
        .in_context("multi group comparison")?;

    Ok(OrderDetail {
        order: OrderRecord::from_model(&model),
        status_view: resolve_status(model.table_status.as_deref(), model.status),
        sample_list: samples.into_iter().map(Into::into).collect(),
        pairwise_comparisons: pairwise.into_iter().map(Into::into).collect(),
        multi_group_comparisons: multi_group.into_iter().map(Into::into).collect(),
    })
}

async fn insert_from_external(
    db: &DatabaseConnection,
    order_id: &str,
    record: &ExternalRecord,
) -> Result<orders::Model, DbErr> {
    let app = fields::external_to_app(&record.form_data);
    let now = Utc::now();

    let mut order = orders::ActiveModel {
        uuid: Set(order_id.to_string()),
        status: Set(OrderStatus::Draft),
        table_status: Set(app
            .get("tableStatus")
            .and_then(fields::coerce_text)
            .filter(|s| !s.is_empty())),
        external_instance_id: Set(Some(record.instance_id.clone())),
        created_at: Set(now),
        last_updated: Set(now),
        ..Default::default()
    };
    for owner in [FieldOwner::External, FieldOwner::Editable] {
        let values = fields::column_values(&app, owner).map_err(|e| DbErr::Custom(e.to_string()))?;
        for (column, value) in values {
            order.set(column, value);
        }
    }
    order.insert(db).await
}

/// Run the access check and perform first-touch binding when it asks for it.
///
/// Binding only succeeds while the row is still unbound; whoever loses the
/// race is re-checked against the stored owner.
pub async fn authorize(
    db: &DatabaseConnection,
    model: orders::Model,
    caller: &Caller,
) -> BusinessResult<orders::Model> {
    let decision = check_access(&OrderRecord::from_model(&model), caller).into_result()?;
    let Some(user_id) = caller.user_id.as_deref().filter(|_| decision.should_bind) else {
        return Ok(model);
    };

    let result = orders::Entity::update_many()
        .col_expr(orders::Column::UserId, Expr::value(user_id))
        .filter(orders::Column::Id.eq(model.id))
        .filter(orders::Column::UserId.is_null())
        .exec(db)
        .await
        .in_context("order")?;
    let current = require_order(db, &model.uuid).await?;

    if result.rows_affected == 1 {
        tracing::info!(order_id = %model.uuid, user_id, "order bound to customer on first access");
    } else {
        tracing::warn!(order_id = %model.uuid, user_id, "order was bound concurrently");
        check_access(&OrderRecord::from_model(&current), caller).into_result()?;
    }
    Ok(current)
}

/// A row without customer data that nobody saved, submitted, bound or
/// filled with samples is a leftover of an interrupted import.
async fn is_abandoned_import(
    db: &DatabaseConnection,
    model: &orders::Model,
) -> BusinessResult<bool> {
    if !model.is_untouched_stub() {
        return Ok(false);
    }
    let samples = sample_items::Entity::find()
        .filter(sample_items::Column::OrderId.eq(model.id))
        .count(db)
        .await
        .in_context("sample list")?;
    let pairwise = pairwise::Entity::find()
        .filter(pairwise::Column::OrderId.eq(model.id))
        .count(db)
        .await
        .in_context("pairwise comparison")?;
    let multi_group = multi_group::Entity::find()
        .filter(multi_group::Column::OrderId.eq(model.id))
        .count(db)
        .await
        .in_context("multi group comparison")?;
    Ok(samples + pairwise + multi_group == 0)
}

/// Return the local order, importing it from the workflow tool on first access.
///
/// An abandoned import row is replaced; any other local row is served as is.
/// Importing needs the workflow user context; without it no external call is
/// made.
pub async fn get_or_create_order(
    db: &DatabaseConnection,
    workflow: &dyn WorkflowClient,
    order_id: &str,
    external_user: Option<&str>,
    caller: &Caller,
) -> BusinessResult<OrderDetail> {
    if let Some(existing) = find_order(db, order_id).await? {
        if !is_abandoned_import(db, &existing).await? {
            let model = authorize(db, existing, caller).await?;
            return load_detail(db, model).await;
        }
        tracing::warn!(order_id, "discarding abandoned order row");
        orders::Entity::delete_by_id(existing.id)
            .exec(db)
            .await
            .in_context("order")?;
    }

    let external_user = external_user
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(BusinessError::MissingExternalContext)?;

    let record = workflow
        .fetch_by_business_key(order_id)
        .await?
        .ok_or_else(|| not_found!("order", order_id))?;
    tracing::info!(
        order_id,
        workflow_user = external_user,
        instance_id = %record.instance_id,
        "importing order from workflow"
    );

    let model = match insert_from_external(db, order_id, &record).await {
        Ok(model) => model,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            tracing::info!(order_id, "order imported concurrently, using the stored row");
            require_order(db, order_id).await?
        }
        Err(err) => return Err(err.to_business_error("order")),
    };

    let model = authorize(db, model, caller).await?;
    load_detail(db, model).await
}

/// Pull the current status label and workflow-owned fields from the workflow
/// tool. An editable label reopens the edit window.
pub async fn refresh_table_status(
    db: &DatabaseConnection,
    workflow: &dyn WorkflowClient,
    order_id: &str,
) -> BusinessResult<orders::Model> {
    let model = require_order(db, order_id).await?;
    let record = workflow
        .fetch_by_business_key(order_id)
        .await?
        .ok_or_else(|| not_found!("order", order_id))?;

    let app = fields::external_to_app(&record.form_data);
    let label = app
        .get("tableStatus")
        .and_then(fields::coerce_text)
        .filter(|s| !s.is_empty());

    // Absent or blank workflow values never erase what is stored
    let present: Map<String, Value> = app
        .into_iter()
        .filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
        .collect();

    let mut columns = fields::column_values(&present, FieldOwner::External)?;
    if let Some(label) = &label {
        columns.push((orders::Column::TableStatus, label.as_str().into()));
    }
    if model.external_instance_id.is_none() {
        columns.push((
            orders::Column::ExternalInstanceId,
            record.instance_id.clone().into(),
        ));
    }
    if model.status == OrderStatus::Submitted && is_editable(label.as_deref()) {
        tracing::info!(order_id, label = ?label, "edit window reopened by workflow");
        columns.push((orders::Column::Status, OrderStatus::Draft.to_value().into()));
    }

    if !columns.is_empty() {
        let mut update = orders::Entity::update_many();
        for (column, value) in columns {
            update = update.col_expr(column, Expr::value(value));
        }
        update
            .filter(orders::Column::Id.eq(model.id))
            .exec(db)
            .await
            .in_context("order")?;
    }

    require_order(db, order_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::auth::Role;
    use crate::config::test_helpers::setup_test_db;
    use crate::external::workflow::{InMemoryWorkflowClient, WorkflowError};
    use crate::orders::models::OrderForm;
    use crate::orders::sample_items::models::SampleItem;
    use crate::orders::update::{UpdateOptions, update_order};
    use async_trait::async_trait;
    use serde_json::json;

    fn customer(id: &str) -> Caller {
        Caller {
            user_id: Some(id.to_string()),
            role: Role::Customer,
            phone: None,
        }
    }

    fn workflow_with_order(order_id: &str) -> InMemoryWorkflowClient {
        let workflow = InMemoryWorkflowClient::default();
        workflow.insert(
            order_id,
            "INST-1",
            json!({
                "OrderId": order_id,
                "CustomerName": "张三",
                "CustomerPhone": "13800000000",
                "SalesmanContact": "13900000000",
                "SpeciesName": "小鼠",
                "IsBioinformaticsAnalysis": "是",
                "TableStatus": "客户编辑中",
            }),
        );
        workflow
    }

    #[tokio::test]
    async fn test_first_access_imports_and_binds() {
        let db = setup_test_db().await;
        let workflow = workflow_with_order("ORD-1");

        let detail = get_or_create_order(&db, &workflow, "ORD-1", Some("wf-user"), &customer("u1"))
            .await
            .unwrap();

        assert_eq!(detail.order.uuid, "ORD-1");
        assert_eq!(detail.order.customer_name.as_deref(), Some("张三"));
        assert_eq!(detail.order.fields.species_name.as_deref(), Some("小鼠"));
        assert_eq!(detail.order.fields.need_bioinformatics_analysis, Some(true));
        assert_eq!(detail.order.status, OrderStatus::Draft);
        assert_eq!(detail.order.external_instance_id.as_deref(), Some("INST-1"));
        assert_eq!(detail.order.user_id.as_deref(), Some("u1"));
        assert!(detail.status_view.editable);
        assert!(detail.sample_list.is_empty());
    }

    #[tokio::test]
    async fn test_missing_context_never_calls_workflow() {
        let db = setup_test_db().await;
        let workflow = workflow_with_order("ORD-1");

        let err = get_or_create_order(&db, &workflow, "ORD-1", None, &customer("u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, BusinessError::MissingExternalContext));
        assert_eq!(workflow.fetch_count(), 0);

        let blank = get_or_create_order(&db, &workflow, "ORD-1", Some("  "), &customer("u1")).await;
        assert!(matches!(blank, Err(BusinessError::MissingExternalContext)));
        assert_eq!(workflow.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_row_served_without_workflow() {
        let db = setup_test_db().await;
        let workflow = workflow_with_order("ORD-1");
        get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u1"))
            .await
            .unwrap();

        let again = get_or_create_order(&db, &workflow, "ORD-1", None, &customer("u1"))
            .await
            .unwrap();
        assert_eq!(again.order.uuid, "ORD-1");
        assert_eq!(workflow.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let db = setup_test_db().await;
        let workflow = InMemoryWorkflowClient::default();
        let err = get_or_create_order(&db, &workflow, "NOPE", Some("wf"), &customer("u1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates_as_retryable() {
        let db = setup_test_db().await;
        let workflow = InMemoryWorkflowClient::default();
        *workflow.fetch_failure.lock().unwrap() = Some(WorkflowError::Timeout("slow".into()));

        let err = get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u1"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.code(), "UPSTREAM_TIMEOUT");
    }

    #[tokio::test]
    async fn test_empty_row_is_reclaimed() {
        let db = setup_test_db().await;
        let now = Utc::now();
        orders::ActiveModel {
            uuid: Set("ORD-1".to_string()),
            status: Set(OrderStatus::Draft),
            created_at: Set(now),
            last_updated: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let workflow = workflow_with_order("ORD-1");
        let detail = get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u1"))
            .await
            .unwrap();
        assert_eq!(detail.order.customer_name.as_deref(), Some("张三"));
        assert_eq!(workflow.fetch_count(), 1);

        let rows = orders::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_second_customer_is_not_owner() {
        let db = setup_test_db().await;
        let workflow = workflow_with_order("ORD-1");
        get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u1"))
            .await
            .unwrap();

        let err = get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u2"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_OWNER");
    }

    #[tokio::test]
    async fn test_lost_binding_race_is_rechecked() {
        let db = setup_test_db().await;
        let workflow = workflow_with_order("ORD-1");
        let admin = Caller {
            user_id: Some("admin".into()),
            role: Role::Administrator,
            phone: None,
        };
        let detail = get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &admin)
            .await
            .unwrap();
        assert!(detail.order.user_id.is_none());

        // u1 read the unbound row, then u2 bound it first
        let stale = require_order(&db, "ORD-1").await.unwrap();
        orders::Entity::update_many()
            .col_expr(orders::Column::UserId, Expr::value("u2"))
            .exec(&db)
            .await
            .unwrap();

        let err = authorize(&db, stale.clone(), &customer("u1")).await.unwrap_err();
        assert_eq!(err.code(), "NOT_OWNER");

        // the same user winning concurrently is fine
        let ok = authorize(&db, stale, &customer("u2")).await.unwrap();
        assert_eq!(ok.user_id.as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn test_refresh_reopens_edit_window() {
        let db = setup_test_db().await;
        let workflow = workflow_with_order("ORD-1");
        get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u1"))
            .await
            .unwrap();
        orders::Entity::update_many()
            .col_expr(orders::Column::Status, Expr::value(OrderStatus::Submitted.to_value()))
            .col_expr(orders::Column::TableStatus, Expr::value("客户已提交"))
            .exec(&db)
            .await
            .unwrap();

        workflow.insert(
            "ORD-1",
            "INST-1",
            json!({ "CustomerName": "张三", "TableStatus": "审批不通过" }),
        );
        let refreshed = refresh_table_status(&db, &workflow, "ORD-1").await.unwrap();

        assert_eq!(refreshed.table_status.as_deref(), Some("审批不通过"));
        assert_eq!(refreshed.status, OrderStatus::Draft);
        // editable fields are not pulled back from the workflow
        assert_eq!(refreshed.species_name.as_deref(), Some("小鼠"));
    }

    fn admin() -> Caller {
        Caller {
            user_id: Some("admin".into()),
            role: Role::Administrator,
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_saved_order_without_customer_data_is_kept() {
        let db = setup_test_db().await;
        let workflow = InMemoryWorkflowClient::default();
        workflow.insert(
            "ORD-1",
            "INST-1",
            json!({ "SpeciesName": "小鼠", "TableStatus": "客户编辑中" }),
        );
        get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &admin())
            .await
            .unwrap();

        let form = OrderForm {
            sample_list: vec![
                SampleItem {
                    sample_name: Some("S1".into()),
                    ..Default::default()
                },
                SampleItem {
                    sample_name: Some("S2".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        update_order(&db, "ORD-1", form, UpdateOptions::default())
            .await
            .unwrap();

        let reloaded = get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &admin())
            .await
            .unwrap();
        assert_eq!(reloaded.sample_list.len(), 2);
        assert_eq!(workflow.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_bound_stub_is_not_reclaimed() {
        let db = setup_test_db().await;
        let now = Utc::now();
        orders::ActiveModel {
            uuid: Set("ORD-1".to_string()),
            status: Set(OrderStatus::Draft),
            user_id: Set(Some("u1".to_string())),
            created_at: Set(now),
            last_updated: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let workflow = workflow_with_order("ORD-1");
        let detail = get_or_create_order(&db, &workflow, "ORD-1", None, &customer("u1"))
            .await
            .unwrap();
        assert!(detail.order.customer_name.is_none());
        assert_eq!(workflow.fetch_count(), 0);
    }

    /// Stores the order itself while the caller waits on the fetch.
    struct ConcurrentImport {
        inner: InMemoryWorkflowClient,
        db: DatabaseConnection,
    }

    #[async_trait]
    impl WorkflowClient for ConcurrentImport {
        async fn fetch_by_business_key(
            &self,
            business_key: &str,
        ) -> Result<Option<ExternalRecord>, WorkflowError> {
            let record = self.inner.fetch_by_business_key(business_key).await?;
            if let Some(record) = &record {
                insert_from_external(&self.db, business_key, record)
                    .await
                    .unwrap();
            }
            Ok(record)
        }

        async fn update_instance(
            &self,
            instance_id: &str,
            fields: Map<String, Value>,
        ) -> Result<(), WorkflowError> {
            self.inner.update_instance(instance_id, fields).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_import_uses_stored_row() {
        let db = setup_test_db().await;
        let workflow = ConcurrentImport {
            inner: workflow_with_order("ORD-1"),
            db: db.clone(),
        };

        let detail = get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u1"))
            .await
            .unwrap();
        assert_eq!(detail.order.customer_name.as_deref(), Some("张三"));
        assert_eq!(detail.order.user_id.as_deref(), Some("u1"));

        let rows = orders::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_keeps_values_the_workflow_left_out() {
        let db = setup_test_db().await;
        let workflow = workflow_with_order("ORD-1");
        get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u1"))
            .await
            .unwrap();

        workflow.insert(
            "ORD-1",
            "INST-1",
            json!({ "CustomerName": null, "CustomerPhone": "", "SalesmanName": "王五" }),
        );
        let refreshed = refresh_table_status(&db, &workflow, "ORD-1").await.unwrap();

        assert_eq!(refreshed.table_status.as_deref(), Some("客户编辑中"));
        assert_eq!(refreshed.customer_name.as_deref(), Some("张三"));
        assert_eq!(refreshed.customer_phone.as_deref(), Some("13800000000"));
        assert_eq!(refreshed.salesman_name.as_deref(), Some("王五"));
    }

    #[tokio::test]
    async fn test_refresh_with_nothing_to_change() {
        let db = setup_test_db().await;
        let workflow = workflow_with_order("ORD-1");
        get_or_create_order(&db, &workflow, "ORD-1", Some("wf"), &customer("u1"))
            .await
            .unwrap();

        workflow.insert("ORD-1", "INST-1", json!({}));
        let refreshed = refresh_table_status(&db, &workflow, "ORD-1").await.unwrap();
        assert_eq!(refreshed.table_status.as_deref(), Some("客户编辑中"));
    }
}
