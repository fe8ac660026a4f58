use super::access::{check_access, check_edit};
use super::comparisons::reconcile_comparisons;
use super::models::{OrderDetail, OrderForm, OrderRecord, SamplesView, orders};
use super::sync::{
    find_order, get_or_create_order, load_detail, refresh_table_status, require_order,
};
use super::update::{SubmitOutcome, UpdateOptions, submit_order, update_order};
use super::validation::{ErrorTree, SampleField, ValidationOptions, validate, validate_sample_field};
use crate::common::auth::{Caller, Role};
use crate::common::errors::{AccessDenial, BusinessError, BusinessResult, DbResultExt};
use crate::common::sales_token;
use crate::common::state::AppState;
use crate::not_found;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_keycloak_auth::{PassthroughMode, layer::KeycloakAuthLayer};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Workflow-tool user forwarded by the embedding page; needed to import an order
pub const WORKFLOW_USER_HEADER: &str = "x-workflow-user";

fn protect(
    router: OpenApiRouter<AppState>,
    state: &AppState,
    name: &str,
) -> OpenApiRouter<AppState> {
    if let Some(instance) = &state.keycloak_auth_instance {
        // Pass mode: requests carrying a sales link have no bearer token
        router.layer(
            KeycloakAuthLayer::<Role>::builder()
                .instance(instance.clone())
                .passthrough_mode(PassthroughMode::Pass)
                .persist_raw_claims(false)
                .expected_audiences(vec![String::from("account")])
                .required_roles(vec![])
                .build(),
        )
    } else {
        if !state.config.tests_running {
            tracing::warn!("{name} routes are not protected by Keycloak");
        }
        router
    }
}

pub fn router(state: &AppState) -> OpenApiRouter {
    let authenticated = protect(
        OpenApiRouter::new()
            .routes(routes!(get_order))
            .routes(routes!(save_order))
            .routes(routes!(submit))
            .routes(routes!(validate_form))
            .routes(routes!(refresh_status))
            .routes(routes!(bind_order)),
        state,
        "order",
    );

    // The samples link is its own credential
    let public = OpenApiRouter::new().routes(routes!(samples_view));

    authenticated.merge(public).with_state(state.clone())
}

pub fn sales_links_router(state: &AppState) -> OpenApiRouter {
    protect(
        OpenApiRouter::new().routes(routes!(create_sales_link)),
        state,
        "sales link",
    )
    .with_state(state.clone())
}

#[utoipa::path(
    get,
    path = "/{order_id}",
    params(
        ("order_id" = String, Path, description = "Workflow business key of the order"),
        (
            "x-workflow-user" = Option<String>,
            Header,
            description = "Workflow user, required when the order is not stored yet"
        ),
    ),
    responses(
        (status = 200, description = "Order with child lists and status view", body = OrderDetail),
        (status = 400, description = "Order not stored yet and no workflow user given"),
        (status = 403, description = "Caller may not see this order"),
        (status = 404, description = "Order unknown to the workflow tool"),
        (status = 502, description = "Workflow tool failed"),
    ),
    tag = "orders",
    summary = "Get an order, importing it on first access"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    caller: Caller,
    headers: HeaderMap,
) -> Result<Json<OrderDetail>, BusinessError> {
    let external_user = headers
        .get(WORKFLOW_USER_HEADER)
        .and_then(|v| v.to_str().ok());
    let detail = get_or_create_order(
        &state.db,
        state.workflow.as_ref(),
        &order_id,
        external_user,
        &caller,
    )
    .await?;
    Ok(Json(detail))
}

#[utoipa::path(
    post,
    path = "/{order_id}/save",
    params(("order_id" = String, Path, description = "Workflow business key of the order")),
    request_body = OrderForm,
    responses(
        (status = 200, description = "Saved order", body = OrderDetail),
        (status = 403, description = "Not allowed or outside the edit window"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order changed since it was loaded"),
    ),
    tag = "orders",
    summary = "Save a draft"
)]
pub async fn save_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    caller: Caller,
    Json(form): Json<OrderForm>,
) -> Result<Json<OrderDetail>, BusinessError> {
    let existing = require_order(&state.db, &order_id).await?;
    check_edit(&OrderRecord::from_model(&existing), &caller)?;

    let model = update_order(&state.db, &order_id, form, UpdateOptions::default()).await?;
    Ok(Json(load_detail(&state.db, model).await?))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRejected {
    pub code: String,
    #[schema(value_type = Object)]
    pub errors: ErrorTree,
}

#[utoipa::path(
    post,
    path = "/{order_id}/submit",
    params(("order_id" = String, Path, description = "Workflow business key of the order")),
    request_body = OrderForm,
    responses(
        (
            status = 200,
            description = "Submitted; externalSync tells whether the workflow tool took it",
            body = SubmitOutcome
        ),
        (status = 403, description = "Not allowed or outside the edit window"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order changed since it was loaded"),
        (status = 422, description = "Form failed submit-time validation", body = SubmitRejected),
    ),
    tag = "orders",
    summary = "Submit an order"
)]
pub async fn submit(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    caller: Caller,
    Json(mut form): Json<OrderForm>,
) -> Result<Response, BusinessError> {
    let existing = require_order(&state.db, &order_id).await?;
    check_edit(&OrderRecord::from_model(&existing), &caller)?;

    reconcile_comparisons(&mut form);
    let errors = validate(
        &form,
        ValidationOptions {
            validate_required_fields: true,
        },
    );
    if !errors.is_empty() {
        tracing::debug!(order_id = %order_id, "submission rejected by validation");
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(SubmitRejected {
                code: "VALIDATION_FAILED".to_string(),
                errors,
            }),
        )
            .into_response());
    }

    let outcome = submit_order(&state, &order_id, form).await?;
    Ok(Json(outcome).into_response())
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldSelector {
    pub row: usize,
    pub field: SampleField,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub form: OrderForm,
    #[serde(default)]
    pub validate_required_fields: bool,
    /// Check a single sample cell instead of the whole form
    pub field: Option<FieldSelector>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub errors: Option<ErrorTree>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[utoipa::path(
    post,
    path = "/validate",
    request_body = ValidateRequest,
    responses((status = 200, description = "Validation result", body = ValidateResponse)),
    tag = "orders",
    summary = "Validate a form or a single sample cell"
)]
pub async fn validate_form(
    _caller: Caller,
    Json(request): Json<ValidateRequest>,
) -> Json<ValidateResponse> {
    if let Some(selector) = request.field {
        let message = validate_sample_field(&request.form, selector.row, selector.field);
        return Json(ValidateResponse {
            valid: message.is_none(),
            errors: None,
            message,
        });
    }

    let errors = validate(
        &request.form,
        ValidationOptions {
            validate_required_fields: request.validate_required_fields,
        },
    );
    Json(ValidateResponse {
        valid: errors.is_empty(),
        errors: Some(errors),
        message: None,
    })
}

#[utoipa::path(
    post,
    path = "/{order_id}/refresh-status",
    params(("order_id" = String, Path, description = "Workflow business key of the order")),
    responses(
        (status = 200, description = "Order with the current workflow status", body = OrderDetail),
        (status = 403, description = "Caller may not see this order"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Workflow tool failed"),
    ),
    tag = "orders",
    summary = "Pull the status label from the workflow tool"
)]
pub async fn refresh_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    caller: Caller,
) -> Result<Json<OrderDetail>, BusinessError> {
    let existing = require_order(&state.db, &order_id).await?;
    check_access(&OrderRecord::from_model(&existing), &caller).into_result()?;

    let model = refresh_table_status(&state.db, state.workflow.as_ref(), &order_id).await?;
    Ok(Json(load_detail(&state.db, model).await?))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BindRequest {
    pub user_id: String,
}

#[utoipa::path(
    post,
    path = "/{order_id}/bind",
    params(("order_id" = String, Path, description = "Workflow business key of the order")),
    request_body = BindRequest,
    responses(
        (status = 200, description = "Order bound to the user", body = OrderDetail),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders",
    summary = "Bind an order to a customer account"
)]
pub async fn bind_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    caller: Caller,
    Json(request): Json<BindRequest>,
) -> Result<Json<OrderDetail>, BusinessError> {
    if !caller.is_admin() {
        return Err(BusinessError::Forbidden {
            denial: AccessDenial::RoleMismatch,
            reason: "仅管理员可以绑定订单".to_string(),
        });
    }
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(BusinessError::ValidationError {
            field: "userId".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    let existing = require_order(&state.db, &order_id).await?;
    if let Some(previous) = existing.user_id.as_deref().filter(|p| *p != user_id) {
        tracing::warn!(order_id = %order_id, previous, user_id, "administrator rebinding order");
    }
    orders::Entity::update_many()
        .col_expr(orders::Column::UserId, Expr::value(user_id))
        .filter(orders::Column::Id.eq(existing.id))
        .exec(&state.db)
        .await
        .in_context("order")?;

    let model = require_order(&state.db, &order_id).await?;
    Ok(Json(load_detail(&state.db, model).await?))
}

#[utoipa::path(
    get,
    path = "/{order_id}/view/{token}",
    params(
        ("order_id" = String, Path, description = "Workflow business key of the order"),
        ("token" = String, Path, description = "Samples view token issued at submission"),
    ),
    responses(
        (status = 200, description = "Read-only sample tables", body = SamplesView),
        (status = 404, description = "Unknown order or token"),
    ),
    tag = "orders",
    summary = "Login-free sample tables for lab staff"
)]
pub async fn samples_view(
    State(state): State<AppState>,
    Path((order_id, token)): Path<(String, String)>,
) -> Result<Json<SamplesView>, BusinessError> {
    let model = find_order(&state.db, &order_id)
        .await?
        .filter(|m| {
            m.samples_view_token.as_deref().is_some_and(|stored| {
                stored.len() == token.len()
                    && openssl::memcmp::eq(stored.as_bytes(), token.as_bytes())
            })
        })
        .ok_or_else(|| not_found!("order", order_id))?;

    Ok(Json(SamplesView::from(load_detail(&state.db, model).await?)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesLinkRequest {
    /// Salesperson phone; defaults to the caller's own
    pub phone: Option<String>,
    /// Build a ready-to-share order link
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesLinkResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub url: Option<String>,
}

fn sales_link_phone(caller: &Caller, requested: Option<&str>) -> BusinessResult<String> {
    let requested = requested.map(str::trim).filter(|p| !p.is_empty());
    let denied = |reason: &str| BusinessError::Forbidden {
        denial: AccessDenial::RoleMismatch,
        reason: reason.to_string(),
    };
    match caller.role {
        Role::Administrator => {
            requested
                .map(ToString::to_string)
                .ok_or_else(|| BusinessError::ValidationError {
                    field: "phone".to_string(),
                    message: "required".to_string(),
                })
        }
        // A sales link cannot mint further links
        Role::Sales if caller.user_id.is_some() => {
            let own = caller
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| denied("当前账号未登记手机号"))?;
            match requested {
                Some(phone) if phone != own => Err(denied("只能为本人手机号生成销售链接")),
                _ => Ok(own.to_string()),
            }
        }
        _ => Err(denied("当前账号无权生成销售链接")),
    }
}

#[utoipa::path(
    post,
    path = "/api/sales-links",
    request_body = SalesLinkRequest,
    responses(
        (status = 200, description = "Sales access token", body = SalesLinkResponse),
        (status = 403, description = "Administrators and signed-in sales staff only"),
    ),
    tag = "orders",
    summary = "Mint a sales access link"
)]
pub async fn create_sales_link(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<SalesLinkRequest>,
) -> Result<Json<SalesLinkResponse>, BusinessError> {
    let phone = sales_link_phone(&caller, request.phone.as_deref())?;
    let now = Utc::now();
    let ttl = chrono::Duration::hours(state.config.sales_token_ttl_hours);
    let token = sales_token::mint(&state.config.sales_token_secret, &phone, ttl, now)?;

    let url = request.order_id.as_deref().map(|order_id| {
        format!(
            "{}/order/{order_id}?sales_token={token}",
            state.config.public_base_url.trim_end_matches('/')
        )
    });
    tracing::info!(user_id = ?caller.user_id, "sales link minted");

    Ok(Json(SalesLinkResponse {
        token,
        expires_at: now + ttl,
        url,
    }))
}
