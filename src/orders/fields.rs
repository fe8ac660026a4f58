//! Field table and converters between the three shapes of an order header:
//! the API (camelCase), the database (snake_case) and the workflow tool
//! (PascalCase).
//!
//! [`ORDER_FIELDS`] is the only place a field name mapping is declared. All
//! converters walk that table; they are pure and total: unknown keys are
//! ignored and values that cannot be coerced become `null`.

use super::models::{EditableFields, OrderRecord, orders};
use crate::common::errors::{BusinessError, BusinessResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use sea_orm::sea_query::Value as DbValue;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    Timestamp,
}

/// Who is allowed to write a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOwner {
    /// Customer identity and sales contact, owned by the workflow tool
    External,
    /// The customer-editable part of the form
    Editable,
    /// Lifecycle and linkage fields maintained by this service
    System,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub app: &'static str,
    pub db: &'static str,
    pub external: Option<&'static str>,
    pub kind: FieldKind,
    pub owner: FieldOwner,
}

const fn field(
    app: &'static str,
    db: &'static str,
    external: Option<&'static str>,
    kind: FieldKind,
    owner: FieldOwner,
) -> FieldSpec {
    FieldSpec {
        app,
        db,
        external,
        kind,
        owner,
    }
}

use FieldKind::{Boolean, Integer, Text, Timestamp};
use FieldOwner::{Editable, External, System};

pub const ORDER_FIELDS: &[FieldSpec] = &[
    field("uuid", "uuid", Some("OrderId"), Text, System),
    field(
        "customerName",
        "customer_name",
        Some("CustomerName"),
        Text,
        External,
    ),
    field(
        "customerUnit",
        "customer_unit",
        Some("CustomerUnit"),
        Text,
        External,
    ),
    field(
        "customerPhone",
        "customer_phone",
        Some("CustomerPhone"),
        Text,
        External,
    ),
    field(
        "customerEmail",
        "customer_email",
        Some("CustomerEmail"),
        Text,
        External,
    ),
    field(
        "customerDepartment",
        "customer_department",
        Some("CustomerDepartment"),
        Text,
        External,
    ),
    field(
        "salesmanName",
        "salesman_name",
        Some("SalesmanName"),
        Text,
        External,
    ),
    field(
        "salesmanContact",
        "salesman_contact",
        Some("SalesmanContact"),
        Text,
        External,
    ),
    field(
        "speciesName",
        "species_name",
        Some("SpeciesName"),
        Text,
        Editable,
    ),
    field(
        "speciesLatinName",
        "species_latin_name",
        Some("SpeciesLatinName"),
        Text,
        Editable,
    ),
    field(
        "sampleType",
        "sample_type",
        Some("SampleType"),
        Text,
        Editable,
    ),
    field(
        "sampleTypeDetail",
        "sample_type_detail",
        Some("SampleTypeDetails"),
        Text,
        Editable,
    ),
    field(
        "cellCount",
        "cell_count",
        Some("CellCount"),
        Integer,
        Editable,
    ),
    field(
        "preservationMedium",
        "preservation_medium",
        Some("PreservationMedium"),
        Text,
        Editable,
    ),
    field(
        "preProcessing",
        "pre_processing",
        Some("PreProcessing"),
        Text,
        Editable,
    ),
    field(
        "specialInstructions",
        "special_instructions",
        Some("SpecialInstructions"),
        Text,
        Editable,
    ),
    field(
        "remainingSampleHandling",
        "remaining_sample_handling",
        Some("RemainingSampleHandling"),
        Text,
        Editable,
    ),
    field(
        "detectionQuantity",
        "detection_quantity",
        Some("DetectionQuantity"),
        Integer,
        Editable,
    ),
    field(
        "shippingMethod",
        "shipping_method",
        Some("ShippingMethod"),
        Text,
        Editable,
    ),
    field(
        "expressCompanyWaybill",
        "express_company_waybill",
        Some("ExpressCompanyWaybill"),
        Text,
        Editable,
    ),
    field(
        "shippingTime",
        "shipping_time",
        Some("SampleDeliveryTime"),
        Timestamp,
        Editable,
    ),
    field(
        "needBioinformaticsAnalysis",
        "need_bioinformatics_analysis",
        Some("IsBioinformaticsAnalysis"),
        Boolean,
        Editable,
    ),
    field("status", "status", None, Text, System),
    field(
        "tableStatus",
        "table_status",
        Some("TableStatus"),
        Text,
        System,
    ),
    field(
        "externalInstanceId",
        "external_instance_id",
        None,
        Text,
        System,
    ),
    field("samplesViewToken", "samples_view_token", None, Text, System),
    field("userId", "user_id", None, Text, System),
    field("submittedAt", "submitted_at", None, Timestamp, System),
    field("createdAt", "created_at", None, Timestamp, System),
    field("lastUpdated", "last_updated", None, Timestamp, System),
];

/// Workflow field receiving the login-free samples link on submission
pub const SAMPLES_VIEW_URL_FIELD: &str = "SamplesViewUrl";
/// Workflow field holding the status label
pub const TABLE_STATUS_FIELD: &str = "TableStatus";

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// Naive timestamps from the workflow tool are China Standard Time.
fn workflow_offset() -> Option<FixedOffset> {
    FixedOffset::east_opt(8 * 3600)
}

pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Multi-select widgets deliver arrays of labels
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(coerce_text).collect();
            Some(parts.join(","))
        }
        Value::Null | Value::Object(_) => None,
    }
}

pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "是" | "true" | "TRUE" | "True" | "1" | "yes" => Some(true),
            "否" | "false" | "FALSE" | "False" | "0" | "no" => Some(false),
            _ => None,
        },
        Value::Array(items) if items.len() == 1 => coerce_bool(&items[0]),
        _ => None,
    }
}

pub fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(_) => coerce_integer(value).and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if s.chars().all(|c| c.is_ascii_digit()) {
                return s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })?;
            workflow_offset()?
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

/// ISO-8601 in the same shape chrono's serde output uses
pub fn iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Normalise a value for the API and database shapes.
fn normalize(kind: FieldKind, value: &Value) -> Value {
    match kind {
        FieldKind::Text => coerce_text(value).map_or(Value::Null, Value::String),
        FieldKind::Integer => coerce_integer(value).map_or(Value::Null, Value::from),
        FieldKind::Boolean => coerce_bool(value).map_or(Value::Null, Value::Bool),
        FieldKind::Timestamp => {
            coerce_timestamp(value).map_or(Value::Null, |dt| Value::String(iso(&dt)))
        }
    }
}

/// Normalise a value for a push to the workflow tool: timestamps become epoch milliseconds.
fn normalize_for_workflow(kind: FieldKind, value: &Value) -> Value {
    match kind {
        FieldKind::Timestamp => coerce_timestamp(value)
            .map_or(Value::Null, |dt| Value::from(dt.timestamp_millis())),
        other => normalize(other, value),
    }
}

// ---------------------------------------------------------------------------
// Map converters
// ---------------------------------------------------------------------------

fn convert<'a>(
    source: &Map<String, Value>,
    from: impl Fn(&'a FieldSpec) -> Option<&'static str>,
    to: impl Fn(&'a FieldSpec) -> Option<&'static str>,
    coerce: impl Fn(FieldKind, &Value) -> Value,
) -> Map<String, Value> {
    let mut out = Map::new();
    for spec in ORDER_FIELDS {
        let (Some(from_key), Some(to_key)) = (from(spec), to(spec)) else {
            continue;
        };
        if let Some(value) = source.get(from_key) {
            out.insert(to_key.to_string(), coerce(spec.kind, value));
        }
    }
    out
}

pub fn external_to_app(external: &Map<String, Value>) -> Map<String, Value> {
    convert(external, |s| s.external, |s| Some(s.app), normalize)
}

pub fn app_to_external(app: &Map<String, Value>) -> Map<String, Value> {
    convert(app, |s| Some(s.app), |s| s.external, normalize_for_workflow)
}

pub fn db_to_app(db: &Map<String, Value>) -> Map<String, Value> {
    convert(db, |s| Some(s.db), |s| Some(s.app), normalize)
}

pub fn app_to_db(app: &Map<String, Value>) -> Map<String, Value> {
    convert(app, |s| Some(s.app), |s| Some(s.db), normalize)
}

// ---------------------------------------------------------------------------
// Typed edges
// ---------------------------------------------------------------------------

fn to_map<T: serde::Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl OrderRecord {
    pub fn from_app_map(app: Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(app)).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "order record could not be decoded, using defaults");
            OrderRecord::default()
        })
    }

    /// Build the API record from a workflow form instance.
    pub fn from_external(order_id: &str, form_data: &Map<String, Value>) -> Self {
        let mut app = external_to_app(form_data);
        app.insert("uuid".to_string(), Value::String(order_id.to_string()));
        Self::from_app_map(app)
    }

    pub fn from_model(model: &orders::Model) -> Self {
        Self::from_app_map(db_to_app(&to_map(model)))
    }

    pub fn to_app_map(&self) -> Map<String, Value> {
        to_map(self)
    }
}

fn typed_db_value(kind: FieldKind, value: &Value) -> DbValue {
    match kind {
        FieldKind::Text => coerce_text(value).into(),
        FieldKind::Integer => coerce_integer(value)
            .and_then(|n| i32::try_from(n).ok())
            .into(),
        FieldKind::Boolean => coerce_bool(value).into(),
        FieldKind::Timestamp => coerce_timestamp(value).into(),
    }
}

/// Typed column values for every field of `owner` present in an API map.
pub fn column_values(
    app: &Map<String, Value>,
    owner: FieldOwner,
) -> BusinessResult<Vec<(orders::Column, DbValue)>> {
    ORDER_FIELDS
        .iter()
        .filter(|spec| spec.owner == owner)
        .filter_map(|spec| app.get(spec.app).map(|value| (spec, value)))
        .map(|(spec, value)| {
            let column =
                orders::Column::from_str(spec.db).map_err(|_| BusinessError::InternalError {
                    message: format!("field table names unknown column '{}'", spec.db),
                })?;
            Ok((column, typed_db_value(spec.kind, value)))
        })
        .collect()
}

/// Column updates for the customer-editable header fields of a form.
pub fn editable_column_values(
    fields: &EditableFields,
) -> BusinessResult<Vec<(orders::Column, DbValue)>> {
    column_values(&to_map(fields), FieldOwner::Editable)
}

/// Sparse workflow update mirroring a submitted order.
pub fn submission_push_fields(
    record: &OrderRecord,
    table_status: &str,
    samples_view_url: &str,
) -> Map<String, Value> {
    let app = record.to_app_map();
    let editable: Map<String, Value> = ORDER_FIELDS
        .iter()
        .filter(|spec| spec.owner == FieldOwner::Editable)
        .filter_map(|spec| app.get(spec.app).map(|v| (spec.app.to_string(), v.clone())))
        .collect();

    let mut push = app_to_external(&editable);
    push.insert(TABLE_STATUS_FIELD.to_string(), Value::String(table_status.to_string()));
    push.insert(
        SAMPLES_VIEW_URL_FIELD.to_string(),
        Value::String(samples_view_url.to_string()),
    );
    push
}

// ---------------------------------------------------------------------------
// Lenient deserializers for client input
// ---------------------------------------------------------------------------

pub fn lenient_i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_integer(&value).and_then(|n| i32::try_from(n).ok()))
}

pub fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_bool(&value))
}

pub fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_timestamp(&value))
}
