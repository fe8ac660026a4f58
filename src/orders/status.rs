//! Maps the workflow tool's free-text status label to a step indicator and
//! the customer edit window.

use super::models::OrderStatus;
use serde::Serialize;
use utoipa::ToSchema;

/// Label written to the workflow tool when a customer submits
pub const SUBMITTED_LABEL: &str = "客户已提交";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Edit,
    Audit,
    ReceiveSample,
    Test,
    Analyze,
    Invoice,
    Payment,
    Deliver,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Edit,
        Stage::Audit,
        Stage::ReceiveSample,
        Stage::Test,
        Stage::Analyze,
        Stage::Invoice,
        Stage::Payment,
        Stage::Deliver,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Process,
    Error,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub editable: bool,
    pub step_index: usize,
    pub step_state: StepState,
    pub stage: Stage,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct StatusEntry {
    pub label: &'static str,
    pub stage: Stage,
    pub editable: bool,
    pub rejection: bool,
    pub terminal: bool,
}

const fn entry(label: &'static str, stage: Stage) -> StatusEntry {
    StatusEntry {
        label,
        stage,
        editable: false,
        rejection: false,
        terminal: false,
    }
}

const fn editable(label: &'static str) -> StatusEntry {
    StatusEntry {
        editable: true,
        ..entry(label, Stage::Edit)
    }
}

const fn rejected(label: &'static str, editable: bool) -> StatusEntry {
    StatusEntry {
        editable,
        rejection: true,
        ..entry(label, Stage::Edit)
    }
}

const fn delivered(label: &'static str) -> StatusEntry {
    StatusEntry {
        terminal: true,
        ..entry(label, Stage::Deliver)
    }
}

/// Every label the workflow tool is known to emit.
///
/// A "<stage> complete" label points at the following stage.
pub const STATUS_TABLE: &[StatusEntry] = &[
    editable("客户编辑中"),
    editable("客户待编辑"),
    editable("草稿"),
    editable("编辑中"),
    rejected("客户修改中", true),
    rejected("审批不通过", true),
    rejected("驳回", false),
    entry(SUBMITTED_LABEL, Stage::Audit),
    entry("待审核", Stage::Audit),
    entry("审核中", Stage::Audit),
    entry("审核完成", Stage::ReceiveSample),
    entry("待收样", Stage::ReceiveSample),
    entry("收样中", Stage::ReceiveSample),
    entry("收样完成", Stage::Test),
    entry("已收样", Stage::Test),
    entry("检测中", Stage::Test),
    entry("检测完成", Stage::Analyze),
    entry("分析中", Stage::Analyze),
    entry("分析完成", Stage::Invoice),
    entry("待开票", Stage::Invoice),
    entry("开票完成", Stage::Payment),
    entry("已开票", Stage::Payment),
    entry("待付款", Stage::Payment),
    entry("付款完成", Stage::Deliver),
    entry("已付款", Stage::Deliver),
    entry("待交付", Stage::Deliver),
    entry("交付中", Stage::Deliver),
    delivered("交付完成"),
    delivered("已交付"),
    delivered("完成"),
    delivered("进入售后阶段"),
];

pub fn lookup(label: &str) -> Option<&'static StatusEntry> {
    STATUS_TABLE.iter().find(|e| e.label == label)
}

/// Exact-label membership; no trimming or prefix matching.
pub fn is_editable(label: Option<&str>) -> bool {
    label.and_then(lookup).is_some_and(|e| e.editable)
}

fn view(stage: Stage, step_state: StepState, editable: bool, label: Option<&str>) -> StatusView {
    StatusView {
        editable,
        step_index: stage.index(),
        step_state,
        stage,
        label: label.map(ToString::to_string),
    }
}

/// The local status only speaks when the workflow tool has no label yet.
pub fn resolve_status(table_status: Option<&str>, local: OrderStatus) -> StatusView {
    let Some(label) = table_status.filter(|s| !s.is_empty()) else {
        let stage = match local {
            OrderStatus::Submitted => Stage::Audit,
            OrderStatus::Draft => Stage::Edit,
        };
        return view(stage, StepState::Process, false, None);
    };

    match lookup(label) {
        Some(entry) if entry.rejection => {
            view(Stage::Edit, StepState::Error, entry.editable, Some(label))
        }
        Some(entry) if entry.terminal => view(entry.stage, StepState::Finish, false, Some(label)),
        Some(entry) => view(entry.stage, StepState::Process, entry.editable, Some(label)),
        None => {
            tracing::debug!(label, "unknown workflow status label");
            view(Stage::Edit, StepState::Process, false, Some(label))
        }
    }
}
