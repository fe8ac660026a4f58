//! Order form validation.
//!
//! [`validate`] produces an [`ErrorTree`] for the whole form; required-field
//! rules only fire in submit mode. [`validate_sample_field`] checks a single
//! sample cell with required-ness suppressed, for blur-time feedback.
//!
//! Each field has an ordered rule list and the first failing rule supplies the
//! message.

use super::comparisons::group_names;
use super::models::{EditableFields, OrderForm};
use super::sample_items::models::SampleItem;
use lazy_static::lazy_static;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use utoipa::ToSchema;

/// Shipping method that requires a waybill and shipping time
pub const COURIER: &str = "快递";

const SAMPLE_NAME_MAX_LEN: usize = 10;
const IDENTIFIER_MAX_LEN: usize = 8;
const FORBIDDEN_CHARS: &[char] = &['￥', '$', '&', '@', '%'];

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOptions {
    pub validate_required_fields: bool,
}

/// Sample table cells that carry rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SampleField {
    SampleName,
    AnalysisName,
    GroupName,
    DetectionOrStorage,
    SampleTubeCount,
}

impl SampleField {
    fn label(self) -> &'static str {
        match self {
            SampleField::SampleName => "样本名称",
            SampleField::AnalysisName => "分析名称",
            SampleField::GroupName => "分组名称",
            SampleField::DetectionOrStorage => "检测或暂存",
            SampleField::SampleTubeCount => "样品管数",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRowErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_or_storage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_tube_count: Option<String>,
}

impl SampleRowErrors {
    fn slot(&mut self, field: SampleField) -> &mut Option<String> {
        match field {
            SampleField::SampleName => &mut self.sample_name,
            SampleField::AnalysisName => &mut self.analysis_name,
            SampleField::GroupName => &mut self.group_name,
            SampleField::DetectionOrStorage => &mut self.detection_or_storage,
            SampleField::SampleTubeCount => &mut self.sample_tube_count,
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairwiseRowErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiGroupRowErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_groups: Option<String>,
}

/// Field name to message, with sparse per-row errors for the lists.
///
/// Rows without errors are `null` holes so indices line up with the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTree {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_list: Vec<Option<SampleRowErrors>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pairwise_comparisons: Vec<Option<PairwiseRowErrors>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub multi_group_comparisons: Vec<Option<MultiGroupRowErrors>>,
}

impl ErrorTree {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.sample_list.is_empty()
            && self.pairwise_comparisons.is_empty()
            && self.multi_group_comparisons.is_empty()
    }

    pub fn sample_row(&self, index: usize) -> Option<&SampleRowErrors> {
        self.sample_list.get(index).and_then(Option::as_ref)
    }
}

fn put_row<T>(rows: &mut Vec<Option<T>>, index: usize, row: T) {
    if rows.len() <= index {
        rows.resize_with(index + 1, || None);
    }
    rows[index] = Some(row);
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Han ideographs, including the extension blocks and compatibility ideographs.
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}'
        | '\u{2F800}'..='\u{2FA1F}'
        | '\u{30000}'..='\u{3134F}')
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Required,
    NoCjk,
    NoForbiddenChars,
    MaxLen(usize),
    Identifier,
    Unique(&'static str),
}

struct Cell<'a> {
    field: SampleField,
    value: &'a str,
    required: bool,
    duplicate: bool,
}

impl Rule {
    fn check(self, cell: &Cell<'_>) -> Option<String> {
        match self {
            Rule::Required => (cell.required && cell.value.is_empty())
                .then(|| format!("{}不能为空", cell.field.label())),
            Rule::NoCjk => cell
                .value
                .chars()
                .any(is_cjk)
                .then(|| "不能包含中文字符".to_string()),
            Rule::NoForbiddenChars => cell
                .value
                .contains(FORBIDDEN_CHARS)
                .then(|| "不能包含特殊字符￥$&@%".to_string()),
            Rule::MaxLen(max) => {
                (cell.value.chars().count() > max).then(|| format!("长度不能超过{max}个字符"))
            }
            Rule::Identifier => (!IDENTIFIER.is_match(cell.value))
                .then(|| "必须以字母开头，只能包含字母、数字和下划线".to_string()),
            Rule::Unique(message) => cell.duplicate.then(|| message.to_string()),
        }
    }
}

const SAMPLE_NAME_RULES: &[Rule] = &[
    Rule::Required,
    Rule::NoCjk,
    Rule::NoForbiddenChars,
    Rule::MaxLen(SAMPLE_NAME_MAX_LEN),
    Rule::Unique("样本名称重复"),
];
const ANALYSIS_NAME_RULES: &[Rule] = &[
    Rule::Required,
    Rule::Identifier,
    Rule::MaxLen(IDENTIFIER_MAX_LEN),
    Rule::Unique("分析名称重复"),
];
const GROUP_NAME_RULES: &[Rule] = &[
    Rule::Required,
    Rule::Identifier,
    Rule::MaxLen(IDENTIFIER_MAX_LEN),
];
const DETECTION_OR_STORAGE_RULES: &[Rule] = &[Rule::Required];

fn first_failure(rules: &[Rule], cell: &Cell<'_>) -> Option<String> {
    if cell.value.is_empty() {
        // Format rules say nothing about an empty cell
        return Rule::Required.check(cell);
    }
    rules.iter().find_map(|rule| rule.check(cell))
}

fn trimmed(value: Option<&String>) -> &str {
    value.map_or("", |s| s.trim())
}

fn text_value(item: &SampleItem, field: SampleField) -> &str {
    match field {
        SampleField::SampleName => trimmed(item.sample_name.as_ref()),
        SampleField::AnalysisName => trimmed(item.analysis_name.as_ref()),
        SampleField::GroupName => trimmed(item.group_name.as_ref()),
        SampleField::DetectionOrStorage => trimmed(item.detection_or_storage.as_ref()),
        SampleField::SampleTubeCount => "",
    }
}

/// Per-row flags marking values already used by an earlier row.
fn duplicate_flags(samples: &[SampleItem], field: SampleField) -> Vec<bool> {
    let mut seen = HashSet::new();
    samples
        .iter()
        .map(|item| {
            let value = text_value(item, field);
            !value.is_empty() && !seen.insert(value)
        })
        .collect()
}

fn check_cell(
    samples: &[SampleItem],
    index: usize,
    field: SampleField,
    needs_bio: bool,
    required: bool,
    duplicates: Option<&[bool]>,
) -> Option<String> {
    let item = &samples[index];
    let duplicate = duplicates.is_some_and(|flags| flags[index]);
    let rules = match field {
        SampleField::SampleName => SAMPLE_NAME_RULES,
        SampleField::AnalysisName if needs_bio => ANALYSIS_NAME_RULES,
        SampleField::GroupName if needs_bio => GROUP_NAME_RULES,
        SampleField::AnalysisName | SampleField::GroupName => return None,
        SampleField::DetectionOrStorage => DETECTION_OR_STORAGE_RULES,
        SampleField::SampleTubeCount => {
            return match item.sample_tube_count {
                _ if !required => None,
                None => Some(format!("{}不能为空", field.label())),
                Some(n) if n <= 0 => Some("样品管数必须大于0".to_string()),
                Some(_) => None,
            };
        }
    };
    first_failure(
        rules,
        &Cell {
            field,
            value: text_value(item, field),
            required,
            duplicate,
        },
    )
}

fn validate_samples(form: &OrderForm, required: bool, tree: &mut ErrorTree) {
    let samples = &form.sample_list;
    let needs_bio = form.fields.wants_bioinformatics();
    let sample_dups = duplicate_flags(samples, SampleField::SampleName);
    let analysis_dups = duplicate_flags(samples, SampleField::AnalysisName);

    for (index, item) in samples.iter().enumerate() {
        if item.is_blank() {
            continue;
        }
        let mut row = SampleRowErrors::default();
        for field in [
            SampleField::SampleName,
            SampleField::AnalysisName,
            SampleField::GroupName,
            SampleField::DetectionOrStorage,
            SampleField::SampleTubeCount,
        ] {
            let duplicates = match field {
                SampleField::SampleName => Some(&sample_dups[..]),
                SampleField::AnalysisName => Some(&analysis_dups[..]),
                _ => None,
            };
            *row.slot(field) = check_cell(samples, index, field, needs_bio, required, duplicates);
        }
        if !row.is_empty() {
            put_row(&mut tree.sample_list, index, row);
        }
    }
}

fn header_required(fields: &EditableFields) -> Vec<(&'static str, &'static str, bool)> {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    let mut checks = vec![
        ("speciesName", "物种名称", present(&fields.species_name)),
        ("speciesLatinName", "物种拉丁名", present(&fields.species_latin_name)),
        ("sampleType", "样本类型", present(&fields.sample_type)),
        ("sampleTypeDetail", "样本类型详情", present(&fields.sample_type_detail)),
        ("remainingSampleHandling", "剩余样本处理方式", present(&fields.remaining_sample_handling)),
        ("detectionQuantity", "检测数量", fields.detection_quantity.is_some()),
        ("shippingMethod", "寄送方式", present(&fields.shipping_method)),
    ];
    if fields.shipping_method.as_deref().map(str::trim) == Some(COURIER) {
        checks.push((
            "expressCompanyWaybill",
            "快递单号",
            present(&fields.express_company_waybill),
        ));
        checks.push(("shippingTime", "寄送时间", fields.shipping_time.is_some()));
    }
    checks
}

fn validate_header(form: &OrderForm, tree: &mut ErrorTree) {
    for (name, label, present) in header_required(&form.fields) {
        if !present {
            tree.fields.insert(name.to_string(), format!("{label}不能为空"));
        }
    }

    if let Some(declared) = form.fields.detection_quantity {
        let actual = form
            .sample_list
            .iter()
            .filter(|s| !trimmed(s.sample_name.as_ref()).is_empty())
            .count();
        if usize::try_from(declared).ok() != Some(actual) {
            tree.fields.insert(
                "detectionQuantity".to_string(),
                format!("检测数量({declared})与样本数量({actual})不一致"),
            );
        }
    }
}

fn validate_comparisons(form: &OrderForm, tree: &mut ErrorTree) {
    let groups = group_names(&form.sample_list);
    let missing = |value: Option<&String>| -> Option<String> {
        let value = trimmed(value);
        if value.is_empty() {
            Some("请选择分组".to_string())
        } else if !groups.iter().any(|g| g == value) {
            Some(format!("分组{value}不存在"))
        } else {
            None
        }
    };

    for (index, comparison) in form.pairwise_comparisons.iter().enumerate() {
        let mut row = PairwiseRowErrors {
            control_group: missing(comparison.control_group.as_ref()),
            treatment_group: missing(comparison.treatment_group.as_ref()),
        };
        if row == PairwiseRowErrors::default()
            && trimmed(comparison.control_group.as_ref())
                == trimmed(comparison.treatment_group.as_ref())
        {
            row.treatment_group = Some("对照组与处理组不能相同".to_string());
        }
        if row != PairwiseRowErrors::default() {
            put_row(&mut tree.pairwise_comparisons, index, row);
        }
    }

    for (index, comparison) in form.multi_group_comparisons.iter().enumerate() {
        let existing = comparison
            .comparison_groups
            .iter()
            .filter(|g| groups.contains(g))
            .count();
        if existing < 2 {
            put_row(
                &mut tree.multi_group_comparisons,
                index,
                MultiGroupRowErrors {
                    comparison_groups: Some("至少选择两个分组".to_string()),
                },
            );
        }
    }
}

/// Validate the whole form.
///
/// Fully blank sample rows are skipped. Format and uniqueness rules always
/// run; required-field, cross-field and comparison rules only run when
/// `validate_required_fields` is set.
pub fn validate(form: &OrderForm, options: ValidationOptions) -> ErrorTree {
    let mut tree = ErrorTree::default();
    let required = options.validate_required_fields;

    validate_samples(form, required, &mut tree);
    if required {
        validate_header(form, &mut tree);
        validate_comparisons(form, &mut tree);
    }
    tree
}

/// Format and uniqueness check of one sample cell, required-ness suppressed.
pub fn validate_sample_field(form: &OrderForm, row: usize, field: SampleField) -> Option<String> {
    if row >= form.sample_list.len() {
        return None;
    }
    let duplicates = match field {
        SampleField::SampleName | SampleField::AnalysisName => {
            Some(duplicate_flags(&form.sample_list, field))
        }
        _ => None,
    };
    check_cell(
        &form.sample_list,
        row,
        field,
        form.fields.wants_bioinformatics(),
        false,
        duplicates.as_deref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::multi_group::models::MultiGroupComparison;
    use crate::orders::pairwise::models::PairwiseComparison;
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::json;

    const REQUIRED: ValidationOptions = ValidationOptions {
        validate_required_fields: true,
    };
    const FORMAT_ONLY: ValidationOptions = ValidationOptions {
        validate_required_fields: false,
    };

    fn named(name: &str) -> SampleItem {
        SampleItem {
            sample_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn complete(name: &str, analysis: &str, group: &str) -> SampleItem {
        SampleItem {
            sample_name: Some(name.to_string()),
            analysis_name: Some(analysis.to_string()),
            group_name: Some(group.to_string()),
            detection_or_storage: Some("检测".to_string()),
            sample_tube_count: Some(1),
            experiment_description: None,
        }
    }

    fn form_with(samples: Vec<SampleItem>) -> OrderForm {
        OrderForm {
            sample_list: samples,
            ..Default::default()
        }
    }

    fn valid_form() -> OrderForm {
        OrderForm {
            fields: EditableFields {
                species_name: Some("小鼠".into()),
                species_latin_name: Some("Mus musculus".into()),
                sample_type: Some("组织".into()),
                sample_type_detail: Some("肝脏".into()),
                remaining_sample_handling: Some("销毁".into()),
                detection_quantity: Some(2),
                shipping_method: Some("自送".into()),
                need_bioinformatics_analysis: Some(true),
                ..Default::default()
            },
            sample_list: vec![complete("S1", "A1", "ctrl"), complete("S2", "A2", "treat")],
            pairwise_comparisons: vec![PairwiseComparison {
                control_group: Some("ctrl".into()),
                treatment_group: Some("treat".into()),
                comparison_name: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_form_has_no_errors() {
        let tree = validate(&valid_form(), REQUIRED);
        assert!(tree.is_empty(), "{tree:?}");
    }

    #[test]
    fn test_first_duplicate_is_clean() {
        let form = form_with(vec![named("S1"), named("S1")]);
        let tree = validate(&form, REQUIRED);

        assert!(tree.sample_row(0).is_none_or(|row| row.sample_name.is_none()));
        assert_eq!(
            tree.sample_row(1).and_then(|r| r.sample_name.as_deref()),
            Some("样本名称重复")
        );
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_cjk_rejected_in_both_modes(#[case] required: bool) {
        let form = form_with(vec![named("样本一")]);
        let tree = validate(
            &form,
            ValidationOptions {
                validate_required_fields: required,
            },
        );
        assert_eq!(
            tree.sample_row(0).and_then(|r| r.sample_name.as_deref()),
            Some("不能包含中文字符")
        );
    }

    #[test]
    fn test_detection_quantity_mismatch_blocks_submission() {
        let mut form = valid_form();
        form.fields.detection_quantity = Some(5);
        form.sample_list = vec![
            complete("S1", "A1", "ctrl"),
            complete("S2", "A2", "treat"),
            complete("S3", "A3", "treat"),
        ];
        let tree = validate(&form, REQUIRED);
        let message = tree.fields.get("detectionQuantity").unwrap();
        assert!(message.contains('5') && message.contains('3'), "{message}");
    }

    #[test]
    fn test_blank_rows_are_never_flagged() {
        let mut form = valid_form();
        form.sample_list.insert(1, SampleItem::default());
        form.sample_list.push(SampleItem {
            sample_name: Some("   ".into()),
            ..Default::default()
        });
        let tree = validate(&form, REQUIRED);
        assert!(tree.is_empty(), "{tree:?}");
    }

    #[test]
    fn test_sparse_rows_serialize_with_null_holes() {
        let form = form_with(vec![named("S1"), named("ok2"), named("S1")]);
        let tree = validate(&form, FORMAT_ONLY);
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value, json!({ "sampleList": [null, null, { "sampleName": "样本名称重复" }] }));
    }

    #[rstest]
    #[case("S1$", "不能包含特殊字符￥$&@%")]
    #[case("S1￥", "不能包含特殊字符￥$&@%")]
    #[case("ABCDEFGHIJK", "长度不能超过10个字符")]
    // CJK is reported before the other format rules
    #[case("样本$超长超长超长超长超长", "不能包含中文字符")]
    fn test_sample_name_format(#[case] name: &str, #[case] expected: &str) {
        let form = form_with(vec![named(name)]);
        assert_eq!(
            validate_sample_field(&form, 0, SampleField::SampleName).as_deref(),
            Some(expected)
        );
    }

    #[test]
    fn test_format_precedes_duplicate() {
        let form = form_with(vec![named("A$"), named("A$")]);
        assert_eq!(
            validate_sample_field(&form, 1, SampleField::SampleName).as_deref(),
            Some("不能包含特殊字符￥$&@%")
        );
    }

    #[rstest]
    #[case("1abc", Some("必须以字母开头，只能包含字母、数字和下划线"))]
    #[case("a-b", Some("必须以字母开头，只能包含字母、数字和下划线"))]
    #[case("abcdefghi", Some("长度不能超过8个字符"))]
    #[case("a_1", None)]
    fn test_analysis_name_format(#[case] value: &str, #[case] expected: Option<&str>) {
        let mut form = form_with(vec![complete("S1", value, "g1")]);
        form.fields.need_bioinformatics_analysis = Some(true);
        assert_eq!(
            validate_sample_field(&form, 0, SampleField::AnalysisName).as_deref(),
            expected
        );
    }

    #[test]
    fn test_analysis_names_unique_but_groups_shared() {
        let mut form = form_with(vec![complete("S1", "A1", "g1"), complete("S2", "A1", "g1")]);
        form.fields.need_bioinformatics_analysis = Some(true);
        let tree = validate(&form, FORMAT_ONLY);
        let row = tree.sample_row(1).unwrap();
        assert_eq!(row.analysis_name.as_deref(), Some("分析名称重复"));
        assert!(row.group_name.is_none());
    }

    #[test]
    fn test_analysis_fields_ignored_without_bioinformatics() {
        let form = form_with(vec![complete("S1", "1bad", "2bad"), complete("S2", "1bad", "")]);
        let tree = validate(&form, FORMAT_ONLY);
        assert!(tree.is_empty(), "{tree:?}");
    }

    #[test]
    fn test_required_suppressed_in_format_mode() {
        let form = form_with(vec![SampleItem {
            experiment_description: Some("only notes".into()),
            ..Default::default()
        }]);
        assert!(validate(&form, FORMAT_ONLY).is_empty());

        let tree = validate(&form, REQUIRED);
        let row = tree.sample_row(0).unwrap();
        assert_eq!(row.sample_name.as_deref(), Some("样本名称不能为空"));
        assert_eq!(row.sample_tube_count.as_deref(), Some("样品管数不能为空"));
    }

    #[test]
    fn test_tube_count_must_be_positive() {
        let mut form = valid_form();
        form.sample_list[0].sample_tube_count = Some(0);
        let tree = validate(&form, REQUIRED);
        assert_eq!(
            tree.sample_row(0).and_then(|r| r.sample_tube_count.as_deref()),
            Some("样品管数必须大于0")
        );
    }

    #[test]
    fn test_courier_requires_waybill_and_time() {
        let mut form = valid_form();
        form.fields.shipping_method = Some(COURIER.into());
        let tree = validate(&form, REQUIRED);
        assert!(tree.fields.contains_key("expressCompanyWaybill"));
        assert!(tree.fields.contains_key("shippingTime"));

        form.fields.express_company_waybill = Some("SF123".into());
        form.fields.shipping_time = Some(Utc::now());
        assert!(validate(&form, REQUIRED).is_empty());
    }

    #[test]
    fn test_missing_detection_quantity_reports_required_only() {
        let mut form = valid_form();
        form.fields.detection_quantity = None;
        let tree = validate(&form, REQUIRED);
        assert_eq!(
            tree.fields.get("detectionQuantity").map(String::as_str),
            Some("检测数量不能为空")
        );
    }

    #[test]
    fn test_comparison_errors() {
        let mut form = valid_form();
        form.pairwise_comparisons = vec![
            PairwiseComparison {
                control_group: Some("ctrl".into()),
                treatment_group: Some("ctrl".into()),
                comparison_name: None,
            },
            PairwiseComparison {
                control_group: Some("ctrl".into()),
                treatment_group: Some("gone".into()),
                comparison_name: None,
            },
        ];
        form.multi_group_comparisons = vec![MultiGroupComparison {
            comparison_groups: vec!["ctrl".into(), "gone".into()],
            comparison_name: None,
        }];

        let tree = validate(&form, REQUIRED);
        assert_eq!(
            tree.pairwise_comparisons[0].as_ref().unwrap().treatment_group.as_deref(),
            Some("对照组与处理组不能相同")
        );
        assert_eq!(
            tree.pairwise_comparisons[1].as_ref().unwrap().treatment_group.as_deref(),
            Some("分组gone不存在")
        );
        assert!(tree.multi_group_comparisons[0].is_some());

        // comparisons are a submit-time concern
        assert!(validate(&form, FORMAT_ONLY).pairwise_comparisons.is_empty());
    }

    #[test]
    fn test_single_field_out_of_range_row() {
        let form = form_with(vec![named("S1")]);
        assert_eq!(validate_sample_field(&form, 5, SampleField::SampleName), None);
    }
}
