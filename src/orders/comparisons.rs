//! Group comparisons declared over the sample table's group names.

use super::models::OrderForm;
use super::sample_items::models::SampleItem;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Distinct non-blank group names in first-seen order.
pub fn group_names(samples: &[SampleItem]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in samples
        .iter()
        .filter_map(|s| s.group_name.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

pub fn pairwise_name(treatment: Option<&str>, control: Option<&str>) -> Option<String> {
    let treatment = treatment.map(str::trim).filter(|s| !s.is_empty())?;
    let control = control.map(str::trim).filter(|s| !s.is_empty())?;
    Some(format!("{treatment} vs {control}"))
}

/// Empty once every group is gone.
pub fn multi_group_name(groups: &[String]) -> String {
    groups.join(" vs ")
}

/// Group selection as a clean list: trimmed, non-empty, without repeats.
pub fn normalize_groups(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::String(s) => s.split([',', '，']).map(ToString::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut groups: Vec<String> = Vec::with_capacity(raw.len());
    for group in raw {
        let group = group.trim();
        if !group.is_empty() && !groups.iter().any(|g| g == group) {
            groups.push(group.to_string());
        }
    }
    groups
}

pub fn deserialize_groups<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_groups(&value))
}

/// Bring comparisons in line with the current sample groups.
///
/// Multi-group entries lose groups that no longer exist; pairwise entries are
/// kept as entered so validation can point at the dangling reference. Derived
/// names are regenerated for both.
pub fn reconcile_comparisons(form: &mut OrderForm) {
    let groups = group_names(&form.sample_list);

    for comparison in &mut form.multi_group_comparisons {
        comparison.comparison_groups.retain(|g| groups.contains(g));
        comparison.comparison_name = Some(multi_group_name(&comparison.comparison_groups));
    }

    for comparison in &mut form.pairwise_comparisons {
        comparison.comparison_name = pairwise_name(
            comparison.treatment_group.as_deref(),
            comparison.control_group.as_deref(),
        );
    }
}
