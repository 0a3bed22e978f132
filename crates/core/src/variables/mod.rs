//! Template placeholders ("variables") embedded in field values.
//!
//! A placeholder is the marker keyword, optionally followed by a group
//! number from 1 to 999 without leading zeros: `HELPERVARIABLE`,
//! `HELPERVARIABLE2`, `HELPERVARIABLE417`. Fields sharing a group number are
//! linked: values are keyed by the full token text, so one entry fills every
//! field that carries the same token.
//!
//! Nothing here mutates the parsed template. Every operation returns a new
//! tree or a summary.

/// Named value sets applied to a template.
pub mod instance;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grammar::ast::{Field, FieldShape, Message};
use crate::grammar::emit::generate;
pub use hl7_toolchain_profile::DEFAULT_MARKER;
pub use instance::{Instance, InstanceError, InstanceSet};

static DEFAULT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| marker_pattern(DEFAULT_MARKER).expect("default marker regex is valid"));

fn marker_pattern(marker: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\b{}([1-9][0-9]{{0,2}})?\b", regex::escape(marker)))
}

/// Why a marker keyword was rejected.
#[derive(Debug, Error)]
pub enum MarkerError {
    /// The keyword could never form a matchable placeholder.
    #[error("invalid marker: {0}")]
    Invalid(String),
    /// The keyword produced a pattern the regex engine refused.
    #[error("marker pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A placeholder occurrence found in a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableToken {
    /// Full token text, e.g. `HELPERVARIABLE2`.
    pub id: String,
    /// Group number, `None` for a standalone marker.
    pub group: Option<u16>,
}

/// Where a placeholder slot lives in the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLocation {
    /// Segment id (`seg-<index>`).
    pub segment_id: String,
    /// Segment name.
    pub segment_name: String,
    /// 1-based field position.
    pub position: usize,
    /// 1-based repetition, when the slot is one occurrence of a repeating field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition: Option<usize>,
}

/// One distinct placeholder in a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSummary {
    /// Full token text; the key for substitution values.
    pub variable_id: String,
    /// Group number, `None` for a standalone marker.
    pub group_id: Option<u16>,
    /// Number of slots carrying this token.
    pub occurrence_count: usize,
    /// Each slot, in message order.
    pub field_positions: Vec<FieldLocation>,
}

/// Serialized output for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceOutput {
    /// Generated HL7 text.
    pub serialized_hl7: String,
    /// Whether the output still contains the marker keyword.
    pub has_unfilled_variables: bool,
}

/// Finds placeholders for one marker keyword.
#[derive(Debug, Clone)]
pub struct VariableMatcher {
    marker: Cow<'static, str>,
    pattern: Cow<'static, Regex>,
}

impl Default for VariableMatcher {
    fn default() -> Self {
        Self {
            marker: Cow::Borrowed(DEFAULT_MARKER),
            pattern: Cow::Borrowed(&*DEFAULT_PATTERN),
        }
    }
}

impl VariableMatcher {
    /// Build a matcher for a custom marker keyword.
    ///
    /// The keyword follows the profile rules (a letter or `_`, then word
    /// characters, not ending in a digit). Anything else is rejected since
    /// the word-boundary pattern could never match it.
    pub fn new(marker: &str) -> Result<Self, MarkerError> {
        if marker == DEFAULT_MARKER {
            return Ok(Self::default());
        }
        hl7_toolchain_profile::validate_marker(marker).map_err(MarkerError::Invalid)?;
        Ok(Self {
            marker: Cow::Owned(marker.to_string()),
            pattern: Cow::Owned(marker_pattern(marker)?),
        })
    }

    /// The marker keyword.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Substitution key for a group number, e.g. `HELPERVARIABLE2`.
    pub fn group_key(&self, group: u16) -> String {
        format!("{}{}", self.marker, group)
    }

    /// Whether `value` contains a placeholder.
    pub fn contains_variable(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }

    /// Group number of the first placeholder in `value`.
    ///
    /// `None` when there is no placeholder or it is a standalone marker.
    pub fn extract_group_id(&self, value: &str) -> Option<u16> {
        self.first_token(value).and_then(|t| t.group)
    }

    /// The first placeholder in `value`.
    pub fn first_token(&self, value: &str) -> Option<VariableToken> {
        let caps = self.pattern.captures(value)?;
        Some(VariableToken {
            id: caps[0].to_string(),
            group: caps.get(1).and_then(|m| m.as_str().parse().ok()),
        })
    }

    /// Whether a placeholder appears anywhere in the field's subtree.
    pub fn field_contains_variable(&self, field: &Field) -> bool {
        self.first_token_in_field(field).is_some()
    }

    /// Recompute editability and placeholder metadata for every field.
    ///
    /// A field is editable exactly when its subtree carries a placeholder.
    /// Repetitions are annotated individually. Applying this twice gives the
    /// same result as applying it once.
    pub fn apply_variable_editability(&self, message: &Message) -> Message {
        let mut out = message.clone();
        for segment in &mut out.segments {
            for field in &mut segment.fields {
                self.annotate(field);
            }
        }
        out
    }

    /// List distinct placeholders in first-appearance order.
    ///
    /// Slots are top-level fields, or each repetition of a repeating field.
    pub fn extract_unique_variables(&self, message: &Message) -> Vec<VariableSummary> {
        let mut summaries: Vec<VariableSummary> = Vec::new();
        for segment in &message.segments {
            for field in &segment.fields {
                let slots: Vec<(&Field, Option<usize>)> = match &field.shape {
                    FieldShape::Repeating { repetitions } => repetitions
                        .iter()
                        .map(|rep| (rep, Some(rep.position)))
                        .collect(),
                    _ => vec![(field, None)],
                };
                for (slot, repetition) in slots {
                    let Some(token) = self.first_token_in_field(slot) else {
                        continue;
                    };
                    let location = FieldLocation {
                        segment_id: segment.id.clone(),
                        segment_name: segment.name.clone(),
                        position: field.position,
                        repetition,
                    };
                    match summaries.iter_mut().find(|s| s.variable_id == token.id) {
                        Some(summary) => {
                            summary.occurrence_count += 1;
                            summary.field_positions.push(location);
                        }
                        None => summaries.push(VariableSummary {
                            variable_id: token.id,
                            group_id: token.group,
                            occurrence_count: 1,
                            field_positions: vec![location],
                        }),
                    }
                }
            }
        }
        summaries
    }

    /// Annotate, substitute, and generate output for one set of values.
    pub fn compute_instance_output(
        &self,
        values: &BTreeMap<String, String>,
        template: &Message,
    ) -> InstanceOutput {
        let annotated = self.apply_variable_editability(template);
        let serialized_hl7 = generate(&substitute_variables(&annotated, values));
        let has_unfilled_variables = serialized_hl7.contains(self.marker());
        InstanceOutput {
            serialized_hl7,
            has_unfilled_variables,
        }
    }

    fn annotate(&self, field: &mut Field) {
        if let FieldShape::Repeating { repetitions } = &mut field.shape {
            for rep in repetitions.iter_mut() {
                self.annotate(rep);
            }
        }
        let token = self.first_token_in_field(field);
        field.is_editable = token.is_some();
        field.variable_group_id = token.as_ref().and_then(|t| t.group);
        field.variable_id = token.map(|t| t.id);
    }

    fn first_token_in_field(&self, field: &Field) -> Option<VariableToken> {
        if let Some(token) = self.first_token(&field.value) {
            return Some(token);
        }
        match &field.shape {
            FieldShape::Simple => None,
            FieldShape::Composite { components } => components.iter().find_map(|c| {
                self.first_token(&c.value)
                    .or_else(|| c.sub_components.iter().find_map(|s| self.first_token(&s.value)))
            }),
            FieldShape::Repeating { repetitions } => {
                repetitions.iter().find_map(|r| self.first_token_in_field(r))
            }
        }
    }
}

/// Replace the value of every field or repetition whose `variable_id` has an
/// entry in `values`.
///
/// Only `value` is replaced; components are left alone, so placeholders
/// inside composite fields keep their marker text in the output.
pub fn substitute_variables(message: &Message, values: &BTreeMap<String, String>) -> Message {
    fn apply(field: &mut Field, values: &BTreeMap<String, String>) {
        if let FieldShape::Repeating { repetitions } = &mut field.shape {
            for rep in repetitions.iter_mut() {
                apply(rep, values);
            }
        }
        if let Some(v) = field.variable_id.as_ref().and_then(|id| values.get(id)) {
            field.value = v.clone();
        }
    }

    let mut out = message.clone();
    for segment in &mut out.segments {
        for field in &mut segment.fields {
            apply(field, values);
        }
    }
    out
}

// ── Default-marker shorthands ───────────────────────────────────────────

/// [`VariableMatcher::contains_variable`] with the default marker.
pub fn contains_variable(value: &str) -> bool {
    VariableMatcher::default().contains_variable(value)
}

/// [`VariableMatcher::extract_group_id`] with the default marker.
pub fn extract_group_id(value: &str) -> Option<u16> {
    VariableMatcher::default().extract_group_id(value)
}

/// [`VariableMatcher::field_contains_variable`] with the default marker.
pub fn field_contains_variable(field: &Field) -> bool {
    VariableMatcher::default().field_contains_variable(field)
}

/// [`VariableMatcher::apply_variable_editability`] with the default marker.
pub fn apply_variable_editability(message: &Message) -> Message {
    VariableMatcher::default().apply_variable_editability(message)
}

/// [`VariableMatcher::extract_unique_variables`] with the default marker.
pub fn extract_unique_variables(message: &Message) -> Vec<VariableSummary> {
    VariableMatcher::default().extract_unique_variables(message)
}

/// Output for one instance using the default marker.
pub fn compute_instance_output(instance: &Instance, template: &Message) -> InstanceOutput {
    VariableMatcher::default().compute_instance_output(&instance.variable_values, template)
}
