//! Editor profile definitions and validation for the HL7 toolchain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder keyword used when a profile does not set one.
pub const DEFAULT_MARKER: &str = "HELPERVARIABLE";

/// Instance cap used when a profile does not set one.
pub const DEFAULT_MAX_INSTANCES: usize = 10;

/// Largest instance cap a profile may request.
pub const MAX_INSTANCES_LIMIT: usize = 100;

/// Errors that can occur when loading or validating an editor profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// JSON deserialization failed.
    #[error("invalid profile JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A field value is out of its valid range.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The name of the field that failed validation.
        field: String,
        /// A human-readable explanation of why the field value is invalid.
        reason: String,
    },
}

/// Settings for a template editing session.
///
/// # Example
/// ```
/// let profile = hl7_toolchain_profile::EditorProfile {
///     id: "lab-templates".into(),
///     schema_version: "1.0.0".into(),
///     variables: hl7_toolchain_profile::VariableSettings {
///         marker: "FILLME".into(),
///     },
///     instances: Default::default(),
/// };
/// assert_eq!(profile.instances.max_instances, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditorProfile {
    /// Unique profile identifier (e.g., `"lab-templates"`).
    pub id: String,
    /// Profile schema version for forward compatibility (e.g., `"1.0.0"`).
    pub schema_version: String,
    /// Placeholder settings.
    #[serde(default)]
    pub variables: VariableSettings,
    /// Instance settings.
    #[serde(default)]
    pub instances: InstanceSettings,
}

impl Default for EditorProfile {
    fn default() -> Self {
        Self {
            id: "default".into(),
            schema_version: "1.0.0".into(),
            variables: VariableSettings::default(),
            instances: InstanceSettings::default(),
        }
    }
}

/// Placeholder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableSettings {
    /// Keyword that marks a placeholder, optionally followed by a group number.
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for VariableSettings {
    fn default() -> Self {
        Self {
            marker: default_marker(),
        }
    }
}

/// Instance settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceSettings {
    /// Maximum number of instances per template.
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_max_instances() -> usize {
    DEFAULT_MAX_INSTANCES
}

/// Load and validate an editor profile from a JSON string.
///
/// The `id` and `schema_version` fields are required; `variables` and
/// `instances` fall back to their defaults when absent.
///
/// Performs structural validation after deserialization:
/// - `id` and `schema_version` must be non-empty
/// - `variables.marker` must look like an identifier and must not end with
///   a digit (the digits that follow it are the group number)
/// - `instances.max_instances` must be in range 1–100
pub fn load_profile_from_str(s: &str) -> Result<EditorProfile, ProfileError> {
    let profile: EditorProfile = serde_json::from_str(s)?;

    // -- Required string field validation --
    if profile.id.trim().is_empty() {
        return Err(ProfileError::InvalidField {
            field: "id".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.schema_version.trim().is_empty() {
        return Err(ProfileError::InvalidField {
            field: "schema_version".into(),
            reason: "must not be empty".into(),
        });
    }

    // -- Marker validation --
    if let Err(reason) = validate_marker(&profile.variables.marker) {
        return Err(ProfileError::InvalidField {
            field: "variables.marker".into(),
            reason,
        });
    }

    // -- Instance cap validation --
    let max = profile.instances.max_instances;
    if max == 0 {
        return Err(ProfileError::InvalidField {
            field: "instances.max_instances".into(),
            reason: "must be > 0".into(),
        });
    }
    if max > MAX_INSTANCES_LIMIT {
        return Err(ProfileError::InvalidField {
            field: "instances.max_instances".into(),
            reason: format!("{max} exceeds maximum supported count ({MAX_INSTANCES_LIMIT})"),
        });
    }

    Ok(profile)
}

/// Check that `marker` is usable as a placeholder keyword.
pub fn validate_marker(marker: &str) -> Result<(), String> {
    let mut chars = marker.chars();
    let Some(first) = chars.next() else {
        return Err("must not be empty".into());
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(format!("'{marker}' must start with a letter or '_'"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("'{marker}' may only contain letters, digits, and '_'"));
    }
    if marker.ends_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("'{marker}' must not end with a digit"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_full_profile() {
        let json = r#"{
            "id": "lab",
            "schema_version": "1.0.0",
            "variables": { "marker": "FILL_ME" },
            "instances": { "max_instances": 25 }
        }"#;
        let p = load_profile_from_str(json).unwrap();
        assert_eq!(p.id, "lab");
        assert_eq!(p.variables.marker, "FILL_ME");
        assert_eq!(p.instances.max_instances, 25);
    }

    #[test]
    fn load_minimal_profile() {
        let json = r#"{ "id": "minimal", "schema_version": "1.0.0" }"#;
        let p = load_profile_from_str(json).unwrap();
        assert_eq!(p.variables.marker, DEFAULT_MARKER);
        assert_eq!(p.instances.max_instances, DEFAULT_MAX_INSTANCES);
    }

    #[test]
    fn partial_sections_use_defaults() {
        let json = r#"{ "id": "x", "schema_version": "1", "variables": {}, "instances": {} }"#;
        let p = load_profile_from_str(json).unwrap();
        assert_eq!(p.variables, VariableSettings::default());
        assert_eq!(p.instances, InstanceSettings::default());
    }

    #[test]
    fn missing_required_field_rejected() {
        let err = load_profile_from_str(r#"{ "schema_version": "1.0.0" }"#);
        assert!(matches!(err, Err(ProfileError::InvalidJson(_))));
        let err = load_profile_from_str(r#"{ "id": "test" }"#);
        assert!(matches!(err, Err(ProfileError::InvalidJson(_))));
    }

    #[test]
    fn empty_id_rejected() {
        let err = load_profile_from_str(r#"{ "id": "  ", "schema_version": "1.0.0" }"#).unwrap_err();
        assert!(err.to_string().contains("id"), "{err}");
    }

    #[test]
    fn bad_markers_rejected() {
        for marker in ["", "1ABC", "HELPER VAR", "VAR9", "A-B", "É"] {
            let json = format!(
                r#"{{ "id": "t", "schema_version": "1", "variables": {{ "marker": "{marker}" }} }}"#
            );
            let err = load_profile_from_str(&json).unwrap_err();
            assert!(
                err.to_string().contains("variables.marker"),
                "{marker:?} should be rejected: {err}"
            );
        }
    }

    #[test]
    fn good_markers_accepted() {
        for marker in ["HELPERVARIABLE", "_x", "Fill_Me_V"] {
            assert!(validate_marker(marker).is_ok(), "{marker}");
        }
    }

    #[test]
    fn instance_cap_bounds() {
        for (max, ok) in [(0, false), (1, true), (100, true), (101, false)] {
            let json = format!(
                r#"{{ "id": "t", "schema_version": "1", "instances": {{ "max_instances": {max} }} }}"#
            );
            assert_eq!(load_profile_from_str(&json).is_ok(), ok, "max_instances = {max}");
        }
    }

    #[test]
    fn serde_roundtrip() {
        let p = EditorProfile::default();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(load_profile_from_str(&json).unwrap(), p);
    }
}
