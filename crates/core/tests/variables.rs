//! Tests for the template variable layer: editability, grouping,
//! substitution, and per-instance output.

mod common;

use std::collections::BTreeMap;

use common::{field, read_sample};
use hl7_toolchain_core::grammar::parser::parse_str;
use hl7_toolchain_core::variables::{
    Instance, InstanceSet, VariableMatcher, apply_variable_editability, compute_instance_output,
    extract_unique_variables, substitute_variables,
};

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ── Editability ─────────────────────────────────────────────────────────

#[test]
fn editability_is_idempotent() {
    let msg = parse_str(&read_sample("oru_template.hl7")).message;
    let once = apply_variable_editability(&msg);
    let twice = apply_variable_editability(&once);
    assert_eq!(once, twice);
}

#[test]
fn editability_does_not_touch_input() {
    let msg = parse_str("MSH|^~\\&|A\rPID|HELPERVARIABLE").message;
    let before = msg.clone();
    let _ = apply_variable_editability(&msg);
    assert_eq!(msg, before);
}

#[test]
fn marker_inside_component_marks_whole_field() {
    let msg = apply_variable_editability(&parse_str("PID|1||Doe^HELPERVARIABLE3").message);
    let f = field(&msg, "PID", 3);
    assert!(f.is_editable);
    assert_eq!(f.variable_group_id, Some(3));
}

// ── Extraction ──────────────────────────────────────────────────────────

#[test]
fn unique_variables_in_first_appearance_order() {
    let msg = parse_str(&read_sample("oru_template.hl7")).message;
    let vars = extract_unique_variables(&msg);
    let ids: Vec<&str> = vars.iter().map(|v| v.variable_id.as_str()).collect();
    assert_eq!(
        ids,
        [
            "HELPERVARIABLE",
            "HELPERVARIABLE1",
            "HELPERVARIABLE2",
            "HELPERVARIABLE3",
            "HELPERVARIABLE4",
            "HELPERVARIABLE5",
        ]
    );
}

#[test]
fn grouped_variables_are_counted_together() {
    let msg = parse_str(&read_sample("oru_template.hl7")).message;
    let vars = extract_unique_variables(&msg);
    let group2 = vars
        .iter()
        .find(|v| v.group_id == Some(2))
        .expect("group 2 present");
    assert_eq!(group2.occurrence_count, 2);
    let places: Vec<(&str, usize)> = group2
        .field_positions
        .iter()
        .map(|p| (p.segment_name.as_str(), p.position))
        .collect();
    assert_eq!(places, [("PID", 3), ("OBR", 2)]);

    let standalone = &vars[0];
    assert_eq!(standalone.group_id, None);
    assert_eq!(standalone.field_positions[0].segment_id, "seg-0");
}

#[test]
fn repetitions_are_separate_slots() {
    let msg = parse_str("PID|HELPERVARIABLE7~x~HELPERVARIABLE7").message;
    let vars = extract_unique_variables(&msg);
    assert_eq!(vars.len(), 1);
    assert_eq!(vars[0].occurrence_count, 2);
    let reps: Vec<Option<usize>> = vars[0].field_positions.iter().map(|p| p.repetition).collect();
    assert_eq!(reps, [Some(1), Some(3)]);
}

#[test]
fn no_variables() {
    let msg = parse_str(&read_sample("adt_a01.hl7")).message;
    assert!(extract_unique_variables(&msg).is_empty());
}

// ── Substitution and output ─────────────────────────────────────────────

#[test]
fn substitution_fills_linked_fields() {
    let template = apply_variable_editability(
        &parse_str("MSH|^~\\&|A\rPID|1||HELPERVARIABLE2\rOBR|1|HELPERVARIABLE2").message,
    );
    let out = substitute_variables(&template, &values(&[("HELPERVARIABLE2", "ORD-9")]));
    assert_eq!(field(&out, "PID", 3).value, "ORD-9");
    assert_eq!(field(&out, "OBR", 2).value, "ORD-9");
}

#[test]
fn substituted_values_are_escaped_on_output() {
    let template = parse_str("PID|HELPERVARIABLE1|z").message;
    let mut instance = Instance::new("i1", "One");
    instance.set_value("HELPERVARIABLE1", "a|b^c");
    let out = compute_instance_output(&instance, &template);
    assert_eq!(out.serialized_hl7, r"PID|a\F\b\S\c|z");
    assert!(!out.has_unfilled_variables);
}

#[test]
fn empty_substitution_leaves_empty_slot() {
    let template = parse_str("MSH|^~\\&|A\rPID|1|HELPERVARIABLE|3").message;
    let mut instance = Instance::new("i1", "One");
    instance.set_value("HELPERVARIABLE", "");
    let out = compute_instance_output(&instance, &template);
    assert_eq!(out.serialized_hl7, "MSH|^~\\&|A\rPID|1||3");
    assert!(!out.has_unfilled_variables);
}

#[test]
fn unfilled_markers_are_reported() {
    let template = parse_str("PID|HELPERVARIABLE1|HELPERVARIABLE2").message;
    let mut instance = Instance::new("i1", "One");
    instance.set_value("HELPERVARIABLE1", "done");
    let out = compute_instance_output(&instance, &template);
    assert_eq!(out.serialized_hl7, "PID|done|HELPERVARIABLE2");
    assert!(out.has_unfilled_variables);
}

#[test]
fn markers_inside_components_are_not_substituted() {
    let template = parse_str("PID|Doe^HELPERVARIABLE3").message;
    let mut instance = Instance::new("i1", "One");
    instance.set_value("HELPERVARIABLE3", "John");
    let out = compute_instance_output(&instance, &template);
    assert_eq!(out.serialized_hl7, "PID|Doe^HELPERVARIABLE3");
    assert!(out.has_unfilled_variables);
}

#[test]
fn substitution_inside_repetitions() {
    let template = parse_str("PID|a~HELPERVARIABLE4").message;
    let mut instance = Instance::new("i1", "One");
    instance.set_value("HELPERVARIABLE4", "b");
    let out = compute_instance_output(&instance, &template);
    assert_eq!(out.serialized_hl7, "PID|a~b");
}

#[test]
fn instances_share_one_template() {
    let template = parse_str(&read_sample("oru_template.hl7")).message;
    let matcher = VariableMatcher::default();
    let mut set = InstanceSet::default();
    let first = set.add(None).unwrap().id.clone();
    let second = set.add(None).unwrap().id.clone();
    for var in extract_unique_variables(&template) {
        set.set_value(&first, &var.variable_id, "X").unwrap();
    }
    set.set_value(&second, "HELPERVARIABLE2", "Y").unwrap();

    let outputs = set.outputs(&matcher, &template);
    assert_eq!(outputs.len(), 2);
    // PID-5 holds the marker inside a component, which is left untouched.
    assert!(outputs[0].1.has_unfilled_variables);
    assert!(outputs[0].1.serialized_hl7.contains("HELPERVARIABLE3^John"));
    assert!(!outputs[0].1.serialized_hl7.contains("HELPERVARIABLE2"));
    assert!(outputs[1].1.has_unfilled_variables);
    assert!(outputs[1].1.serialized_hl7.contains("PID|1||Y"));
    assert!(outputs[1].1.serialized_hl7.contains("OBR|1|Y|"));
}

#[test]
fn custom_marker_end_to_end() {
    let matcher = VariableMatcher::new("FILLME").unwrap();
    let template = parse_str("PID|FILLME1|HELPERVARIABLE1").message;
    let vars = matcher.extract_unique_variables(&template);
    assert_eq!(vars.len(), 1);
    let key = matcher.group_key(1);
    let out = matcher.compute_instance_output(&values(&[(key.as_str(), "v")]), &template);
    assert_eq!(out.serialized_hl7, "PID|v|HELPERVARIABLE1");
    assert!(!out.has_unfilled_variables);
}
