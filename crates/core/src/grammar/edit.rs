//! Immutable edits on a message tree.
//!
//! Every function takes the current tree by reference and returns a new one,
//! leaving the input untouched. Nodes are addressed by segment id and 1-based
//! positions, the same handles the parser assigns.

use thiserror::Error;

use super::ast::{Field, FieldShape, Message};
use super::delimiters::Delimiters;
use super::emit::{delimiters_of, field_to_string};

/// Reasons an edit could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// No segment carries the given id.
    #[error("segment '{0}' not found")]
    SegmentNotFound(String),
    /// The segment has no field at the given position.
    #[error("segment '{segment}' has no field {position}")]
    FieldNotFound {
        /// Segment id.
        segment: String,
        /// Requested field position.
        position: usize,
    },
    /// The field has no repetition at the given position.
    #[error("field {field} has no repetition {position}")]
    RepetitionNotFound {
        /// Field position.
        field: usize,
        /// Requested repetition position.
        position: usize,
    },
    /// The field (or repetition) has no component at the given position.
    #[error("field {field} has no component {position}")]
    ComponentNotFound {
        /// Field position.
        field: usize,
        /// Requested component position.
        position: usize,
    },
    /// The component has no subcomponent at the given position.
    #[error("component {component} has no subcomponent {position}")]
    SubcomponentNotFound {
        /// Component position.
        component: usize,
        /// Requested subcomponent position.
        position: usize,
    },
    /// MSH-1 and MSH-2 define the delimiters and cannot be edited as values.
    #[error("MSH-{0} is structural and cannot be edited")]
    ReadOnlyField(usize),
}

/// Replace a field's value, turning it into a simple field.
///
/// The new value is a literal; separators inside it are escaped on output.
pub fn set_field_value(
    message: &Message,
    segment_id: &str,
    position: usize,
    value: &str,
) -> Result<Message, EditError> {
    update_field(message, segment_id, position, |field| {
        field.value = value.to_string();
        field.shape = FieldShape::Simple;
        Ok(())
    })
}

/// Replace the value of one repetition, turning it into a simple occurrence.
pub fn set_repetition_value(
    message: &Message,
    segment_id: &str,
    position: usize,
    repetition: usize,
    value: &str,
) -> Result<Message, EditError> {
    update_field(message, segment_id, position, |field| {
        let rep = repetition_mut(field, repetition)?;
        rep.value = value.to_string();
        rep.shape = FieldShape::Simple;
        Ok(())
    })
}

/// Replace a component's value.
///
/// `repetition` selects the occurrence for repeating fields and must be
/// `None` otherwise. A component with subcomponents becomes a leaf.
pub fn set_component_value(
    message: &Message,
    segment_id: &str,
    position: usize,
    repetition: Option<usize>,
    component: usize,
    value: &str,
) -> Result<Message, EditError> {
    update_field(message, segment_id, position, |field| {
        let target = match repetition {
            Some(r) => repetition_mut(field, r)?,
            None => field,
        };
        let field_position = target.position;
        let FieldShape::Composite { components } = &mut target.shape else {
            return Err(EditError::ComponentNotFound {
                field: field_position,
                position: component,
            });
        };
        let comp = components
            .iter_mut()
            .find(|c| c.position == component)
            .ok_or(EditError::ComponentNotFound {
                field: field_position,
                position: component,
            })?;
        comp.value = value.to_string();
        comp.sub_components.clear();
        Ok(())
    })
}

/// Replace a subcomponent's value.
pub fn set_subcomponent_value(
    message: &Message,
    segment_id: &str,
    position: usize,
    repetition: Option<usize>,
    component: usize,
    subcomponent: usize,
    value: &str,
) -> Result<Message, EditError> {
    update_field(message, segment_id, position, |field| {
        let target = match repetition {
            Some(r) => repetition_mut(field, r)?,
            None => field,
        };
        let field_position = target.position;
        let comp = match &mut target.shape {
            FieldShape::Composite { components } => {
                components.iter_mut().find(|c| c.position == component)
            }
            _ => None,
        }
        .ok_or(EditError::ComponentNotFound {
            field: field_position,
            position: component,
        })?;
        let sub = comp
            .sub_components
            .iter_mut()
            .find(|s| s.position == subcomponent)
            .ok_or(EditError::SubcomponentNotFound {
                component,
                position: subcomponent,
            })?;
        sub.value = value.to_string();
        Ok(())
    })
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Clone the message, apply `edit` to one field, and refresh the raw value
/// of structured fields so it matches what the generator will write.
fn update_field(
    message: &Message,
    segment_id: &str,
    position: usize,
    edit: impl FnOnce(&mut Field) -> Result<(), EditError>,
) -> Result<Message, EditError> {
    let mut next = message.clone();
    let delimiters = delimiters_of(message);

    let segment = next
        .segments
        .iter_mut()
        .find(|s| s.id == segment_id)
        .ok_or_else(|| EditError::SegmentNotFound(segment_id.to_string()))?;
    if segment.is_header() && (position == 1 || position == 2) {
        return Err(EditError::ReadOnlyField(position));
    }
    let field = segment
        .fields
        .iter_mut()
        .find(|f| f.position == position)
        .ok_or_else(|| EditError::FieldNotFound {
            segment: segment_id.to_string(),
            position,
        })?;

    edit(field)?;
    refresh_raw(field, delimiters);
    Ok(next)
}

fn refresh_raw(field: &mut Field, delimiters: Delimiters) {
    if let FieldShape::Repeating { repetitions } = &mut field.shape {
        for rep in repetitions.iter_mut() {
            refresh_raw(rep, delimiters);
        }
    }
    if !matches!(field.shape, FieldShape::Simple) {
        field.value = field_to_string(field, delimiters);
    }
}

fn repetition_mut(field: &mut Field, position: usize) -> Result<&mut Field, EditError> {
    let field_position = field.position;
    let found = match &mut field.shape {
        FieldShape::Repeating { repetitions } => {
            repetitions.iter_mut().find(|r| r.position == position)
        }
        _ => None,
    };
    found.ok_or(EditError::RepetitionNotFound {
        field: field_position,
        position,
    })
}
