use serde::{Deserialize, Serialize};

/// A parsed HL7 v2 message: an ordered list of segments.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Message {
    /// Segments in source order.
    pub segments: Vec<Segment>,
}

impl Message {
    /// Find a segment by its parse-time id (e.g. `"seg-2"`).
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    /// All segments with the given three-character name, in order.
    ///
    /// The yielded segments borrow from the message only, so they outlive a
    /// temporary `name`.
    pub fn segments_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Segment> + 'n
    where
        'a: 'n,
    {
        self.segments.iter().filter(move |s| s.name == name)
    }

    /// The first `MSH` segment, if any.
    pub fn header(&self) -> Option<&Segment> {
        self.segments.iter().find(|s| s.is_header())
    }

    /// Whether the message has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// One line of an HL7 message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    /// Positional handle assigned at parse time (`seg-<index>`). Stable for
    /// the lifetime of one parsed tree only.
    pub id: String,
    /// Segment code such as `MSH` or `PID`.
    pub name: String,
    /// Fields in positional order. For `MSH`, field 1 is the field separator
    /// and field 2 the encoding characters.
    pub fields: Vec<Field>,
}

impl Segment {
    /// Whether this is a message header segment.
    pub fn is_header(&self) -> bool {
        self.name == "MSH"
    }

    /// Look up a field by its 1-based position.
    pub fn field(&self, position: usize) -> Option<&Field> {
        self.fields.iter().find(|f| f.position == position)
    }
}

/// A segment's top-level data unit.
///
/// `value` holds the unescaped literal for simple fields and the raw wire
/// token for composite or repeating fields, whose structure lives in
/// [`FieldShape`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    /// 1-based position within the segment (or within the parent field for
    /// repetitions).
    pub position: usize,
    /// Literal value (simple) or raw token (composite/repeating).
    pub value: String,
    /// Whether a user may type into this field.
    pub is_editable: bool,
    /// Structural shape of the field.
    #[serde(flatten)]
    pub shape: FieldShape,
    /// Full placeholder token found in this field, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_id: Option<String>,
    /// Group number of the placeholder, linking fields that share it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_group_id: Option<u16>,
}

impl Field {
    /// Create a simple field holding an unescaped literal.
    pub fn simple(position: usize, value: impl Into<String>) -> Self {
        Self {
            position,
            value: value.into(),
            is_editable: true,
            shape: FieldShape::Simple,
            variable_id: None,
            variable_group_id: None,
        }
    }

    /// Create a composite field from its raw token and parsed components.
    pub fn composite(position: usize, raw: impl Into<String>, components: Vec<Component>) -> Self {
        Self {
            shape: FieldShape::Composite { components },
            ..Self::simple(position, raw)
        }
    }

    /// Create a repeating field from its raw token and parsed repetitions.
    pub fn repeating(position: usize, raw: impl Into<String>, repetitions: Vec<Field>) -> Self {
        Self {
            shape: FieldShape::Repeating { repetitions },
            ..Self::simple(position, raw)
        }
    }

    /// Mark the field as structural (not user data).
    pub fn read_only(mut self) -> Self {
        self.is_editable = false;
        self
    }

    /// Components, when the field is composite.
    pub fn components(&self) -> &[Component] {
        match &self.shape {
            FieldShape::Composite { components } => components,
            _ => &[],
        }
    }

    /// Repetitions, when the field repeats.
    pub fn repetitions(&self) -> &[Field] {
        match &self.shape {
            FieldShape::Repeating { repetitions } => repetitions,
            _ => &[],
        }
    }
}

/// The three shapes a field can take.
///
/// Serialization precedence follows the variant: repetitions, then
/// components, then the plain value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FieldShape {
    /// A single leaf value.
    #[default]
    Simple,
    /// A field split into components (and possibly subcomponents).
    Composite {
        /// Components in positional order.
        components: Vec<Component>,
    },
    /// A field with more than one occurrence.
    Repeating {
        /// Each occurrence, shaped simple or composite.
        repetitions: Vec<Field>,
    },
}

/// A component of a field, or a subcomponent of a component.
///
/// Leaf components hold the unescaped literal; a component with
/// subcomponents keeps its raw token in `value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Component {
    /// 1-based position within the parent.
    pub position: usize,
    /// Literal value (leaf) or raw token (has subcomponents).
    pub value: String,
    /// Subcomponents; always empty one level down.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_components: Vec<Component>,
}

impl Component {
    /// Create a leaf component.
    pub fn leaf(position: usize, value: impl Into<String>) -> Self {
        Self {
            position,
            value: value.into(),
            sub_components: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(index: usize, name: &str) -> Segment {
        Segment {
            id: format!("seg-{index}"),
            name: name.to_string(),
            fields: vec![Field::simple(1, index.to_string())],
        }
    }

    fn first_named<'m>(message: &'m Message, name: String) -> Option<&'m Segment> {
        message.segments_named(&name).next()
    }

    #[test]
    fn named_lookup_outlives_the_name() {
        let message = Message {
            segments: vec![segment(0, "MSH"), segment(1, "OBX"), segment(2, "OBX")],
        };
        let obx = first_named(&message, "OBX".to_string()).unwrap();
        assert_eq!(obx.id, "seg-1");
        assert_eq!(message.segments_named("OBX").count(), 2);
        assert!(first_named(&message, "PID".into()).is_none());
        assert_eq!(message.header().map(|s| s.id.as_str()), Some("seg-0"));
    }
}
