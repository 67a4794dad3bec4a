use std::fmt;

use crate::builder::BuiltElement;
use crate::element::Tag;
use crate::error::{FiberError, Result};
use crate::value::{Callback, Value};

use super::field::{FieldValue, FieldWriter, field_len, format_number};

pub const PROTOCOL_HEADER: &str = "bui:v001";

pub const NUMBER_WIDTH: usize = 12;
pub const BOOL_WIDTH: usize = 5;
pub const TAG_WIDTH: usize = 8;
pub const CONTENT_WIDTH: usize = 96;
pub const DOCUMENT_RESERVED: usize = 16;
pub const NODE_RESERVED: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Str(usize),
    Num,
    Bool,
    Reserved(usize),
}

impl SlotKind {
    pub const fn width(self) -> usize {
        match self {
            Self::Str(width) | Self::Reserved(width) => width,
            Self::Num => NUMBER_WIDTH,
            Self::Bool => BOOL_WIDTH,
        }
    }

    pub const fn encoded_len(self) -> usize {
        field_len(self.width(), matches!(self, Self::Reserved(_)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    pub name: &'static str,
    pub kind: SlotKind,
}

const fn slot(name: &'static str, kind: SlotKind) -> FieldSlot {
    FieldSlot { name, kind }
}

/// Document section, written once after the header.
pub const DOCUMENT_FIELDS: [FieldSlot; 3] = [
    slot("node_count", SlotKind::Num),
    slot("button_count", SlotKind::Num),
    slot("reserved", SlotKind::Reserved(DOCUMENT_RESERVED)),
];

/// Per-node record. Append-only: new fields go at the end, carved out of
/// reserved space, so existing offsets never move.
pub const NODE_FIELDS: [FieldSlot; 15] = [
    slot("tag", SlotKind::Str(TAG_WIDTH)),
    slot("width", SlotKind::Num),
    slot("height", SlotKind::Num),
    slot("x", SlotKind::Num),
    slot("y", SlotKind::Num),
    slot("visible", SlotKind::Bool),
    slot("enabled", SlotKind::Bool),
    slot("layer", SlotKind::Num),
    slot("alpha", SlotKind::Num),
    slot("inherit_visible", SlotKind::Bool),
    slot("inherit_enabled", SlotKind::Bool),
    slot("content", SlotKind::Str(CONTENT_WIDTH)),
    slot("button_index", SlotKind::Num),
    slot("child_count", SlotKind::Num),
    slot("reserved", SlotKind::Reserved(NODE_RESERVED)),
];

const fn section_len(fields: &[FieldSlot]) -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < fields.len() {
        total += fields[i].kind.encoded_len();
        i += 1;
    }
    total
}

/// Byte offset of the first node record.
pub const NODES_OFFSET: usize = PROTOCOL_HEADER.len() + section_len(&DOCUMENT_FIELDS);
/// Byte length of one node record.
pub const RECORD_LEN: usize = section_len(&NODE_FIELDS);

/// Byte offset of `field` inside a section laid out as `fields`.
pub fn field_offset(fields: &[FieldSlot], field: &str) -> Option<usize> {
    let mut offset = 0;
    for slot in fields {
        if slot.name == field {
            return Some(offset);
        }
        offset += slot.kind.encoded_len();
    }
    None
}

/// Press callbacks by button index, in record order.
#[derive(Clone, Default)]
pub struct ButtonTable {
    entries: Vec<Option<Callback>>,
}

impl ButtonTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the callback registered for `index`. Returns false when the index
    /// is unknown or the button has no handler.
    pub fn press(&self, index: usize) -> Result<bool> {
        match self.entries.get(index) {
            Some(Some(callback)) => {
                callback()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl fmt::Debug for ButtonTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ButtonTable")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SerializedForm {
    pub payload: String,
    pub buttons: ButtonTable,
    pub node_count: usize,
}

/// Encodes a built tree into the single-string form payload.
///
/// Records are written in pre-order. Fragments write nothing; their
/// children count toward the nearest non-transparent ancestor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Serializer;

impl Serializer {
    pub fn new() -> Self {
        Self
    }

    pub fn serialize(&self, root: &BuiltElement) -> Result<SerializedForm> {
        let records = root.records();
        let button_count = records.iter().filter(|r| r.tag.is_interactive()).count();

        let mut writer = FieldWriter::new(PROTOCOL_HEADER);
        let document = [
            FieldValue::Num(records.len() as f64),
            FieldValue::Num(button_count as f64),
            FieldValue::Reserved(DOCUMENT_RESERVED),
        ];
        for (slot, value) in DOCUMENT_FIELDS.iter().zip(&document) {
            writer.push(slot.name, value, slot.kind.width())?;
        }

        let mut buttons = ButtonTable::default();
        for record in &records {
            let button_index = if record.tag.is_interactive() {
                buttons.entries.push(record.on_press.clone());
                (buttons.entries.len() - 1) as f64
            } else {
                -1.0
            };
            let values = record_values(record, button_index)?;
            for (slot, value) in NODE_FIELDS.iter().zip(&values) {
                writer.push(slot.name, value, slot.kind.width())?;
            }
        }

        Ok(SerializedForm {
            payload: writer.finish(),
            buttons,
            node_count: records.len(),
        })
    }
}

fn record_values(record: &BuiltElement, button_index: f64) -> Result<[FieldValue; 15]> {
    let c = &record.controls;
    Ok([
        FieldValue::Str(record.tag.as_str().to_string()),
        FieldValue::Num(c.width),
        FieldValue::Num(c.height),
        FieldValue::Num(c.x),
        FieldValue::Num(c.y),
        FieldValue::Bool(c.visible),
        FieldValue::Bool(c.enabled),
        FieldValue::Num(c.layer),
        FieldValue::Num(c.alpha),
        FieldValue::Bool(c.inherit_visible),
        FieldValue::Bool(c.inherit_enabled),
        FieldValue::Str(content(record)?),
        FieldValue::Num(button_index),
        FieldValue::Num(record_children(record) as f64),
        FieldValue::Reserved(NODE_RESERVED),
    ])
}

/// Text of the tag's content prop. Absent or null content is empty.
fn content(record: &BuiltElement) -> Result<String> {
    let Some(prop) = record.tag.content_prop() else {
        return Ok(String::new());
    };
    match record.props.get(prop) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::Str(s)) => Ok(s.to_string()),
        Some(Value::Number(n)) => Ok(format_number(*n)),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(FiberError::UnsupportedValue {
            field: prop.to_string(),
            kind: other.kind_name(),
        }),
    }
}

/// Direct record children, looking through fragments.
fn record_children(record: &BuiltElement) -> usize {
    record
        .children
        .iter()
        .map(|child| {
            if child.tag == Tag::Fragment {
                record_children(child)
            } else {
                1
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{RootState, inherit};
    use crate::element::{Element, Props, button, fragment, panel, text};
    use crate::value::callback;
    use std::cell::Cell;
    use std::rc::Rc;

    fn built(element: Element) -> BuiltElement {
        inherit(element, RootState::default()).unwrap()
    }

    #[test]
    fn layout_constants_match_the_field_plan() {
        assert_eq!(NODES_OFFSET, 61);
        assert_eq!(RECORD_LEN, 301);
        assert_eq!(field_offset(&NODE_FIELDS, "content"), Some(155));
        assert_eq!(field_offset(&NODE_FIELDS, "missing"), None);
    }

    #[test]
    fn payload_length_is_fixed_per_record() {
        let form = Serializer::new()
            .serialize(&built(panel().child(text("a")).child(text("b"))))
            .unwrap();
        assert_eq!(form.node_count, 3);
        assert_eq!(form.payload.len(), NODES_OFFSET + 3 * RECORD_LEN);
        assert!(form.payload.starts_with(PROTOCOL_HEADER));
    }

    #[test]
    fn every_field_of_a_long_payload_is_a_distinct_substring() {
        let rows: Vec<_> = (0..8).map(|_| text("x")).collect();
        let form = Serializer::new()
            .serialize(&built(panel().children(rows)))
            .unwrap();
        assert_eq!(form.node_count, 9);

        let mut seen = std::collections::HashSet::new();
        let mut offset = PROTOCOL_HEADER.len();
        let fields = DOCUMENT_FIELDS
            .iter()
            .chain(std::iter::repeat_n(NODE_FIELDS.iter(), 9).flatten());
        for slot in fields {
            let len = slot.kind.encoded_len();
            let field = &form.payload[offset..offset + len];
            assert!(seen.insert(field.to_string()), "repeated field {field:?}");
            offset += len;
        }
        assert_eq!(offset, form.payload.len());
        assert_eq!(seen.len(), DOCUMENT_FIELDS.len() + 9 * NODE_FIELDS.len());
    }

    #[test]
    fn prop_order_does_not_change_the_payload() {
        let mut a = Props::new();
        a.set("width", 10);
        a.set("visible", true);
        a.set("x", 4);
        let mut b = Props::new();
        b.set("x", 4);
        b.set("width", 10);
        b.set("visible", true);
        let left = Element::from_parts(crate::element::ElementType::Tag(Tag::Panel), a);
        let right = Element::from_parts(crate::element::ElementType::Tag(Tag::Panel), b);
        let s = Serializer::new();
        assert_eq!(
            s.serialize(&built(left)).unwrap().payload,
            s.serialize(&built(right)).unwrap().payload
        );
    }

    #[test]
    fn content_budget_is_measured_in_bytes() {
        let half = "é".repeat(CONTENT_WIDTH / 2);
        assert!(Serializer::new().serialize(&built(text(half.as_str()))).is_ok());

        let over = format!("{half}é");
        let err = Serializer::new().serialize(&built(text(over))).unwrap_err();
        assert!(matches!(err, FiberError::StringTooLong { max: CONTENT_WIDTH, .. }));
    }

    #[test]
    fn callbacks_and_undefined_content_are_rejected() {
        let err = Serializer::new()
            .serialize(&built(text(Value::Undefined)))
            .unwrap_err();
        assert!(matches!(err, FiberError::UnsupportedValue { kind: "undefined", .. }));
        assert!(Serializer::new().serialize(&built(text(Value::Null))).is_ok());
    }

    #[test]
    fn buttons_get_sequential_indices_and_dispatch() {
        let pressed = Rc::new(Cell::new(0));
        let make = |n: u32| {
            let pressed = pressed.clone();
            button(format!("b{n}"), callback(move || {
                pressed.set(n);
                Ok(())
            }))
        };
        let tree = panel().child(fragment(vec![make(1), make(2)])).child(text("x"));
        let form = Serializer::new().serialize(&built(tree)).unwrap();
        assert_eq!(form.buttons.len(), 2);
        assert!(form.buttons.press(1).unwrap());
        assert_eq!(pressed.get(), 2);
        assert!(!form.buttons.press(9).unwrap());
    }
}
