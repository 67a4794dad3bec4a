use std::ops::Range;

use crate::error::{FiberError, Result};

use super::field::{MARKER_WIDTH, PAD, SEPARATOR, marker};
use super::plan::{
    DOCUMENT_FIELDS, FieldSlot, NODE_FIELDS, NODES_OFFSET, PROTOCOL_HEADER, RECORD_LEN, SlotKind,
};

/// One decoded node record.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub tag: String,
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
    pub visible: bool,
    pub enabled: bool,
    pub layer: f64,
    pub alpha: f64,
    pub inherit_visible: bool,
    pub inherit_enabled: bool,
    /// Content with trailing padding removed.
    pub content: String,
    pub button_index: Option<usize>,
    pub child_count: usize,
}

/// Reads a payload by fixed offsets, the way the form-side decoder does.
#[derive(Debug, Clone, Copy)]
pub struct PayloadReader<'a> {
    payload: &'a str,
}

impl<'a> PayloadReader<'a> {
    pub fn new(payload: &'a str) -> Result<Self> {
        if !payload.starts_with(PROTOCOL_HEADER) {
            return Err(malformed("missing protocol header"));
        }
        if payload.len() < NODES_OFFSET || (payload.len() - NODES_OFFSET) % RECORD_LEN != 0 {
            return Err(malformed(format!("unexpected length {}", payload.len())));
        }
        Ok(Self { payload })
    }

    pub fn node_count(&self) -> Result<usize> {
        let raw = self.text(PROTOCOL_HEADER.len(), &DOCUMENT_FIELDS, 0, "node_count")?;
        parse_count(raw)
    }

    pub fn button_count(&self) -> Result<usize> {
        let raw = self.text(PROTOCOL_HEADER.len(), &DOCUMENT_FIELDS, 0, "button_count")?;
        parse_count(raw)
    }

    pub fn node(&self, index: usize) -> Result<NodeRecord> {
        if index >= (self.payload.len() - NODES_OFFSET) / RECORD_LEN {
            return Err(malformed(format!("no node record {index}")));
        }
        let base = NODES_OFFSET + index * RECORD_LEN;
        let first = DOCUMENT_FIELDS.len() + index * NODE_FIELDS.len();
        let field = |name: &str| self.text(base, &NODE_FIELDS, first, name);
        let number = |name: &str| field(name).and_then(parse_number);
        let boolean = |name: &str| field(name).and_then(parse_bool);

        let button_index = number("button_index")?;
        Ok(NodeRecord {
            tag: field("tag")?.to_string(),
            width: number("width")?,
            height: number("height")?,
            x: number("x")?,
            y: number("y")?,
            visible: boolean("visible")?,
            enabled: boolean("enabled")?,
            layer: number("layer")?,
            alpha: number("alpha")?,
            inherit_visible: boolean("inherit_visible")?,
            inherit_enabled: boolean("inherit_enabled")?,
            content: field("content")?.to_string(),
            button_index: (button_index >= 0.0).then_some(button_index as usize),
            child_count: parse_count(field("child_count")?)?,
        })
    }

    pub fn nodes(&self) -> Result<Vec<NodeRecord>> {
        (0..self.node_count()?).map(|i| self.node(i)).collect()
    }

    /// Value text of `name`, checking prefix and marker, padding stripped.
    fn text(
        &self,
        base: usize,
        fields: &[FieldSlot],
        first_position: usize,
        name: &str,
    ) -> Result<&'a str> {
        let mut offset = base;
        for (i, slot) in fields.iter().enumerate() {
            let len = slot.kind.encoded_len();
            if slot.name != name {
                offset += len;
                continue;
            }
            let (SlotKind::Str(_) | SlotKind::Num | SlotKind::Bool) = slot.kind else {
                return Err(malformed(format!("`{name}` is reserved space")));
            };
            let raw = self.slice(offset..offset + len)?;
            let expected_prefix = match slot.kind {
                SlotKind::Str(_) => 's',
                SlotKind::Num => 'n',
                _ => 'b',
            };
            let mut chars = raw.chars();
            if chars.next() != Some(expected_prefix) || chars.next() != Some(SEPARATOR) {
                return Err(malformed(format!("bad prefix for `{name}`")));
            }
            if !marker(first_position + i).is_some_and(|m| raw.ends_with(m.as_str())) {
                return Err(malformed(format!("bad marker for `{name}`")));
            }
            return Ok(raw[2..len - MARKER_WIDTH].trim_end_matches(PAD));
        }
        Err(malformed(format!("unknown field `{name}`")))
    }

    fn slice(&self, range: Range<usize>) -> Result<&'a str> {
        self.payload
            .get(range.clone())
            .ok_or_else(|| malformed(format!("field at {range:?} is out of bounds")))
    }
}

fn malformed(message: impl Into<String>) -> FiberError {
    FiberError::MalformedPayload(message.into())
}

fn parse_number(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| malformed(format!("`{raw}` is not a number")))
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(malformed(format!("`{other}` is not a boolean"))),
    }
}

fn parse_count(raw: &str) -> Result<usize> {
    raw.parse::<usize>()
        .map_err(|_| malformed(format!("`{raw}` is not a count")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{RootState, inherit};
    use crate::element::{button, panel, text};
    use crate::protocol::Serializer;
    use crate::value::callback;

    #[test]
    fn reads_back_what_the_serializer_wrote() {
        let tree = panel()
            .size(200.0, 100.0)
            .at(100.0, 100.0)
            .absolute()
            .child(text("héllo").at(-2.5, 3.0))
            .child(button("Go", callback(|| Ok(()))).enabled(false));
        let built = inherit(tree, RootState::default()).unwrap();
        let form = Serializer::new().serialize(&built).unwrap();

        let reader = PayloadReader::new(&form.payload).unwrap();
        assert_eq!(reader.node_count().unwrap(), 3);
        assert_eq!(reader.button_count().unwrap(), 1);

        let nodes = reader.nodes().unwrap();
        assert_eq!(nodes[0].tag, "panel");
        assert_eq!(nodes[0].child_count, 2);
        assert_eq!((nodes[0].width, nodes[0].height), (200.0, 100.0));
        assert_eq!(nodes[1].content, "héllo");
        assert_eq!((nodes[1].x, nodes[1].y), (97.5, 103.0));
        assert_eq!(nodes[1].button_index, None);
        assert_eq!(nodes[2].button_index, Some(0));
        assert!(!nodes[2].enabled);
        assert!(nodes[2].visible);
    }

    #[test]
    fn rejects_foreign_or_truncated_payloads() {
        assert!(matches!(
            PayloadReader::new("nope"),
            Err(FiberError::MalformedPayload(_))
        ));
        let form = Serializer::new()
            .serialize(&inherit(panel(), RootState::default()).unwrap())
            .unwrap();
        let cut = &form.payload[..form.payload.len() - 1];
        assert!(PayloadReader::new(cut).is_err());
        let reader = PayloadReader::new(&form.payload).unwrap();
        assert!(reader.node(1).is_err());
    }
}
