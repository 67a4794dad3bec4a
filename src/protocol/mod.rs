//! Fixed-width wire format for the form payload.
//!
//! Layout: an 8-byte header, a document section, then one fixed-size record
//! per non-transparent node in pre-order. Every field is
//! `prefix ':' value padding marker`, where the marker spells the field's
//! global position as three base-64 digits, so no two fields of a payload
//! share one. Consumers read by byte offset, so field order and widths are
//! part of the contract.

mod field;
mod plan;
mod reader;

pub use self::field::{
    FieldValue, FieldWriter, MARKER_ALPHABET, MARKER_WIDTH, MAX_FIELDS, format_number, marker,
    reserved,
};
pub use self::plan::{
    BOOL_WIDTH, ButtonTable, CONTENT_WIDTH, DOCUMENT_FIELDS, DOCUMENT_RESERVED, FieldSlot,
    NODE_FIELDS, NODE_RESERVED, NODES_OFFSET, NUMBER_WIDTH, PROTOCOL_HEADER, RECORD_LEN,
    SerializedForm, Serializer, SlotKind, TAG_WIDTH, field_offset,
};
pub use self::reader::{NodeRecord, PayloadReader};
