use crate::error::{FiberError, Result};
use crate::value::Value;

pub const MARKER_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Marker bytes per field: the global position written in base 64.
pub const MARKER_WIDTH: usize = 3;

/// Positions a payload can hold before markers would repeat.
pub const MAX_FIELDS: usize = 64 * 64 * 64;

pub const PAD: char = ' ';
pub const SEPARATOR: char = ':';

/// Marker for the field at global position `position`, most significant
/// digit first. `None` past [`MAX_FIELDS`].
pub fn marker(position: usize) -> Option<String> {
    if position >= MAX_FIELDS {
        return None;
    }
    let base = MARKER_ALPHABET.len();
    let digits = [position / (base * base), (position / base) % base, position % base];
    Some(digits.iter().map(|&d| char::from(MARKER_ALPHABET[d])).collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Num(f64),
    Bool(bool),
    /// Span of padding kept for later protocol growth.
    Reserved(usize),
}

impl FieldValue {
    pub fn prefix(&self) -> Option<char> {
        match self {
            Self::Str(_) => Some('s'),
            Self::Num(_) => Some('n'),
            Self::Bool(_) => Some('b'),
            Self::Reserved(_) => None,
        }
    }

    /// Map a dynamic value onto a wire field. Anything without a wire form
    /// is rejected rather than coerced.
    pub fn from_value(field: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(Self::Str(s.to_string())),
            Value::Number(n) => Ok(Self::Num(*n)),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            other => Err(FiberError::UnsupportedValue {
                field: field.to_string(),
                kind: other.kind_name(),
            }),
        }
    }
}

/// Reserved span of `count` bytes. `count` must be a finite non-negative
/// integer.
pub fn reserved(count: f64) -> Result<FieldValue> {
    if !count.is_finite() || count < 0.0 || count.fract() != 0.0 {
        return Err(FiberError::InvalidReservedBytes(format_number(count)));
    }
    Ok(FieldValue::Reserved(count as usize))
}

/// Number text as a JavaScript engine would print it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{n}");
    }
    let text = format!("{n:e}");
    match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => text,
    }
}

/// Total encoded length of a field with a value region of `width` bytes.
pub const fn field_len(width: usize, reserved: bool) -> usize {
    if reserved {
        width + MARKER_WIDTH
    } else {
        width + 2 + MARKER_WIDTH
    }
}

/// Appends fixed-width fields and tracks the global field position.
#[derive(Debug, Default)]
pub struct FieldWriter {
    out: String,
    position: usize,
}

impl FieldWriter {
    pub fn new(header: &str) -> Self {
        Self {
            out: header.to_string(),
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Encode `value` into a region of `width` bytes.
    ///
    /// Numbers are truncated to fit. Strings longer than `width` bytes are an
    /// error.
    pub fn push(&mut self, field: &str, value: &FieldValue, width: usize) -> Result<()> {
        let Some(marker) = marker(self.position) else {
            return Err(FiberError::PayloadTooLarge {
                fields: self.position + 1,
                max: MAX_FIELDS,
            });
        };
        match value {
            FieldValue::Reserved(count) => {
                self.pad(*count);
            }
            FieldValue::Str(s) => {
                if s.len() > width {
                    return Err(FiberError::StringTooLong {
                        field: field.to_string(),
                        bytes: s.len(),
                        max: width,
                    });
                }
                self.open('s');
                self.out.push_str(s);
                self.pad(width - s.len());
            }
            FieldValue::Num(n) => {
                let mut text = format_number(*n);
                text.truncate(width);
                self.open('n');
                self.pad_str(&text, width);
            }
            FieldValue::Bool(b) => {
                let text = if *b { "true" } else { "false" };
                self.open('b');
                self.pad_str(text, width);
            }
        }
        self.out.push_str(&marker);
        self.position += 1;
        Ok(())
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn open(&mut self, prefix: char) {
        self.out.push(prefix);
        self.out.push(SEPARATOR);
    }

    fn pad_str(&mut self, text: &str, width: usize) {
        self.out.push_str(text);
        self.pad(width.saturating_sub(text.len()));
    }

    fn pad(&mut self, count: usize) {
        self.out.extend(std::iter::repeat_n(PAD, count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_like_javascript() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-12.5), "-12.5");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn long_numbers_are_truncated_not_rounded() {
        let mut writer = FieldWriter::new("");
        writer.push("n", &FieldValue::Num(1.0 / 3.0), 5).unwrap();
        assert_eq!(writer.finish(), "n:0.333AAA");
    }

    #[test]
    fn string_limit_counts_encoded_bytes() {
        let exact = "é".repeat(4);
        let mut writer = FieldWriter::new("");
        writer.push("s", &FieldValue::Str(exact.clone()), 8).unwrap();
        assert_eq!(writer.len(), 13);

        let over = "é".repeat(5);
        let err = writer.push("s", &FieldValue::Str(over), 8).unwrap_err();
        assert!(matches!(err, FiberError::StringTooLong { bytes: 10, max: 8, .. }));
        assert!(err.to_string().contains("exceeds maximum byte length"));

        let emoji = "😀😀";
        writer.push("s", &FieldValue::Str(emoji.to_string()), 8).unwrap();
    }

    #[test]
    fn identical_values_get_distinct_markers() {
        let mut writer = FieldWriter::new("");
        writer.push("a", &FieldValue::Bool(true), 5).unwrap();
        writer.push("b", &FieldValue::Bool(true), 5).unwrap();
        let out = writer.finish();
        assert_eq!(&out[..10], "b:true AAA");
        assert_eq!(&out[10..], "b:true AAB");
    }

    #[test]
    fn markers_stay_unique_past_one_alphabet_cycle() {
        assert_eq!(marker(63).as_deref(), Some("AA/"));
        assert_eq!(marker(64).as_deref(), Some("ABA"));
        assert_eq!(marker(MAX_FIELDS - 1).as_deref(), Some("///"));
        assert_eq!(marker(MAX_FIELDS), None);

        let markers: std::collections::HashSet<_> = (0..4096).filter_map(marker).collect();
        assert_eq!(markers.len(), 4096);
    }

    #[test]
    fn writer_refuses_positions_past_the_marker_space() {
        let mut writer = FieldWriter {
            out: String::new(),
            position: MAX_FIELDS,
        };
        let err = writer.push("x", &FieldValue::Bool(true), 5).unwrap_err();
        assert!(matches!(err, FiberError::PayloadTooLarge { .. }));
    }

    #[test]
    fn reserved_counts_are_validated() {
        assert_eq!(reserved(4.0).unwrap(), FieldValue::Reserved(4));
        for bad in [-1.0, 1.5, f64::INFINITY, f64::NAN] {
            assert!(matches!(reserved(bad), Err(FiberError::InvalidReservedBytes(_))));
        }
        let mut writer = FieldWriter::new("");
        writer.push("r", &reserved(3.0).unwrap(), 3).unwrap();
        assert_eq!(writer.finish(), "   AAA");
    }

    #[test]
    fn undefined_and_callbacks_have_no_wire_form() {
        let err = FieldValue::from_value("x", &Value::Undefined).unwrap_err();
        assert!(matches!(err, FiberError::UnsupportedValue { kind: "undefined", .. }));
    }
}
