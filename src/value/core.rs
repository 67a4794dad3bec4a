use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;

/// Press handler recorded for interactive controls.
pub type Callback = Rc<dyn Fn() -> Result<()>>;

/// Wrap a closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn() -> Result<()> + 'static,
{
    Rc::new(f)
}

/// Object.is for doubles.
pub fn object_is(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Callback(Callback),
    /// Address of a live `Rc`, used to put handles into dependency lists.
    Identity(usize),
    Opaque(Rc<dyn Any>),
}

impl Value {
    pub fn identity_of<T: ?Sized>(rc: &Rc<T>) -> Self {
        Self::Identity(Rc::as_ptr(rc) as *const () as usize)
    }

    pub fn opaque<T: Any>(value: T) -> Self {
        Self::Opaque(Rc::new(value))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Callback(_) => "callback",
            Self::Identity(_) => "identity",
            Self::Opaque(_) => "object",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Self::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => object_is(*a, *b),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Callback(a), Self::Callback(b)) => Rc::ptr_eq(a, b),
            (Self::Identity(a), Self::Identity(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n:?})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Callback(cb) => write!(f, "Callback({:p})", Rc::as_ptr(cb)),
            Self::Identity(addr) => write!(f, "Identity({addr:#x})"),
            Self::Opaque(rc) => write!(f, "Opaque({:p})", Rc::as_ptr(rc)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Self::Str(value)
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Self::Callback(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// True when an effect with `next` deps must re-run after `prev`.
pub fn deps_changed(prev: &[Value], next: &[Value]) -> bool {
    prev.len() != next.len() || prev.iter().zip(next).any(|(a, b)| !a.same_value(b))
}

/// Identity comparison used for hook state.
///
/// Plain data compares structurally; floats follow Object.is and `Rc`
/// compares by pointer.
pub trait SameValue {
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! same_value_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SameValue for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

same_value_by_eq!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    String,
    &'static str,
);

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        object_is(*self, *other)
    }
}

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        object_is(f64::from(*self), f64::from(*other))
    }
}

impl SameValue for Value {
    fn same_value(&self, other: &Self) -> bool {
        Value::same_value(self, other)
    }
}

impl<T: ?Sized> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<A: SameValue, B: SameValue> SameValue for (A, B) {
    fn same_value(&self, other: &Self) -> bool {
        self.0.same_value(&other.0) && self.1.same_value(&other.1)
    }
}

impl<A: SameValue, B: SameValue, C: SameValue> SameValue for (A, B, C) {
    fn same_value(&self, other: &Self) -> bool {
        self.0.same_value(&other.0) && self.1.same_value(&other.1) && self.2.same_value(&other.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_signs_are_distinct() {
        assert!(!object_is(0.0, -0.0));
        assert!(object_is(-0.0, -0.0));
        assert!(!Value::from(0.0).same_value(&Value::from(-0.0)));
    }

    #[test]
    fn nan_equals_nan() {
        assert!(object_is(f64::NAN, f64::NAN));
        assert!(Value::Number(f64::NAN).same_value(&Value::Number(f64::NAN)));
    }

    #[test]
    fn callbacks_compare_by_pointer() {
        let a = callback(|| Ok(()));
        let b = callback(|| Ok(()));
        assert!(Value::Callback(a.clone()).same_value(&Value::Callback(a.clone())));
        assert!(!Value::Callback(a).same_value(&Value::Callback(b)));
    }

    #[test]
    fn deps_compare_length_then_elements() {
        let one = vec![Value::from(1)];
        assert!(!deps_changed(&one, &[Value::from(1)]));
        assert!(deps_changed(&one, &[Value::from(2)]));
        assert!(deps_changed(&one, &[Value::from(1), Value::from(1)]));
        assert!(!deps_changed(&[], &[]));
    }

    #[test]
    fn strings_compare_by_content() {
        assert!(Value::from("a").same_value(&Value::from(String::from("a"))));
        assert!(!Value::from("a").same_value(&Value::Null));
    }
}
