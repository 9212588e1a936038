//! Value conversion between typed field values and document-safe BSON.
//!
//! Two traits split the work:
//!
//! - [`Scalar`] converts a single leaf value. It normalizes integer widths on write
//!   (narrow integers become `Int32`, wide ones `Int64`, 64-bit unsigned values become
//!   decimal strings) and accepts any integer width on read, failing on overflow
//!   instead of truncating.
//! - [`FieldValue`] is the object-safe view the mapping engine walks. Scalars,
//!   `Option<T>`, `Vec<T>` and derived records all implement it.
//!
//! Application scalar types implement [`Scalar`] plus [`ZeroValue`] and then register
//! with [`scalar_field!`](crate::scalar_field).

use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{OdmError, OdmResult};
use crate::record::RecordFields;

/// Implement [`FieldValue`] for types that implement [`Scalar`] and [`ZeroValue`].
///
/// ```rust
/// use docmap::bson::Bson;
/// use docmap::value::{Scalar, ZeroValue};
/// use docmap::{OdmError, OdmResult};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Cents(i64);
///
/// impl ZeroValue for Cents {
///     fn zero() -> Self {
///         Cents(0)
///     }
/// }
///
/// impl Scalar for Cents {
///     fn encode(&self) -> Bson {
///         Bson::Int64(self.0)
///     }
///
///     fn decode(value: &Bson) -> OdmResult<Self> {
///         i64::decode(value).map(Cents)
///     }
///
///     fn is_default(&self) -> bool {
///         self.0 == 0
///     }
/// }
///
/// docmap::scalar_field!(Cents);
/// ```
#[macro_export]
macro_rules! scalar_field {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::value::FieldValue for $ty {
            fn shape(&self) -> $crate::value::FieldShape {
                $crate::value::FieldShape::Scalar
            }

            fn is_zero(&self) -> bool {
                <$ty as $crate::value::Scalar>::is_default(self)
            }

            fn to_bson(&self) -> $crate::OdmResult<$crate::bson::Bson> {
                Ok(<$ty as $crate::value::Scalar>::encode(self))
            }

            fn apply_bson(&mut self, value: &$crate::bson::Bson) -> $crate::OdmResult<bool> {
                *self = match value {
                    $crate::bson::Bson::Null => <$ty as $crate::value::ZeroValue>::zero(),
                    other => <$ty as $crate::value::Scalar>::decode(other)?,
                };
                Ok(true)
            }

            fn reset(&mut self) {
                *self = <$ty as $crate::value::ZeroValue>::zero();
            }
        }
    )+};
}

/// The zero state of a field: what a freshly constructed record holds.
///
/// Separate from [`Default`] because some stored types (such as [`ObjectId`]) have a
/// `Default` that is not a zero value.
pub trait ZeroValue: Sized {
    /// The zero value.
    fn zero() -> Self;
}

/// A leaf value with a document-safe representation.
pub trait Scalar: ZeroValue {
    /// Encode into its stored form.
    fn encode(&self) -> Bson;

    /// Decode from a stored value. `null` never reaches this method.
    fn decode(value: &Bson) -> OdmResult<Self>;

    /// Whether this is the zero value.
    fn is_default(&self) -> bool;
}

/// Structural kind of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Leaf value.
    Scalar,
    /// Nested record.
    Record,
    /// Homogeneous list.
    List,
}

/// Object-safe access to one field of a record.
pub trait FieldValue {
    /// Structural kind. `Option<T>` reports the kind of `T`.
    fn shape(&self) -> FieldShape;

    /// Whether the field holds its zero value (empty for optionals and lists).
    fn is_zero(&self) -> bool;

    /// Whether the field is an empty optional.
    fn is_null(&self) -> bool {
        false
    }

    /// Map the current value into its stored representation.
    fn to_bson(&self) -> OdmResult<Bson>;

    /// Overwrite the value from a stored representation.
    ///
    /// Returns whether the field was assigned. Nested records are only assigned when
    /// at least one of their own fields was found.
    fn apply_bson(&mut self, value: &Bson) -> OdmResult<bool>;

    /// Apply the parent document to an inlined record.
    fn apply_inline(&mut self, _parent: &Document) -> OdmResult<bool> {
        Err(OdmError::configuration(
            "only record fields can be inlined",
        ))
    }

    /// Borrow as a nested record, if this field currently holds one.
    fn as_record(&self) -> Option<&dyn RecordFields> {
        None
    }

    /// Mutably borrow as a nested record, if this field currently holds one.
    fn as_record_mut(&mut self) -> Option<&mut dyn RecordFields> {
        None
    }

    /// Reset to the zero value.
    fn reset(&mut self);
}

fn type_mismatch(expected: &str, found: &Bson) -> OdmError {
    OdmError::conversion(
        "",
        format!("expected {expected}, found {:?}", found.element_type()),
    )
}

/// Read any stored integer width. Unsigned targets also accept decimal strings.
fn read_integer(value: &Bson, allow_string: bool) -> OdmResult<i128> {
    match value {
        Bson::Int32(n) => Ok(i128::from(*n)),
        Bson::Int64(n) => Ok(i128::from(*n)),
        Bson::Double(d) if d.fract() == 0.0 && d.is_finite() && d.abs() < 9.2e18 => {
            Ok(*d as i128)
        }
        Bson::Double(d) => Err(OdmError::conversion(
            "",
            format!("{d} is not an integral value"),
        )),
        Bson::String(s) if allow_string => s
            .trim()
            .parse::<i128>()
            .map_err(|_| OdmError::conversion("", format!("'{s}' is not a decimal integer"))),
        other => Err(type_mismatch("an integer", other)),
    }
}

fn narrow<T: TryFrom<i128>>(n: i128, target: &str) -> OdmResult<T> {
    T::try_from(n).map_err(|_| OdmError::conversion("", format!("{n} overflows {target}")))
}

macro_rules! integer_scalar {
    ($($ty:ty => $variant:ident($wire:ty), unsigned = $unsigned:expr);+ $(;)?) => {$(
        impl ZeroValue for $ty {
            fn zero() -> Self {
                0
            }
        }

        impl Scalar for $ty {
            fn encode(&self) -> Bson {
                Bson::$variant(<$wire>::from(*self))
            }

            fn decode(value: &Bson) -> OdmResult<Self> {
                narrow(read_integer(value, $unsigned)?, stringify!($ty))
            }

            fn is_default(&self) -> bool {
                *self == 0
            }
        }

        scalar_field!($ty);
    )+};
}

integer_scalar! {
    i8 => Int32(i32), unsigned = false;
    i16 => Int32(i32), unsigned = false;
    i32 => Int32(i32), unsigned = false;
    i64 => Int64(i64), unsigned = false;
    u8 => Int32(i32), unsigned = true;
    u16 => Int32(i32), unsigned = true;
    u32 => Int64(i64), unsigned = true;
}

impl ZeroValue for isize {
    fn zero() -> Self {
        0
    }
}

impl Scalar for isize {
    fn encode(&self) -> Bson {
        Bson::Int64(*self as i64)
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        narrow(read_integer(value, false)?, "isize")
    }

    fn is_default(&self) -> bool {
        *self == 0
    }
}

// 64-bit unsigned values do not fit Int64, so they are always stored as decimal strings.
macro_rules! wide_unsigned_scalar {
    ($($ty:ty),+) => {$(
        impl ZeroValue for $ty {
            fn zero() -> Self {
                0
            }
        }

        impl Scalar for $ty {
            fn encode(&self) -> Bson {
                Bson::String(self.to_string())
            }

            fn decode(value: &Bson) -> OdmResult<Self> {
                narrow(read_integer(value, true)?, stringify!($ty))
            }

            fn is_default(&self) -> bool {
                *self == 0
            }
        }

        scalar_field!($ty);
    )+};
}

wide_unsigned_scalar!(u64, usize);

impl ZeroValue for f64 {
    fn zero() -> Self {
        0.0
    }
}

impl Scalar for f64 {
    fn encode(&self) -> Bson {
        Bson::Double(*self)
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        match value {
            Bson::Double(d) => Ok(*d),
            Bson::Int32(n) => Ok(f64::from(*n)),
            Bson::Int64(n) => Ok(*n as f64),
            other => Err(type_mismatch("a number", other)),
        }
    }

    fn is_default(&self) -> bool {
        *self == 0.0
    }
}

impl ZeroValue for f32 {
    fn zero() -> Self {
        0.0
    }
}

impl Scalar for f32 {
    fn encode(&self) -> Bson {
        Bson::Double(f64::from(*self))
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        let wide = f64::decode(value)?;
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(OdmError::conversion("", format!("{wide} overflows f32")));
        }
        Ok(wide as f32)
    }

    fn is_default(&self) -> bool {
        *self == 0.0
    }
}

impl ZeroValue for bool {
    fn zero() -> Self {
        false
    }
}

impl Scalar for bool {
    fn encode(&self) -> Bson {
        Bson::Boolean(*self)
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        match value {
            Bson::Boolean(b) => Ok(*b),
            other => Err(type_mismatch("a boolean", other)),
        }
    }

    fn is_default(&self) -> bool {
        !*self
    }
}

impl ZeroValue for String {
    fn zero() -> Self {
        String::new()
    }
}

impl Scalar for String {
    fn encode(&self) -> Bson {
        Bson::String(self.clone())
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        match value {
            Bson::String(s) | Bson::Symbol(s) => Ok(s.clone()),
            other => Err(type_mismatch("a string", other)),
        }
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl ZeroValue for ObjectId {
    fn zero() -> Self {
        ObjectId::from_bytes([0; 12])
    }
}

impl Scalar for ObjectId {
    fn encode(&self) -> Bson {
        Bson::ObjectId(*self)
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        match value {
            Bson::ObjectId(oid) => Ok(*oid),
            Bson::String(hex) => ObjectId::parse_str(hex)
                .map_err(|e| OdmError::conversion("", format!("invalid object id '{hex}': {e}"))),
            other => Err(type_mismatch("an object id", other)),
        }
    }

    fn is_default(&self) -> bool {
        self.bytes() == [0; 12]
    }
}

impl ZeroValue for bson::DateTime {
    fn zero() -> Self {
        bson::DateTime::from_millis(0)
    }
}

impl Scalar for bson::DateTime {
    fn encode(&self) -> Bson {
        Bson::DateTime(*self)
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        match value {
            Bson::DateTime(dt) => Ok(*dt),
            other => Err(type_mismatch("a datetime", other)),
        }
    }

    fn is_default(&self) -> bool {
        self.timestamp_millis() == 0
    }
}

impl ZeroValue for DateTime<Utc> {
    fn zero() -> Self {
        DateTime::<Utc>::default()
    }
}

impl Scalar for DateTime<Utc> {
    fn encode(&self) -> Bson {
        Bson::DateTime(bson::DateTime::from_chrono(*self))
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        bson::DateTime::decode(value).map(|dt| dt.to_chrono())
    }

    fn is_default(&self) -> bool {
        self.timestamp_millis() == 0
    }
}

impl ZeroValue for Uuid {
    fn zero() -> Self {
        Uuid::nil()
    }
}

impl Scalar for Uuid {
    fn encode(&self) -> Bson {
        Bson::Binary(Binary::from_uuid(bson::Uuid::from(*self)))
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        match value {
            Bson::Binary(binary) if binary.subtype == BinarySubtype::Uuid => binary
                .to_uuid()
                .map(|uuid| uuid.to_uuid_1())
                .map_err(|e| OdmError::conversion("", e.to_string())),
            Bson::String(s) => Uuid::parse_str(s)
                .map_err(|e| OdmError::conversion("", format!("invalid uuid '{s}': {e}"))),
            other => Err(type_mismatch("a uuid", other)),
        }
    }

    fn is_default(&self) -> bool {
        self.is_nil()
    }
}

impl ZeroValue for Binary {
    fn zero() -> Self {
        Binary {
            subtype: BinarySubtype::Generic,
            bytes: Vec::new(),
        }
    }
}

impl Scalar for Binary {
    fn encode(&self) -> Bson {
        Bson::Binary(self.clone())
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        match value {
            Bson::Binary(binary) => Ok(binary.clone()),
            other => Err(type_mismatch("binary data", other)),
        }
    }

    fn is_default(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ZeroValue for Document {
    fn zero() -> Self {
        Document::new()
    }
}

impl Scalar for Document {
    fn encode(&self) -> Bson {
        Bson::Document(self.clone())
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        match value {
            Bson::Document(doc) => Ok(doc.clone()),
            other => Err(type_mismatch("a document", other)),
        }
    }

    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl ZeroValue for Bson {
    fn zero() -> Self {
        Bson::Null
    }
}

impl Scalar for Bson {
    fn encode(&self) -> Bson {
        self.clone()
    }

    fn decode(value: &Bson) -> OdmResult<Self> {
        Ok(value.clone())
    }

    fn is_default(&self) -> bool {
        matches!(self, Bson::Null)
    }
}

scalar_field!(
    isize,
    f64,
    f32,
    bool,
    String,
    ObjectId,
    bson::DateTime,
    DateTime<Utc>,
    Uuid,
    Binary,
    Document,
    Bson,
);

impl<T> ZeroValue for Option<T> {
    fn zero() -> Self {
        None
    }
}

impl<T: FieldValue + ZeroValue> FieldValue for Option<T> {
    fn shape(&self) -> FieldShape {
        match self {
            Some(value) => value.shape(),
            None => T::zero().shape(),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn to_bson(&self) -> OdmResult<Bson> {
        match self {
            Some(value) => value.to_bson(),
            None => Ok(Bson::Null),
        }
    }

    fn apply_bson(&mut self, value: &Bson) -> OdmResult<bool> {
        if matches!(value, Bson::Null) {
            *self = None;
            return Ok(true);
        }
        let mut fresh = T::zero();
        let assigned = fresh.apply_bson(value)?;
        if assigned {
            *self = Some(fresh);
        }
        Ok(assigned)
    }

    fn apply_inline(&mut self, parent: &Document) -> OdmResult<bool> {
        let mut fresh = T::zero();
        let found = fresh.apply_inline(parent)?;
        if found {
            *self = Some(fresh);
        }
        Ok(found)
    }

    fn as_record(&self) -> Option<&dyn RecordFields> {
        self.as_ref().and_then(|value| value.as_record())
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn RecordFields> {
        self.as_mut().and_then(|value| value.as_record_mut())
    }

    fn reset(&mut self) {
        *self = None;
    }
}

impl<T> ZeroValue for Vec<T> {
    fn zero() -> Self {
        Vec::new()
    }
}

impl<T: FieldValue + ZeroValue> FieldValue for Vec<T> {
    fn shape(&self) -> FieldShape {
        FieldShape::List
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn to_bson(&self) -> OdmResult<Bson> {
        self.iter()
            .enumerate()
            .map(|(i, element)| element.to_bson().map_err(|e| e.within(&i.to_string())))
            .collect::<OdmResult<Vec<_>>>()
            .map(Bson::Array)
    }

    fn apply_bson(&mut self, value: &Bson) -> OdmResult<bool> {
        let elements = match value {
            Bson::Null => {
                self.clear();
                return Ok(true);
            }
            Bson::Array(elements) => elements,
            other => return Err(type_mismatch("an array", other)),
        };

        let mut rebuilt = Vec::with_capacity(elements.len());
        for (i, stored) in elements.iter().enumerate() {
            let mut element = T::zero();
            if !matches!(stored, Bson::Null) {
                element
                    .apply_bson(stored)
                    .map_err(|e| e.within(&i.to_string()))?;
            }
            rebuilt.push(element);
        }
        *self = rebuilt;
        Ok(true)
    }

    fn reset(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_integer_width_normalization() {
        assert_eq!(7i8.encode(), Bson::Int32(7));
        assert_eq!(7u16.encode(), Bson::Int32(7));
        assert_eq!(7u32.encode(), Bson::Int64(7));
        assert_eq!(7i64.encode(), Bson::Int64(7));
        assert_eq!(u64::MAX.encode(), Bson::String("18446744073709551615".into()));
        assert_eq!(3usize.encode(), Bson::String("3".into()));
    }

    #[test]
    fn test_integer_reads_accept_any_width() {
        assert_eq!(i64::decode(&Bson::Int32(5)).unwrap(), 5);
        assert_eq!(i8::decode(&Bson::Int64(-5)).unwrap(), -5);
        assert_eq!(u64::decode(&Bson::String("18446744073709551615".into())).unwrap(), u64::MAX);
        assert_eq!(u32::decode(&Bson::String("42".into())).unwrap(), 42);
        assert_eq!(i32::decode(&Bson::Double(3.0)).unwrap(), 3);
    }

    #[test]
    fn test_integer_overflow_is_rejected() {
        let err = i8::decode(&Bson::Int32(300)).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("overflows i8"));

        assert!(u8::decode(&Bson::Int32(-1)).is_err());
        assert!(i32::decode(&Bson::Double(1.5)).is_err());
        assert!(i32::decode(&Bson::String("1".into())).is_err());
    }

    #[test]
    fn test_float_reads() {
        assert_eq!(f64::decode(&Bson::Int32(2)).unwrap(), 2.0);
        assert_eq!(f32::decode(&Bson::Double(1.5)).unwrap(), 1.5);
        assert!(f32::decode(&Bson::Double(1e300)).is_err());
    }

    #[test]
    fn test_object_id_zero() {
        let zero = ObjectId::zero();
        assert!(zero.is_default());
        assert!(!ObjectId::new().is_default());

        let hex = "64b7f0c2a1b2c3d4e5f60718";
        let parsed = ObjectId::decode(&Bson::String(hex.into())).unwrap();
        assert_eq!(parsed.to_hex(), hex);
    }

    #[test]
    fn test_uuid_roundtrip() {
        let id = Uuid::new_v4();
        let stored = id.encode();
        assert!(matches!(&stored, Bson::Binary(b) if b.subtype == BinarySubtype::Uuid));
        assert_eq!(Uuid::decode(&stored).unwrap(), id);
        assert_eq!(Uuid::decode(&Bson::String(id.to_string())).unwrap(), id);
    }

    #[test]
    fn test_chrono_keeps_millis() {
        let stored = bson::DateTime::from_millis(1_700_000_000_123);
        let value = DateTime::<Utc>::decode(&Bson::DateTime(stored)).unwrap();
        assert_eq!(value.timestamp_millis(), 1_700_000_000_123);
        assert!(DateTime::<Utc>::zero().is_default());
    }

    #[test]
    fn test_null_resets_scalar_to_zero() {
        let mut count = 12i32;
        assert!(count.apply_bson(&Bson::Null).unwrap());
        assert_eq!(count, 0);
    }

    #[test]
    fn test_option_null_distinctness() {
        let empty: Option<i32> = None;
        assert_eq!(empty.to_bson().unwrap(), Bson::Null);
        assert!(empty.is_null());

        let mut value = Some(0i32);
        assert_eq!(value.to_bson().unwrap(), Bson::Int32(0));
        assert!(!value.is_zero());

        value.apply_bson(&Bson::Null).unwrap();
        assert_eq!(value, None);
        value.apply_bson(&Bson::Int64(9)).unwrap();
        assert_eq!(value, Some(9));
    }

    #[test]
    fn test_list_rebuild() {
        let mut list = vec![1i32, 2, 3];
        list.apply_bson(&Bson::Array(vec![Bson::Int32(4), Bson::Null]))
            .unwrap();
        assert_eq!(list, vec![4, 0]);

        let err = list
            .apply_bson(&Bson::Array(vec![Bson::String("x".into())]))
            .unwrap_err();
        match err {
            OdmError::Conversion { path, .. } => assert_eq!(path, "0"),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(list.apply_bson(&Bson::Int32(1)).is_err());
    }

    #[test]
    fn test_list_of_optionals_keeps_nulls() {
        let list = vec![Some("a".to_string()), None];
        assert_eq!(
            list.to_bson().unwrap(),
            Bson::Array(vec![Bson::String("a".into()), Bson::Null])
        );
    }

    #[test]
    fn test_scalar_cannot_be_inlined() {
        let mut value = 1i32;
        let err = value.apply_inline(&Document::new()).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
