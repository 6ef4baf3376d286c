//! Field value model.
//!
//! Every type that can sit in a field of a [`Shape`](crate::Shape) implements
//! [`FieldType`]. The trait tells the copier three things the copier cannot
//! find out on its own: the structural [`Kind`] of the type, whether a value
//! is the zero value, and how to step through one level of indirection
//! (`Option<T>`, `Box<T>`, `Arc<T>`).
//!
//! The copier never sees concrete field types. It works on `&dyn Any` and
//! dispatches through a [`FieldVtable`], a table of function pointers
//! instantiated once per field type.

use std::any::{Any, TypeId, type_name};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Structural kind of a field type.
///
/// Two fields are only ever copied into each other when their kinds match
/// and their concrete types are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Char,
    String,
    /// Fixed-size array.
    Array,
    /// Growable sequence (`Vec`, `VecDeque`).
    Sequence,
    Set,
    Map,
    Struct,
    Enum,
    /// `Option<T>`.
    Optional,
    /// Owning or shared pointer (`Box<T>`, `Arc<T>`).
    Pointer,
    Unit,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::Char => "char",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Sequence => "sequence",
            Kind::Set => "set",
            Kind::Map => "map",
            Kind::Struct => "struct",
            Kind::Enum => "enum",
            Kind::Optional => "optional",
            Kind::Pointer => "pointer",
            Kind::Unit => "unit",
        };
        f.write_str(name)
    }
}

/// A type that can be stored in a mapped field.
///
/// Implemented for primitives, strings, the std collections, `Option`, `Box`
/// and `Arc`. Structs get it from `#[derive(Shape)]`, enums and newtypes from
/// `#[derive(FieldType)]`.
pub trait FieldType: Any + Clone {
    const KIND: Kind;

    /// Vtable of the type one level of indirection down, if this type is a
    /// pointer-like wrapper.
    const POINTEE: Option<&'static FieldVtable> = None;

    /// Whether this value is the zero value of its type.
    ///
    /// Zero values are treated as "not set" and never overwrite a
    /// destination field.
    fn is_zero(&self) -> bool;

    /// The value one level of indirection down. `None` for non-pointer types
    /// and for an absent `Option`.
    fn pointee(&self) -> Option<&dyn Any> {
        None
    }
}

/// Type-erased operations on a single field type.
///
/// Created with [`FieldVtable::of`], which pairs every function pointer with
/// the same type `T` at compile time.
pub struct FieldVtable {
    type_id: fn() -> TypeId,
    type_name: fn() -> &'static str,
    kind: Kind,
    pointee: Option<&'static FieldVtable>,
    is_zero: fn(&dyn Any) -> bool,
    resolve: fn(&dyn Any) -> Option<&dyn Any>,
    assign: fn(&mut dyn Any, &dyn Any) -> bool,
}

impl FieldVtable {
    pub const fn of<T: FieldType>() -> &'static Self {
        const {
            &Self {
                type_id: TypeId::of::<T>,
                type_name: type_name::<T>,
                kind: T::KIND,
                pointee: T::POINTEE,
                is_zero: erased_is_zero::<T>,
                resolve: erased_resolve::<T>,
                assign: erased_assign::<T>,
            }
        }
    }

    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Vtable of the type reached by resolving one level of indirection.
    pub fn pointee(&self) -> Option<&'static FieldVtable> {
        self.pointee
    }

    /// Whether `self` and `other` describe the same concrete type.
    pub fn same_type(&self, other: &FieldVtable) -> bool {
        self.type_id() == other.type_id()
    }

    /// Zero test on an erased value. A value of the wrong type counts as zero
    /// so that it is never copied.
    pub(crate) fn is_zero(&self, value: &dyn Any) -> bool {
        (self.is_zero)(value)
    }

    pub(crate) fn resolve<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.resolve)(value)
    }

    /// Clones `source` into `destination`. Returns `false` when either side is
    /// not of this vtable's type.
    pub(crate) fn assign(&self, destination: &mut dyn Any, source: &dyn Any) -> bool {
        (self.assign)(destination, source)
    }
}

impl fmt::Debug for FieldVtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldVtable")
            .field("type_name", &self.type_name())
            .field("kind", &self.kind)
            .finish()
    }
}

fn erased_is_zero<T: FieldType>(value: &dyn Any) -> bool {
    value.downcast_ref::<T>().is_none_or(T::is_zero)
}

fn erased_resolve<T: FieldType>(value: &dyn Any) -> Option<&dyn Any> {
    value.downcast_ref::<T>()?.pointee()
}

fn erased_assign<T: FieldType>(destination: &mut dyn Any, source: &dyn Any) -> bool {
    match (destination.downcast_mut::<T>(), source.downcast_ref::<T>()) {
        (Some(destination), Some(source)) => {
            destination.clone_from(source);
            true
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Built-in impls
// ---------------------------------------------------------------------------

macro_rules! impl_numeric {
    ($kind:ident, $zero:expr => $($ty:ty),+) => {
        $(
            impl FieldType for $ty {
                const KIND: Kind = Kind::$kind;

                fn is_zero(&self) -> bool {
                    *self == $zero
                }
            }
        )+
    };
}

impl_numeric!(Int, 0 => i8, i16, i32, i64, i128, isize);
impl_numeric!(Uint, 0 => u8, u16, u32, u64, u128, usize);
impl_numeric!(Float, 0.0 => f32, f64);

impl FieldType for bool {
    const KIND: Kind = Kind::Bool;

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl FieldType for char {
    const KIND: Kind = Kind::Char;

    fn is_zero(&self) -> bool {
        *self == '\0'
    }
}

impl FieldType for String {
    const KIND: Kind = Kind::String;

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl FieldType for &'static str {
    const KIND: Kind = Kind::String;

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl FieldType for () {
    const KIND: Kind = Kind::Unit;

    fn is_zero(&self) -> bool {
        true
    }
}

impl<T: Clone + 'static> FieldType for Vec<T> {
    const KIND: Kind = Kind::Sequence;

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Clone + 'static> FieldType for VecDeque<T> {
    const KIND: Kind = Kind::Sequence;

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: FieldType, const N: usize> FieldType for [T; N] {
    const KIND: Kind = Kind::Array;

    fn is_zero(&self) -> bool {
        self.iter().all(T::is_zero)
    }
}

impl<K: Clone + 'static, V: Clone + 'static> FieldType for HashMap<K, V> {
    const KIND: Kind = Kind::Map;

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Clone + 'static, V: Clone + 'static> FieldType for BTreeMap<K, V> {
    const KIND: Kind = Kind::Map;

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Clone + 'static> FieldType for HashSet<T> {
    const KIND: Kind = Kind::Set;

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Clone + 'static> FieldType for BTreeSet<T> {
    const KIND: Kind = Kind::Set;

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: FieldType> FieldType for Option<T> {
    const KIND: Kind = Kind::Optional;
    const POINTEE: Option<&'static FieldVtable> = Some(FieldVtable::of::<T>());

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn pointee(&self) -> Option<&dyn Any> {
        self.as_ref().map(|value| value as &dyn Any)
    }
}

// A pointer that exists is set, whatever it points to.
impl<T: FieldType> FieldType for Box<T> {
    const KIND: Kind = Kind::Pointer;
    const POINTEE: Option<&'static FieldVtable> = Some(FieldVtable::of::<T>());

    fn is_zero(&self) -> bool {
        false
    }

    fn pointee(&self) -> Option<&dyn Any> {
        Some(&**self as &dyn Any)
    }
}

impl<T: FieldType> FieldType for Arc<T> {
    const KIND: Kind = Kind::Pointer;
    const POINTEE: Option<&'static FieldVtable> = Some(FieldVtable::of::<T>());

    fn is_zero(&self) -> bool {
        false
    }

    fn pointee(&self) -> Option<&dyn Any> {
        Some(&**self as &dyn Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_of_builtin_types() {
        assert!(0u32.is_zero());
        assert!(0i64.is_zero());
        assert!(0.0f64.is_zero());
        assert!(false.is_zero());
        assert!('\0'.is_zero());
        assert!(String::new().is_zero());
        assert!(Vec::<u8>::new().is_zero());
        assert!(HashMap::<String, u8>::new().is_zero());
        assert!(Option::<u8>::None.is_zero());
        assert!([0u8; 4].is_zero());

        assert!(!7u32.is_zero());
        assert!(!(-1i8).is_zero());
        assert!(!0.5f32.is_zero());
        assert!(!true.is_zero());
        assert!(!"x".to_string().is_zero());
        assert!(!vec![0u8].is_zero());
        assert!(!Some(0u8).is_zero());
        assert!(![0u8, 1, 0].is_zero());
    }

    #[test]
    fn pointers_are_never_zero() {
        assert!(!Box::new(0u32).is_zero());
        assert!(!Arc::new(String::new()).is_zero());
    }

    #[test]
    fn pointee_resolves_one_level() {
        let value = Some(5u16);
        let inner = value.pointee().and_then(|v| v.downcast_ref::<u16>());
        assert_eq!(inner, Some(&5));

        let nested = Some(Some(5u16));
        let inner = nested.pointee().and_then(|v| v.downcast_ref::<Option<u16>>());
        assert_eq!(inner, Some(&Some(5)));

        let boxed = Box::new("b".to_string());
        let inner = boxed.pointee().and_then(|v| v.downcast_ref::<String>());
        assert_eq!(inner.map(String::as_str), Some("b"));

        assert!(Option::<u16>::None.pointee().is_none());
        assert!(7u16.pointee().is_none());
    }

    #[test]
    fn vtable_reports_type_information() {
        let vtable = FieldVtable::of::<Option<String>>();
        assert_eq!(vtable.kind(), Kind::Optional);
        assert_eq!(vtable.type_id(), TypeId::of::<Option<String>>());
        assert!(vtable.type_name().contains("Option"));

        let pointee = vtable.pointee().expect("option has a pointee");
        assert_eq!(pointee.kind(), Kind::String);
        assert!(pointee.same_type(FieldVtable::of::<String>()));
        assert!(FieldVtable::of::<u32>().pointee().is_none());
    }

    #[test]
    fn vtable_assign_requires_matching_types() {
        let vtable = FieldVtable::of::<u32>();
        let mut destination = 1u32;
        assert!(vtable.assign(&mut destination, &42u32));
        assert_eq!(destination, 42);

        assert!(!vtable.assign(&mut destination, &42u64));
        let mut wrong = 0u64;
        assert!(!vtable.assign(&mut wrong, &42u32));
        assert_eq!(wrong, 0);
    }

    #[test]
    fn vtable_zero_test_on_foreign_type_counts_as_zero() {
        let vtable = FieldVtable::of::<u32>();
        assert!(vtable.is_zero(&0u32));
        assert!(!vtable.is_zero(&3u32));
        assert!(vtable.is_zero(&3u64));
    }

    #[test]
    fn vtable_resolve_goes_through_the_wrapper() {
        let vtable = FieldVtable::of::<Option<i32>>();
        let resolved = vtable.resolve(&Some(-4i32)).and_then(|v| v.downcast_ref::<i32>());
        assert_eq!(resolved, Some(&-4));
        assert!(vtable.resolve(&Option::<i32>::None).is_none());
    }
}
