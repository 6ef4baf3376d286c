//! Shape descriptors: the field table of a struct.
//!
//! A shape is a struct whose fields the copier can see. `#[derive(Shape)]`
//! generates the [`Shape::describe`] table; the mapper calls it once per
//! registration, never on the mapping path.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::field::{FieldType, FieldVtable, Kind};

/// Identity of a shape.
///
/// Equality and hashing use the [`TypeId`] only; the type name is kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct ShapeKey {
    id: TypeId,
    name: &'static str,
}

impl ShapeKey {
    pub fn of<T: ?Sized + Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ShapeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ShapeKey {}

impl Hash for ShapeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShapeKey({})", self.name)
    }
}

impl fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A struct with a generated field table.
///
/// Derive it with `#[derive(Shape)]`; the derive also implements
/// [`FieldType`] so that shapes can be nested and embedded.
pub trait Shape: Any {
    fn describe() -> ShapeDescriptor;
}

/// Object-safe view of a shape value.
///
/// Lets the mapper dispatch on the runtime shape of a value, so a batch of
/// `&dyn AnyShape` can mix source shapes.
pub trait AnyShape: Any {
    fn shape_key(&self) -> ShapeKey;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Shape> AnyShape for T {
    fn shape_key(&self) -> ShapeKey {
        ShapeKey::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Field table of a shape, in declaration order.
pub struct ShapeDescriptor {
    key: ShapeKey,
    fields: Vec<FieldDescriptor>,
}

impl ShapeDescriptor {
    pub fn new<S: Any>(fields: Vec<FieldDescriptor>) -> Self {
        Self {
            key: ShapeKey::of::<S>(),
            fields,
        }
    }

    pub fn key(&self) -> ShapeKey {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Top-level field by name. Fields of embedded shapes are not searched.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }
}

impl fmt::Debug for ShapeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeDescriptor")
            .field("name", &self.key.name())
            .field("fields", &self.fields)
            .finish()
    }
}

/// One field of a shape.
#[derive(Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    exported: bool,
    vtable: &'static FieldVtable,
    embedded: Option<fn() -> ShapeDescriptor>,
    access: Arc<dyn Access>,
}

impl FieldDescriptor {
    /// A plain field of type `T` on shape `S`.
    pub fn new<S: Any, T: FieldType>(
        name: &'static str,
        exported: bool,
        get: fn(&S) -> &T,
        get_mut: fn(&mut S) -> &mut T,
    ) -> Self {
        Self {
            name,
            exported,
            vtable: FieldVtable::of::<T>(),
            embedded: None,
            access: Arc::new(Accessor { get, get_mut }),
        }
    }

    /// An embedded shape `T` on shape `S`.
    ///
    /// As a source its fields are flattened into the containing shape; as a
    /// destination it is matched as a whole value.
    pub fn embedded<S: Any, T: Shape + FieldType>(
        name: &'static str,
        exported: bool,
        get: fn(&S) -> &T,
        get_mut: fn(&mut S) -> &mut T,
    ) -> Self {
        Self {
            embedded: Some(T::describe),
            ..Self::new(name, exported, get, get_mut)
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the field is declared `pub`.
    pub fn is_exported(&self) -> bool {
        self.exported
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded.is_some()
    }

    /// Field table of the embedded shape, if this field embeds one.
    pub fn embedded_shape(&self) -> Option<ShapeDescriptor> {
        self.embedded.map(|describe| describe())
    }

    pub fn kind(&self) -> Kind {
        self.vtable.kind()
    }

    pub fn type_name(&self) -> &'static str {
        self.vtable.type_name()
    }

    pub fn vtable(&self) -> &'static FieldVtable {
        self.vtable
    }

    /// Reads this field out of an erased shape value. `None` if `shape` is not
    /// the shape this descriptor belongs to.
    pub(crate) fn read<'a>(&self, shape: &'a dyn Any) -> Option<&'a dyn Any> {
        self.access.get(shape)
    }

    pub(crate) fn write<'a>(&self, shape: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.access.get_mut(shape)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name())
            .field("kind", &self.kind())
            .field("exported", &self.exported)
            .field("embedded", &self.is_embedded())
            .finish()
    }
}

trait Access: Send + Sync {
    fn get<'a>(&self, shape: &'a dyn Any) -> Option<&'a dyn Any>;
    fn get_mut<'a>(&self, shape: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

struct Accessor<S, T> {
    get: fn(&S) -> &T,
    get_mut: fn(&mut S) -> &mut T,
}

impl<S: Any, T: Any> Access for Accessor<S, T> {
    fn get<'a>(&self, shape: &'a dyn Any) -> Option<&'a dyn Any> {
        shape.downcast_ref::<S>().map(|shape| (self.get)(shape) as &dyn Any)
    }

    fn get_mut<'a>(&self, shape: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        shape
            .downcast_mut::<S>()
            .map(|shape| (self.get_mut)(shape) as &mut dyn Any)
    }
}
