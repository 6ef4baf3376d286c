//! Entity → transfer-object mapping.
//!
//! A [`Mapper`] converts a value of one [`Shape`] into another in two phases:
//! an automatic copy of every field the two shapes share by name and type,
//! then a user function registered for the pair that fills in the rest.
//!
//! ```ignore
//! use tinymap::{Mapper, Shape};
//!
//! #[derive(Clone, Default, Shape)]
//! pub struct User {
//!     pub id: u64,
//!     pub firstname: String,
//!     pub lastname: String,
//! }
//!
//! #[derive(Clone, Default, Shape)]
//! pub struct UserDto {
//!     pub id: u64,
//!     pub display_name: String,
//! }
//!
//! let mut mapper = Mapper::new();
//! mapper.register(|user: &User, dto: &mut UserDto| {
//!     dto.display_name = format!("{} {}", user.firstname, user.lastname);
//! });
//!
//! let dto: UserDto = mapper.map_single(&user)?;
//! ```

extern crate self as tinymap;

pub mod config;
pub mod copier;
pub mod error;
pub mod field;
pub mod mapper;
pub mod registry;
pub mod shape;

pub use tinymap_derive::{FieldType, Shape};

pub use config::MapperConfig;
pub use copier::{copy, CopyPlan, SkipReason, SkippedField};
pub use error::{BatchError, ConfigError, ElementError, MapError};
pub use field::{FieldType, FieldVtable, Kind};
pub use mapper::{Batch, Mapper};
pub use registry::{ConversionKey, Registry};
pub use shape::{AnyShape, FieldDescriptor, Shape, ShapeDescriptor, ShapeKey};
