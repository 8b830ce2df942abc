//! Runtime support for schema-driven regions: the resolved type model, the
//! region and pool abstractions, the binary codec and a dynamic region that
//! works with any resolved schema.
//!
//! ```
//! use std::sync::Arc;
//! use brine_region_schema::*;
//!
//! let mut ns = Namespace::with_primitives();
//! let mut schema = RegionSchema::new("Geo");
//! let point = ns.register_struct(&mut schema, "Point").unwrap();
//! let coord = ns.resolve("int8", &mut schema).unwrap();
//! schema.define_fields(point, vec![("x".to_owned(), coord), ("y".to_owned(), coord)]).unwrap();
//!
//! let mut region = DynamicRegion::new(Arc::new(schema));
//! let p = region.allocate("Point").unwrap();
//! region.assign(p, 0, Value::Int(1));
//! region.assign(p, 1, Value::Int(-1));
//!
//! let data = region.serialize().unwrap();
//! assert_eq!(data, [1, 0, 0, 0, 1, 255]);
//!
//! let mut copy = region.empty_like();
//! copy.deserialize(&data).unwrap();
//! assert_eq!(format!("{}", copy), "Point#0 {x: 1, y: -1}\n");
//! ```

pub mod bb;
pub mod clone;
pub mod error;
pub mod region;
pub mod schema;
pub mod value;

pub use bb::*;
pub use clone::*;
pub use error::*;
pub use region::*;
pub use schema::*;
pub use value::*;
