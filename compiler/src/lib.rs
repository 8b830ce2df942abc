//! brine-region-compiler
//!
//! This crate implements:
//!  1) Source tracking and diagnostics (`SourceSet`, `Status`),
//!  2) A backtracking parser for the data language (`parse_data` → `Expr`),
//!  3) The binder from expression trees into any `Region`,
//!  4) The bootstrap `TypeDeclRegion` that schema files are bound into,
//!  5) Schema resolution (`compile_schema` → `Vec<RegionSchema>`),
//!  6) Error types (`CompileError`) and the `FromValue` trait,
//!  7) A writer that renders expression trees back into data text.

pub mod ast;
pub mod binder;
pub mod bootstrap;
pub mod compiler;
pub mod cursor;
pub mod error;
pub mod parser;
pub mod resolve;
pub mod source;
pub mod traits;
pub mod utils;
pub mod writer;

pub use binder::bind;
pub use compiler::{compile_schema, parse_expr, parse_file, parse_schema, select_region};
pub use parser::parse_data;
pub use resolve::resolve;
pub use writer::write_expr;
