//! brine-region
//!
//! This crate provides runtime support for working with region-encoded data.
//!
//! - The region model, values and the compiler entry points (re-exported)
//! - Helpers for describing schemas, encoding data files and decoding
//!   binary regions, as used by the `bregion` CLI

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::debug;

pub use brine_region_compiler::ast::Expr;
pub use brine_region_compiler::bootstrap::{type_decl_schema, TypeDeclCloner, TypeDeclRegion};
pub use brine_region_compiler::error::CompileError;
pub use brine_region_compiler::traits::{FromValue, TypedStruct};
pub use brine_region_compiler::{
    compile_schema, parse_expr, parse_file, parse_schema, select_region, write_expr,
};
pub use brine_region_schema::{
    CodecError, DynamicCloner, DynamicRegion, Instance, Pool, Ref, Region, RegionSchema, SchemaError,
    StructId, TypeSchema, Value,
};

pub mod error {
    pub use brine_region_compiler::error::CompileError;
    pub use brine_region_schema::{CodecError, SchemaError};
}

pub mod schema {
    pub use brine_region_schema::{FieldSchema, Namespace, RegionSchema, StructSchema, TypeSchema};
}

/// Serializable summary of one field of a resolved struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub ty:   String,
    pub id:   usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructDescription {
    pub name:   String,
    pub fields: Vec<FieldDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionDescription {
    pub name:    String,
    pub structs: Vec<StructDescription>,
}

pub fn describe_schema(schema: &RegionSchema) -> RegionDescription {
    RegionDescription {
        name:    schema.name.clone(),
        structs: schema
            .structs()
            .iter()
            .map(|s| StructDescription {
                name:   s.name.clone(),
                fields: s
                    .fields
                    .iter()
                    .map(|f| FieldDescription {
                        name: f.name.clone(),
                        ty:   f.ty.canonical_name(schema),
                        id:   f.id,
                    })
                    .collect(),
            })
            .collect(),
    }
}

/// Describe every region of a compiled schema file as pretty-printed JSON.
pub fn schema_to_json(schemas: &[RegionSchema]) -> Result<String, CompileError> {
    let descriptions: Vec<RegionDescription> = schemas.iter().map(describe_schema).collect();
    Ok(serde_json::to_string_pretty(&descriptions)?)
}

/// Compile a schema file and keep only the region called `name`.
pub fn load_region(file: &str, text: &[u8], name: &str) -> Result<Arc<RegionSchema>, CompileError> {
    let schemas = compile_schema(file, text)?;
    Ok(Arc::new(select_region(schemas, name)?))
}

/// Bind a data file into a fresh region of `schema` and encode it.
pub fn encode_data(schema: &Arc<RegionSchema>, file: &str, data: &[u8]) -> Result<Vec<u8>, CompileError> {
    let mut region = DynamicRegion::new(Arc::clone(schema));
    parse_file(file, data, &mut region)?;
    let bytes = region.serialize()?;
    debug!(file, region = %schema.name, bytes = bytes.len(), "encoded data file");
    Ok(bytes)
}

/// Decode a binary buffer into a fresh region of `schema`.
pub fn decode_data(schema: &Arc<RegionSchema>, bytes: &[u8]) -> Result<DynamicRegion, CompileError> {
    let mut region = DynamicRegion::new(Arc::clone(schema));
    region.deserialize(bytes)?;
    Ok(region)
}

/// Render every pool of `region` as JSON, keyed by struct name. Struct
/// references are written as `"Name#index"`.
pub fn region_to_json(region: &DynamicRegion) -> Result<String, CompileError> {
    let schema = region.schema();
    let mut pools = Map::new();
    for id in schema.struct_ids() {
        let s = schema.struct_schema(id);
        let objects = region
            .objects(id)
            .iter()
            .map(|object| {
                let fields = s
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), value_to_json(schema, &object.fields[f.id])))
                    .collect::<Map<String, Json>>();
                Json::Object(fields)
            })
            .collect();
        pools.insert(s.name.clone(), Json::Array(objects));
    }
    Ok(serde_json::to_string_pretty(&Json::Object(pools))?)
}

fn value_to_json(schema: &RegionSchema, value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Int(v) => Json::from(*v),
        Value::UInt(v) => Json::from(*v),
        Value::Float(v) => Json::from(*v),
        Value::Bool(v) => Json::from(*v),
        Value::String(v) => Json::from(v.as_str()),
        Value::Struct(instance) => {
            Json::from(format!("{}#{}", schema.struct_schema(instance.ty).name, instance.index))
        }
        Value::List(values) => Json::Array(values.iter().map(|v| value_to_json(schema, v)).collect()),
    }
}

/// Parse a data file and render its expression tree as JSON.
pub fn expr_to_json(file: &str, data: &[u8]) -> Result<String, CompileError> {
    let expr = parse_expr(file, data)?;
    Ok(serde_json::to_string_pretty(&expr)?)
}

/// Parse a data file and write it back out in canonical layout.
pub fn format_data(file: &str, data: &[u8]) -> Result<String, CompileError> {
    Ok(write_expr(&parse_expr(file, data)?))
}
