use brine_region_schema::{Ref, Region, RegionSchema, Value};
use tracing::debug;

use crate::{
    ast::Expr,
    binder::bind,
    bootstrap::{Schemas, TypeDeclRegion},
    error::CompileError,
    parser::parse_data,
    resolve::resolve,
    source::{SourceSet, Status},
    traits::FromValue,
    utils::quote,
};

/// Parse one data file into its expression tree without binding it.
pub fn parse_expr(file: &str, data: &[u8]) -> Result<Expr, CompileError> {
    let mut sources = SourceSet::new();
    let id = sources.add(file, data);
    let mut status = Status::new(&sources);

    match parse_data(sources.get(id), &mut status) {
        Some(expr) if !status.should_stop() => Ok(expr),
        _ => Err(CompileError::Diagnostics(status.into_diagnostics())),
    }
}

/// Parse one data file and bind it into `region`.
///
/// The root value names its own type, e.g. `Point{x: 1}`. Parse errors stop
/// before binding; all bind errors of the file are returned together.
pub fn parse_file(file: &str, data: &[u8], region: &mut dyn Region) -> Result<Value, CompileError> {
    let mut sources = SourceSet::new();
    let id = sources.add(file, data);
    let mut status = Status::new(&sources);

    let expr = match parse_data(sources.get(id), &mut status) {
        Some(expr) if !status.should_stop() => expr,
        _ => return Err(CompileError::Diagnostics(status.into_diagnostics())),
    };

    match bind(region, &expr, None, &mut status) {
        Some(value) if !status.should_stop() => Ok(value),
        _ => Err(CompileError::Diagnostics(status.into_diagnostics())),
    }
}

/// Parse a schema file into a fresh [TypeDeclRegion], returning the region
/// and its `Schemas` root.
pub fn parse_schema(file: &str, data: &[u8]) -> Result<(TypeDeclRegion, Ref<Schemas>), CompileError> {
    let mut region = TypeDeclRegion::new();
    let value = parse_file(file, data, &mut region)?;
    let root = Ref::<Schemas>::from_value(&value, region.schema())?;
    debug!(
        file,
        regions = region.schemas[root].regions.len(),
        structs = region.structs.len(),
        "parsed schema file"
    );
    Ok((region, root))
}

/// Parse and resolve a schema file.
pub fn compile_schema(file: &str, data: &[u8]) -> Result<Vec<RegionSchema>, CompileError> {
    let (region, root) = parse_schema(file, data)?;
    resolve(&region, root)
}

/// Pick the region called `name` out of a compiled schema.
pub fn select_region(schemas: Vec<RegionSchema>, name: &str) -> Result<RegionSchema, CompileError> {
    schemas
        .into_iter()
        .find(|schema| schema.name == name)
        .ok_or_else(|| CompileError::UnknownRegion(quote(name)))
}
