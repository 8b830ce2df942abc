use std::collections::HashSet;

use brine_region_schema::{Namespace, Ref, RegionSchema};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::{
    bootstrap::{Schemas, TypeDeclRegion},
    error::CompileError,
    utils::quote,
};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref TYPE_REF:   Regex = Regex::new(r"^(\[\])*[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

fn check_identifier(name: &str) -> Result<(), CompileError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(CompileError::InvalidIdentifier(quote(name)))
    }
}

/// Turn the bound schema declarations under `root` into one resolved
/// [RegionSchema] per declared region, in declaration order.
///
/// Struct names are declared before any field type is resolved, so fields may
/// refer to structs declared later in the same region, including their own.
pub fn resolve(decls: &TypeDeclRegion, root: Ref<Schemas>) -> Result<Vec<RegionSchema>, CompileError> {
    let mut region_names = HashSet::new();
    let mut resolved = Vec::new();

    for &region_ref in &decls.schemas[root].regions {
        let region = &decls.regions[region_ref];
        check_identifier(&region.name)?;
        if !region_names.insert(region.name.as_str()) {
            return Err(CompileError::DuplicateRegion(quote(&region.name)));
        }

        let mut schema = RegionSchema::new(region.name.as_str());
        let mut ns = Namespace::with_primitives();
        let mut ids = Vec::with_capacity(region.structs.len());
        for &struct_ref in &region.structs {
            let s = &decls.structs[struct_ref];
            check_identifier(&s.name)?;
            ids.push(ns.register_struct(&mut schema, &s.name)?);
        }

        for (&struct_ref, &id) in region.structs.iter().zip(&ids) {
            let s = &decls.structs[struct_ref];
            let mut fields = Vec::with_capacity(s.fields.len());
            for &field_ref in &s.fields {
                let field = &decls.fields[field_ref];
                check_identifier(&field.name)?;
                if !TYPE_REF.is_match(&field.ty) {
                    return Err(CompileError::InvalidTypeRef {
                        type_ref: quote(&field.ty),
                        field:    quote(&field.name),
                    });
                }
                let ty = ns.resolve(&field.ty, &mut schema).ok_or_else(|| CompileError::UnknownType {
                    type_ref:    quote(&field.ty),
                    field:       quote(&field.name),
                    struct_name: quote(&s.name),
                })?;
                trace!(region = %region.name, field = %field.name, ty = %field.ty, "resolved field");
                fields.push((field.name.clone(), ty));
            }
            schema.define_fields(id, fields)?;
        }

        debug!(region = %schema.name, structs = schema.structs().len(), "resolved region");
        resolved.push(schema);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{FieldDecl, RegionDecl, StructDecl};
    use brine_region_schema::{SchemaError, StructId, TypeSchema};
    use pretty_assertions::assert_eq;

    /// Build declarations for one region from `(struct, [(field, type)])`.
    fn decls(region_name: &str, structs: &[(&str, Vec<(&str, &str)>)]) -> (TypeDeclRegion, Ref<Schemas>) {
        let mut region = TypeDeclRegion::new();
        let mut struct_refs = Vec::new();
        for (name, fields) in structs {
            let field_refs = fields
                .iter()
                .map(|(name, ty)| {
                    let f = region.allocate_field();
                    region.fields[f] = FieldDecl { name: name.to_string(), ty: ty.to_string() };
                    f
                })
                .collect();
            let s = region.allocate_struct();
            region.structs[s] = StructDecl { name: name.to_string(), fields: field_refs };
            struct_refs.push(s);
        }
        let r = region.allocate_region();
        region.regions[r] = RegionDecl { name: region_name.to_string(), structs: struct_refs };
        let root = region.allocate_schemas();
        region.schemas[root].regions.push(r);
        (region, root)
    }

    #[test]
    fn resolves_forward_and_self_references() {
        let (region, root) = decls(
            "Graph",
            &[
                ("Edge", vec![("to", "Node"), ("weight", "float32")]),
                ("Node", vec![("name", "string"), ("edges", "[]Edge"), ("parent", "Node"), ("grid", "[][]uint8")]),
            ],
        );
        let schemas = resolve(&region, root).unwrap();
        assert_eq!(schemas.len(), 1);
        let graph = &schemas[0];
        assert_eq!(graph.name, "Graph");
        assert_eq!(
            graph.to_string(),
            "region Graph {\n  Edge {\n    to: Node\n    weight: float32\n  }\n  Node {\n    name: string\n    edges: []Edge\n    parent: Node\n    grid: [][]uint8\n  }\n}"
        );
        let node = graph.struct_schema(StructId(1));
        assert_eq!(node.fields[2].ty, TypeSchema::Struct(StructId(1)));
    }

    #[test]
    fn unknown_type_is_an_error() {
        let (region, root) = decls("R", &[("A", vec![("b", "[]B")])]);
        let err = resolve(&region, root).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The type \"[]B\" is not defined for field \"b\" of \"A\""
        );
    }

    #[test]
    fn malformed_names_are_errors() {
        let (region, root) = decls("R", &[("A", vec![("b", "[]")])]);
        assert!(matches!(resolve(&region, root), Err(CompileError::InvalidTypeRef { .. })));

        let (region, root) = decls("R", &[("A", vec![("b", "int32[]")])]);
        assert!(matches!(resolve(&region, root), Err(CompileError::InvalidTypeRef { .. })));

        let (region, root) = decls("R", &[("9A", vec![])]);
        assert!(matches!(resolve(&region, root), Err(CompileError::InvalidIdentifier(_))));

        let (region, root) = decls("my region", &[]);
        assert!(matches!(resolve(&region, root), Err(CompileError::InvalidIdentifier(_))));
    }

    #[test]
    fn duplicates_are_errors() {
        let (region, root) = decls("R", &[("A", vec![]), ("A", vec![])]);
        assert!(matches!(
            resolve(&region, root),
            Err(CompileError::Schema(SchemaError::DuplicateType(_)))
        ));

        let (region, root) = decls("R", &[("string", vec![])]);
        assert!(matches!(
            resolve(&region, root),
            Err(CompileError::Schema(SchemaError::DuplicateType(_)))
        ));

        let (region, root) = decls("R", &[("A", vec![("x", "bool"), ("x", "bool")])]);
        assert!(matches!(
            resolve(&region, root),
            Err(CompileError::Schema(SchemaError::DuplicateField { .. }))
        ));

        let (mut region, root) = decls("R", &[]);
        let again = region.schemas[root].regions[0];
        region.schemas[root].regions.push(again);
        assert!(matches!(resolve(&region, root), Err(CompileError::DuplicateRegion(_))));
    }
}
