use std::num::IntErrorKind;
use std::sync::Arc;

use brine_region_schema::{FloatWidth, Region, RegionSchema, TypeSchema, Value};
use tracing::debug;

use crate::{
    ast::Expr,
    source::{Location, SourceString, Status},
    utils::quote,
};

/// Bind an expression tree into `region`.
///
/// `expected` is the type the value must have, or `None` at the root, where
/// the value has to name its own type. Errors are reported to `status` and do
/// not stop the walk; `None` is returned if any error occurred inside `node`.
pub fn bind(
    region: &mut dyn Region,
    node: &Expr,
    expected: Option<TypeSchema>,
    status: &mut Status,
) -> Option<Value> {
    let schema = Arc::clone(region.schema());
    let before = status.error_count();
    let value = Binder { region, schema, status: &mut *status }.bind(node, expected);
    debug!(
        ok = value.is_some(),
        errors = status.error_count() - before,
        "bound expression"
    );
    value
}

struct Binder<'r, 's, 'a> {
    region: &'r mut dyn Region,
    schema: Arc<RegionSchema>,
    status: &'s mut Status<'a>,
}

impl Binder<'_, '_, '_> {
    fn type_name(&self, ty: TypeSchema) -> String {
        ty.canonical_name(&self.schema)
    }

    /// Work out the type `node` will have, checking it against `expected`.
    fn resolve_type(&mut self, node: &Expr, expected: Option<TypeSchema>) -> Option<TypeSchema> {
        let loc = error_location(node);
        let actual = match node {
            Expr::String { .. } => Some(TypeSchema::String),
            Expr::Boolean { .. } => Some(TypeSchema::Boolean),
            Expr::Integer { .. } => match expected {
                Some(ty @ (TypeSchema::Integer { .. } | TypeSchema::Float { .. })) => Some(ty),
                _ => Some(TypeSchema::INT64),
            },
            Expr::Struct { ty: Some(ty), .. } => match self.schema.lookup_struct(&ty.raw.text) {
                Some(id) => Some(TypeSchema::Struct(id)),
                None => {
                    self.status
                        .error(loc, format!("cannot resolve type {}", quote(&ty.raw.text)));
                    return None;
                }
            },
            Expr::Struct { ty: None, .. } | Expr::List { .. } => None,
        };

        match (actual, expected) {
            (Some(actual), Some(expected)) if !expected.can_hold(&actual) => {
                let message = format!(
                    "expected type {}, but got type {}",
                    self.type_name(expected),
                    self.type_name(actual)
                );
                self.status.error(loc, message);
                None
            }
            (Some(actual), _) => Some(actual),
            (None, Some(expected)) => Some(expected),
            (None, None) => {
                self.status.error(loc, "cannot determine type");
                None
            }
        }
    }

    fn bind(&mut self, node: &Expr, expected: Option<TypeSchema>) -> Option<Value> {
        let actual = self.resolve_type(node, expected)?;
        match node {
            Expr::String { value, .. } => Some(Value::String(value.clone())),
            Expr::Boolean { value, .. } => Some(Value::Bool(*value)),
            Expr::Integer { raw } => self.bind_integer(raw, actual),
            Expr::Struct { loc, args, .. } => {
                let TypeSchema::Struct(id) = actual else {
                    let message = format!("attempted to instantiate type {} as a struct", self.type_name(actual));
                    self.status.error(*loc, message);
                    return None;
                };
                let schema = Arc::clone(&self.schema);
                let s = schema.struct_schema(id);
                let instance = match self.region.allocate(&s.name) {
                    Some(instance) => instance,
                    None => panic!("region {} cannot allocate its own struct {}", schema.name, s.name),
                };

                let mut all_ok = true;
                let mut defined = vec![false; s.fields.len()];
                for arg in args {
                    let Some(field) = s.field(&arg.name.text) else {
                        let message = format!(
                            "type {} does not have field {}",
                            s.name,
                            quote(&arg.name.text)
                        );
                        self.status.error(arg.name.loc, message);
                        all_ok = false;
                        continue;
                    };
                    if defined[field.id] {
                        self.status
                            .error(arg.name.loc, format!("attempted to re-define {}", quote(&arg.name.text)));
                        all_ok = false;
                        continue;
                    }
                    defined[field.id] = true;
                    match self.bind(&arg.value, Some(field.ty)) {
                        Some(value) => self.region.assign(instance, field.id, value),
                        None => all_ok = false,
                    }
                }
                all_ok.then_some(Value::Struct(instance))
            }
            Expr::List { loc, args } => {
                let TypeSchema::List(id) = actual else {
                    let message = format!("attempted to instantiate type {} as a list", self.type_name(actual));
                    self.status.error(*loc, message);
                    return None;
                };
                let element = self.schema.list_element(id);
                let mut all_ok = true;
                let mut items = Vec::with_capacity(args.len());
                for arg in args {
                    match self.bind(arg, Some(element)) {
                        Some(value) => items.push(value),
                        None => all_ok = false,
                    }
                }
                all_ok.then_some(Value::List(items))
            }
        }
    }

    fn bind_integer(&mut self, raw: &SourceString, ty: TypeSchema) -> Option<Value> {
        let (width, unsigned) = match ty {
            TypeSchema::Integer { width, unsigned } => (width, unsigned),
            TypeSchema::Float { width } => return self.bind_float(raw, width, ty),
            _ => unreachable!("integer literal resolved to {}", self.type_name(ty)),
        };
        let parsed = match raw.text.parse::<u64>() {
            Ok(value) if value <= width.max_value(unsigned) => Some(value),
            Ok(_) => None,
            Err(err) if *err.kind() == IntErrorKind::PosOverflow => None,
            Err(err) => panic!("malformed integer literal {}: {}", quote(&raw.text), err),
        };
        match parsed {
            Some(value) if unsigned => Some(Value::UInt(value)),
            Some(value) => Some(Value::Int(value as i64)),
            None => {
                self.out_of_range(raw, ty);
                None
            }
        }
    }

    /// Integer literal written into a float field.
    fn bind_float(&mut self, raw: &SourceString, width: FloatWidth, ty: TypeSchema) -> Option<Value> {
        let value = match raw.text.parse::<f64>() {
            Ok(value) => value,
            Err(err) => panic!("malformed integer literal {}: {}", quote(&raw.text), err),
        };
        let fits = match width {
            FloatWidth::W32 => (value as f32).is_finite(),
            FloatWidth::W64 => value.is_finite(),
        };
        if fits {
            Some(Value::Float(value))
        } else {
            self.out_of_range(raw, ty);
            None
        }
    }

    fn out_of_range(&mut self, raw: &SourceString, ty: TypeSchema) {
        let message = format!("{} out of range for an {}", raw.text, self.type_name(ty));
        self.status.error(raw.loc, message);
    }
}

/// Location the binder reports errors about `node` at.
pub fn error_location(node: &Expr) -> Location {
    match node {
        Expr::Integer { raw } | Expr::String { raw, .. } => raw.loc,
        Expr::Boolean { loc, .. } | Expr::List { loc, .. } => *loc,
        Expr::Struct { ty: Some(ty), .. } => ty.raw.loc,
        Expr::Struct { loc, .. } => *loc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_data, source::SourceSet};
    use brine_region_schema::{DynamicRegion, Instance, Namespace};
    use pretty_assertions::assert_eq;

    /// `Root { small: uint8, wide: uint16, neg: int8, name: string, flag: bool,
    /// child: Leaf, leaves: []Leaf, ratio: float32 }`, `Leaf { n: int32 }`
    fn region() -> DynamicRegion {
        let mut ns = Namespace::with_primitives();
        let mut schema = RegionSchema::new("Test");
        let root = ns.register_struct(&mut schema, "Root").unwrap();
        let leaf = ns.register_struct(&mut schema, "Leaf").unwrap();
        let root_fields = [
            ("small", "uint8"),
            ("wide", "uint16"),
            ("neg", "int8"),
            ("name", "string"),
            ("flag", "bool"),
            ("child", "Leaf"),
            ("leaves", "[]Leaf"),
            ("ratio", "float32"),
        ]
        .iter()
        .map(|(name, ty)| (name.to_string(), ns.resolve(ty, &mut schema).unwrap()))
        .collect();
        let n = ns.resolve("int32", &mut schema).unwrap();
        schema.define_fields(root, root_fields).unwrap();
        schema.define_fields(leaf, vec![("n".into(), n)]).unwrap();
        DynamicRegion::new(Arc::new(schema))
    }

    /// Parse and bind `data` at the root; returns the value and the messages.
    fn bind_text(region: &mut DynamicRegion, data: &str) -> (Option<Value>, Vec<String>) {
        let mut sources = SourceSet::new();
        let id = sources.add("t", data);
        let mut status = Status::new(&sources);
        let expr = parse_data(sources.get(id), &mut status).expect("parse failed");
        let value = bind(region, &expr, None, &mut status);
        let messages = status.diagnostics().iter().map(|d| d.message.clone()).collect();
        (value, messages)
    }

    fn root(value: Option<Value>) -> Instance {
        value.and_then(|v| v.as_instance()).expect("no root instance")
    }

    #[test]
    fn binds_nested_values() {
        let mut region = region();
        let (value, errors) = bind_text(
            &mut region,
            "Root{small: 255, name: \"x\", flag: true, child: {n: 7}, leaves: [Leaf{n: 1}, {n: 2}]}",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        let r = root(value);
        assert_eq!(region.get(r, "small"), Some(&Value::UInt(255)));
        assert_eq!(region.get(r, "name"), Some(&Value::String("x".into())));
        assert_eq!(region.get(r, "flag"), Some(&Value::Bool(true)));
        let child = region.get(r, "child").unwrap().as_instance().unwrap();
        assert_eq!(region.get(child, "n"), Some(&Value::Int(7)));
        let leaves = region.get(r, "leaves").unwrap().as_array().to_vec();
        assert_eq!(leaves.len(), 2);
        let second = leaves[1].as_instance().unwrap();
        assert_eq!(region.get(second, "n"), Some(&Value::Int(2)));
        // Child before leaves: allocation follows source order.
        assert_eq!((child.index, second.index), (0, 2));
    }

    #[test]
    fn range_depends_on_field_width() {
        let mut region = region();
        let (value, errors) = bind_text(&mut region, "Root{small: 300}");
        assert_eq!(value, None);
        assert_eq!(errors, vec!["300 out of range for an uint8".to_string()]);

        let mut region = self::region();
        let (value, errors) = bind_text(&mut region, "Root{wide: 300}");
        assert!(errors.is_empty());
        assert_eq!(region.get(root(value), "wide"), Some(&Value::UInt(300)));
    }

    #[test]
    fn signed_range_and_overflow() {
        let mut region = region();
        let (_, errors) = bind_text(&mut region, "Root{neg: 127}");
        assert!(errors.is_empty());
        let (_, errors) = bind_text(&mut region, "Root{neg: 128}");
        assert_eq!(errors, vec!["128 out of range for an int8".to_string()]);
        let (_, errors) = bind_text(&mut region, "Root{child: {n: 99999999999999999999999}}");
        assert_eq!(
            errors,
            vec!["99999999999999999999999 out of range for an int32".to_string()]
        );
    }

    #[test]
    fn integer_literal_sets_float_field() {
        let mut region = region();
        let (value, errors) = bind_text(&mut region, "Root{ratio: 3}");
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(region.get(root(value), "ratio"), Some(&Value::Float(3.0)));

        let huge = "1".repeat(40);
        let (value, errors) = bind_text(&mut region, &format!("Root{{ratio: {}}}", huge));
        assert_eq!(value, None);
        assert_eq!(errors, vec![format!("{} out of range for an float32", huge)]);

        let (_, errors) = bind_text(&mut region, "Root{ratio: true}");
        assert_eq!(errors, vec!["expected type float32, but got type bool".to_string()]);
    }

    #[test]
    fn duplicate_field_keeps_first_value() {
        let mut region = region();
        let (value, errors) = bind_text(&mut region, "Root{small: 1, small: 2}");
        assert_eq!(value, None);
        assert_eq!(errors, vec!["attempted to re-define \"small\"".to_string()]);
        let r = Instance::new(brine_region_schema::StructId(0), 0);
        assert_eq!(region.get(r, "small"), Some(&Value::UInt(1)));
    }

    #[test]
    fn unknown_field() {
        let mut region = region();
        let (value, errors) = bind_text(&mut region, "Root{smal: 1, name: \"still bound\"}");
        assert_eq!(value, None);
        assert_eq!(errors, vec!["type Root does not have field \"smal\"".to_string()]);
        let r = Instance::new(brine_region_schema::StructId(0), 0);
        assert_eq!(region.get(r, "name"), Some(&Value::String("still bound".into())));
    }

    #[test]
    fn errors_accumulate_across_siblings() {
        let mut region = region();
        let (value, errors) = bind_text(
            &mut region,
            "Root{small: \"no\", flag: 1, leaves: [{n: true}, Nope{}], child: [1]}",
        );
        assert_eq!(value, None);
        assert_eq!(
            errors,
            vec![
                "expected type uint8, but got type string".to_string(),
                "expected type bool, but got type int64".to_string(),
                "expected type int32, but got type bool".to_string(),
                "cannot resolve type \"Nope\"".to_string(),
                "attempted to instantiate type Leaf as a list".to_string(),
            ]
        );
    }

    #[test]
    fn root_needs_a_type() {
        let mut region = region();
        let (value, errors) = bind_text(&mut region, "{small: 1}");
        assert_eq!(value, None);
        assert_eq!(errors, vec!["cannot determine type".to_string()]);

        let (_, errors) = bind_text(&mut region, "[1]");
        assert_eq!(errors, vec!["cannot determine type".to_string()]);

        let (value, errors) = bind_text(&mut region, "12");
        assert!(errors.is_empty());
        assert_eq!(value, Some(Value::Int(12)));
    }

    #[test]
    fn struct_literal_for_list_field() {
        let mut region = region();
        let (_, errors) = bind_text(&mut region, "Root{leaves: {n: 1}}");
        assert_eq!(errors, vec!["attempted to instantiate type []Leaf as a struct".to_string()]);
    }

    #[test]
    fn error_locations() {
        let mut sources = SourceSet::new();
        let id = sources.add("t", "Root{child: Leaf{n: 1}, name: \"s\"}");
        let mut status = Status::new(&sources);
        let expr = parse_data(sources.get(id), &mut status).unwrap();
        assert_eq!(error_location(&expr), sources.get(id).location(0, 4));
        let Expr::Struct { args, .. } = &expr else { panic!() };
        assert_eq!(error_location(&args[0].value), sources.get(id).location(12, 16));
        assert_eq!(error_location(&args[1].value), sources.get(id).location(30, 33));
    }
}
