//! The schema-of-schemas: the typed region a schema file is bound into.
//!
//! This module has the shape a generator emits for a region: plain structs
//! whose references are typed pool indices, a pool per struct, typed
//! allocators, a typed codec and a typed cloner. Wire order of structs and
//! fields follows [type_decl_schema].

use std::sync::Arc;

use brine_region_schema::{
    ByteBuffer, ByteBufferMut, CodecError, Instance, Pool, Ref, Region, RegionSchema, StructId,
    TypeSchema, Value,
};
use tracing::debug;

use crate::traits::TypedStruct;

pub const FIELD: StructId = StructId(0);
pub const STRUCT: StructId = StructId(1);
pub const REGION: StructId = StructId(2);
pub const SCHEMAS: StructId = StructId(3);

/// `Field{name: string, type: string}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty:   String,
}

/// `Struct{name: string, fields: []Field}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructDecl {
    pub name:   String,
    pub fields: Vec<Ref<FieldDecl>>,
}

/// `Region{name: string, struct: []Struct}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionDecl {
    pub name:    String,
    pub structs: Vec<Ref<StructDecl>>,
}

/// `Schemas{region: []Region}`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schemas {
    pub regions: Vec<Ref<RegionDecl>>,
}

impl TypedStruct for FieldDecl {
    const ID: StructId = FIELD;
    const NAME: &'static str = "Field";
}

impl TypedStruct for StructDecl {
    const ID: StructId = STRUCT;
    const NAME: &'static str = "Struct";
}

impl TypedStruct for RegionDecl {
    const ID: StructId = REGION;
    const NAME: &'static str = "Region";
}

impl TypedStruct for Schemas {
    const ID: StructId = SCHEMAS;
    const NAME: &'static str = "Schemas";
}

fn declare<T: TypedStruct>(schema: &mut RegionSchema) {
    match schema.declare_struct(T::NAME) {
        Ok(id) if id == T::ID => {}
        other => panic!("bootstrap struct {} declared as {:?}", T::NAME, other),
    }
}

fn define<T: TypedStruct>(schema: &mut RegionSchema, fields: &[(&str, TypeSchema)]) {
    let fields = fields.iter().map(|(name, ty)| (name.to_string(), *ty)).collect();
    if let Err(err) = schema.define_fields(T::ID, fields) {
        panic!("bootstrap struct {}: {}", T::NAME, err);
    }
}

/// Build the resolved schema of [TypeDeclRegion].
pub fn type_decl_schema() -> RegionSchema {
    let mut schema = RegionSchema::new("TypeDecl");
    declare::<FieldDecl>(&mut schema);
    declare::<StructDecl>(&mut schema);
    declare::<RegionDecl>(&mut schema);
    declare::<Schemas>(&mut schema);

    let fields = schema.list(TypeSchema::Struct(FIELD));
    let structs = schema.list(TypeSchema::Struct(STRUCT));
    let regions = schema.list(TypeSchema::Struct(REGION));
    define::<FieldDecl>(&mut schema, &[("name", TypeSchema::String), ("type", TypeSchema::String)]);
    define::<StructDecl>(&mut schema, &[("name", TypeSchema::String), ("fields", fields)]);
    define::<RegionDecl>(&mut schema, &[("name", TypeSchema::String), ("struct", structs)]);
    define::<Schemas>(&mut schema, &[("region", regions)]);
    schema
}

#[derive(Debug, Clone)]
pub struct TypeDeclRegion {
    schema:      Arc<RegionSchema>,
    pub fields:  Pool<FieldDecl>,
    pub structs: Pool<StructDecl>,
    pub regions: Pool<RegionDecl>,
    pub schemas: Pool<Schemas>,
}

impl Default for TypeDeclRegion {
    fn default() -> Self {
        TypeDeclRegion::new()
    }
}

fn write_refs<T>(bb: &mut ByteBufferMut, refs: &[Ref<T>], cardinality: usize) -> Result<(), CodecError> {
    bb.write_count(refs.len())?;
    for r in refs {
        bb.write_index(r.index(), cardinality)?;
    }
    Ok(())
}

fn read_refs<T>(bb: &mut ByteBuffer, cardinality: usize) -> Result<Vec<Ref<T>>, CodecError> {
    let count = bb.read_count()?;
    let mut refs = Vec::with_capacity(count.min(bb.remaining()));
    for _ in 0..count {
        refs.push(Ref::new(bb.read_index(cardinality)?));
    }
    Ok(refs)
}

fn typed_refs<T: TypedStruct>(values: Vec<Value>) -> Vec<Ref<T>> {
    values
        .into_iter()
        .map(|value| match value {
            Value::Struct(instance) if instance.ty == T::ID => Ref::new(instance.index),
            other => panic!("expected a {} reference, got {:?}", T::NAME, other),
        })
        .collect()
}

impl TypeDeclRegion {
    pub fn new() -> TypeDeclRegion {
        TypeDeclRegion {
            schema:  Arc::new(type_decl_schema()),
            fields:  Pool::new(),
            structs: Pool::new(),
            regions: Pool::new(),
            schemas: Pool::new(),
        }
    }

    pub fn allocate_field(&mut self) -> Ref<FieldDecl> {
        self.fields.push(FieldDecl::default())
    }

    pub fn allocate_struct(&mut self) -> Ref<StructDecl> {
        self.structs.push(StructDecl::default())
    }

    pub fn allocate_region(&mut self) -> Ref<RegionDecl> {
        self.regions.push(RegionDecl::default())
    }

    pub fn allocate_schemas(&mut self) -> Ref<Schemas> {
        self.schemas.push(Schemas::default())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.structs.is_empty()
            && self.regions.is_empty()
            && self.schemas.is_empty()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        let mut bb = ByteBufferMut::new();
        bb.write_count(self.fields.len())?;
        bb.write_count(self.structs.len())?;
        bb.write_count(self.regions.len())?;
        bb.write_count(self.schemas.len())?;
        for f in self.fields.iter() {
            bb.write_string(&f.name)?;
            bb.write_string(&f.ty)?;
        }
        for s in self.structs.iter() {
            bb.write_string(&s.name)?;
            write_refs(&mut bb, &s.fields, self.fields.len())?;
        }
        for r in self.regions.iter() {
            bb.write_string(&r.name)?;
            write_refs(&mut bb, &r.structs, self.structs.len())?;
        }
        for s in self.schemas.iter() {
            write_refs(&mut bb, &s.regions, self.regions.len())?;
        }
        debug!(bytes = bb.len(), "serialized TypeDecl region");
        Ok(bb.data())
    }

    pub fn deserialize(&mut self, data: &[u8]) -> Result<(), CodecError> {
        if !self.is_empty() {
            return Err(CodecError::RegionNotEmpty);
        }
        let mut bb = ByteBuffer::new(data);
        let field_count = bb.read_count()?;
        let struct_count = bb.read_count()?;
        let region_count = bb.read_count()?;
        let schemas_count = bb.read_count()?;
        for _ in 0..field_count {
            self.allocate_field();
        }
        for _ in 0..struct_count {
            self.allocate_struct();
        }
        for _ in 0..region_count {
            self.allocate_region();
        }
        for _ in 0..schemas_count {
            self.allocate_schemas();
        }

        for f in self.fields.iter_mut() {
            f.name = bb.read_string()?;
            f.ty = bb.read_string()?;
        }
        for s in self.structs.iter_mut() {
            s.name = bb.read_string()?;
            s.fields = read_refs(&mut bb, field_count)?;
        }
        for r in self.regions.iter_mut() {
            r.name = bb.read_string()?;
            r.structs = read_refs(&mut bb, struct_count)?;
        }
        for s in self.schemas.iter_mut() {
            s.regions = read_refs(&mut bb, region_count)?;
        }
        debug!(bytes = data.len(), "deserialized TypeDecl region");
        Ok(())
    }
}

impl Region for TypeDeclRegion {
    fn schema(&self) -> &Arc<RegionSchema> {
        &self.schema
    }

    fn allocate(&mut self, name: &str) -> Option<Instance> {
        let instance = match name {
            "Field" => Instance::new(FIELD, self.allocate_field().index()),
            "Struct" => Instance::new(STRUCT, self.allocate_struct().index()),
            "Region" => Instance::new(REGION, self.allocate_region().index()),
            "Schemas" => Instance::new(SCHEMAS, self.allocate_schemas().index()),
            _ => return None,
        };
        Some(instance)
    }

    fn assign(&mut self, instance: Instance, field: usize, value: Value) {
        let index = instance.index;
        match (instance.ty, field, value) {
            (FIELD, 0, Value::String(v)) => self.fields[Ref::new(index)].name = v,
            (FIELD, 1, Value::String(v)) => self.fields[Ref::new(index)].ty = v,
            (STRUCT, 0, Value::String(v)) => self.structs[Ref::new(index)].name = v,
            (STRUCT, 1, Value::List(v)) => self.structs[Ref::new(index)].fields = typed_refs(v),
            (REGION, 0, Value::String(v)) => self.regions[Ref::new(index)].name = v,
            (REGION, 1, Value::List(v)) => self.regions[Ref::new(index)].structs = typed_refs(v),
            (SCHEMAS, 0, Value::List(v)) => self.schemas[Ref::new(index)].regions = typed_refs(v),
            (ty, field, value) => {
                panic!("cannot assign {:?} to field {} of TypeDecl struct {}", value, field, ty.0)
            }
        }
    }

    fn pool_len(&self, ty: StructId) -> usize {
        match ty {
            FIELD => self.fields.len(),
            STRUCT => self.structs.len(),
            REGION => self.regions.len(),
            SCHEMAS => self.schemas.len(),
            other => panic!("TypeDecl has no struct {}", other.0),
        }
    }
}

/// Copies object graphs between two [TypeDeclRegion]s, each object once.
pub struct TypeDeclCloner<'a> {
    src:         &'a TypeDeclRegion,
    dst:         &'a mut TypeDeclRegion,
    field_map:   Vec<Option<Ref<FieldDecl>>>,
    struct_map:  Vec<Option<Ref<StructDecl>>>,
    region_map:  Vec<Option<Ref<RegionDecl>>>,
    schemas_map: Vec<Option<Ref<Schemas>>>,
}

impl<'a> TypeDeclCloner<'a> {
    pub fn new(src: &'a TypeDeclRegion, dst: &'a mut TypeDeclRegion) -> TypeDeclCloner<'a> {
        TypeDeclCloner {
            src,
            dst,
            field_map: vec![None; src.fields.len()],
            struct_map: vec![None; src.structs.len()],
            region_map: vec![None; src.regions.len()],
            schemas_map: vec![None; src.schemas.len()],
        }
    }

    pub fn clone_field(&mut self, src: Ref<FieldDecl>) -> Ref<FieldDecl> {
        if let Some(dst) = self.field_map[src.index()] {
            return dst;
        }
        let dst = self.dst.allocate_field();
        self.field_map[src.index()] = Some(dst);
        self.dst.fields[dst] = self.src.fields[src].clone();
        dst
    }

    pub fn clone_struct(&mut self, src: Ref<StructDecl>) -> Ref<StructDecl> {
        if let Some(dst) = self.struct_map[src.index()] {
            return dst;
        }
        let dst = self.dst.allocate_struct();
        self.struct_map[src.index()] = Some(dst);
        let src_region = self.src;
        let from = &src_region.structs[src];
        let fields = from.fields.iter().map(|&f| self.clone_field(f)).collect();
        self.dst.structs[dst] = StructDecl { name: from.name.clone(), fields };
        dst
    }

    pub fn clone_region(&mut self, src: Ref<RegionDecl>) -> Ref<RegionDecl> {
        if let Some(dst) = self.region_map[src.index()] {
            return dst;
        }
        let dst = self.dst.allocate_region();
        self.region_map[src.index()] = Some(dst);
        let src_region = self.src;
        let from = &src_region.regions[src];
        let structs = from.structs.iter().map(|&s| self.clone_struct(s)).collect();
        self.dst.regions[dst] = RegionDecl { name: from.name.clone(), structs };
        dst
    }

    pub fn clone_schemas(&mut self, src: Ref<Schemas>) -> Ref<Schemas> {
        if let Some(dst) = self.schemas_map[src.index()] {
            return dst;
        }
        let dst = self.dst.allocate_schemas();
        self.schemas_map[src.index()] = Some(dst);
        let src_region = self.src;
        let from = &src_region.schemas[src];
        let regions = from.regions.iter().map(|&r| self.clone_region(r)).collect();
        self.dst.schemas[dst] = Schemas { regions };
        dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brine_region_schema::DynamicRegion;
    use pretty_assertions::assert_eq;

    /// One region `R` with struct `P{x: int32}` shared by two regions' lists.
    fn sample() -> (TypeDeclRegion, Ref<Schemas>) {
        let mut region = TypeDeclRegion::new();
        let x = region.allocate_field();
        region.fields[x] = FieldDecl { name: "x".into(), ty: "int32".into() };
        let p = region.allocate_struct();
        region.structs[p] = StructDecl { name: "P".into(), fields: vec![x] };
        let r = region.allocate_region();
        region.regions[r] = RegionDecl { name: "R".into(), structs: vec![p] };
        let q = region.allocate_region();
        region.regions[q] = RegionDecl { name: "Q".into(), structs: vec![p, p] };
        let root = region.allocate_schemas();
        region.schemas[root] = Schemas { regions: vec![r, q] };
        (region, root)
    }

    #[test]
    fn schema_shape() {
        let schema = type_decl_schema();
        let names: Vec<_> = schema.structs().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Field", "Struct", "Region", "Schemas"]);
        let region = schema.struct_schema(REGION);
        assert_eq!(region.field("struct").map(|f| f.id), Some(1));
        assert_eq!(region.fields[1].ty.canonical_name(&schema), "[]Struct");
        assert_eq!(schema.struct_schema(SCHEMAS).fields[0].ty.canonical_name(&schema), "[]Region");
    }

    #[test]
    fn allocate_by_name() {
        let mut region = TypeDeclRegion::new();
        assert_eq!(region.allocate("Struct"), Some(Instance::new(STRUCT, 0)));
        assert_eq!(region.allocate("Struct"), Some(Instance::new(STRUCT, 1)));
        assert_eq!(region.allocate("Schemas"), Some(Instance::new(SCHEMAS, 0)));
        assert_eq!(region.allocate("Nope"), None);
        assert_eq!(region.pool_len(STRUCT), 2);
    }

    #[test]
    fn typed_round_trip() {
        let (region, _) = sample();
        let data = region.serialize().unwrap();
        let mut copy = TypeDeclRegion::new();
        copy.deserialize(&data).unwrap();
        assert_eq!(copy.fields, region.fields);
        assert_eq!(copy.structs, region.structs);
        assert_eq!(copy.regions, region.regions);
        assert_eq!(copy.schemas, region.schemas);
        assert_eq!(copy.deserialize(&data), Err(CodecError::RegionNotEmpty));
    }

    #[test]
    fn typed_and_dynamic_codecs_agree() {
        let (region, _) = sample();
        let data = region.serialize().unwrap();
        let mut dynamic = DynamicRegion::new(Arc::clone(region.schema()));
        dynamic.deserialize(&data).unwrap();
        assert_eq!(dynamic.serialize().unwrap(), data);
    }

    #[test]
    fn single_object_pools_take_no_index_bytes() {
        let (region, _) = sample();
        let data = region.serialize().unwrap();
        let expected = 16                 // counts
            + (4 + 1) + (4 + 5)           // Field x: int32
            + (4 + 1) + 4                 // Struct P, one field ref of 0 bytes
            + (4 + 1) + 4                 // Region R, one struct ref of 0 bytes
            + (4 + 1) + 4                 // Region Q, two struct refs of 0 bytes
            + 4 + 2;                      // Schemas, two region refs of 1 byte
        assert_eq!(data.len(), expected);
    }

    #[test]
    fn cloner_preserves_sharing() {
        let (region, root) = sample();
        let mut dst = TypeDeclRegion::new();
        let copy = TypeDeclCloner::new(&region, &mut dst).clone_schemas(root);
        assert_eq!(dst.schemas[copy].regions.len(), 2);
        assert_eq!(dst.structs.len(), 1);
        assert_eq!(dst.fields.len(), 1);
        let q = dst.schemas[copy].regions[1];
        assert_eq!(dst.regions[q].structs[0], dst.regions[q].structs[1]);
        assert_eq!(dst.serialize().unwrap(), region.serialize().unwrap());
    }

    #[test]
    #[should_panic]
    fn assign_rejects_wrong_kind() {
        let mut region = TypeDeclRegion::new();
        let i = region.allocate("Field").unwrap();
        region.assign(i, 0, Value::Bool(true));
    }
}
