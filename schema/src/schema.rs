use std::collections::HashMap;
use std::fmt;

use crate::error::SchemaError;

/// Index of a struct in its [RegionSchema](struct.RegionSchema.html). This is
/// also the position of the struct's pool inside a region and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub usize);

/// Index of a memoized list type in its [RegionSchema](struct.RegionSchema.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }

    /// Largest value representable at this width.
    pub fn max_value(self, unsigned: bool) -> u64 {
        let bits = self.bits();
        if unsigned {
            u64::MAX >> (64 - bits)
        } else {
            u64::MAX >> (65 - bits)
        }
    }

    /// Smallest value representable at this width.
    pub fn min_value(self, unsigned: bool) -> i64 {
        if unsigned {
            0
        } else {
            i64::MIN >> (64 - self.bits())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    W32,
    W64,
}

impl FloatWidth {
    pub fn bits(self) -> u32 {
        match self {
            FloatWidth::W32 => 32,
            FloatWidth::W64 => 64,
        }
    }
}

/// The closed set of types a field, list element or literal can have.
///
/// Struct and list types are handles into a [RegionSchema](struct.RegionSchema.html).
/// List types are memoized per element type, so two list types are compatible
/// exactly when their handles are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSchema {
    Integer { width: IntWidth, unsigned: bool },
    Float { width: FloatWidth },
    Boolean,
    String,
    Struct(StructId),
    List(ListId),
}

/// Every primitive type together with its canonical name.
pub const PRIMITIVE_TYPES: [(&str, TypeSchema); 12] = [
    ("int8", TypeSchema::Integer { width: IntWidth::W8, unsigned: false }),
    ("int16", TypeSchema::Integer { width: IntWidth::W16, unsigned: false }),
    ("int32", TypeSchema::Integer { width: IntWidth::W32, unsigned: false }),
    ("int64", TypeSchema::Integer { width: IntWidth::W64, unsigned: false }),
    ("uint8", TypeSchema::Integer { width: IntWidth::W8, unsigned: true }),
    ("uint16", TypeSchema::Integer { width: IntWidth::W16, unsigned: true }),
    ("uint32", TypeSchema::Integer { width: IntWidth::W32, unsigned: true }),
    ("uint64", TypeSchema::Integer { width: IntWidth::W64, unsigned: true }),
    ("float32", TypeSchema::Float { width: FloatWidth::W32 }),
    ("float64", TypeSchema::Float { width: FloatWidth::W64 }),
    ("bool", TypeSchema::Boolean),
    ("string", TypeSchema::String),
];

impl TypeSchema {
    pub const INT64: TypeSchema = TypeSchema::Integer { width: IntWidth::W64, unsigned: false };

    /// Compatibility test used by the binder: can a slot of type `self` hold
    /// a value of type `other`?
    pub fn can_hold(&self, other: &TypeSchema) -> bool {
        match (self, other) {
            (
                TypeSchema::Integer { width, unsigned },
                TypeSchema::Integer { width: other_width, unsigned: other_unsigned },
            ) => width == other_width && unsigned == other_unsigned,
            (TypeSchema::Float { width }, TypeSchema::Float { width: other_width }) => {
                width == other_width
            }
            (TypeSchema::Boolean, TypeSchema::Boolean) => true,
            (TypeSchema::String, TypeSchema::String) => true,
            (TypeSchema::Struct(id), TypeSchema::Struct(other_id)) => id == other_id,
            (TypeSchema::List(id), TypeSchema::List(other_id)) => id == other_id,
            _ => false,
        }
    }

    /// The name of a primitive type, or `None` for struct and list types.
    pub fn primitive_name(&self) -> Option<&'static str> {
        PRIMITIVE_TYPES
            .iter()
            .find(|(_, t)| t == self)
            .map(|(name, _)| *name)
    }

    /// Stable, derivable name of this type: `uint16`, `Point`, `[][]string`.
    pub fn canonical_name(&self, schema: &RegionSchema) -> String {
        match *self {
            TypeSchema::Struct(id) => schema.struct_schema(id).name.clone(),
            TypeSchema::List(id) => format!("[]{}", schema.list_element(id).canonical_name(schema)),
            _ => self.primitive_name().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub ty:   TypeSchema,
    /// Declaration order of the field inside its struct.
    pub id:   usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructSchema {
    pub name:   String,
    pub fields: Vec<FieldSchema>,
    field_lut:  HashMap<String, usize>,
}

impl StructSchema {
    pub fn new(name: String) -> StructSchema {
        StructSchema {
            name,
            fields: Vec::new(),
            field_lut: HashMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.field_lut.get(name).map(|&id| &self.fields[id])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListSchema {
    pub element: TypeSchema,
}

/// The resolved description of one region: its structs in declaration order
/// and every list type its fields refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSchema {
    pub name:   String,
    structs:    Vec<StructSchema>,
    struct_lut: HashMap<String, StructId>,
    lists:      Vec<ListSchema>,
    list_lut:   HashMap<TypeSchema, ListId>,
}

impl RegionSchema {
    pub fn new(name: impl Into<String>) -> RegionSchema {
        RegionSchema {
            name:       name.into(),
            structs:    Vec::new(),
            struct_lut: HashMap::new(),
            lists:      Vec::new(),
            list_lut:   HashMap::new(),
        }
    }

    /// Add a struct with no fields yet. Fields are attached later with
    /// [define_fields](#method.define_fields) so that structs may refer to
    /// each other in any order.
    pub fn declare_struct(&mut self, name: &str) -> Result<StructId, SchemaError> {
        if self.struct_lut.contains_key(name) {
            return Err(SchemaError::DuplicateType(name.to_string()));
        }
        let id = StructId(self.structs.len());
        self.structs.push(StructSchema::new(name.to_string()));
        self.struct_lut.insert(name.to_string(), id);
        Ok(id)
    }

    /// Attach fields to a declared struct, assigning field IDs in order and
    /// building the name lookup.
    pub fn define_fields(
        &mut self,
        id: StructId,
        fields: Vec<(String, TypeSchema)>,
    ) -> Result<(), SchemaError> {
        let s = &mut self.structs[id.0];
        s.fields.clear();
        s.field_lut.clear();
        for (name, ty) in fields {
            if s.field_lut.contains_key(&name) {
                return Err(SchemaError::DuplicateField {
                    struct_name: s.name.clone(),
                    field:       name,
                });
            }
            let field_id = s.fields.len();
            s.field_lut.insert(name.clone(), field_id);
            s.fields.push(FieldSchema { name, ty, id: field_id });
        }
        Ok(())
    }

    /// The memoized list-of-`element` type. Repeated calls with the same
    /// element return the same handle.
    pub fn list(&mut self, element: TypeSchema) -> TypeSchema {
        if let Some(&id) = self.list_lut.get(&element) {
            return TypeSchema::List(id);
        }
        let id = ListId(self.lists.len());
        self.lists.push(ListSchema { element });
        self.list_lut.insert(element, id);
        TypeSchema::List(id)
    }

    /// Look up an existing list-of-`element` type without creating one.
    pub fn find_list(&self, element: TypeSchema) -> Option<TypeSchema> {
        self.list_lut.get(&element).map(|&id| TypeSchema::List(id))
    }

    pub fn list_element(&self, id: ListId) -> TypeSchema {
        self.lists[id.0].element
    }

    pub fn structs(&self) -> &[StructSchema] {
        &self.structs
    }

    pub fn struct_ids(&self) -> impl Iterator<Item = StructId> {
        (0..self.structs.len()).map(StructId)
    }

    pub fn struct_schema(&self, id: StructId) -> &StructSchema {
        &self.structs[id.0]
    }

    pub fn lookup_struct(&self, name: &str) -> Option<StructId> {
        self.struct_lut.get(name).copied()
    }

    pub fn type_name(&self, ty: TypeSchema) -> String {
        ty.canonical_name(self)
    }
}

impl fmt::Display for RegionSchema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "region {} {{", self.name)?;
        for s in &self.structs {
            writeln!(f, "  {} {{", s.name)?;
            for field in &s.fields {
                writeln!(f, "    {}: {}", field.name, field.ty.canonical_name(self))?;
            }
            writeln!(f, "  }}")?;
        }
        write!(f, "}}")
    }
}

/// A name to type table used while resolving type references.
///
/// Every namespace created with [with_primitives](#method.with_primitives)
/// knows the primitive canonical names; struct names are registered on top.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    types: HashMap<String, TypeSchema>,
}

impl Namespace {
    pub fn new() -> Namespace {
        Namespace::default()
    }

    pub fn with_primitives() -> Namespace {
        let mut ns = Namespace::new();
        for (name, ty) in PRIMITIVE_TYPES {
            ns.types.insert(name.to_string(), ty);
        }
        ns
    }

    pub fn get(&self, name: &str) -> Option<TypeSchema> {
        self.types.get(name).copied()
    }

    pub fn insert(&mut self, name: &str, ty: TypeSchema) -> Result<(), SchemaError> {
        if self.types.contains_key(name) {
            return Err(SchemaError::DuplicateType(name.to_string()));
        }
        self.types.insert(name.to_string(), ty);
        Ok(())
    }

    /// Declare a struct in `schema` and make its name resolvable.
    pub fn register_struct(
        &mut self,
        schema: &mut RegionSchema,
        name: &str,
    ) -> Result<StructId, SchemaError> {
        if self.types.contains_key(name) {
            return Err(SchemaError::DuplicateType(name.to_string()));
        }
        let id = schema.declare_struct(name)?;
        self.types.insert(name.to_string(), TypeSchema::Struct(id));
        Ok(id)
    }

    /// Resolve a type reference. Each leading `[]` wraps the rest in a list.
    pub fn resolve(&self, name: &str, schema: &mut RegionSchema) -> Option<TypeSchema> {
        match name.strip_prefix("[]") {
            Some(rest) => {
                let element = self.resolve(rest, schema)?;
                Some(schema.list(element))
            }
            None => self.get(name),
        }
    }
}
