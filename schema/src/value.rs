use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    bb::{index_width, ByteBuffer, ByteBufferMut},
    error::CodecError,
    region::{Instance, Region},
    schema::{FloatWidth, IntWidth, RegionSchema, StructId, TypeSchema},
};

/// This type holds dynamic region data.
///
/// Values can represent any field of any struct in a
/// [RegionSchema](struct.RegionSchema.html). Struct references are
/// [Instance](struct.Instance.html) handles into the region that owns them, so
/// a Value is only meaningful next to its region.
#[derive(Clone, PartialEq)]
pub enum Value {
    /// An unset struct reference.
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    Struct(Instance),
    List(Vec<Value>),
}

impl Value {
    /// The value a freshly allocated field of type `ty` starts with.
    pub fn zero(ty: TypeSchema) -> Value {
        match ty {
            TypeSchema::Integer { unsigned: true, .. } => Value::UInt(0),
            TypeSchema::Integer { unsigned: false, .. } => Value::Int(0),
            TypeSchema::Float { .. } => Value::Float(0.0),
            TypeSchema::Boolean => Value::Bool(false),
            TypeSchema::String => Value::String(String::new()),
            TypeSchema::Struct(_) => Value::Null,
            TypeSchema::List(_) => Value::List(Vec::new()),
        }
    }

    /// A short name for the kind of value, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "signed integer",
            Value::UInt(_) => "unsigned integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Struct(_) => "struct",
            Value::List(_) => "list",
        }
    }

    /// Returns `false` for other value kinds.
    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Bool(value) => value,
            _ => false,
        }
    }

    /// Returns `0` for other value kinds.
    pub fn as_int(&self) -> i64 {
        match *self {
            Value::Int(value) => value,
            _ => 0,
        }
    }

    /// Returns `0` for other value kinds.
    pub fn as_uint(&self) -> u64 {
        match *self {
            Value::UInt(value) => value,
            _ => 0,
        }
    }

    /// Returns `0.0` for other value kinds.
    pub fn as_float(&self) -> f64 {
        match *self {
            Value::Float(value) => value,
            _ => 0.0,
        }
    }

    /// Returns `""` for other value kinds.
    pub fn as_string(&self) -> &str {
        match *self {
            Value::String(ref value) => value.as_str(),
            _ => "",
        }
    }

    /// Returns `None` for other value kinds, including [Null](#variant.Null).
    pub fn as_instance(&self) -> Option<Instance> {
        match *self {
            Value::Struct(instance) => Some(instance),
            _ => None,
        }
    }

    /// Returns an empty slice for other value kinds.
    pub fn as_array(&self) -> &[Value] {
        match *self {
            Value::List(ref values) => values.as_slice(),
            _ => &[],
        }
    }

    /// Returns `0` for other value kinds.
    pub fn len(&self) -> usize {
        match *self {
            Value::List(ref values) => values.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Does nothing for other value kinds.
    pub fn push(&mut self, value: Value) {
        if let Value::List(ref mut values) = *self {
            values.push(value);
        }
    }
}

impl Index<usize> for Value {
    type Output = Value;

    /// It will panic if this value isn't a [List](#variant.List) or if the
    /// provided index is out of bounds.
    fn index(&self, index: usize) -> &Value {
        match *self {
            Value::List(ref values) => &values[index],
            _ => panic!("cannot index a {} value", self.kind_name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Null => write!(f, "null"),
            Value::Int(value) => fmt::Debug::fmt(&value, f),
            Value::UInt(value) => fmt::Debug::fmt(&value, f),
            Value::Float(value) => fmt::Debug::fmt(&value, f),
            Value::Bool(value) => fmt::Debug::fmt(&value, f),
            Value::String(ref value) => fmt::Debug::fmt(value, f),
            Value::Struct(instance) => write!(f, "@{}#{}", instance.ty.0, instance.index),
            Value::List(ref values) => fmt::Debug::fmt(values, f),
        }
    }
}

/// One object of a [DynamicRegion](struct.DynamicRegion.html). Fields are
/// stored by field ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub fields: Vec<Value>,
}

/// A region for any resolved schema, holding one pool of
/// [Object](struct.Object.html)s per struct.
#[derive(Debug, Clone)]
pub struct DynamicRegion {
    schema: Arc<RegionSchema>,
    pools:  Vec<Vec<Object>>,
}

impl DynamicRegion {
    pub fn new(schema: Arc<RegionSchema>) -> DynamicRegion {
        let pools = vec![Vec::new(); schema.structs().len()];
        DynamicRegion { schema, pools }
    }

    /// An empty region sharing this region's schema.
    pub fn empty_like(&self) -> DynamicRegion {
        DynamicRegion::new(Arc::clone(&self.schema))
    }

    /// Typed allocation: append a zero-initialized object to the pool of `ty`.
    pub fn allocate_struct(&mut self, ty: StructId) -> Instance {
        let fields = self
            .schema
            .struct_schema(ty)
            .fields
            .iter()
            .map(|f| Value::zero(f.ty))
            .collect();
        let pool = &mut self.pools[ty.0];
        let instance = Instance::new(ty, pool.len());
        pool.push(Object { fields });
        instance
    }

    pub fn is_empty(&self) -> bool {
        self.pools.iter().all(Vec::is_empty)
    }

    pub fn objects(&self, ty: StructId) -> &[Object] {
        &self.pools[ty.0]
    }

    pub fn object(&self, instance: Instance) -> &Object {
        &self.pools[instance.ty.0][instance.index]
    }

    pub fn field(&self, instance: Instance, field: usize) -> &Value {
        &self.object(instance).fields[field]
    }

    /// Look up a field by name. Returns `None` if the struct has no such field.
    pub fn get(&self, instance: Instance, name: &str) -> Option<&Value> {
        let field = self.schema.struct_schema(instance.ty).field(name)?;
        Some(self.field(instance, field.id))
    }

    /// Store `value` without checking it against the schema. Mismatches are
    /// reported when the region is serialized.
    pub fn set_field(&mut self, instance: Instance, field: usize, value: Value) {
        self.pools[instance.ty.0][instance.index].fields[field] = value;
    }

    /// Does `value` fit a slot of type `ty` in this region?
    pub fn conforms(&self, value: &Value, ty: TypeSchema) -> bool {
        match (ty, value) {
            (TypeSchema::Integer { width, unsigned: false }, Value::Int(v)) => {
                *v >= width.min_value(false) && *v as i128 <= width.max_value(false) as i128
            }
            (TypeSchema::Integer { width, unsigned: true }, Value::UInt(v)) => {
                *v <= width.max_value(true)
            }
            (TypeSchema::Float { .. }, Value::Float(_)) => true,
            (TypeSchema::Boolean, Value::Bool(_)) => true,
            (TypeSchema::String, Value::String(_)) => true,
            (TypeSchema::Struct(_), Value::Null) => true,
            (TypeSchema::Struct(id), Value::Struct(instance)) => {
                instance.ty == id && instance.index < self.pools[id.0].len()
            }
            (TypeSchema::List(id), Value::List(items)) => {
                let element = self.schema.list_element(id);
                items.iter().all(|item| self.conforms(item, element))
            }
            _ => false,
        }
    }

    /// Encode every pool of this region.
    ///
    /// Pool cardinalities decide the width of every struct reference, so the
    /// region must be fully populated before it is serialized.
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        let mut bb = ByteBufferMut::new();
        for pool in &self.pools {
            bb.write_count(pool.len())?;
        }
        for id in self.schema.struct_ids() {
            let s = self.schema.struct_schema(id);
            for object in &self.pools[id.0] {
                for field in &s.fields {
                    let slot = (s.name.as_str(), field.name.as_str());
                    self.encode_value(&object.fields[field.id], field.ty, slot, &mut bb)?;
                }
            }
        }
        debug!(region = %self.schema.name, bytes = bb.len(), "serialized region");
        Ok(bb.data())
    }

    /// `slot` names the struct and field `value` belongs to, for errors.
    fn encode_value(
        &self,
        value: &Value,
        ty: TypeSchema,
        slot: (&str, &str),
        bb: &mut ByteBufferMut,
    ) -> Result<(), CodecError> {
        match (ty, value) {
            (TypeSchema::Integer { width, unsigned: false }, Value::Int(v)) => {
                if !self.conforms(value, ty) {
                    return Err(self.out_of_range(v, ty));
                }
                match width {
                    IntWidth::W8 => bb.write_i8(*v as i8),
                    IntWidth::W16 => bb.write_i16(*v as i16),
                    IntWidth::W32 => bb.write_i32(*v as i32),
                    IntWidth::W64 => bb.write_i64(*v),
                }
            }
            (TypeSchema::Integer { width, unsigned: true }, Value::UInt(v)) => {
                if !self.conforms(value, ty) {
                    return Err(self.out_of_range(v, ty));
                }
                match width {
                    IntWidth::W8 => bb.write_u8(*v as u8),
                    IntWidth::W16 => bb.write_u16(*v as u16),
                    IntWidth::W32 => bb.write_u32(*v as u32),
                    IntWidth::W64 => bb.write_u64(*v),
                }
            }
            (TypeSchema::Float { width: FloatWidth::W32 }, Value::Float(v)) => bb.write_f32(*v as f32),
            (TypeSchema::Float { width: FloatWidth::W64 }, Value::Float(v)) => bb.write_f64(*v),
            (TypeSchema::Boolean, Value::Bool(v)) => bb.write_bool(*v),
            (TypeSchema::String, Value::String(v)) => bb.write_string(v)?,
            (TypeSchema::Struct(id), Value::Struct(instance)) if instance.ty == id => {
                bb.write_index(instance.index, self.pools[id.0].len())?
            }
            (TypeSchema::Struct(_), Value::Null) => {
                return Err(CodecError::NullReference {
                    struct_name: slot.0.to_string(),
                    field:       slot.1.to_string(),
                })
            }
            (TypeSchema::List(id), Value::List(items)) => {
                bb.write_count(items.len())?;
                let element = self.schema.list_element(id);
                for item in items {
                    self.encode_value(item, element, slot, bb)?;
                }
            }
            _ => {
                return Err(CodecError::TypeMismatch {
                    expected: ty.canonical_name(&self.schema),
                    found:    value.kind_name().to_string(),
                })
            }
        }
        Ok(())
    }

    fn out_of_range(&self, value: &dyn fmt::Display, ty: TypeSchema) -> CodecError {
        CodecError::ValueOutOfRange {
            value:     value.to_string(),
            type_name: ty.canonical_name(&self.schema),
        }
    }

    /// Decode `data` into this region, which must be empty.
    ///
    /// Every pool is allocated to its final size before any field is read, so
    /// references to objects later in a pool (or to the object itself) decode
    /// like any other. Counts that the remaining bytes cannot hold are
    /// rejected before anything is allocated. On error the region is left
    /// empty.
    pub fn deserialize(&mut self, data: &[u8]) -> Result<(), CodecError> {
        if !self.is_empty() {
            return Err(CodecError::RegionNotEmpty);
        }
        let result = self.decode_pools(data);
        if result.is_err() {
            for pool in &mut self.pools {
                pool.clear();
            }
        }
        result
    }

    fn decode_pools(&mut self, data: &[u8]) -> Result<(), CodecError> {
        let schema = Arc::clone(&self.schema);
        let mut bb = ByteBuffer::new(data);

        let mut counts = Vec::with_capacity(self.pools.len());
        for _ in schema.struct_ids() {
            counts.push(bb.read_count()?);
        }
        let needed = schema.struct_ids().zip(&counts).fold(0u128, |total, (id, &count)| {
            let size: usize = schema
                .struct_schema(id)
                .fields
                .iter()
                .map(|f| min_encoded_size(f.ty, &counts))
                .sum();
            total + count as u128 * size as u128
        });
        if needed > bb.remaining() as u128 {
            return Err(CodecError::EndOfData);
        }

        for (id, &count) in schema.struct_ids().zip(&counts) {
            self.pools[id.0].reserve_exact(count);
            for _ in 0..count {
                self.allocate_struct(id);
            }
        }

        for id in schema.struct_ids() {
            let s = schema.struct_schema(id);
            for index in 0..self.pools[id.0].len() {
                for field in &s.fields {
                    let value = self.decode_value(field.ty, &mut bb)?;
                    self.pools[id.0][index].fields[field.id] = value;
                }
            }
        }

        if bb.remaining() > 0 {
            trace!(trailing = bb.remaining(), "ignoring trailing bytes");
        }
        debug!(region = %schema.name, bytes = data.len(), "deserialized region");
        Ok(())
    }

    fn decode_value(&self, ty: TypeSchema, bb: &mut ByteBuffer) -> Result<Value, CodecError> {
        let value = match ty {
            TypeSchema::Integer { width, unsigned: false } => Value::Int(match width {
                IntWidth::W8 => bb.read_i8()? as i64,
                IntWidth::W16 => bb.read_i16()? as i64,
                IntWidth::W32 => bb.read_i32()? as i64,
                IntWidth::W64 => bb.read_i64()?,
            }),
            TypeSchema::Integer { width, unsigned: true } => Value::UInt(match width {
                IntWidth::W8 => bb.read_u8()? as u64,
                IntWidth::W16 => bb.read_u16()? as u64,
                IntWidth::W32 => bb.read_u32()? as u64,
                IntWidth::W64 => bb.read_u64()?,
            }),
            TypeSchema::Float { width: FloatWidth::W32 } => Value::Float(bb.read_f32()? as f64),
            TypeSchema::Float { width: FloatWidth::W64 } => Value::Float(bb.read_f64()?),
            TypeSchema::Boolean => Value::Bool(bb.read_bool()?),
            TypeSchema::String => Value::String(bb.read_string()?),
            TypeSchema::Struct(id) => {
                let index = bb.read_index(self.pools[id.0].len())?;
                Value::Struct(Instance::new(id, index))
            }
            TypeSchema::List(id) => {
                let count = bb.read_count()?;
                let element = self.schema.list_element(id);
                let mut items = Vec::with_capacity(count.min(bb.remaining()));
                for _ in 0..count {
                    items.push(self.decode_value(element, bb)?);
                }
                Value::List(items)
            }
        };
        Ok(value)
    }

    fn fmt_value(&self, value: &Value, f: &mut fmt::Formatter) -> fmt::Result {
        match value {
            Value::Struct(instance) => write!(
                f,
                "{}#{}",
                self.schema.struct_schema(instance.ty).name,
                instance.index
            ),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_value(item, f)?;
                }
                write!(f, "]")
            }
            other => write!(f, "{:?}", other),
        }
    }
}

impl Region for DynamicRegion {
    fn schema(&self) -> &Arc<RegionSchema> {
        &self.schema
    }

    fn allocate(&mut self, name: &str) -> Option<Instance> {
        let id = self.schema.lookup_struct(name)?;
        Some(self.allocate_struct(id))
    }

    fn assign(&mut self, instance: Instance, field: usize, value: Value) {
        let ty = self.schema.struct_schema(instance.ty).fields[field].ty;
        if !self.conforms(&value, ty) {
            panic!(
                "value {:?} does not fit field {} of type {}",
                value,
                field,
                ty.canonical_name(&self.schema)
            );
        }
        self.set_field(instance, field, value);
    }

    fn pool_len(&self, ty: StructId) -> usize {
        self.pools[ty.0].len()
    }
}

/// Fewest bytes a value of type `ty` takes on the wire, given the pool
/// cardinalities `counts`.
fn min_encoded_size(ty: TypeSchema, counts: &[usize]) -> usize {
    match ty {
        TypeSchema::Integer { width, .. } => width.bytes(),
        TypeSchema::Float { width } => width.bits() as usize / 8,
        TypeSchema::Boolean => 1,
        TypeSchema::String | TypeSchema::List(_) => 4,
        TypeSchema::Struct(id) => index_width(counts[id.0]),
    }
}

impl fmt::Display for DynamicRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for id in self.schema.struct_ids() {
            let s = self.schema.struct_schema(id);
            for (index, object) in self.pools[id.0].iter().enumerate() {
                write!(f, "{}#{} {{", s.name, index)?;
                for (i, field) in s.fields.iter().enumerate() {
                    write!(f, "{}{}: ", if i == 0 { "" } else { ", " }, field.name)?;
                    self.fmt_value(&object.fields[field.id], f)?;
                }
                writeln!(f, "}}")?;
            }
        }
        Ok(())
    }
}
