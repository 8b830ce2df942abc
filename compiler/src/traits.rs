use brine_region_schema::{Ref, RegionSchema, StructId, Value};

use crate::error::CompileError;

/// A struct type of a typed region: its position in the region schema.
pub trait TypedStruct {
    const ID: StructId;
    const NAME: &'static str;
}

/// Recover a typed handle from a bound value.
pub trait FromValue: Sized {
    fn from_value(value: &Value, schema: &RegionSchema) -> Result<Self, CompileError>;
}

impl<T: TypedStruct> FromValue for Ref<T> {
    fn from_value(value: &Value, schema: &RegionSchema) -> Result<Self, CompileError> {
        match value {
            Value::Struct(instance) if instance.ty == T::ID => Ok(Ref::new(instance.index)),
            Value::Struct(instance) => Err(CompileError::UnexpectedRoot {
                expected: T::NAME.to_string(),
                found:    schema.struct_schema(instance.ty).name.clone(),
            }),
            other => Err(CompileError::UnexpectedRoot {
                expected: T::NAME.to_string(),
                found:    other.kind_name().to_string(),
            }),
        }
    }
}
