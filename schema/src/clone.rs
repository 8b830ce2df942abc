use std::sync::Arc;

use tracing::trace;

use crate::{
    error::SchemaError,
    region::{Instance, Region},
    value::{DynamicRegion, Value},
};

/// Deep-copies object graphs from one [DynamicRegion](struct.DynamicRegion.html)
/// into another region of the same schema.
///
/// Each source object is copied at most once per cloner. Shared and cyclic
/// references in the source come out shared and cyclic in the destination.
pub struct DynamicCloner<'a> {
    src:  &'a DynamicRegion,
    dst:  &'a mut DynamicRegion,
    /// Per struct, source index to destination index.
    maps: Vec<Vec<Option<usize>>>,
}

impl<'a> DynamicCloner<'a> {
    pub fn new(src: &'a DynamicRegion, dst: &'a mut DynamicRegion) -> Result<Self, SchemaError> {
        let schema = src.schema();
        if !Arc::ptr_eq(schema, dst.schema()) && **schema != **dst.schema() {
            return Err(SchemaError::Mismatch {
                expected: dst.schema().name.clone(),
                found:    schema.name.clone(),
            });
        }
        let maps = schema
            .struct_ids()
            .map(|id| vec![None; src.pool_len(id)])
            .collect();
        Ok(DynamicCloner { src, dst, maps })
    }

    /// The destination copy of `instance`, if it has been cloned already.
    pub fn mapped(&self, instance: Instance) -> Option<Instance> {
        self.maps[instance.ty.0][instance.index].map(|index| Instance::new(instance.ty, index))
    }

    /// Copy `instance` and everything reachable from it.
    pub fn clone_instance(&mut self, instance: Instance) -> Instance {
        let mut pending = Vec::new();
        let copy = self.visit(instance, &mut pending);
        self.copy_fields(&mut pending);
        copy
    }

    /// Copy a field value, cloning any objects it refers to.
    pub fn clone_value(&mut self, value: &Value) -> Value {
        let mut pending = Vec::new();
        let copy = self.copy_value(value, &mut pending);
        self.copy_fields(&mut pending);
        copy
    }

    /// The destination copy of `instance`. A new copy is allocated and queued
    /// in `pending` for its fields to be filled in.
    fn visit(&mut self, instance: Instance, pending: &mut Vec<(Instance, Instance)>) -> Instance {
        if let Some(copy) = self.mapped(instance) {
            return copy;
        }
        let copy = self.dst.allocate_struct(instance.ty);
        self.maps[instance.ty.0][instance.index] = Some(copy.index);
        trace!(ty = instance.ty.0, from = instance.index, to = copy.index, "cloned object");
        pending.push((instance, copy));
        copy
    }

    /// Drain `pending`, which may grow as references to new objects are met.
    fn copy_fields(&mut self, pending: &mut Vec<(Instance, Instance)>) {
        let src = self.src;
        while let Some((from, to)) = pending.pop() {
            for (field, value) in src.object(from).fields.iter().enumerate() {
                let value = self.copy_value(value, pending);
                self.dst.set_field(to, field, value);
            }
        }
    }

    fn copy_value(&mut self, value: &Value, pending: &mut Vec<(Instance, Instance)>) -> Value {
        match value {
            Value::Struct(instance) => Value::Struct(self.visit(*instance, pending)),
            Value::List(items) => Value::List(items.iter().map(|item| self.copy_value(item, pending)).collect()),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Namespace, RegionSchema, StructId};
    use pretty_assertions::assert_eq;

    /// `Node { name: string, edges: []Node }`
    fn graph_schema() -> Arc<RegionSchema> {
        let mut ns = Namespace::with_primitives();
        let mut schema = RegionSchema::new("Graph");
        let node = ns.register_struct(&mut schema, "Node").unwrap();
        let name = ns.resolve("string", &mut schema).unwrap();
        let edges = ns.resolve("[]Node", &mut schema).unwrap();
        schema
            .define_fields(node, vec![("name".into(), name), ("edges".into(), edges)])
            .unwrap();
        Arc::new(schema)
    }

    fn add_node(region: &mut DynamicRegion, name: &str) -> Instance {
        let n = region.allocate("Node").unwrap();
        region.assign(n, 0, Value::String(name.into()));
        n
    }

    fn link(region: &mut DynamicRegion, from: Instance, to: &[Instance]) {
        let edges = to.iter().copied().map(Value::Struct).collect();
        region.assign(from, 1, Value::List(edges));
    }

    #[test]
    fn clones_shared_and_cyclic_references_once() {
        let mut src = DynamicRegion::new(graph_schema());
        let unrelated = add_node(&mut src, "unrelated");
        let a = add_node(&mut src, "a");
        let b = add_node(&mut src, "b");
        let c = add_node(&mut src, "c");
        link(&mut src, a, &[b, c, b]);
        link(&mut src, b, &[c]);
        link(&mut src, c, &[a, c]);

        let mut dst = src.empty_like();
        let root = {
            let mut cloner = DynamicCloner::new(&src, &mut dst).unwrap();
            let root = cloner.clone_instance(a);
            assert_eq!(cloner.clone_instance(a), root);
            assert_eq!(cloner.mapped(unrelated), None);
            root
        };

        assert_eq!(dst.objects(StructId(0)).len(), 3);
        let names = |region: &DynamicRegion, v: &Value| {
            region.get(v.as_instance().unwrap(), "name").unwrap().as_string().to_owned()
        };
        let edges = dst.get(root, "edges").unwrap().as_array().to_vec();
        assert_eq!(
            edges.iter().map(|e| names(&dst, e)).collect::<Vec<_>>(),
            vec!["b", "c", "b"]
        );
        assert_eq!(edges[0], edges[2]);
        let c_copy = edges[1].as_instance().unwrap();
        let c_edges = dst.get(c_copy, "edges").unwrap().as_array();
        assert_eq!(c_edges, &[Value::Struct(root), Value::Struct(c_copy)]);
    }

    #[test]
    fn clones_append_to_destination() {
        let mut src = DynamicRegion::new(graph_schema());
        let a = add_node(&mut src, "a");
        let mut dst = src.empty_like();
        add_node(&mut dst, "existing");
        let copy = DynamicCloner::new(&src, &mut dst).unwrap().clone_instance(a);
        assert_eq!(copy.index, 1);
        assert_eq!(dst.get(copy, "name"), Some(&Value::String("a".into())));
    }

    #[test]
    fn clones_long_cycles() {
        const LEN: usize = 100_000;
        let mut src = DynamicRegion::new(graph_schema());
        let nodes: Vec<Instance> = (0..LEN).map(|i| add_node(&mut src, &i.to_string())).collect();
        for (i, &node) in nodes.iter().enumerate() {
            link(&mut src, node, &[nodes[(i + 1) % LEN]]);
        }

        let mut dst = src.empty_like();
        let root = DynamicCloner::new(&src, &mut dst).unwrap().clone_instance(nodes[0]);
        assert_eq!(dst.objects(StructId(0)).len(), LEN);

        let mut node = root;
        for i in 0..LEN {
            assert_eq!(dst.get(node, "name"), Some(&Value::String(i.to_string())));
            node = dst.get(node, "edges").unwrap()[0].as_instance().unwrap();
        }
        assert_eq!(node, root);
    }

    #[test]
    fn clone_value_copies_referenced_objects() {
        let mut src = DynamicRegion::new(graph_schema());
        let a = add_node(&mut src, "a");
        let b = add_node(&mut src, "b");
        link(&mut src, a, &[b]);
        link(&mut src, b, &[a]);

        let mut dst = src.empty_like();
        let list = Value::List(vec![Value::Struct(b), Value::Struct(b)]);
        let copy = DynamicCloner::new(&src, &mut dst).unwrap().clone_value(&list);
        assert_eq!(copy[0], copy[1]);
        assert_eq!(dst.objects(StructId(0)).len(), 2);
        let b2 = copy[0].as_instance().unwrap();
        assert_eq!(dst.get(b2, "name"), Some(&Value::String("b".into())));
    }

    #[test]
    fn equal_schemas_are_compatible() {
        let src = DynamicRegion::new(graph_schema());
        let mut dst = DynamicRegion::new(graph_schema());
        assert!(DynamicCloner::new(&src, &mut dst).is_ok());
    }

    #[test]
    fn mismatched_schemas_are_rejected() {
        let src = DynamicRegion::new(graph_schema());
        let mut dst = DynamicRegion::new(Arc::new(RegionSchema::new("Other")));
        assert!(matches!(
            DynamicCloner::new(&src, &mut dst),
            Err(SchemaError::Mismatch { .. })
        ));
    }
}
