//! Provenance of heap references.
//!
//! The traversal records, per object, every location it was reached
//! from. Contexts feed the deep-inspection policy: a container reached
//! through a stack variable or an allow-listed name is inspected even
//! when its type is shallow. Rebuilt fresh for every traversal.

use std::collections::HashMap;

use javert_jdi::{ObjectId, TypeId};

#[derive(Clone, Debug)]
pub enum ReferenceContext {
    StackVariable { depth: usize, name: String },
    Field { parent: ObjectId, name: String },
    StaticField { type_id: TypeId, name: String },
    SequenceElement { parent: ObjectId },
    ClassObject { type_id: TypeId },
}

impl ReferenceContext {
    pub fn is_stack(&self) -> bool {
        matches!(self, Self::StackVariable { .. })
    }

    /// The referencing variable or field name, when one exists.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::StackVariable { name, .. }
            | Self::Field { name, .. }
            | Self::StaticField { name, .. } => Some(name),
            Self::SequenceElement { .. } | Self::ClassObject { .. } => None,
        }
    }
}

#[derive(Default)]
pub struct ReferenceContexts {
    by_object: HashMap<ObjectId, Vec<ReferenceContext>>,
}

impl ReferenceContexts {
    pub fn record(&mut self, object: ObjectId, context: ReferenceContext) {
        self.by_object.entry(object).or_default().push(context);
    }

    pub fn of(&self, object: ObjectId) -> &[ReferenceContext] {
        self.by_object.get(&object).map_or(&[], Vec::as_slice)
    }
}
