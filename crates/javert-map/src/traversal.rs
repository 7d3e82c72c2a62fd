//! Heap traversal.
//!
//! Enumerates every live object reachable from the paused thread's stack
//! and from static fields, exactly once per object id, innermost frame
//! first. Each root is followed by its transitive field closure before
//! the next root is taken. Containers (arrays and iterables) have their
//! elements walked too, at most once per object regardless of in-degree.
//!
//! A traversal is single-use: the visited state cannot be reset, a new
//! walk needs a new instance. All state is held as plain ids; nothing
//! here keeps a remote handle across the iterator invocations that would
//! invalidate one.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};

use javert_jdi::{
    Jdi, JdiError, ObjectId, ReferenceTypeInfo, ThreadId, TypeDescriptor, TypeId, TypeTag, Value,
};
use tracing::{debug, warn};

use crate::contexts::{ReferenceContext, ReferenceContexts};
use crate::error::MappingResult;
use crate::identity::{TypeIdentity, TypeRegistry};
use crate::limiter::MappingLimiter;

const ITERABLE: &str = "java.lang.Iterable";

/// Elements of a container object, captured during its one deep
/// inspection so consumers never re-invoke the remote iterator.
pub struct SequenceInfo {
    pub elements: Vec<Value>,
    /// Component type for arrays; `None` for iterables, whose element
    /// type is not known statically.
    pub component: Option<TypeDescriptor>,
}

pub struct TraversedObject {
    pub object: ObjectId,
    pub type_id: TypeId,
    pub identity: TypeIdentity,
    /// Whether the object's type falls under the shallow policy.
    pub shallow: bool,
    pub sequence: Option<SequenceInfo>,
}

pub struct HeapTraversal<'a> {
    jdi: &'a dyn Jdi,
    registry: &'a RefCell<TypeRegistry>,
    limiter: &'a MappingLimiter,
    thread: ThreadId,
    contexts: ReferenceContexts,
    stack: Vec<ObjectId>,
    visited: HashSet<ObjectId>,
    deep_inspected: HashSet<ObjectId>,
    next_frame: usize,
    frame_total: Option<usize>,
    static_types: Option<VecDeque<TypeId>>,
    absent_info: bool,
    done: bool,
}

impl<'a> HeapTraversal<'a> {
    pub fn new(
        jdi: &'a dyn Jdi,
        registry: &'a RefCell<TypeRegistry>,
        limiter: &'a MappingLimiter,
        thread: ThreadId,
    ) -> Self {
        Self {
            jdi,
            registry,
            limiter,
            thread,
            contexts: ReferenceContexts::default(),
            stack: Vec::new(),
            visited: HashSet::new(),
            deep_inspected: HashSet::new(),
            next_frame: 0,
            frame_total: None,
            static_types: None,
            absent_info: false,
            done: false,
        }
    }

    /// True when some frame lacked variable-table information. Reported
    /// once per traversal instead of per occurrence.
    pub fn encountered_absent_info(&self) -> bool {
        self.absent_info
    }

    pub fn contexts(&self) -> &ReferenceContexts {
        &self.contexts
    }

    fn refill(&mut self) -> MappingResult<bool> {
        let total = match self.frame_total {
            Some(total) => total,
            None => {
                let total = self.jdi.frame_count(self.thread)?;
                self.frame_total = Some(total);
                total
            }
        };
        if self.next_frame < total {
            let depth = self.next_frame;
            self.next_frame += 1;
            self.push_frame_roots(depth)?;
            return Ok(true);
        }
        if self.static_types.is_none() {
            self.static_types = Some(self.jdi.reference_types().into());
        }
        let pending = match self.static_types.as_mut() {
            Some(pending) => pending,
            None => return Ok(false),
        };
        match pending.pop_front() {
            Some(type_id) => {
                self.push_static_roots(type_id)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn push_frame_roots(&mut self, depth: usize) -> MappingResult<()> {
        let frame = self.jdi.frame(self.thread, depth)?;
        let mut roots = Vec::new();
        if let Some(this) = frame.this_object {
            self.contexts.record(
                this,
                ReferenceContext::StackVariable {
                    depth,
                    name: "this".to_owned(),
                },
            );
            roots.push(this);
        }
        match self.jdi.visible_variables(self.thread, depth) {
            Ok(variables) => {
                for (variable, value) in variables {
                    if let Some(object) = value.object_id() {
                        self.contexts.record(
                            object,
                            ReferenceContext::StackVariable {
                                depth,
                                name: variable.name,
                            },
                        );
                        roots.push(object);
                    }
                }
            }
            Err(JdiError::AbsentInformation) => {
                debug!(depth, "frame compiled without a variable table");
                self.absent_info = true;
            }
            Err(err) => return Err(err.into()),
        }
        // LIFO stack: reversed push keeps root order, with each root's
        // field closure running before the next root.
        roots.reverse();
        self.stack.extend(roots);
        Ok(())
    }

    fn push_static_roots(&mut self, type_id: TypeId) -> MappingResult<()> {
        let info = self.jdi.type_info(type_id)?;
        if !info.is_prepared {
            return Ok(());
        }
        let policy_name = self.policy_name(&info)?;
        if self.limiter.skip_type(&policy_name) {
            return Ok(());
        }
        let shallow = self.limiter.shallow_type(&policy_name);
        let mut roots = Vec::new();
        if let Some(class_object) = self.jdi.class_object(type_id)? {
            self.contexts
                .record(class_object, ReferenceContext::ClassObject { type_id });
            roots.push(class_object);
        }
        for (field, value) in self.jdi.static_field_values(type_id)? {
            if self.limiter.skip_field(shallow, &field) {
                continue;
            }
            if let Some(object) = value.object_id() {
                self.contexts.record(
                    object,
                    ReferenceContext::StaticField {
                        type_id,
                        name: field.name,
                    },
                );
                roots.push(object);
            }
        }
        roots.reverse();
        self.stack.extend(roots);
        Ok(())
    }

    fn visit(&mut self, id: ObjectId) -> MappingResult<Option<TraversedObject>> {
        if !self.visited.insert(id) {
            return Ok(None);
        }
        let type_id = self.jdi.object_type(id)?;
        let info = self.jdi.type_info(type_id)?;
        let policy_name = self.policy_name(&info)?;
        if self.limiter.skip_type(&policy_name) {
            return Ok(None);
        }
        let shallow = self.limiter.shallow_type(&policy_name);
        let identity = self
            .registry
            .borrow_mut()
            .classify_reference(self.jdi, type_id)?;

        let mut children = Vec::new();
        for (field, value) in self.jdi.instance_field_values(id)? {
            if field.is_static || self.limiter.skip_field(shallow, &field) {
                continue;
            }
            if let Some(object) = value.object_id() {
                self.contexts.record(
                    object,
                    ReferenceContext::Field {
                        parent: id,
                        name: field.name,
                    },
                );
                children.push(object);
            }
        }
        let sequence = self.inspect_sequence(id, &info, shallow, &mut children)?;
        children.reverse();
        self.stack.extend(children);

        Ok(Some(TraversedObject {
            object: id,
            type_id,
            identity,
            shallow,
            sequence,
        }))
    }

    fn inspect_sequence(
        &mut self,
        id: ObjectId,
        info: &ReferenceTypeInfo,
        shallow: bool,
        children: &mut Vec<ObjectId>,
    ) -> MappingResult<Option<SequenceInfo>> {
        if let TypeTag::Array { component } = &info.tag {
            // Arrays are always deep-inspectable once past the exclusion
            // check above.
            if !self.deep_inspected.insert(id) {
                return Ok(None);
            }
            let elements = self.jdi.array_elements(id)?;
            self.push_elements(id, &elements, children);
            return Ok(Some(SequenceInfo {
                elements,
                component: Some(component.clone()),
            }));
        }
        if !self.is_iterable(info.id)? {
            return Ok(None);
        }
        if self.limiter.skip_sequence(shallow, self.contexts.of(id)) {
            return Ok(None);
        }
        if !self.deep_inspected.insert(id) {
            return Ok(None);
        }
        // The remote invocation briefly resumes the thread; frames are
        // re-fetched per depth rather than cached, so no handle held here
        // can go stale.
        match self.jdi.iterate_elements(self.thread, id) {
            Ok(elements) => {
                self.push_elements(id, &elements, children);
                Ok(Some(SequenceInfo {
                    elements,
                    component: None,
                }))
            }
            Err(err @ JdiError::Disconnected) => Err(err.into()),
            Err(err) => {
                warn!(object = id, error = %err, "remote iterator failed; skipping elements");
                Ok(None)
            }
        }
    }

    fn push_elements(&mut self, parent: ObjectId, elements: &[Value], children: &mut Vec<ObjectId>) {
        for value in elements {
            if let Some(object) = value.object_id() {
                self.contexts
                    .record(object, ReferenceContext::SequenceElement { parent });
                children.push(object);
            }
        }
    }

    fn policy_name(&self, info: &ReferenceTypeInfo) -> MappingResult<String> {
        policy_name(self.jdi, info)
    }

    fn is_iterable(&self, type_id: TypeId) -> MappingResult<bool> {
        let mut pending = vec![TypeDescriptor::Reference(type_id)];
        let mut seen = HashSet::new();
        while let Some(descriptor) = pending.pop() {
            match descriptor {
                TypeDescriptor::Primitive(_) => {}
                TypeDescriptor::Unprepared(name) => {
                    if name == ITERABLE {
                        return Ok(true);
                    }
                }
                TypeDescriptor::Reference(id) => {
                    if !seen.insert(id) {
                        continue;
                    }
                    let info = self.jdi.type_info(id)?;
                    if info.name == ITERABLE {
                        return Ok(true);
                    }
                    pending.extend(self.jdi.supertypes(id)?);
                }
            }
        }
        Ok(false)
    }
}

/// The binary name the limiter policies apply to. Arrays follow their
/// (innermost) component type.
pub(crate) fn policy_name(jdi: &dyn Jdi, info: &ReferenceTypeInfo) -> MappingResult<String> {
    match &info.tag {
        TypeTag::Array { component } => component_policy_name(jdi, component),
        _ => Ok(info.name.clone()),
    }
}

pub(crate) fn component_policy_name(
    jdi: &dyn Jdi,
    descriptor: &TypeDescriptor,
) -> MappingResult<String> {
    match descriptor {
        TypeDescriptor::Primitive(kind) => Ok(kind.name().to_owned()),
        TypeDescriptor::Unprepared(name) => Ok(name.clone()),
        TypeDescriptor::Reference(id) => {
            let info = jdi.type_info(*id)?;
            policy_name(jdi, &info)
        }
    }
}

impl Iterator for HeapTraversal<'_> {
    type Item = MappingResult<TraversedObject>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(id) = self.stack.pop() {
                match self.visit(id) {
                    Ok(Some(object)) => return Some(Ok(object)),
                    Ok(None) => continue,
                    Err(err) => {
                        self.done = true;
                        return Some(Err(err));
                    }
                }
            }
            match self.refill() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::MappingSettings;
    use javert_jdi::{
        FieldInfo, MockFrame, MockJvm, MockObject, MockThread, MockType, SourceLocation,
        VariableInfo,
    };

    fn field(name: &str, declaring: TypeId) -> FieldInfo {
        FieldInfo {
            name: name.to_owned(),
            declaring_type: declaring,
            declared_type: TypeDescriptor::Reference(declaring),
            is_static: false,
            access: javert_jdi::AccessModifier::Public,
            line: None,
        }
    }

    fn variable(name: &str) -> VariableInfo {
        VariableInfo {
            name: name.to_owned(),
            declared_type: TypeDescriptor::Unprepared("java.lang.Object".to_owned()),
            scope_start: 0,
        }
    }

    fn frame_at(type_id: TypeId, this: Option<ObjectId>, variables: Vec<(VariableInfo, Value)>) -> MockFrame {
        MockFrame {
            location: SourceLocation {
                type_id,
                method: "run".to_owned(),
                line: 10,
            },
            this_object: this,
            variables: Some(variables),
        }
    }

    fn walk(jvm: &MockJvm, settings: MappingSettings) -> (Vec<ObjectId>, bool) {
        let registry = RefCell::new(TypeRegistry::new());
        let limiter = MappingLimiter::new(settings);
        let mut traversal = HeapTraversal::new(jvm, &registry, &limiter, 1);
        let mut ids = Vec::new();
        for item in &mut traversal {
            ids.push(item.unwrap().object);
        }
        let absent = traversal.encountered_absent_info();
        (ids, absent)
    }

    #[test]
    fn self_referencing_object_terminates_and_is_emitted_once() {
        let jvm = MockJvm::new();
        let mut ty = MockType::class("pkg.Node");
        ty.fields = vec![field("next", 1)];
        jvm.add_type(1, ty);
        let mut obj = MockObject::new(1);
        obj.fields = vec![("next".to_owned(), Value::Object(100))];
        jvm.add_object(100, obj);
        jvm.add_thread(
            1,
            MockThread {
                frames: vec![frame_at(1, None, vec![(variable("a"), Value::Object(100))])],
            },
        );

        let (ids, _) = walk(&jvm, MappingSettings::default());
        assert_eq!(ids, vec![100]);
    }

    #[test]
    fn shared_object_is_visited_once() {
        let jvm = MockJvm::new();
        let mut holder = MockType::class("pkg.Holder");
        holder.fields = vec![field("target", 1)];
        jvm.add_type(1, holder);
        jvm.add_type(2, MockType::class("pkg.Leaf"));

        let mut a = MockObject::new(1);
        a.fields = vec![("target".to_owned(), Value::Object(300))];
        let mut b = MockObject::new(1);
        b.fields = vec![("target".to_owned(), Value::Object(300))];
        jvm.add_object(100, a);
        jvm.add_object(200, b);
        jvm.add_object(300, MockObject::new(2));
        jvm.add_thread(
            1,
            MockThread {
                frames: vec![frame_at(
                    1,
                    None,
                    vec![
                        (variable("a"), Value::Object(100)),
                        (variable("b"), Value::Object(200)),
                    ],
                )],
            },
        );

        let (ids, _) = walk(&jvm, MappingSettings::default());
        assert_eq!(ids.iter().filter(|&&id| id == 300).count(), 1);
        // Root-first with closure: a, a.target, then b.
        assert_eq!(ids, vec![100, 300, 200]);
    }

    #[test]
    fn iterable_elements_are_drained_exactly_once() {
        let jvm = MockJvm::new();
        jvm.add_type(10, MockType::interface("java.lang.Iterable"));
        let mut list = MockType::class("pkg.Bag");
        list.supertypes = vec![TypeDescriptor::Reference(10)];
        jvm.add_type(1, list);
        jvm.add_type(2, MockType::class("pkg.Leaf"));

        let mut bag = MockObject::new(1);
        bag.iterable = Some(Ok(vec![Value::Object(200), Value::Object(201)]));
        jvm.add_object(100, bag);
        jvm.add_object(200, MockObject::new(2));
        jvm.add_object(201, MockObject::new(2));
        jvm.add_thread(
            1,
            MockThread {
                frames: vec![frame_at(
                    1,
                    None,
                    vec![
                        (variable("bag"), Value::Object(100)),
                        (variable("again"), Value::Object(100)),
                    ],
                )],
            },
        );

        let (ids, _) = walk(&jvm, MappingSettings::default());
        assert_eq!(ids, vec![100, 200, 201]);
        assert_eq!(jvm.iterator_invocations(), 1);
    }

    #[test]
    fn failing_iterator_skips_elements_but_not_the_container() {
        let jvm = MockJvm::new();
        jvm.add_type(10, MockType::interface("java.lang.Iterable"));
        let mut list = MockType::class("pkg.Bag");
        list.supertypes = vec![TypeDescriptor::Reference(10)];
        jvm.add_type(1, list);

        let mut bag = MockObject::new(1);
        bag.iterable = Some(Err("debuggee threw".to_owned()));
        jvm.add_object(100, bag);
        jvm.add_thread(
            1,
            MockThread {
                frames: vec![frame_at(1, None, vec![(variable("bag"), Value::Object(100))])],
            },
        );

        let (ids, _) = walk(&jvm, MappingSettings::default());
        assert_eq!(ids, vec![100]);
    }

    #[test]
    fn excluded_types_are_neither_emitted_nor_traversed() {
        let jvm = MockJvm::new();
        let mut hidden = MockType::class("com.secret.Vault");
        hidden.fields = vec![field("leak", 2)];
        jvm.add_type(1, hidden);
        jvm.add_type(2, MockType::class("pkg.Leaf"));

        let mut vault = MockObject::new(1);
        vault.fields = vec![("leak".to_owned(), Value::Object(200))];
        jvm.add_object(100, vault);
        jvm.add_object(200, MockObject::new(2));
        jvm.add_thread(
            1,
            MockThread {
                frames: vec![frame_at(1, None, vec![(variable("v"), Value::Object(100))])],
            },
        );

        let (ids, _) = walk(
            &jvm,
            MappingSettings {
                excluded_prefixes: vec!["com.secret.".to_owned()],
                ..Default::default()
            },
        );
        assert!(ids.is_empty());
    }

    #[test]
    fn shallow_types_follow_only_public_fields() {
        let jvm = MockJvm::new();
        let mut shallow = MockType::class("java.util.Box");
        let mut secret = field("hidden", 2);
        secret.access = javert_jdi::AccessModifier::Private;
        shallow.fields = vec![field("open", 2), secret];
        jvm.add_type(1, shallow);
        jvm.add_type(2, MockType::class("pkg.Leaf"));

        let mut boxed = MockObject::new(1);
        boxed.fields = vec![
            ("open".to_owned(), Value::Object(200)),
            ("hidden".to_owned(), Value::Object(201)),
        ];
        jvm.add_object(100, boxed);
        jvm.add_object(200, MockObject::new(2));
        jvm.add_object(201, MockObject::new(2));
        jvm.add_thread(
            1,
            MockThread {
                frames: vec![frame_at(1, None, vec![(variable("b"), Value::Object(100))])],
            },
        );

        let (ids, _) = walk(
            &jvm,
            MappingSettings {
                shallow_prefixes: vec!["java.".to_owned()],
                ..Default::default()
            },
        );
        assert_eq!(ids, vec![100, 200]);
    }

    #[test]
    fn missing_variable_table_sets_the_aggregate_flag() {
        let jvm = MockJvm::new();
        jvm.add_type(1, MockType::class("pkg.Main"));
        jvm.add_thread(
            1,
            MockThread {
                frames: vec![MockFrame {
                    location: SourceLocation {
                        type_id: 1,
                        method: "run".to_owned(),
                        line: 10,
                    },
                    this_object: None,
                    variables: None,
                }],
            },
        );

        let (ids, absent) = walk(&jvm, MappingSettings::default());
        assert!(ids.is_empty());
        assert!(absent);
    }

    #[test]
    fn static_fields_are_roots_after_the_stack() {
        let jvm = MockJvm::new();
        let mut holder = MockType::class("pkg.Holder");
        let mut instance = field("INSTANCE", 1);
        instance.is_static = true;
        holder.fields = vec![instance];
        holder.static_values = vec![("INSTANCE".to_owned(), Value::Object(500))];
        jvm.add_type(1, holder);
        jvm.add_type(2, MockType::class("pkg.Leaf"));
        jvm.add_object(500, MockObject::new(2));
        jvm.add_thread(1, MockThread { frames: vec![] });

        let (ids, _) = walk(&jvm, MappingSettings::default());
        assert_eq!(ids, vec![500]);
    }
}
