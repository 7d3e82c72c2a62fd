//! Runtime-object facts: one `run:` individual per traversed object.

use std::cell::RefCell;
use std::collections::HashSet;

use javert_facts::vocab::{java, owl, prog, rdf, rdfs, run};
use javert_facts::{Literal, Node, TripleCollector};
use javert_jdi::{Jdi, ObjectId, TypeDescriptor};

use crate::error::MappingResult;
use crate::identity::TypeRegistry;
use crate::mappers::{primitive_literal, value_node, Mapper, MappingContext};
use crate::traversal::{policy_name, HeapTraversal, SequenceInfo};

const OBJECT_COMPONENT: &str = "java.lang.Object";

/// Runs the heap traversal and emits, per object: identity and type
/// facts, field-value edges, plain values for strings and boxed
/// primitives, and the generic sequence encoding shared by arrays and
/// iterables. Static field values of prepared types follow at the end.
pub struct ObjectMapper;

impl Mapper for ObjectMapper {
    fn name(&self) -> &'static str {
        "object"
    }

    fn map(&self, ctx: &mut MappingContext<'_>) -> MappingResult<()> {
        let jdi = ctx.jdi;
        let registry = ctx.registry;
        let limiter = ctx.limiter;
        let mut components = HashSet::new();

        let mut traversal = HeapTraversal::new(jdi, registry, limiter, ctx.state.thread);
        for item in &mut traversal {
            let object = item?;
            map_object(ctx, &object, &mut components)?;
        }
        ctx.diagnostics.absent_info |= traversal.encountered_absent_info();

        map_static_values(ctx)?;
        Ok(())
    }
}

fn fact(collector: &mut TripleCollector, subject: &Node, predicate: &str, object: Node) {
    collector.add(subject.clone(), Node::named(predicate), object);
}

fn map_object(
    ctx: &mut MappingContext<'_>,
    traversed: &crate::traversal::TraversedObject,
    components: &mut HashSet<String>,
) -> MappingResult<()> {
    let id = traversed.object;
    let subject = Node::named(run::object_name(id));
    fact(ctx.collector, &subject, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
    fact(ctx.collector, &subject, rdf::TYPE, Node::named(java::OBJECT));
    fact(
        ctx.collector,
        &subject,
        rdf::TYPE,
        Node::named(prog::type_name(traversed.identity.as_str())),
    );
    fact(
        ctx.collector,
        &subject,
        java::HAS_JDWP_OBJECT_ID,
        Literal::long(id as i64).into(),
    );

    for (field, value) in ctx.jdi.instance_field_values(id)? {
        if field.is_static || ctx.limiter.skip_field(traversed.shallow, &field) {
            continue;
        }
        let declaring = ctx
            .registry
            .borrow_mut()
            .classify_reference(ctx.jdi, field.declaring_type)?;
        fact(
            ctx.collector,
            &subject,
            &prog::field_name(declaring.as_str(), &field.name),
            value_node(&value),
        );
    }

    if let Some(text) = ctx.jdi.string_value(id)? {
        fact(
            ctx.collector,
            &subject,
            java::HAS_PLAIN_VALUE,
            Literal::string(text).into(),
        );
    }
    if let Some(boxed) = ctx.jdi.boxed_value(id)? {
        if let Some(literal) = primitive_literal(&boxed) {
            fact(ctx.collector, &subject, java::HAS_PLAIN_VALUE, literal.into());
        }
    }

    if let Some(sequence) = &traversed.sequence {
        map_sequence(ctx, &subject, id, sequence, components)?;
    }
    Ok(())
}

/// The shared container encoding: an exact element-count restriction, a
/// `run:` individual per index linked into a successor chain whose last
/// element carries a zero-successor restriction, and a closed
/// enumeration of exactly the elements that exist.
fn map_sequence(
    ctx: &mut MappingContext<'_>,
    subject: &Node,
    id: ObjectId,
    sequence: &SequenceInfo,
    components: &mut HashSet<String>,
) -> MappingResult<()> {
    let component = component_identity(ctx.jdi, ctx.registry, sequence)?;
    let is_primitive = matches!(sequence.component, Some(TypeDescriptor::Primitive(_)));
    let element_property = prog::typed_has_element(&component);
    let element_class = prog::typed_sequence_element(&component);
    let store_property = if is_primitive {
        prog::typed_stores_primitive(&component)
    } else {
        prog::typed_stores_reference(&component)
    };

    // Sub-vocabulary per component type, once per query.
    if components.insert(component.clone()) {
        let property_node = Node::named(element_property.as_str());
        fact(ctx.collector, &property_node, rdf::TYPE, Node::named(owl::OBJECT_PROPERTY));
        fact(
            ctx.collector,
            &property_node,
            rdfs::SUB_PROPERTY_OF,
            Node::named(java::HAS_ELEMENT),
        );
        let class_node = Node::named(element_class.as_str());
        fact(ctx.collector, &class_node, rdf::TYPE, Node::named(owl::CLASS));
        fact(
            ctx.collector,
            &class_node,
            rdfs::SUB_CLASS_OF,
            Node::named(java::SEQUENCE_ELEMENT),
        );
        let store_node = Node::named(store_property.as_str());
        let (kind, base) = if is_primitive {
            (owl::DATATYPE_PROPERTY, java::STORES_PRIMITIVE)
        } else {
            (owl::OBJECT_PROPERTY, java::STORES_REFERENCE)
        };
        fact(ctx.collector, &store_node, rdf::TYPE, Node::named(kind));
        fact(ctx.collector, &store_node, rdfs::SUB_PROPERTY_OF, Node::named(base));
    }

    let count = sequence.elements.len();
    let count_restriction = ctx.collector.object_cardinality(
        Node::named(element_property.as_str()),
        Node::named(element_class.as_str()),
        count as u64,
    );
    fact(ctx.collector, subject, rdf::TYPE, count_restriction);

    let mut element_nodes = Vec::with_capacity(count);
    for (index, value) in sequence.elements.iter().enumerate() {
        let element = Node::named(run::sequence_element_name(id, index));
        fact(
            ctx.collector,
            subject,
            element_property.as_str(),
            element.clone(),
        );
        fact(ctx.collector, &element, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
        fact(
            ctx.collector,
            &element,
            rdf::TYPE,
            Node::named(element_class.as_str()),
        );
        fact(
            ctx.collector,
            &element,
            java::HAS_INDEX,
            Literal::non_negative(index as u64).into(),
        );
        fact(
            ctx.collector,
            &element,
            store_property.as_str(),
            value_node(value),
        );
        if index + 1 < count {
            fact(
                ctx.collector,
                &element,
                java::HAS_SUCCESSOR,
                Node::named(run::sequence_element_name(id, index + 1)),
            );
        } else {
            let terminal = ctx.collector.object_cardinality(
                Node::named(java::HAS_SUCCESSOR),
                Node::named(element_class.as_str()),
                0,
            );
            fact(ctx.collector, &element, rdf::TYPE, terminal);
        }
        element_nodes.push(element);
    }

    // Exactly these elements, no others.
    let enumeration = ctx.collector.one_of(element_nodes);
    let closure = ctx
        .collector
        .all_values_from(Node::named(element_property.as_str()), enumeration);
    fact(ctx.collector, subject, rdf::TYPE, closure);
    Ok(())
}

fn component_identity(
    jdi: &dyn Jdi,
    registry: &RefCell<TypeRegistry>,
    sequence: &SequenceInfo,
) -> MappingResult<String> {
    match &sequence.component {
        Some(descriptor) => Ok(registry
            .borrow_mut()
            .classify(jdi, descriptor)?
            .as_str()
            .to_owned()),
        None => Ok(OBJECT_COMPONENT.to_owned()),
    }
}

/// Static field values, emitted against the punned type individual.
fn map_static_values(ctx: &mut MappingContext<'_>) -> MappingResult<()> {
    for type_id in ctx.jdi.reference_types() {
        let info = ctx.jdi.type_info(type_id)?;
        if !info.is_prepared {
            continue;
        }
        let policy = policy_name(ctx.jdi, &info)?;
        if ctx.limiter.skip_type(&policy) {
            continue;
        }
        let shallow = ctx.limiter.shallow_type(&policy);
        let identity = ctx
            .registry
            .borrow_mut()
            .classify_reference(ctx.jdi, type_id)?;
        let subject = Node::named(prog::type_name(identity.as_str()));
        for (field, value) in ctx.jdi.static_field_values(type_id)? {
            if ctx.limiter.skip_field(shallow, &field) {
                continue;
            }
            let declaring = ctx
                .registry
                .borrow_mut()
                .classify_reference(ctx.jdi, field.declaring_type)?;
            fact(
                ctx.collector,
                &subject,
                &prog::field_name(declaring.as_str(), &field.name),
                value_node(&value),
            );
        }
    }
    Ok(())
}
