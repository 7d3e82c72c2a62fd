//! Program-structure facts: one `prog:` subgraph per loaded type.

use std::collections::HashSet;

use javert_facts::vocab::{java, owl, prog, rdf, rdfs};
use javert_facts::{Literal, Node};
use javert_jdi::{FieldInfo, MethodInfo, ReferenceTypeInfo, TypeDescriptor, TypeTag};

use crate::error::MappingResult;
use crate::identity::{TypeIdentity, UNPREPARED_PREFIX};
use crate::mappers::{Mapper, MappingContext};
use crate::traversal::policy_name;

/// Maps every loaded, prepared, non-excluded reference type: its kind,
/// name, access modifier, declared members, and direct supertype edges.
/// Types known only by name (unprepared supertypes, field types) get a
/// minimal stub, once per query.
pub struct ClassMapper;

impl Mapper for ClassMapper {
    fn name(&self) -> &'static str {
        "class"
    }

    fn map(&self, ctx: &mut MappingContext<'_>) -> MappingResult<()> {
        let mut stubbed = HashSet::new();
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
            map_type(ctx, &info, shallow, &mut stubbed)?;
        }
        Ok(())
    }
}

fn fact(ctx: &mut MappingContext<'_>, subject: &Node, predicate: &str, object: Node) {
    ctx.collector
        .add(subject.clone(), Node::named(predicate), object);
}

fn map_type(
    ctx: &mut MappingContext<'_>,
    info: &ReferenceTypeInfo,
    shallow: bool,
    stubbed: &mut HashSet<String>,
) -> MappingResult<()> {
    let identity = ctx
        .registry
        .borrow_mut()
        .classify_reference(ctx.jdi, info.id)?;
    let subject = Node::named(prog::type_name(identity.as_str()));

    // Punning: the type is both a class and an individual.
    fact(ctx, &subject, rdf::TYPE, Node::named(owl::CLASS));
    fact(ctx, &subject, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
    let kind = match &info.tag {
        TypeTag::Class => java::CLASS,
        TypeTag::Interface => java::INTERFACE,
        TypeTag::Array { .. } => java::ARRAY,
    };
    fact(ctx, &subject, rdf::TYPE, Node::named(kind));
    fact(
        ctx,
        &subject,
        java::HAS_NAME,
        Literal::string(info.name.as_str()).into(),
    );
    fact(
        ctx,
        &subject,
        java::HAS_ACCESS_MODIFIER,
        Literal::string(info.access.name()).into(),
    );
    if let Some(path) = &info.source_path {
        fact(
            ctx,
            &subject,
            java::IS_AT_SOURCE_PATH,
            Literal::string(path.as_str()).into(),
        );
    }

    for descriptor in ctx.jdi.supertypes(info.id)? {
        let super_identity = ctx.registry.borrow_mut().classify(ctx.jdi, &descriptor)?;
        stub_unprepared(ctx, &super_identity, stubbed);
        fact(
            ctx,
            &subject,
            rdfs::SUB_CLASS_OF,
            Node::named(prog::type_name(super_identity.as_str())),
        );
    }
    if matches!(info.tag, TypeTag::Class) {
        fact(
            ctx,
            &subject,
            rdfs::SUB_CLASS_OF,
            Node::named(prog::JAVA_LANG_OBJECT),
        );
    }

    for field in ctx.jdi.fields(info.id)? {
        if field.declaring_type != info.id || ctx.limiter.skip_field(shallow, &field) {
            continue;
        }
        map_field(ctx, &subject, &identity, &field, stubbed)?;
    }
    for method in ctx.jdi.methods(info.id)? {
        if method.declaring_type != info.id || ctx.limiter.skip_method(shallow, &method) {
            continue;
        }
        map_method(ctx, &subject, &identity, &method, stubbed)?;
    }
    Ok(())
}

/// Fields double as graph properties: the field node carries its domain
/// (the declaring type) and range (the declared type), and object
/// mapping uses it as the predicate of value edges.
fn map_field(
    ctx: &mut MappingContext<'_>,
    type_node: &Node,
    type_identity: &TypeIdentity,
    field: &FieldInfo,
    stubbed: &mut HashSet<String>,
) -> MappingResult<()> {
    let node = Node::named(prog::field_name(type_identity.as_str(), &field.name));
    fact(ctx, type_node, java::HAS_FIELD, node.clone());
    fact(ctx, &node, rdf::TYPE, Node::named(java::FIELD));
    fact(ctx, &node, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
    fact(
        ctx,
        &node,
        java::HAS_NAME,
        Literal::string(field.name.as_str()).into(),
    );
    fact(
        ctx,
        &node,
        java::HAS_ACCESS_MODIFIER,
        Literal::string(field.access.name()).into(),
    );
    fact(
        ctx,
        &node,
        java::IS_STATIC,
        Literal::boolean(field.is_static).into(),
    );
    // Each object holds exactly one value per field.
    fact(ctx, &node, rdf::TYPE, Node::named(owl::FUNCTIONAL_PROPERTY));
    if field.is_static {
        // Static fields belong to the class individual itself, not its
        // instances.
        let class_only = ctx.collector.one_of(vec![type_node.clone()]);
        fact(ctx, &node, rdfs::DOMAIN, class_only);
    } else {
        fact(ctx, &node, rdfs::DOMAIN, type_node.clone());
    }
    match &field.declared_type {
        TypeDescriptor::Primitive(_) => {
            fact(ctx, &node, rdf::TYPE, Node::named(owl::DATATYPE_PROPERTY));
        }
        descriptor => {
            fact(ctx, &node, rdf::TYPE, Node::named(owl::OBJECT_PROPERTY));
            let declared = ctx.registry.borrow_mut().classify(ctx.jdi, descriptor)?;
            stub_unprepared(ctx, &declared, stubbed);
            let range = reference_or_null(ctx, Node::named(prog::type_name(declared.as_str())));
            fact(ctx, &node, rdfs::RANGE, range);
        }
    }
    if let Some(line) = field.line {
        fact(
            ctx,
            &node,
            java::IS_AT_LINE,
            Literal::non_negative(u64::from(line)).into(),
        );
    }
    Ok(())
}

fn map_method(
    ctx: &mut MappingContext<'_>,
    type_node: &Node,
    type_identity: &TypeIdentity,
    method: &MethodInfo,
    stubbed: &mut HashSet<String>,
) -> MappingResult<()> {
    let node = Node::named(prog::method_name(type_identity.as_str(), &method.name));
    fact(ctx, type_node, java::HAS_METHOD, node.clone());
    fact(ctx, &node, rdf::TYPE, Node::named(java::METHOD));
    fact(ctx, &node, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
    fact(
        ctx,
        &node,
        java::HAS_NAME,
        Literal::string(method.name.as_str()).into(),
    );
    fact(
        ctx,
        &node,
        java::HAS_ACCESS_MODIFIER,
        Literal::string(method.access.name()).into(),
    );

    if method.line.is_some() || method.source_path.is_some() {
        let location = Node::named(prog::location_name(type_identity.as_str(), &method.name));
        fact(ctx, &node, java::IS_DEFINED_AT, location.clone());
        fact(ctx, &location, rdf::TYPE, Node::named(java::LOCATION));
        if let Some(line) = method.line {
            fact(
                ctx,
                &location,
                java::IS_AT_LINE,
                Literal::non_negative(u64::from(line)).into(),
            );
        }
        if let Some(path) = &method.source_path {
            fact(
                ctx,
                &location,
                java::IS_AT_SOURCE_PATH,
                Literal::string(path.as_str()).into(),
            );
        }
    }

    for variable in &method.variables {
        let var_node = Node::named(prog::variable_name(
            type_identity.as_str(),
            &method.name,
            &variable.name,
        ));
        fact(ctx, &node, java::DECLARES_VARIABLE, var_node.clone());
        fact(
            ctx,
            &var_node,
            rdf::TYPE,
            Node::named(java::VARIABLE_DECLARATION),
        );
        fact(ctx, &var_node, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
        fact(ctx, &var_node, rdf::TYPE, Node::named(owl::FUNCTIONAL_PROPERTY));
        fact(
            ctx,
            &var_node,
            java::HAS_NAME,
            Literal::string(variable.name.as_str()).into(),
        );
        fact(
            ctx,
            &var_node,
            rdfs::DOMAIN,
            Node::named(java::STACK_FRAME),
        );
        match &variable.declared_type {
            TypeDescriptor::Primitive(_) => {
                fact(ctx, &var_node, rdf::TYPE, Node::named(owl::DATATYPE_PROPERTY));
            }
            descriptor => {
                fact(ctx, &var_node, rdf::TYPE, Node::named(owl::OBJECT_PROPERTY));
                let declared = ctx.registry.borrow_mut().classify(ctx.jdi, descriptor)?;
                stub_unprepared(ctx, &declared, stubbed);
                let range =
                    reference_or_null(ctx, Node::named(prog::type_name(declared.as_str())));
                fact(ctx, &var_node, rdfs::RANGE, range);
            }
        }
    }
    Ok(())
}

/// The range of a reference-typed property: the type itself or the
/// `java:null` individual, as an anonymous union class.
fn reference_or_null(ctx: &mut MappingContext<'_>, type_node: Node) -> Node {
    let null_class = ctx.collector.one_of(vec![Node::named(java::NULL)]);
    ctx.collector.union_of(vec![type_node, null_class])
}

/// Minimal fact set for a type known by name only, emitted at most once
/// per query.
fn stub_unprepared(
    ctx: &mut MappingContext<'_>,
    identity: &TypeIdentity,
    stubbed: &mut HashSet<String>,
) {
    let Some(name) = identity.as_str().strip_prefix(UNPREPARED_PREFIX) else {
        return;
    };
    if !stubbed.insert(identity.as_str().to_owned()) {
        return;
    }
    let name = name.to_owned();
    let subject = Node::named(prog::type_name(identity.as_str()));
    fact(ctx, &subject, rdf::TYPE, Node::named(owl::CLASS));
    fact(ctx, &subject, rdf::TYPE, Node::named(java::UNLOADED_TYPE));
    fact(
        ctx,
        &subject,
        rdfs::SUB_CLASS_OF,
        Node::named(prog::JAVA_LANG_OBJECT),
    );
    fact(ctx, &subject, java::HAS_NAME, Literal::string(name).into());
}
