//! Stack-frame facts for the paused thread, depth 0 outwards.

use javert_facts::vocab::{java, local, owl, prog, rdf, run};
use javert_facts::{Literal, Node};
use javert_jdi::{JdiError, Value};
use tracing::debug;

use crate::error::MappingResult;
use crate::mappers::{value_node, Mapper, MappingContext};

/// Emits one `run:frame_<depth>` individual per frame with its depth,
/// `this` edge, and one value edge per visible local variable, using the
/// variable's declaration as the predicate. The innermost frame gets
/// `local:` convenience aliases on top.
pub struct StackMapper;

impl Mapper for StackMapper {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn map(&self, ctx: &mut MappingContext<'_>) -> MappingResult<()> {
        let thread = ctx.state.thread;
        let depth_count = ctx.jdi.frame_count(thread)?;
        for depth in 0..depth_count {
            map_frame(ctx, depth)?;
        }
        Ok(())
    }
}

fn fact(ctx: &mut MappingContext<'_>, subject: &Node, predicate: &str, object: Node) {
    ctx.collector
        .add(subject.clone(), Node::named(predicate), object);
}

fn map_frame(ctx: &mut MappingContext<'_>, depth: usize) -> MappingResult<()> {
    let thread = ctx.state.thread;
    let frame = ctx.jdi.frame(thread, depth)?;
    let subject = Node::named(run::frame_name(depth));

    fact(ctx, &subject, rdf::TYPE, Node::named(java::STACK_FRAME));
    fact(ctx, &subject, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
    fact(
        ctx,
        &subject,
        java::IS_AT_STACK_DEPTH,
        Literal::non_negative(depth as u64).into(),
    );
    fact(
        ctx,
        &subject,
        java::IS_AT_LINE,
        Literal::non_negative(u64::from(frame.location.line)).into(),
    );

    if let Some(this) = frame.this_object {
        let this_node = Node::named(run::object_name(this));
        fact(ctx, &subject, java::THIS, this_node.clone());
        if depth == 0 {
            let alias = Node::named(local::THIS);
            fact(ctx, &alias, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
            fact(ctx, &alias, owl::SAME_AS, this_node);
        }
    }

    let declaring = ctx
        .registry
        .borrow_mut()
        .classify_reference(ctx.jdi, frame.location.type_id)?;
    match ctx.jdi.visible_variables(thread, depth) {
        Ok(variables) => {
            for (variable, value) in variables {
                let predicate = prog::variable_name(
                    declaring.as_str(),
                    &frame.location.method,
                    &variable.name,
                );
                let value_node = value_node(&value);
                fact(ctx, &subject, &predicate, value_node.clone());
                // Aliases cover references and null; primitive values have
                // no individual to alias.
                if depth == 0 && matches!(value, Value::Object(_) | Value::Null) {
                    let alias = Node::named(local::variable_name(&variable.name));
                    fact(ctx, &alias, rdf::TYPE, Node::named(owl::NAMED_INDIVIDUAL));
                    fact(ctx, &alias, owl::SAME_AS, value_node);
                }
            }
        }
        Err(JdiError::AbsentInformation) => {
            debug!(depth, "frame compiled without a variable table");
            ctx.diagnostics.absent_info = true;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
