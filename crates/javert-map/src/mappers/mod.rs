//! Fact mappers.
//!
//! A mapper turns one slice of the suspended VM into triples: loaded
//! types, the traversed heap, or the paused thread's stack. All mappers
//! run in full for every pattern query; the collector drops what the
//! pattern does not ask for. Mapping is pure with respect to the
//! suspended state, so re-running against an unchanged state reproduces
//! the same facts.
//!
//! Everything a mapper touches travels in the explicit [`MappingContext`];
//! no ambient state is consulted.

mod class;
mod object;
mod stack;

use std::cell::RefCell;

use javert_facts::{Literal, Node, TripleCollector};
use javert_facts::vocab::{java, run};
use javert_jdi::{Jdi, Value};

use crate::error::MappingResult;
use crate::identity::TypeRegistry;
use crate::limiter::MappingLimiter;
use crate::model::VmState;

pub use class::ClassMapper;
pub use object::ObjectMapper;
pub use stack::StackMapper;

/// Soft findings of one query, reported alongside the facts.
#[derive(Debug, Default, Clone, Copy)]
pub struct Diagnostics {
    /// Some frame or method lacked debug information.
    pub absent_info: bool,
}

pub struct MappingContext<'a> {
    pub jdi: &'a dyn Jdi,
    pub collector: &'a mut TripleCollector,
    pub state: &'a VmState,
    pub registry: &'a RefCell<TypeRegistry>,
    pub limiter: &'a MappingLimiter,
    pub diagnostics: &'a mut Diagnostics,
}

pub trait Mapper {
    fn name(&self) -> &'static str;
    fn map(&self, ctx: &mut MappingContext<'_>) -> MappingResult<()>;
}

/// The graph node a debuggee value maps to: `java:null`, a typed
/// literal, or the object's `run:` individual.
pub(crate) fn value_node(value: &Value) -> Node {
    match primitive_literal(value) {
        Some(literal) => literal.into(),
        None => match value {
            Value::Object(id) => Node::named(run::object_name(*id)),
            _ => Node::named(java::NULL),
        },
    }
}

pub(crate) fn primitive_literal(value: &Value) -> Option<Literal> {
    match *value {
        Value::Boolean(v) => Some(Literal::boolean(v)),
        Value::Byte(v) => Some(Literal::byte(v)),
        Value::Short(v) => Some(Literal::short(v)),
        Value::Int(v) => Some(Literal::int(v)),
        Value::Long(v) => Some(Literal::long(v)),
        Value::Float(v) => Some(Literal::float(v)),
        Value::Double(v) => Some(Literal::double(v)),
        Value::Char(v) => Some(Literal::unsigned_short(v)),
        Value::Null | Value::Object(_) => None,
    }
}
