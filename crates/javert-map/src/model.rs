//! The lazy, pattern-queried fact model.
//!
//! Nothing is materialized up front. Every [`StateFactModel::query`]
//! builds a fresh collector bound to the asked pattern, layers the base
//! schema triples onto it, and runs every registered mapper in full; the
//! collector keeps only what the pattern matches. Anonymous helper nodes
//! are allocated fresh per query, so logically equivalent constructs
//! from two queries carry distinct node identities.

use std::cell::RefCell;
use std::sync::Arc;

use javert_facts::{Triple, TripleCollector, TriplePattern};
use javert_jdi::{Jdi, ThreadId};
use tracing::{debug, error};

use crate::identity::TypeRegistry;
use crate::limiter::{MappingLimiter, MappingSettings};
use crate::mappers::{ClassMapper, Diagnostics, Mapper, MappingContext, ObjectMapper, StackMapper};

/// Where the debuggee is paused. Queries are only meaningful while the
/// thread stays suspended.
#[derive(Clone, Copy, Debug)]
pub struct VmState {
    pub thread: ThreadId,
}

impl VmState {
    pub fn new(thread: ThreadId) -> Self {
        Self { thread }
    }
}

pub struct QueryResult {
    pub triples: Vec<Triple>,
    /// Some frame lacked debug information; the answer may be missing
    /// variable facts.
    pub absent_info: bool,
}

pub struct StateFactModel {
    jdi: Arc<dyn Jdi>,
    state: VmState,
    limiter: MappingLimiter,
    /// Identity cache shared by all queries of this session.
    registry: RefCell<TypeRegistry>,
    base: Vec<Triple>,
    mappers: Vec<Box<dyn Mapper>>,
}

impl StateFactModel {
    pub fn new(jdi: Arc<dyn Jdi>, state: VmState, settings: MappingSettings) -> Self {
        Self {
            jdi,
            state,
            limiter: MappingLimiter::new(settings),
            registry: RefCell::new(TypeRegistry::new()),
            base: Vec::new(),
            mappers: vec![
                Box::new(ClassMapper),
                Box::new(ObjectMapper),
                Box::new(StackMapper),
            ],
        }
    }

    /// Schema triples the mapped facts layer onto. Parsing and format
    /// negotiation belong to the loader that produced them.
    pub fn add_base_triples(&mut self, triples: impl IntoIterator<Item = Triple>) {
        self.base.extend(triples);
    }

    /// Registers an additional mapper, run after the built-in ones.
    pub fn register_mapper(&mut self, mapper: Box<dyn Mapper>) {
        self.mappers.push(mapper);
    }

    /// Computes the facts matching `pattern` against the current
    /// suspended state.
    ///
    /// A mid-query transport failure degrades to the partial set
    /// collected so far; it never panics or poisons the model.
    pub fn query(&self, pattern: &TriplePattern) -> QueryResult {
        let mut collector = TripleCollector::new(pattern.clone());
        for triple in &self.base {
            collector.add(
                triple.subject.clone(),
                triple.predicate.clone(),
                triple.object.clone(),
            );
        }
        let mut diagnostics = Diagnostics::default();
        for mapper in &self.mappers {
            let mut ctx = MappingContext {
                jdi: self.jdi.as_ref(),
                collector: &mut collector,
                state: &self.state,
                registry: &self.registry,
                limiter: &self.limiter,
                diagnostics: &mut diagnostics,
            };
            if let Err(err) = mapper.map(&mut ctx) {
                error!(
                    mapper = mapper.name(),
                    error = %err,
                    "mapping failed; answering with partial facts"
                );
                break;
            }
        }
        debug!(matched = collector.len(), "pattern query answered");
        QueryResult {
            triples: collector.into_triples(),
            absent_info: diagnostics.absent_info,
        }
    }
}
