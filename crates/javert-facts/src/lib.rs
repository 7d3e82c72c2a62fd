//! Fact-model primitives for javert.
//!
//! A "fact" is a (subject, predicate, object) triple over named nodes,
//! anonymous (blank) nodes, and typed literals. Facts are never
//! materialized into a persistent store: a [`TripleCollector`] is bound to
//! one [`TriplePattern`] and keeps only the candidate triples that match
//! it, which is what makes pattern-driven on-demand mapping cheap.

mod collector;
mod model;
pub mod vocab;

pub use collector::TripleCollector;
pub use model::{Literal, Node, Triple, TriplePattern, XsdType};
