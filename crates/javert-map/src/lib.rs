//! Maps a suspended JVM's runtime state to a lazily-queried fact graph.
//!
//! The pieces, bottom up: [`TypeRegistry`] derives canonical,
//! collision-free identities for loaded types; [`MappingLimiter`] scopes
//! what gets mapped; [`HeapTraversal`] enumerates every reachable live
//! object exactly once; the three built-in [`Mapper`]s emit program
//! structure, runtime objects, and stack frames as triples; and
//! [`StateFactModel`] answers triple-pattern queries by running the
//! mappers against a pattern-bound collector, computing only what each
//! query needs.

mod contexts;
mod error;
mod identity;
mod limiter;
mod mappers;
mod model;
mod traversal;

pub use contexts::{ReferenceContext, ReferenceContexts};
pub use error::{MappingError, MappingResult};
pub use identity::{TypeIdentity, TypeRegistry};
pub use limiter::{MappingLimiter, MappingSettings};
pub use mappers::{ClassMapper, Diagnostics, Mapper, MappingContext, ObjectMapper, StackMapper};
pub use model::{QueryResult, StateFactModel, VmState};
pub use traversal::{HeapTraversal, SequenceInfo, TraversedObject};
