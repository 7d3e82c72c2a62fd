//! Mapping scope policy.
//!
//! The limiter answers three questions at every traversal and mapping
//! step: is this type excluded outright, is it shallow (surface facts
//! only), and may this container's elements be deep-inspected. Decisions
//! are plain string-prefix checks over binary names plus a name
//! allow-list; the predicates are total.

use javert_jdi::{AccessModifier, FieldInfo, MethodInfo};

use crate::contexts::ReferenceContext;

#[derive(Clone, Debug, Default)]
pub struct MappingSettings {
    /// Package prefixes excluded entirely: matching types are never
    /// emitted nor traversed.
    pub excluded_prefixes: Vec<String>,
    /// Package prefixes mapped shallowly: only public members, no deep
    /// element inspection unless reached through an allow-listed name.
    pub shallow_prefixes: Vec<String>,
    /// Variable and field names whose referents are deep-inspected even
    /// when their type is shallow.
    pub deep_names: Vec<String>,
}

pub struct MappingLimiter {
    settings: MappingSettings,
}

impl MappingLimiter {
    pub fn new(settings: MappingSettings) -> Self {
        Self { settings }
    }

    /// Whether a type with this binary name is excluded. Array types are
    /// checked through their component's name by the caller.
    pub fn skip_type(&self, binary_name: &str) -> bool {
        matches_prefix(&self.settings.excluded_prefixes, binary_name)
    }

    pub fn shallow_type(&self, binary_name: &str) -> bool {
        matches_prefix(&self.settings.shallow_prefixes, binary_name)
    }

    /// Shallow types keep only their public fields.
    pub fn skip_field(&self, shallow: bool, field: &FieldInfo) -> bool {
        shallow && !matches!(field.access, AccessModifier::Public)
    }

    pub fn skip_method(&self, shallow: bool, method: &MethodInfo) -> bool {
        shallow && !matches!(method.access, AccessModifier::Public)
    }

    /// Whether a container's elements should be left uninspected.
    ///
    /// Stack-reachable containers are always eligible; field-reachable
    /// ones only when their type is not shallow or a referencing name is
    /// allow-listed.
    pub fn skip_sequence(&self, shallow: bool, contexts: &[ReferenceContext]) -> bool {
        if !shallow {
            return false;
        }
        if contexts.iter().any(ReferenceContext::is_stack) {
            return false;
        }
        !contexts
            .iter()
            .filter_map(ReferenceContext::name)
            .any(|name| self.settings.deep_names.iter().any(|deep| deep == name))
    }
}

fn matches_prefix(prefixes: &[String], name: &str) -> bool {
    prefixes.iter().any(|prefix| name.starts_with(prefix))
}
