//! Canonical type identities.
//!
//! Binary names alone are ambiguous: two loaders may load the same name,
//! and an unprepared type must never be confused with a loaded one. The
//! registry derives a collision-free string per type, memoized for the
//! session's lifetime.
//!
//! Identity grammar:
//!
//! - top-level type: `Name`, `SysLoader~Name`, or `Loader<id>~Name`
//!   depending on the defining loader
//! - member class `Outer$Inner`: `<outer identity>.Inner`
//! - anonymous class `Outer$1`: `<outer identity>.anon-1`
//! - local class `Outer$1Inner`: `<outer identity>.local-1-Inner`
//! - array: `<component identity>[]`
//! - unprepared: `NotYetLoaded~<binary name>`

use std::collections::HashMap;
use std::fmt;

use javert_jdi::{Jdi, ReferenceTypeInfo, TypeDescriptor, TypeId, TypeTag};
use smol_str::SmolStr;
use tracing::warn;

use crate::error::MappingResult;

pub const UNPREPARED_PREFIX: &str = "NotYetLoaded~";

/// Canonical, collision-free name of a type, stable for one session.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeIdentity(SmolStr);

impl TypeIdentity {
    fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for TypeIdentity {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

enum NestedKind<'a> {
    Member(&'a str),
    Anonymous(&'a str),
    Local { number: &'a str, name: &'a str },
}

/// Memoizing identity derivation over the loaded type universe.
pub struct TypeRegistry {
    cache: HashMap<TypeId, TypeIdentity>,
    /// Nested type -> directly enclosing type, built once on first use
    /// from every loaded type's nested-type listing.
    enclosing: Option<HashMap<TypeId, TypeId>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn classify(
        &mut self,
        jdi: &dyn Jdi,
        descriptor: &TypeDescriptor,
    ) -> MappingResult<TypeIdentity> {
        match descriptor {
            TypeDescriptor::Primitive(kind) => Ok(TypeIdentity::new(kind.name())),
            TypeDescriptor::Unprepared(name) => Ok(Self::unprepared(name)),
            TypeDescriptor::Reference(id) => self.classify_reference(jdi, *id),
        }
    }

    /// Identity of a type known by binary name only. Never collides with
    /// the identity of a loaded type of the same name.
    pub fn unprepared(name: &str) -> TypeIdentity {
        TypeIdentity::new(format!("{UNPREPARED_PREFIX}{name}"))
    }

    pub fn classify_reference(&mut self, jdi: &dyn Jdi, id: TypeId) -> MappingResult<TypeIdentity> {
        if let Some(identity) = self.cache.get(&id) {
            return Ok(identity.clone());
        }
        let info = jdi.type_info(id)?;
        let identity = if !info.is_prepared {
            Self::unprepared(&info.name)
        } else {
            match info.tag.clone() {
                TypeTag::Array { component } => {
                    let component = self.classify(jdi, &component)?;
                    TypeIdentity::new(format!("{component}[]"))
                }
                TypeTag::Class | TypeTag::Interface => self.classify_named(jdi, &info)?,
            }
        };
        self.cache.insert(id, identity.clone());
        Ok(identity)
    }

    fn classify_named(
        &mut self,
        jdi: &dyn Jdi,
        info: &ReferenceTypeInfo,
    ) -> MappingResult<TypeIdentity> {
        let Some(enclosing_id) = self.enclosing_of(jdi, info.id) else {
            return Ok(top_level(jdi, info));
        };
        let outer_name = jdi.type_info(enclosing_id)?.name;
        let outer = self.classify_reference(jdi, enclosing_id)?;
        let identity = match nested_suffix(&outer_name, &info.name) {
            Some(NestedKind::Member(name)) => TypeIdentity::new(format!("{outer}.{name}")),
            Some(NestedKind::Anonymous(number)) => {
                TypeIdentity::new(format!("{outer}.anon-{number}"))
            }
            Some(NestedKind::Local { number, name }) => {
                TypeIdentity::new(format!("{outer}.local-{number}-{name}"))
            }
            None => {
                warn!(
                    name = %info.name,
                    enclosing = %outer_name,
                    "unrecognized nesting pattern; using the raw type name"
                );
                top_level(jdi, info)
            }
        };
        Ok(identity)
    }

    fn enclosing_of(&mut self, jdi: &dyn Jdi, id: TypeId) -> Option<TypeId> {
        let map = self.enclosing.get_or_insert_with(|| {
            let mut map = HashMap::new();
            for outer in jdi.reference_types() {
                for nested in jdi.nested_types(outer).unwrap_or_default() {
                    map.insert(nested, outer);
                }
            }
            map
        });
        map.get(&id).copied()
    }
}

fn top_level(jdi: &dyn Jdi, info: &ReferenceTypeInfo) -> TypeIdentity {
    match info.loader {
        None => TypeIdentity::new(info.name.as_str()),
        Some(loader) if Some(loader) == jdi.system_class_loader() => {
            TypeIdentity::new(format!("SysLoader~{}", info.name))
        }
        Some(loader) => TypeIdentity::new(format!("Loader{loader}~{}", info.name)),
    }
}

/// Splits a nested type's raw name against its enclosing type's raw name
/// into one of the three compiler naming patterns. `None` means the
/// pattern is unrecognized (synthetic members, lambda classes).
fn nested_suffix<'a>(outer_raw: &str, inner_raw: &'a str) -> Option<NestedKind<'a>> {
    let suffix = inner_raw.strip_prefix(outer_raw)?.strip_prefix('$')?;
    if suffix.is_empty() || suffix.contains('$') {
        return None;
    }
    let split = suffix
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(suffix.len());
    let (number, name) = suffix.split_at(split);
    match (number.is_empty(), name.is_empty()) {
        (false, true) => Some(NestedKind::Anonymous(number)),
        (false, false) => Some(NestedKind::Local { number, name }),
        (true, false) => Some(NestedKind::Member(name)),
        (true, true) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use javert_jdi::{MockJvm, MockType};

    #[test]
    fn loader_prefixes_distinguish_same_binary_name() {
        let jvm = MockJvm::new();
        jvm.set_system_loader(Some(7));
        let mut bootstrap = MockType::class("pkg.A");
        bootstrap.loader = None;
        let mut system = MockType::class("pkg.A");
        system.loader = Some(7);
        let mut custom = MockType::class("pkg.A");
        custom.loader = Some(9);
        jvm.add_type(1, bootstrap);
        jvm.add_type(2, system);
        jvm.add_type(3, custom);

        let mut registry = TypeRegistry::new();
        assert_eq!(registry.classify_reference(&jvm, 1).unwrap().as_str(), "pkg.A");
        assert_eq!(
            registry.classify_reference(&jvm, 2).unwrap().as_str(),
            "SysLoader~pkg.A"
        );
        assert_eq!(
            registry.classify_reference(&jvm, 3).unwrap().as_str(),
            "Loader9~pkg.A"
        );
    }

    #[test]
    fn nested_classification_covers_member_anonymous_and_local() {
        let jvm = MockJvm::new();
        let mut outer = MockType::class("pkg.Outer");
        outer.nested = vec![2, 3, 4];
        jvm.add_type(1, outer);
        jvm.add_type(2, MockType::class("pkg.Outer$Inner"));
        jvm.add_type(3, MockType::class("pkg.Outer$1"));
        jvm.add_type(4, MockType::class("pkg.Outer$2Handler"));

        let mut registry = TypeRegistry::new();
        assert_eq!(
            registry.classify_reference(&jvm, 2).unwrap().as_str(),
            "pkg.Outer.Inner"
        );
        assert_eq!(
            registry.classify_reference(&jvm, 3).unwrap().as_str(),
            "pkg.Outer.anon-1"
        );
        assert_eq!(
            registry.classify_reference(&jvm, 4).unwrap().as_str(),
            "pkg.Outer.local-2-Handler"
        );
    }

    #[test]
    fn unparseable_nesting_falls_back_to_raw_name() {
        let jvm = MockJvm::new();
        let mut outer = MockType::class("pkg.Outer");
        outer.nested = vec![2];
        jvm.add_type(1, outer);
        jvm.add_type(2, MockType::class("pkg.Outer$$Lambda$17"));

        let mut registry = TypeRegistry::new();
        assert_eq!(
            registry.classify_reference(&jvm, 2).unwrap().as_str(),
            "pkg.Outer$$Lambda$17"
        );
    }

    #[test]
    fn array_identity_follows_component() {
        use javert_jdi::{PrimitiveKind, TypeDescriptor};

        let jvm = MockJvm::new();
        jvm.add_type(1, MockType::class("pkg.Elem"));
        jvm.add_type(
            2,
            MockType::array("pkg.Elem[]", TypeDescriptor::Reference(1)),
        );
        jvm.add_type(
            3,
            MockType::array("int[]", TypeDescriptor::Primitive(PrimitiveKind::Int)),
        );

        let mut registry = TypeRegistry::new();
        assert_eq!(
            registry.classify_reference(&jvm, 2).unwrap().as_str(),
            "pkg.Elem[]"
        );
        assert_eq!(registry.classify_reference(&jvm, 3).unwrap().as_str(), "int[]");
    }

    #[test]
    fn classification_is_memoized_and_stable() {
        let jvm = MockJvm::new();
        jvm.add_type(1, MockType::class("pkg.A"));

        let mut registry = TypeRegistry::new();
        let first = registry.classify_reference(&jvm, 1).unwrap();
        let second = registry.classify_reference(&jvm, 1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unprepared_identity_never_collides_with_a_loaded_type() {
        let jvm = MockJvm::new();
        let mut ghost = MockType::class("pkg.A");
        ghost.prepared = false;
        jvm.add_type(1, MockType::class("pkg.A"));
        jvm.add_type(2, ghost);

        let mut registry = TypeRegistry::new();
        let loaded = registry.classify_reference(&jvm, 1).unwrap();
        let unprepared = registry.classify_reference(&jvm, 2).unwrap();
        assert_eq!(unprepared.as_str(), "NotYetLoaded~pkg.A");
        assert_ne!(loaded, unprepared);
    }
}
