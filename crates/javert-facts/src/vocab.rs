//! Vocabulary of the produced fact graph.
//!
//! Prefixed names are kept as plain strings: `rdf:`/`rdfs:`/`owl:` for the
//! standard vocabularies, `java:` for the language-level schema supplied by
//! the external base model, `prog:` for program structure (types, fields,
//! methods, variable declarations), `run:` for runtime individuals
//! (objects, stack frames, sequence elements), and `local:` for the
//! convenience aliases of the innermost frame.

pub mod rdf {
    pub const TYPE: &str = "rdf:type";
    pub const LIST: &str = "rdf:List";
    pub const FIRST: &str = "rdf:first";
    pub const REST: &str = "rdf:rest";
    pub const NIL: &str = "rdf:nil";
}

pub mod rdfs {
    pub const SUB_CLASS_OF: &str = "rdfs:subClassOf";
    pub const SUB_PROPERTY_OF: &str = "rdfs:subPropertyOf";
    pub const DOMAIN: &str = "rdfs:domain";
    pub const RANGE: &str = "rdfs:range";
}

pub mod owl {
    pub const THING: &str = "owl:Thing";
    pub const NOTHING: &str = "owl:Nothing";
    pub const CLASS: &str = "owl:Class";
    pub const NAMED_INDIVIDUAL: &str = "owl:NamedIndividual";
    pub const OBJECT_PROPERTY: &str = "owl:ObjectProperty";
    pub const DATATYPE_PROPERTY: &str = "owl:DatatypeProperty";
    pub const FUNCTIONAL_PROPERTY: &str = "owl:FunctionalProperty";
    pub const INVERSE_FUNCTIONAL_PROPERTY: &str = "owl:InverseFunctionalProperty";
    pub const RESTRICTION: &str = "owl:Restriction";
    pub const ON_PROPERTY: &str = "owl:onProperty";
    pub const ON_CLASS: &str = "owl:onClass";
    pub const CARDINALITY: &str = "owl:cardinality";
    pub const SOME_VALUES_FROM: &str = "owl:someValuesFrom";
    pub const ALL_VALUES_FROM: &str = "owl:allValuesFrom";
    pub const EQUIVALENT_CLASS: &str = "owl:equivalentClass";
    pub const UNION_OF: &str = "owl:unionOf";
    pub const ONE_OF: &str = "owl:oneOf";
    pub const INVERSE_OF: &str = "owl:inverseOf";
    pub const SAME_AS: &str = "owl:sameAs";
}

pub mod java {
    pub const OBJECT: &str = "java:Object";
    pub const CLASS: &str = "java:Class";
    pub const INTERFACE: &str = "java:Interface";
    pub const ARRAY: &str = "java:Array";
    pub const METHOD: &str = "java:Method";
    pub const FIELD: &str = "java:Field";
    pub const UNLOADED_TYPE: &str = "java:UnloadedType";
    pub const VARIABLE_DECLARATION: &str = "java:VariableDeclaration";
    pub const LOCATION: &str = "java:Location";
    pub const STACK_FRAME: &str = "java:StackFrame";
    pub const SEQUENCE_ELEMENT: &str = "java:SequenceElement";
    pub const PRIMITIVE_SEQUENCE_ELEMENT: &str = "java:PrimitiveSequenceElement";
    pub const OBJECT_SEQUENCE_ELEMENT: &str = "java:SequenceElement%3CObject%3E";

    pub const NULL: &str = "java:null";
    pub const THIS: &str = "java:this";

    pub const HAS_NAME: &str = "java:hasName";
    pub const HAS_METHOD: &str = "java:hasMethod";
    pub const HAS_FIELD: &str = "java:hasField";
    pub const DECLARES_VARIABLE: &str = "java:declaresVariable";
    pub const IS_DEFINED_AT: &str = "java:isDefinedAt";
    pub const IS_DECLARED_AT: &str = "java:isDeclaredAt";
    pub const IS_AT_SOURCE_PATH: &str = "java:isAtSourcePath";
    pub const IS_AT_LINE: &str = "java:isAtLine";
    pub const IS_STATIC: &str = "java:isStatic";
    pub const HAS_ACCESS_MODIFIER: &str = "java:hasAccessModifier";

    pub const HAS_ELEMENT: &str = "java:hasElement";
    pub const HAS_INDEX: &str = "java:hasIndex";
    pub const HAS_SUCCESSOR: &str = "java:hasSuccessor";
    pub const STORES_PRIMITIVE: &str = "java:storesPrimitive";
    pub const STORES_REFERENCE: &str = "java:storesReference";

    pub const IS_AT_STACK_DEPTH: &str = "java:isAtStackDepth";
    pub const HAS_JDWP_OBJECT_ID: &str = "java:hasJDWPObjectId";
    pub const HAS_PLAIN_VALUE: &str = "java:hasPlainValue";
}

/// Percent-encodes an identity string so it is safe inside a prefixed name.
///
/// Canonical type identities contain `$`, `[]`, `~`, and spaces; encoding
/// keeps node names unambiguous without a lossy replacement scheme.
pub fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'-' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Program-structure node names (`prog:` namespace).
pub mod prog {
    use super::encode_component;

    pub const JAVA_LANG_OBJECT: &str = "prog:java.lang.Object";

    pub fn type_name(identity: &str) -> String {
        format!("prog:{}", encode_component(identity))
    }

    pub fn field_name(type_identity: &str, field: &str) -> String {
        format!("prog:{}.{}", encode_component(type_identity), encode_component(field))
    }

    pub fn method_name(type_identity: &str, method: &str) -> String {
        format!(
            "prog:{}.-{}",
            encode_component(type_identity),
            encode_component(method)
        )
    }

    pub fn variable_name(type_identity: &str, method: &str, variable: &str) -> String {
        format!(
            "prog:{}.-{}.{}",
            encode_component(type_identity),
            encode_component(method),
            encode_component(variable)
        )
    }

    pub fn location_name(type_identity: &str, method: &str) -> String {
        format!(
            "prog:location-{}.-{}",
            encode_component(type_identity),
            encode_component(method)
        )
    }

    pub fn typed_has_element(component_identity: &str) -> String {
        format!("prog:hasElement%3C{}%3E", encode_component(component_identity))
    }

    pub fn typed_sequence_element(component_identity: &str) -> String {
        format!(
            "prog:SequenceElement%3C{}%3E",
            encode_component(component_identity)
        )
    }

    pub fn typed_stores_primitive(component_identity: &str) -> String {
        format!(
            "prog:storesPrimitive%3C{}%3E",
            encode_component(component_identity)
        )
    }

    pub fn typed_stores_reference(component_identity: &str) -> String {
        format!(
            "prog:storesReference%3C{}%3E",
            encode_component(component_identity)
        )
    }
}

/// Runtime-individual node names (`run:` namespace).
pub mod run {
    pub fn object_name(object_id: u64) -> String {
        format!("run:object_{object_id}")
    }

    pub fn frame_name(depth: usize) -> String {
        format!("run:frame_{depth}")
    }

    pub fn sequence_element_name(object_id: u64, index: usize) -> String {
        format!("run:element_{object_id}_{index}")
    }
}

/// Innermost-frame aliases (`local:` namespace).
pub mod local {
    use super::encode_component;

    pub const THIS: &str = "local:this";

    pub fn variable_name(variable: &str) -> String {
        format!("local:{}", encode_component(variable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_escapes_identity_metacharacters() {
        assert_eq!(encode_component("java.lang.Object"), "java.lang.Object");
        assert_eq!(encode_component("int[]"), "int%5B%5D");
        assert_eq!(
            encode_component("SysLoader~pkg.Outer$Inner"),
            "SysLoader~pkg.Outer%24Inner"
        );
    }

    #[test]
    fn distinct_identities_never_collide_after_encoding() {
        // `$` must not be encoded to something a raw name could contain.
        let a = prog::type_name("pkg.A$B");
        let b = prog::type_name("pkg.A%24B");
        assert_ne!(a, b);
    }
}
