use serde::Serialize;
use smol_str::SmolStr;

/// Datatypes used for literal values. The set mirrors the XML Schema
/// datatypes the Java primitive values map onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum XsdType {
    Boolean,
    Byte,
    Short,
    Int,
    /// Used for `char` values, which the transport reports as UTF-16 code
    /// units.
    UnsignedShort,
    Long,
    Float,
    Double,
    String,
    NonNegativeInteger,
}

/// A typed literal stored in canonical lexical form.
///
/// Keeping the lexical form rather than native scalars makes literals
/// totally ordered and hashable, so triples can live in ordered sets.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Literal {
    pub lexical: SmolStr,
    pub datatype: XsdType,
}

impl Literal {
    pub fn boolean(value: bool) -> Self {
        Self {
            lexical: SmolStr::new(if value { "true" } else { "false" }),
            datatype: XsdType::Boolean,
        }
    }

    pub fn byte(value: i8) -> Self {
        Self {
            lexical: SmolStr::new(value.to_string()),
            datatype: XsdType::Byte,
        }
    }

    pub fn short(value: i16) -> Self {
        Self {
            lexical: SmolStr::new(value.to_string()),
            datatype: XsdType::Short,
        }
    }

    pub fn int(value: i32) -> Self {
        Self {
            lexical: SmolStr::new(value.to_string()),
            datatype: XsdType::Int,
        }
    }

    pub fn unsigned_short(value: u16) -> Self {
        Self {
            lexical: SmolStr::new(value.to_string()),
            datatype: XsdType::UnsignedShort,
        }
    }

    pub fn long(value: i64) -> Self {
        Self {
            lexical: SmolStr::new(value.to_string()),
            datatype: XsdType::Long,
        }
    }

    pub fn float(value: f32) -> Self {
        Self {
            lexical: SmolStr::new(float_lexical(value as f64, value.is_nan())),
            datatype: XsdType::Float,
        }
    }

    pub fn double(value: f64) -> Self {
        Self {
            lexical: SmolStr::new(float_lexical(value, value.is_nan())),
            datatype: XsdType::Double,
        }
    }

    pub fn string(value: impl Into<SmolStr>) -> Self {
        Self {
            lexical: value.into(),
            datatype: XsdType::String,
        }
    }

    pub fn non_negative(value: u64) -> Self {
        Self {
            lexical: SmolStr::new(value.to_string()),
            datatype: XsdType::NonNegativeInteger,
        }
    }
}

/// XSD float/double lexical forms spell the special values `INF`, `-INF`
/// and `NaN`.
fn float_lexical(value: f64, is_nan: bool) -> String {
    if is_nan {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value < 0.0 { "-INF".to_string() } else { "INF".to_string() }
    } else {
        value.to_string()
    }
}

/// A node of the fact graph.
///
/// Blank ids are only meaningful within the collector that allocated them;
/// facts never outlive the query they were computed for, so that is enough.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Node {
    Named(SmolStr),
    Blank(u64),
    Literal(Literal),
}

impl Node {
    pub fn named(name: impl Into<SmolStr>) -> Self {
        Self::Named(name.into())
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

impl From<Literal> for Node {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Triple {
    pub subject: Node,
    pub predicate: Node,
    pub object: Node,
}

impl Triple {
    pub fn new(subject: Node, predicate: Node, object: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// A possibly-wildcarded triple query; `None` positions match anything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: Option<Node>,
    pub predicate: Option<Node>,
    pub object: Option<Node>,
}

impl TriplePattern {
    /// Matches every triple.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: Node) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_predicate(mut self, predicate: Node) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_object(mut self, object: Node) -> Self {
        self.object = Some(object);
        self
    }

    pub fn matches(&self, triple: &Triple) -> bool {
        fn position(slot: &Option<Node>, node: &Node) -> bool {
            slot.as_ref().map_or(true, |expected| expected == node)
        }

        position(&self.subject, &triple.subject)
            && position(&self.predicate, &triple.predicate)
            && position(&self.object, &triple.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_positions_filter_independently() {
        let triple = Triple::new(
            Node::named("run:object_1"),
            Node::named("rdf:type"),
            Node::named("java:Object"),
        );

        assert!(TriplePattern::any().matches(&triple));
        assert!(TriplePattern::any()
            .with_predicate(Node::named("rdf:type"))
            .matches(&triple));
        assert!(!TriplePattern::any()
            .with_subject(Node::named("run:object_2"))
            .matches(&triple));
        assert!(!TriplePattern::any()
            .with_predicate(Node::named("rdf:type"))
            .with_object(Node::named("java:StackFrame"))
            .matches(&triple));
    }

    #[test]
    fn float_literals_use_xsd_special_forms() {
        assert_eq!(Literal::double(f64::INFINITY).lexical, "INF");
        assert_eq!(Literal::double(f64::NEG_INFINITY).lexical, "-INF");
        assert_eq!(Literal::float(f32::NAN).lexical, "NaN");
        assert_eq!(Literal::double(1.5).lexical, "1.5");
    }
}
