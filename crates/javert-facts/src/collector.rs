use std::collections::BTreeSet;

use crate::model::{Literal, Node, Triple, TriplePattern};
use crate::vocab::{owl, rdf};

/// Collects the triples of one pattern query.
///
/// Every candidate fact produced by the mapping layers is offered through
/// [`TripleCollector::add`]; only facts matching the bound pattern are kept.
/// Compound logical constructs (lists, unions, enumerations, restrictions)
/// are encoded through anonymous nodes allocated freshly per invocation —
/// construct identity is deliberately not stable across queries.
pub struct TripleCollector {
    pattern: TriplePattern,
    triples: BTreeSet<Triple>,
    next_blank: u64,
}

impl TripleCollector {
    pub fn new(pattern: TriplePattern) -> Self {
        Self {
            pattern,
            triples: BTreeSet::new(),
            next_blank: 0,
        }
    }

    pub fn add(&mut self, subject: Node, predicate: Node, object: Node) {
        let candidate = Triple::new(subject, predicate, object);
        if self.pattern.matches(&candidate) {
            self.triples.insert(candidate);
        }
    }

    pub fn fresh_blank(&mut self) -> Node {
        let node = Node::Blank(self.next_blank);
        self.next_blank += 1;
        node
    }

    /// Encodes an ordered list; the empty list is `rdf:nil`.
    pub fn rdf_list(&mut self, items: Vec<Node>) -> Node {
        let mut tail = Node::named(rdf::NIL);
        for item in items.into_iter().rev() {
            let cell = self.fresh_blank();
            self.add(cell.clone(), Node::named(rdf::TYPE), Node::named(rdf::LIST));
            self.add(cell.clone(), Node::named(rdf::FIRST), item);
            self.add(cell.clone(), Node::named(rdf::REST), tail);
            tail = cell;
        }
        tail
    }

    /// A closed enumeration: the class containing exactly the given
    /// individuals.
    pub fn one_of(&mut self, individuals: Vec<Node>) -> Node {
        let node = self.fresh_blank();
        // Consumers will not recognize the enumeration without the explicit
        // class declaration.
        self.add(node.clone(), Node::named(rdf::TYPE), Node::named(owl::CLASS));
        let list = self.rdf_list(individuals);
        self.add(node.clone(), Node::named(owl::ONE_OF), list);
        node
    }

    pub fn union_of(&mut self, classes: Vec<Node>) -> Node {
        let node = self.fresh_blank();
        self.add(node.clone(), Node::named(rdf::TYPE), Node::named(owl::CLASS));
        let list = self.rdf_list(classes);
        self.add(node.clone(), Node::named(owl::UNION_OF), list);
        node
    }

    pub fn all_values_from(&mut self, property: Node, class: Node) -> Node {
        let node = self.fresh_blank();
        self.add(
            node.clone(),
            Node::named(rdf::TYPE),
            Node::named(owl::RESTRICTION),
        );
        self.add(node.clone(), Node::named(owl::ON_PROPERTY), property);
        self.add(node.clone(), Node::named(owl::ALL_VALUES_FROM), class);
        node
    }

    /// Restriction requiring exactly `count` values of `on_class` through
    /// `property`.
    pub fn object_cardinality(&mut self, property: Node, on_class: Node, count: u64) -> Node {
        let node = self.fresh_blank();
        self.add(
            node.clone(),
            Node::named(rdf::TYPE),
            Node::named(owl::RESTRICTION),
        );
        self.add(node.clone(), Node::named(owl::ON_PROPERTY), property);
        self.add(node.clone(), Node::named(owl::ON_CLASS), on_class);
        self.add(
            node.clone(),
            Node::named(owl::CARDINALITY),
            Literal::non_negative(count).into(),
        );
        node
    }

    pub fn pattern(&self) -> &TriplePattern {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn into_triples(self) -> Vec<Triple> {
        self.triples.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_matching_triples_are_kept() {
        let pattern = TriplePattern::any().with_predicate(Node::named(rdf::TYPE));
        let mut collector = TripleCollector::new(pattern);

        collector.add(
            Node::named("run:object_1"),
            Node::named(rdf::TYPE),
            Node::named("java:Object"),
        );
        collector.add(
            Node::named("run:object_1"),
            Node::named("java:hasJDWPObjectId"),
            Literal::long(1).into(),
        );

        let triples = collector.into_triples();
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].predicate, Node::named(rdf::TYPE));
    }

    #[test]
    fn constructs_allocate_fresh_anonymous_nodes() {
        let mut collector = TripleCollector::new(TriplePattern::any());
        let first = collector.one_of(vec![Node::named("a")]);
        let second = collector.one_of(vec![Node::named("a")]);
        assert_ne!(first, second);
    }

    #[test]
    fn empty_list_is_nil() {
        let mut collector = TripleCollector::new(TriplePattern::any());
        assert_eq!(collector.rdf_list(Vec::new()), Node::named(rdf::NIL));
        assert!(collector.is_empty());
    }

    #[test]
    fn list_cells_chain_in_order() {
        let mut collector = TripleCollector::new(TriplePattern::any());
        let head = collector.rdf_list(vec![Node::named("a"), Node::named("b")]);
        let triples = collector.into_triples();

        let first = triples
            .iter()
            .find(|t| t.subject == head && t.predicate == Node::named(rdf::FIRST))
            .unwrap();
        assert_eq!(first.object, Node::named("a"));

        let rest = triples
            .iter()
            .find(|t| t.subject == head && t.predicate == Node::named(rdf::REST))
            .unwrap();
        let second = triples
            .iter()
            .find(|t| t.subject == rest.object && t.predicate == Node::named(rdf::FIRST))
            .unwrap();
        assert_eq!(second.object, Node::named("b"));
    }
}
