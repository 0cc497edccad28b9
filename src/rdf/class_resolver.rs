//! Resolves an OWL class-expression node to the concrete class URIs it
//! denotes (§4.E `ClassResolver`).

use std::collections::HashSet;

use oxigraph::model::vocab::rdf;
use oxigraph::model::{NamedNode, NamedOrBlankNode, Subject, Term};
use oxigraph::store::Store;

const MAX_DEPTH: usize = 10;

fn owl(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://www.w3.org/2002/07/owl#{local}"))
}

fn rdf_node(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://www.w3.org/1999/02/22-rdf-syntax-ns#{local}"))
}

/// Resolves class-expression nodes — plain URIs, `unionOf`/`intersectionOf`/
/// `complementOf`/`oneOf`, and restrictions nested inside them — to the set
/// of named classes they denote.
pub struct ClassResolver<'a> {
    store: &'a Store,
}

impl<'a> ClassResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Resolve `node` to the list of class URIs it denotes.
    pub fn resolve(&self, node: &NamedOrBlankNode) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.resolve_inner(node, 0, &mut visited, &mut out);
        out
    }

    fn resolve_inner(
        &self,
        node: &NamedOrBlankNode,
        depth: usize,
        visited: &mut HashSet<NamedOrBlankNode>,
        out: &mut Vec<String>,
    ) {
        if depth > MAX_DEPTH || !visited.insert(node.clone()) {
            return;
        }

        if let NamedOrBlankNode::NamedNode(named) = node {
            out.push(named.as_str().to_string());
        }

        for local in ["unionOf", "intersectionOf", "oneOf"] {
            if let Some(list_head) = self.object_of(node, &owl(local)) {
                self.walk_rdf_list(&list_head, depth + 1, visited, out);
            }
        }

        if let Some(complement) = self.object_of(node, &owl("complementOf")) {
            if let Term::NamedNode(n) = complement {
                self.resolve_inner(&NamedOrBlankNode::NamedNode(n), depth + 1, visited, out);
            } else if let Term::BlankNode(b) = complement {
                self.resolve_inner(&NamedOrBlankNode::BlankNode(b), depth + 1, visited, out);
            }
        }

        if let Some(restriction_class) = self.object_of(node, &owl("onClass")) {
            self.resolve_term(restriction_class, depth + 1, visited, out);
        }
        if let Some(restriction_class) = self.object_of(node, &owl("someValuesFrom")) {
            self.resolve_term(restriction_class, depth + 1, visited, out);
        }
    }

    fn resolve_term(
        &self,
        term: Term,
        depth: usize,
        visited: &mut HashSet<NamedOrBlankNode>,
        out: &mut Vec<String>,
    ) {
        match term {
            Term::NamedNode(n) => self.resolve_inner(&NamedOrBlankNode::NamedNode(n), depth, visited, out),
            Term::BlankNode(b) => self.resolve_inner(&NamedOrBlankNode::BlankNode(b), depth, visited, out),
            _ => {}
        }
    }

    fn object_of(&self, subject: &NamedOrBlankNode, predicate: &NamedNode) -> Option<Term> {
        let subject_node: Subject = subject.clone().into();
        self.store
            .quads_for_pattern(Some((&subject_node).into()), Some(predicate.into()), None, None)
            .next()
            .and_then(|q| q.ok())
            .map(|q| q.object)
    }

    /// Traverse an RDF list (`rdf:first`/`rdf:rest`) of class-expression
    /// nodes, breaking list cycles independently of the class-expression
    /// visited-set.
    fn walk_rdf_list(
        &self,
        head: &Term,
        depth: usize,
        visited: &mut HashSet<NamedOrBlankNode>,
        out: &mut Vec<String>,
    ) {
        let mut list_visited = HashSet::new();
        let mut current = head.clone();
        loop {
            let node = match &current {
                Term::NamedNode(n) => NamedOrBlankNode::NamedNode(n.clone()),
                Term::BlankNode(b) => NamedOrBlankNode::BlankNode(b.clone()),
                _ => break,
            };
            if !list_visited.insert(node.clone()) {
                break;
            }

            if let Some(first) = self.object_of(&node, &rdf_node("first")) {
                self.resolve_term(first, depth, visited, out);
            }

            match self.object_of(&node, &rdf_node("rest")) {
                Some(Term::NamedNode(n)) if n.as_str() == rdf::NIL.as_str() => break,
                Some(next) => current = next,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::io::RdfFormat;

    fn store_from_turtle(ttl: &str) -> Store {
        let store = Store::new().unwrap();
        store.load_from_reader(RdfFormat::Turtle, ttl.as_bytes()).unwrap();
        store
    }

    #[test]
    fn resolves_a_plain_named_class() {
        let store = store_from_turtle("@prefix ex: <http://example.org/> . ex:Dog a ex:Class .");
        let resolver = ClassResolver::new(&store);
        let node = NamedOrBlankNode::NamedNode(NamedNode::new("http://example.org/Dog").unwrap());
        assert_eq!(resolver.resolve(&node), vec!["http://example.org/Dog".to_string()]);
    }

    #[test]
    fn resolves_union_of_two_classes() {
        let ttl = r#"
            @prefix ex: <http://example.org/> .
            @prefix owl: <http://www.w3.org/2002/07/owl#> .
            @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
            _:u owl:unionOf (ex:Cat ex:Dog) .
        "#;
        let store = store_from_turtle(ttl);
        let resolver = ClassResolver::new(&store);

        let union_subject = store
            .quads_for_pattern(None, Some((&owl("unionOf")).into()), None, None)
            .next()
            .unwrap()
            .unwrap()
            .subject;
        let union_node: NamedOrBlankNode = union_subject
            .try_into()
            .expect("unionOf subject is a named or blank node, not an RDF-star triple");
        let resolved = resolver.resolve(&union_node);

        assert!(resolved.contains(&"http://example.org/Cat".to_string()));
        assert!(resolved.contains(&"http://example.org/Dog".to_string()));
    }
}
