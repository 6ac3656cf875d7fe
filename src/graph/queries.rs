//! Catalog of named example queries over the triple model.
//!
//! Queries are written against the predeclared prefixes and match the
//! hierarchy predicate generically (`?term ?hierarchy ?domain . ?domain a
//! cs:Domain`), so they work whatever predicate a layer overrides.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExampleQuery {
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub sparql: &'static str,
}

const CATALOG: &[ExampleQuery] = &[
    ExampleQuery {
        name: "count_all_entities",
        category: "basic",
        description: "Number of layers, domains and terms",
        sparql: "SELECT ?type (COUNT(?entity) AS ?count) WHERE {
    ?entity a ?type .
    FILTER(?type IN (cs:Layer, cs:Domain, cs:Term))
}
GROUP BY ?type
ORDER BY DESC(?count) ?type",
    },
    ExampleQuery {
        name: "list_all_layers",
        category: "basic",
        description: "Every layer with its definition and hierarchy predicate",
        sparql: "SELECT ?layer ?title ?definition ?predicate WHERE {
    ?layer a cs:Layer ; rdfs:label ?title .
    OPTIONAL { ?layer rdfs:comment ?definition }
    OPTIONAL { ?layer cs:primaryPredicate ?predicate }
}
ORDER BY ?title",
    },
    ExampleQuery {
        name: "list_domains_with_layers",
        category: "basic",
        description: "Every domain next to its owning layer",
        sparql: "SELECT ?domain ?domainTitle ?layer ?layerTitle WHERE {
    ?domain a cs:Domain ; rdfs:label ?domainTitle ; ?hierarchy ?layer .
    ?layer a cs:Layer ; rdfs:label ?layerTitle .
}
ORDER BY ?layerTitle ?domainTitle",
    },
    ExampleQuery {
        name: "find_term_hierarchy",
        category: "hierarchy",
        description: "Child/parent term pairs",
        sparql: "SELECT ?child ?parent ?childLabel ?parentLabel WHERE {
    ?child skos:broader ?parent .
    ?child rdfs:label ?childLabel .
    ?parent rdfs:label ?parentLabel .
}
ORDER BY ?parentLabel ?childLabel",
    },
    ExampleQuery {
        name: "find_root_terms",
        category: "hierarchy",
        description: "Terms without a parent term",
        sparql: "SELECT ?term ?title WHERE {
    ?term a cs:Term ; rdfs:label ?title .
    FILTER NOT EXISTS { ?term skos:broader ?parent }
}
ORDER BY ?title",
    },
    ExampleQuery {
        name: "find_leaf_terms",
        category: "hierarchy",
        description: "Terms without child terms",
        sparql: "SELECT ?term ?title WHERE {
    ?term a cs:Term ; rdfs:label ?title .
    FILTER NOT EXISTS { ?child skos:broader ?term }
}
ORDER BY ?title",
    },
    ExampleQuery {
        name: "domain_term_counts",
        category: "analytics",
        description: "Number of terms in each domain",
        sparql: "SELECT ?domain ?title (COUNT(?term) AS ?terms) WHERE {
    ?domain a cs:Domain ; rdfs:label ?title .
    OPTIONAL { ?term a cs:Term ; ?hierarchy ?domain . }
}
GROUP BY ?domain ?title
ORDER BY DESC(?terms) ?title",
    },
    ExampleQuery {
        name: "list_term_relationships",
        category: "relationships",
        description: "User-defined links between terms",
        sparql: "SELECT ?source ?sourceTitle ?relation ?target ?targetTitle WHERE {
    ?source a cs:Term ; rdfs:label ?sourceTitle ; ?relation ?target .
    ?target a cs:Term ; rdfs:label ?targetTitle .
    FILTER(?relation NOT IN (skos:broader, skos:narrower))
    FILTER NOT EXISTS {
        ?source skos:broader ?target ; ?relation ?domain .
        ?domain a cs:Domain .
    }
}
ORDER BY ?sourceTitle ?relation ?targetTitle",
    },
    ExampleQuery {
        name: "relationship_predicate_usage",
        category: "relationships",
        description: "How often each relationship predicate is used",
        sparql: "SELECT ?relation (COUNT(*) AS ?uses) WHERE {
    ?source a cs:Term ; ?relation ?target .
    ?target a cs:Term .
    FILTER(?relation NOT IN (skos:broader, skos:narrower))
    FILTER NOT EXISTS {
        ?source skos:broader ?target ; ?relation ?domain .
        ?domain a cs:Domain .
    }
}
GROUP BY ?relation
ORDER BY DESC(?uses) ?relation",
    },
    ExampleQuery {
        name: "entity_versions",
        category: "analytics",
        description: "Version number of every entity",
        sparql: "SELECT ?entity ?type ?title ?version WHERE {
    ?entity a ?type ; rdfs:label ?title ; cs:version ?version .
}
ORDER BY DESC(?version) ?title",
    },
];

/// Every example query, in catalog order.
pub fn example_queries() -> &'static [ExampleQuery] {
    CATALOG
}

pub fn example_query(name: &str) -> Option<&'static ExampleQuery> {
    CATALOG.iter().find(|q| q.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::graph::sparql::{Scalar, TripleGraph};
    use crate::snapshot::fixtures::{relationship, scenario};

    fn graph() -> TripleGraph {
        TripleGraph::build(&scenario(), &GraphConfig::default()).unwrap()
    }

    #[test]
    fn every_example_runs() {
        let graph = graph();
        for query in example_queries() {
            let rows = graph.query(query.sparql);
            assert!(rows.is_ok(), "{} failed: {:?}", query.name, rows.err());
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = example_queries().iter().map(|q| q.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), example_queries().len());
    }

    #[test]
    fn root_and_leaf_terms() {
        let graph = graph();
        let roots = graph
            .query(example_query("find_root_terms").unwrap().sparql)
            .unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].get("title"), Some(&Scalar::Text("Root Term".into())));

        let leaves = graph
            .query(example_query("find_leaf_terms").unwrap().sparql)
            .unwrap();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].get("title"), Some(&Scalar::Text("Child Term".into())));
    }

    #[test]
    fn relationships_exclude_hierarchy() {
        let graph = graph();
        let rows = graph
            .query(example_query("list_term_relationships").unwrap().sparql)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].get("relation").and_then(Scalar::as_str),
            Some("http://context-studio.local/vocab/relates_to")
        );
    }

    #[test]
    fn relationships_to_a_parent_term_are_listed() {
        let mut snapshot = scenario();
        snapshot
            .term_relationships
            .push(relationship("R2", "T2", "T1", "depends_on"));
        let graph = TripleGraph::build(&snapshot, &GraphConfig::default()).unwrap();

        let rows = graph
            .query(example_query("list_term_relationships").unwrap().sparql)
            .unwrap();
        let relations: Vec<&str> = rows
            .iter()
            .filter_map(|r| r.get("relation").and_then(Scalar::as_str))
            .collect();
        assert_eq!(
            relations,
            [
                "http://context-studio.local/vocab/depends_on",
                "http://context-studio.local/vocab/relates_to",
            ]
        );

        let usage = graph
            .query(example_query("relationship_predicate_usage").unwrap().sparql)
            .unwrap();
        assert_eq!(usage.len(), 2);
        assert!(usage.iter().all(|r| r.get("uses") == Some(&Scalar::Integer(1))));
    }

    #[test]
    fn domain_term_counts_include_all_terms() {
        let graph = graph();
        let rows = graph
            .query(example_query("domain_term_counts").unwrap().sparql)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("terms"), Some(&Scalar::Integer(2)));
    }
}
