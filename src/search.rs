//! Lazy name searches over a loaded forest. All searches are pull-driven
//! iterators in traversal order, never ranked; a consumer that stops early
//! pays nothing for the rest.

use crate::model::{Class, Field, MappingDatabase, MappingKind, Method, Parameter};

/// The observed match rule. Order matters: the insensitive equality check
/// runs before the qualified-substring branch, so an exactly-equal qualified
/// token still matches regardless of case.
pub fn matches(name: Option<&str>, term: &str) -> bool {
    let Some(name) = name else {
        return false;
    };
    if name.eq_ignore_ascii_case(term) {
        return true;
    }
    name.contains('/') && name.contains(term)
}

fn mapping_matches(name: Option<&str>, intermediate_name: &str, term: &str) -> bool {
    matches(name, term) || matches(Some(intermediate_name), term)
}

/// Depth-first pre-order walk: each class before its children, children
/// before the next sibling, top-level classes in insertion order.
pub struct ClassWalk<'a> {
    stack: Vec<&'a Class>,
}

impl<'a> ClassWalk<'a> {
    pub fn new(classes: &'a [Class]) -> Self {
        Self {
            stack: classes.iter().rev().collect(),
        }
    }
}

impl<'a> Iterator for ClassWalk<'a> {
    type Item = &'a Class;

    fn next(&mut self) -> Option<Self::Item> {
        let class = self.stack.pop()?;
        self.stack.extend(class.child_classes.iter().rev());
        Some(class)
    }
}

/// One combined-search result, category-tagged, owner included.
#[derive(Debug, Clone, Copy)]
pub enum SearchHit<'a> {
    Field(&'a Field, &'a Class),
    Method(&'a Method, &'a Class),
    Parameter(&'a Parameter, &'a Method),
    Class(&'a Class),
}

impl SearchHit<'_> {
    pub fn kind(&self) -> MappingKind {
        match self {
            SearchHit::Field(..) => MappingKind::Field,
            SearchHit::Method(..) => MappingKind::Method,
            SearchHit::Parameter(..) => MappingKind::Parameter,
            SearchHit::Class(..) => MappingKind::Class,
        }
    }
}

impl MappingDatabase {
    pub fn search_field<'a>(
        &'a self,
        term: &'a str,
    ) -> impl Iterator<Item = (&'a Field, &'a Class)> + 'a {
        ClassWalk::new(&self.classes).flat_map(move |class| {
            class
                .fields
                .iter()
                .filter(move |f| mapping_matches(f.name.as_deref(), &f.intermediate_name, term))
                .map(move |f| (f, class))
        })
    }

    pub fn search_method<'a>(
        &'a self,
        term: &'a str,
    ) -> impl Iterator<Item = (&'a Method, &'a Class)> + 'a {
        ClassWalk::new(&self.classes).flat_map(move |class| {
            class
                .methods
                .iter()
                .filter(move |m| mapping_matches(m.name.as_deref(), &m.intermediate_name, term))
                .map(move |m| (m, class))
        })
    }

    pub fn search_parameters<'a>(
        &'a self,
        term: &'a str,
    ) -> impl Iterator<Item = (&'a Parameter, &'a Method)> + 'a {
        ClassWalk::new(&self.classes)
            .flat_map(|class| class.methods.iter())
            .flat_map(move |method| {
                method
                    .parameters
                    .iter()
                    .filter(move |p| {
                        mapping_matches(p.name.as_deref(), &p.intermediate_name, term)
                    })
                    .map(move |p| (p, method))
            })
    }

    pub fn search_classes<'a>(&'a self, term: &'a str) -> impl Iterator<Item = &'a Class> + 'a {
        ClassWalk::new(&self.classes)
            .filter(move |c| mapping_matches(c.name.as_deref(), &c.intermediate_name, term))
    }

    /// Combined search, one lazy sequence ordered by category:
    /// fields, then methods, then parameters, then classes.
    pub fn search_all<'a>(&'a self, term: &'a str) -> impl Iterator<Item = SearchHit<'a>> + 'a {
        self.search_field(term)
            .map(|(f, c)| SearchHit::Field(f, c))
            .chain(self.search_method(term).map(|(m, c)| SearchHit::Method(m, c)))
            .chain(
                self.search_parameters(term)
                    .map(|(p, m)| SearchHit::Parameter(p, m)),
            )
            .chain(self.search_classes(term).map(SearchHit::Class))
    }
}

/// Forward-only pagination over a live search sequence. Page N+1 comes from
/// continuing to pull the same sequence; restarting means re-running the
/// query from the top.
pub struct Paged<I: Iterator> {
    inner: I,
    page_size: usize,
}

impl<I: Iterator> Paged<I> {
    pub fn new(inner: I, page_size: usize) -> Self {
        Self { inner, page_size }
    }

    pub fn next_page(&mut self) -> Vec<I::Item> {
        self.inner.by_ref().take(self.page_size).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Field, Method, Parameter, Side};

    fn field(intermediate: &str, name: Option<&str>) -> Field {
        Field {
            original_name: None,
            intermediate_name: intermediate.to_string(),
            name: name.map(str::to_string),
            description: None,
            side: Side::Both,
        }
    }

    fn sample_db() -> MappingDatabase {
        let mut outer = Class::unresolved(Some("a".to_string()), "net/bar/Foo".to_string());
        outer.fields.push(field("field_1", Some("Foo")));
        outer.fields.push(field("field_2", None));
        let mut method = Method::unresolved(None, "func_9_a".to_string(), "()V".to_string(), false);
        method.name = Some("foo".to_string());
        method.parameters.push(Parameter {
            original_name: None,
            intermediate_name: "p_9_1_".to_string(),
            name: Some("foo".to_string()),
            description: None,
            side: Side::Both,
        });
        outer.methods.push(method);

        let mut inner = Class::unresolved(Some("a$b".to_string()), "net/bar/Foo$Inner".to_string());
        inner.fields.push(field("field_3", Some("foo")));
        outer.child_classes.push(inner);

        let sibling = Class::unresolved(Some("c".to_string()), "net/baz/Other".to_string());

        MappingDatabase {
            mc_version: "1.16.1".to_string(),
            snapshot: "test".to_string(),
            classes: vec![outer, sibling],
        }
    }

    #[test]
    fn simple_names_match_case_insensitively() {
        assert!(matches(Some("Foo"), "foo"));
        assert!(matches(Some("foo"), "FOO"));
        assert!(!matches(Some("foo"), "fo"));
        assert!(!matches(None, "foo"));
    }

    #[test]
    fn qualified_names_match_substrings_case_sensitively() {
        assert!(matches(Some("net/bar/Foo"), "bar"));
        assert!(!matches(Some("net/bar/Foo"), "BAR"));
        // Exact equality still wins case-insensitively, even when qualified.
        assert!(matches(Some("net/bar/Foo"), "net/bar/foo"));
    }

    #[test]
    fn field_search_pairs_leaves_with_owning_class() {
        let db = sample_db();
        let hits: Vec<_> = db.search_field("foo").collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.intermediate_name, "field_1");
        assert_eq!(hits[0].1.intermediate_name, "net/bar/Foo");
        // Depth-first: the nested class comes before the next sibling.
        assert_eq!(hits[1].0.intermediate_name, "field_3");
        assert_eq!(hits[1].1.intermediate_name, "net/bar/Foo$Inner");
    }

    #[test]
    fn parameter_search_pairs_leaves_with_owning_method() {
        let db = sample_db();
        let hits: Vec<_> = db.search_parameters("foo").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.intermediate_name, "p_9_1_");
        assert_eq!(hits[0].1.intermediate_name, "func_9_a");
    }

    #[test]
    fn combined_search_is_category_ordered() {
        let db = sample_db();
        let kinds: Vec<MappingKind> = db.search_all("foo").map(|h| h.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                MappingKind::Field,
                MappingKind::Field,
                MappingKind::Method,
                MappingKind::Parameter,
            ]
        );
    }

    #[test]
    fn qualified_class_search_hits_by_substring() {
        let db = sample_db();
        let hits: Vec<_> = db.search_classes("bar").collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].intermediate_name, "net/bar/Foo");
        assert_eq!(hits[1].intermediate_name, "net/bar/Foo$Inner");
        assert_eq!(db.search_classes("BAR").count(), 0);
    }

    #[test]
    fn pagination_is_forward_only_with_no_skips_or_duplicates() {
        let items = 0..12;
        let mut paged = Paged::new(items, 5);
        assert_eq!(paged.next_page(), vec![0, 1, 2, 3, 4]);
        assert_eq!(paged.next_page(), vec![5, 6, 7, 8, 9]);
        assert_eq!(paged.next_page(), vec![10, 11]);
        assert!(paged.next_page().is_empty());
    }
}
