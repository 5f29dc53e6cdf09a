use crate::domains::filters::{
    compile_any_of, compile_pages_where, matches_any, matches_spec, FilterEntry, FilterRow,
    FilterSpec, PageScope, Predicate,
};

/// Which pages a query ranges over: a session scope, specifications that are
/// all ANDed, and an optional union of entries (audit-check filter groups) of
/// which at least one must match.
///
/// Both store backends read this one description, so the SQL and in-memory
/// results agree.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSelection {
    pub scope: PageScope,
    pub filters: Vec<FilterSpec>,
    pub any_of: Option<Vec<FilterEntry>>,
}

impl PageSelection {
    pub fn new(scope: PageScope) -> Self {
        Self {
            scope,
            filters: Vec::new(),
            any_of: None,
        }
    }

    pub fn with_filters(mut self, spec: FilterSpec) -> Self {
        if !spec.is_empty() {
            self.filters.push(spec);
        }
        self
    }

    pub fn with_any_of(mut self, entries: Vec<FilterEntry>) -> Self {
        self.any_of = Some(entries);
        self
    }

    /// `None` when the union has no effective entry and nothing can match.
    pub fn predicate(&self) -> Option<Predicate> {
        let specs: Vec<&FilterSpec> = self.filters.iter().collect();
        let base = compile_pages_where(&self.scope, &specs);
        match &self.any_of {
            None => Some(base),
            Some(entries) => {
                let union = compile_any_of(entries);
                if union.is_empty() {
                    None
                } else {
                    Some(base.and(union))
                }
            }
        }
    }

    pub fn matches<R: FilterRow + ?Sized>(&self, session_id: crate::common::SessionId, row: &R) -> bool {
        self.scope.contains(session_id)
            && self.filters.iter().all(|spec| matches_spec(spec, row))
            && self
                .any_of
                .as_ref()
                .map_or(true, |entries| matches_any(entries, row))
    }
}
