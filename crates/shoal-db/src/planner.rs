use shoal_query::TypedValue;

use crate::resolver::{FieldClass, ResolvedFilter};

/// How candidate rows are produced before the predicate runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    /// Walk every row in key order.
    Scan,
    /// Walk the index entries of one fully backfilled field.
    IndexEq { field: String, value: TypedValue },
}

/// The full predicate always runs on every candidate, so the access path
/// only affects cost, never the result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub access: Access,
    pub predicate: ResolvedFilter,
    pub limit: Option<usize>,
}

/// Pick an index for the first clause on a completely backfilled field,
/// preferring unique fields. Clauses on pending or undeclared fields cannot
/// use an index: some rows would be missing from it.
pub fn plan(predicate: ResolvedFilter, limit: Option<usize>) -> Plan {
    let indexable = || {
        predicate
            .clauses
            .iter()
            .filter(|c| c.class == FieldClass::Indexed)
    };
    let chosen = indexable()
        .find(|c| c.unique)
        .or_else(|| indexable().next());

    let access = match chosen {
        Some(clause) => Access::IndexEq {
            field: clause.field.clone(),
            value: clause.value.clone(),
        },
        None => Access::Scan,
    };

    Plan {
        access,
        predicate,
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolvedClause;

    fn clause(field: &str, class: FieldClass, unique: bool) -> ResolvedClause {
        ResolvedClause {
            field: field.to_string(),
            value: TypedValue::String("x".into()),
            class,
            unique,
        }
    }

    fn filter(clauses: Vec<ResolvedClause>) -> ResolvedFilter {
        ResolvedFilter { clauses }
    }

    fn is_index_on(plan: &Plan, expected: &str) -> bool {
        matches!(&plan.access, Access::IndexEq { field, .. } if field == expected)
    }

    #[test]
    fn indexed_field_uses_index() {
        let p = plan(filter(vec![clause("name", FieldClass::Indexed, false)]), None);
        assert!(is_index_on(&p, "name"));
    }

    #[test]
    fn pending_field_falls_back_to_scan() {
        let p = plan(
            filter(vec![clause("prop", FieldClass::PendingReindex, false)]),
            None,
        );
        assert_eq!(p.access, Access::Scan);
    }

    #[test]
    fn unindexed_field_falls_back_to_scan() {
        let p = plan(filter(vec![clause("prop", FieldClass::Unindexed, false)]), None);
        assert_eq!(p.access, Access::Scan);
    }

    #[test]
    fn indexed_clause_is_used_alongside_pending_clause() {
        let p = plan(
            filter(vec![
                clause("prop", FieldClass::PendingReindex, false),
                clause("name", FieldClass::Indexed, false),
            ]),
            Some(10),
        );
        assert!(is_index_on(&p, "name"));
        assert_eq!(p.predicate.clauses.len(), 2);
        assert_eq!(p.limit, Some(10));
    }

    #[test]
    fn unique_index_is_preferred() {
        let p = plan(
            filter(vec![
                clause("name", FieldClass::Indexed, false),
                clause("uuid", FieldClass::Indexed, true),
            ]),
            None,
        );
        assert!(is_index_on(&p, "uuid"));
    }
}
