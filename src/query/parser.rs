/// Parser for the pipe-delimited analytic query format
///
/// A query line has three `|`-separated sections:
/// `relations|predicates|projections`, for example
/// `0 2 2|0.1=1.2&1.0=2.1&0.2>3000|0.0 1.1`.
///
/// The relation list assigns bindings by position, so the same relation id
/// may appear more than once. Predicates are `&`-separated; a predicate
/// whose right-hand side is a column reference is an equi-join, otherwise
/// it is a filter against a constant.
use crate::error::{EngineError, EngineResult};
use crate::query::plan::{Comparison, FilterInfo, PredicateInfo, SelectInfo};
use crate::storage::relation::RelationId;

/// Parsed form of one query line
#[derive(Debug, Clone, Default)]
pub struct QueryInfo {
    pub relations: Vec<RelationId>,
    pub filters: Vec<FilterInfo>,
    pub joins: Vec<PredicateInfo>,
    pub projections: Vec<SelectInfo>,
}

pub fn parse_query(text: &str) -> EngineResult<QueryInfo> {
    let mut sections = text.trim().split('|');
    let (relations, predicates, projections) = match (
        sections.next(),
        sections.next(),
        sections.next(),
        sections.next(),
    ) {
        (Some(r), Some(p), Some(s), None) => (r, p, s),
        _ => {
            return Err(parse_error(
                "expected `relations|predicates|projections`",
                text,
            ))
        }
    };

    let mut info = QueryInfo {
        relations: parse_relations(relations, text)?,
        ..QueryInfo::default()
    };
    for predicate in predicates.split('&').filter(|p| !p.trim().is_empty()) {
        parse_predicate(predicate.trim(), &mut info, text)?;
    }
    for column in projections.split_whitespace() {
        let select = parse_column_ref(column, &info.relations, text)?;
        info.projections.push(select);
    }
    if info.projections.is_empty() {
        return Err(parse_error("query projects no columns", text));
    }
    Ok(info)
}

fn parse_relations(section: &str, query: &str) -> EngineResult<Vec<RelationId>> {
    let ids: Result<Vec<RelationId>, _> = section.split_whitespace().map(str::parse).collect();
    let ids = ids.map_err(|_| parse_error("malformed relation list", query))?;
    if ids.is_empty() {
        return Err(parse_error("query references no relations", query));
    }
    Ok(ids)
}

fn parse_predicate(text: &str, info: &mut QueryInfo, query: &str) -> EngineResult<()> {
    let (op_index, comparison) = text
        .char_indices()
        .find_map(|(i, c)| match c {
            '=' => Some((i, Comparison::Equal)),
            '>' => Some((i, Comparison::Greater)),
            '<' => Some((i, Comparison::Less)),
            _ => None,
        })
        .ok_or_else(|| parse_error("predicate has no comparison operator", query))?;

    let left = parse_column_ref(&text[..op_index], &info.relations, query)?;
    let rhs = &text[op_index + 1..];
    if rhs.contains('.') {
        if comparison != Comparison::Equal {
            return Err(parse_error("join predicates must use `=`", query));
        }
        let right = parse_column_ref(rhs, &info.relations, query)?;
        info.joins.push(PredicateInfo { left, right });
    } else {
        let constant = rhs
            .trim()
            .parse()
            .map_err(|_| parse_error("malformed filter constant", query))?;
        info.filters.push(FilterInfo {
            column: left,
            constant,
            comparison,
        });
    }
    Ok(())
}

fn parse_column_ref(
    text: &str,
    relations: &[RelationId],
    query: &str,
) -> EngineResult<SelectInfo> {
    let (binding, col_id) = text
        .trim()
        .split_once('.')
        .ok_or_else(|| parse_error("expected `binding.column`", query))?;
    let binding: u32 = binding
        .parse()
        .map_err(|_| parse_error("malformed binding", query))?;
    let col_id: u32 = col_id
        .parse()
        .map_err(|_| parse_error("malformed column index", query))?;
    let rel_id = relations
        .get(binding as usize)
        .copied()
        .ok_or_else(|| parse_error("binding out of range", query))?;
    Ok(SelectInfo::new(rel_id, binding, col_id))
}

fn parse_error(message: &str, query: &str) -> EngineError {
    EngineError::parse(message, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_joins_filters_and_projections() {
        let info = parse_query("0 2 2|0.1=1.2&1.0=2.1&0.2>3000|0.0 1.1").unwrap();
        assert_eq!(info.relations, vec![0, 2, 2]);
        assert_eq!(info.joins.len(), 2);
        assert_eq!(info.filters.len(), 1);
        assert_eq!(info.projections.len(), 2);

        let join = &info.joins[0];
        assert_eq!((join.left.binding, join.left.col_id), (0, 1));
        assert_eq!((join.right.binding, join.right.col_id), (1, 2));
        assert_eq!(join.right.rel_id, 2);

        let filter = &info.filters[0];
        assert_eq!(filter.comparison, Comparison::Greater);
        assert_eq!(filter.constant, 3000);
    }

    #[test]
    fn classifies_equality_filter_vs_join() {
        let info = parse_query("0 1|0.0=1.0&0.1=42|0.0").unwrap();
        assert_eq!(info.joins.len(), 1);
        assert_eq!(info.filters.len(), 1);
        assert_eq!(info.filters[0].comparison, Comparison::Equal);
    }

    #[test]
    fn duplicate_relation_gets_distinct_bindings() {
        let info = parse_query("4 4|0.0=1.1|0.2").unwrap();
        assert_eq!(info.relations, vec![4, 4]);
        let join = &info.joins[0];
        assert_eq!(join.left.binding, 0);
        assert_eq!(join.right.binding, 1);
        assert_eq!(join.left.rel_id, join.right.rel_id);
    }

    #[test]
    fn rejects_binding_out_of_range() {
        assert!(parse_query("0|2.0>5|0.0").is_err());
    }

    #[test]
    fn rejects_missing_sections() {
        assert!(parse_query("0 1|0.0=1.0").is_err());
        assert!(parse_query("0|a|b|c").is_err());
    }

    #[test]
    fn rejects_non_equality_join() {
        assert!(parse_query("0 1|0.0>1.0|0.0").is_err());
    }

    #[test]
    fn rejects_empty_projections() {
        assert!(parse_query("0 1|0.0=1.0|").is_err());
    }
}
