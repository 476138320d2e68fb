/// Plan construction: left-deep join trees in predicate declaration order
///
/// Each binding becomes a Scan leaf, or a FilterScan when filters target
/// it. Join predicates are applied strictly in the order the query declares
/// them; a predicate whose two bindings are already covered by the running
/// subtree becomes an intra-result equality on the intermediate. There is
/// deliberately no join reordering.
use std::collections::VecDeque;
use std::sync::Arc;

use fxhash::FxHashSet;

use crate::error::{EngineError, EngineResult};
use crate::execution::operators::{Checksum, FilterScan, Join, Operator, Scan, SelfJoin};
use crate::query::parser::QueryInfo;
use crate::query::plan::{FilterInfo, PlanNode, PredicateInfo};
use crate::storage::relation::{Relation, RelationId};

/// Build the logical plan tree for a parsed query
pub fn build_plan(query: &QueryInfo) -> EngineResult<PlanNode> {
    let mut leaves: Vec<Option<PlanNode>> = (0..query.relations.len())
        .map(|binding| Some(leaf_node(query, binding as u32)))
        .collect();

    let mut current: Option<PlanNode> = None;
    let mut covered: FxHashSet<u32> = FxHashSet::default();
    let mut pending: VecDeque<PredicateInfo> = query.joins.iter().copied().collect();
    let mut stalled = 0;

    while let Some(predicate) = pending.pop_front() {
        let lb = predicate.left.binding;
        let rb = predicate.right.binding;

        match current.take() {
            None => {
                let input = take_leaf(&mut leaves, lb)?;
                covered.insert(lb);
                current = Some(if lb == rb {
                    PlanNode::SelfJoin {
                        input: Box::new(input),
                        predicate,
                    }
                } else {
                    let right = take_leaf(&mut leaves, rb)?;
                    covered.insert(rb);
                    PlanNode::Join {
                        left: Box::new(input),
                        right: Box::new(right),
                        predicate,
                    }
                });
                stalled = 0;
            }
            Some(tree) => {
                let left_covered = covered.contains(&lb);
                let right_covered = covered.contains(&rb);
                if left_covered && right_covered {
                    current = Some(PlanNode::SelfJoin {
                        input: Box::new(tree),
                        predicate,
                    });
                    stalled = 0;
                } else if left_covered {
                    let right = take_leaf(&mut leaves, rb)?;
                    covered.insert(rb);
                    current = Some(PlanNode::Join {
                        left: Box::new(tree),
                        right: Box::new(right),
                        predicate,
                    });
                    stalled = 0;
                } else if right_covered {
                    // Orient the predicate so its left half resolves in the
                    // already-joined side.
                    let flipped = PredicateInfo {
                        left: predicate.right,
                        right: predicate.left,
                    };
                    let right = take_leaf(&mut leaves, lb)?;
                    covered.insert(lb);
                    current = Some(PlanNode::Join {
                        left: Box::new(tree),
                        right: Box::new(right),
                        predicate: flipped,
                    });
                    stalled = 0;
                } else {
                    // Neither side connects yet; retry after later predicates.
                    current = Some(tree);
                    pending.push_back(predicate);
                    stalled += 1;
                    if stalled > pending.len() {
                        return Err(EngineError::planning("join graph is disconnected"));
                    }
                }
            }
        }
    }

    let input = match current {
        Some(tree) => tree,
        None => {
            if query.relations.len() != 1 {
                return Err(EngineError::planning("cross products are not supported"));
            }
            covered.insert(0);
            take_leaf(&mut leaves, 0)?
        }
    };
    if let Some(unused) = leaves.iter().position(Option::is_some) {
        return Err(EngineError::planning(format!(
            "binding {unused} is not connected by any join predicate"
        )));
    }
    Ok(PlanNode::Checksum {
        input: Box::new(input),
        columns: query.projections.clone(),
    })
}

fn leaf_node(query: &QueryInfo, binding: u32) -> PlanNode {
    let relation = query.relations[binding as usize];
    let filters: Vec<FilterInfo> = query
        .filters
        .iter()
        .copied()
        .filter(|f| f.column.binding == binding)
        .collect();
    if filters.is_empty() {
        PlanNode::Scan { relation, binding }
    } else {
        PlanNode::FilterScan {
            relation,
            binding,
            filters,
        }
    }
}

fn take_leaf(leaves: &mut [Option<PlanNode>], binding: u32) -> EngineResult<PlanNode> {
    leaves
        .get_mut(binding as usize)
        .and_then(Option::take)
        .ok_or_else(|| {
            EngineError::planning(format!("binding {binding} is unknown or already joined"))
        })
}

/// Build the physical operator tree for a plan rooted at a checksum node
pub fn build_operators(plan: &PlanNode, catalog: &[Arc<Relation>]) -> EngineResult<Checksum> {
    match plan {
        PlanNode::Checksum { input, columns } => {
            let input = build_node(input, catalog)?;
            Ok(Checksum::new(input, columns.clone()))
        }
        _ => Err(EngineError::planning("plan root must be a checksum node")),
    }
}

fn build_node(plan: &PlanNode, catalog: &[Arc<Relation>]) -> EngineResult<Box<dyn Operator>> {
    match plan {
        PlanNode::Scan { relation, binding } => {
            let relation = lookup(catalog, *relation)?;
            Ok(Box::new(Scan::new(relation, *binding)))
        }
        PlanNode::FilterScan {
            relation,
            binding,
            filters,
        } => {
            let relation = lookup(catalog, *relation)?;
            Ok(Box::new(FilterScan::new(relation, *binding, filters.clone())?))
        }
        PlanNode::Join {
            left,
            right,
            predicate,
        } => {
            let left = build_node(left, catalog)?;
            let right = build_node(right, catalog)?;
            Ok(Box::new(Join::new(left, right, *predicate)))
        }
        PlanNode::SelfJoin { input, predicate } => {
            let input = build_node(input, catalog)?;
            Ok(Box::new(SelfJoin::new(input, *predicate)))
        }
        PlanNode::Checksum { .. } => {
            Err(EngineError::planning("checksum must be the plan root"))
        }
    }
}

fn lookup(catalog: &[Arc<Relation>], id: RelationId) -> EngineResult<Arc<Relation>> {
    catalog
        .get(id as usize)
        .cloned()
        .ok_or_else(|| EngineError::planning(format!("unknown relation {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse_query;

    #[test]
    fn single_relation_filter_plan() {
        let query = parse_query("0|0.1>5|0.0").unwrap();
        let plan = build_plan(&query).unwrap();
        match plan {
            PlanNode::Checksum { input, columns } => {
                assert_eq!(columns.len(), 1);
                assert!(matches!(*input, PlanNode::FilterScan { .. }));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn joins_follow_declaration_order() {
        let query = parse_query("0 1 2|0.0=1.0&0.1=2.0|0.0").unwrap();
        let plan = build_plan(&query).unwrap();
        // Checksum(Join(Join(Scan 0, Scan 1), Scan 2)).
        match plan {
            PlanNode::Checksum { input, .. } => match *input {
                PlanNode::Join { left, right, .. } => {
                    assert!(matches!(*left, PlanNode::Join { .. }));
                    assert!(matches!(*right, PlanNode::Scan { binding: 2, .. }));
                }
                other => panic!("unexpected node: {other:?}"),
            },
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn repeated_binding_pair_becomes_self_join() {
        let query = parse_query("0 1|0.0=1.0&0.1=1.1|0.0").unwrap();
        let plan = build_plan(&query).unwrap();
        match plan {
            PlanNode::Checksum { input, .. } => {
                assert!(matches!(*input, PlanNode::SelfJoin { .. }));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn same_binding_predicate_becomes_self_join() {
        let query = parse_query("0|0.0=0.1|0.0").unwrap();
        let plan = build_plan(&query).unwrap();
        match plan {
            PlanNode::Checksum { input, .. } => match *input {
                PlanNode::SelfJoin { input, .. } => {
                    assert!(matches!(*input, PlanNode::Scan { .. }));
                }
                other => panic!("unexpected node: {other:?}"),
            },
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn deferred_predicate_connects_later() {
        // 2.0=2.1 touches binding 2 before any join covers it, so it is
        // deferred and lands as a self-join on the final intermediate.
        let query = parse_query("0 1 2|0.0=1.0&2.0=2.1&1.0=2.0|0.0").unwrap();
        let plan = build_plan(&query).unwrap();
        match plan {
            PlanNode::Checksum { input, .. } => {
                assert!(matches!(*input, PlanNode::SelfJoin { .. }));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn rejects_cross_product() {
        let query = parse_query("0 1||0.0").unwrap();
        assert!(build_plan(&query).is_err());
    }

    #[test]
    fn rejects_disconnected_join_graph() {
        let query = parse_query("0 1 2 3|0.0=1.0&2.0=3.0|0.0").unwrap();
        assert!(build_plan(&query).is_err());
    }
}
