//! Dependency ordering of columns.
//!
//! Kahn's algorithm over all columns regardless of kind. Nodes that become
//! ready together are consumed in ascending interface-id order, so the
//! output is reproducible. The result keeps per-kind buckets.

use std::collections::{BTreeSet, HashMap, HashSet};

use engine_core::{Error, Result};

use crate::column::{ColumnInfo, ColumnKind, Columns};

/// Orders `columns` so every column follows its dependencies.
pub fn sort_all_columns(columns: &Columns) -> Result<Columns> {
    let infos = columns.infos();
    if infos.is_empty() {
        return Ok(Columns::default());
    }

    let graph = Graph::build(&infos)?;
    let order = graph.topo_order();

    if order.len() != infos.len() {
        let remaining: BTreeSet<&str> = graph
            .in_degree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(id, _)| *id)
            .collect();
        return Err(match graph.find_cycle(&infos, &remaining) {
            Some(cycle) => Error::dependency(format!(
                "circular dependency detected: {}",
                cycle.join(" -> ")
            )),
            None => Error::dependency(format!(
                "circular dependency detected among: {}",
                remaining.into_iter().collect::<Vec<_>>().join(", ")
            )),
        });
    }

    let mut sorted = Columns::default();
    for id in order {
        let info = graph.nodes[id];
        match info.kind {
            ColumnKind::Session => sorted.session.push(columns.session[info.index].clone()),
            ColumnKind::Event => sorted.event.push(columns.event[info.index].clone()),
            ColumnKind::SessionScopedEvent => sorted
                .session_scoped_event
                .push(columns.session_scoped_event[info.index].clone()),
        }
    }
    Ok(sorted)
}

struct Graph<'a> {
    nodes: HashMap<&'a str, ColumnInfo<'a>>,
    in_degree: HashMap<&'a str, usize>,
    dependents: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Graph<'a> {
    fn build(infos: &[ColumnInfo<'a>]) -> Result<Self> {
        let mut nodes = HashMap::with_capacity(infos.len());
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for info in infos {
            *counts.entry(info.interface.id.as_str()).or_default() += 1;
            nodes.entry(info.interface.id.as_str()).or_insert(*info);
        }
        let mut duplicates: Vec<(&str, usize)> =
            counts.into_iter().filter(|(_, n)| *n > 1).collect();
        duplicates.sort();
        if let Some((id, n)) = duplicates.first() {
            return Err(Error::dependency(format!(
                "duplicate column id: {} appears {} times",
                id, n
            )));
        }

        let mut in_degree: HashMap<&str, usize> = nodes.keys().map(|id| (*id, 0)).collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for info in infos {
            let id = info.interface.id.as_str();
            let mut seen = HashSet::new();
            for dep in info.depends_on {
                let dep_id = dep.interface.as_str();
                if dep_id == id {
                    return Err(Error::dependency(format!("column {} depends on itself", id)));
                }
                if !nodes.contains_key(dep_id) {
                    return Err(Error::dependency(format!(
                        "column {} depends on {}, which is not present",
                        id, dep_id
                    )));
                }
                if !seen.insert(dep_id) {
                    continue;
                }
                dependents.entry(dep_id).or_default().push(id);
                *in_degree.entry(id).or_default() += 1;
            }
        }

        Ok(Self {
            nodes,
            in_degree,
            dependents,
        })
    }

    fn topo_order(&self) -> Vec<&'a str> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        queue.sort_unstable();
        let mut queue: std::collections::VecDeque<&str> = queue.into();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            result.push(current);

            let mut ready = Vec::new();
            for next in self.dependents.get(current).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(d) = in_degree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(*next);
                    }
                }
            }
            ready.sort_unstable();
            queue.extend(ready);
        }
        result
    }

    /// Walks dependency edges among the unsorted nodes until one repeats.
    fn find_cycle(
        &self,
        infos: &[ColumnInfo<'a>],
        remaining: &BTreeSet<&'a str>,
    ) -> Option<Vec<String>> {
        let deps_of: HashMap<&str, Vec<&str>> = infos
            .iter()
            .filter(|i| remaining.contains(i.interface.id.as_str()))
            .map(|i| {
                let mut deps: Vec<&str> = i
                    .depends_on
                    .iter()
                    .map(|d| d.interface.as_str())
                    .filter(|d| remaining.contains(d))
                    .collect();
                deps.sort_unstable();
                (i.interface.id.as_str(), deps)
            })
            .collect();

        let mut done: HashSet<&str> = HashSet::new();
        for start in remaining {
            let mut path: Vec<&str> = Vec::new();
            if let Some(cycle) = dfs(*start, &deps_of, &mut path, &mut done) {
                return Some(cycle);
            }
        }
        None
    }
}

fn dfs<'a>(
    node: &'a str,
    deps_of: &HashMap<&'a str, Vec<&'a str>>,
    path: &mut Vec<&'a str>,
    done: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if let Some(pos) = path.iter().position(|p| *p == node) {
        let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    if done.contains(node) {
        return None;
    }
    path.push(node);
    for dep in deps_of.get(node).map(Vec::as_slice).unwrap_or(&[]) {
        if let Some(cycle) = dfs(*dep, deps_of, path, done) {
            return Some(cycle);
        }
    }
    path.pop();
    done.insert(node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{columns_of, event_col, session_col, sse_col};

    fn event_ids(columns: &Columns) -> Vec<String> {
        columns.event.iter().map(|c| c.id().to_string()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let columns = columns_of(vec![
            event_col("c", &["b"]),
            event_col("b", &["a"]),
            event_col("a", &[]),
        ]);
        let sorted = sort_all_columns(&columns).unwrap();
        assert_eq!(event_ids(&sorted), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_lexical_tie_break_and_repeatable() {
        let columns = columns_of(vec![
            event_col("zeta", &[]),
            event_col("alpha", &[]),
            event_col("mid", &["zeta"]),
            event_col("beta", &[]),
        ]);
        let first = sort_all_columns(&columns).unwrap();
        assert_eq!(event_ids(&first), vec!["alpha", "beta", "zeta", "mid"]);
        let second = sort_all_columns(&columns).unwrap();
        assert_eq!(event_ids(&first), event_ids(&second));
    }

    #[test]
    fn test_self_dependency() {
        let columns = columns_of(vec![event_col("a", &["a"])]);
        let err = sort_all_columns(&columns).unwrap_err();
        assert_eq!(err.to_string(), "column a depends on itself");
    }

    #[test]
    fn test_two_node_cycle() {
        let columns = columns_of(vec![event_col("a", &["b"]), event_col("b", &["a"])]);
        let err = sort_all_columns(&columns).unwrap_err();
        assert_eq!(err.to_string(), "circular dependency detected: a -> b -> a");
    }

    #[test]
    fn test_longer_cycle() {
        let columns = columns_of(vec![
            event_col("a", &["b"]),
            event_col("b", &["c"]),
            event_col("c", &["a"]),
            event_col("d", &[]),
        ]);
        let err = sort_all_columns(&columns).unwrap_err();
        assert_eq!(err.to_string(), "circular dependency detected: a -> b -> c -> a");
    }

    #[test]
    fn test_duplicate_ids() {
        let columns = columns_of(vec![event_col("a", &[]), event_col("a", &[])]);
        let err = sort_all_columns(&columns).unwrap_err();
        assert_eq!(err.to_string(), "duplicate column id: a appears 2 times");
    }

    #[test]
    fn test_cross_kind_dependencies_keep_buckets() {
        let columns = Columns::new(
            vec![session_col("s", &["e2"])],
            vec![event_col("e2", &["e1"]), event_col("e1", &[])],
            vec![sse_col("x", &["e1"])],
        );
        let sorted = sort_all_columns(&columns).unwrap();
        assert_eq!(event_ids(&sorted), vec!["e1", "e2"]);
        assert_eq!(sorted.session.len(), 1);
        assert_eq!(sorted.session_scoped_event.len(), 1);
    }

    #[test]
    fn test_empty() {
        assert!(sort_all_columns(&Columns::default()).unwrap().is_empty());
    }
}
