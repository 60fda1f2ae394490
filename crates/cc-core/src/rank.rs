//! Rank mapper: converts the jagged `-t`/`-x`/`-A` arrays into dense
//! per-rank `(core, test_id, group, role, backoff_cap)` tuples.

use crate::error::{CcError, CcResult};
use crate::jagged::JaggedArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    pub core: i64,
    pub test_id: i64,
    pub group: usize,
    pub role: usize,
    pub backoff_cap: u32,
}

#[derive(Debug, Clone)]
pub struct RankMap {
    pub ranks: Vec<Rank>,
    pub group_size: Vec<usize>,
}

impl RankMap {
    pub fn num_ranks(&self) -> usize {
        self.ranks.len()
    }

    pub fn num_groups(&self) -> usize {
        self.group_size.len()
    }
}

pub struct MapInputs<'a> {
    pub test_spec: Option<&'a JaggedArray>,
    pub cores_spec: Option<&'a JaggedArray>,
    pub backoff_spec: Option<&'a JaggedArray>,
    pub default_t: usize,
    pub default_test: i64,
    pub default_backoff: u32,
}

/// Apply the shape rules (first matching rule wins) described for `-t`/`-x`.
pub fn map_ranks(inputs: &MapInputs) -> CcResult<RankMap> {
    let Some(cores_spec) = inputs.cores_spec else {
        // Rule 1: -x absent.
        let ranks = (0..inputs.default_t)
            .map(|r| Rank {
                core: r as i64,
                test_id: inputs.default_test,
                group: 0,
                role: 0,
                backoff_cap: inputs.default_backoff.max(1),
            })
            .collect();
        return Ok(RankMap {
            ranks,
            group_size: vec![inputs.default_t],
        });
    };

    // Rule 2: -x present.
    let core_groups = cores_spec.as_rows();
    let group_size: Vec<usize> = core_groups.iter().map(|g| g.len()).collect();
    let num_groups = group_size.len();
    let total: usize = group_size.iter().sum();

    let test_rows: Vec<&[i64]> = inputs
        .test_spec
        .map(|t| t.as_rows())
        .unwrap_or_else(|| vec![&[][..]]);

    let mut ranks = Vec::with_capacity(total);
    let mut rank_cursor = 0usize;
    for (g, cores) in core_groups.iter().enumerate() {
        for (role, &core) in cores.iter().enumerate() {
            let test_id = resolve_test_id(&test_rows, num_groups, &group_size, g, role)?;
            ranks.push(Rank {
                core,
                test_id,
                group: g,
                role,
                backoff_cap: inputs.default_backoff.max(1),
            });
            rank_cursor += 1;
        }
    }
    debug_assert_eq!(rank_cursor, total);

    if let Some(backoff_spec) = inputs.backoff_spec {
        apply_backoff(&mut ranks, backoff_spec, total)?;
    }

    Ok(RankMap { ranks, group_size })
}

fn resolve_test_id(
    test_rows: &[&[i64]],
    num_groups: usize,
    group_size: &[usize],
    g: usize,
    role: usize,
) -> CcResult<i64> {
    // Per-thread ops list: a single row whose length equals this group's
    // size, and there is only one group.
    if num_groups == 1 && test_rows.len() == 1 && test_rows[0].len() == group_size[g] {
        return test_rows[0]
            .get(role)
            .copied()
            .ok_or_else(|| CcError::config("mismatched -t/-x shapes"));
    }
    // A single row of length >= num_groups: per-group lookup by column g.
    if test_rows.len() == 1 && test_rows[0].len() >= num_groups {
        return test_rows[0]
            .get(g)
            .copied()
            .ok_or_else(|| CcError::config("mismatched -t/-x shapes"));
    }
    // num_groups rows, each with at least one entry: row g, first entry.
    if test_rows.len() == num_groups && test_rows.iter().all(|r| !r.is_empty()) {
        return test_rows
            .get(g)
            .and_then(|r| r.first())
            .copied()
            .ok_or_else(|| CcError::config("mismatched -t/-x shapes"));
    }
    Err(CcError::config("mismatched -t/-x shapes"))
}

fn apply_backoff(ranks: &mut [Rank], backoff_spec: &JaggedArray, total: usize) -> CcResult<()> {
    let rows = backoff_spec.as_rows();
    if rows.len() != 1 || rows[0].len() != total {
        return Err(CcError::config("-A length must equal T"));
    }
    for (rank, &v) in ranks.iter_mut().zip(rows[0].iter()) {
        rank.backoff_cap = (v.max(1)) as u32;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jagged::parse;

    #[test]
    fn no_cores_spec_synthesizes_one_group() {
        let inputs = MapInputs {
            test_spec: None,
            cores_spec: None,
            backoff_spec: None,
            default_t: 4,
            default_test: 7,
            default_backoff: 1,
        };
        let map = map_ranks(&inputs).unwrap();
        assert_eq!(map.num_ranks(), 4);
        assert_eq!(map.group_size, vec![4]);
        for (r, rank) in map.ranks.iter().enumerate() {
            assert_eq!(rank.core, r as i64);
            assert_eq!(rank.test_id, 7);
            assert_eq!(rank.group, 0);
            assert_eq!(rank.role, 0);
        }
    }

    #[test]
    fn single_group_per_thread_ops_list() {
        let cores = parse("[[0,1]]").unwrap();
        let tests = parse("[12,13]").unwrap();
        let inputs = MapInputs {
            test_spec: Some(&tests),
            cores_spec: Some(&cores),
            backoff_spec: None,
            default_t: 0,
            default_test: 0,
            default_backoff: 1,
        };
        let map = map_ranks(&inputs).unwrap();
        assert_eq!(map.ranks[0].test_id, 12);
        assert_eq!(map.ranks[1].test_id, 13);
    }

    #[test]
    fn single_group_shared_test_id() {
        let cores = parse("[[0,1]]").unwrap();
        let tests = parse("[16]").unwrap();
        let inputs = MapInputs {
            test_spec: Some(&tests),
            cores_spec: Some(&cores),
            backoff_spec: None,
            default_t: 0,
            default_test: 0,
            default_backoff: 1,
        };
        let map = map_ranks(&inputs).unwrap();
        assert_eq!(map.ranks[0].test_id, 16);
        assert_eq!(map.ranks[1].test_id, 16);
    }

    #[test]
    fn two_groups_per_group_row() {
        let cores = parse("[[0,1],[2,3]]").unwrap();
        let tests = parse("[[12],[13]]").unwrap();
        let inputs = MapInputs {
            test_spec: Some(&tests),
            cores_spec: Some(&cores),
            backoff_spec: None,
            default_t: 0,
            default_test: 0,
            default_backoff: 1,
        };
        let map = map_ranks(&inputs).unwrap();
        assert_eq!(map.group_size, vec![2, 2]);
        assert_eq!(map.ranks[0].group, 0);
        assert_eq!(map.ranks[0].test_id, 12);
        assert_eq!(map.ranks[2].group, 1);
        assert_eq!(map.ranks[2].test_id, 13);
        // roles are dense 0..group_size within each group
        assert_eq!(map.ranks[0].role, 0);
        assert_eq!(map.ranks[1].role, 1);
        assert_eq!(map.ranks[2].role, 0);
        assert_eq!(map.ranks[3].role, 1);
    }

    #[test]
    fn mismatched_shapes_is_config_error() {
        let cores = parse("[[0,1],[2,3]]").unwrap();
        let tests = parse("[[12],[13],[14]]").unwrap();
        let inputs = MapInputs {
            test_spec: Some(&tests),
            cores_spec: Some(&cores),
            backoff_spec: None,
            default_t: 0,
            default_test: 0,
            default_backoff: 1,
        };
        assert!(map_ranks(&inputs).is_err());
    }

    #[test]
    fn backoff_array_clamps_to_at_least_one() {
        let cores = parse("[[0,1]]").unwrap();
        let backoff = parse("[0,5]").unwrap();
        let inputs = MapInputs {
            test_spec: None,
            cores_spec: Some(&cores),
            backoff_spec: Some(&backoff),
            default_t: 0,
            default_test: 3,
            default_backoff: 1,
        };
        let map = map_ranks(&inputs).unwrap();
        assert_eq!(map.ranks[0].backoff_cap, 1);
        assert_eq!(map.ranks[1].backoff_cap, 5);
    }

    #[test]
    fn group_sizes_sum_to_t_and_roles_are_dense() {
        let cores = parse("[[0,1,2],[3,4]]").unwrap();
        let inputs = MapInputs {
            test_spec: None,
            cores_spec: Some(&cores),
            backoff_spec: None,
            default_t: 0,
            default_test: 0,
            default_backoff: 1,
        };
        let map = map_ranks(&inputs).unwrap();
        assert_eq!(map.group_size.iter().sum::<usize>(), map.num_ranks());
        let mut roles_g0: Vec<_> = map.ranks.iter().filter(|r| r.group == 0).map(|r| r.role).collect();
        roles_g0.sort();
        assert_eq!(roles_g0, vec![0, 1, 2]);
    }
}
