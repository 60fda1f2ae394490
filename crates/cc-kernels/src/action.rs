//! The operation catalogue and the pure `(test_id, role) -> [Action]`
//! choreography table that replaces a large per-kernel switch: the Round
//! driver interprets the returned sequence, never branching on `test_id`
//! itself outside this module.

use cc_core::barrier::{B1, B2};

/// Numeric test identifiers as accepted on the `-t` array. Anchors `0`,
/// `16`, `27`, `30`, `34` are load-bearing: they match the concrete
/// end-to-end scenarios this harness is tested against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestId {
    StoreOnModified = 0,
    StoreOnExclusive = 1,
    StoreOnShared = 2,
    StoreOnOwnedMine = 3,
    StoreOnOwned = 4,
    StoreOnInvalid = 5,
    LoadFromModified = 6,
    LoadFromExclusive = 7,
    LoadFromShared = 8,
    LoadFromOwned = 9,
    LoadFromInvalid = 10,
    Invalidate = 11,
    Cas = 12,
    Fai = 13,
    Tas = 14,
    Swap = 15,
    CasOnModified = 16,
    FaiOnModified = 17,
    TasOnModified = 18,
    SwapOnModified = 19,
    CasOnShared = 20,
    FaiOnShared = 21,
    TasOnShared = 22,
    SwapOnShared = 23,
    CasConcurrent = 24,
    LoadFromL1 = 25,
    LoadFromMemSize = 27,
    Lfence = 28,
    Sfence = 29,
    Mfence = 30,
    Pause = 31,
    Nop = 32,
    CasUntilSuccess = 34,
}

/// `(test_id, name)` pairs in declaration order, for `--help`'s catalogue
/// and any other place that needs to print the id-to-kernel mapping.
pub fn catalogue() -> &'static [(i64, &'static str)] {
    &[
        (0, "StoreOnModified"),
        (1, "StoreOnExclusive"),
        (2, "StoreOnShared"),
        (3, "StoreOnOwnedMine"),
        (4, "StoreOnOwned"),
        (5, "StoreOnInvalid"),
        (6, "LoadFromModified"),
        (7, "LoadFromExclusive"),
        (8, "LoadFromShared"),
        (9, "LoadFromOwned"),
        (10, "LoadFromInvalid"),
        (11, "Invalidate"),
        (12, "Cas"),
        (13, "Fai"),
        (14, "Tas"),
        (15, "Swap"),
        (16, "CasOnModified"),
        (17, "FaiOnModified"),
        (18, "TasOnModified"),
        (19, "SwapOnModified"),
        (20, "CasOnShared"),
        (21, "FaiOnShared"),
        (22, "TasOnShared"),
        (23, "SwapOnShared"),
        (24, "CasConcurrent"),
        (25, "LoadFromL1"),
        (27, "LoadFromMemSize"),
        (28, "Lfence"),
        (29, "Sfence"),
        (30, "Mfence"),
        (31, "Pause"),
        (32, "Nop"),
        (34, "CasUntilSuccess"),
    ]
}

impl TestId {
    pub fn from_i64(v: i64) -> Option<TestId> {
        use TestId::*;
        Some(match v {
            0 => StoreOnModified,
            1 => StoreOnExclusive,
            2 => StoreOnShared,
            3 => StoreOnOwnedMine,
            4 => StoreOnOwned,
            5 => StoreOnInvalid,
            6 => LoadFromModified,
            7 => LoadFromExclusive,
            8 => LoadFromShared,
            9 => LoadFromOwned,
            10 => LoadFromInvalid,
            11 => Invalidate,
            12 => Cas,
            13 => Fai,
            14 => Tas,
            15 => Swap,
            16 => CasOnModified,
            17 => FaiOnModified,
            18 => TasOnModified,
            19 => SwapOnModified,
            20 => CasOnShared,
            21 => FaiOnShared,
            22 => TasOnShared,
            23 => SwapOnShared,
            24 => CasConcurrent,
            25 => LoadFromL1,
            27 => LoadFromMemSize,
            28 => Lfence,
            29 => Sfence,
            30 => Mfence,
            31 => Pause,
            32 => Nop,
            34 => CasUntilSuccess,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    Lfence,
    Sfence,
    Mfence,
    Pause,
    Nop,
}

/// One step of a classic-mode choreography.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Barrier(usize),
    Load,
    LoadNoPf,
    Store,
    StoreDouble,
    Invalidate,
    CasEventual,
    Fai,
    Tas,
    TasReset,
    Swap,
    CasUntilSuccess,
    CasNoPf,
    PointerChase,
    Fence(FenceKind),
    Nop,
}

/// The measured operation implied by "op" in a choreography row, resolved
/// from the test family so the table below can stay generic per family.
fn family_op(test_id: TestId) -> Action {
    use TestId::*;
    match test_id {
        Cas | CasOnModified | CasOnShared | CasConcurrent => Action::CasEventual,
        Fai | FaiOnModified | FaiOnShared => Action::Fai,
        Tas | TasOnModified | TasOnShared => Action::Tas,
        Swap | SwapOnModified | SwapOnShared => Action::Swap,
        CasUntilSuccess => Action::CasUntilSuccess,
        _ => Action::Nop,
    }
}

fn family_op_no_pf(test_id: TestId) -> Action {
    match family_op(test_id) {
        Action::CasEventual | Action::CasUntilSuccess => Action::CasNoPf,
        other => other,
    }
}

/// `(test_id, role) -> choreography` for classic mode (no seed core). Roles
/// beyond those listed for a family fall back to the "Others" column,
/// matching the spec's `role 0 / role 1 / role 2 / others` structure.
pub fn choreography(test_id: TestId, role: usize) -> Vec<Action> {
    use Action::*;
    use TestId::*;
    match test_id {
        StoreOnModified => match role {
            0 => vec![Store],
            1 => vec![Barrier(B1), Store],
            _ => vec![Barrier(B1)],
        },
        StoreOnExclusive => match role {
            0 => vec![Load, Barrier(B1)],
            1 => vec![Barrier(B1), Store],
            _ => vec![Barrier(B1)],
        },
        StoreOnShared => match role {
            0 => vec![Load, Barrier(B1), Barrier(B2)],
            1 => vec![Barrier(B1), Barrier(B2), Store],
            2 => vec![Barrier(B1), Load, Barrier(B2)],
            _ => vec![Barrier(B1), LoadNoPf, Barrier(B2)],
        },
        StoreOnOwnedMine => match role {
            0 => vec![Barrier(B1), Load, Barrier(B2)],
            1 => vec![Store, Barrier(B1), Barrier(B2), StoreDouble],
            _ => vec![Barrier(B1), LoadNoPf, Barrier(B2)],
        },
        StoreOnOwned => match role {
            0 => vec![Store, Barrier(B1), Barrier(B2)],
            1 => vec![Barrier(B1), Load, Barrier(B2), StoreDouble],
            _ => vec![Barrier(B1), LoadNoPf, Barrier(B2)],
        },
        StoreOnInvalid => match role {
            0 => vec![Barrier(B1), Store],
            1 => vec![Invalidate, Barrier(B1)],
            _ => vec![Barrier(B1)],
        },
        LoadFromModified => match role {
            0 => vec![Store, Barrier(B1)],
            1 => vec![Barrier(B1), Load],
            _ => vec![Barrier(B1)],
        },
        LoadFromExclusive => match role {
            0 => vec![Load, Barrier(B1)],
            1 => vec![Barrier(B1), Load],
            _ => vec![Barrier(B1)],
        },
        // LOAD_FROM_SHARED: resolved per the project decision recorded in
        // DESIGN.md — same preconditioning as LOAD_FROM_OWNED, but role 1's
        // measured op is a plain load rather than a store.
        LoadFromShared => match role {
            0 => vec![Store, Barrier(B1), Barrier(B2)],
            1 => vec![Barrier(B1), Load, Barrier(B2)],
            2 => vec![Barrier(B1), Barrier(B2), Load],
            _ => vec![Barrier(B1), Barrier(B2)],
        },
        LoadFromOwned => match role {
            0 => vec![Store, Barrier(B1), Barrier(B2)],
            1 => vec![Barrier(B1), Load, Barrier(B2)],
            2 => vec![Barrier(B1), Barrier(B2), Load],
            _ => vec![Barrier(B1), Barrier(B2)],
        },
        LoadFromInvalid => match role {
            0 => vec![Barrier(B1), Load],
            1 => vec![Invalidate, Barrier(B1)],
            _ => vec![Barrier(B1)],
        },
        Invalidate => match role {
            0 => vec![Barrier(B1), Invalidate],
            _ => vec![Barrier(B1)],
        },
        Cas | Fai | Swap => match role {
            0 => vec![family_op(test_id), Barrier(B1)],
            1 => vec![Barrier(B1), family_op(test_id)],
            _ => vec![Barrier(B1)],
        },
        Tas => match role {
            0 => vec![family_op(test_id), Barrier(B1), Barrier(B2)],
            1 => vec![Barrier(B1), family_op(test_id), TasReset, Barrier(B2)],
            _ => vec![Barrier(B1), Barrier(B2)],
        },
        CasOnModified | FaiOnModified | TasOnModified | SwapOnModified => match role {
            0 => vec![Store, Barrier(B1)],
            1 => vec![Barrier(B1), family_op(test_id)],
            _ => vec![Barrier(B1)],
        },
        CasOnShared | FaiOnShared | TasOnShared | SwapOnShared => match role {
            0 => vec![Load, Barrier(B1), Barrier(B2)],
            1 => match family_op(test_id) {
                Action::Fai | Action::Tas | Action::Swap => {
                    vec![Barrier(B1), Barrier(B2), family_op(test_id)]
                }
                op => vec![Barrier(B1), op, Barrier(B2)],
            },
            2 => vec![Barrier(B1), Load, Barrier(B2)],
            _ => vec![Barrier(B1), LoadNoPf, Barrier(B2)],
        },
        CasConcurrent => {
            if role == 0 {
                vec![family_op(test_id)]
            } else {
                vec![family_op_no_pf(test_id)]
            }
        }
        CasUntilSuccess => match role {
            0 => vec![CasUntilSuccess, Barrier(B1)],
            1 => vec![Barrier(B1), CasUntilSuccess],
            _ => vec![Barrier(B1)],
        },
        LoadFromL1 => {
            if role == 0 {
                vec![Load, Load, Load]
            } else {
                vec![]
            }
        }
        LoadFromMemSize => vec![PointerChase],
        Lfence => vec![Fence(FenceKind::Lfence)],
        Sfence => vec![Fence(FenceKind::Sfence)],
        Mfence => vec![Fence(FenceKind::Mfence)],
        Pause => vec![Fence(FenceKind::Pause)],
        Nop => vec![Fence(FenceKind::Nop)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_ids_match_the_published_scenarios() {
        assert_eq!(TestId::from_i64(0), Some(TestId::StoreOnModified));
        assert_eq!(TestId::from_i64(16), Some(TestId::CasOnModified));
        assert_eq!(TestId::from_i64(27), Some(TestId::LoadFromMemSize));
        assert_eq!(TestId::from_i64(30), Some(TestId::Mfence));
        assert_eq!(TestId::from_i64(34), Some(TestId::CasUntilSuccess));
    }

    #[test]
    fn unknown_id_maps_to_none() {
        assert_eq!(TestId::from_i64(999), None);
    }

    #[test]
    fn catalogue_entries_all_resolve() {
        for &(id, _) in catalogue() {
            assert!(TestId::from_i64(id).is_some(), "catalogue id {id} has no TestId mapping");
        }
    }

    #[test]
    fn store_on_modified_role0_has_no_barrier() {
        let seq = choreography(TestId::StoreOnModified, 0);
        assert_eq!(seq, vec![Action::Store]);
    }

    #[test]
    fn tas_role1_resets_after_the_op() {
        let seq = choreography(TestId::Tas, 1);
        assert_eq!(
            seq,
            vec![Action::Barrier(B1), Action::Tas, Action::TasReset, Action::Barrier(B2)]
        );
    }

    #[test]
    fn cas_concurrent_has_no_barriers() {
        assert_eq!(choreography(TestId::CasConcurrent, 0), vec![Action::CasEventual]);
        assert_eq!(choreography(TestId::CasConcurrent, 3), vec![Action::CasNoPf]);
    }

    #[test]
    fn pointer_chase_ignores_role() {
        for role in 0..4 {
            assert_eq!(choreography(TestId::LoadFromMemSize, role), vec![Action::PointerChase]);
        }
    }
}
