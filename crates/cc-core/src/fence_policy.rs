//! Fence-policy table: a single integer level selects a `(load, store)`
//! fence-mode pair.

use crate::error::CcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMode {
    None,
    Partial,
    Full,
    DoubleWrite,
}

/// The nine fence levels, in order, mapping to `(load, store)` modes.
const TABLE: [(FenceMode, FenceMode); 10] = {
    use FenceMode::*;
    [
        (None, None),
        (Partial, Partial),
        (Full, Full),
        (Partial, None),
        (None, Partial),
        (Full, None),
        (None, Full),
        (Full, Partial),
        (Partial, Full),
        (None, DoubleWrite),
    ]
};

/// Resolve a fence level (`0..9`) to its `(load_fence_mode, store_fence_mode)`
/// pair. Returns `CcError::Config` for out-of-range levels.
pub fn resolve(level: u8) -> Result<(FenceMode, FenceMode), CcError> {
    TABLE
        .get(level as usize)
        .copied()
        .ok_or_else(|| CcError::config(format!("fence level {level} out of range 0..=9")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_zero_is_none_none() {
        assert_eq!(resolve(0).unwrap(), (FenceMode::None, FenceMode::None));
    }

    #[test]
    fn level_nine_is_none_doublewrite() {
        assert_eq!(
            resolve(9).unwrap(),
            (FenceMode::None, FenceMode::DoubleWrite)
        );
    }

    #[test]
    fn out_of_range_is_config_error() {
        assert!(resolve(10).is_err());
    }

    #[test]
    fn every_level_round_trips_the_published_table() {
        let expected = [
            (FenceMode::None, FenceMode::None),
            (FenceMode::Partial, FenceMode::Partial),
            (FenceMode::Full, FenceMode::Full),
            (FenceMode::Partial, FenceMode::None),
            (FenceMode::None, FenceMode::Partial),
            (FenceMode::Full, FenceMode::None),
            (FenceMode::None, FenceMode::Full),
            (FenceMode::Full, FenceMode::Partial),
            (FenceMode::Partial, FenceMode::Full),
            (FenceMode::None, FenceMode::DoubleWrite),
        ];
        for (lvl, want) in expected.into_iter().enumerate() {
            assert_eq!(resolve(lvl as u8).unwrap(), want);
        }
    }
}
