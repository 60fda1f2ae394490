pub mod atomics;
pub mod barrier;
pub mod buffer;
pub mod cache_line;
pub mod error;
pub mod fence_policy;
pub mod jagged;
pub mod pfd;
pub mod race;
pub mod rank;
pub mod timer;

pub use barrier::BarrierBank;
pub use buffer::{AllocOptions, TouchPolicy};
pub use cache_line::{CacheLine, CacheLineRegion};
pub use error::{CcError, CcResult};
pub use fence_policy::FenceMode;
pub use jagged::JaggedArray;
pub use pfd::{AbsDeviation, PfdStore};
pub use race::{RaceTracker, RunState};
pub use rank::{MapInputs, Rank, RankMap};
pub use timer::{full_fence, load_fence, pause, store_fence, ticks_now};
