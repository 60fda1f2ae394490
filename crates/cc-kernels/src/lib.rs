pub mod action;
pub mod kernels;
pub mod seeder;
pub mod stride;

pub use action::{choreography, Action, FenceKind, TestId};
pub use kernels::KernelCtx;
pub use seeder::seed_round;
pub use stride::{round_up_pow2, stride_hide};
