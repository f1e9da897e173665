//! Stable exit codes for bt CLI commands.

/// Command succeeded (or the loop converged).
pub const OK: i32 = 0;
/// Runtime failure: a precondition, a stage, a gate, or I/O failed.
pub const FAILURE: i32 = 1;
/// Invalid arguments. Also what clap uses for its own usage errors.
pub const USAGE: i32 = 2;
/// `bt loop` ran out of iterations without an approved review.
pub const EXHAUSTED: i32 = 3;
