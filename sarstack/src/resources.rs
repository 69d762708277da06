//! Process-count scaling against the global resource budget.
//!
//! The budget is the configured `numProcess`; the thread factor is
//! `OMP_NUM_THREADS`. Thread-heavy stages get their budget divided by the
//! thread factor so that processes x threads stays within the budget:
//! rounded up when sizing the runtime argument handed to a stage driver,
//! rounded down when deriving the plan-time topo process count consumed by
//! the stack generator. The two rounding directions are deliberate and
//! must not be unified.

use crate::stage::ResourceClass;

/// Process count handed to a stage driver at execution time.
///
/// Heavy stages divide the budget by the thread factor, rounding up so a
/// non-empty budget always yields at least one worker. Ordinary stages use
/// the budget unmodified.
pub fn runtime_count(class: ResourceClass, budget: usize, thread_factor: usize) -> usize {
    match class {
        ResourceClass::Heavy => budget.div_ceil(thread_factor.max(1)),
        ResourceClass::Ordinary => budget,
    }
}

/// Plan-time process count for the thread-parallel topo step, consumed by
/// the stack-generation collaborator. Rounds down, never overcommitting
/// the budget.
pub fn plan_count(budget: usize, thread_factor: usize) -> usize {
    budget / thread_factor.max(1)
}

/// Clamp a process count to the stage's unit of work. A script with three
/// command lines has no use for a fourth worker.
pub fn clamp_to_work(count: usize, command_lines: usize) -> usize {
    count.min(command_lines.max(1))
}

/// The thread factor from `OMP_NUM_THREADS`, defaulting to 1 when unset
/// or unparseable.
pub fn thread_factor_from_env() -> usize {
    std::env::var(crate::THREAD_COUNT_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(1)
}
