use std::time::{Duration, Instant};

/// Wall-clock and iteration budgets for one invocation.
///
/// `sla` is the soft budget: once it is spent the client gets a filler reply
/// and work moves to the background. `max_wait` is the absolute budget after
/// which the background work is abandoned and the session reset.
#[derive(Debug, Clone)]
pub struct TurnBudget {
    pub sla: Duration,
    pub max_wait: Duration,
    pub max_iterations: u32,
    pub min_call_timeout: Duration,
    pub max_call_timeout: Duration,
}

impl Default for TurnBudget {
    fn default() -> Self {
        Self {
            sla: Duration::from_millis(4_300),
            max_wait: Duration::from_secs(30),
            max_iterations: 3,
            min_call_timeout: Duration::from_secs(1),
            max_call_timeout: Duration::from_secs(25),
        }
    }
}

impl TurnBudget {
    /// Per-call timeout: the remaining budget clamped between the floor and
    /// the fixed cap, never the full remaining budget past the cap. The cap
    /// leaves headroom for serialization and response delivery.
    pub fn call_timeout(&self, remaining: Duration) -> Duration {
        remaining.clamp(self.min_call_timeout, self.max_call_timeout)
    }
}

pub(super) fn budget_stop_reason(
    budget: &TurnBudget,
    deadline: Instant,
    iteration: u32,
) -> Option<&'static str> {
    if Instant::now() >= deadline {
        return Some("deadline_exceeded");
    }

    if iteration >= budget.max_iterations {
        return Some("max_iterations_reached");
    }

    None
}
