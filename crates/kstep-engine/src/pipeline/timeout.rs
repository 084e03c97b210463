use std::time::{Duration, Instant};

/// Wall-clock allowance for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Budget {
    deadline: Option<Instant>,
}

impl Budget {
    /// `0` means unlimited.
    pub(crate) fn start(timeout_secs: u64) -> Self {
        let deadline = match timeout_secs {
            0 => None,
            secs => Instant::now().checked_add(Duration::from_secs(secs)),
        };
        Self { deadline }
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whole seconds still available, rounded up. `0` if unlimited; at least
    /// `1` otherwise, so an almost spent budget never turns into "no limit".
    pub(crate) fn per_check_secs(&self) -> u64 {
        let Some(deadline) = self.deadline else {
            return 0;
        };
        let left = deadline.saturating_duration_since(Instant::now());
        let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
        secs.max(1)
    }
}

/// Whether a solver's unknown reason is one of its limit messages.
pub(crate) fn is_timeout_reason(reason: &str) -> bool {
    let reason = reason.to_ascii_lowercase();
    ["timeout", "canceled", "interrupted"]
        .iter()
        .any(|marker| reason.contains(marker))
}

pub(crate) fn timeout_unknown_reason(context: &str) -> String {
    format!("{context} timed out before completion.")
}
