//! Call setup outcome counters.

/// Attempted vs. established calls. The failure rate is derived on demand.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcomeCounter {
    attempted: u64,
    established: u64,
}

impl CallOutcomeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter pre-loaded with totals, e.g. from a snapshot.
    pub fn from_counts(attempted: u64, established: u64) -> Self {
        Self {
            attempted,
            established,
        }
    }

    pub fn record_attempted(&mut self) {
        self.attempted += 1;
    }

    /// Callers pair this with a prior attempt; the pairing is not verified.
    pub fn record_established(&mut self) {
        self.established += 1;
    }

    pub fn attempted(&self) -> u64 {
        self.attempted
    }

    pub fn established(&self) -> u64 {
        self.established
    }

    /// Fraction of attempts that never got established, in [0, 1].
    ///
    /// Established calls beyond the attempt count are clamped so the rate
    /// cannot go negative.
    pub fn failed_setup_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.attempted.saturating_sub(self.established) as f64 / self.attempted as f64
    }

    /// Fold another counter into this one.
    pub fn merge(&mut self, other: &Self) {
        self.attempted += other.attempted;
        self.established += other.established;
    }
}
