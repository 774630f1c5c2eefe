use crate::helpe::*;

impl Client {
    /// Creates a [Client] that has never been reallocated.
    pub fn new(
        id:         ClientId,
        arrival:    Tick,
        departure:  Tick,
        laxity:     Laxity,
    ) -> Self {
        Self {
            id,
            arrival,
            departure,
            laxity,
            last_realloc:   None,
        }
    }

    /// The fraction of a station this client needs.
    #[inline(always)]
    pub fn weight(&self) -> f64 {
        1.0 / self.laxity as f64
    }

    /// Returns `true` if the client was migrated during step `t`.
    #[inline(always)]
    pub fn is_reallocated_at(&self, t: Tick) -> bool {
        self.last_realloc == Some(t)
    }

    /// Returns `true` if the client is in the system at step `t`.
    /// Both extremes count as live: arrivals are processed before
    /// departures within a step.
    #[inline(always)]
    pub fn is_active_at(&self, t: Tick) -> bool {
        self.arrival <= t && t <= self.departure
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id = {}, arrival time = {}, departure time = {}, laxity = {}, last reallocation time = ",
            self.id, self.arrival, self.departure, self.laxity
        )?;
        match self.last_realloc {
            Some(t) => write!(f, "{t}"),
            None    => write!(f, "never"),
        }
    }
}

/// Largest power of two not above `laxity`. Zero stays zero, so that
/// validation can reject it later with a proper culprit.
#[inline(always)]
pub fn round_down_pow2(laxity: Laxity) -> Laxity {
    if laxity == 0 { 0 } else { 1 << laxity.ilog2() }
}
