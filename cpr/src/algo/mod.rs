pub mod realloc;
pub mod generate;

use crate::helpe::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Arrival,
    Departure,
}

/// Status of the system at the end of one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub time:               Tick,
    pub departed_weight:    f64,
    /// `ceil(active_weight)`
    pub lower_bound:        usize,
    pub stations:           usize,
    pub reallocated_weight: f64,
    pub active_weight:      f64,
}

impl StepReport {
    /// Stations used over the best possible count, if the latter is
    /// positive.
    pub fn alpha(&self) -> Option<f64> {
        (self.lower_bound > 0).then(|| self.stations as f64 / self.lower_bound as f64)
    }
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t= {} departed_weight= {} H= {} stations= {} reallocated_weight= {} active-weight= {}",
            self.time,
            self.departed_weight,
            self.lower_bound,
            self.stations,
            self.reallocated_weight,
            self.active_weight
        )
    }
}

/// Whole-run metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunSummary {
    /// Max over all steps of stations / `ceil(active_weight)`.
    pub alpha_max:      f64,
    /// Max over reallocation events of reallocated / departed weight,
    /// departed weight being accumulated since the previous event.
    pub beta_max:       f64,
    pub steps:          usize,
    pub migrations:     usize,
    pub peak_stations:  usize,
}

/// Replays `clients` against a fresh [Coordinator] using `policy`.
/// See [run] for the details.
pub fn simulate<F>(
    clients:    &[Client],
    policy:     GrowthPolicy,
    on_step:    F,
) -> Result<RunSummary, LaxityError>
where F: FnMut(&StepReport) {
    let mut co = Coordinator::new(policy);
    run(&mut co, clients, on_step)
}

/// Replays `clients` against `co`, one time step at a time, from 0 up
/// to the last departure.
///
/// Within a step, events are handled in trace order: a client arriving
/// at `t` is added, a client departing at `t` is deleted. A client that
/// arrives and departs at the same step is added, then deleted, so its
/// weight counts as departed in that step (rather than lingering in the
/// structure until the end of the run). If anything departed, the
/// coordinator reallocates. `on_step` then sees the step's [StepReport].
///
/// # Panics
/// If a departing client cannot be found in the structure.
pub fn run<F>(
    co:         &mut Coordinator,
    clients:    &[Client],
    mut on_step: F,
) -> Result<RunSummary, LaxityError>
where F: FnMut(&StepReport) {
    let mut events: BTreeMap<Tick, Vec<(EventKind, &Client)>> = BTreeMap::new();
    for c in clients {
        events.entry(c.arrival).or_default().push((EventKind::Arrival, c));
        events.entry(c.departure).or_default().push((EventKind::Departure, c));
    }
    let mut res = RunSummary::default();
    let Some(last) = horizon(clients) else {
        return Ok(res);
    };
    let migrations_before = co.migrations();

    for t in 0..=last {
        let mut departures = false;
        for (kind, c) in events.remove(&t).unwrap_or_default() {
            debug_assert!(c.is_active_at(t) || c.arrival > c.departure, "Event of {c} outside its lifetime");
            match kind {
                EventKind::Arrival      => co.add(*c)?,
                EventKind::Departure    => {
                    if !co.delete(c) {
                        panic!("Attempt to remove a non-existent client: {c}");
                    }
                    departures = true;
                }
            }
        }
        if departures {
            co.reallocate(t);
        }
        let reallocated = co.refresh_reallocated_weight(t);
        let report = StepReport {
            time:               t,
            departed_weight:    co.departed_weight(),
            lower_bound:        co.lower_bound(),
            stations:           co.station_count(),
            reallocated_weight: reallocated,
            active_weight:      co.active_weight(),
        };
        on_step(&report);

        if let Some(alpha) = report.alpha() {
            res.alpha_max = res.alpha_max.max(alpha);
        }
        if reallocated > 0.0 {
            res.beta_max = res.beta_max.max(reallocated / co.departed_weight());
            co.reset_departed_weight();
        }
        res.peak_stations = res.peak_stations.max(report.stations);
        res.steps += 1;
    }
    res.migrations = co.migrations() - migrations_before;
    info!(
        policy = ?co.policy(),
        steps = res.steps,
        migrations = res.migrations,
        peak_stations = res.peak_stations,
        alpha = res.alpha_max,
        beta = res.beta_max,
        "run complete"
    );

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_migration_drives_beta() {
        // Four half-station clients, two of which leave together.
        let clients = vec![
            Client::new(1, 0, 9, 2),
            Client::new(2, 0, 3, 2),
            Client::new(3, 0, 9, 2),
            Client::new(4, 0, 3, 2),
        ];
        let mut reports = vec![];
        let sum = simulate(&clients, GrowthPolicy::Constant, |r| reports.push(*r)).unwrap();
        assert_eq!(sum.steps, 10);
        assert_eq!(sum.migrations, 1);
        assert_eq!(sum.peak_stations, 2);
        assert_eq!(sum.alpha_max, 1.0);
        // Client 3 (0.5) moved after 1.0 departed.
        assert_eq!(sum.beta_max, 0.5);
        assert_eq!(reports[3].reallocated_weight, 0.5);
        assert_eq!(reports[3].stations, 1);
        assert_eq!(reports[4].departed_weight, 0.0);
        assert_eq!(reports[9].stations, 0);
        assert_eq!(reports[9].alpha(), None);
    }

    #[test]
    fn instantaneous_clients_come_and_go() {
        let clients = vec![Client::new(1, 2, 2, 4)];
        let mut co = Coordinator::new(GrowthPolicy::Constant);
        let mut seen = vec![];
        let sum = run(&mut co, &clients, |r| seen.push(r.to_string())).unwrap();
        assert_eq!(sum.steps, 3);
        assert_eq!(co.group_count(), 0);
        assert_eq!(seen[2], "t= 2 departed_weight= 0.25 H= 0 stations= 0 reallocated_weight= 0 active-weight= 0");
    }

    #[test]
    fn empty_trace_has_no_steps() {
        let sum = simulate(&[], GrowthPolicy::Logarithmic, |_| {}).unwrap();
        assert_eq!(sum, RunSummary::default());
    }

    #[test]
    fn bad_laxity_stops_the_run() {
        let clients = vec![Client::new(1, 0, 1, 3)];
        assert_eq!(
            simulate(&clients, GrowthPolicy::Constant, |_| {}),
            Err(LaxityError::NotPowerOfTwo(3))
        );
    }

    #[test]
    #[should_panic(expected = "non-existent client")]
    fn unknown_departure_is_fatal() {
        // Departs before it ever arrives.
        let ghost = Client::new(1, 3, 1, 2);
        let _ = simulate(&[ghost], GrowthPolicy::Constant, |_| {});
    }
}
