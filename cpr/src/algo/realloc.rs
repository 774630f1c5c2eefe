use crate::helpe::*;

/// What a single [`Group::reallocate`] pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReallocOutcome {
    /// Number of subtree transfers between stations.
    pub migrations:     usize,
    /// Number of clients carried by those transfers.
    pub clients_moved:  usize,
    /// Number of stations closed at the end of the pass.
    pub closed:         usize,
}

impl std::ops::AddAssign for ReallocOutcome {
    fn add_assign(&mut self, other: Self) {
        self.migrations += other.migrations;
        self.clients_moved += other.clients_moved;
        self.closed += other.closed;
    }
}

/// Mutable access to two distinct elements of the same slice.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert!(a != b, "Cannot borrow element {a} twice");
    if a < b {
        let (lo, hi) = items.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = items.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

fn migrate_or_die(class: LaxityClass, dest: &mut Station, origin: &mut Station, level: Laxity, time: Tick) -> usize {
    match Station::migrate(dest, origin, level, time) {
        Ok(moved) => {
            trace!(%class, level, moved, "migration");
            moved
        },
        Err(e) => {
            panic!("A scheduled reallocation in class {class} was not performed: {e}");
        }
    }
}

impl Group {
    /// Restores the [Group] invariant after departures:
    ///
    /// 1. at most one hole across all stations per non-top level,
    /// 2. at most one station with holes at the top level,
    /// 3. no empty station.
    ///
    /// Intra-station moves are free and used liberally. Inter-station ones
    /// are migrations: whole subtrees moved into a hole of the same level,
    /// each client in them stamped with `time`.
    ///
    /// # Panics
    /// If a scheduled migration cannot be carried out, or if the invariant
    /// does not hold at the end. Both mean the algorithm is broken.
    pub fn reallocate(&mut self, time: Tick) -> ReallocOutcome {
        let mut res = ReallocOutcome::default();
        let class = self.class;
        let top = class.w_min;

        self.stations.iter_mut().for_each(Station::local_defragment);

        // Level by level, from the leaves up to (but excluding) the top.
        // The second station found always migrates into the first.
        for level in class.levels().skip(1).rev() {
            for i in 0..self.stations.len().saturating_sub(1) {
                if !self.stations[i].has_hole(level) { continue; }
                let partner = (i + 1..self.stations.len())
                    .find(|&j| self.stations[j].has_hole(level));
                if let Some(j) = partner {
                    let (dest, origin) = pair_mut(&mut self.stations, i, j);
                    res.clients_moved += migrate_or_die(class, dest, origin, level, time);
                    res.migrations += 1;
                    // The donor may now hold two holes at different levels.
                    self.stations[j].local_defragment();
                }
            }
        }

        self.stations.iter_mut().for_each(Station::local_defragment);

        // Top level: sort stations by number of free trees (stable, by
        // bucketing) and keep moving trees from the rightmost non-empty
        // station into the leftmost non-full one.
        let top_holes: Vec<usize> = self.stations.iter()
            .map(Station::top_hole_count)
            .collect();
        let max_top_holes = top_holes.iter().copied().max().unwrap_or(0);
        let counts = &top_holes;
        let sorted: Vec<usize> = (0..=max_top_holes)
            .flat_map(move |h| counts.iter().positions(move |&c| c == h))
            .collect();
        if !sorted.is_empty() {
            let mut left = 0;
            while self.stations[sorted[left]].is_full() && left < sorted.len() - 1 {
                left += 1;
            }
            let mut right = sorted.len() - 1;
            while self.stations[sorted[right]].is_empty() && right > 0 {
                right -= 1;
            }
            while left < right {
                let (dest, origin) = pair_mut(&mut self.stations, sorted[left], sorted[right]);
                res.clients_moved += migrate_or_die(class, dest, origin, top, time);
                res.migrations += 1;
                if self.stations[sorted[left]].is_full() { left += 1; }
                if self.stations[sorted[right]].is_empty() { right -= 1; }
            }
        }

        let before = self.stations.len();
        self.stations.retain(|s| !s.is_empty());
        res.closed = before - self.stations.len();

        if let Err(e) = self.invariant() {
            panic!("Invariant violated after reallocation at t={time}: {e}");
        }
        debug!(
            class = %self.class,
            time,
            migrations = res.migrations,
            moved = res.clients_moved,
            closed = res.closed,
            "group reallocated"
        );

        res
    }

    /// Checks the three clauses listed in [Group::reallocate].
    pub fn invariant(&self) -> Result<(), InvariantViolation> {
        for level in self.class.levels().skip(1) {
            let count: usize = self.stations.iter()
                .map(|s| s.hole_count(level))
                .sum();
            if count > 1 {
                return Err(InvariantViolation::TooManyHoles { level, count, class: self.class });
            }
        }
        let count = self.stations.iter()
            .filter(|s| !s.is_full())
            .count();
        if count > 1 {
            return Err(InvariantViolation::SpreadTopHoles { count, class: self.class });
        }
        if let Some(index) = self.stations.iter().position(Station::is_empty) {
            return Err(InvariantViolation::EmptyStation { index, class: self.class });
        }

        Ok(())
    }
}
