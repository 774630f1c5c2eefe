use crate::helpe::*;
use crate::algo::realloc::ReallocOutcome;

impl Coordinator {
    /// Creates an empty [Coordinator] that opens classes with `policy`.
    pub fn new(policy: GrowthPolicy) -> Self {
        Self {
            policy,
            groups:             vec![],
            active_weight:      0.0,
            departed_weight:    0.0,
            reallocated_weight: 0.0,
            migrations:         0,
        }
    }

    pub fn policy(&self) -> GrowthPolicy {
        self.policy
    }

    /// Routes `client` to the [Group] covering its laxity, creating the
    /// group first if none does.
    pub fn add(&mut self, client: Client) -> Result<(), LaxityError> {
        if !client.laxity.is_power_of_two() {
            return Err(LaxityError::NotPowerOfTwo(client.laxity));
        }
        let idx = match self.groups.iter().position(|g| g.covers(client.laxity)) {
            Some(idx)   => idx,
            None        => {
                let class = classify(client.laxity, self.policy)?;
                self.groups.push(Group::new(class));
                self.groups.len() - 1
            }
        };
        self.groups[idx].add(client);
        self.active_weight += client.weight();

        Ok(())
    }

    /// Takes `client` out of its group. Returns `false` if it was not
    /// found, in which case the weights stay untouched.
    pub fn delete(&mut self, client: &Client) -> bool {
        let found = self.groups.iter_mut()
            .find(|g| g.covers(client.laxity))
            .is_some_and(|g| g.delete(client.id));
        if found {
            self.active_weight -= client.weight();
            self.departed_weight += client.weight();
        }

        found
    }

    /// Runs the reallocation protocol on every non-empty group, then
    /// forgets groups left without stations.
    pub fn reallocate(&mut self, time: Tick) -> ReallocOutcome {
        let mut res = ReallocOutcome::default();
        for g in self.groups.iter_mut().filter(|g| g.station_count() > 0) {
            res += g.reallocate(time);
        }
        self.groups.retain(|g| {
            let keep = g.station_count() > 0;
            if !keep { debug!(class = %g.class(), "group dropped"); }
            keep
        });
        self.migrations += res.migrations;

        res
    }

    pub fn station_count(&self) -> usize {
        self.groups.iter()
            .map(Group::station_count)
            .sum()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    //---START WEIGHTS
    /// Σ 1/laxity over clients currently in the system.
    #[inline(always)]
    pub fn active_weight(&self) -> f64 {
        self.active_weight
    }

    /// Σ 1/laxity over clients departed since the last reset.
    #[inline(always)]
    pub fn departed_weight(&self) -> f64 {
        self.departed_weight
    }

    #[inline(always)]
    pub fn reallocated_weight(&self) -> f64 {
        self.reallocated_weight
    }

    /// No assignment can use fewer stations than this.
    #[inline(always)]
    pub fn lower_bound(&self) -> usize {
        self.active_weight.ceil() as usize
    }

    /// Recomputes the reallocated weight as the weight of the clients
    /// stamped at `time`, and returns it.
    pub fn refresh_reallocated_weight(&mut self, time: Tick) -> f64 {
        self.reallocated_weight = self.occupants()
            .filter(|c| c.is_reallocated_at(time))
            .map(Client::weight)
            .fold(0.0, |acc, w| acc + w);

        self.reallocated_weight
    }

    pub fn reset_departed_weight(&mut self) {
        self.departed_weight = 0.0;
    }
    //---END WEIGHTS

    /// Total migrations performed so far.
    pub fn migrations(&self) -> usize {
        self.migrations
    }

    pub fn occupants(&self) -> impl Iterator<Item = &Client> {
        self.groups.iter().flat_map(|g| g.occupants())
    }

    pub fn find(&self, id: ClientId) -> Option<&Client> {
        self.occupants().find(|c| c.id == id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.find(id).is_some()
    }
}

impl fmt::Display for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Structure print out:")?;
        for g in &self.groups {
            write!(f, "{g}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_insertion_and_removal() {
        let mut co = Coordinator::new(GrowthPolicy::Constant);
        let c = Client::new(1, 0, 3, 4);
        co.add(c).unwrap();
        assert_eq!(co.group_count(), 1);
        assert_eq!(co.groups()[0].class(), LaxityClass::new(4, 8));
        assert_eq!(co.station_count(), 1);
        let pristine = Station::new(LaxityClass::new(4, 8));
        let s = &co.groups()[0].stations()[0];
        assert!(matches!(s.trees()[0][1], Slot::Occupied(x) if x.id == 1));
        assert!(s.trees()[1..].iter().all(|t| t[1] == Slot::Hole));
        assert_eq!(co.lower_bound(), 1);

        assert!(co.delete(&c));
        assert_eq!(co.groups()[0].stations()[0].trees(), pristine.trees());
        let out = co.reallocate(3);
        assert_eq!(out.migrations, 0);
        assert_eq!(co.group_count(), 0);
        assert_eq!(co.station_count(), 0);
    }

    #[test]
    fn weights_follow_arrivals_and_departures() {
        let mut co = Coordinator::new(GrowthPolicy::Constant);
        let a = Client::new(1, 0, 5, 2);
        let b = Client::new(2, 0, 5, 4);
        co.add(a).unwrap();
        co.add(b).unwrap();
        assert_eq!(co.active_weight(), 0.75);
        assert_eq!(co.group_count(), 2);
        assert!(co.delete(&a));
        assert_eq!(co.active_weight(), 0.25);
        assert_eq!(co.departed_weight(), 0.5);
        // Second delete of the same client is a miss.
        assert!(!co.delete(&a));
        assert_eq!(co.departed_weight(), 0.5);
        co.reset_departed_weight();
        assert_eq!(co.departed_weight(), 0.0);
    }

    #[test]
    fn reallocated_weight_counts_stamped_clients_only() {
        let mut co = Coordinator::new(GrowthPolicy::Constant);
        let clients: Vec<Client> = (1..=4).map(|id| Client::new(id, 0, 9, 2)).collect();
        for c in &clients {
            co.add(*c).unwrap();
        }
        assert_eq!(co.station_count(), 2);
        assert!(co.delete(&clients[1]));
        assert!(co.delete(&clients[3]));
        let out = co.reallocate(4);
        assert_eq!(out.migrations, 1);
        assert_eq!(co.migrations(), 1);
        assert_eq!(co.station_count(), 1);
        assert_eq!(co.refresh_reallocated_weight(4), 0.5);
        let idle = co.refresh_reallocated_weight(5);
        assert!(idle == 0.0 && idle.is_sign_positive());
        assert_eq!(co.reallocated_weight().to_string(), "0");
        assert!(co.contains(3) && !co.contains(4));
    }

    #[test]
    fn bad_laxity_is_refused() {
        let mut co = Coordinator::new(GrowthPolicy::Quadratic);
        assert_eq!(co.policy(), GrowthPolicy::Quadratic);
        co.add(Client::new(1, 0, 1, 4)).unwrap();
        // Class [4,16) would cover 12, but it is not a power of two.
        assert_eq!(co.add(Client::new(2, 0, 1, 12)), Err(LaxityError::NotPowerOfTwo(12)));
        assert_eq!(co.add(Client::new(3, 0, 1, 0)), Err(LaxityError::NotPowerOfTwo(0)));
        assert_eq!(co.active_weight(), 0.25);
    }

    #[test]
    fn dump_lists_groups() {
        let mut co = Coordinator::new(GrowthPolicy::Constant);
        co.add(Client::new(1, 0, 1, 1)).unwrap();
        assert_eq!(co.to_string(), "Structure print out:\nClass [1,2) with 1 stations.\n1\n");
    }
}
