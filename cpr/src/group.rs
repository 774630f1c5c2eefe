use crate::helpe::*;

impl Group {
    /// Creates a [Group] with no stations.
    pub fn new(class: LaxityClass) -> Self {
        debug!(%class, "new group");
        Self {
            class,
            stations: vec![],
        }
    }

    pub fn class(&self) -> LaxityClass {
        self.class
    }

    #[inline(always)]
    pub fn covers(&self, laxity: Laxity) -> bool {
        self.class.contains(laxity)
    }

    /// Assigns `client` to the smallest hole that fits it, scanning levels
    /// upwards from the client's own laxity and, within each level, the
    /// stations in order. If nothing fits, a new station is opened.
    pub fn add(&mut self, client: Client) {
        debug_assert!(self.covers(client.laxity), "Client {} does not belong to {}", client.id, self.class);
        let mut level = client.laxity;
        while level >= self.class.w_min {
            for station in self.stations.iter_mut() {
                if station.place(client, level) { return; }
            }
            level /= 2;
        }
        // A fresh station has a hole at the root of every tree.
        let mut fresh = Station::new(self.class);
        let placed = fresh.place(client, self.class.w_min);
        debug_assert!(placed, "Fresh station rejected client {}", client.id);
        self.stations.push(fresh);
        debug!(class = %self.class, stations = self.stations.len(), "station opened");
    }

    /// Removes client `id` from whichever station holds it. Returns `false`
    /// if no station does.
    pub fn delete(&mut self, id: ClientId) -> bool {
        self.stations.iter_mut().any(|s| s.remove(id))
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn occupants(&self) -> impl Iterator<Item = &Client> {
        self.stations.iter().flat_map(|s| s.occupants())
    }

    pub fn find(&self, id: ClientId) -> Option<&Client> {
        self.occupants().find(|c| c.id == id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.find(id).is_some()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Class {} with {} stations.", self.class, self.stations.len())?;
        for s in &self.stations {
            write!(f, "{s}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: ClientId, laxity: Laxity) -> Client {
        Client::new(id, 0, 10, laxity)
    }

    #[test]
    fn stations_open_only_when_needed() {
        let mut g = Group::new(LaxityClass::new(2, 4));
        for id in 1..=5 {
            g.add(client(id, 2));
        }
        // Two clients of laxity 2 fill a station of class [2,4).
        assert_eq!(g.station_count(), 3);
        assert!(g.stations()[..2].iter().all(Station::is_full));
        assert_eq!(g.occupants().count(), 5);
    }

    #[test]
    fn smallest_fitting_hole_wins() {
        let mut g = Group::new(LaxityClass::new(2, 16));
        g.add(client(1, 8));
        g.add(client(2, 2));
        // Holes at levels 4 and 8 in tree 0 of the only station.
        g.add(client(3, 8));
        let t = &g.stations()[0].trees()[0];
        assert!(matches!(t[5], Slot::Occupied(c) if c.id == 3));
        assert_eq!(g.station_count(), 1);
    }

    #[test]
    fn delete_reports_misses() {
        let mut g = Group::new(LaxityClass::new(4, 8));
        g.add(client(1, 4));
        assert!(g.contains(1));
        assert!(!g.delete(2));
        assert!(g.delete(1));
        assert!(!g.contains(1));
        // The emptied station lingers until the next reallocation.
        assert_eq!(g.station_count(), 1);
        assert!(g.stations()[0].is_empty());
    }

    #[test]
    fn display_lists_every_station() {
        let mut g = Group::new(LaxityClass::new(2, 4));
        g.add(client(1, 2));
        assert_eq!(g.to_string(), "Class [2,4) with 1 stations.\n1\n0\n");
    }
}
