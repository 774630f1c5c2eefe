use crate::helpe::*;

/// Initializes a [ClientSet] from raw clients.
/// A successfully returned set is guaranteed to be compliant with
/// all of the engine's assumptions. These are:
/// - every id is strictly positive and unique
/// - every laxity is a positive power of two
/// - no client departs before it arrives
/// - no client has been reallocated yet
///
/// Trace order is kept as is. This function is the gatekeeper to the
/// rest of the library.
pub fn init(in_clients: Vec<Client>) -> Result<ClientSet, ClientError> {
    let mut seen: IndexMap<ClientId, usize> = IndexMap::with_capacity(in_clients.len());
    for (idx, c) in in_clients.iter().enumerate() {
        let message = if c.id == 0 {
            Some("Client with id 0 found!")
        } else if c.laxity == 0 {
            Some("Client with 0 laxity found!")
        } else if !c.laxity.is_power_of_two() {
            Some("Client with non power-of-two laxity found!")
        } else if c.arrival > c.departure {
            Some("Client with arrival > departure found!")
        } else if c.last_realloc.is_some() {
            Some("Unoriginal client found! (already reallocated)")
        } else if seen.insert(c.id, idx).is_some() {
            Some("Input contains a duplicate client.")
        } else {
            None
        };
        if let Some(m) = message {
            return Err(ClientError {
                message: String::from(m),
                culprit: *c,
            });
        }
    }

    Ok(in_clients)
}

/// Last departure time of the set, i.e. the final step of a run.
#[inline(always)]
pub fn horizon(clients: &[Client]) -> Option<Tick> {
    clients.iter()
        .map(|c| c.departure)
        .max()
}

/// Highest total weight simultaneously active. Its ceiling is the best
/// number of stations any assignment could hope for at that moment.
pub fn peak_weight(clients: &[Client]) -> f64 {
    // Arrivals at t count until the end of t, departures take effect
    // right after it.
    let mut deltas: BTreeMap<Tick, (f64, f64)> = BTreeMap::new();
    for c in clients {
        deltas.entry(c.arrival).or_default().0 += c.weight();
        deltas.entry(c.departure).or_default().1 += c.weight();
    }
    let (mut running, mut max) = (0.0, 0.0_f64);
    for (arrived, departed) in deltas.values() {
        running += arrived;
        max = max.max(running);
        running -= departed;
    }

    max
}

/// Number of clients per laxity, smallest laxity first.
pub fn laxity_histogram(clients: &[Client]) -> BTreeMap<Laxity, usize> {
    clients.iter()
        .map(|c| c.laxity)
        .counts()
        .into_iter()
        .collect()
}
