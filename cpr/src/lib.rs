//! Welcome to `cpr`!
//!
//! `cpr` assigns arriving clients to indivisible resource units
//! ("stations"), keeps the number of active stations close to the
//! information-theoretic minimum, and restores that bound after
//! departures by migrating a small number of clients between stations.
//!
//! Structurally it is a buddy allocator with periodic, cost-bounded
//! defragmentation:
//!
//! 1. Clients are classified by their [laxity](Client::laxity) into
//!     half-open ranges `[w_min, w_max)` (see [`classify`]).
//! 2. Each range is served by a [`Group`] of [`Station`]s.
//! 3. Each [`Station`] is made of `w_min` complete binary trees, in which
//!     a client of laxity `l` occupies one node of the level `l`.
//!
//! The [`Coordinator`] ties everything together and is what a driver
//! (such as [`algo::simulate`]) talks to.

mod client;
mod station;
mod group;
mod coordinator;

pub mod algo;
pub mod classify;
pub mod clientset;
pub mod helpe;

pub use crate::helpe::*;

/// Our fundamental unit of interest. A [`Client`] arrives at logical time
/// [`arrival`](Client::arrival), stays until [`departure`](Client::departure),
/// and while active needs `1 / laxity` of a station.
///
/// > ***ATTENTION:*** laxity must be a power of two. Traces that are not
/// > aligned get rounded down at ingestion (see [`round_down_pow2`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Client {
    /// Unique and strictly positive.
    pub id:             ClientId,
    pub arrival:        Tick,
    pub departure:      Tick,
    pub laxity:         Laxity,
    /// The only mutable part of a client: the last time step in which
    /// it was migrated to another station. `None` means never.
    pub last_realloc:   Option<Tick>,
}

/// The state of a single tree position inside a [`Station`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Exclusively taken by a client.
    Occupied(Client),
    /// Free capacity, immediately allocatable at this position's level.
    Hole,
    /// Capacity accounted for by an ancestor, or not relevant yet.
    Absent,
}

/// A fixed-capacity buddy allocator for one laxity class.
///
/// Implemented as `w_min` trees (rows), each an array of `w_max / w_min`
/// positions. Position 0 is unused; the children of `i` are `2i` and
/// `2i + 1`, its parent `i / 2`. The root covers laxity `w_min`, and the
/// positions of laxity level `l` are `[l / w_min, 2l / w_min)`.
#[derive(Debug, Clone)]
pub struct Station {
    w_max:  Laxity,
    w_min:  Laxity,
    trees:  Vec<Vec<Slot>>,
}

/// All active stations serving one laxity class.
#[derive(Debug, Clone)]
pub struct Group {
    class:      classify::LaxityClass,
    stations:   Vec<Station>,
}

/// Owns every [`Group`], routes arrivals/departures to them, and keeps
/// the aggregate weights from which the run metrics are derived.
#[derive(Debug, Clone)]
pub struct Coordinator {
    policy:             GrowthPolicy,
    groups:             Vec<Group>,
    active_weight:      f64,
    departed_weight:    f64,
    reallocated_weight: f64,
    migrations:         usize,
}
