use crate::helpe::*;

//---START TREE ARITHMETIC
#[inline(always)]
fn parent(pos: usize) -> usize {
    pos / 2
}

#[inline(always)]
fn sibling(pos: usize) -> usize {
    debug_assert!(pos > 1, "The root has no sibling");
    pos ^ 1
}

/// The child a placement keeps descending into.
#[inline(always)]
fn left_child(pos: usize) -> usize {
    2 * pos
}

/// The child that becomes free when a placement descends.
#[inline(always)]
fn right_child(pos: usize) -> usize {
    2 * pos + 1
}

/// Turns a hole at `pos` into a hole at the highest possible ancestor,
/// merging buddies on the way up.
fn merge_up(tree: &mut [Slot], mut pos: usize) {
    debug_assert!(tree[pos] == Slot::Hole);
    while pos > 1 {
        let buddy = sibling(pos);
        if tree[buddy] != Slot::Hole { break; }
        tree[pos] = Slot::Absent;
        tree[buddy] = Slot::Absent;
        pos = parent(pos);
        tree[pos] = Slot::Hole;
    }
}

/// A fresh tree: one hole at the root, nothing else.
fn pristine_tree(width: usize) -> Vec<Slot> {
    let mut tree = vec![Slot::Absent; width];
    tree[1] = Slot::Hole;

    tree
}
//---END TREE ARITHMETIC

impl Station {
    /// Creates an empty [Station] for `class`, with a hole at the root
    /// of each of its `w_min` trees.
    pub fn new(class: LaxityClass) -> Self {
        let width = class.tree_width();
        Self {
            w_max:  class.w_max,
            w_min:  class.w_min,
            trees:  (0..class.w_min).map(|_| pristine_tree(width)).collect(),
        }
    }

    pub fn class(&self) -> LaxityClass {
        LaxityClass::new(self.w_min, self.w_max)
    }

    pub fn trees(&self) -> &[Vec<Slot>] {
        &self.trees
    }

    /// Tree positions that belong to laxity level `level`.
    #[inline(always)]
    fn level_span(&self, level: Laxity) -> std::ops::Range<usize> {
        debug_assert!(level.is_power_of_two(), "Level {level} is not a power of two");
        debug_assert!(level >= self.w_min && level < self.w_max, "Level {level} outside [{},{})", self.w_min, self.w_max);
        level / self.w_min..2 * level / self.w_min
    }

    /// Tries to put `client` under the first hole of level `level`
    /// (trees scanned in order). If the hole is bigger than the client
    /// needs, a caterpillar is laid down to the client's own level:
    /// every step marks the current position absent and frees its
    /// right child.
    ///
    /// Returns `false` if no tree has a hole at that level.
    pub fn place(&mut self, client: Client, level: Laxity) -> bool {
        debug_assert!(level <= client.laxity, "Client {} cannot fit a level-{level} hole", client.id);
        let span = self.level_span(level);
        let target = client.laxity / self.w_min;
        for tree in self.trees.iter_mut() {
            if let Some(mut pos) = span.clone().find(|&i| tree[i] == Slot::Hole) {
                // Ancestors are already absent, and so are descendants:
                // no hole is ever nested inside another hole.
                while pos < target {
                    tree[pos] = Slot::Absent;
                    tree[right_child(pos)] = Slot::Hole;
                    pos = left_child(pos);
                }
                tree[pos] = Slot::Occupied(client);
                return true;
            }
        }

        false
    }

    /// Places `client` at the smallest free level that fits it, scanning
    /// from its own laxity up to the top of the station.
    pub fn place_anywhere(&mut self, client: Client) -> bool {
        let mut level = client.laxity;
        while level >= self.w_min {
            if self.place(client, level) { return true; }
            level /= 2;
        }

        false
    }

    /// Frees the position of client `id` and merges holes up to the
    /// root. Returns `false` if the client does not live here.
    pub fn remove(&mut self, id: ClientId) -> bool {
        for tree in self.trees.iter_mut() {
            let found = tree.iter()
                .position(|s| matches!(s, Slot::Occupied(c) if c.id == id));
            if let Some(pos) = found {
                tree[pos] = Slot::Hole;
                merge_up(tree, pos);
                return true;
            }
        }

        false
    }

    /// Moving clients within a station is free, so we simply take them
    /// all out, reset the station, and put them back in collection
    /// order. Every client fits again: placement always picks the
    /// smallest fitting hole, which keeps at most one hole per level
    /// and tree below the top.
    pub fn local_defragment(&mut self) {
        let tenants: Vec<Client> = self.occupants().copied().collect();
        let width = self.w_max / self.w_min;
        for tree in self.trees.iter_mut() {
            *tree = pristine_tree(width);
        }
        for c in tenants {
            if !self.place_anywhere(c) {
                panic!("Client {} lost while defragmenting station of class [{},{})", c.id, self.w_min, self.w_max);
            }
        }
    }

    /// Returns (tree, position) of the first hole at `level`.
    pub fn find_hole(&self, level: Laxity) -> Option<(usize, usize)> {
        let span = self.level_span(level);
        self.trees.iter()
            .enumerate()
            .find_map(|(t, tree)| {
                span.clone()
                    .find(|&i| tree[i] == Slot::Hole)
                    .map(|i| (t, i))
            })
    }

    /// Returns (tree, position) of the subtree that would merge with a
    /// hole at `level` if it were gone.
    ///
    /// At the top level that is any tree whose root is not a hole. Below
    /// it is the buddy of the first hole found.
    ///
    /// # Panics
    /// If the buddy is a hole too, since two buddy holes should have been
    /// merged already.
    pub fn find_sibling_of_hole(&self, level: Laxity) -> Option<(usize, usize)> {
        if level == self.w_min {
            return self.trees.iter()
                .position(|tree| tree[1] != Slot::Hole)
                .map(|t| (t, 1));
        }
        let (t, pos) = self.find_hole(level)?;
        let buddy = sibling(pos);
        if self.trees[t][buddy] == Slot::Hole {
            panic!("Unexpected sibling holes at level {level}, tree {t}, positions {pos} and {buddy}");
        }

        Some((t, buddy))
    }

    /// Moves the hole-sibling subtree of `origin` at `level` into the
    /// first hole of `destination` at the same level. Descendants are
    /// copied position by position, placeholders included, and every
    /// client carried over is stamped with `time`. The origin then
    /// merges its holes upwards as if the subtree had departed.
    ///
    /// Returns the number of clients moved.
    pub fn migrate(
        destination:    &mut Station,
        origin:         &mut Station,
        level:          Laxity,
        time:           Tick,
    ) -> Result<usize, MigrateError> {
        assert!(
            destination.w_min == origin.w_min && destination.w_max == origin.w_max,
            "Origin and destination classes do not match"
        );
        let (dt, dp) = destination.find_hole(level)
            .ok_or(MigrateError::NoDestinationHole(level))?;
        let (ot, op) = origin.find_sibling_of_hole(level)
            .ok_or(MigrateError::NoOriginSibling(level))?;

        let w_max = destination.w_max;
        let (dest_tree, origin_tree) = (&mut destination.trees[dt], &mut origin.trees[ot]);
        let mut moved = 0;
        // Subtree rooted at p: p, 2p..2p+1, 4p..4p+3, ...
        let mut mult = 1;
        while mult * level < w_max {
            for offset in 0..mult {
                let vacated = if mult == 1 { Slot::Hole } else { Slot::Absent };
                let mut slot = std::mem::replace(&mut origin_tree[op * mult + offset], vacated);
                if let Slot::Occupied(ref mut c) = slot {
                    c.last_realloc = Some(time);
                    moved += 1;
                }
                dest_tree[dp * mult + offset] = slot;
            }
            mult *= 2;
        }
        merge_up(origin_tree, op);

        Ok(moved)
    }

    //---START OCCUPANCY QUERIES
    pub fn hole_count(&self, level: Laxity) -> usize {
        let span = self.level_span(level);
        self.trees.iter()
            .map(|tree| tree[span.clone()].iter().filter(|s| **s == Slot::Hole).count())
            .sum()
    }

    #[inline(always)]
    pub fn has_hole(&self, level: Laxity) -> bool {
        self.find_hole(level).is_some()
    }

    #[inline(always)]
    pub fn top_hole_count(&self) -> usize {
        self.hole_count(self.w_min)
    }

    /// Every tree is entirely free.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.top_hole_count() == self.w_min
    }

    /// No tree is entirely free.
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.top_hole_count() == 0
    }

    /// Clients in tree order, then position order.
    pub fn occupants(&self) -> impl Iterator<Item = &Client> {
        self.trees.iter()
            .flatten()
            .filter_map(|s| match s {
                Slot::Occupied(c)   => Some(c),
                _                   => None,
            })
    }

    pub fn occupied_count(&self) -> usize {
        self.occupants().count()
    }

    pub fn find(&self, id: ClientId) -> Option<&Client> {
        self.occupants().find(|c| c.id == id)
    }

    /// Total weight of the clients held, `1.0` being a full station.
    pub fn load(&self) -> f64 {
        self.occupants()
            .map(Client::weight)
            .fold(0.0, |acc, w| acc + w)
    }
    //---END OCCUPANCY QUERIES
}

/// One line per tree: `1` for a client, `0` for a hole, `.` otherwise.
impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tree in &self.trees {
            let row: String = tree.iter()
                .skip(1)
                .map(|s| match s {
                    Slot::Occupied(_)   => '1',
                    Slot::Hole          => '0',
                    Slot::Absent        => '.',
                })
                .collect();
            writeln!(f, "{row}")?;
        }

        Ok(())
    }
}
