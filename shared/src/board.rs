//! Board capture engine.
//!
//! The board is a sparse map from cell to owning player id. Every operation
//! is bounds-checked and treats impossible requests (out of range, already
//! claimed) as no-ops that return an empty delta, so late or duplicated client
//! clicks are harmless. Deltas are always sorted by `(x, y)` which keeps the
//! server and client mirrors byte-for-byte identical.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

impl Cell {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: u32,
    height: u32,
    owners: BTreeMap<Cell, u32>,
}

impl Board {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            owners: BTreeMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    pub fn owner(&self, cell: Cell) -> Option<u32> {
        self.owners.get(&cell).copied()
    }

    /// Number of claimed cells.
    pub fn claimed(&self) -> usize {
        self.owners.len()
    }

    pub fn is_full(&self) -> bool {
        self.owners.len() as u64 == self.width as u64 * self.height as u64
    }

    /// Changes the dimensions and drops all ownership.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.owners.clear();
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }

    /// Claims an unclaimed cell for `player`.
    pub fn place(&mut self, player: u32, cell: Cell) -> Vec<Cell> {
        if !self.contains(cell) || self.owners.contains_key(&cell) {
            return Vec::new();
        }
        self.owners.insert(cell, player);
        vec![cell]
    }

    /// Flood fills from `origin` over every cell not owned by `player`.
    ///
    /// The flood is 4-connected, stops at the board edges and at cells
    /// `player` already owns. Cells owned by other players inside the region
    /// change hands.
    pub fn fill(&mut self, player: u32, origin: Cell) -> Vec<Cell> {
        let region = self.region(player, origin);
        for cell in &region {
            self.owners.insert(*cell, player);
        }
        region
    }

    /// Places `cell` and captures whatever the placement encloses.
    ///
    /// After a successful placement the cells around it that `player` does
    /// not own are grouped into connected regions. When the new cell split
    /// its surroundings into more than one region, every region smaller than
    /// the largest is enclosed and gets filled. Regions tied for largest are
    /// left alone.
    pub fn capture(&mut self, player: u32, cell: Cell) -> Vec<Cell> {
        let mut delta = self.place(player, cell);
        if delta.is_empty() {
            return delta;
        }

        let mut regions: Vec<Vec<Cell>> = Vec::new();
        for neighbour in self.neighbours(cell).collect::<Vec<_>>() {
            if self.owner(neighbour) == Some(player)
                || regions.iter().any(|r| r.binary_search(&neighbour).is_ok())
            {
                continue;
            }
            regions.push(self.region(player, neighbour));
        }

        if regions.len() < 2 {
            return delta;
        }

        let largest = regions.iter().map(Vec::len).max().unwrap_or(0);
        for region in regions.into_iter().filter(|r| r.len() < largest) {
            delta.extend(self.fill(player, region[0]));
        }
        delta.sort_unstable();
        delta
    }

    /// Applies a server-confirmed delta; out-of-range cells are skipped.
    pub fn apply(&mut self, player: u32, cells: &[Cell]) -> usize {
        let mut applied = 0;
        for cell in cells {
            if self.contains(*cell) {
                self.owners.insert(*cell, player);
                applied += 1;
            }
        }
        applied
    }

    /// Cells owned per player.
    pub fn scores(&self) -> BTreeMap<u32, usize> {
        let mut scores = BTreeMap::new();
        for owner in self.owners.values() {
            *scores.entry(*owner).or_insert(0) += 1;
        }
        scores
    }

    pub fn cells_by_owner(&self) -> BTreeMap<u32, Vec<Cell>> {
        let mut grouped: BTreeMap<u32, Vec<Cell>> = BTreeMap::new();
        for (cell, owner) in &self.owners {
            grouped.entry(*owner).or_default().push(*cell);
        }
        grouped
    }

    pub fn unclaimed_cells(&self) -> Vec<Cell> {
        (0..self.width)
            .flat_map(|x| (0..self.height).map(move |y| Cell::new(x, y)))
            .filter(|cell| !self.owners.contains_key(cell))
            .collect()
    }

    /// Connected cells reachable from `origin` without crossing `player`'s cells.
    fn region(&self, player: u32, origin: Cell) -> Vec<Cell> {
        if !self.contains(origin) || self.owner(origin) == Some(player) {
            return Vec::new();
        }

        let mut seen = BTreeSet::from([origin]);
        let mut queue = VecDeque::from([origin]);

        while let Some(cell) = queue.pop_front() {
            for neighbour in self.neighbours(cell) {
                if self.owner(neighbour) != Some(player) && seen.insert(neighbour) {
                    queue.push_back(neighbour);
                }
            }
        }

        seen.into_iter().collect()
    }

    fn neighbours(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        let Cell { x, y } = cell;
        [
            (x.checked_sub(1), Some(y)),
            (x.checked_add(1), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), y.checked_add(1)),
        ]
        .into_iter()
        .filter_map(|(x, y)| Some(Cell::new(x?, y?)))
        .filter(move |c| self.contains(*c))
    }
}
