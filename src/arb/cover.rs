//! Exact cover search (Knuth's Algorithm X over dancing links).
//!
//! The matrix lives in flat arrays: every node, column header and the root is an integer handle,
//! and its four neighbours are looked up in `left`/`right`/`up`/`down`. Covering a column unlinks
//! index entries and uncovering relinks them in reverse order, so the matrix is always restored
//! before a search call returns.

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use super::types::{SearchBudgetExceeded, SearchLimits};

/// Handle of the root header
const ROOT: usize = 0;

/// Row handle stored on header nodes
const NO_ROW: usize = usize::MAX;

/// What a finished exact cover search went through
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverSearch {
    /// Number of exact covers found
    pub solutions: usize,
    /// Search nodes expanded
    pub nodes: u64,
    /// Columns that were left with no row to cover them on some branch
    pub dead_ends: BTreeSet<usize>,
}

/// Exact cover instance over the sets of a universe of elements.
///
/// Columns are the distinct elements, in ascending order; rows are the sets, in the order given.
pub struct ExactCover<T> {
    /// Sorted distinct elements, one per column
    universe: Vec<T>,
    /// Column indices of each row
    rows: Vec<Vec<usize>>,
    /// Previous node in the same row, or previous header for headers
    left: Vec<usize>,
    /// Next node in the same row, or next header for headers
    right: Vec<usize>,
    /// Previous node in the same column
    up: Vec<usize>,
    /// Next node in the same column
    down: Vec<usize>,
    /// Column header of each node
    header: Vec<usize>,
    /// Row of each node
    row: Vec<usize>,
    /// Live nodes under each header
    size: Vec<usize>,
}

impl<T: Ord + Clone> ExactCover<T> {
    /// Builds the matrix for `sets`.
    ///
    /// The universe is the union of the sets. Repeated elements inside a set count once.
    pub fn new<'s, I>(sets: I) -> Self
    where
        I: IntoIterator<Item = &'s BTreeSet<T>>,
        T: 's,
    {
        let sets: Vec<&BTreeSet<T>> = sets.into_iter().collect();
        let universe: Vec<T> = sets
            .iter()
            .flat_map(|set| set.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rows: Vec<Vec<usize>> = sets
            .iter()
            .map(|set| {
                set.iter()
                    .filter_map(|element| universe.binary_search(element).ok())
                    .collect()
            })
            .collect();

        let mut matrix = Self {
            universe,
            rows: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            up: Vec::new(),
            down: Vec::new(),
            header: Vec::new(),
            row: Vec::new(),
            size: Vec::new(),
        };
        matrix.link_headers();
        for (index, columns) in rows.iter().enumerate() {
            matrix.link_row(index, columns);
        }
        matrix.rows = rows;
        matrix
    }

    /// Elements of the universe, one per column
    #[must_use]
    pub fn universe(&self) -> &[T] {
        &self.universe
    }

    /// Column indices covered by `row`
    #[must_use]
    pub fn row(&self, row: usize) -> &[usize] {
        &self.rows[row]
    }

    /// Number of rows
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Appends a node linked to itself and returns its index
    fn new_node(&mut self, header: usize, row: usize) -> usize {
        let node = self.left.len();
        self.left.push(node);
        self.right.push(node);
        self.up.push(node);
        self.down.push(node);
        self.header.push(header);
        self.row.push(row);
        self.size.push(0);
        node
    }

    /// Root at handle 0, then the header of column `c` at handle `c + 1`, all in one ring
    fn link_headers(&mut self) {
        let root = self.new_node(ROOT, NO_ROW);
        for column in 0..self.universe.len() {
            let node = self.new_node(column + 1, NO_ROW);
            let last = self.left[root];
            self.left[node] = last;
            self.right[node] = root;
            self.right[last] = node;
            self.left[root] = node;
        }
    }

    fn link_row(&mut self, row: usize, columns: &[usize]) {
        let mut first: Option<usize> = None;
        for &column in columns {
            let header = column + 1;
            let node = self.new_node(header, row);

            // bottom of the column
            let bottom = self.up[header];
            self.up[node] = bottom;
            self.down[node] = header;
            self.down[bottom] = node;
            self.up[header] = node;
            self.size[header] += 1;

            // end of the row ring
            if let Some(first) = first {
                let last = self.left[first];
                self.left[node] = last;
                self.right[node] = first;
                self.right[last] = node;
                self.left[first] = node;
            } else {
                first = Some(node);
            }
        }
    }

    /// Unlinks a column and every row that uses it
    fn cover(&mut self, header: usize) {
        let (left, right) = (self.left[header], self.right[header]);
        self.right[left] = right;
        self.left[right] = left;

        let mut i = self.down[header];
        while i != header {
            let mut j = self.right[i];
            while j != i {
                let (up, down) = (self.up[j], self.down[j]);
                self.down[up] = down;
                self.up[down] = up;
                self.size[self.header[j]] -= 1;
                j = self.right[j];
            }
            i = self.down[i];
        }
    }

    /// Undoes [`Self::cover`], in reverse order
    fn uncover(&mut self, header: usize) {
        let mut i = self.up[header];
        while i != header {
            let mut j = self.left[i];
            while j != i {
                self.size[self.header[j]] += 1;
                let (up, down) = (self.up[j], self.down[j]);
                self.down[up] = j;
                self.up[down] = j;
                j = self.left[j];
            }
            i = self.up[i];
        }

        let (left, right) = (self.left[header], self.right[header]);
        self.right[left] = header;
        self.left[right] = header;
    }

    /// The live column with the fewest rows, lowest column first on ties
    fn least_covered_column(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut header = self.right[ROOT];
        while header != ROOT {
            if best.map_or(true, |b| self.size[header] < self.size[b]) {
                best = Some(header);
            }
            header = self.right[header];
        }
        best
    }

    /// Calls `visit` with the rows of every exact cover, in search order.
    ///
    /// The rows of a cover are given in the order they were chosen.
    ///
    /// # Errors
    ///
    /// Returns [`SearchBudgetExceeded`] if more than `limits.max_nodes` nodes were expanded.
    /// The matrix is fully restored in that case too.
    pub fn for_each_solution<F>(
        &mut self,
        limits: SearchLimits,
        mut visit: F,
    ) -> Result<CoverSearch, SearchBudgetExceeded>
    where
        F: FnMut(&[usize]),
    {
        let mut search = CoverSearch::default();
        let mut partial = Vec::new();
        match self.search(&mut partial, &mut search, limits, &mut visit) {
            ControlFlow::Continue(()) => Ok(search),
            ControlFlow::Break(exceeded) => Err(exceeded),
        }
    }

    /// Extends `partial` over the columns left, passing every complete cover to `visit`
    fn search<F>(
        &mut self,
        partial: &mut Vec<usize>,
        search: &mut CoverSearch,
        limits: SearchLimits,
        visit: &mut F,
    ) -> ControlFlow<SearchBudgetExceeded>
    where
        F: FnMut(&[usize]),
    {
        let Some(header) = self.least_covered_column() else {
            search.solutions += 1;
            visit(partial);
            return ControlFlow::Continue(());
        };

        search.nodes += 1;
        if limits.exceeded(search.nodes) {
            return ControlFlow::Break(SearchBudgetExceeded {
                nodes: search.nodes,
            });
        }

        if self.size[header] == 0 {
            search.dead_ends.insert(header - 1);
            return ControlFlow::Continue(());
        }

        self.cover(header);
        let mut flow = ControlFlow::Continue(());
        let mut r = self.down[header];
        while r != header {
            partial.push(self.row[r]);
            let mut j = self.right[r];
            while j != r {
                self.cover(self.header[j]);
                j = self.right[j];
            }

            flow = self.search(partial, search, limits, visit);

            let mut j = self.left[r];
            while j != r {
                self.uncover(self.header[j]);
                j = self.left[j];
            }
            partial.pop();

            if flow.is_break() {
                break;
            }
            r = self.down[r];
        }
        self.uncover(header);
        flow
    }
}
