use crate::error::{Error, Result};
use crate::indices::{CellIndex, ColumnIndex, RowIndex};
use std::collections::{BTreeSet, VecDeque};

/// A node in the toroidal data structure of a [`Matrix`].
///
/// A cell is either a _column header_, which heads the vertical list of a
/// constraint and is its own `column`, or a _regular cell_ that represents
/// one constraint of a choice. The root of the horizontal list of active
/// primary columns is a header-like cell that belongs to no column.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub(crate) struct Cell {
    /// The previous cell in a (horizontal) list, in cyclic order. For a
    /// header this is the list of active primary columns; for a regular cell
    /// it is the list of cells of the same choice. The contents of this
    /// variable are preserved when the cell is removed from such a list.
    ///
    /// This field corresponds to the `L` link in Knuth's data structure.
    left: CellIndex,
    /// The next cell in a (horizontal) list, in cyclic order.
    ///
    /// This field corresponds to the `R` link in Knuth's data structure.
    right: CellIndex,
    /// The previous cell in the vertical list of `column`, in cyclic order.
    ///
    /// This field corresponds to the `U` link in Knuth's data structure.
    up: CellIndex,
    /// The next cell in the vertical list of `column`, in cyclic order.
    ///
    /// This field corresponds to the `D` link in Knuth's data structure.
    down: CellIndex,
    /// The header of the column that contains this cell.
    ///
    /// This field corresponds to the `C` link in Knuth's data structure.
    column: CellIndex,
    /// The choice this cell belongs to, or [`None`] for headers.
    row: Option<RowIndex>,
    /// The number of active cells in the vertical list of this column.
    /// Only meaningful for headers.
    ///
    /// This field corresponds to the `S` member in Knuth's data structure.
    len: usize,
}

impl Cell {
    /// Creates a header whose links all point to itself.
    fn header(ix: CellIndex) -> Self {
        Self {
            left: ix,
            right: ix,
            up: ix,
            down: ix,
            column: ix,
            row: None,
            len: 0,
        }
    }
}

/// The position of the special cell in the arena of a [`Matrix`] that serves
/// as the head of the list of active _primary_ columns; Knuth called this the
/// _root_ in the paper "Dancing links", [arXiv:cs/0011047][dl] [cs.DS] (2000).
///
/// Secondary columns are never linked into this list, so they can be covered
/// like any other column but do not need to be covered for a solution.
///
/// [dl]: https://arxiv.org/pdf/cs/0011047.pdf
pub(crate) const ROOT: CellIndex = CellIndex::new(0);

/// A sparse 0/1 matrix of choices versus constraints, represented as Knuth's
/// toroidal doubly linked structure on top of an arena of [cells](`Cell`).
#[derive(Debug, Clone)]
pub(crate) struct Matrix {
    /// The root, followed by the column headers and then the regular cells
    /// in registration order.
    cells: Vec<Cell>,
    /// The number of declared constraints.
    columns: usize,
    /// The number of registered choices.
    rows: usize,
    /// The number of regular cells.
    elements: usize,
}

impl Matrix {
    // Problem setup routines.

    /// Creates a matrix with `columns` empty columns, where those whose index
    /// is in `secondary` do not take part in the horizontal list of columns
    /// that must be covered.
    pub(crate) fn new(columns: usize, secondary: &BTreeSet<usize>) -> Self {
        let mut cells = Vec::with_capacity(columns + 1);
        cells.push(Cell::header(ROOT));
        let mut matrix = Self {
            cells,
            columns,
            rows: 0,
            elements: 0,
        };
        for ix in 0..columns {
            let header = ColumnIndex::new(ix).header();
            matrix.cells.push(Cell::header(header));
            if !secondary.contains(&ix) {
                // Insert the header to the left of the root, at the end of
                // the horizontal list.
                matrix.insert_left_of(ROOT, header);
            }
        }
        matrix
    }

    /// Appends a choice covering the given constraints, which must be
    /// strictly increasing and less than the number of columns.
    ///
    /// On failure the matrix is left untouched.
    pub(crate) fn add_choice(&mut self, indices: &[usize]) -> Result<RowIndex> {
        let Some(&last) = indices.last() else {
            return Err(Error::EmptyChoice);
        };
        for (position, pair) in indices.windows(2).enumerate() {
            if pair[0] == pair[1] {
                return Err(Error::DuplicateIndex { index: pair[0] });
            }
            if pair[0] > pair[1] {
                return Err(Error::UnorderedIndices {
                    position: position + 1,
                });
            }
        }
        if last >= self.columns {
            return Err(Error::IndexOutOfRange {
                index: last,
                constraints: self.columns,
            });
        }

        let row = RowIndex::new(self.rows);
        self.rows += 1;
        self.elements += indices.len();
        self.cells.reserve(indices.len());
        let first = CellIndex::new(self.cells.len());
        for &ix in indices {
            let column = ColumnIndex::new(ix).header();
            let cell = CellIndex::new(self.cells.len());
            self.cells.push(Cell {
                left: cell,
                right: cell,
                up: cell,
                down: cell,
                column,
                row: Some(row),
                len: 0,
            });
            // Append the cell to the bottom of the vertical list.
            self.insert_above(column, cell);
            if cell != first {
                self.insert_left_of(first, cell);
            }
        }
        Ok(row)
    }

    /// Links `cell` into the horizontal list of `anchor`, immediately to its
    /// left.
    fn insert_left_of(&mut self, anchor: CellIndex, cell: CellIndex) {
        let left = self.cell(anchor).left;
        let new = self.cell_mut(cell);
        new.left = left;
        new.right = anchor;
        self.cell_mut(left).right = cell;
        self.cell_mut(anchor).left = cell;
    }

    /// Links `cell` into the vertical list of `column`, immediately above
    /// the header.
    fn insert_above(&mut self, column: CellIndex, cell: CellIndex) {
        let up = self.cell(column).up;
        let new = self.cell_mut(cell);
        new.up = up;
        new.down = column;
        self.cell_mut(up).down = cell;
        let header = self.cell_mut(column);
        header.up = cell;
        header.len += 1;
    }

    // Algorithm X routines.

    /// Covers the column that contains `ix`, by deleting its header from the
    /// horizontal list of active columns and deleting every row that meets
    /// the column from the vertical lists of the other columns it touches.
    ///
    /// Returns the number of links updated, counting the removal of the
    /// header as one.
    pub(crate) fn cover_column(&mut self, ix: CellIndex) -> u64 {
        let column = self.cell(ix).column;
        let (left, right) = (self.cell(column).left, self.cell(column).right);
        self.cell_mut(right).left = left;
        self.cell_mut(left).right = right;

        let mut updates = 1;
        // Hide the rows from top to bottom, and the cells of each row from
        // left to right.
        let mut i = self.cell(column).down;
        while i != column {
            let mut j = self.cell(i).right;
            while j != i {
                let Cell { up, down, column, right, .. } = *self.cell(j);
                self.cell_mut(down).up = up;
                self.cell_mut(up).down = down;
                self.cell_mut(column).len -= 1;
                updates += 1;
                j = right;
            }
            i = self.cell(i).down;
        }
        updates
    }

    /// Undoes the updates made by the last [covering](`Self::cover_column`)
    /// of the column that contains `ix`, visiting the cells in the opposite
    /// order.
    ///
    /// The matrix cannot tell whether columns are uncovered in the reverse
    /// order of their covering; callers are responsible for that discipline.
    pub(crate) fn uncover_column(&mut self, ix: CellIndex) {
        let column = self.cell(ix).column;
        let mut i = self.cell(column).up;
        while i != column {
            let mut j = self.cell(i).left;
            while j != i {
                let Cell { up, down, column, left, .. } = *self.cell(j);
                self.cell_mut(column).len += 1;
                self.cell_mut(down).up = j;
                self.cell_mut(up).down = j;
                j = left;
            }
            i = self.cell(i).up;
        }

        let (left, right) = (self.cell(column).left, self.cell(column).right);
        self.cell_mut(right).left = column;
        self.cell_mut(left).right = column;
    }

    /// Finds an active primary column with the fewest active rows, the
    /// "minimum remaining values" heuristic. In case of equality, ties are
    /// broken by the position of the column within the horizontal list.
    ///
    /// Returns `None` if every primary column has been covered.
    pub(crate) fn select_column(&self) -> Option<CellIndex> {
        let mut min_len = usize::MAX;
        let mut min_ix = None;
        let mut cur_ix = self.cell(ROOT).right;
        while cur_ix != ROOT {
            let column = self.cell(cur_ix);
            if column.len < min_len {
                // A column without rows is surely the result.
                if column.len == 0 {
                    return Some(cur_ix);
                }
                min_len = column.len;
                min_ix = Some(cur_ix);
            }
            cur_ix = column.right;
        }
        min_ix
    }

    /// Produces an independent copy of the part of the matrix reachable from
    /// the root and from the cells in `stack`, together with the positions of
    /// the `stack` cells in the copy.
    ///
    /// The copy is built by a breadth-first traversal over all four links and
    /// the column link, with a mapping table from old to new positions; the
    /// links are rewritten through the table once every reachable cell has
    /// been assigned a slot. The root keeps position 0.
    pub(crate) fn fork(&self, stack: &[CellIndex]) -> (Matrix, Vec<CellIndex>) {
        let mut mapping: Vec<Option<CellIndex>> = vec![None; self.cells.len()];
        let mut order = Vec::new();
        let mut worklist = VecDeque::new();
        for &start in std::iter::once(&ROOT).chain(stack) {
            if mapping[start.get()].is_some() {
                continue;
            }
            mapping[start.get()] = Some(CellIndex::new(order.len()));
            order.push(start);
            worklist.push_back(start);
            while let Some(ix) = worklist.pop_front() {
                let cell = self.cell(ix);
                for next in [cell.up, cell.down, cell.right, cell.left, cell.column] {
                    let slot = &mut mapping[next.get()];
                    if slot.is_none() {
                        *slot = Some(CellIndex::new(order.len()));
                        order.push(next);
                        worklist.push_back(next);
                    }
                }
            }
        }

        let remap = |ix: CellIndex| mapping[ix.get()].expect("linked cell should be reachable");
        let cells = order
            .iter()
            .map(|&ix| {
                let cell = self.cell(ix);
                Cell {
                    left: remap(cell.left),
                    right: remap(cell.right),
                    up: remap(cell.up),
                    down: remap(cell.down),
                    column: remap(cell.column),
                    row: cell.row,
                    len: cell.len,
                }
            })
            .collect();
        let stack = stack.iter().map(|&ix| remap(ix)).collect();
        let matrix = Matrix {
            cells,
            columns: self.columns,
            rows: self.rows,
            elements: self.elements,
        };
        (matrix, stack)
    }

    // Accessor methods.

    /// Returns the number of declared constraints.
    pub(crate) fn columns(&self) -> usize {
        self.columns
    }

    /// Returns the number of registered choices.
    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of regular cells, that is, the number of 1s in
    /// the matrix.
    pub(crate) fn elements(&self) -> usize {
        self.elements
    }

    /// Returns the next cell to the right of `ix`.
    pub(crate) fn right(&self, ix: CellIndex) -> CellIndex {
        self.cell(ix).right
    }

    /// Returns the next cell to the left of `ix`.
    pub(crate) fn left(&self, ix: CellIndex) -> CellIndex {
        self.cell(ix).left
    }

    /// Returns the next cell below `ix`.
    pub(crate) fn down(&self, ix: CellIndex) -> CellIndex {
        self.cell(ix).down
    }

    /// Returns the choice that contains the regular cell `ix`.
    ///
    /// # Panics
    ///
    /// This function panics if `ix` refers to a header.
    pub(crate) fn row_of(&self, ix: CellIndex) -> RowIndex {
        self.cell(ix)
            .row
            .unwrap_or_else(|| panic!("cell at index {ix:?} is a column header"))
    }

    /// Returns a reference to the cell at the given position.
    ///
    /// # Panics
    ///
    /// This function panics if the index is out of bounds.
    fn cell(&self, ix: CellIndex) -> &Cell {
        &self.cells[ix.get()]
    }

    /// Returns a mutable reference to the cell at the given position.
    ///
    /// # Panics
    ///
    /// This function panics if the index is out of bounds.
    fn cell_mut(&mut self, ix: CellIndex) -> &mut Cell {
        &mut self.cells[ix.get()]
    }
}
