/// The position of a cell in the arena of a [`Matrix`].
///
/// Every link of the toroidal structure (left, right, up, down and the
/// column head) is stored as one of these indices instead of a reference,
/// which is what lets the cyclic graph live in a plain [`Vec`].
///
/// [`Matrix`]: `crate::matrix::Matrix`
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct CellIndex(usize);

impl CellIndex {
    /// Creates a new index.
    #[must_use]
    pub const fn new(ix: usize) -> Self {
        Self(ix)
    }

    /// Returns the index value as a primitive type.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// The 0-based index of a constraint, as supplied by callers of
/// [`Dlx::add_choice`].
///
/// Column headers are laid out right after the root of the arena, so the
/// header of constraint $i$ sits at cell position $i+1$ in a freshly built
/// [`Matrix`]. Forked copies compact their arena and drop this property.
///
/// [`Dlx::add_choice`]: `crate::Dlx::add_choice`
/// [`Matrix`]: `crate::matrix::Matrix`
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct ColumnIndex(usize);

impl ColumnIndex {
    /// Creates a new index.
    #[must_use]
    pub const fn new(ix: usize) -> Self {
        Self(ix)
    }

    /// Returns the position of this column's header in a freshly built arena.
    #[must_use]
    pub const fn header(self) -> CellIndex {
        CellIndex(self.0 + 1)
    }
}

/// The position of a choice, in registration order. It doubles as the
/// position of the choice's label in the label table of a search.
#[derive(Debug, Eq, PartialEq, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct RowIndex(usize);

impl RowIndex {
    /// Creates a new index.
    #[must_use]
    pub const fn new(ix: usize) -> Self {
        Self(ix)
    }

    /// Returns the index value as a primitive type.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}
