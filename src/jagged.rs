//! Append-only row-variable 2D container (C1).
//!
//! Grouping builds several of these: the per-species dependency lists
//! (`U3`), the partial-propensity matrix `Π`, and the reaction-lookup
//! table `aruL` of the reference engine. Rows are populated in species
//! order, independently of each other and out of order with respect to
//! reaction index, which is why this is a `Vec` of per-row `Vec`s rather
//! than one flat buffer with row-start offsets (spec §9 suggests the flat
//! layout as an option; it needs row lengths known in advance, which
//! grouping does not have until it has walked the whole network).

#[derive(Debug, Clone, Default)]
pub struct JaggedMatrix<T> {
    rows: Vec<Vec<T>>,
}

impl<T> JaggedMatrix<T> {
    pub fn new() -> Self {
        JaggedMatrix { rows: Vec::new() }
    }

    /// Pre-size for `rows` rows, each expected to hold about `col_hint`
    /// entries. Grouping calls this once it knows the species count and a
    /// rough reactions-per-species ratio.
    pub fn reserve(&mut self, rows: usize, col_hint: usize) {
        if self.rows.len() < rows {
            self.rows.resize_with(rows, Vec::new);
        }
        for row in &mut self.rows {
            row.reserve(col_hint);
        }
    }

    /// Appends `value` to the end of `row`, growing the row table if
    /// necessary, and returns the column index it was stored at.
    pub fn push(&mut self, row: usize, value: T) -> usize {
        if row >= self.rows.len() {
            self.rows.resize_with(row + 1, Vec::new);
        }
        self.rows[row].push(value);
        self.rows[row].len() - 1
    }

    pub fn rows_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get_cols(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, Vec::len)
    }

    pub fn row(&self, row: usize) -> &[T] {
        self.rows.get(row).map_or(&[], Vec::as_slice)
    }

    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.rows[row][col]
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        &mut self.rows[row][col]
    }
}
