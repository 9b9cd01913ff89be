//! Columnar table engine.
//!
//! A [`Table`] stores rows as equal-length named columns of JSON values.
//! Two structural sub-modes are signalled by reserved column names rather
//! than a type tag: a *grouped* table carries an integer `_group` column
//! linking rows into logical units (e.g. one conversation), and a *packed*
//! table collapses each group into a single row whose only column, `_pack`,
//! holds the group's records as an array. [`Table::pack`] and
//! [`Table::unpack`] convert between the two.

use crate::error::{DatasetError, DatasetResult};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Reserved column marking group membership in a grouped table.
pub const GROUP_COLUMN: &str = "_group";

/// Reserved column holding collapsed groups in a packed table.
pub const PACK_COLUMN: &str = "_pack";

/// A row viewed as a mapping from column name to cell value.
pub type Row = Map<String, Value>;

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Value>,
}

impl Column {
    /// Creates a column from a name and its cells.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self { name: name.into(), values }
    }

    /// The column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cells of this column.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A batch of rows handed out by the [`BatchDispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTask {
    /// Index of the first row in the batch.
    pub offset: usize,
    /// Number of rows in the batch.
    pub size: usize,
}

/// Hands out `(offset, size)` batch descriptors one at a time.
///
/// The cursor is the engine's only synchronization primitive: it serializes
/// which batch a worker claims, not the table itself. `get_task` returns
/// `None` once every batch has been claimed.
#[derive(Debug)]
pub struct BatchDispatcher {
    tasks: Vec<BatchTask>,
    cursor: Mutex<usize>,
}

impl BatchDispatcher {
    /// Precomputes batch descriptors covering `total` rows.
    #[must_use]
    pub fn new(total: usize, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let mut tasks = Vec::new();
        let mut offset = 0;
        while offset < total {
            let size = batch_size.min(total - offset);
            tasks.push(BatchTask { offset, size });
            offset += size;
        }
        Self { tasks, cursor: Mutex::new(0) }
    }

    /// Claims the next unclaimed batch, or `None` when exhausted.
    pub fn get_task(&self) -> Option<BatchTask> {
        let mut cursor = self.cursor.lock().ok()?;
        let task = self.tasks.get(*cursor).copied();
        if task.is_some() {
            *cursor += 1;
        }
        task
    }
}

/// In-memory columnar table.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
    batch_size: usize,
}

/// An open run of same-group rows carried across a batch boundary.
#[derive(Debug)]
struct PendingGroup {
    group_id: i64,
    first_row: usize,
    rows: Vec<Row>,
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

impl Table {
    /// Default number of rows processed per internal batch.
    pub const DEFAULT_BATCH_SIZE: usize = 1024;

    /// Creates an empty table with no columns.
    #[must_use]
    pub fn empty() -> Self {
        Self { columns: Vec::new(), row_count: 0, batch_size: Self::DEFAULT_BATCH_SIZE }
    }

    /// Creates a table from columns, validating the structural invariants:
    /// unique names and equal lengths.
    pub fn new(columns: Vec<Column>) -> DatasetResult<Self> {
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.name.clone()) {
                return Err(DatasetError::DuplicateColumn(column.name.clone()));
            }
        }
        let row_count = columns.first().map_or(0, Column::len);
        for column in &columns {
            if column.len() != row_count {
                return Err(DatasetError::LengthMismatch {
                    expected: row_count,
                    actual: column.len(),
                });
            }
        }
        Ok(Self { columns, row_count, batch_size: Self::DEFAULT_BATCH_SIZE })
    }

    /// Creates a table from `(name, cells)` pairs.
    pub fn from_columns(named: Vec<(String, Vec<Value>)>) -> DatasetResult<Self> {
        Self::new(named.into_iter().map(|(name, values)| Column::new(name, values)).collect())
    }

    /// Creates a table from row mappings. Column order is the sorted union
    /// of row keys; cells absent from a row become null.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::from_rows_ordered(rows, &[])
    }

    /// Like [`Table::from_rows`] but keeps `hint`'s relative order for the
    /// columns it names; keys outside the hint follow in sorted order.
    #[must_use]
    pub fn from_rows_ordered(rows: Vec<Row>, hint: &[String]) -> Self {
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for row in &rows {
            keys.extend(row.keys().cloned());
        }
        let mut names: Vec<String> =
            hint.iter().filter(|name| keys.contains(*name)).cloned().collect();
        for key in keys {
            if !names.contains(&key) {
                names.push(key);
            }
        }
        let mut columns: Vec<Column> =
            names.into_iter().map(|name| Column::new(name, Vec::with_capacity(rows.len()))).collect();
        for row in &rows {
            for column in &mut columns {
                column.values.push(row.get(&column.name).cloned().unwrap_or(Value::Null));
            }
        }
        let row_count = rows.len();
        Self { columns, row_count, batch_size: Self::DEFAULT_BATCH_SIZE }
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Overrides the internal batch size used by `map` and `pack`.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    /// Whether the table is in grouped mode (`_group` column present).
    pub fn is_grouped(&self) -> bool {
        !self.is_packed() && self.column(GROUP_COLUMN).is_some()
    }

    /// Whether the table is in packed mode (single `_pack` column).
    pub fn is_packed(&self) -> bool {
        self.columns.len() == 1 && self.columns[0].name == PACK_COLUMN
    }

    /// Assembles the row at `index`.
    pub fn row(&self, index: usize) -> DatasetResult<Row> {
        if index >= self.row_count {
            return Err(DatasetError::IndexOutOfBounds { index, len: self.row_count });
        }
        Ok(self.row_unchecked(index))
    }

    fn row_unchecked(&self, index: usize) -> Row {
        let mut row = Row::new();
        for column in &self.columns {
            row.insert(column.name.clone(), column.values[index].clone());
        }
        row
    }

    /// Iterates over all rows.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        (0..self.row_count).map(|index| self.row_unchecked(index))
    }

    fn owned_column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    /// Applies `op` to every row, collecting returned rows into a new table.
    ///
    /// Returning `None` or an empty mapping drops the row (logged as a
    /// warning). On a grouped table, an output row that omits `_group` gets
    /// the original group id re-attached so user transforms cannot break
    /// the grouping invariant. Rows are processed in internal batches to
    /// bound peak memory; a batch boundary never splits a row.
    pub fn map<F>(&self, mut op: F) -> Table
    where
        F: FnMut(Row) -> Option<Row>,
    {
        let grouped = self.is_grouped();
        let dispatcher = BatchDispatcher::new(self.row_count, self.batch_size);
        let mut out: Vec<Row> = Vec::with_capacity(self.row_count);
        while let Some(task) = dispatcher.get_task() {
            for index in task.offset..task.offset + task.size {
                let row = self.row_unchecked(index);
                let group = row.get(GROUP_COLUMN).cloned();
                match op(row) {
                    Some(mut mapped) if !mapped.is_empty() => {
                        if grouped && !mapped.contains_key(GROUP_COLUMN) {
                            if let Some(group) = group {
                                mapped.insert(GROUP_COLUMN.to_string(), group);
                            }
                        }
                        out.push(mapped);
                    }
                    _ => {
                        warn!(row = index, "map operation dropped row");
                    }
                }
            }
        }
        let mut table = Self::from_rows_ordered(out, &self.owned_column_names());
        table.batch_size = self.batch_size;
        table
    }

    /// Keeps exactly the rows for which `op` returns `true`, preserving
    /// original row order.
    pub fn filter<F>(&self, mut op: F) -> Table
    where
        F: FnMut(&Row) -> bool,
    {
        let keep: Vec<usize> =
            (0..self.row_count).filter(|&index| op(&self.row_unchecked(index))).collect();
        let columns = self
            .columns
            .iter()
            .map(|column| {
                Column::new(
                    column.name.clone(),
                    keep.iter().map(|&index| column.values[index].clone()).collect(),
                )
            })
            .collect();
        Self { columns, row_count: keep.len(), batch_size: self.batch_size }
    }

    fn validate_row_keys(&self, row: &Row) -> DatasetResult<()> {
        for key in row.keys() {
            if self.column(key).is_none() {
                return Err(DatasetError::ColumnNotFound(key.clone()));
            }
        }
        Ok(())
    }

    /// Appends a row at the end of the table.
    pub fn append(&mut self, row: Row) -> DatasetResult<()> {
        self.insert(row, self.row_count)
    }

    /// Inserts a row at `index` (`0 <= index <= row_count`).
    ///
    /// An empty table adopts the row's keys as its columns. A non-empty
    /// table rejects unknown keys and null-fills missing ones.
    pub fn insert(&mut self, row: Row, index: usize) -> DatasetResult<()> {
        self.insert_rows(vec![row], index)
    }

    /// Inserts a run of rows at `index`, preserving their relative order.
    pub fn insert_rows(&mut self, rows: Vec<Row>, index: usize) -> DatasetResult<()> {
        if index > self.row_count {
            return Err(DatasetError::IndexOutOfBounds { index, len: self.row_count });
        }
        if rows.is_empty() {
            return Ok(());
        }
        if self.columns.is_empty() {
            let mut fresh = Self::from_rows(rows);
            fresh.batch_size = self.batch_size;
            *self = fresh;
            return Ok(());
        }
        for row in &rows {
            self.validate_row_keys(row)?;
        }
        for (run_offset, row) in rows.into_iter().enumerate() {
            for column in &mut self.columns {
                let cell = row.get(&column.name).cloned().unwrap_or(Value::Null);
                column.values.insert(index + run_offset, cell);
            }
            self.row_count += 1;
        }
        Ok(())
    }

    /// Deletes the row at `index` (`0 <= index < row_count`).
    pub fn delete(&mut self, index: usize) -> DatasetResult<()> {
        if index >= self.row_count {
            return Err(DatasetError::IndexOutOfBounds { index, len: self.row_count });
        }
        for column in &mut self.columns {
            column.values.remove(index);
        }
        self.row_count -= 1;
        Ok(())
    }

    /// Appends another table's rows. Both tables must carry the same column
    /// name set; columns are aligned by name.
    pub fn concat(&mut self, other: &Table) -> DatasetResult<()> {
        if self.columns.is_empty() {
            let batch_size = self.batch_size;
            *self = other.clone();
            self.batch_size = batch_size;
            return Ok(());
        }
        let mine: BTreeSet<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let theirs: BTreeSet<&str> = other.columns.iter().map(|c| c.name.as_str()).collect();
        if mine != theirs {
            return Err(DatasetError::InvalidArgument(format!(
                "cannot concat tables with different columns: {mine:?} vs {theirs:?}"
            )));
        }
        for column in &mut self.columns {
            let source = other
                .column(&column.name)
                .ok_or_else(|| DatasetError::ColumnNotFound(column.name.clone()))?;
            column.values.extend(source.values.iter().cloned());
        }
        self.row_count += other.row_count;
        Ok(())
    }

    /// Appends a new column. Cell count must match the row count, except on
    /// a table with no columns yet, where it defines the row count.
    pub fn col_append(&mut self, name: impl Into<String>, values: Vec<Value>) -> DatasetResult<()> {
        let position = self.columns.len();
        self.col_insert(name, values, position)
    }

    /// Inserts a new column at the given position.
    pub fn col_insert(
        &mut self,
        name: impl Into<String>,
        values: Vec<Value>,
        position: usize,
    ) -> DatasetResult<()> {
        let name = name.into();
        if position > self.columns.len() {
            return Err(DatasetError::IndexOutOfBounds { index: position, len: self.columns.len() });
        }
        if self.column(&name).is_some() {
            return Err(DatasetError::DuplicateColumn(name));
        }
        if !self.columns.is_empty() && values.len() != self.row_count {
            return Err(DatasetError::LengthMismatch {
                expected: self.row_count,
                actual: values.len(),
            });
        }
        if self.columns.is_empty() {
            self.row_count = values.len();
        }
        self.columns.insert(position, Column::new(name, values));
        Ok(())
    }

    /// Removes a column by name, returning it.
    pub fn col_delete(&mut self, name: &str) -> DatasetResult<Column> {
        let position = self
            .columns
            .iter()
            .position(|column| column.name == name)
            .ok_or_else(|| DatasetError::ColumnNotFound(name.to_string()))?;
        let column = self.columns.remove(position);
        if self.columns.is_empty() {
            self.row_count = 0;
        }
        Ok(column)
    }

    /// Applies `op` to every cell of one column in place.
    pub fn col_map<F>(&mut self, name: &str, mut op: F) -> DatasetResult<()>
    where
        F: FnMut(&Value) -> Value,
    {
        let column = self
            .columns
            .iter_mut()
            .find(|column| column.name == name)
            .ok_or_else(|| DatasetError::ColumnNotFound(name.to_string()))?;
        for value in &mut column.values {
            *value = op(value);
        }
        Ok(())
    }

    /// Renames columns per `(old, new)` pairs.
    ///
    /// On a grouped table the `_group` column keeps its presence and
    /// position: omitting it from the rename list leaves it untouched, and
    /// renaming it away is rejected.
    pub fn col_renames(&mut self, renames: &[(&str, &str)]) -> DatasetResult<()> {
        let grouped = self.is_grouped();
        let mut mapping: HashMap<&str, &str> = HashMap::new();
        for (old, new) in renames {
            if grouped && *old == GROUP_COLUMN && *new != GROUP_COLUMN {
                return Err(DatasetError::InvalidArgument(
                    "the group column cannot be renamed while the table is grouped".to_string(),
                ));
            }
            if self.column(old).is_none() {
                return Err(DatasetError::ColumnNotFound((*old).to_string()));
            }
            mapping.insert(old, new);
        }
        let mut next: BTreeSet<String> = BTreeSet::new();
        for column in &self.columns {
            let name = mapping.get(column.name.as_str()).map_or(column.name.as_str(), |new| *new);
            if !next.insert(name.to_string()) {
                return Err(DatasetError::DuplicateColumn(name.to_string()));
            }
        }
        for column in &mut self.columns {
            if let Some(new) = mapping.get(column.name.as_str()) {
                column.name = (*new).to_string();
            }
        }
        Ok(())
    }

    /// Collapses a grouped table into packed mode.
    ///
    /// Preconditions: a `_group` column of integer ids with no nulls and at
    /// least one other column. Returns `false` (not an error) when unmet.
    ///
    /// Rows are stably sorted by group id, ids are squashed to a dense
    /// `0..k` sequence by first appearance, and rows are then streamed in
    /// dispatcher batches. A group whose rows straddle a batch boundary is
    /// carried forward keyed by the next batch's start offset and merged
    /// with that batch's first run, so the configured batch size is never
    /// observable in the output.
    pub fn pack(&mut self) -> bool {
        if self.is_packed() {
            warn!("pack skipped: table is already packed");
            return false;
        }
        let Some(group_column) = self.column(GROUP_COLUMN) else {
            warn!("pack skipped: no group column");
            return false;
        };
        if self.columns.len() < 2 {
            warn!("pack skipped: no columns besides the group column");
            return false;
        }
        let mut ids: Vec<i64> = Vec::with_capacity(self.row_count);
        for value in group_column.values() {
            match value.as_i64() {
                Some(id) => ids.push(id),
                None => {
                    warn!(value = %value, "pack skipped: group column holds a non-integer id");
                    return false;
                }
            }
        }

        // Stable sort preserves in-group row order; squash keeps group
        // identity while compacting the numeric labels.
        let mut order: Vec<usize> = (0..self.row_count).collect();
        order.sort_by_key(|&index| ids[index]);
        let mut squashed: HashMap<i64, i64> = HashMap::new();
        for &index in &order {
            let next = squashed.len() as i64;
            squashed.entry(ids[index]).or_insert(next);
        }

        let dispatcher = BatchDispatcher::new(self.row_count, self.batch_size);
        let mut pending: HashMap<usize, PendingGroup> = HashMap::new();
        let mut packed: Vec<Value> = Vec::new();
        while let Some(task) = dispatcher.get_task() {
            let mut current = pending.remove(&task.offset);
            for position in task.offset..task.offset + task.size {
                let original = order[position];
                let group_id = squashed[&ids[original]];
                let mut row = self.row_unchecked(original);
                row.remove(GROUP_COLUMN);
                if current.as_ref().is_some_and(|open| open.group_id == group_id) {
                    if let Some(open) = current.as_mut() {
                        open.rows.push(row);
                    }
                } else {
                    if let Some(done) = current.take() {
                        packed.push(Self::packed_cell(done));
                    }
                    current = Some(PendingGroup { group_id, first_row: original, rows: vec![row] });
                }
            }
            if let Some(open) = current {
                pending.insert(task.offset + task.size, open);
            }
        }
        if let Some(last) = pending.remove(&self.row_count) {
            packed.push(Self::packed_cell(last));
        }
        for (offset, stray) in pending {
            // Unreachable for sequentially claimed batches; loud rather than
            // silent if the carried offset is ever left unclaimed.
            warn!(
                offset,
                group_id = stray.group_id,
                first_row = stray.first_row,
                "dropping carried group never claimed by a following batch"
            );
        }

        let row_count = packed.len();
        self.columns = vec![Column::new(PACK_COLUMN, packed)];
        self.row_count = row_count;
        debug!(groups = row_count, "table packed");
        true
    }

    fn packed_cell(group: PendingGroup) -> Value {
        Value::Array(group.rows.into_iter().map(Value::Object).collect())
    }

    /// Expands a packed table back into grouped mode, re-numbering groups
    /// sequentially. Returns `false` when the table is not packed or a
    /// packed cell is not a non-empty array of row objects.
    pub fn unpack(&mut self) -> bool {
        if !self.is_packed() {
            warn!("unpack skipped: table is not packed");
            return false;
        }
        let mut rows: Vec<Row> = Vec::new();
        for (group_id, cell) in self.columns[0].values().iter().enumerate() {
            let Value::Array(records) = cell else {
                warn!(group = group_id, "unpack skipped: packed cell is not an array");
                return false;
            };
            if records.is_empty() {
                warn!(group = group_id, "unpack skipped: packed cell is empty");
                return false;
            }
            for record in records {
                let Value::Object(fields) = record else {
                    warn!(group = group_id, "unpack skipped: packed record is not an object");
                    return false;
                };
                let mut row = fields.clone();
                row.insert(GROUP_COLUMN.to_string(), Value::from(group_id as i64));
                rows.push(row);
            }
        }
        let hint = vec![GROUP_COLUMN.to_string()];
        let mut table = Self::from_rows_ordered(rows, &hint);
        table.batch_size = self.batch_size;
        *self = table;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    fn grouped_table() -> Table {
        Table::from_columns(vec![
            ("_group".to_string(), vec![json!(0), json!(0), json!(1)]),
            ("x".to_string(), vec![json!("a"), json!("b"), json!("c")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_rejects_duplicate_columns() {
        let result = Table::new(vec![
            Column::new("a", vec![json!(1)]),
            Column::new("a", vec![json!(2)]),
        ]);
        assert!(matches!(result, Err(DatasetError::DuplicateColumn(_))));
    }

    #[test]
    fn test_new_rejects_unequal_lengths() {
        let result = Table::new(vec![
            Column::new("a", vec![json!(1), json!(2)]),
            Column::new("b", vec![json!(1)]),
        ]);
        assert!(matches!(result, Err(DatasetError::LengthMismatch { .. })));
    }

    #[test]
    fn test_from_rows_null_fills_missing_cells() {
        let table = Table::from_rows(vec![
            row(&[("a", json!(1)), ("b", json!(2))]),
            row(&[("a", json!(3))]),
        ]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("b").unwrap().values()[1], Value::Null);
    }

    #[test]
    fn test_dispatcher_covers_all_rows_once() {
        let dispatcher = BatchDispatcher::new(10, 4);
        let mut claimed = Vec::new();
        while let Some(task) = dispatcher.get_task() {
            claimed.push(task);
        }
        assert_eq!(
            claimed,
            vec![
                BatchTask { offset: 0, size: 4 },
                BatchTask { offset: 4, size: 4 },
                BatchTask { offset: 8, size: 2 },
            ]
        );
        assert!(dispatcher.get_task().is_none());
    }

    #[test]
    fn test_map_drops_rows_returning_none() {
        let table = Table::from_columns(vec![(
            "x".to_string(),
            vec![json!(1), json!(2), json!(3)],
        )])
        .unwrap();
        let mapped = table.map(|row| {
            if row["x"] == json!(2) {
                None
            } else {
                Some(row)
            }
        });
        assert_eq!(mapped.row_count(), 2);
        assert_eq!(mapped.column("x").unwrap().values(), &[json!(1), json!(3)]);
    }

    #[test]
    fn test_map_reattaches_group_id() {
        let table = grouped_table();
        let mapped = table.map(|r| {
            let mut out = Row::new();
            out.insert("y".to_string(), r["x"].clone());
            Some(out)
        });
        assert!(mapped.is_grouped());
        assert_eq!(
            mapped.column(GROUP_COLUMN).unwrap().values(),
            &[json!(0), json!(0), json!(1)]
        );
    }

    #[test]
    fn test_filter_preserves_order() {
        let table = Table::from_columns(vec![(
            "x".to_string(),
            vec![json!(1), json!(2), json!(3), json!(4)],
        )])
        .unwrap();
        let filtered = table.filter(|row| row["x"].as_i64().unwrap() % 2 == 0);
        assert_eq!(filtered.column("x").unwrap().values(), &[json!(2), json!(4)]);
    }

    #[test]
    fn test_insert_bounds() {
        let mut table = Table::from_columns(vec![("x".to_string(), vec![json!(1)])]).unwrap();
        let err = table.insert(row(&[("x", json!(2))]), 2).unwrap_err();
        assert!(matches!(err, DatasetError::IndexOutOfBounds { index: 2, len: 1 }));
        table.insert(row(&[("x", json!(0))]), 0).unwrap();
        assert_eq!(table.column("x").unwrap().values(), &[json!(0), json!(1)]);
    }

    #[test]
    fn test_delete_bounds() {
        let mut table = Table::from_columns(vec![("x".to_string(), vec![json!(1)])]).unwrap();
        assert!(table.delete(1).is_err());
        table.delete(0).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_rows_changes_count_by_run_length() {
        let mut table =
            Table::from_columns(vec![("x".to_string(), vec![json!(1), json!(4)])]).unwrap();
        table
            .insert_rows(vec![row(&[("x", json!(2))]), row(&[("x", json!(3))])], 1)
            .unwrap();
        assert_eq!(
            table.column("x").unwrap().values(),
            &[json!(1), json!(2), json!(3), json!(4)]
        );
    }

    #[test]
    fn test_insert_rejects_unknown_column() {
        let mut table = Table::from_columns(vec![("x".to_string(), vec![json!(1)])]).unwrap();
        let err = table.append(row(&[("y", json!(2))])).unwrap_err();
        assert!(matches!(err, DatasetError::ColumnNotFound(_)));
    }

    #[test]
    fn test_col_renames_guards_group_column() {
        let mut table = grouped_table();
        assert!(table.col_renames(&[("_group", "g")]).is_err());
        table.col_renames(&[("x", "text")]).unwrap();
        assert!(table.is_grouped());
        assert!(table.column("text").is_some());
    }

    #[test]
    fn test_col_insert_and_delete() {
        let mut table = Table::from_columns(vec![("x".to_string(), vec![json!(1)])]).unwrap();
        table.col_append("y", vec![json!(2)]).unwrap();
        assert_eq!(table.column_names(), vec!["x", "y"]);
        let err = table.col_append("y", vec![json!(3)]).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateColumn(_)));
        let removed = table.col_delete("x").unwrap();
        assert_eq!(removed.values(), &[json!(1)]);
        assert_eq!(table.column_names(), vec!["y"]);
    }

    #[test]
    fn test_pack_concrete_scenario() {
        let mut table = grouped_table();
        table.set_batch_size(2);
        assert!(table.pack());
        assert!(table.is_packed());
        assert_eq!(table.row_count(), 2);
        let cells = table.column(PACK_COLUMN).unwrap().values();
        assert_eq!(cells[0], json!([{"x": "a"}, {"x": "b"}]));
        assert_eq!(cells[1], json!([{"x": "c"}]));
    }

    #[test]
    fn test_pack_batch_size_not_observable() {
        let build = || {
            Table::from_columns(vec![
                (
                    "_group".to_string(),
                    vec![json!(5), json!(5), json!(5), json!(9), json!(9), json!(2)],
                ),
                (
                    "x".to_string(),
                    vec![json!("a"), json!("b"), json!("c"), json!("d"), json!("e"), json!("f")],
                ),
            ])
            .unwrap()
        };
        let mut small = build();
        small.set_batch_size(2);
        assert!(small.pack());
        let mut large = build();
        large.set_batch_size(100);
        assert!(large.pack());
        assert_eq!(
            small.column(PACK_COLUMN).unwrap().values(),
            large.column(PACK_COLUMN).unwrap().values()
        );
    }

    #[test]
    fn test_pack_squashes_group_ids_by_first_appearance() {
        let mut table = Table::from_columns(vec![
            ("_group".to_string(), vec![json!(7), json!(3), json!(7)]),
            ("x".to_string(), vec![json!("a"), json!("b"), json!("c")]),
        ])
        .unwrap();
        assert!(table.pack());
        let cells = table.column(PACK_COLUMN).unwrap().values();
        // Sorted by id: group 3 first, then group 7 with in-group order kept.
        assert_eq!(cells[0], json!([{"x": "b"}]));
        assert_eq!(cells[1], json!([{"x": "a"}, {"x": "c"}]));
    }

    #[test]
    fn test_pack_preconditions() {
        let mut no_group =
            Table::from_columns(vec![("x".to_string(), vec![json!(1)])]).unwrap();
        assert!(!no_group.pack());

        let mut only_group =
            Table::from_columns(vec![("_group".to_string(), vec![json!(0)])]).unwrap();
        assert!(!only_group.pack());

        let mut null_group = Table::from_columns(vec![
            ("_group".to_string(), vec![json!(0), Value::Null]),
            ("x".to_string(), vec![json!(1), json!(2)]),
        ])
        .unwrap();
        assert!(!null_group.pack());
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let mut table = Table::from_columns(vec![
            ("_group".to_string(), vec![json!(4), json!(4), json!(1), json!(6)]),
            ("x".to_string(), vec![json!("a"), json!("b"), json!("c"), json!("d")]),
        ])
        .unwrap();
        table.set_batch_size(2);
        assert!(table.pack());
        assert!(table.unpack());
        assert!(table.is_grouped());
        assert_eq!(table.row_count(), 4);
        // Group membership survives: 1 -> {c}, 4 -> {a, b}, 6 -> {d}.
        assert_eq!(
            table.column(GROUP_COLUMN).unwrap().values(),
            &[json!(0), json!(1), json!(1), json!(2)]
        );
        assert_eq!(
            table.column("x").unwrap().values(),
            &[json!("c"), json!("a"), json!("b"), json!("d")]
        );
    }

    #[test]
    fn test_unpack_rejects_bad_shapes() {
        let mut not_packed = grouped_table();
        assert!(!not_packed.unpack());

        let mut bad_cell = Table::from_columns(vec![(
            PACK_COLUMN.to_string(),
            vec![json!("not a list")],
        )])
        .unwrap();
        assert!(!bad_cell.unpack());

        let mut empty_cell =
            Table::from_columns(vec![(PACK_COLUMN.to_string(), vec![json!([])])]).unwrap();
        assert!(!empty_cell.unpack());

        let mut scalar_record =
            Table::from_columns(vec![(PACK_COLUMN.to_string(), vec![json!([1, 2])])]).unwrap();
        assert!(!scalar_record.unpack());
    }

    #[test]
    fn test_concat_requires_same_columns() {
        let mut left = Table::from_columns(vec![("x".to_string(), vec![json!(1)])]).unwrap();
        let right = Table::from_columns(vec![("y".to_string(), vec![json!(2)])]).unwrap();
        assert!(left.concat(&right).is_err());
        let right = Table::from_columns(vec![("x".to_string(), vec![json!(2)])]).unwrap();
        left.concat(&right).unwrap();
        assert_eq!(left.row_count(), 2);
    }
}
