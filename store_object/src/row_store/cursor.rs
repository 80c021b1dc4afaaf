use type_mapping::Row;

/// Fetched result set, owned by the caller. Rows are released when the
/// cursor is closed or dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    columns: Vec<String>,
    rows: Vec<Row>,
    position: usize,
    closed: bool,
}

impl Cursor {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            position: 0,
            closed: false,
        }
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.column_names().map(str::to_string).collect())
            .unwrap_or_default();
        Self::new(columns, rows)
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Total number of rows in the result set
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Advance and return the next row, `None` once exhausted or closed
    pub fn move_to_next(&mut self) -> Option<&Row> {
        if self.closed {
            return None;
        }
        let row = self.rows.get(self.position)?;
        self.position += 1;
        Some(row)
    }

    pub fn first(&self) -> Option<&Row> {
        if self.closed {
            return None;
        }
        self.rows.first()
    }

    pub fn rows(&self) -> &[Row] {
        if self.closed {
            return &[];
        }
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        if self.closed {
            return Vec::new();
        }
        self.rows
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.rows = Vec::new();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use type_mapping::ColumnValue;

    fn row(id: i64) -> Row {
        Row::new(vec![("id".to_string(), ColumnValue::Integer(id))])
    }

    #[test]
    fn test_iterates_rows_in_order() {
        let mut cursor = Cursor::from_rows(vec![row(1), row(2)]);
        assert_eq!(cursor.column_names(), &["id".to_string()]);
        assert_eq!(cursor.count(), 2);
        assert_eq!(cursor.move_to_next().and_then(|r| r.get_as::<i64>("id").ok()), Some(1));
        assert_eq!(cursor.move_to_next().and_then(|r| r.get_as::<i64>("id").ok()), Some(2));
        assert!(cursor.move_to_next().is_none());
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_close_releases_rows() {
        let mut cursor = Cursor::from_rows(vec![row(1)]);
        cursor.close();
        assert!(cursor.is_closed());
        assert!(cursor.move_to_next().is_none());
        assert!(cursor.rows().is_empty());
    }
}
