//! Parameterized SELECT builder for task listing.
//!
//! Predicates are only ever emitted as `column = ?` with the value pushed
//! onto the bound parameter list. No caller-supplied text reaches the SQL.

use rusqlite::ToSql;

use crate::task::{SortOrder, TaskFilter};

pub const TASK_COLUMNS: &str =
    "id, title, description, status, priority, due_date, created_at, updated_at";

/// Columns a predicate or ordering may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Status,
    Priority,
    Title,
    DueDate,
}

impl Column {
    fn name(&self) -> &'static str {
        match self {
            Column::Status => "status",
            Column::Priority => "priority",
            Column::Title => "title",
            Column::DueDate => "due_date",
        }
    }
}

pub struct SelectBuilder {
    table: &'static str,
    columns: &'static str,
    conditions: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
    order: Option<(Column, SortOrder)>,
}

impl SelectBuilder {
    pub fn new(table: &'static str, columns: &'static str) -> Self {
        Self {
            table,
            columns,
            conditions: Vec::new(),
            params: Vec::new(),
            order: None,
        }
    }

    /// Add an equality predicate on `column`.
    pub fn eq<T: ToSql + 'static>(mut self, column: Column, value: T) -> Self {
        self.conditions.push(format!("{} = ?", column.name()));
        self.params.push(Box::new(value));
        self
    }

    pub fn eq_opt<T: ToSql + 'static>(self, column: Column, value: Option<T>) -> Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }

    pub fn order_by(mut self, column: Column, order: SortOrder) -> Self {
        self.order = Some((column, order));
        self
    }

    pub fn sql(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.columns, self.table);
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if let Some((column, order)) = self.order {
            let direction = match order {
                SortOrder::Ascending => "ASC",
                SortOrder::Descending => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {} {direction}, id ASC", column.name()));
        }
        sql
    }

    pub fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(AsRef::as_ref).collect()
    }

    /// Shape a task listing from a filter.
    pub fn for_tasks(filter: &TaskFilter) -> Self {
        let mut builder = SelectBuilder::new("tasks", TASK_COLUMNS)
            .eq_opt(Column::Status, filter.status.map(|status| status.as_str()))
            .eq_opt(Column::Priority, filter.priority.map(|priority| priority.as_str()))
            .eq_opt(Column::Title, filter.title.clone());
        if let Some(order) = filter.sort_by_due {
            builder = builder.order_by(Column::DueDate, order);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskPriority, TaskStatus};

    #[test]
    fn empty_filter_selects_everything() {
        let builder = SelectBuilder::for_tasks(&TaskFilter::default());
        assert_eq!(builder.sql(), format!("SELECT {TASK_COLUMNS} FROM tasks"));
        assert!(builder.params().is_empty());
    }

    #[test]
    fn predicates_are_anded_and_bound() {
        let filter = TaskFilter {
            status: Some(TaskStatus::Done),
            priority: Some(TaskPriority::Low),
            title: Some("x'; DROP TABLE tasks; --".to_string()),
            sort_by_due: None,
        };
        let builder = SelectBuilder::for_tasks(&filter);
        let sql = builder.sql();
        assert!(sql.ends_with("WHERE status = ? AND priority = ? AND title = ?"));
        assert!(!sql.contains("DROP"));
        assert_eq!(builder.params().len(), 3);
    }

    #[test]
    fn ordering_follows_predicates() {
        let filter = TaskFilter {
            title: Some("report".to_string()),
            sort_by_due: Some(SortOrder::Descending),
            ..TaskFilter::default()
        };
        let sql = SelectBuilder::for_tasks(&filter).sql();
        assert!(sql.ends_with("WHERE title = ? ORDER BY due_date DESC, id ASC"));
    }
}
