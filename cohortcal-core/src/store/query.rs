//! Multi-attribute event filters.

use chrono::NaiveDateTime;
use rusqlite::types::Value;

use crate::cohort::CohortId;
use crate::event::UserId;
use crate::room::RoomId;
use crate::time::format_wall_clock;

/// Filter over live events.
///
/// Each membership field is `None` for "any value", or the list of accepted
/// values. A present but empty list matches nothing. Conditions are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub cohorts: Option<Vec<CohortId>>,
    pub rooms: Option<Vec<RoomId>>,
    pub owners: Option<Vec<UserId>>,
    pub subjects: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub starts: Option<Vec<NaiveDateTime>>,
    /// Only events starting at or after this time.
    pub from: Option<NaiveDateTime>,
    /// Only events starting at or before this time.
    pub to: Option<NaiveDateTime>,
}

impl EventQuery {
    /// Matches every live event.
    pub fn all() -> Self {
        EventQuery::default()
    }

    pub fn cohort(id: CohortId) -> Self {
        EventQuery {
            cohorts: Some(vec![id]),
            ..Default::default()
        }
    }

    pub fn in_cohorts(mut self, ids: impl IntoIterator<Item = CohortId>) -> Self {
        self.cohorts = Some(ids.into_iter().collect());
        self
    }

    pub fn in_rooms(mut self, ids: impl IntoIterator<Item = RoomId>) -> Self {
        self.rooms = Some(ids.into_iter().collect());
        self
    }

    pub fn owned_by(mut self, ids: impl IntoIterator<Item = UserId>) -> Self {
        self.owners = Some(ids.into_iter().collect());
        self
    }

    pub fn with_subjects<S: Into<String>>(mut self, subjects: impl IntoIterator<Item = S>) -> Self {
        self.subjects = Some(subjects.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_categories<S: Into<String>>(
        mut self,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        self.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn starting_at(mut self, starts: impl IntoIterator<Item = NaiveDateTime>) -> Self {
        self.starts = Some(starts.into_iter().collect());
        self
    }

    pub fn between(mut self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// True if some membership list is present but empty.
    pub fn matches_nothing(&self) -> bool {
        self.cohorts.as_ref().is_some_and(Vec::is_empty)
            || self.rooms.as_ref().is_some_and(Vec::is_empty)
            || self.owners.as_ref().is_some_and(Vec::is_empty)
            || self.subjects.as_ref().is_some_and(Vec::is_empty)
            || self.categories.as_ref().is_some_and(Vec::is_empty)
            || self.starts.as_ref().is_some_and(Vec::is_empty)
    }

    /// Build the WHERE clause and its bound values.
    ///
    /// Returns `None` when the query matches nothing, so callers can skip the
    /// round-trip entirely.
    pub(crate) fn where_clause(&self) -> Option<(String, Vec<Value>)> {
        if self.matches_nothing() {
            return None;
        }

        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();

        let mut membership = |column: &str, values: Vec<Value>| {
            if let Some(placeholders) = in_list(values.len()) {
                clauses.push(format!("{} IN ({})", column, placeholders));
                binds.extend(values);
            }
        };

        if let Some(ids) = &self.cohorts {
            membership("cohort_id", ids.iter().map(|id| Value::Integer(id.0)).collect());
        }
        if let Some(ids) = &self.rooms {
            membership("room_id", ids.iter().map(|id| Value::Integer(id.0)).collect());
        }
        if let Some(ids) = &self.owners {
            membership("owner_id", ids.iter().map(|id| Value::Integer(id.0)).collect());
        }
        if let Some(subjects) = &self.subjects {
            membership("subject", subjects.iter().cloned().map(Value::Text).collect());
        }
        if let Some(categories) = &self.categories {
            membership(
                "category",
                categories.iter().cloned().map(Value::Text).collect(),
            );
        }
        if let Some(starts) = &self.starts {
            membership(
                "starts_at",
                starts.iter().map(|dt| Value::Text(format_wall_clock(dt))).collect(),
            );
        }

        if let Some(from) = &self.from {
            clauses.push("starts_at >= ?".to_string());
            binds.push(Value::Text(format_wall_clock(from)));
        }
        if let Some(to) = &self.to {
            clauses.push("starts_at <= ?".to_string());
            binds.push(Value::Text(format_wall_clock(to)));
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        Some((sql, binds))
    }
}

fn in_list(len: usize) -> Option<String> {
    (len > 0).then(|| vec!["?"; len].join(", "))
}
