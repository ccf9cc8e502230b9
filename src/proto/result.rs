use serde::{Deserialize, Serialize};

use super::Value;
use crate::error::{GateError, GateResult};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: i64,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: i64) -> Self { Self { name: name.into(), field_type } }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub rows_affected: u64,
    #[serde(default)]
    pub insert_id: u64,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Fold one streamed partial result into `self`: fields are taken from the first message
    /// that carries them, rows are appended in arrival order.
    pub fn absorb(&mut self, part: QueryResult) {
        if self.fields.is_empty() && !part.fields.is_empty() {
            self.fields = part.fields;
        }
        self.rows.extend(part.rows);
    }
}

/// Reply envelope of the single-query operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub result: Option<QueryResult>,
    #[serde(default)]
    pub session: Option<Session>,
    /// Application error; non-empty means the call failed inside the backend.
    #[serde(default)]
    pub error: String,
}

impl QueryResponse {
    pub fn into_result(self) -> GateResult<QueryResult> {
        if !self.error.is_empty() {
            return Err(GateError::application(self.error));
        }
        Ok(self.result.unwrap_or_default())
    }
}

/// Reply envelope of the batch operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResultList {
    #[serde(default)]
    pub list: Vec<QueryResult>,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub error: String,
}

impl QueryResultList {
    pub fn into_results(self) -> GateResult<Vec<QueryResult>> {
        if !self.error.is_empty() {
            return Err(GateError::application(self.error));
        }
        Ok(self.list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_error_wins_over_result() {
        let resp = QueryResponse { result: Some(QueryResult::default()), session: None, error: "app error".into() };
        assert_eq!(resp.into_result(), Err(GateError::application("app error")));
        let list = QueryResultList { list: vec![], session: None, error: String::new() };
        assert_eq!(list.into_results(), Ok(vec![]));
    }

    #[test]
    fn absorb_keeps_first_fields_and_appends_rows() {
        let mut acc = QueryResult::default();
        acc.absorb(QueryResult { fields: vec![Field::new("a", 1)], ..Default::default() });
        acc.absorb(QueryResult { rows: vec![vec![Value::string("x")]], ..Default::default() });
        acc.absorb(QueryResult { fields: vec![Field::new("b", 2)], rows: vec![vec![Value::string("y")]], ..Default::default() });
        assert_eq!(acc.fields, vec![Field::new("a", 1)]);
        assert_eq!(acc.rows.len(), 2);
        assert_eq!(acc.rows_affected, 0);
    }
}
