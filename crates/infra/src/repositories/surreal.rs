use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, to_value};
use sketchdesk_domain::DomainResult;
use sketchdesk_domain::error::DomainError;
use sketchdesk_domain::pagination::PageRequest;

pub(crate) fn query_result(err: surrealdb::Error) -> DomainError {
    DomainError::Storage(format!("invalid query result: {err}"))
}

pub(crate) fn map_surreal_error(err: surrealdb::Error) -> DomainError {
    let message = err.to_string().to_lowercase();
    if message.contains("already exists")
        || message.contains("already contains")
        || message.contains("duplicate")
        || message.contains("unique")
        || message.contains("conflict")
    {
        return DomainError::Conflict(message);
    }
    DomainError::Storage(format!("surreal query failed: {message}"))
}

/// Statements inside `BEGIN/COMMIT` report a cancelled transaction rather
/// than the original cause; the only aborts these writes issue are conflicts.
pub(crate) fn map_transaction_error(err: surrealdb::Error) -> DomainError {
    match map_surreal_error(err) {
        DomainError::Storage(message) if message.contains("transaction") => {
            DomainError::Conflict(message)
        }
        mapped => mapped,
    }
}

pub(crate) fn payload<T: Serialize>(value: &T, context: &str) -> DomainResult<Value> {
    to_value(value).map_err(|err| DomainError::Storage(format!("invalid {context} payload: {err}")))
}

pub(crate) fn decode_one<T>(rows: Vec<Value>, context: &str) -> DomainResult<Option<T>>
where
    T: DeserializeOwned,
{
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    let decoded = serde_json::from_value::<T>(row)
        .map_err(|err| DomainError::Storage(format!("invalid {context} row: {err}")))?;
    Ok(Some(decoded))
}

pub(crate) fn decode_many<T>(rows: Vec<Value>, context: &str) -> DomainResult<Vec<T>>
where
    T: DeserializeOwned,
{
    rows.into_iter()
        .map(|row| {
            serde_json::from_value::<T>(row)
                .map_err(|err| DomainError::Storage(format!("invalid {context} row: {err}")))
        })
        .collect()
}

pub(crate) fn decode_count(rows: Vec<Value>) -> DomainResult<u64> {
    Ok(rows
        .into_iter()
        .next()
        .and_then(|row| row.get("total").and_then(Value::as_u64))
        .unwrap_or(0))
}

/// `LIMIT/START` clause bounds for a page; `None` for unbounded reads.
pub(crate) fn page_bounds(page: &PageRequest) -> Option<(i64, i64)> {
    if page.limit == u32::MAX {
        return None;
    }
    Some((i64::from(page.limit), page.offset() as i64))
}

/// Renders a `WHERE` clause from already-parameterised conditions.
pub(crate) fn where_clause(conditions: &[&str]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_row_decodes() {
        assert_eq!(decode_count(vec![serde_json::json!({"total": 7})]).unwrap(), 7);
        assert_eq!(decode_count(Vec::new()).unwrap(), 0);
    }

    #[test]
    fn where_clause_joins_conditions() {
        assert_eq!(where_clause(&[]), "");
        assert_eq!(
            where_clause(&["a = $a", "b = $b"]),
            " WHERE a = $a AND b = $b"
        );
    }

    #[test]
    fn unbounded_pages_have_no_limit() {
        assert_eq!(page_bounds(&PageRequest::unbounded()), None);
        let page = PageRequest::new(Some(3), Some(10)).unwrap();
        assert_eq!(page_bounds(&page), Some((10, 20)));
    }
}
