use serde_json::Value;

/// Walks a dotted path (`answers.choose_db.db_name`) through nested JSON objects.
///
/// Returns `None` as soon as a segment is missing or the current value is not
/// an object; arrays are not indexed.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
