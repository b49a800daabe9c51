/// Deterministically stringify a JSON value with sorted keys recursively.
///
/// Objects have their keys sorted alphabetically. Arrays preserve order.
/// The output is a compact JSON string with no extra whitespace. This is the
/// serialization the visitor HMAC is computed over, so both ends must agree
/// on it exactly.
pub fn canonical_stringify(value: &serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(canonical_stringify).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    let v = canonical_stringify(&map[k]);
                    format!("{}:{}", serde_json::to_string(k).unwrap(), v)
                })
                .collect();
            format!("{{{}}}", entries.join(","))
        }
    }
}
