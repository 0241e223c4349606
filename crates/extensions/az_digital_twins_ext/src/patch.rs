use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Matches `/<twin id>/<property path>`
static TWIN_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/(.+?)/(.+)$").unwrap());

/// JSON patch operation kinds (RFC 6902)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A patch operation along with the twin it applies to
#[derive(Debug, Clone, PartialEq)]
pub struct TwinOperation {
    pub twin_id: String,
    pub operation: PatchOperation,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid path in patch: {0}")]
pub struct InvalidTwinPath(pub String);

pub fn parse_patch_document(data: &[u8]) -> Result<Vec<PatchOperation>, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Split a path prefixed by a twin id into the twin id and the path within the twin
///
/// ```
/// # use az_digital_twins_ext::patch::split_twin_path;
/// assert_eq!(
///     split_twin_path("/room-1/temperature/value"),
///     Some(("room-1".to_string(), "/temperature/value".to_string()))
/// );
/// assert_eq!(split_twin_path("/room-1"), None);
/// ```
pub fn split_twin_path(path: &str) -> Option<(String, String)> {
    let captures = TWIN_PATH.captures(path)?;
    Some((captures[1].to_string(), format!("/{}", &captures[2])))
}

/// Extract the target twin of each operation of a batch.
///
/// The operations are returned in input order with the twin id stripped
/// from their paths. A single invalid path rejects the whole batch.
pub fn split_by_twin(
    operations: Vec<PatchOperation>,
) -> Result<Vec<TwinOperation>, InvalidTwinPath> {
    operations.into_iter().map(assign_to_twin).collect()
}

fn assign_to_twin(mut operation: PatchOperation) -> Result<TwinOperation, InvalidTwinPath> {
    let (twin_id, path) =
        split_twin_path(&operation.path).ok_or_else(|| InvalidTwinPath(operation.path.clone()))?;
    operation.path = path;

    if let Some(from) = operation.from.take() {
        match split_twin_path(&from) {
            Some((from_twin_id, from_path)) if from_twin_id == twin_id => {
                operation.from = Some(from_path)
            }
            _ => return Err(InvalidTwinPath(from)),
        }
    }

    Ok(TwinOperation { twin_id, operation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn operations(batch: Value) -> Vec<PatchOperation> {
        parse_patch_document(batch.to_string().as_bytes()).unwrap()
    }

    #[test_case("/twin/prop", "twin", "/prop")]
    #[test_case("/twin/nested/prop", "twin", "/nested/prop")]
    #[test_case("/twin/prop/", "twin", "/prop/")]
    #[test_case("/a.b-c/$metadata/prop", "a.b-c", "/$metadata/prop")]
    fn valid_twin_paths(path: &str, twin_id: &str, rest: &str) {
        assert_eq!(
            split_twin_path(path),
            Some((twin_id.to_string(), rest.to_string()))
        );
    }

    #[test_case(""; "empty")]
    #[test_case("/"; "root")]
    #[test_case("/twin"; "twin only")]
    #[test_case("/twin/"; "trailing slash only")]
    #[test_case("twin/prop"; "relative")]
    fn invalid_twin_paths(path: &str) {
        assert_eq!(split_twin_path(path), None);
    }

    #[test]
    fn value_is_omitted_when_absent() {
        let operation = PatchOperation {
            op: PatchOp::Remove,
            path: "/prop".to_string(),
            from: None,
            value: None,
        };

        assert_eq!(
            serde_json::to_value(&operation).unwrap(),
            json!({"op": "remove", "path": "/prop"})
        );
    }

    #[test]
    fn unknown_operations_are_rejected() {
        let batch = json!([{"op": "merge", "path": "/twin/prop", "value": 1}]);
        assert!(parse_patch_document(batch.to_string().as_bytes()).is_err());
    }

    fn twin_operation(twin_id: &str, operation: Value) -> TwinOperation {
        TwinOperation {
            twin_id: twin_id.to_string(),
            operation: serde_json::from_value(operation).unwrap(),
        }
    }

    #[test]
    fn twin_ids_are_stripped_in_input_order() {
        let batch = operations(json!([
            {"op": "replace", "path": "/room-1/temperature"},
            {"op": "add", "path": "/room-2/humidity", "value": 40},
            {"op": "remove", "path": "/room-1/occupied"},
        ]));

        assert_eq!(
            split_by_twin(batch),
            Ok(vec![
                twin_operation("room-1", json!({"op": "replace", "path": "/temperature"})),
                twin_operation("room-2", json!({"op": "add", "path": "/humidity", "value": 40})),
                twin_operation("room-1", json!({"op": "remove", "path": "/occupied"})),
            ])
        );
    }

    #[test]
    fn one_invalid_path_rejects_the_batch() {
        let batch = operations(json!([
            {"op": "replace", "path": "/room-1/temperature", "value": 21.5},
            {"op": "replace", "path": "/room-2", "value": 19},
        ]));

        assert_eq!(
            split_by_twin(batch),
            Err(InvalidTwinPath("/room-2".to_string()))
        );
    }

    #[test]
    fn from_pointers_are_stripped_too() {
        let batch = operations(json!([
            {"op": "move", "from": "/room-1/old", "path": "/room-1/new"},
        ]));

        let twin_operations = split_by_twin(batch).unwrap();

        assert_eq!(twin_operations[0].twin_id, "room-1");
        assert_eq!(twin_operations[0].operation.from.as_deref(), Some("/old"));
        assert_eq!(twin_operations[0].operation.path, "/new");
    }

    #[test]
    fn from_pointers_cannot_cross_twins() {
        let batch = operations(json!([
            {"op": "copy", "from": "/room-2/temperature", "path": "/room-1/temperature"},
        ]));

        assert_eq!(
            split_by_twin(batch),
            Err(InvalidTwinPath("/room-2/temperature".to_string()))
        );
    }

    #[test]
    fn empty_batch_has_no_operation() {
        assert_eq!(split_by_twin(vec![]), Ok(vec![]));
    }
}
