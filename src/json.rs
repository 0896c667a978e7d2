//! Name-keyed, patch-style merging of descriptor lists from JSON.

use crate::descriptor::NamedInfo;
use crate::error::{ConnectedBodyError, Result};
use serde_json::Value;

/// Key that marks a list entry for removal.
pub const DELETED_KEY: &str = "__deleted__";

/// Merges one JSON entry into `infos`.
///
/// An entry whose `name` matches an existing element patches that element in
/// place with the fields it carries. An entry with `"__deleted__": true`
/// removes the matching element instead. Anything else is appended.
pub fn update_or_create_with_name_check<T: NamedInfo>(
    infos: &mut Vec<T>,
    entry: &Value,
) -> Result<()> {
    let Some(object) = entry.as_object() else {
        return Err(ConnectedBodyError::MalformedDocument(format!(
            "{} entry is not an object",
            T::CATEGORY
        )));
    };
    let deleted = object
        .get(DELETED_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let name = object.get("name").and_then(Value::as_str);
    let existing = name.and_then(|name| infos.iter().position(|info| info.name() == name));

    match (existing, deleted) {
        (Some(index), true) => {
            infos.remove(index);
        }
        (None, true) => {}
        (Some(index), false) => {
            let mut merged = serde_json::to_value(&infos[index]).map_err(|source| {
                ConnectedBodyError::Decode {
                    what: T::CATEGORY,
                    source,
                }
            })?;
            merge_patch(&mut merged, entry);
            infos[index] = decode(merged)?;
        }
        (None, false) => infos.push(decode(entry.clone())?),
    }
    Ok(())
}

fn decode<T: NamedInfo>(mut value: Value) -> Result<T> {
    if let Some(object) = value.as_object_mut() {
        object.remove(DELETED_KEY);
    }
    serde_json::from_value(value).map_err(|source| ConnectedBodyError::Decode {
        what: T::CATEGORY,
        source,
    })
}

/// Recursively overlays `patch` onto `base`: objects merge key by key, every
/// other value replaces what was there.
pub fn merge_patch(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(existing) => merge_patch(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::LinkInfo;
    use serde_json::json;

    #[test]
    fn matching_name_patches_in_place() {
        let mut links = vec![LinkInfo::new("a"), LinkInfo::new("b")];
        links[0].mass = 2.0;
        update_or_create_with_name_check(&mut links, &json!({"name": "a", "isVisible": false}))
            .unwrap();
        assert_eq!(links.len(), 2);
        assert!(!links[0].is_visible);
        assert_eq!(links[0].mass, 2.0);
    }

    #[test]
    fn unknown_name_appends() {
        let mut links = vec![LinkInfo::new("a")];
        update_or_create_with_name_check(&mut links, &json!({"name": "c"})).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].name, "c");
    }

    #[test]
    fn deleted_entry_removes() {
        let mut links = vec![LinkInfo::new("a"), LinkInfo::new("b")];
        update_or_create_with_name_check(&mut links, &json!({"name": "a", "__deleted__": true}))
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name, "b");
    }

    #[test]
    fn non_object_entry_is_rejected() {
        let mut links: Vec<LinkInfo> = Vec::new();
        let err = update_or_create_with_name_check(&mut links, &json!("a")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArguments);
    }
}
