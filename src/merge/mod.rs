//! Merge rules for configuration trees.
//!
//! Every function here is pure: inputs are borrowed, the result is a fresh
//! value, and nothing performs I/O.
//!
//! | Function                    | Used for                                        |
//! |-----------------------------|-------------------------------------------------|
//! | [`deep_merge`]              | settings scopes, session sections, module config |
//! | [`deep_merge_pruning_nulls`] | explicit child trees where `null` deletes a key |
//! | [`merge_module_lists`]      | `providers` / `tools` / `hooks`                 |
//! | [`merge_module_entry`]      | one matched pair inside a module list           |
//! | [`merge_tool_config`]       | tool configs with additive permission lists     |
//! | [`merge_agent_maps`]        | the mount plan `agents` map (plain overwrite)   |

use crate::models::{ConfigTree, ModuleEntry};
use serde_json::Value;

/// Permission lists that accumulate across layers instead of being replaced.
pub const UNION_CONFIG_FIELDS: &[&str] = &[
    "allowed_write_paths",
    "allowed_read_paths",
    "denied_write_paths",
];

/// Recursively merge `overlay` onto `base`.
///
/// Overlay wins on conflicts. Mappings present on both sides merge
/// recursively; anything else (scalars, lists, type mismatches) is replaced
/// wholesale. `null` overlay values are copied like any other value.
pub fn deep_merge(base: &ConfigTree, overlay: &ConfigTree) -> ConfigTree {
    let mut result = base.clone();
    for (key, value) in overlay {
        let merged = match (result.get(key), value) {
            (Some(Value::Object(b)), Value::Object(o)) => Value::Object(deep_merge(b, o)),
            _ => value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}

/// Like [`deep_merge`], except an explicit `null` in the overlay removes the
/// inherited key instead of storing `null`.
pub fn deep_merge_pruning_nulls(base: &ConfigTree, overlay: &ConfigTree) -> ConfigTree {
    let mut result = base.clone();
    for (key, value) in overlay {
        match (result.get(key), value) {
            (_, Value::Null) => {
                result.remove(key);
            }
            (Some(Value::Object(b)), Value::Object(o)) => {
                let merged = deep_merge_pruning_nulls(b, o);
                result.insert(key.clone(), Value::Object(merged));
            }
            _ => {
                result.insert(key.clone(), value.clone());
            }
        }
    }
    result
}

/// Merge a matched pair of module entries.
///
/// Every field except `config` is replaced by the overlay when the overlay
/// sets it (including `source`). `config` deep-merges when both sides are
/// mappings and is otherwise replaced.
pub fn merge_module_entry(base: &ModuleEntry, overlay: &ModuleEntry) -> ModuleEntry {
    let mut merged = base.clone();
    merged.module = overlay.module.clone();

    if overlay.source.is_some() {
        merged.source = overlay.source.clone();
    }

    merged.config = match (&base.config, &overlay.config) {
        (Some(Value::Object(b)), Some(Value::Object(o))) => Some(Value::Object(deep_merge(b, o))),
        (_, Some(o)) => Some(o.clone()),
        (b, None) => b.clone(),
    };

    for (key, value) in &overlay.extra {
        merged.extra.insert(key.clone(), value.clone());
    }

    merged
}

/// Merge two module lists by `module` identity.
///
/// Base order is preserved for every base entry (merged in place when the
/// overlay also has it); overlay-only entries follow in overlay order.
/// Repeated ids within one list collapse onto the first occurrence.
pub fn merge_module_lists(base: &[ModuleEntry], overlay: &[ModuleEntry]) -> Vec<ModuleEntry> {
    let mut result: Vec<ModuleEntry> = Vec::with_capacity(base.len() + overlay.len());

    for entry in base.iter().chain(overlay) {
        match result.iter_mut().find(|e| e.module == entry.module) {
            Some(existing) => *existing = merge_module_entry(existing, entry),
            None => result.push(entry.clone()),
        }
    }

    result
}

/// Shallow overlay-wins merge of two tool configs, except that any field in
/// `union_fields` present as a list on both sides becomes the union of both.
///
/// Union order is base items first, then overlay items not already present.
pub fn merge_tool_config(
    base: &ConfigTree,
    overlay: &ConfigTree,
    union_fields: &[&str],
) -> ConfigTree {
    let mut result = base.clone();
    for (key, value) in overlay {
        result.insert(key.clone(), value.clone());
    }

    for field in union_fields {
        if let (Some(Value::Array(b)), Some(Value::Array(o))) = (base.get(*field), overlay.get(*field))
        {
            let mut union = b.clone();
            for item in o {
                if !union.contains(item) {
                    union.push(item.clone());
                }
            }
            result.insert((*field).to_string(), Value::Array(union));
        }
    }

    result
}

/// Merge agent fragment maps by plain key overwrite.
///
/// Agents are named config fragments, not modules: an overlay fragment
/// replaces the base fragment with the same name outright.
pub fn merge_agent_maps(base: &ConfigTree, overlay: &ConfigTree) -> ConfigTree {
    shallow_update(base, overlay)
}

/// Key-level update: overlay top-level keys replace base keys, nothing recurses.
pub fn shallow_update(base: &ConfigTree, overlay: &ConfigTree) -> ConfigTree {
    let mut result = base.clone();
    for (key, value) in overlay {
        result.insert(key.clone(), value.clone());
    }
    result
}
