//! Schema catalog loader: reads the list of `TStreamerInfo` records from
//! the file's "info" key.

use super::types::{streamer_info_from_value, TStreamerInfo};
use crate::builtin::read_tlist;
use crate::context::{Cursor, FileContext};
use crate::value::Value;
use rcontainer_cursor::{ReadError, Result};

/// A schema-rule list: a `TList` of `TObjString` kept aside, uninterpreted
/// (schema evolution across incompatible versions is out of scope here).
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    pub rules: Vec<String>,
}

/// The parsed contents of the embedded schema catalog: the ordered
/// streamer records, plus any schema-rule lists found alongside them.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub streamers: Vec<TStreamerInfo>,
    pub rule_lists: Vec<RuleList>,
}

fn is_tobjstring_list(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    if object.class_name != "TList" && object.class_name != "TObjArray" {
        return false;
    }
    object
        .field("fElements")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .all(|item| item.as_object().map(|o| o.class_name == "TObjString").unwrap_or(false))
        })
        .unwrap_or(false)
}

fn rule_list_from_value(value: &Value) -> Result<RuleList> {
    let object = value
        .as_object()
        .ok_or_else(|| ReadError::malformed("schema-rule list is not an object"))?;
    let items = object
        .field("fElements")
        .and_then(Value::as_array)
        .ok_or_else(|| ReadError::malformed("schema-rule list missing fElements"))?;
    let mut rules = Vec::with_capacity(items.len());
    for item in items {
        let s = item
            .as_object()
            .and_then(|o| o.field("fString"))
            .and_then(Value::as_str)
            .ok_or_else(|| ReadError::malformed("schema-rule list entry is not a TObjString"))?;
        rules.push(s.to_string());
    }
    Ok(RuleList { rules })
}

/// Reads and classifies the `TList` found at `cursor`: each element is
/// either a `TStreamerInfo` (collected with its dependency set, via
/// [`streamer_info_from_value`]) or a `TList`/`TObjArray` of `TObjString`
/// (a schema-rule list, kept aside). Any other element is a fatal format
/// error.
pub fn load_catalog(cursor: &mut Cursor, ctx: &FileContext) -> Result<Catalog> {
    let list = read_tlist(cursor, ctx)?;
    let elements = list
        .as_object()
        .and_then(|o| o.field("fElements"))
        .and_then(Value::as_array)
        .ok_or_else(|| ReadError::malformed("streamer catalog key did not decode to a TList"))?;

    let mut catalog = Catalog::default();
    for element in elements {
        if is_tobjstring_list(element) {
            catalog.rule_lists.push(rule_list_from_value(element)?);
        } else if element.as_object().map(|o| o.class_name == "TStreamerInfo").unwrap_or(false) {
            catalog.streamers.push(streamer_info_from_value(element)?);
        } else {
            let kind = element
                .as_object()
                .map(|o| o.class_name.clone())
                .unwrap_or_else(|| "<non-object>".to_string());
            return Err(ReadError::malformed(format!(
                "streamer catalog contains an unexpected element type: {kind}"
            )));
        }
    }
    Ok(catalog)
}
