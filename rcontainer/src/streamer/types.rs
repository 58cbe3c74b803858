//! Concrete, typed schema records reconstructed from the generic
//! [`Value`](crate::value::Value) tree produced by the built-in
//! `TStreamerInfo`/`TStreamerElement` readers.
//!
//! The wire readers in [`crate::builtin`] stay inside the uniform
//! `ReadObjectAny`/registry machinery (every nested record, streamer
//! elements included, is decoded the same way any other polymorphic object
//! is). This module is where that generic tree gets interpreted into the
//! typed shape the dependency sorter and class synthesizer actually work
//! with.

use crate::value::Value;
use rcontainer_cursor::{ReadError, Result};

/// One class's schema: name, declared version, and its ordered element
/// list.
#[derive(Debug, Clone)]
pub struct TStreamerInfo {
    pub name: String,
    pub class_version: i32,
    pub check_sum: u32,
    pub elements: Vec<TStreamerElement>,
}

/// Fields shared by every streamer element variant.
#[derive(Debug, Clone)]
pub struct ElementCommon {
    pub name: String,
    pub title: String,
    pub ftype: i32,
    pub fsize: i32,
    pub farraylength: i32,
    pub farraydim: i32,
    pub fmaxindex: Vec<i32>,
    pub ftypename: String,
}

/// One field of a streamer.
#[derive(Debug, Clone)]
pub enum TStreamerElement {
    Base {
        common: ElementCommon,
        base_version: Option<i32>,
    },
    BasicPointer {
        common: ElementCommon,
        count_name: String,
        count_class: String,
    },
    Loop {
        common: ElementCommon,
        count_name: String,
        count_class: String,
    },
    BasicType {
        common: ElementCommon,
    },
    Stl {
        common: ElementCommon,
        stl_type: i32,
        ctype: i32,
    },
    StlString {
        common: ElementCommon,
        stl_type: i32,
        ctype: i32,
    },
    Object {
        common: ElementCommon,
    },
    ObjectAny {
        common: ElementCommon,
    },
    ObjectPointer {
        common: ElementCommon,
    },
    ObjectAnyPointer {
        common: ElementCommon,
    },
    String {
        common: ElementCommon,
    },
    Artificial {
        common: ElementCommon,
    },
}

impl TStreamerElement {
    /// The fields shared across every variant.
    pub fn common(&self) -> &ElementCommon {
        match self {
            TStreamerElement::Base { common, .. }
            | TStreamerElement::BasicPointer { common, .. }
            | TStreamerElement::Loop { common, .. }
            | TStreamerElement::BasicType { common }
            | TStreamerElement::Stl { common, .. }
            | TStreamerElement::StlString { common, .. }
            | TStreamerElement::Object { common }
            | TStreamerElement::ObjectAny { common }
            | TStreamerElement::ObjectPointer { common }
            | TStreamerElement::ObjectAnyPointer { common }
            | TStreamerElement::String { common }
            | TStreamerElement::Artificial { common } => common,
        }
    }
}

fn req_str(fields: &std::collections::BTreeMap<String, Value>, key: &str) -> Result<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ReadError::malformed(format!("streamer element missing field {key}")))
}

fn req_i32(fields: &std::collections::BTreeMap<String, Value>, key: &str) -> Result<i32> {
    fields
        .get(key)
        .and_then(Value::as_i32)
        .ok_or_else(|| ReadError::malformed(format!("streamer element missing field {key}")))
}

fn common_from_fields(fields: &std::collections::BTreeMap<String, Value>) -> Result<ElementCommon> {
    let fmaxindex = fields
        .get("fMaxIndex")
        .and_then(Value::as_array)
        .ok_or_else(|| ReadError::malformed("streamer element missing fMaxIndex"))?
        .iter()
        .map(|v| v.as_i32().ok_or_else(|| ReadError::malformed("fMaxIndex entry not an i32")))
        .collect::<Result<Vec<_>>>()?;
    Ok(ElementCommon {
        name: req_str(fields, "fName")?,
        title: req_str(fields, "fTitle")?,
        ftype: req_i32(fields, "fType")?,
        fsize: req_i32(fields, "fSize")?,
        farraylength: req_i32(fields, "fArrayLength")?,
        farraydim: req_i32(fields, "fArrayDim")?,
        fmaxindex,
        ftypename: req_str(fields, "fTypeName")?,
    })
}

/// Converts one decoded [`Value::Object`] produced by a `TStreamerXxx`
/// builtin reader into a concrete [`TStreamerElement`].
pub fn element_from_value(value: &Value) -> Result<TStreamerElement> {
    let object = value
        .as_object()
        .ok_or_else(|| ReadError::malformed("streamer element is not an object"))?;
    let common = common_from_fields(&object.fields)?;
    match object.class_name.as_str() {
        "TStreamerBase" => Ok(TStreamerElement::Base {
            base_version: object.field("fBaseVersion").and_then(Value::as_i32),
            common,
        }),
        "TStreamerBasicPointer" => Ok(TStreamerElement::BasicPointer {
            count_name: req_str(&object.fields, "fCountName")?,
            count_class: req_str(&object.fields, "fCountClass")?,
            common,
        }),
        "TStreamerLoop" => Ok(TStreamerElement::Loop {
            count_name: req_str(&object.fields, "fCountName")?,
            count_class: req_str(&object.fields, "fCountClass")?,
            common,
        }),
        "TStreamerBasicType" => Ok(TStreamerElement::BasicType { common }),
        "TStreamerSTL" => Ok(TStreamerElement::Stl {
            stl_type: req_i32(&object.fields, "fSTLtype")?,
            ctype: req_i32(&object.fields, "fCtype")?,
            common,
        }),
        "TStreamerSTLstring" => Ok(TStreamerElement::StlString {
            stl_type: req_i32(&object.fields, "fSTLtype")?,
            ctype: req_i32(&object.fields, "fCtype")?,
            common,
        }),
        "TStreamerObject" => Ok(TStreamerElement::Object { common }),
        "TStreamerObjectAny" => Ok(TStreamerElement::ObjectAny { common }),
        "TStreamerObjectPointer" => Ok(TStreamerElement::ObjectPointer { common }),
        "TStreamerObjectAnyPointer" => Ok(TStreamerElement::ObjectAnyPointer { common }),
        "TStreamerString" => Ok(TStreamerElement::String { common }),
        "TStreamerArtificial" => Ok(TStreamerElement::Artificial { common }),
        other => Err(ReadError::malformed(format!(
            "unrecognized streamer element class {other}"
        ))),
    }
}

/// Converts one decoded `TStreamerInfo` [`Value::Object`] into a concrete
/// [`TStreamerInfo`], decoding its element list along the way.
pub fn streamer_info_from_value(value: &Value) -> Result<TStreamerInfo> {
    let object = value
        .as_object()
        .ok_or_else(|| ReadError::malformed("streamer info is not an object"))?;
    let elements_value = object
        .field("fElements")
        .ok_or_else(|| ReadError::malformed("TStreamerInfo missing fElements"))?;
    let elements = match elements_value {
        Value::Array(items) => items.iter().map(element_from_value).collect::<Result<Vec<_>>>()?,
        Value::Object(list) if list.class_name == "TList" || list.class_name == "TObjArray" => list
            .field("fElements")
            .and_then(Value::as_array)
            .ok_or_else(|| ReadError::malformed("TStreamerInfo element list missing fElements"))?
            .iter()
            .map(element_from_value)
            .collect::<Result<Vec<_>>>()?,
        _ => {
            return Err(ReadError::malformed(
                "TStreamerInfo::fElements is neither an array nor a list",
            ))
        }
    };
    Ok(TStreamerInfo {
        name: req_str(&object.fields, "fName")?,
        class_version: req_i32(&object.fields, "fClassVersion")?,
        check_sum: object
            .field("fCheckSum")
            .and_then(Value::as_u32)
            .ok_or_else(|| ReadError::malformed("TStreamerInfo missing fCheckSum"))?,
        elements,
    })
}

impl TStreamerElement {
    /// The dependency this element introduces: a base class's name, or a
    /// nested-object element's type name with any trailing pointer star
    /// stripped, or `None` for elements that do not introduce a class
    /// dependency.
    pub fn dependency(&self) -> Option<String> {
        match self {
            TStreamerElement::Base { common, .. } => Some(common.name.clone()),
            TStreamerElement::Object { common }
            | TStreamerElement::ObjectAny { common }
            | TStreamerElement::String { common } => {
                Some(common.ftypename.trim_end_matches('*').to_string())
            }
            TStreamerElement::ObjectPointer { common } if common.ftype == crate::context::K_OBJECTP => {
                Some(common.ftypename.trim_end_matches('*').to_string())
            }
            _ => None,
        }
    }
}
