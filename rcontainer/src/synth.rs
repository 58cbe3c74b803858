//! The class synthesizer: builds, for each streamer in dependency order,
//! an in-memory [`ClassDescriptor`] whose reader executes a fixed sequence
//! of read-step records.
//!
//! No runtime code generation happens here: each streamer compiles down to
//! an ordered `Vec<ReadStep>`, and a single interpreter
//! (`ClassDescriptor::read`) drives every synthesized class.

use crate::builtin::read_undefined;
use crate::context::{ClassReader, Cursor, FileContext, K_OBJECTP, K_OBJECTP_PTR};
use crate::ftype;
use crate::refs::read_object_any;
use crate::sanitize::sanitize_class_name;
use crate::streamer::{TStreamerElement, TStreamerInfo};
use crate::value::{Object, Value};
use rcontainer_cursor::framed::{end_check, start_check};
use rcontainer_cursor::{ReadError, Result};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::debug;

/// One step of a synthesized class's read procedure.
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Invoke the base class's reader, flattening its fields into `self`.
    ReadBase { class_name: String },
    /// A run of consecutive fixed-size scalar fields, read back to back.
    ReadScalarBatch { fields: Vec<(String, i32)> },
    /// A fixed-length array field.
    ReadFixedArray {
        field: String,
        ftype: i32,
        length: i32,
    },
    /// A counted pointer array field: the count is read from an already-
    /// decoded sibling field named by the streamer's title pattern.
    ReadCountedArray {
        field: String,
        ftype: i32,
        counter_field: String,
    },
    /// A nested object value, read inline (not through `ReadObjectAny`).
    ReadInlineObject { field: String, class_name: String },
    /// A nested object reached polymorphically through `ReadObjectAny`.
    ReadObjectAny { field: String },
    /// A field configured to be skipped via `OpenOptions`, or a streamer
    /// element kind this crate deliberately declines to decode
    /// (`TStreamerObjectAnyPointer`, `TStreamerSTL` and its string
    /// specialization, `TStreamerLoop`, `TStreamerArtificial`).
    Skip { field: String, reason: SkipReason },
}

/// Why a field is read as [`Undefined`](crate::value::Undefined).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Configured via `OpenOptions`'s per-class skip table.
    Configured,
    /// A streamer element kind this crate does not decode, chosen to fail
    /// fast instead -- except it is reached through a skip-rule, which
    /// takes priority, so this variant only ever surfaces as an error.
    Unsupported,
}

/// A class synthesized from a streamer: its name, the streamer version it
/// expects, and its read procedure.
pub struct ClassDescriptor {
    /// Sanitized class name.
    pub class_name: String,
    /// The streamer's declared class version; the reader rejects any
    /// record whose framed version differs.
    pub version: u16,
    /// Base class names, in declaration order.
    pub bases: Vec<String>,
    /// The read procedure.
    pub steps: Vec<ReadStep>,
}

impl ClassDescriptor {
    /// Runs this class's read procedure against `cursor`.
    pub fn read(&self, cursor: &mut Cursor, ctx: &FileContext) -> Result<Value> {
        let record = start_check(cursor)?;
        if record.version != self.version {
            return Err(ReadError::malformed(format!(
                "{}: record version {} does not match synthesized class version {}",
                self.class_name, record.version, self.version
            )));
        }
        let mut fields = BTreeMap::new();
        for step in &self.steps {
            execute_step(step, &self.class_name, cursor, ctx, &mut fields)?;
        }
        end_check(cursor, record)?;
        Ok(Value::Object(Rc::new(Object {
            class_name: self.class_name.clone(),
            version: record.version,
            fields,
        })))
    }
}

fn execute_step(
    step: &ReadStep,
    class_name: &str,
    cursor: &mut Cursor,
    ctx: &FileContext,
    fields: &mut BTreeMap<String, Value>,
) -> Result<()> {
    match step {
        ReadStep::ReadBase { class_name: base } => {
            let reader = ctx.class(base).ok_or_else(|| {
                ReadError::malformed(format!("{class_name}: unknown base class {base}"))
            })?;
            let value = reader.read(cursor, ctx)?;
            if let Some(base_obj) = value.as_object() {
                for (k, v) in &base_obj.fields {
                    fields.insert(k.clone(), v.clone());
                }
            }
        }
        ReadStep::ReadScalarBatch { fields: batch } => {
            for (name, ftype) in batch {
                fields.insert(name.clone(), read_scalar(cursor, *ftype)?);
            }
        }
        ReadStep::ReadFixedArray { field, ftype, length } => {
            let items = read_scalar_array(cursor, *ftype, (*length).max(0) as usize)?;
            fields.insert(field.clone(), Value::Array(items));
        }
        ReadStep::ReadCountedArray {
            field,
            ftype,
            counter_field,
        } => {
            cursor.skip(1)?; // leading "is-allocated" byte before a counted pointer array
            let count = fields
                .get(counter_field)
                .and_then(Value::as_i32)
                .ok_or_else(|| {
                    ReadError::malformed(format!(
                        "{class_name}: counted array {field} references unknown counter {counter_field}"
                    ))
                })?;
            let items = read_scalar_array(cursor, *ftype, count.max(0) as usize)?;
            fields.insert(field.clone(), Value::Array(items));
        }
        ReadStep::ReadInlineObject { field, class_name: nested } => {
            let reader = ctx.class(nested).ok_or_else(|| {
                ReadError::malformed(format!("{class_name}: unknown nested class {nested}"))
            })?;
            let value = reader.read(cursor, ctx)?;
            fields.insert(field.clone(), value);
        }
        ReadStep::ReadObjectAny { field } => {
            let value = read_object_any(cursor, ctx, false)?;
            fields.insert(field.clone(), value);
        }
        ReadStep::Skip { field, reason } => {
            if *reason == SkipReason::Unsupported {
                return Err(ReadError::unsupported(format!(
                    "{class_name}: field {field} uses an unsupported streamer element kind"
                )));
            }
            let value = read_undefined(cursor, None)?;
            fields.insert(field.clone(), value);
        }
    }
    Ok(())
}

fn read_scalar(cursor: &mut Cursor, ftype: i32) -> Result<Value> {
    use ftype::*;
    Ok(match ftype {
        K_BOOL => Value::Bool(cursor.u8()? != 0),
        K_UCHAR => Value::U8(cursor.u8()?),
        K_CHAR => Value::I8(cursor.i8()?),
        K_USHORT => Value::U16(cursor.u16()?),
        K_SHORT => Value::I16(cursor.i16()?),
        K_BITS | K_UINT | K_COUNTER => Value::U32(cursor.u32()?),
        K_INT => Value::I32(cursor.i32()?),
        K_ULONG | K_ULONG64 => Value::U64(cursor.u64()?),
        K_LONG | K_LONG64 => Value::I64(cursor.i64()?),
        K_FLOAT | K_FLOAT16 => Value::F32(cursor.f32()?),
        K_DOUBLE | K_DOUBLE32 => Value::F64(cursor.f64()?),
        K_CHAR_STAR => {
            return Err(ReadError::unsupported(
                "reading a kCharStar field's value is unspecified",
            ))
        }
        other => return Err(ReadError::unsupported(format!("unknown fType {other}"))),
    })
}

fn read_scalar_array(cursor: &mut Cursor, ftype: i32, n: usize) -> Result<Vec<Value>> {
    use ftype::*;
    Ok(match ftype {
        K_BOOL => cursor.array_u8(n)?.into_iter().map(|b| Value::Bool(b != 0)).collect(),
        K_UCHAR => cursor.array_u8(n)?.into_iter().map(Value::U8).collect(),
        K_CHAR => cursor.array_i8(n)?.into_iter().map(Value::I8).collect(),
        K_USHORT => cursor.array_u16(n)?.into_iter().map(Value::U16).collect(),
        K_SHORT => cursor.array_i16(n)?.into_iter().map(Value::I16).collect(),
        K_BITS | K_UINT | K_COUNTER => cursor.array_u32(n)?.into_iter().map(Value::U32).collect(),
        K_INT => cursor.array_i32(n)?.into_iter().map(Value::I32).collect(),
        K_ULONG | K_ULONG64 => cursor.array_u64(n)?.into_iter().map(Value::U64).collect(),
        K_LONG | K_LONG64 => cursor.array_i64(n)?.into_iter().map(Value::I64).collect(),
        K_FLOAT | K_FLOAT16 => cursor.array_f32(n)?.into_iter().map(Value::F32).collect(),
        K_DOUBLE | K_DOUBLE32 => cursor.array_f64(n)?.into_iter().map(Value::F64).collect(),
        other => return Err(ReadError::unsupported(format!("unknown array fType {other}"))),
    })
}

/// Extracts the counter field name from a `TStreamerBasicPointer`'s title,
/// e.g. `"[fN]"` -> `"fN"`.
fn counter_from_title(title: &str) -> Option<String> {
    let start = title.find('[')?;
    let end = title[start..].find(']')? + start;
    Some(title[start + 1..end].to_string())
}

fn build_steps(streamer: &TStreamerInfo, class_name: &str) -> Result<(Vec<String>, Vec<ReadStep>)> {
    let mut bases = Vec::new();
    let mut steps = Vec::new();
    let mut pending_batch: Vec<(String, i32)> = Vec::new();

    macro_rules! flush_batch {
        () => {
            if !pending_batch.is_empty() {
                steps.push(ReadStep::ReadScalarBatch {
                    fields: std::mem::take(&mut pending_batch),
                });
            }
        };
    }

    for element in &streamer.elements {
        match element {
            TStreamerElement::Base { common, .. } => {
                flush_batch!();
                bases.push(common.name.clone());
                steps.push(ReadStep::ReadBase {
                    class_name: sanitize_class_name(&common.name),
                });
            }
            TStreamerElement::BasicType { common } => {
                if common.farraylength > 0 {
                    flush_batch!();
                    steps.push(ReadStep::ReadFixedArray {
                        field: common.name.clone(),
                        ftype: common.ftype,
                        length: common.farraylength,
                    });
                } else {
                    pending_batch.push((common.name.clone(), common.ftype));
                }
            }
            TStreamerElement::BasicPointer { common, .. } => {
                flush_batch!();
                // The counter field name comes from the `[name]` bracket in
                // the element's title; `fCountName` is a separate wire
                // field, unused here.
                let counter_field = counter_from_title(&common.title).ok_or_else(|| {
                    ReadError::malformed(format!(
                        "{class_name}: basic pointer element {} has no [counter] in its title",
                        common.name
                    ))
                })?;
                let dtype = common.ftype - crate::context::K_OFFSET_P;
                steps.push(ReadStep::ReadCountedArray {
                    field: common.name.clone(),
                    ftype: dtype,
                    counter_field,
                });
            }
            TStreamerElement::ObjectPointer { common } => {
                flush_batch!();
                if common.ftype == K_OBJECTP {
                    steps.push(ReadStep::ReadInlineObject {
                        field: common.name.clone(),
                        class_name: sanitize_class_name(common.ftypename.trim_end_matches('*')),
                    });
                } else if common.ftype == K_OBJECTP_PTR {
                    steps.push(ReadStep::ReadObjectAny {
                        field: common.name.clone(),
                    });
                } else {
                    steps.push(ReadStep::Skip {
                        field: common.name.clone(),
                        reason: SkipReason::Unsupported,
                    });
                }
            }
            TStreamerElement::Object { common }
            | TStreamerElement::ObjectAny { common }
            | TStreamerElement::String { common } => {
                flush_batch!();
                steps.push(ReadStep::ReadInlineObject {
                    field: common.name.clone(),
                    class_name: sanitize_class_name(common.ftypename.trim_end_matches('*')),
                });
            }
            TStreamerElement::ObjectAnyPointer { common }
            | TStreamerElement::Stl { common, .. }
            | TStreamerElement::StlString { common, .. }
            | TStreamerElement::Loop { common, .. }
            | TStreamerElement::Artificial { common } => {
                flush_batch!();
                steps.push(ReadStep::Skip {
                    field: common.name.clone(),
                    reason: SkipReason::Unsupported,
                });
            }
        }
    }
    flush_batch!();
    Ok((bases, steps))
}

/// Applies the per-class skip table to an already-built step list,
/// rewriting matching steps to [`ReadStep::Skip`] with
/// [`SkipReason::Configured`] (which takes priority over an
/// `Unsupported` skip that would otherwise be fatal).
fn apply_skip_rules(class_name: &str, steps: &mut [ReadStep], ctx: &FileContext) {
    for step in steps.iter_mut() {
        let field = match step {
            ReadStep::ReadFixedArray { field, .. }
            | ReadStep::ReadCountedArray { field, .. }
            | ReadStep::ReadInlineObject { field, .. }
            | ReadStep::ReadObjectAny { field }
            | ReadStep::Skip { field, .. } => field.as_str(),
            ReadStep::ReadBase { .. } | ReadStep::ReadScalarBatch { .. } => continue,
        };
        if ctx.is_skipped(class_name, field) {
            *step = ReadStep::Skip {
                field: field.to_string(),
                reason: SkipReason::Configured,
            };
        }
    }
}

/// Synthesizes a [`ClassDescriptor`] for `streamer`, using `bootstrap` only
/// to resolve its per-class skip rules (base/nested classes are resolved
/// lazily, by name, when the descriptor's reader actually runs).
pub fn build_descriptor(streamer: &TStreamerInfo, bootstrap: &FileContext) -> Result<ClassDescriptor> {
    let class_name = sanitize_class_name(&streamer.name);
    let (bases, mut steps) = build_steps(streamer, &class_name)?;
    apply_skip_rules(&class_name, &mut steps, bootstrap);
    Ok(ClassDescriptor {
        class_name,
        version: streamer.class_version as u16,
        bases,
        steps,
    })
}

/// Synthesizes every streamer in `streamers` (already in dependency
/// order) and returns the full class registry: `bootstrap`'s built-ins
/// plus one [`ClassDescriptor`] per streamer whose sanitized name is not
/// already a built-in.
pub fn synthesize(
    streamers: &[TStreamerInfo],
    bootstrap: &FileContext,
) -> Result<HashMap<String, ClassReader>> {
    let mut classes: HashMap<String, ClassReader> = (*bootstrap.classes).clone();
    for streamer in streamers {
        let class_name = sanitize_class_name(&streamer.name);
        if classes.contains_key(&class_name) {
            continue;
        }
        let descriptor = build_descriptor(streamer, bootstrap)?;
        debug!(class = %class_name, version = streamer.class_version, "synthesized class");
        classes.insert(class_name, ClassReader::Synthesized(Rc::new(descriptor)));
    }
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamer::ElementCommon;

    fn common(name: &str, title: &str, ftype: i32) -> ElementCommon {
        ElementCommon {
            name: name.to_string(),
            title: title.to_string(),
            ftype,
            fsize: 0,
            farraylength: 0,
            farraydim: 0,
            fmaxindex: Vec::new(),
            ftypename: String::new(),
        }
    }

    #[test]
    fn counter_pattern_extraction() {
        assert_eq!(counter_from_title("number of entries [fN]"), Some("fN".to_string()));
        assert_eq!(counter_from_title("no brackets here"), None);
    }

    #[test]
    fn basic_pointer_reads_counter_from_title() {
        let streamer = TStreamerInfo {
            name: "Foo".to_string(),
            class_version: 1,
            check_sum: 0,
            elements: vec![TStreamerElement::BasicPointer {
                common: common("fArr", "array [fN]", crate::context::K_OFFSET_P + ftype::K_INT),
                count_name: "ignored".to_string(),
                count_class: "Foo".to_string(),
            }],
        };
        let (_, steps) = build_steps(&streamer, "Foo").unwrap();
        assert!(matches!(
            steps.as_slice(),
            [ReadStep::ReadCountedArray { counter_field, .. }] if counter_field == "fN"
        ));
    }
}
