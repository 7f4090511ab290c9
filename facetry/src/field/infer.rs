//! Field plans inferred from a sample value when a name matches nothing declared.

use serde_json::Value;

use super::plan::{Capabilities, FieldPlan};
use crate::schema::FieldType;

/// Infer a plan for `name` from the runtime type of `sample`.
///
/// Arrays are inferred from their first non-null element. Nulls, objects and
/// empty arrays carry no usable type and yield `None`.
pub fn infer_plan(name: &str, sample: &Value) -> Option<FieldPlan> {
    let (value_type, capabilities) = infer_type(sample)?;
    Some(FieldPlan::inferred(name, value_type, capabilities))
}

fn infer_type(sample: &Value) -> Option<(FieldType, Capabilities)> {
    let numeric = Capabilities::POINT | Capabilities::DOC_VALUES | Capabilities::STORED;
    match sample {
        Value::String(_) => Some((FieldType::Text, Capabilities::INDEXED | Capabilities::STORED)),
        Value::Bool(_) => Some((
            FieldType::String,
            Capabilities::INDEXED | Capabilities::STORED,
        )),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i32::try_from(i).is_ok() {
                    Some((FieldType::Integer, numeric))
                } else {
                    Some((FieldType::Long, numeric))
                }
            } else {
                // u64 above i64::MAX, or a float
                Some((FieldType::Double, numeric))
            }
        }
        Value::Array(items) => items.iter().find(|v| !v.is_null()).and_then(infer_type),
        Value::Null | Value::Object(_) => None,
    }
}
