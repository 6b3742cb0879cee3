use emberlink_ber::EmberReader;
use serde::Serialize;

use crate::error::Result;
use crate::glow::invocation_result;
use crate::value::Value;

/// Outcome of a function invocation as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationResult {
    pub invocation_id: i32,
    pub success: bool,
    pub result: Vec<Value>,
}

impl InvocationResult {
    /// Read the fields of an `InvocationResult` the reader is positioned on.
    pub(crate) fn read(reader: &mut EmberReader<'_>) -> Result<Self> {
        let mut result = InvocationResult {
            invocation_id: 0,
            success: true,
            result: Vec::new(),
        };

        while reader.read()? {
            match reader.outer_tag()?.context_number() {
                Some(invocation_result::INVOCATION_ID) => {
                    result.invocation_id = reader.read_i32()?;
                }
                Some(invocation_result::SUCCESS) => result.success = reader.read_boolean()?,
                Some(invocation_result::RESULT) if reader.is_container() => {
                    while reader.read()? {
                        result.result.push(Value::read(reader)?);
                    }
                }
                _ => reader.skip()?,
            }
        }
        Ok(result)
    }
}
