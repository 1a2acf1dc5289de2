//! Mempool Feed — Calldata Decoder
//!
//! Purpose:
//!     Decode the input data of an observed transaction against the target
//!     contract's schema, for diagnostic logging only. Submission never
//!     depends on a successful decode.
//!
//! Dependencies:
//!     - alloy json-abi (JsonAbi schema), dyn-abi (runtime decoding)

use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::hex;
use alloy::json_abi::JsonAbi;
use tracing::trace;

/// Decoded call — function signature plus named, formatted arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCall {
    /// e.g. "transfer(address,uint256)"
    pub signature: String,
    /// (parameter name, formatted value); unnamed params get "argN"
    pub args: Vec<(String, String)>,
}

impl DecodedCall {
    /// One-line rendering for logs
    pub fn summary(&self) -> String {
        let args = self
            .args
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} [{}]", self.signature, args)
    }
}

/// Decode calldata using the contract schema.
/// Returns None if the selector is not in the schema or decoding fails.
pub fn decode_with_schema(abi: &JsonAbi, input: &[u8]) -> Option<DecodedCall> {
    if input.len() < 4 {
        return None;
    }

    let selector = &input[..4];
    let function = abi.functions().find(|f| f.selector().as_slice() == selector)?;

    let values = match function.abi_decode_input(&input[4..]) {
        Ok(values) => values,
        Err(e) => {
            trace!("Decode failed for {}: {}", function.signature(), e);
            return None;
        }
    };

    let args = function
        .inputs
        .iter()
        .zip(values.iter())
        .enumerate()
        .map(|(i, (param, value))| {
            let name = if param.name.is_empty() { format!("arg{}", i) } else { param.name.clone() };
            (name, format_value(value))
        })
        .collect();

    Some(DecodedCall { signature: function.signature(), args })
}

/// Return the 4-byte selector as a hex string for logging
pub fn selector_hex(input: &[u8]) -> String {
    if input.len() < 4 {
        return "0x????".to_string();
    }
    format!("0x{:02x}{:02x}{:02x}{:02x}", input[0], input[1], input[2], input[3])
}

fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(a) => format!("{:?}", a),
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Uint(v, _) => v.to_string(),
        DynSolValue::Int(v, _) => v.to_string(),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        DynSolValue::Bytes(bytes) => hex::encode_prefixed(bytes),
        DynSolValue::String(s) => format!("{:?}", s),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            format!("[{}]", items.iter().map(format_value).collect::<Vec<_>>().join(", "))
        }
        DynSolValue::Tuple(items) => {
            format!("({})", items.iter().map(format_value).collect::<Vec<_>>().join(", "))
        }
        other => format!("{:?}", other),
    }
}
