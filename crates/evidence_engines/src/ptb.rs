#![forbid(unsafe_code)]

//! Programmable transaction encoding for a single Move call.
//!
//! Layout follows `TransactionKind::ProgrammableTransaction`: every argument
//! becomes one input (`CallArg::Pure` or a shared `CallArg::Object`) and the
//! only command is a `MoveCall` that references the inputs in order.

use evidence_contracts::ledger::SharedObjectRef;
use evidence_contracts::payload::{CallArg, Entrypoint, MoveTarget, ParamType, Payload};

use crate::bcs::{decode_pure, encode_pure, BcsError, BcsReader, BcsWriter};

const TX_KIND_PROGRAMMABLE: u8 = 0;
const CALL_ARG_PURE: u8 = 0;
const CALL_ARG_OBJECT: u8 = 1;
const OBJECT_ARG_SHARED: u8 = 1;
const COMMAND_MOVE_CALL: u8 = 0;
const ARGUMENT_INPUT: u8 = 1;

/// Serializes the call portion of `payload`. Gas, sender and expiration are
/// attached by the signer when it wraps these bytes into transaction data.
pub fn encode_transaction_kind(payload: &Payload) -> Vec<u8> {
    let mut w = BcsWriter::new();
    w.write_u8(TX_KIND_PROGRAMMABLE);

    w.write_uleb128(payload.arguments.len() as u64);
    for arg in &payload.arguments {
        match arg {
            CallArg::Pure(p) => {
                w.write_u8(CALL_ARG_PURE);
                w.write_bytes(&encode_pure(p));
            }
            CallArg::SharedObject(obj) => {
                w.write_u8(CALL_ARG_OBJECT);
                w.write_u8(OBJECT_ARG_SHARED);
                w.write_fixed(obj.object_id.as_bytes());
                w.write_u64(obj.initial_shared_version);
                w.write_bool(obj.mutable);
            }
        }
    }

    w.write_uleb128(1);
    w.write_u8(COMMAND_MOVE_CALL);
    w.write_fixed(payload.target.package.as_bytes());
    w.write_str(&payload.target.module);
    w.write_str(&payload.target.function);
    // no type arguments
    w.write_uleb128(0);
    w.write_uleb128(payload.arguments.len() as u64);
    for i in 0..payload.arguments.len() {
        w.write_u8(ARGUMENT_INPUT);
        w.write_u16(i as u16);
    }
    w.into_bytes()
}

enum RawInput {
    Pure(Vec<u8>),
    Shared(SharedObjectRef),
}

/// Parses bytes produced by [`encode_transaction_kind`] back into a payload
/// (without gas budget). Only single-call transactions that bind every input
/// in order to a known entrypoint are accepted.
pub fn decode_transaction_kind(bytes: &[u8]) -> Result<Payload, BcsError> {
    let mut r = BcsReader::new(bytes);
    let kind = r.read_u8()?;
    if kind != TX_KIND_PROGRAMMABLE {
        return Err(BcsError::UnknownVariant {
            what: "transaction kind",
            tag: u64::from(kind),
        });
    }

    let input_count = r.read_len()?;
    let mut inputs = Vec::with_capacity(input_count.min(64));
    for _ in 0..input_count {
        match r.read_u8()? {
            CALL_ARG_PURE => inputs.push(RawInput::Pure(r.read_bytes()?)),
            CALL_ARG_OBJECT => {
                let obj_kind = r.read_u8()?;
                if obj_kind != OBJECT_ARG_SHARED {
                    return Err(BcsError::Unsupported("owned object input"));
                }
                inputs.push(RawInput::Shared(SharedObjectRef {
                    object_id: r.read_object_id()?,
                    initial_shared_version: r.read_u64()?,
                    mutable: r.read_bool()?,
                }));
            }
            tag => {
                return Err(BcsError::UnknownVariant {
                    what: "call arg",
                    tag: u64::from(tag),
                })
            }
        }
    }

    if r.read_len()? != 1 {
        return Err(BcsError::Unsupported("command count other than one"));
    }
    let cmd = r.read_u8()?;
    if cmd != COMMAND_MOVE_CALL {
        return Err(BcsError::UnknownVariant {
            what: "command",
            tag: u64::from(cmd),
        });
    }
    let package = r.read_object_id()?;
    let module = r.read_string()?;
    let function = r.read_string()?;
    if r.read_len()? != 0 {
        return Err(BcsError::Unsupported("type arguments"));
    }
    let arg_count = r.read_len()?;
    if arg_count != inputs.len() {
        return Err(BcsError::Unsupported("arguments not bound one-to-one to inputs"));
    }
    for i in 0..arg_count {
        let tag = r.read_u8()?;
        let index = r.read_u16()?;
        if tag != ARGUMENT_INPUT || usize::from(index) != i {
            return Err(BcsError::Unsupported("arguments not bound one-to-one to inputs"));
        }
    }
    r.finish()?;

    let entrypoint = Entrypoint::from_function_name(&function)
        .ok_or(BcsError::Unsupported("unknown entrypoint"))?;
    let params = entrypoint.params();
    if params.len() != inputs.len() {
        return Err(BcsError::Unsupported("argument count for entrypoint"));
    }
    let mut arguments = Vec::with_capacity(inputs.len());
    for (input, param) in inputs.into_iter().zip(params) {
        let arg = match (input, *param) {
            (RawInput::Shared(obj), ParamType::SystemState { .. }) => CallArg::SharedObject(obj),
            (RawInput::Pure(bytes), param) => CallArg::Pure(decode_pure(&bytes, param)?),
            (RawInput::Shared(_), _) => {
                return Err(BcsError::Unsupported("object bound to a pure parameter"))
            }
        };
        arguments.push(arg);
    }

    Ok(Payload {
        entrypoint,
        target: MoveTarget {
            package,
            module,
            function,
        },
        arguments,
        gas_budget: None,
    })
}
