//! Checks that a pre-signed envelope carries the expected request.
use crate::agent_error::AgentError;
use crate::envelope::{Envelope, EnvelopeContent};
use candid::Principal;

fn mismatch(field: &str, value_arg: String, value_cbor: String) -> AgentError {
    AgentError::CallDataMismatch {
        field: field.to_string(),
        value_arg,
        value_cbor,
    }
}

fn inspect(
    request_type: &'static str,
    sender: Principal,
    canister_id: Principal,
    method_name: &str,
    arg: &[u8],
    ingress_expiry: u64,
    signed: &[u8],
) -> Result<(), AgentError> {
    let envelope = Envelope::decode(signed)?;
    let (ingress_expiry_cbor, sender_cbor, canister_id_cbor, method_name_cbor, arg_cbor) =
        match &envelope.content {
            EnvelopeContent::Query {
                ingress_expiry,
                sender,
                canister_id,
                method_name,
                arg,
                ..
            } if request_type == "query" => (ingress_expiry, sender, canister_id, method_name, arg),
            EnvelopeContent::Call {
                ingress_expiry,
                sender,
                canister_id,
                method_name,
                arg,
                ..
            } if request_type == "call" => (ingress_expiry, sender, canister_id, method_name, arg),
            other => {
                return Err(mismatch(
                    "request_type",
                    request_type.to_string(),
                    other.request_type().to_string(),
                ))
            }
        };
    if ingress_expiry != *ingress_expiry_cbor {
        return Err(mismatch(
            "ingress_expiry",
            ingress_expiry.to_string(),
            ingress_expiry_cbor.to_string(),
        ));
    }
    if sender != *sender_cbor {
        return Err(mismatch("sender", sender.to_text(), sender_cbor.to_text()));
    }
    if canister_id != *canister_id_cbor {
        return Err(mismatch(
            "canister_id",
            canister_id.to_text(),
            canister_id_cbor.to_text(),
        ));
    }
    if method_name != method_name_cbor.as_str() {
        return Err(mismatch(
            "method_name",
            method_name.to_string(),
            method_name_cbor.clone(),
        ));
    }
    if arg != arg_cbor.as_slice() {
        return Err(mismatch("arg", hex::encode(arg), hex::encode(arg_cbor)));
    }
    Ok(())
}

/// Succeeds only if `signed_query` decodes to a query with exactly the
/// given fields.
pub fn signed_query_inspect(
    sender: Principal,
    canister_id: Principal,
    method_name: &str,
    arg: &[u8],
    ingress_expiry: u64,
    signed_query: &[u8],
) -> Result<(), AgentError> {
    inspect(
        "query",
        sender,
        canister_id,
        method_name,
        arg,
        ingress_expiry,
        signed_query,
    )
}

/// Succeeds only if `signed_update` decodes to an update call with exactly
/// the given fields.
pub fn signed_update_inspect(
    sender: Principal,
    canister_id: Principal,
    method_name: &str,
    arg: &[u8],
    ingress_expiry: u64,
    signed_update: &[u8],
) -> Result<(), AgentError> {
    inspect(
        "call",
        sender,
        canister_id,
        method_name,
        arg,
        ingress_expiry,
        signed_update,
    )
}
