//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Value};

use stockroom_core::{NewOperation, OperationType};

/// Generate a known operation type.
pub fn known_op_type() -> impl Strategy<Value = OperationType> {
    prop::sample::select(OperationType::KNOWN.to_vec())
}

/// Generate any operation type, occasionally one the executor cannot
/// dispatch.
pub fn op_type() -> impl Strategy<Value = OperationType> {
    prop_oneof![
        9 => known_op_type(),
        1 => "[A-Z]{3,8}"
            .prop_filter("must not collide with a known type", |s| {
                !OperationType::from(s.as_str()).is_known()
            })
            .prop_map(OperationType::Unknown),
    ]
}

/// Generate a relative API endpoint.
pub fn endpoint() -> impl Strategy<Value = String> {
    ("(products|laundry|minibar|rooms)", 1u32..10_000)
        .prop_map(|(resource, id)| format!("/api/{}/{}", resource, id))
}

/// Generate an object payload.
pub fn payload() -> impl Strategy<Value = Value> {
    (
        "[a-z ]{0,24}",
        -1_000i64..1_000,
        any::<bool>(),
    )
        .prop_map(|(name, quantity, urgent)| json!({"name": name, "quantity": quantity, "urgent": urgent}))
}

/// Generate a valid submission.
pub fn new_operation() -> impl Strategy<Value = NewOperation> {
    (
        op_type(),
        endpoint(),
        prop::option::of(payload()),
        prop::option::of("h-[0-9]{1,4}"),
    )
        .prop_map(|(op_type, endpoint, data, hotel_id)| {
            let mut op = NewOperation::new(op_type, endpoint);
            op.data = data;
            op.hotel_id = hotel_id;
            op
        })
}

/// Generate a valid submission of a known type.
pub fn known_operation() -> impl Strategy<Value = NewOperation> {
    (known_op_type(), endpoint(), prop::option::of(payload())).prop_map(
        |(op_type, endpoint, data)| {
            let mut op = NewOperation::new(op_type, endpoint);
            op.data = data;
            op
        },
    )
}
