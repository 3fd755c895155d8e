//! Executor trait and the operation dispatch table.
//!
//! The executor is the only place that turns a queued record into a network
//! request. [`plan`] is pure so the dispatch rules can be checked without a
//! server; [`HttpExecutor`](crate::HttpExecutor) sends what it describes.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use stockroom_core::{OperationType, PendingOperation};

use crate::error::ExecutorError;

/// Replays one queued operation against the remote API.
///
/// Any `Ok` means the server accepted the write and the record can be
/// removed. Any `Err` counts as one failed attempt.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, op: &PendingOperation) -> Result<Value, ExecutorError>;
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, op: &PendingOperation) -> Result<Value, ExecutorError> {
        (**self).execute(op).await
    }
}

/// The request a record turns into.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPlan<'a> {
    pub method: Method,
    pub endpoint: &'a str,
    pub body: Option<&'a Value>,
}

/// Default HTTP method for an operation type.
///
/// `COLLECT` and `WRITE_OFF` are domain actions posted to their endpoint.
pub fn default_method(op_type: &OperationType) -> Result<Method, ExecutorError> {
    match op_type {
        OperationType::Create | OperationType::Collect | OperationType::WriteOff => Ok(Method::POST),
        OperationType::Update => Ok(Method::PUT),
        OperationType::Delete => Ok(Method::DELETE),
        OperationType::Unknown(other) => Err(ExecutorError::UnknownOperationType(other.clone())),
    }
}

/// Work out the request for a record.
///
/// The record's `method` overrides the default verb; the type still decides
/// whether a body is sent, so deletes never carry one.
pub fn plan(op: &PendingOperation) -> Result<RequestPlan<'_>, ExecutorError> {
    let default = default_method(&op.op_type)?;

    let method = match op.method.as_deref() {
        Some(raw) => parse_method(raw)?,
        None => default,
    };

    let body = match op.op_type {
        OperationType::Delete => None,
        _ => op.data.as_ref(),
    };

    Ok(RequestPlan {
        method,
        endpoint: &op.endpoint,
        body,
    })
}

fn parse_method(raw: &str) -> Result<Method, ExecutorError> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(ExecutorError::InvalidMethod(raw.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| ExecutorError::InvalidMethod(raw.to_string()))
}
