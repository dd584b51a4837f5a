//! Prometheus metrics exposed on `/metrics`

use actix_web::{HttpResponse, Responder};
use async_graphql::parser::{
    parse_query,
    types::{DocumentOperations, OperationType},
};
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use tracing::error;

lazy_static! {
    /// GraphQL requests by operation type (query/mutation/subscription/invalid)
    static ref GRAPHQL_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "graphql_requests_total",
        "Total GraphQL requests by operation type",
        &["operation_type"]
    )
    .expect("Failed to register graphql_requests_total");

    /// Outbound reminder emails by kind and outcome
    static ref REMINDER_EMAILS: IntCounterVec = register_int_counter_vec!(
        "reminder_emails_total",
        "Reminder emails by kind and outcome",
        &["kind", "outcome"]
    )
    .expect("Failed to register reminder_emails_total");
}

pub fn record_graphql_request(operation_type: &str) {
    GRAPHQL_REQUESTS
        .with_label_values(&[operation_type])
        .inc();
}

pub fn record_reminder_email(kind: &str, delivered: bool) {
    let outcome = if delivered { "sent" } else { "failed" };
    REMINDER_EMAILS.with_label_values(&[kind, outcome]).inc();
}

/// Classify the operation a request will run
///
/// Documents that fail to parse, or name an operation they lack, are `invalid`.
pub fn operation_type(query: &str, operation_name: Option<&str>) -> &'static str {
    let Ok(document) = parse_query(query) else {
        return "invalid";
    };

    let operation = match (&document.operations, operation_name) {
        (DocumentOperations::Single(op), _) => Some(op),
        (DocumentOperations::Multiple(ops), Some(name)) => ops.get(name),
        (DocumentOperations::Multiple(ops), None) if ops.len() == 1 => ops.values().next(),
        (DocumentOperations::Multiple(_), None) => None,
    };

    match operation.map(|op| op.node.ty) {
        Some(OperationType::Query) => "query",
        Some(OperationType::Mutation) => "mutation",
        Some(OperationType::Subscription) => "subscription",
        None => "invalid",
    }
}

/// Render every registered metric in the Prometheus text format
pub async fn metrics_handler() -> impl Responder {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
