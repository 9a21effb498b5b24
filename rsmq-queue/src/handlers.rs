//! HTTP handlers for rsmq

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use bytes::Bytes;
use rsmq_core::{ErrorCode, RsmqError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::QueueError;
use crate::message::Message;
use crate::rsmq::{QueueSettings, QueueSettingsUpdate, Rsmq};
use crate::storage::Store;

/// Header naming the operation of a request
pub const TARGET_HEADER: &str = "x-rsmq-target";

const TARGET_PREFIX: &str = "Rsmq.";

/// Handle rsmq requests based on the X-Rsmq-Target header
pub async fn handle_request<S: Store + 'static>(
    State(state): State<Arc<Rsmq<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = headers
        .get(TARGET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let operation = target.strip_prefix(TARGET_PREFIX).unwrap_or(target);

    info!(target = %target, "rsmq request");

    match operation {
        "CreateQueue" => handle_create_queue(state, body).await,
        "DeleteQueue" => handle_delete_queue(state, body).await,
        "ListQueues" => handle_list_queues(state).await,
        "GetQueueAttributes" => handle_get_queue_attributes(state, body).await,
        "SetQueueAttributes" => handle_set_queue_attributes(state, body).await,
        "SendMessage" => handle_send_message(state, body).await,
        "ReceiveMessage" => handle_receive_message(state, body).await,
        "PopMessage" => handle_pop_message(state, body).await,
        "ChangeMessageVisibility" => handle_change_message_visibility(state, body).await,
        "DeleteMessage" => handle_delete_message(state, body).await,
        _ => {
            warn!(target = %target, "Unknown rsmq operation");
            error_response(&RsmqError::new(
                ErrorCode::UnknownOperation,
                format!("Unknown operation: {}", target),
            ))
        }
    }
}

// === Request bodies ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueNameRequest {
    queue_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueueSettingsRequest {
    queue_name: Option<String>,
    vt: Option<u64>,
    delay: Option<u64>,
    max_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageRequest {
    queue_name: Option<String>,
    message: Option<String>,
    delay: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageRequest {
    queue_name: Option<String>,
    vt: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MessageRequest {
    queue_name: Option<String>,
    id: Option<String>,
    vt: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MessageBody {
    id: String,
    message: String,
    rc: u64,
    fr: u64,
    sent: u64,
}

impl From<Message> for MessageBody {
    fn from(message: Message) -> Self {
        Self {
            message: message.body_lossy(),
            id: message.id,
            rc: message.rc,
            fr: message.fr,
            sent: message.sent,
        }
    }
}

/// Decode a request body. A value of the wrong type or out of range is an
/// invalid argument; a body that is not JSON at all is rejected outright.
fn parse<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    let body: &[u8] = if body.is_empty() { b"{}" } else { &body[..] };
    serde_json::from_slice(body).map_err(|e| {
        let code = if e.is_data() {
            ErrorCode::InvalidArgument
        } else {
            ErrorCode::MissingParameter
        };
        error_response(&RsmqError::new(code, format!("Invalid request body: {}", e)))
    })
}

fn missing(name: &str) -> Response {
    error_response(&RsmqError::new(
        ErrorCode::MissingParameter,
        format!("{} is required", name),
    ))
}

// === Handlers ===

async fn handle_create_queue<S: Store + 'static>(state: Arc<Rsmq<S>>, body: Bytes) -> Response {
    let req: QueueSettingsRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };

    let defaults = QueueSettings::default();
    let settings = QueueSettings {
        vt: req.vt.unwrap_or(defaults.vt),
        delay: req.delay.unwrap_or(defaults.delay),
        max_size: req.max_size.unwrap_or(defaults.max_size),
    };

    match state.create_queue(&queue_name, settings).await {
        Ok(()) => json_response(StatusCode::OK, &json!({ "QueueName": queue_name })),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_delete_queue<S: Store + 'static>(state: Arc<Rsmq<S>>, body: Bytes) -> Response {
    let req: QueueNameRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };

    match state.delete_queue(&queue_name).await {
        Ok(()) => json_response(StatusCode::OK, &json!({})),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_list_queues<S: Store + 'static>(state: Arc<Rsmq<S>>) -> Response {
    match state.list_queues().await {
        Ok(queues) => json_response(StatusCode::OK, &json!({ "Queues": queues })),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_get_queue_attributes<S: Store + 'static>(
    state: Arc<Rsmq<S>>,
    body: Bytes,
) -> Response {
    let req: QueueNameRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };

    match state.get_queue_attributes(&queue_name).await {
        Ok(attributes) => json_response(StatusCode::OK, &attributes),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_set_queue_attributes<S: Store + 'static>(
    state: Arc<Rsmq<S>>,
    body: Bytes,
) -> Response {
    let req: QueueSettingsRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };

    let update = QueueSettingsUpdate {
        vt: req.vt,
        delay: req.delay,
        max_size: req.max_size,
    };

    match state.set_queue_attributes(&queue_name, update).await {
        Ok(attributes) => json_response(StatusCode::OK, &attributes),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_send_message<S: Store + 'static>(state: Arc<Rsmq<S>>, body: Bytes) -> Response {
    let req: SendMessageRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };
    let Some(message) = req.message else {
        return missing("Message");
    };

    match state
        .send_message(&queue_name, Bytes::from(message), req.delay)
        .await
    {
        Ok(id) => json_response(StatusCode::OK, &json!({ "Id": id })),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_receive_message<S: Store + 'static>(
    state: Arc<Rsmq<S>>,
    body: Bytes,
) -> Response {
    let req: ReceiveMessageRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };

    match state.receive_message(&queue_name, req.vt).await {
        Ok(message) => message_response(message),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_pop_message<S: Store + 'static>(state: Arc<Rsmq<S>>, body: Bytes) -> Response {
    let req: QueueNameRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };

    match state.pop_message(&queue_name).await {
        Ok(message) => message_response(message),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_change_message_visibility<S: Store + 'static>(
    state: Arc<Rsmq<S>>,
    body: Bytes,
) -> Response {
    let req: MessageRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };
    let Some(id) = req.id else {
        return missing("Id");
    };
    let Some(vt) = req.vt else {
        return missing("Vt");
    };

    match state.change_message_visibility(&queue_name, &id, vt).await {
        Ok(()) => json_response(StatusCode::OK, &json!({})),
        Err(e) => queue_error_response(&e),
    }
}

async fn handle_delete_message<S: Store + 'static>(state: Arc<Rsmq<S>>, body: Bytes) -> Response {
    let req: MessageRequest = match parse(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let Some(queue_name) = req.queue_name else {
        return missing("QueueName");
    };
    let Some(id) = req.id else {
        return missing("Id");
    };

    match state.delete_message(&queue_name, &id).await {
        Ok(()) => json_response(StatusCode::OK, &json!({})),
        Err(e) => queue_error_response(&e),
    }
}

// === JSON Helpers ===

fn message_response(message: Option<Message>) -> Response {
    json_response(
        StatusCode::OK,
        &json!({ "Message": message.map(MessageBody::from) }),
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let body = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

fn queue_error_response(error: &QueueError) -> Response {
    if let QueueError::Store(e) = error {
        warn!(error = %e, "Store failure");
    }
    error_response(&RsmqError::from(error))
}

fn error_response(error: &RsmqError) -> Response {
    let status =
        StatusCode::from_u16(error.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(error.to_json()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
