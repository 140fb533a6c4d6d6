//! HTTP request boundary.
//!
//! The server core speaks [`ServerError`]; this module is the only place
//! errors are mapped to status codes. The embedding process supplies the
//! actual HTTP listener and connection upgrade machinery and routes bodies
//! through these handlers.

use crate::connection::Connection;
use crate::error::ServerError;
use crate::server::SyncServer;
use relaysync_protocol::{PullRequest, PushRequest};
use relaysync_store::{DocumentId, SnapshotStore};
use std::sync::Arc;
use tracing::error;

/// A framework-agnostic HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// 200 with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    fn client_error(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            body: message.into(),
        }
    }

    fn from_error(err: &ServerError) -> Self {
        let status = if err.is_client_error() { 400 } else { 500 };
        if status == 500 {
            error!(%err, "request failed");
        }
        Self {
            status,
            body: err.to_string(),
        }
    }
}

impl<S: SnapshotStore> SyncServer<S> {
    /// `POST /push`: applies a mutation batch.
    ///
    /// A malformed body is rejected before any state is touched. A gap in
    /// the mutation sequence yields a 500 naming the offending mutation id;
    /// the client resynchronizes and retries.
    pub fn handle_push_request(&self, doc: &DocumentId, body: &str) -> HttpResponse {
        let request: PushRequest = match serde_json::from_str(body) {
            Ok(request) => request,
            Err(err) => return HttpResponse::client_error(format!("invalid push body: {err}")),
        };

        match self.handle_push(doc, &request) {
            Ok(_) => HttpResponse::ok(""),
            Err(err) => HttpResponse::from_error(&err),
        }
    }

    /// `POST /pull`: answers with the delta since the request's cookie.
    ///
    /// The cookie must be a string or null; any other type is rejected
    /// with 400 before any state read.
    pub fn handle_pull_request(&self, doc: &DocumentId, body: &str) -> HttpResponse {
        let raw: serde_json::Value = match serde_json::from_str(body) {
            Ok(raw) => raw,
            Err(err) => return HttpResponse::client_error(format!("invalid pull body: {err}")),
        };
        if let Some(cookie) = raw.get("cookie") {
            if !cookie.is_string() && !cookie.is_null() {
                return HttpResponse::from_error(&ServerError::InvalidCookie(cookie.to_string()));
            }
        }
        let request: PullRequest = match serde_json::from_value(raw) {
            Ok(request) => request,
            Err(err) => return HttpResponse::client_error(format!("invalid pull body: {err}")),
        };

        match self.handle_pull(doc, &request) {
            Ok(response) => match serde_json::to_string(&response) {
                Ok(body) => HttpResponse::ok(body),
                Err(err) => {
                    HttpResponse::from_error(&ServerError::Internal(format!(
                        "failed to encode pull response: {err}"
                    )))
                }
            },
            Err(err) => HttpResponse::from_error(&err),
        }
    }

    /// Real-time channel upgrade.
    ///
    /// The upgrade request's query string must carry `clientID`; the
    /// embedding process performs the actual protocol upgrade and hands the
    /// resulting duplex connection here. On success the connection is
    /// registered and later receives poke messages until closed.
    pub fn handle_upgrade_request(
        &self,
        doc: &DocumentId,
        query: &str,
        connection: Arc<dyn Connection>,
    ) -> HttpResponse {
        let Some(client_id) = query_param(query, "clientID").filter(|id| !id.is_empty()) else {
            return HttpResponse::client_error("missing clientID parameter");
        };

        self.connect(doc.clone(), client_id, connection);
        HttpResponse {
            status: 101,
            body: String::new(),
        }
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| percent_decode(value))
}

/// Decodes `%XX` escapes and `+` so an upgrade's `clientID` matches the
/// decoded id carried in push and pull bodies. A malformed escape is kept
/// literally.
fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => match hex_pair(bytes.get(i + 1).copied(), bytes.get(i + 2).copied()) {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(hi: Option<u8>, lo: Option<u8>) -> Option<u8> {
    let hi = (hi? as char).to_digit(16)?;
    let lo = (lo? as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
