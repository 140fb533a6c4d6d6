//! Protocol messages for push, pull, and poke.

use crate::patch::Patch;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named, argument-carrying state change submitted by a client.
///
/// Mutation ids form a per-client strictly increasing sequence with no
/// gaps; the server rejects an id that skips ahead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Per-client sequence number.
    pub id: u64,
    /// Name of the registered mutator to invoke.
    pub name: String,
    /// Opaque arguments passed to the mutator.
    pub args: Value,
}

impl Mutation {
    /// Creates a new mutation.
    pub fn new(id: u64, name: impl Into<String>, args: Value) -> Self {
        Self {
            id,
            name: name.into(),
            args,
        }
    }
}

/// Push request: an ordered batch of mutations from one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// The submitting client.
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Mutations in ascending id order.
    pub mutations: Vec<Mutation>,
}

impl PushRequest {
    /// Creates a new push request.
    pub fn new(client_id: impl Into<String>, mutations: Vec<Mutation>) -> Self {
        Self {
            client_id: client_id.into(),
            mutations,
        }
    }
}

/// Pull request: "what changed since cookie C".
///
/// A `None` cookie asks for a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// The requesting client.
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// The client's last known cookie, opaque to the client.
    pub cookie: Option<String>,
}

impl PullRequest {
    /// Creates a new pull request.
    pub fn new(client_id: impl Into<String>, cookie: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            cookie,
        }
    }
}

/// Pull response: the delta from the requested cookie to the current head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// The server's current head cookie, `None` for a document with no
    /// committed state yet.
    pub cookie: Option<String>,
    /// The requesting client's own applied mutation count.
    #[serde(rename = "lastMutationID")]
    pub last_mutation_id: u64,
    /// Operations transforming the client's replica into head state.
    pub patch: Patch,
}

/// Poke: an unsolicited server-to-client delta notification.
///
/// Sent over the client's persistent connection after another push commits
/// new state. The embedded response is relative to `base_cookie`, the
/// baseline the server last recorded for this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poke {
    /// The baseline the patch applies on top of.
    #[serde(rename = "baseCookie")]
    pub base_cookie: Option<String>,
    /// The delta, shaped exactly like a pull response.
    pub response: PullResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchOp;
    use serde_json::json;

    #[test]
    fn push_request_wire_format() {
        let body = json!({
            "clientID": "c1",
            "mutations": [
                {"id": 1, "name": "createShape", "args": {"x": 10}},
                {"id": 2, "name": "deleteShape", "args": "s1"},
            ],
        });
        let request: PushRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.client_id, "c1");
        assert_eq!(request.mutations.len(), 2);
        assert_eq!(request.mutations[0], Mutation::new(1, "createShape", json!({"x": 10})));
    }

    #[test]
    fn pull_request_null_cookie() {
        let request: PullRequest =
            serde_json::from_value(json!({"clientID": "c1", "cookie": null})).unwrap();
        assert_eq!(request.cookie, None);
    }

    #[test]
    fn pull_request_wrong_cookie_type_rejected() {
        let result =
            serde_json::from_value::<PullRequest>(json!({"clientID": "c1", "cookie": 42}));
        assert!(result.is_err());
    }

    #[test]
    fn pull_response_wire_format() {
        let response = PullResponse {
            cookie: Some("3".into()),
            last_mutation_id: 7,
            patch: vec![PatchOp::put("k", json!(1))],
        };
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(
            encoded,
            json!({
                "cookie": "3",
                "lastMutationID": 7,
                "patch": [{"op": "put", "key": "k", "value": 1}],
            })
        );
    }

    #[test]
    fn poke_wire_format() {
        let poke = Poke {
            base_cookie: None,
            response: PullResponse {
                cookie: Some("1".into()),
                last_mutation_id: 0,
                patch: vec![PatchOp::Clear],
            },
        };
        let encoded = serde_json::to_value(&poke).unwrap();
        assert_eq!(
            encoded,
            json!({
                "baseCookie": null,
                "response": {
                    "cookie": "1",
                    "lastMutationID": 0,
                    "patch": [{"op": "clear"}],
                },
            })
        );
    }
}
