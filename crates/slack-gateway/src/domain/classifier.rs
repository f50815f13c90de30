//! Payload classification for the three Slack callback families.
//!
//! Commands arrive as URL-encoded forms, interactions as a form whose
//! `payload` field holds JSON, and Events API callbacks as plain JSON. Only
//! the handful of string fields needed for routing are extracted here; the
//! untyped JSON never leaves this module.

use crate::domain::error::ClassificationError;
use crate::domain::types::{CallbackFamily, ClassifiedEvent};
use bytes::Bytes;
use serde::Deserialize;

/// Events API handshake type
pub const URL_VERIFICATION: &str = "url_verification";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    team: Option<TeamRef>,
    callback_id: Option<String>,
    actions: Option<Vec<ActionRef>>,
    view: Option<ViewRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TeamRef {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ActionRef {
    action_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ViewRef {
    callback_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventCallback {
    #[serde(rename = "type")]
    kind: Option<String>,
    team_id: Option<String>,
    event: Option<InnerEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InnerEvent {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Classify a request body received on the endpoint for `family`.
///
/// # Errors
///
/// Returns a [`ClassificationError`] naming the field that is missing,
/// malformed or carries an unsupported value.
pub fn classify(family: CallbackFamily, body: &Bytes) -> Result<ClassifiedEvent, ClassificationError> {
    match family {
        CallbackFamily::Commands => classify_command(body),
        CallbackFamily::Interactions => classify_interaction(body),
        CallbackFamily::Events => classify_event(body),
    }
}

/// Whether an Events API body is the `url_verification` handshake.
///
/// Malformed JSON is simply not a handshake; the real parse error surfaces
/// later, after authentication.
pub fn is_url_verification(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .map(|value| value.get("type").and_then(|t| t.as_str()) == Some(URL_VERIFICATION))
        .unwrap_or(false)
}

/// Parse a JSON object into `T`; arrays and scalars are rejected rather than
/// being read positionally.
fn parse_object<T: serde::de::DeserializeOwned>(
    raw: &[u8],
    field: &'static str,
) -> Result<T, ClassificationError> {
    let malformed = |reason: String| ClassificationError::MalformedJson { field, reason };
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("expected a JSON object".into()));
    }
    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

/// First value of a form field; repeated keys keep the earliest value.
fn form_value(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ClassificationError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ClassificationError::MissingField(field))
}

fn classify_command(body: &[u8]) -> Result<ClassifiedEvent, ClassificationError> {
    let name = required(form_value(body, "command"), "command")?;
    let team_id = required(form_value(body, "team_id"), "team_id")?;
    Ok(ClassifiedEvent::Command { name, team_id })
}

fn classify_interaction(body: &[u8]) -> Result<ClassifiedEvent, ClassificationError> {
    let raw = required(form_value(body, "payload"), "payload")?;
    let payload: InteractionPayload = parse_object(raw.as_bytes(), "payload")?;

    let kind = required(payload.kind, "type")?;
    let team_id = required(payload.team.and_then(|t| t.id), "team.id")?;

    match kind.as_str() {
        "shortcut" => Ok(ClassifiedEvent::Shortcut {
            callback_id: required(payload.callback_id, "callback_id")?,
            team_id,
        }),
        "block_actions" => {
            let first = payload
                .actions
                .and_then(|actions| actions.into_iter().next())
                .ok_or(ClassificationError::MissingField("actions"))?;
            Ok(ClassifiedEvent::BlockAction {
                action_id: required(first.action_id, "actions[0].action_id")?,
                team_id,
            })
        }
        "view_submission" => Ok(ClassifiedEvent::ViewSubmission {
            callback_id: required(payload.view.and_then(|v| v.callback_id), "view.callback_id")?,
            team_id,
        }),
        "view_closed" => Ok(ClassifiedEvent::ViewClose {
            callback_id: required(payload.view.and_then(|v| v.callback_id), "view.callback_id")?,
            team_id,
        }),
        _ => Err(ClassificationError::UnrecognizedInteraction(kind)),
    }
}

fn classify_event(body: &Bytes) -> Result<ClassifiedEvent, ClassificationError> {
    let callback: EventCallback = parse_object(body, "body")?;

    if callback.kind.as_deref() == Some(URL_VERIFICATION) {
        return Ok(ClassifiedEvent::UrlVerificationChallenge {
            raw_body: body.clone(),
        });
    }

    let team_id = required(callback.team_id, "team_id")?;
    let event_type = required(callback.event.and_then(|e| e.kind), "event.type")?;
    Ok(ClassifiedEvent::PlatformEvent {
        event_type,
        team_id,
    })
}
