//! Core types shared by the classifier, the route table and the dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Workspace (team) identifier as issued by Slack, e.g. `T0123ABCD`.
pub type TeamId = String;

/// The three callback endpoints Slack delivers to.
///
/// Which family applies is decided by the HTTP path that matched, never by
/// the body itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackFamily {
    /// Slash commands, URL-encoded form body.
    Commands,
    /// Interactive components, URL-encoded form with a JSON `payload` field.
    Interactions,
    /// Events API subscriptions, JSON body.
    Events,
}

impl CallbackFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackFamily::Commands => "commands",
            CallbackFamily::Interactions => "interactions",
            CallbackFamily::Events => "events",
        }
    }
}

impl fmt::Display for CallbackFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects one of the six independent handler tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteFamily {
    /// Keyed by command name, e.g. `/deploy`.
    Command,
    /// Keyed by shortcut `callback_id`.
    Shortcut,
    /// Keyed by the first action's `action_id`.
    BlockAction,
    /// Keyed by `view.callback_id`.
    ViewSubmission,
    /// Keyed by `view.callback_id`.
    ViewClose,
    /// Keyed by `event.type`.
    Event,
}

impl RouteFamily {
    pub const ALL: [RouteFamily; 6] = [
        RouteFamily::Command,
        RouteFamily::Shortcut,
        RouteFamily::BlockAction,
        RouteFamily::ViewSubmission,
        RouteFamily::ViewClose,
        RouteFamily::Event,
    ];

    /// Human-readable name of the discriminator, used in error messages.
    pub fn discriminator_kind(&self) -> &'static str {
        match self {
            RouteFamily::Command => "command",
            RouteFamily::Shortcut => "shortcut",
            RouteFamily::BlockAction => "action",
            RouteFamily::ViewSubmission => "view submission",
            RouteFamily::ViewClose => "view close",
            RouteFamily::Event => "event",
        }
    }
}

impl fmt::Display for RouteFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.discriminator_kind())
    }
}

/// Result of classifying an inbound payload.
///
/// Every variant except [`ClassifiedEvent::UrlVerificationChallenge`] carries
/// the workspace used for credential lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    Command { name: String, team_id: TeamId },
    Shortcut { callback_id: String, team_id: TeamId },
    BlockAction { action_id: String, team_id: TeamId },
    ViewSubmission { callback_id: String, team_id: TeamId },
    ViewClose { callback_id: String, team_id: TeamId },
    PlatformEvent { event_type: String, team_id: TeamId },
    /// Events API endpoint handshake; answered by echoing the body.
    UrlVerificationChallenge { raw_body: bytes::Bytes },
}

impl ClassifiedEvent {
    /// Workspace this event belongs to, `None` for the verification challenge.
    pub fn team_id(&self) -> Option<&str> {
        match self {
            ClassifiedEvent::Command { team_id, .. }
            | ClassifiedEvent::Shortcut { team_id, .. }
            | ClassifiedEvent::BlockAction { team_id, .. }
            | ClassifiedEvent::ViewSubmission { team_id, .. }
            | ClassifiedEvent::ViewClose { team_id, .. }
            | ClassifiedEvent::PlatformEvent { team_id, .. } => Some(team_id),
            ClassifiedEvent::UrlVerificationChallenge { .. } => None,
        }
    }

    /// Route table and key this event dispatches on.
    pub fn route(&self) -> Option<(RouteFamily, &str)> {
        match self {
            ClassifiedEvent::Command { name, .. } => Some((RouteFamily::Command, name)),
            ClassifiedEvent::Shortcut { callback_id, .. } => {
                Some((RouteFamily::Shortcut, callback_id))
            }
            ClassifiedEvent::BlockAction { action_id, .. } => {
                Some((RouteFamily::BlockAction, action_id))
            }
            ClassifiedEvent::ViewSubmission { callback_id, .. } => {
                Some((RouteFamily::ViewSubmission, callback_id))
            }
            ClassifiedEvent::ViewClose { callback_id, .. } => {
                Some((RouteFamily::ViewClose, callback_id))
            }
            ClassifiedEvent::PlatformEvent { event_type, .. } => {
                Some((RouteFamily::Event, event_type))
            }
            ClassifiedEvent::UrlVerificationChallenge { .. } => None,
        }
    }
}
