//! Inbox notifications
//!
//! Every inbox payload is a JSON [`MessageBody`] sealed to the recipient's
//! public key.

use crate::{mailbox::InboxMessage, sharing::Invitation, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use fula_crypto::{hpke, KekKeyPair, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    #[serde(rename = "INVITATION")]
    Invitation,
    #[serde(rename = "USAGEALERT")]
    UsageAlert,
    #[serde(rename = "INVITATION_REPLY")]
    InvitationReply,
    #[serde(rename = "REVOKED_INVITATION")]
    RevokedInvitation,
}

impl NotificationType {
    fn carries_invitation(&self) -> bool {
        !matches!(self, Self::UsageAlert)
    }
}

/// Decrypted inbox payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub body: serde_json::Value,
}

impl MessageBody {
    /// Payload carrying an invitation
    pub fn invitation(kind: NotificationType, invitation: &Invitation) -> Result<Self> {
        Ok(Self {
            kind,
            body: serde_json::to_value(invitation)?,
        })
    }

    /// Seal for `recipient`
    pub fn seal(&self, recipient: &PublicKey) -> Result<Bytes> {
        let json = serde_json::to_vec(self)?;
        Ok(Bytes::from(hpke::seal(recipient, &json)?))
    }

    /// Open a payload sealed to `identity`
    pub fn open(identity: &KekKeyPair, sealed: &[u8]) -> Result<Self> {
        let json = hpke::open(identity.secret_key(), sealed)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// An opened inbox message
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub from: PublicKey,
    pub to: PublicKey,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// The sealed payload as delivered, base64-encoded
    pub body: String,
    pub decrypted_body: MessageBody,
    pub created_at: DateTime<Utc>,
    /// Set when the message is older than the last-seen watermark
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_object: Option<Invitation>,
}

impl Notification {
    /// Open `message`; `last_seen_ms` is the watermark in milliseconds
    pub fn open(identity: &KekKeyPair, message: &InboxMessage, last_seen_ms: i64) -> Result<Self> {
        let body = MessageBody::open(identity, &message.body)?;
        let related_object = if body.kind.carries_invitation() {
            serde_json::from_value(body.body.clone()).ok()
        } else {
            None
        };
        let read_at = if message.created_at.timestamp_millis() <= last_seen_ms {
            Utc.timestamp_millis_opt(last_seen_ms).single()
        } else {
            None
        };
        Ok(Self {
            id: message.id.clone(),
            from: message.from,
            to: message.to,
            kind: body.kind,
            body: STANDARD.encode(&message.body),
            decrypted_body: body,
            created_at: message.created_at,
            read_at,
            related_object,
        })
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Open every message we can, skipping the rest
pub fn open_all(
    identity: &KekKeyPair,
    messages: &[InboxMessage],
    last_seen_ms: i64,
) -> Vec<Notification> {
    messages
        .iter()
        .filter_map(|message| match Notification::open(identity, message, last_seen_ms) {
            Ok(notification) => Some(notification),
            Err(e) => {
                warn!(id = %message.id, error = %e, "skipping unreadable message");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharing::{FullPath, InvitationStatus};
    use chrono::Duration;

    fn message(from: &KekKeyPair, to: &KekKeyPair, body: &MessageBody) -> InboxMessage {
        InboxMessage {
            id: uuid::Uuid::new_v4().to_string(),
            from: *from.public_key(),
            to: *to.public_key(),
            body: body.seal(to.public_key()).unwrap(),
            created_at: Utc::now(),
        }
    }

    fn invitation() -> Invitation {
        Invitation {
            inviter_public_key: "a".to_string(),
            invitee_public_key: "b".to_string(),
            invitation_id: "inv".to_string(),
            status: InvitationStatus::Pending,
            item_paths: vec![FullPath::new("docs", "/a.txt")],
            keys: vec!["k".to_string()],
        }
    }

    #[test]
    fn test_type_names() {
        let json = serde_json::to_value(NotificationType::UsageAlert).unwrap();
        assert_eq!(json, "USAGEALERT");
        let json = serde_json::to_value(NotificationType::InvitationReply).unwrap();
        assert_eq!(json, "INVITATION_REPLY");
    }

    #[test]
    fn test_open_parses_related_invitation() {
        let alice = KekKeyPair::generate();
        let bob = KekKeyPair::generate();
        let body = MessageBody::invitation(NotificationType::Invitation, &invitation()).unwrap();
        let msg = message(&alice, &bob, &body);

        let notification = Notification::open(&bob, &msg, 0).unwrap();
        assert_eq!(notification.kind, NotificationType::Invitation);
        assert_eq!(
            notification.related_object.as_ref().unwrap().invitation_id,
            "inv"
        );
        assert!(!notification.is_read());
    }

    #[test]
    fn test_open_keeps_sealed_body() {
        let alice = KekKeyPair::generate();
        let bob = KekKeyPair::generate();
        let body = MessageBody::invitation(NotificationType::Invitation, &invitation()).unwrap();
        let msg = message(&alice, &bob, &body);

        let notification = Notification::open(&bob, &msg, 0).unwrap();
        assert_eq!(STANDARD.decode(&notification.body).unwrap(), msg.body.to_vec());
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["body"], notification.body.as_str());
        assert_eq!(json["decryptedBody"]["type"], "INVITATION");
    }

    #[test]
    fn test_read_at_follows_watermark() {
        let alice = KekKeyPair::generate();
        let bob = KekKeyPair::generate();
        let body = MessageBody::invitation(NotificationType::Invitation, &invitation()).unwrap();
        let msg = message(&alice, &bob, &body);

        let later = (msg.created_at + Duration::seconds(1)).timestamp_millis();
        assert!(Notification::open(&bob, &msg, later).unwrap().is_read());
        let earlier = (msg.created_at - Duration::seconds(1)).timestamp_millis();
        assert!(!Notification::open(&bob, &msg, earlier).unwrap().is_read());
    }

    #[test]
    fn test_open_all_skips_foreign_messages() {
        let alice = KekKeyPair::generate();
        let bob = KekKeyPair::generate();
        let carol = KekKeyPair::generate();
        let body = MessageBody {
            kind: NotificationType::UsageAlert,
            body: serde_json::json!({"usage": 90}),
        };
        let ours = message(&alice, &bob, &body);
        let theirs = message(&alice, &carol, &body);

        let opened = open_all(&bob, &[ours.clone(), theirs], 0);
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].id, ours.id);
        assert!(opened[0].related_object.is_none());
    }

    #[test]
    fn test_foreign_message_is_decryption_failure() {
        let alice = KekKeyPair::generate();
        let bob = KekKeyPair::generate();
        let carol = KekKeyPair::generate();
        let body = MessageBody::invitation(NotificationType::Invitation, &invitation()).unwrap();
        let msg = message(&alice, &carol, &body);
        let err = Notification::open(&bob, &msg, 0).unwrap_err();
        assert!(err.is_decryption_failure());
    }
}
