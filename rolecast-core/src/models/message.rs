use serde::{Deserialize, Serialize};

/// Event codes carried in [`HubMessage::code`]
pub mod codes {
    /// A user profile was created, updated or deleted
    pub const USER_CHANGED: &str = "0000";
}

/// Envelope delivered to every matching peer, one text frame per message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    /// Event kind
    pub code: String,
    /// Event data
    pub payload: serde_json::Value,
    /// Display name of the actor who triggered the event
    pub user: String,
}

impl HubMessage {
    /// Build an envelope from any serializable payload
    pub fn new<T: Serialize>(
        code: impl Into<String>,
        payload: &T,
        user: impl Into<String>,
    ) -> crate::Result<Self> {
        Ok(Self {
            code: code.into(),
            payload: serde_json::to_value(payload)?,
            user: user.into(),
        })
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Profile, UserId};

    #[test]
    fn test_envelope_round_trip() {
        let profile = Profile {
            id: UserId::from("u1"),
            name: "bob".to_string(),
            email: "bob@example.com".to_string(),
            roles: vec!["user".to_string()],
        };

        let message = HubMessage::new(codes::USER_CHANGED, &profile, "alice").unwrap();
        let wire = message.to_json().unwrap();
        let decoded: HubMessage = serde_json::from_str(&wire).unwrap();

        assert_eq!(decoded, message);
        assert_eq!(decoded.code, "0000");
        assert_eq!(decoded.user, "alice");
        let payload: Profile = serde_json::from_value(decoded.payload).unwrap();
        assert_eq!(payload, profile);
    }

    #[test]
    fn test_wire_shape() {
        let message = HubMessage::new(codes::USER_CHANGED, &"u1", "alice").unwrap();
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"code": "0000", "payload": "u1", "user": "alice"})
        );
    }
}
