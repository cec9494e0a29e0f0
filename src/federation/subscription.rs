//! PubSubHubbub subscription handshake, subscriber side.
//!
//! 1. [`subscribe_form`] builds the request sent to the hub.
//! 2. The hub calls back to confirm intent; [`verify_intent`] decides whether
//!    to echo the challenge.

use subtle::ConstantTimeEq;

/// `hub.mode` values a hub may verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionMode::Subscribe => "subscribe",
            SubscriptionMode::Unsubscribe => "unsubscribe",
        }
    }

    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "subscribe" => Some(SubscriptionMode::Subscribe),
            "unsubscribe" => Some(SubscriptionMode::Unsubscribe),
            _ => None,
        }
    }
}

/// The hub's verification-of-intent callback parameters.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub mode: String,
    pub topic: String,
    pub challenge: String,
    pub verify_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Respond 2xx with this body
    Confirmed(String),
    /// Respond 404
    Denied,
}

/// Form fields for a `hub.mode=subscribe` request.
pub fn subscribe_form<'a>(
    callback: &'a str,
    topic: &'a str,
    verify_token: &'a str,
    secret: &'a str,
) -> [(&'static str, &'a str); 6] {
    [
        ("hub.mode", SubscriptionMode::Subscribe.as_str()),
        ("hub.callback", callback),
        ("hub.topic", topic),
        ("hub.verify", "async"),
        ("hub.verify_token", verify_token),
        ("hub.secret", secret),
    ]
}

/// Confirms only a known mode, for our topic, carrying our token.
pub fn verify_intent(request: &IntentRequest, topic: &str, verify_token: &str) -> IntentOutcome {
    if SubscriptionMode::parse(&request.mode).is_none() {
        return IntentOutcome::Denied;
    }
    if request.topic != topic {
        return IntentOutcome::Denied;
    }
    let token_ok: bool = request
        .verify_token
        .as_bytes()
        .ct_eq(verify_token.as_bytes())
        .into();
    if !token_ok || verify_token.is_empty() {
        return IntentOutcome::Denied;
    }
    IntentOutcome::Confirmed(request.challenge.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "https://remote.example/alice.atom";

    fn request(mode: &str, topic: &str, token: &str) -> IntentRequest {
        IntentRequest {
            mode: mode.to_string(),
            topic: topic.to_string(),
            challenge: "c4a11e".to_string(),
            verify_token: token.to_string(),
        }
    }

    #[test]
    fn test_confirms_matching_subscribe() {
        let outcome = verify_intent(&request("subscribe", TOPIC, "tok"), TOPIC, "tok");
        assert_eq!(outcome, IntentOutcome::Confirmed("c4a11e".to_string()));
    }

    #[test]
    fn test_confirms_unsubscribe() {
        let outcome = verify_intent(&request("unsubscribe", TOPIC, "tok"), TOPIC, "tok");
        assert!(matches!(outcome, IntentOutcome::Confirmed(_)));
    }

    #[test]
    fn test_denies_wrong_token() {
        let outcome = verify_intent(&request("subscribe", TOPIC, "tok2"), TOPIC, "tok");
        assert_eq!(outcome, IntentOutcome::Denied);
    }

    #[test]
    fn test_denies_wrong_topic() {
        let outcome = verify_intent(
            &request("subscribe", "https://other.example/feed", "tok"),
            TOPIC,
            "tok",
        );
        assert_eq!(outcome, IntentOutcome::Denied);
    }

    #[test]
    fn test_denies_unknown_mode() {
        assert_eq!(
            verify_intent(&request("denied", TOPIC, "tok"), TOPIC, "tok"),
            IntentOutcome::Denied
        );
        assert_eq!(
            verify_intent(&request("Subscribe", TOPIC, "tok"), TOPIC, "tok"),
            IntentOutcome::Denied
        );
    }

    #[test]
    fn test_denies_empty_token() {
        assert_eq!(
            verify_intent(&request("subscribe", TOPIC, ""), TOPIC, ""),
            IntentOutcome::Denied
        );
    }

    #[test]
    fn test_subscribe_form_fields() {
        let form = subscribe_form("https://me.example/push/1", TOPIC, "vt", "s3");
        assert_eq!(form[0], ("hub.mode", "subscribe"));
        assert_eq!(form[3], ("hub.verify", "async"));
        assert_eq!(form[5], ("hub.secret", "s3"));
    }
}
