//! The Bayeux message.
//!
//! All protocol fields are optional so the same type carries requests,
//! replies and application messages. Unknown top-level properties are kept in
//! [`Message::extra`] and written back unchanged.

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};
use tracing::warn;

use crate::advice::Advice;
use crate::channel;

/// A single Bayeux message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Destination or source channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Message id, unique per session. Numeric ids from the server are
    /// read as their decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "string_or_number")]
    pub id: Option<String>,
    /// Server-assigned client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Application payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Extension fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<Map<String, Value>>,
    /// Server reconnection advice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    /// Outcome of a meta request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    /// Channel-less acknowledgement flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Channel named by a subscribe/unsubscribe request or reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    /// Server error string, e.g. `403::denied`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_connection_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    /// Send time, set by the timestamp extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Any other top-level properties.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// An empty message on `channel`.
    pub fn on(channel: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            ..Self::default()
        }
    }

    /// A message built from a JSON object of properties, then pointed at
    /// `channel`.
    ///
    /// Used for handshake props and publish extra props, which callers pass
    /// as loose JSON. Unknown keys are kept in [`Message::extra`]. A key
    /// naming a protocol field with a value of the wrong type is logged and
    /// left out; every other property still goes through.
    pub fn from_props(channel: impl Into<String>, props: Option<Map<String, Value>>) -> Self {
        let mut message = props.map(Self::from_loose_props).unwrap_or_default();
        message.channel = Some(channel.into());
        message
    }

    fn from_loose_props(props: Map<String, Value>) -> Self {
        let (fitting, rejected): (Map<String, Value>, Map<String, Value>) =
            props.into_iter().partition(|(key, value)| {
                let single = Map::from_iter([(key.clone(), value.clone())]);
                serde_json::from_value::<Message>(Value::Object(single)).is_ok()
            });
        for key in rejected.keys() {
            warn!(key = %key, "ignoring property with unexpected type");
        }
        match serde_json::from_value(Value::Object(fitting)) {
            Ok(message) => message,
            Err(error) => {
                warn!(error = %error, "ignoring message properties");
                Self::default()
            }
        }
    }

    /// Builder-style data setter.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Builder-style subscription setter.
    #[must_use]
    pub fn with_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = Some(subscription.into());
        self
    }

    /// Builder-style client id setter.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The channel, or `""` when absent.
    pub fn channel_name(&self) -> &str {
        self.channel.as_deref().unwrap_or_default()
    }

    /// Whether this message travels on a meta-channel.
    pub fn is_meta(&self) -> bool {
        self.channel.as_deref().is_some_and(channel::is_meta)
    }

    /// Whether this message is on exactly `name`.
    pub fn is_on(&self, name: &str) -> bool {
        self.channel.as_deref() == Some(name)
    }

    /// `successful`, defaulting to `false`.
    pub fn is_successful(&self) -> bool {
        self.successful.unwrap_or(false)
    }

    /// Mutable access to `ext`, creating it if absent.
    pub fn ext_mut(&mut self) -> &mut Map<String, Value> {
        self.ext.get_or_insert_with(Map::new)
    }

    /// A value from `ext`.
    pub fn ext_value(&self, key: &str) -> Option<&Value> {
        self.ext.as_ref().and_then(|ext| ext.get(key))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "invalid type: {other}, expected a string or number id"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
