//! Request and response messages exchanged on the wire.
//!
//! A [`Request`] carries a request-type tag and an opaque [`Payload`]. The
//! payload stays as unparsed JSON text until the handler for that request type
//! decodes it into a concrete type. Every request is answered with a uniform
//! [`Response`] envelope.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, value::RawValue};

/// Opaque request payload kept as raw JSON text.
///
/// A missing or `null` payload is represented as an empty payload and is
/// omitted when the request is serialized.
///
/// # Examples
///
/// ```
/// use serde::Deserialize;
/// use wireline::message::Payload;
///
/// #[derive(Deserialize)]
/// struct CreateSchool {
///     name: String,
/// }
///
/// let payload = Payload::from_value(&serde_json::json!({ "name": "Elm Street" }))
///     .expect("payload serializes");
/// let request: CreateSchool = payload.decode().expect("payload decodes");
/// assert_eq!(request.name, "Elm Street");
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Option<Box<RawValue>>);

impl Payload {
    /// An empty payload.
    #[must_use]
    pub fn none() -> Self { Self(None) }

    /// Wrap raw JSON text that has already been validated.
    #[must_use]
    pub fn from_raw(raw: Box<RawValue>) -> Self {
        if raw.get() == "null" {
            Self(None)
        } else {
            Self(Some(raw))
        }
    }

    /// Serialize `value` into a payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(value).map(Self::from_raw)
    }

    /// Returns true if the request carried no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_none() }

    /// Raw JSON text of the payload, if present.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> { self.0.as_deref().map(RawValue::get) }

    /// Decode the payload into a concrete type.
    ///
    /// An empty payload decodes as JSON `null`, so `Option<T>` and `()` accept
    /// it while structs reject it.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.as_str().unwrap_or("null"))
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool { self.as_str() == other.as_str() }
}

impl Eq for Payload {}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(raw) => f.debug_tuple("Payload").field(&raw).finish(),
            None => f.write_str("Payload(None)"),
        }
    }
}

/// A request as it appears on the wire: `{"type": ..., "payload": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    request_type: String,
    #[serde(default, skip_serializing_if = "Payload::is_empty")]
    payload: Payload,
}

impl Request {
    /// Build a request for `request_type` carrying `payload`.
    #[must_use]
    pub fn new(request_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            request_type: request_type.into(),
            payload,
        }
    }

    /// The request-type tag used to select a handler.
    #[must_use]
    pub fn request_type(&self) -> &str { &self.request_type }

    /// The request payload.
    #[must_use]
    pub fn payload(&self) -> &Payload { &self.payload }

    /// Split the request into its tag and payload.
    #[must_use]
    pub fn into_parts(self) -> (String, Payload) { (self.request_type, self.payload) }
}

/// Message used when a failure is constructed without any text.
pub const DEFAULT_FAILURE_MESSAGE: &str = "request failed";

/// Message returned for lines that are not valid request JSON.
pub const INVALID_JSON_MESSAGE: &str = "invalid JSON format";

/// Uniform response envelope: `{"status": bool, "message"?: string, "data"?: any}`.
///
/// Successful responses never carry a message; failed responses always carry
/// a non-empty message and never carry data. The constructors enforce this.
///
/// # Examples
///
/// ```
/// use wireline::message::Response;
///
/// let ok = Response::success(serde_json::json!(7));
/// assert!(ok.status());
/// assert_eq!(ok.data(), Some(&serde_json::json!(7)));
///
/// let failed = Response::failure("");
/// assert!(!failed.status());
/// assert_eq!(failed.message(), "request failed");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    status: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl Response {
    /// A successful response. A `null` result omits `data`.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            status: true,
            message: String::new(),
            data: (!data.is_null()).then_some(data),
        }
    }

    /// A failed response carrying `message`.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = DEFAULT_FAILURE_MESSAGE.to_owned();
        }
        Self {
            status: false,
            message,
            data: None,
        }
    }

    /// Whether the request succeeded.
    #[must_use]
    pub fn status(&self) -> bool { self.status }

    /// Failure text; empty for successful responses.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }

    /// Result data, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> { self.data.as_ref() }

    /// Take ownership of the result data.
    #[must_use]
    pub fn into_data(self) -> Option<Value> { self.data }
}
