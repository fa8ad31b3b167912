//! Request parameters and the recognized-parameter guard.
//!
//! The server accepts a fixed set of sampling/generation options. Anything
//! outside that set is rejected here, before a request body is ever built.
//! `model`, `prompt`, `messages` and `input` are not parameters: the gateway
//! fills them in from its explicit arguments.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{ConnectError, Result};

// ─── Recognized Set ──────────────────────────────────────────────────────────

/// Every parameter key the server accepts on prompt/chat requests.
pub const RECOGNIZED_PARAMETERS: &[&str] = &[
    "max_tokens",
    "temperature",
    "top_p",
    "top_k",
    "stream",
    "stop",
    "seed",
    "presence_penalty",
    "frequency_penalty",
    "logit_bias",
    "repeat_penalty",
    "price",
];

/// Recognized keys without a named field on [`RequestParameters`].
/// These live in the `extra` map.
const EXTENSION_PARAMETERS: &[&str] = &[
    "presence_penalty",
    "frequency_penalty",
    "logit_bias",
    "repeat_penalty",
    "price",
];

/// Whether `key` is in the recognized set.
pub fn is_recognized(key: &str) -> bool {
    RECOGNIZED_PARAMETERS.contains(&key)
}

/// Check every key against the recognized set.
///
/// Fails on the first unrecognized key. An empty iterator is valid.
pub fn validate_keys<'a, I>(keys: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for key in keys {
        if !is_recognized(key) {
            return Err(unrecognized(key));
        }
    }
    Ok(())
}

/// Check a JSON object's keys against the recognized set.
pub fn validate_object(object: &Map<String, Value>) -> Result<()> {
    validate_keys(object.keys().map(String::as_str))
}

fn unrecognized(key: &str) -> ConnectError {
    ConnectError::InvalidParameter {
        key: key.to_string(),
        reason: "not a recognized parameter".into(),
    }
}

// ─── RequestParameters ───────────────────────────────────────────────────────

/// Stop sequences: the server takes either one string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

/// Sampling/generation options for a single request.
///
/// Common options are named fields. The remaining recognized options
/// (penalties, `logit_bias`, `price`) go in `extra`, which is checked by
/// [`RequestParameters::validate`] before every dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestParameters {
    /// `-1` asks the server to generate until the context is full.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Server-defined extras from the recognized set.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RequestParameters {
    /// Build parameters from a loose JSON object.
    ///
    /// Every key must be recognized and every value must have the right
    /// shape; `null` leaves the option unset.
    pub fn from_map(object: Map<String, Value>) -> Result<Self> {
        validate_object(&object)?;

        let mut params = Self::default();
        for (key, value) in object {
            match key.as_str() {
                "max_tokens" => params.max_tokens = field(&key, value)?,
                "temperature" => params.temperature = field(&key, value)?,
                "top_p" => params.top_p = field(&key, value)?,
                "top_k" => params.top_k = field(&key, value)?,
                "stream" => params.stream = field(&key, value)?,
                "stop" => params.stop = field(&key, value)?,
                "seed" => params.seed = field(&key, value)?,
                _ => {
                    if !value.is_null() {
                        params.extra.insert(key, value);
                    }
                }
            }
        }
        Ok(params)
    }

    /// Build parameters from a JSON value that must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Self::from_map(object),
            Value::Null => Ok(Self::default()),
            other => Err(ConnectError::InvalidParameter {
                key: "<root>".into(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }

    /// Guard run before every outgoing request.
    ///
    /// Named fields are recognized by construction; `extra` keys must be
    /// recognized extension parameters and must not shadow a named field.
    pub fn validate(&self) -> Result<()> {
        for key in self.extra.keys() {
            if !is_recognized(key) {
                return Err(unrecognized(key));
            }
            if !EXTENSION_PARAMETERS.contains(&key.as_str()) {
                return Err(ConnectError::InvalidParameter {
                    key: key.clone(),
                    reason: "set through the named field, not the extension map".into(),
                });
            }
        }
        Ok(())
    }

    /// Set one extension parameter, rejecting keys outside the recognized set.
    pub fn insert_extra(&mut self, key: &str, value: Value) -> Result<()> {
        if !EXTENSION_PARAMETERS.contains(&key) {
            return Err(if is_recognized(key) {
                ConnectError::InvalidParameter {
                    key: key.to_string(),
                    reason: "set through the named field, not the extension map".into(),
                }
            } else {
                unrecognized(key)
            });
        }
        self.extra.insert(key.to_string(), value);
        Ok(())
    }

    /// Layer `overrides` on top of `self`: every option set in `overrides` wins.
    pub fn overlay(&self, overrides: &RequestParameters) -> RequestParameters {
        let mut extra = self.extra.clone();
        extra.extend(overrides.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        RequestParameters {
            max_tokens: overrides.max_tokens.or(self.max_tokens),
            temperature: overrides.temperature.or(self.temperature),
            top_p: overrides.top_p.or(self.top_p),
            top_k: overrides.top_k.or(self.top_k),
            stream: overrides.stream.or(self.stream),
            stop: overrides.stop.clone().or_else(|| self.stop.clone()),
            seed: overrides.seed.or(self.seed),
            extra,
        }
    }

    /// Whether the caller asked for a server-sent-event response.
    pub fn wants_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Whether no option is set.
    pub fn is_empty(&self) -> bool {
        *self == RequestParameters::default()
    }
}

fn field<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ConnectError::InvalidParameter {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
