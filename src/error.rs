// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/heliowatch

//! Error types for the feed, fan-out, simulation and alert paths

use thiserror::Error;

/// Upstream fetch failure. Always degraded to "no new data" by the scheduler.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport error, including timeouts
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Provider answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Payload did not have the expected shape
    #[error("malformed payload from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl FetchError {
    pub fn malformed(url: &str, message: impl Into<String>) -> Self {
        FetchError::Malformed {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

/// Sending to one viewer failed. Only that viewer is dropped.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("viewer {0} is closed")]
    Closed(String),

    #[error("send to viewer {0} timed out")]
    Timeout(String),

    #[error("send to viewer {id} failed: {message}")]
    Transport { id: String, message: String },

    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Rejected control-plane request. Nothing is enqueued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("unknown event type '{0}' (expected flux, wind, kp or proton)")]
    UnknownKind(String),

    #[error("unknown flare class '{0}' (expected C, M or X)")]
    UnknownClass(String),

    #[error("'{identifier}' does not name the {kind} metric")]
    MetricMismatch { identifier: String, kind: String },

    #[error("duration must be between 1 and {max} ticks, got {got}")]
    Duration { got: i64, max: usize },
}

/// Alert delivery failure. Logged by the dispatcher and never propagated.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("alert sink '{sink}' failed: {message}")]
    Sink { sink: String, message: String },

    #[error("alert queue is full")]
    QueueFull,

    #[error("alert dispatcher has stopped")]
    Closed,
}
