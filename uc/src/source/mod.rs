//! Data sources a coordinator can poll
//!
//! The engine only needs something implementing
//! [`Fetch`](crate::coordinator::Fetch). This module ships the one vendor
//! client the `uc` binary uses: a JSON-over-HTTP endpoint.

mod http;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use http::HttpSource;

/// Where and how to fetch snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Endpoint returning a JSON document
    pub url: Option<String>,

    /// JSON pointer selecting the part of the document to keep, e.g. `/current`
    pub pointer: Option<String>,

    /// Extra request headers (API keys and the like)
    pub headers: BTreeMap<String, String>,
}
