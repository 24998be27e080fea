//! Endpoint inventory inputs
//!
//! The inventory itself (discovery, import, listing pages) lives outside the
//! monitoring engine. This module only defines what the engine's storage
//! accepts when endpoints are registered or edited, plus the host
//! classification helper used at registration time.

use std::net::IpAddr;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::storage::schema::HttpMethod;

/// Data needed to register an endpoint
///
/// Registering an existing (`base_url`, `path`, `method`) triple updates the
/// stored record instead of inserting a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEndpoint {
    pub service_name: String,
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub discovery_source: Option<String>,
}

impl NewEndpoint {
    pub fn new(
        service_name: impl Into<String>,
        base_url: impl Into<String>,
        path: impl Into<String>,
        method: HttpMethod,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            base_url: base_url.into(),
            path: path.into(),
            method,
            description: None,
            auth_type: None,
            discovery_source: None,
        }
    }

    pub fn is_internal(&self) -> bool {
        is_internal_url(&self.base_url)
    }
}

/// Partial update of an endpoint
///
/// Only the fields listed here can be changed; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointPatch {
    pub service_name: Option<String>,
    pub base_url: Option<String>,
    pub path: Option<String>,
    pub method: Option<HttpMethod>,
    pub description: Option<String>,
    pub auth_type: Option<String>,
    pub is_internal: Option<bool>,
    pub is_active: Option<bool>,
}

impl EndpointPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Names of the fields this patch touches, for audit logging
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.service_name.is_some() {
            fields.push("service_name");
        }
        if self.base_url.is_some() {
            fields.push("base_url");
        }
        if self.path.is_some() {
            fields.push("path");
        }
        if self.method.is_some() {
            fields.push("method");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.auth_type.is_some() {
            fields.push("auth_type");
        }
        if self.is_internal.is_some() {
            fields.push("is_internal");
        }
        if self.is_active.is_some() {
            fields.push("is_active");
        }
        fields
    }
}

/// Best-effort check whether a URL points at an internal service
///
/// Loopback and private addresses, `localhost`, and hosts under the `.local`,
/// `.internal` or `.lan` suffixes count as internal. Anything that does not
/// parse as a URL is treated as external.
pub fn is_internal_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
            IpAddr::V6(v6) => v6.is_loopback(),
        };
    }

    let host = host.to_ascii_lowercase();
    host == "localhost"
        || [".local", ".internal", ".lan", ".localhost"]
            .iter()
            .any(|suffix| host.ends_with(suffix))
}
