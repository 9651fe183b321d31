// Copyright (C) 2025 Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

//! Endpoint resolution and configuration

use crate::error::Result;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A connection target: URI plus the headers to send with the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub uri: String,
    pub headers: BTreeMap<String, String>,
}

impl Endpoint {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Produces an [`Endpoint`] for each connection attempt.
///
/// Called again on every attempt so signed headers or rotated credentials are
/// never reused from a stale resolution.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self) -> Result<Endpoint>;
}

impl EndpointResolver for Endpoint {
    fn resolve(&self) -> Result<Endpoint> {
        Ok(self.clone())
    }
}

/// Gremlin server location, loaded from defaults, `gremlin.toml` and
/// `GREMLIN_*` environment variables (later sources win).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Endpoints {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8182,
            ssl: false,
            path: "/gremlin".to_string(),
            headers: BTreeMap::new(),
        }
    }
}

impl Endpoints {
    pub const CONFIG_FILE: &'static str = "gremlin.toml";
    pub const ENV_PREFIX: &'static str = "GREMLIN_";

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Endpoints::default()))
            .merge(Toml::file(Self::CONFIG_FILE))
            .merge(Env::prefixed(Self::ENV_PREFIX))
    }

    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    pub fn uri(&self) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

impl EndpointResolver for Endpoints {
    fn resolve(&self) -> Result<Endpoint> {
        Ok(Endpoint {
            uri: self.uri(),
            headers: self.headers.clone(),
        })
    }
}
