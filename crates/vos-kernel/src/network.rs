// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated network services reachable from programs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
}

impl ServiceResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::String(reason.into()),
        }
    }
}

/// Request/response access to whatever answers on `host:port`.
#[cfg_attr(test, mockall::automock)]
pub trait NetworkService: Send + Sync {
    fn call(&self, host: &str, port: u16, args: &BTreeMap<String, Value>) -> ServiceResponse;
}
