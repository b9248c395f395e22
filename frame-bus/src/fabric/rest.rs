/********************************************************************************
 * Copyright (c) 2025 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Value contract of the REST transport collaborator. The transport itself
//! lives outside this workspace; replies are routed back on the request
//! channel with the original correlation id.

use crate::model::Payload;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    UpdateHeaders,
    HostOptions,
    CorsOptions,
    CorsCredentialsOptions,
}

/// One REST request as carried on the REST service channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestOperation {
    pub verb: HttpVerb,
    pub uri: String,
    #[serde(default)]
    pub body: Option<Payload>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    #[serde(default)]
    pub path_params: HashMap<String, String>,
    #[serde(default)]
    pub api_class: Option<String>,
    pub sender: String,
}

impl RestOperation {
    pub fn new(verb: HttpVerb, uri: &str, sender: &str) -> Self {
        Self {
            verb,
            uri: uri.to_string(),
            body: None,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            path_params: HashMap::new(),
            api_class: None,
            sender: sender.to_string(),
        }
    }

    pub fn with_body(mut self, body: Payload) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}
