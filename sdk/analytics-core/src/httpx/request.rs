/*
 *
 *  * Copyright (c) 2025 Couchbase, Inc.
 *  *
 *  * Licensed under the Apache License, Version 2.0 (the "License");
 *  * you may not use this file except in compliance with the License.
 *  * You may obtain a copy of the License at
 *  *
 *  *    http://www.apache.org/licenses/LICENSE-2.0
 *  *
 *  * Unless required by applicable law or agreed to in writing, software
 *  * distributed under the License is distributed on an "AS IS" BASIS,
 *  * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  * See the License for the specific language governing permissions and
 *  * limitations under the License.
 *
 */

use bytes::Bytes;
use std::time::Duration;

#[derive(Debug)]
#[non_exhaustive]
pub struct Request {
    pub method: http::Method,
    pub uri: String,
    pub auth: Option<Auth>,
    pub user_agent: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<Bytes>,
    // Bounds connect plus total response read time for this call.
    pub timeout: Option<Duration>,
    pub unique_id: Option<String>,
}

impl Request {
    pub fn new(method: http::Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            auth: None,
            user_agent: None,
            content_type: None,
            body: None,
            timeout: None,
            unique_id: None,
        }
    }

    pub fn auth(mut self, auth: impl Into<Option<Auth>>) -> Self {
        self.auth = auth.into();
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<Option<String>>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<Option<String>>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn body(mut self, body: impl Into<Option<Bytes>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn unique_id(mut self, unique_id: impl Into<Option<String>>) -> Self {
        self.unique_id = unique_id.into();
        self
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
#[non_exhaustive]
pub enum Auth {
    BasicAuth(BasicAuth),
    // Mutual TLS; the key material lives in the client's TLS configuration,
    // so no Authorization header is sent.
    ClientCertificate,
}
