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

mod certificates;
mod clients;
pub mod cluster;
mod connstr;
pub mod credential;
pub mod database;
pub mod deserializer;
pub mod error;
pub mod options;
mod query_context;
pub mod results;
pub mod scope;
mod user_agent;

pub use cluster::Cluster;
pub use credential::Credential;
pub use database::Database;
pub use deserializer::{Deserializer, JsonDeserializer};
pub use error::{Error, ErrorKind, Result};
pub use options::cluster_options::{ClusterOptions, TimeoutOptions};
pub use options::query_options::{QueryOptions, ScanConsistency};
pub use options::security_options::SecurityOptions;
pub use results::query_results::{QueryMetadata, QueryMetrics, QueryResult, QueryWarning};
pub use results::row::Row;
pub use scope::Scope;

pub use couchbase_analytics_core::analyticsx::query::{RowAction, RowHandlerError};
