// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Kafka client utilities for the topic freshness exporter.
//!
//! This crate owns every interaction with the Kafka cluster: broker address
//! parsing, client configuration, AWS MSK IAM authentication, and the
//! metadata/watermark/poll call surface the freshness engine is built on.
//! Nothing in here joins a consumer group, commits an offset, or creates a
//! topic.

#![warn(missing_docs, missing_debug_implementations)]

pub mod addr;
pub mod aws;
pub mod client;
pub mod gateway;
