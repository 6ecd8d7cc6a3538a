// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Topic discovery by name prefix.

use tfx_kafka_util::gateway::{BrokerGateway, DiscoveryError};
use tracing::info;

/// Splits a `;`-separated prefix setting into individual prefixes, trimming
/// whitespace and dropping empty entries.
pub fn split_prefixes(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Returns the names of all topics that start with any of `prefixes`,
/// lexicographically sorted and free of duplicates.
///
/// Prefix matching is a plain string-prefix test; no globbing. A
/// [`DiscoveryError`] here means the broker metadata was unreachable and is
/// fatal to the surrounding cycle.
pub fn resolve_topics<G>(gateway: &G, prefixes: &[String]) -> Result<Vec<String>, DiscoveryError>
where
    G: BrokerGateway,
{
    // The gateway hands back a BTreeSet, so ordering and uniqueness come
    // for free.
    let matching: Vec<String> = gateway
        .list_topics()?
        .into_iter()
        .filter(|topic| prefixes.iter().any(|prefix| topic.starts_with(prefix.as_str())))
        .collect();
    info!(
        "discovered {} topic(s) matching prefixes {:?}",
        matching.len(),
        prefixes
    );
    Ok(matching)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StaticCluster;

    fn prefixes(ps: &[&str]) -> Vec<String> {
        ps.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_split_prefixes() {
        assert_eq!(split_prefixes("one"), vec!["one"]);
        assert_eq!(split_prefixes("one;two"), vec!["one", "two"]);
        assert_eq!(split_prefixes(" one ; ;two;"), vec!["one", "two"]);
        assert!(split_prefixes(" ; ;").is_empty());
    }

    #[test]
    fn test_resolve_filters_and_sorts() {
        let cluster = StaticCluster::with_topic_names(&[
            "orders-eu",
            "audit",
            "orders-us",
            "payments-eu",
        ]);
        assert_eq!(
            resolve_topics(&cluster, &prefixes(&["orders-"])).unwrap(),
            vec!["orders-eu", "orders-us"],
        );
        assert_eq!(
            resolve_topics(&cluster, &prefixes(&["orders-", "payments-"])).unwrap(),
            vec!["orders-eu", "orders-us", "payments-eu"],
        );
        assert!(resolve_topics(&cluster, &prefixes(&["unmatched-"]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_resolve_overlapping_prefixes_yield_no_duplicates() {
        let cluster = StaticCluster::with_topic_names(&["orders-eu"]);
        assert_eq!(
            resolve_topics(&cluster, &prefixes(&["orders", "orders-"])).unwrap(),
            vec!["orders-eu"],
        );
    }

    #[test]
    fn test_resolve_propagates_discovery_failure() {
        let cluster = StaticCluster::unreachable();
        assert!(resolve_topics(&cluster, &prefixes(&["orders-"])).is_err());
    }
}
