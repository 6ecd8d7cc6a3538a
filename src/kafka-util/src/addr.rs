// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Parsing of Kafka broker address lists.

use std::error::Error;
use std::fmt::{self, Write};
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The port assumed for a broker address that does not specify one.
const DEFAULT_KAFKA_PORT: u16 = 9092;

/// The addresses of one or more Kafka brokers, as provided to
/// `bootstrap.servers`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KafkaAddrs(Vec<(String, u16)>);

impl FromStr for KafkaAddrs {
    type Err = KafkaAddrsParseError;

    fn from_str(s: &str) -> Result<KafkaAddrs, Self::Err> {
        let mut addrs = vec![];
        for addr in s.split(',') {
            let mut parts = addr.splitn(2, ':');
            let host = parts.next().expect("splitn returns at least one part");
            if host.is_empty() {
                return Err(KafkaAddrsParseError::MissingHost);
            }
            let port = match parts.next() {
                None => DEFAULT_KAFKA_PORT,
                Some(port) => port.parse().map_err(KafkaAddrsParseError::InvalidPort)?,
            };
            addrs.push((host.to_owned(), port));
        }
        Ok(KafkaAddrs(addrs))
    }
}

impl fmt::Display for KafkaAddrs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, (host, port)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_char(',')?;
            }
            write!(f, "{}:{}", host, port)?;
        }
        Ok(())
    }
}

/// An error while parsing a Kafka broker address list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KafkaAddrsParseError {
    /// An address in the list had an empty host component.
    MissingHost,
    /// An address in the list had an unparseable port component.
    InvalidPort(ParseIntError),
}

impl fmt::Display for KafkaAddrsParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KafkaAddrsParseError::MissingHost => {
                f.write_str("unable to parse Kafka broker address: missing host")
            }
            KafkaAddrsParseError::InvalidPort(e) => write!(
                f,
                "unable to parse Kafka broker address: invalid port: {}",
                e
            ),
        }
    }
}

impl Error for KafkaAddrsParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok() -> Result<(), Box<dyn Error>> {
        for (input, addrs, output) in [
            ("localhost", vec![("localhost", 9092)], "localhost:9092"),
            ("kafka1:42", vec![("kafka1", 42)], "kafka1:42"),
            ("10.1.2.3", vec![("10.1.2.3", 9092)], "10.1.2.3:9092"),
            (
                "b1,b2:9094",
                vec![("b1", 9092), ("b2", 9094)],
                "b1:9092,b2:9094",
            ),
        ] {
            let parsed: KafkaAddrs = input.parse()?;
            let expected: Vec<_> = addrs
                .into_iter()
                .map(|(h, p)| (h.to_owned(), p))
                .collect();
            assert_eq!(parsed.0, expected);
            assert_eq!(parsed.to_string(), output);
        }
        Ok(())
    }

    #[test]
    fn test_parse_err() {
        assert_eq!(
            "host:nope".parse::<KafkaAddrs>().unwrap_err().to_string(),
            "unable to parse Kafka broker address: invalid port: invalid digit found in string",
        );
        assert_eq!(
            ":9092".parse::<KafkaAddrs>().unwrap_err(),
            KafkaAddrsParseError::MissingHost,
        );
    }
}
