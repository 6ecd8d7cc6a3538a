// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! AWS MSK IAM authentication.
//!
//! MSK IAM auth tokens are SigV4-presigned URLs for the
//! `kafka-cluster:Connect` action, base64url-encoded and handed to the
//! broker over SASL/OAUTHBEARER. librdkafka invokes the token callback on
//! every new connection and again shortly before the current token expires,
//! so the returned expiry must be accurate.

use std::time::{Duration, SystemTime};

use anyhow::{bail, Context};
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use aws_types::SdkConfig;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::NaiveDateTime;
use url::Url;

/// How long a signed token remains valid.
const TOKEN_EXPIRY_SECONDS: u32 = 900;

/// Generates an MSK IAM auth token by signing a `kafka-cluster:Connect` URL
/// with credentials from the given AWS configuration.
///
/// Returns the base64url-encoded token and its expiration time in
/// milliseconds since the Unix epoch.
pub async fn generate_auth_token(sdk_config: &SdkConfig) -> Result<(String, i64), anyhow::Error> {
    let Some(region) = sdk_config.region() else {
        bail!("internal error: AWS configuration missing region");
    };
    let Some(credentials_provider) = sdk_config.credentials_provider() else {
        bail!("internal error: AWS configuration missing credentials");
    };
    let credentials = credentials_provider
        .provide_credentials()
        .await
        .context("failed to fetch AWS credentials")?;

    // The MSK signing endpoint is not exposed through the SDK's endpoint
    // resolution machinery, so the URL is constructed by hand. This covers
    // the standard partitions; FIPS and localstack endpoints are not
    // supported.
    let mut url = Url::parse(&format!("https://kafka.{}.amazonaws.com", region))
        .context("failed to build request for signing")?;
    url.query_pairs_mut()
        .append_pair("Action", "kafka-cluster:Connect");

    sign_url(&mut url, region, credentials).context("failed to sign request with aws sig v4")?;

    let expiration_time_ms =
        signed_url_expiry_ms(&url).context("failed to extract expiration from signed url")?;

    url.query_pairs_mut()
        .append_pair("User-Agent", "tfx-exporter");

    Ok((
        BASE64_URL_SAFE_NO_PAD.encode(url.as_str().as_bytes()),
        expiration_time_ms,
    ))
}

fn sign_url(url: &mut Url, region: &Region, credentials: Credentials) -> Result<(), anyhow::Error> {
    use aws_sigv4::http_request::{
        sign, SignableBody, SignableRequest, SignatureLocation, SigningSettings,
    };
    use aws_sigv4::sign::v4;

    let mut signing_settings = SigningSettings::default();
    signing_settings.signature_location = SignatureLocation::QueryParams;
    signing_settings.expires_in = Some(Duration::from_secs(u64::from(TOKEN_EXPIRY_SECONDS)));
    let identity = credentials.into();
    let signing_params = v4::SigningParams::builder()
        .identity(&identity)
        .region(region.as_ref())
        .name("kafka-cluster")
        .time(SystemTime::now())
        .settings(signing_settings)
        .build()
        .context("failed to build signing parameters")?;
    let signable_request = SignableRequest::new(
        "GET",
        url.as_str(),
        std::iter::empty(),
        SignableBody::Bytes(&[]),
    )
    .context("failed to build signable request")?;

    let (sign_instructions, _signature) = sign(signable_request, &signing_params.into())
        .context("failed to sign request")?
        .into_parts();

    let mut url_queries = url.query_pairs_mut();
    for (name, value) in sign_instructions.params() {
        url_queries.append_pair(name, value);
    }
    Ok(())
}

/// Computes the token expiry from the `X-Amz-Date` parameter of the signed
/// URL, which is the signing time the expiry window is anchored to.
fn signed_url_expiry_ms(signed_url: &Url) -> Result<i64, anyhow::Error> {
    let (_name, value) = &signed_url
        .query_pairs()
        .find(|(name, _value)| name == "X-Amz-Date")
        .unwrap_or_else(|| ("".into(), "".into()));

    let date_time = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ")
        .with_context(|| format!("failed to parse 'X-Amz-Date' param {value} from signed url"))?;

    let signing_time_ms = date_time.and_utc().timestamp_millis();

    Ok(signing_time_ms + i64::from(TOKEN_EXPIRY_SECONDS) * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_url_expiry() {
        let url = Url::parse(
            "https://kafka.us-east-1.amazonaws.com/?Action=kafka-cluster%3AConnect&X-Amz-Date=20240101T000000Z",
        )
        .unwrap();
        // 2024-01-01T00:00:00Z plus the 900 second expiry window.
        assert_eq!(
            signed_url_expiry_ms(&url).unwrap(),
            1_704_067_200_000 + 900_000
        );
    }

    #[test]
    fn test_signed_url_expiry_missing_date() {
        let url = Url::parse("https://kafka.us-east-1.amazonaws.com/").unwrap();
        assert!(signed_url_expiry_ms(&url).is_err());
    }
}
