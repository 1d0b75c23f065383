use serde::Serialize;

use crate::client::MetricsSource;
use crate::errors::FetchError;
use crate::retry::RetryPolicy;

/// One selectable agency: its slug and the name shown for it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AgencyOption {
    pub slug: String,
    pub label: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AgencyCount {
    pub slug: String,
    pub count: u64,
}

/// Every listed agency in upstream order. The listing is not retried.
pub async fn agency_directory<S: MetricsSource>(
    source: &S,
) -> Result<Vec<AgencyOption>, FetchError> {
    let entities = source.list_entities().await?;
    Ok(entities
        .iter()
        .map(|entity| AgencyOption {
            slug: entity.slug.clone(),
            label: entity.label().to_string(),
        })
        .collect())
}

/// Search-result count for a single agency, retried on rate limits.
pub async fn agency_count<S: MetricsSource>(
    source: &S,
    retry: &RetryPolicy,
    slug: &str,
) -> Result<AgencyCount, FetchError> {
    let count = retry
        .run("scalar_count", || source.fetch_scalar_count(slug))
        .await
        .inspect_err(|err| tracing::warn!(slug, error = %err, "agency count unavailable"))?;
    Ok(AgencyCount {
        slug: slug.to_string(),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::{build_http_client, HttpMetricsClient};
    use crate::metrics::Metrics;

    fn client_for(server: &MockServer) -> HttpMetricsClient {
        let http = build_http_client(Duration::from_secs(2)).unwrap();
        HttpMetricsClient::new(http, server.uri(), Metrics::new().unwrap())
    }

    #[tokio::test]
    async fn directory_labels_prefer_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/v1/agencies.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "agencies": [
                    {"slug": "usda", "name": "Agriculture Department",
                     "display_name": "Department of Agriculture"},
                    {"slug": "epa", "name": "Environmental Protection Agency"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let directory = agency_directory(&client_for(&server)).await.unwrap();
        assert_eq!(
            directory,
            vec![
                AgencyOption {
                    slug: "usda".into(),
                    label: "Department of Agriculture".into()
                },
                AgencyOption {
                    slug: "epa".into(),
                    label: "Environmental Protection Agency".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn directory_failure_is_reported_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = agency_directory(&client_for(&server)).await.unwrap_err();
        assert_eq!(err, FetchError::RateLimited);
    }

    #[tokio::test]
    async fn count_retries_through_rate_limits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search/v1/count"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/search/v1/count"))
            .and(query_param("agency_slugs[]", "epa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1234})))
            .expect(1)
            .mount(&server)
            .await;

        let count = agency_count(&client_for(&server), &RetryPolicy::without_delay(3), "epa")
            .await
            .unwrap();
        assert_eq!(
            count,
            AgencyCount {
                slug: "epa".into(),
                count: 1234
            }
        );
    }

    #[tokio::test]
    async fn count_surfaces_malformed_payload_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search/v1/count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let err = agency_count(&client_for(&server), &RetryPolicy::without_delay(3), "epa")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }
}
