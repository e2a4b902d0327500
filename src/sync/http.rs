//! HTTP client for the scheduling platform.
//!
//! [`HttpSchedulingApi`] issues one GET per list call against
//! `{base_url}/businesses/{business}/services/{service}/{entity}`. Retries
//! and the per-attempt timeout belong to [`call_with_retry`]; this client
//! only classifies each answer into an [`ExternalApiError`].
//!
//! [`call_with_retry`]: super::retry::call_with_retry

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::SyncConfig;

use super::client::{
    ExternalAbsence, ExternalApiError, ExternalEmployee, ExternalSchedule, FetchQuery,
    SchedulingApi,
};

/// Scheduling platform reached over HTTP with an optional bearer key.
#[derive(Debug, Clone)]
pub struct HttpSchedulingApi {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout_ms: u64,
}

impl HttpSchedulingApi {
    /// Builds a client from the `api` section and timeout of the sync
    /// configuration.
    pub fn new(config: &SyncConfig) -> Result<Self, ExternalApiError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| ExternalApiError::Unreachable {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            api_key: config.api.api_key.clone(),
            timeout_ms: config.timeout_ms,
        })
    }

    /// Returns the listing URL of an entity within the query's scope.
    pub fn endpoint(&self, query: &FetchQuery, entity: &str) -> String {
        format!(
            "{}/businesses/{}/services/{}/{}",
            self.base_url, query.business_id, query.service_id, entity
        )
    }

    fn request(&self, query: &FetchQuery, entity: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .get(self.endpoint(query, entity))
            .header(header::ACCEPT, "application/json");

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        if let Some(site) = &query.site_id {
            builder = builder.query(&[("site_id", site)]);
        }
        if let Some(range) = &query.range {
            builder = builder.query(&[
                ("from", range.start.to_string()),
                ("to", range.end.to_string()),
            ]);
        }
        builder
    }

    async fn list<T: DeserializeOwned>(
        &self,
        query: &FetchQuery,
        entity: &str,
    ) -> Result<Vec<T>, ExternalApiError> {
        let response = self
            .request(query, entity)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(entity, status = %status, "Received scheduling API response");
        if !status.is_success() {
            return Err(status_error(status, &response));
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| ExternalApiError::Malformed {
                message: format!("{entity}: {e}"),
            })
    }

    fn transport_error(&self, error: reqwest::Error) -> ExternalApiError {
        if error.is_timeout() {
            ExternalApiError::Timeout {
                elapsed_ms: self.timeout_ms,
            }
        } else {
            ExternalApiError::Unreachable {
                message: error.to_string(),
            }
        }
    }
}

/// Maps a non-success status to the error taxonomy.
fn status_error(status: StatusCode, response: &Response) -> ExternalApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExternalApiError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ExternalApiError::RateLimited {
            retry_after_ms: response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .map(|wait| u64::try_from(wait.as_millis()).unwrap_or(u64::MAX)),
        },
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => {
            ExternalApiError::Unreachable {
                message: format!("HTTP {status}"),
            }
        }
        _ => ExternalApiError::Malformed {
            message: format!("unexpected HTTP {status}"),
        },
    }
}

/// Parses a `Retry-After` value given in seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[async_trait]
impl SchedulingApi for HttpSchedulingApi {
    async fn list_employees(&self, query: &FetchQuery) -> Result<Vec<ExternalEmployee>, ExternalApiError> {
        self.list(query, "employees").await
    }

    async fn list_schedules(&self, query: &FetchQuery) -> Result<Vec<ExternalSchedule>, ExternalApiError> {
        self.list(query, "schedules").await
    }

    async fn list_absences(&self, query: &FetchQuery) -> Result<Vec<ExternalAbsence>, ExternalApiError> {
        self.list(query, "absences").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DailyScheduleConfig, ExternalApiConfig, RetryConfig};
    use crate::models::PeriodWindow;
    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::get,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    const SCOPE: &str = "/businesses/biz/services/svc";

    fn config(base_url: String, api_key: Option<&str>) -> SyncConfig {
        SyncConfig {
            api: ExternalApiConfig {
                base_url,
                business_id: "biz".to_string(),
                service_id: "svc".to_string(),
                api_key: api_key.map(str::to_string),
            },
            timeout_ms: 1000,
            retry: RetryConfig::default(),
            chunk_size: 50,
            default_lookback_days: 30,
            schedule: DailyScheduleConfig::default(),
        }
    }

    fn query(range: Option<PeriodWindow>, site_id: Option<&str>) -> FetchQuery {
        FetchQuery {
            business_id: "biz".to_string(),
            service_id: "svc".to_string(),
            range,
            site_id: site_id.map(str::to_string),
        }
    }

    async fn employees(headers: HeaderMap) -> impl IntoResponse {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer secret");
        if !authorized {
            return AxumStatus::UNAUTHORIZED.into_response();
        }
        Json(vec![ExternalEmployee {
            id: "E1".to_string(),
            name: "Ana".to_string(),
            payroll_code: Some("P-1".to_string()),
            site_id: Some("SITE-A".to_string()),
            email: None,
            start_date: None,
            end_date: None,
        }])
        .into_response()
    }

    async fn schedules(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        let date = params
            .get("from")
            .and_then(|from| NaiveDate::parse_from_str(from, "%Y-%m-%d").ok())
            .unwrap_or_default();
        Json(vec![ExternalSchedule {
            id: format!("SH-{}", params.get("site_id").cloned().unwrap_or_default()),
            employee_id: "E1".to_string(),
            site_id: params.get("site_id").cloned(),
            date,
            hours: Decimal::new(75, 1),
        }])
    }

    async fn rate_limited() -> impl IntoResponse {
        (AxumStatus::TOO_MANY_REQUESTS, [("retry-after", "7")], "slow down")
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{address}/")
    }

    async fn platform() -> String {
        serve(
            Router::new()
                .route(&format!("{SCOPE}/employees"), get(employees))
                .route(&format!("{SCOPE}/schedules"), get(schedules))
                .route(&format!("{SCOPE}/absences"), get(rate_limited)),
        )
        .await
    }

    #[test]
    fn test_endpoint_uses_configured_scope() {
        let api = HttpSchedulingApi::new(&config("https://host/api/v2/".to_string(), None)).unwrap();
        assert_eq!(
            api.endpoint(&query(None, None), "employees"),
            "https://host/api/v2/businesses/biz/services/svc/employees"
        );
    }

    #[test]
    fn test_retry_after_seconds() {
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[tokio::test]
    async fn test_lists_employees_with_api_key() {
        let api = HttpSchedulingApi::new(&config(platform().await, Some("secret"))).unwrap();

        let employees = api.list_employees(&query(None, None)).await.unwrap();

        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].payroll_code.as_deref(), Some("P-1"));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unauthorized() {
        let api = HttpSchedulingApi::new(&config(platform().await, None)).unwrap();

        let result = api.list_employees(&query(None, None)).await;

        assert_eq!(result, Err(ExternalApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_schedule_query_carries_range_and_site() {
        let api = HttpSchedulingApi::new(&config(platform().await, None)).unwrap();
        let start = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let range = PeriodWindow::new(start, end).unwrap();

        let schedules = api
            .list_schedules(&query(Some(range), Some("SITE-A")))
            .await
            .unwrap();

        assert_eq!(schedules[0].id, "SH-SITE-A");
        assert_eq!(schedules[0].date, start);
        assert_eq!(schedules[0].hours, Decimal::new(75, 1));
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let api = HttpSchedulingApi::new(&config(platform().await, None)).unwrap();

        let result = api.list_absences(&query(None, None)).await;

        assert_eq!(
            result,
            Err(ExternalApiError::RateLimited {
                retry_after_ms: Some(7000)
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);
        let api = HttpSchedulingApi::new(&config(format!("http://{address}"), None)).unwrap();

        let result = api.list_employees(&query(None, None)).await;

        assert!(matches!(result, Err(ExternalApiError::Unreachable { .. })));
    }
}
