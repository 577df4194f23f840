use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const DEFAULT_BASE_URL: &str = "http://ip-api.com";
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

/// IP 地理位置信息，字段与 ip-api.com 返回保持一致
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub region_name: Option<String>,
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub org: Option<String>,
    #[serde(rename = "as")]
    pub as_name: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    #[serde(flatten)]
    location: GeoLocation,
}

/// ip-api.com 查询客户端
#[derive(Clone)]
pub struct GeoClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeoClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// 单次查询，status != success 视为接口错误
    pub async fn fetch(&self, ip: &str) -> AppResult<GeoLocation> {
        let url = format!("{}/json/{}?lang=zh-CN", self.base_url, ip);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::external_service("ip-api", e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AppError::external_service(
                "ip-api",
                format!("status={}", resp.status()),
            ));
        }
        let data: IpApiResponse = resp
            .json()
            .await
            .map_err(|e| AppError::external_service("ip-api", e.to_string()))?;
        if data.status != "success" {
            return Err(AppError::external_service(
                "ip-api",
                data.message
                    .unwrap_or_else(|| format!("no location data for {}", ip)),
            ));
        }
        Ok(data.location)
    }

    /// 带指数退避的查询，最多 3 次
    pub async fn fetch_with_retry(&self, ip: &str) -> AppResult<GeoLocation> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.fetch(ip).await {
                Ok(location) => return Ok(location),
                Err(e) => {
                    tracing::warn!(ip, attempt, error = %e, "geo lookup failed");
                    last_err = Some(e);
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| AppError::external_service("ip-api", "no attempts made")))
    }
}

impl Default for GeoClient {
    fn default() -> Self {
        Self::new()
    }
}

/// 第 n 次失败后的退避时长，初始 1s 指数递增
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_exponential() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_response_parsing_success() {
        let json = r#"{
            "status": "success",
            "country": "中国",
            "countryCode": "CN",
            "region": "BJ",
            "regionName": "北京市",
            "city": "北京",
            "lat": 39.9042,
            "lon": 116.4074,
            "timezone": "Asia/Shanghai",
            "isp": "China Telecom",
            "org": "Chinanet",
            "as": "AS4134",
            "query": "1.2.3.4"
        }"#;
        let resp: IpApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "success");
        assert_eq!(resp.location.country.as_deref(), Some("中国"));
        assert_eq!(resp.location.as_name.as_deref(), Some("AS4134"));
        assert_eq!(resp.location.lat, Some(39.9042));
    }

    #[test]
    fn test_response_parsing_failure() {
        let json = r#"{"status": "fail", "message": "private range", "query": "10.0.0.1"}"#;
        let resp: IpApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "fail");
        assert_eq!(resp.message.as_deref(), Some("private range"));
    }

    #[test]
    fn test_location_serializes_camel_case() {
        let location = GeoLocation {
            country: Some("中国".into()),
            country_code: Some("CN".into()),
            region: None,
            region_name: Some("北京市".into()),
            city: None,
            lat: None,
            lon: None,
            timezone: None,
            isp: None,
            org: None,
            as_name: Some("AS4134".into()),
            query: None,
        };
        let value = serde_json::to_value(&location).unwrap();
        assert_eq!(value["countryCode"], "CN");
        assert_eq!(value["regionName"], "北京市");
        assert_eq!(value["as"], "AS4134");
    }
}
