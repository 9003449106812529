use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    error::FetchError,
    model::{DEFAULT_ICON, WeatherRecord},
};

use super::WeatherFetcher;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Connection settings for [`OpenWeatherFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub api_key: String,
    pub base_url: String,
    pub lang: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl FetcherSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            lang: "en".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Fetches current weather from OpenWeather, always in metric units.
#[derive(Debug, Clone)]
pub struct OpenWeatherFetcher {
    api_key: String,
    base_url: String,
    lang: String,
    http: Client,
}

impl OpenWeatherFetcher {
    pub fn new(settings: FetcherSettings) -> Result<Self, FetchError> {
        let http = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| FetchError::Other(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: settings.api_key,
            base_url: settings.base_url,
            lang: settings.lang,
            http,
        })
    }

    async fn fetch_current(
        &self,
        params: Vec<(&str, String)>,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, FetchError> {
        let request = async {
            tracing::debug!(url = %self.base_url, ?params, "requesting current weather");

            let mut query = params;
            query.push(("appid", self.api_key.clone()));
            query.push(("units", "metric".to_string()));
            query.push(("lang", self.lang.clone()));

            let res = self
                .http
                .get(&self.base_url)
                .query(&query)
                .send()
                .await
                .map_err(transport_error)?;

            let status = res.status();
            let body = res.text().await.map_err(transport_error)?;

            if !status.is_success() {
                tracing::warn!(%status, body = %truncate_body(&body), "OpenWeather request failed");
                return Err(api_error(status, &body));
            }

            parse_current_weather(&body)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = request => result,
        }
    }
}

#[async_trait]
impl WeatherFetcher for OpenWeatherFetcher {
    async fn fetch_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, FetchError> {
        let params = vec![("lat", latitude.to_string()), ("lon", longitude.to_string())];
        self.fetch_current(params, cancel).await
    }

    async fn fetch_by_city(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, FetchError> {
        self.fetch_current(vec![("q", name.to_string())], cancel).await
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(format!("OpenWeather request timed out: {e}"))
    } else if e.is_connect() {
        FetchError::Network(format!("Failed to connect to OpenWeather: {e}"))
    } else {
        FetchError::Network(format!("OpenWeather request failed: {e}"))
    }
}

fn api_error(status: StatusCode, body: &str) -> FetchError {
    let message = error_message_from_body(body).unwrap_or_else(|| fallback_message(status));
    FetchError::Api { status_code: status.as_u16(), message }
}

/// Human-readable error text from a JSON error body, if it has one.
fn error_message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    ["message", "error", "detail"].iter().find_map(|field| {
        value
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn fallback_message(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Unauthorized: invalid API key".to_string(),
        404 => "Location not found".to_string(),
        429 => "Rate limit exceeded, try again later".to_string(),
        500..=599 => "Weather service error, try again later".to_string(),
        _ => status.canonical_reason().unwrap_or("Request failed").to_string(),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

/// Validate an OpenWeather current-weather body into a [`WeatherRecord`].
///
/// Identity, city name, the first condition entry, core measurements
/// (temperature, humidity, pressure) and coordinates are required. Other
/// numbers default to zero when absent or unparseable. An observation time
/// outside the years 2000..=2100 is replaced by the current time.
pub fn parse_current_weather(body: &str) -> Result<WeatherRecord, FetchError> {
    let parsed: OwResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::invalid(format!("Malformed weather response: {e}")))?;

    let id = parsed.id.ok_or_else(|| FetchError::invalid("Missing location id"))?;
    let city = parsed.name.ok_or_else(|| FetchError::invalid("Missing location name"))?;

    let condition = parsed
        .weather
        .and_then(|w| w.into_iter().next())
        .ok_or_else(|| FetchError::invalid("No weather conditions in response"))?;
    let description = condition
        .description
        .ok_or_else(|| FetchError::invalid("Missing weather description"))?;
    let condition_main =
        condition.main.ok_or_else(|| FetchError::invalid("Missing weather condition"))?;
    let icon_code = condition.icon.unwrap_or_else(|| DEFAULT_ICON.to_string());

    let main = parsed.main.ok_or_else(|| FetchError::invalid("Missing main measurements"))?;
    let temperature = main.temp.ok_or_else(|| FetchError::invalid("Missing temperature"))?;
    let humidity = main.humidity.ok_or_else(|| FetchError::invalid("Missing humidity"))?;
    let pressure = main.pressure.ok_or_else(|| FetchError::invalid("Missing pressure"))?;

    let coord = parsed.coord.ok_or_else(|| FetchError::invalid("Missing coordinates"))?;
    let latitude = coord.lat.ok_or_else(|| FetchError::invalid("Missing latitude"))?;
    let longitude = coord.lon.ok_or_else(|| FetchError::invalid("Missing longitude"))?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(FetchError::invalid(format!(
            "Coordinates out of range: ({latitude}, {longitude})"
        )));
    }

    let sys = parsed.sys.unwrap_or_default();

    Ok(WeatherRecord {
        id,
        city,
        country: sys.country.unwrap_or_default(),
        latitude,
        longitude,
        temperature,
        feels_like: main.feels_like.unwrap_or_default(),
        min_temperature: main.temp_min.unwrap_or_default(),
        max_temperature: main.temp_max.unwrap_or_default(),
        humidity: percent(humidity),
        pressure,
        wind_speed: parsed.wind.and_then(|w| w.speed).unwrap_or_default(),
        cloudiness: percent(parsed.clouds.and_then(|c| c.all).unwrap_or_default()),
        visibility: parsed.visibility.unwrap_or_default().clamp(0, i64::from(u32::MAX)) as u32,
        description,
        condition_main,
        icon_code,
        sunrise: sys.sunrise.unwrap_or_default(),
        sunset: sys.sunset.unwrap_or_default(),
        observed_at: observation_time(parsed.dt),
    })
}

fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn observation_time(dt: Option<i64>) -> DateTime<Utc> {
    dt.and_then(|secs| DateTime::from_timestamp(secs, 0))
        .filter(|t| (2000..=2100).contains(&t.year()))
        .unwrap_or_else(Utc::now)
}

/// Deserializers that accept a number, a numeric string, or anything else
/// (treated as absent).
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(as_f64))
    }

    pub fn i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let value = Option::<Value>::deserialize(d)?;
        Ok(value.as_ref().and_then(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }))
    }

    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwResponse {
    #[serde(default, deserialize_with = "lenient::i64")]
    id: Option<i64>,
    name: Option<String>,
    coord: Option<OwCoord>,
    main: Option<OwMain>,
    wind: Option<OwWind>,
    weather: Option<Vec<OwWeather>>,
    clouds: Option<OwClouds>,
    #[serde(default, deserialize_with = "lenient::i64")]
    visibility: Option<i64>,
    sys: Option<OwSys>,
    #[serde(default, deserialize_with = "lenient::i64")]
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    #[serde(default, deserialize_with = "lenient::f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    #[serde(default, deserialize_with = "lenient::f64")]
    temp: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    feels_like: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    temp_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    temp_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::f64")]
    pressure: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    #[serde(default, deserialize_with = "lenient::f64")]
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: Option<String>,
    main: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    #[serde(default, deserialize_with = "lenient::f64")]
    all: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
    #[serde(default, deserialize_with = "lenient::i64")]
    sunrise: Option<i64>,
    #[serde(default, deserialize_with = "lenient::i64")]
    sunset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn london() -> serde_json::Value {
        json!({
            "coord": { "lon": -0.12, "lat": 51.5 },
            "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }],
            "main": {
                "temp": 15.0, "feels_like": 14.2, "temp_min": 13.9, "temp_max": 16.1,
                "pressure": 1012, "humidity": 72
            },
            "visibility": 10000,
            "wind": { "speed": 4.1, "deg": 240 },
            "clouds": { "all": 20 },
            "dt": 1714564800,
            "sys": { "country": "GB", "sunrise": 1714537000, "sunset": 1714591000 },
            "id": 2643743,
            "name": "London",
            "cod": 200
        })
    }

    fn parse(value: &serde_json::Value) -> Result<WeatherRecord, FetchError> {
        parse_current_weather(&value.to_string())
    }

    #[test]
    fn parses_complete_response() {
        let record = parse(&london()).unwrap();

        assert_eq!(record.id, 2643743);
        assert_eq!(record.city, "London");
        assert_eq!(record.country, "GB");
        assert_eq!(record.latitude, 51.5);
        assert_eq!(record.longitude, -0.12);
        assert_eq!(record.temperature, 15.0);
        assert_eq!(record.humidity, 72);
        assert_eq!(record.pressure, 1012.0);
        assert_eq!(record.wind_speed, 4.1);
        assert_eq!(record.cloudiness, 20);
        assert_eq!(record.visibility, 10000);
        assert_eq!(record.condition_main, "Clear");
        assert_eq!(record.description, "clear sky");
        assert_eq!(record.sunrise, 1714537000);
        assert_eq!(record.observed_at.timestamp(), 1714564800);
    }

    #[test]
    fn missing_weather_array_is_invalid() {
        let mut body = london();
        body.as_object_mut().unwrap().remove("weather");

        let err = parse(&body).unwrap_err();
        assert!(matches!(err, FetchError::InvalidData(_)));
    }

    #[test]
    fn empty_weather_array_is_invalid() {
        let mut body = london();
        body["weather"] = json!([]);

        assert!(matches!(parse(&body), Err(FetchError::InvalidData(_))));
    }

    #[test]
    fn missing_identity_or_name_is_invalid() {
        for field in ["id", "name", "main", "coord"] {
            let mut body = london();
            body.as_object_mut().unwrap().remove(field);
            assert!(
                matches!(parse(&body), Err(FetchError::InvalidData(_))),
                "removing {field} should fail"
            );
        }
    }

    #[test]
    fn missing_required_measurement_is_invalid() {
        let mut body = london();
        body["main"].as_object_mut().unwrap().remove("temp");

        assert!(matches!(parse(&body), Err(FetchError::InvalidData(_))));
    }

    #[test]
    fn absent_wind_defaults_to_zero() {
        let mut body = london();
        body.as_object_mut().unwrap().remove("wind");

        let record = parse(&body).unwrap();
        assert_eq!(record.wind_speed, 0.0);
    }

    #[test]
    fn optional_sections_default() {
        let mut body = london();
        let obj = body.as_object_mut().unwrap();
        for field in ["clouds", "visibility", "sys"] {
            obj.remove(field);
        }
        body["weather"][0].as_object_mut().unwrap().remove("icon");

        let record = parse(&body).unwrap();
        assert_eq!(record.cloudiness, 0);
        assert_eq!(record.visibility, 0);
        assert_eq!(record.sunrise, 0);
        assert_eq!(record.sunset, 0);
        assert_eq!(record.country, "");
        assert_eq!(record.icon_code, DEFAULT_ICON);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let mut body = london();
        body["id"] = json!("2643743");
        body["main"]["temp"] = json!("15.5");
        body["main"]["humidity"] = json!("80");
        body["wind"]["speed"] = json!("3.2");
        body["visibility"] = json!("9000");

        let record = parse(&body).unwrap();
        assert_eq!(record.id, 2643743);
        assert_eq!(record.temperature, 15.5);
        assert_eq!(record.humidity, 80);
        assert_eq!(record.wind_speed, 3.2);
        assert_eq!(record.visibility, 9000);
    }

    #[test]
    fn unparseable_optional_number_defaults() {
        let mut body = london();
        body["wind"]["speed"] = json!("gusty");

        assert_eq!(parse(&body).unwrap().wind_speed, 0.0);
    }

    #[test]
    fn out_of_range_observation_time_becomes_now() {
        for dt in [json!(0), json!(5_000_000_000_i64), json!(null)] {
            let mut body = london();
            body["dt"] = dt;

            let before = Utc::now();
            let record = parse(&body).unwrap();
            assert!(record.observed_at >= before);
            assert!(record.observed_at <= Utc::now());
        }
    }

    #[test]
    fn out_of_range_coordinates_are_invalid() {
        let mut body = london();
        body["coord"]["lat"] = json!(123.0);

        assert!(matches!(parse(&body), Err(FetchError::InvalidData(_))));
    }

    #[test]
    fn non_json_body_is_invalid() {
        assert!(matches!(parse_current_weather("<html>"), Err(FetchError::InvalidData(_))));
    }

    #[test]
    fn error_message_prefers_body_fields() {
        assert_eq!(
            error_message_from_body(r#"{"cod":"404","message":"city not found"}"#).as_deref(),
            Some("city not found")
        );
        assert_eq!(error_message_from_body(r#"{"detail":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message_from_body("not json"), None);
        assert_eq!(error_message_from_body(r#"{"message":"  "}"#), None);
    }

    #[test]
    fn status_fallback_messages() {
        let err = api_error(StatusCode::UNAUTHORIZED, "");
        assert!(matches!(
            err,
            FetchError::Api { status_code: 401, ref message } if message.contains("invalid API key")
        ));

        let err = api_error(StatusCode::SERVICE_UNAVAILABLE, "<html>");
        assert!(matches!(err, FetchError::Api { status_code: 503, .. }));

        let err = api_error(StatusCode::IM_A_TEAPOT, "");
        assert!(matches!(
            err,
            FetchError::Api { status_code: 418, ref message } if message == "I'm a teapot"
        ));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(300);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }
}
