//! Human-friendly rendering of weather records.

use chrono::{DateTime, Local, Utc};

use weatherline_core::WeatherRecord;

pub fn render_record(record: &WeatherRecord) -> String {
    let place = if record.country.is_empty() {
        record.city.clone()
    } else {
        format!("{}, {}", record.city, record.country)
    };

    let mut lines = vec![
        format!("{place} ({:.2}, {:.2})", record.latitude, record.longitude),
        format!("  {} ({})", record.description, record.condition_main),
        format!(
            "  Temperature: {:.1}°C (feels like {:.1}°C, min {:.1}°C, max {:.1}°C)",
            record.temperature, record.feels_like, record.min_temperature, record.max_temperature
        ),
        format!("  Humidity: {}%  Pressure: {:.0} hPa", record.humidity, record.pressure),
        format!(
            "  Wind: {:.1} m/s  Clouds: {}%  Visibility: {} m",
            record.wind_speed, record.cloudiness, record.visibility
        ),
    ];
    if let (Some(rise), Some(set)) = (local_time(record.sunrise), local_time(record.sunset)) {
        lines.push(format!("  Sunrise: {rise}  Sunset: {set}"));
    }
    lines.push(format!(
        "  Observed: {}",
        record.observed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// `None` for the zero timestamp the parser uses when the provider omits one.
fn local_time(unix: i64) -> Option<String> {
    if unix == 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(unix, 0)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
}

#[cfg(test)]
pub(crate) fn sample_record() -> WeatherRecord {
    use chrono::TimeZone;

    WeatherRecord {
        id: 2643743,
        city: "London".into(),
        country: "GB".into(),
        latitude: 51.5,
        longitude: -0.12,
        temperature: 15.0,
        feels_like: 14.2,
        min_temperature: 13.9,
        max_temperature: 16.1,
        humidity: 72,
        pressure: 1012.0,
        wind_speed: 4.1,
        cloudiness: 20,
        visibility: 10000,
        description: "clear sky".into(),
        condition_main: "Clear".into(),
        icon_code: "01d".into(),
        sunrise: 0,
        sunset: 0,
        observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_location_and_measurements() {
        let text = render_record(&sample_record());

        assert!(text.starts_with("London, GB"));
        assert!(text.contains("clear sky (Clear)"));
        assert!(text.contains("Temperature: 15.0°C"));
        assert!(text.contains("Humidity: 72%"));
        assert!(!text.contains("Sunrise"));
    }

    #[test]
    fn renders_one_line_per_field_group() {
        let mut r = sample_record();
        r.sunrise = 1_714_536_000;
        r.sunset = 1_714_590_000;
        let text = render_record(&r);

        assert_eq!(text.lines().count(), 7);
        assert!(text.ends_with('\n'));
        assert!(text.lines().any(|l| l.starts_with("  Sunrise: ")));
        assert!(text.lines().last().unwrap().starts_with("  Observed: "));
    }

    #[test]
    fn omits_empty_country() {
        let mut r = sample_record();
        r.country.clear();

        assert!(render_record(&r).starts_with("London ("));
    }
}
