//! Text rendering of weather data and the WMO weather-code table.

use std::fmt::{self, Write};

use super::{Location, WeatherReport};

/// Human-readable description of a WMO weather interpretation code.
#[must_use]
pub fn describe_weather_code(code: i32) -> String {
    let text = match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        other => return format!("Unknown ({other})"),
    };
    text.to_string()
}

/// Numbered list of geocoding matches.
#[must_use]
pub fn format_locations(locations: &[Location]) -> String {
    if locations.is_empty() {
        return "No locations found".to_string();
    }
    let mut out = String::new();
    // writes into a String are infallible
    let _ = write_locations(&mut out, locations);
    out
}

fn write_locations(out: &mut String, locations: &[Location]) -> fmt::Result {
    writeln!(out, "Found {} location(s):\n", locations.len())?;

    for (i, loc) in locations.iter().enumerate() {
        write!(out, "{}. {}", i + 1, loc.name)?;
        if let Some(country) = &loc.country {
            write!(out, ", {country}")?;
            if let Some(code) = &loc.country_code {
                write!(out, " ({code})")?;
            }
        }
        if let Some(admin1) = &loc.admin1 {
            write!(out, " - {admin1}")?;
        }
        writeln!(out)?;

        if let (Some(lat), Some(lon)) = (loc.latitude, loc.longitude) {
            writeln!(out, "   Coordinates: {lat:.4}, {lon:.4}")?;
        }
        if let Some(tz) = &loc.timezone {
            writeln!(out, "   Timezone: {tz}")?;
        }
        if let Some(elevation) = loc.elevation {
            writeln!(out, "   Elevation: {elevation}m")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Current conditions block. Expects `report.current` to be present.
#[must_use]
pub fn format_current(report: &WeatherReport) -> String {
    let mut out = String::new();
    let _ = write_current(&mut out, report);
    out
}

fn write_current(out: &mut String, report: &WeatherReport) -> fmt::Result {
    writeln!(out, "Current Weather")?;
    writeln!(out, "═══════════════\n")?;
    write_header(out, report)?;
    if let Some(tz) = &report.timezone {
        writeln!(out, "Timezone: {tz}")?;
    }

    let Some(current) = &report.current else {
        return Ok(());
    };
    if let Some(time) = &current.time {
        writeln!(out, "Time: {time}")?;
    }
    writeln!(out)?;

    if let Some(t) = current.temperature_2m {
        write!(out, "Temperature: {t:.1}°C")?;
        if let Some(feels) = current.apparent_temperature {
            write!(out, " (feels like {feels:.1}°C)")?;
        }
        writeln!(out)?;
    }
    if let Some(code) = current.weather_code {
        writeln!(out, "Conditions: {}", describe_weather_code(code))?;
    }
    if let Some(h) = current.relative_humidity_2m {
        writeln!(out, "Humidity: {h}%")?;
    }
    if let Some(p) = current.precipitation {
        writeln!(out, "Precipitation: {p} mm")?;
    }
    if let Some(speed) = current.wind_speed_10m {
        write!(out, "Wind: {speed:.1} km/h")?;
        if let Some(dir) = current.wind_direction_10m {
            write!(out, " from {dir}°")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Daily forecast block. Expects `report.daily` to be present.
#[must_use]
pub fn format_forecast(report: &WeatherReport) -> String {
    let mut out = String::new();
    let _ = write_forecast(&mut out, report);
    out
}

fn write_forecast(out: &mut String, report: &WeatherReport) -> fmt::Result {
    let Some(daily) = &report.daily else {
        return Ok(());
    };
    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    writeln!(out, "{}-Day Weather Forecast", daily.time.len())?;
    writeln!(out, "═══════════════════════\n")?;
    write_header(out, report)?;
    writeln!(out)?;

    for (i, day) in daily.time.iter().enumerate() {
        writeln!(out, "{day}:")?;
        if let Some(code) = daily.weather_code.get(i).copied().flatten() {
            writeln!(out, "  Conditions: {}", describe_weather_code(code))?;
        }
        if let (Some(min), Some(max)) = (at(&daily.temperature_2m_min, i), at(&daily.temperature_2m_max, i)) {
            writeln!(out, "  Temperature: {min:.1}°C to {max:.1}°C")?;
        }
        if let Some(p) = at(&daily.precipitation_sum, i) {
            writeln!(out, "  Precipitation: {p:.1} mm")?;
        }
        if let Some(w) = at(&daily.wind_speed_10m_max, i) {
            writeln!(out, "  Max Wind: {w:.1} km/h")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_header(out: &mut String, report: &WeatherReport) -> fmt::Result {
    if let (Some(lat), Some(lon)) = (report.latitude, report.longitude) {
        writeln!(out, "Location: {lat:.4}, {lon:.4}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::weather::{CurrentWeather, DailyWeather};

    #[test]
    fn test_weather_codes() {
        assert_eq!(describe_weather_code(0), "Clear sky");
        assert_eq!(describe_weather_code(48), "Depositing rime fog");
        assert_eq!(describe_weather_code(82), "Violent rain showers");
        assert_eq!(describe_weather_code(99), "Thunderstorm with heavy hail");
        assert_eq!(describe_weather_code(42), "Unknown (42)");
    }

    #[test]
    fn test_format_locations() {
        assert_eq!(format_locations(&[]), "No locations found");

        let berlin = Location {
            name: "Berlin".into(),
            latitude: Some(52.52437),
            longitude: Some(13.41053),
            country: Some("Germany".into()),
            country_code: Some("DE".into()),
            admin1: Some("Land Berlin".into()),
            timezone: Some("Europe/Berlin".into()),
            elevation: Some(74.0),
            ..Location::default()
        };
        let text = format_locations(&[berlin]);
        assert!(text.starts_with("Found 1 location(s):\n\n1. Berlin, Germany (DE) - Land Berlin\n"));
        assert!(text.contains("   Coordinates: 52.5244, 13.4105\n"));
        assert!(text.contains("   Timezone: Europe/Berlin\n"));
        assert!(text.contains("   Elevation: 74m\n"));
    }

    #[test]
    fn test_format_current() {
        let report = WeatherReport {
            latitude: Some(52.52),
            longitude: Some(13.41),
            timezone: Some("Europe/Berlin".into()),
            current: Some(CurrentWeather {
                time: Some("2024-05-01T12:00".into()),
                temperature_2m: Some(18.04),
                apparent_temperature: Some(16.5),
                relative_humidity_2m: Some(40.0),
                precipitation: Some(0.0),
                weather_code: Some(2),
                wind_speed_10m: Some(11.3),
                wind_direction_10m: Some(270.0),
            }),
            daily: None,
        };
        let text = format_current(&report);
        assert!(text.starts_with("Current Weather\n"));
        assert!(text.contains("Location: 52.5200, 13.4100\n"));
        assert!(text.contains("Temperature: 18.0°C (feels like 16.5°C)\n"));
        assert!(text.contains("Conditions: Partly cloudy\n"));
        assert!(text.contains("Humidity: 40%\n"));
        assert!(text.contains("Wind: 11.3 km/h from 270°\n"));
    }

    #[test]
    fn test_format_forecast() {
        let report = WeatherReport {
            latitude: Some(1.0),
            longitude: Some(2.0),
            daily: Some(DailyWeather {
                time: vec!["2024-05-01".into(), "2024-05-02".into()],
                temperature_2m_max: vec![Some(20.0), Some(22.5)],
                temperature_2m_min: vec![Some(10.0), None],
                precipitation_sum: vec![Some(0.4), Some(1.0)],
                weather_code: vec![Some(61), Some(0)],
                wind_speed_10m_max: vec![],
            }),
            ..WeatherReport::default()
        };
        let text = format_forecast(&report);
        assert!(text.starts_with("2-Day Weather Forecast\n"));
        assert!(text.contains("2024-05-01:\n  Conditions: Slight rain\n  Temperature: 10.0°C to 20.0°C\n  Precipitation: 0.4 mm\n"));
        assert!(text.contains("2024-05-02:\n  Conditions: Clear sky\n  Precipitation: 1.0 mm\n"));
        assert!(!text.contains("Max Wind"));
    }
}
