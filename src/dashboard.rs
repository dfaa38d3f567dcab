//! Plain-text rendering of the weather dashboard
//!
//! Missing values render as `--` so a partial payload still produces a full view.

use std::fmt;

use crate::data::Dashboard;

/// Placeholder for values the provider did not report
const PLACEHOLDER: &str = "--";

fn or_placeholder<T: fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn one_decimal(value: Option<f64>) -> String {
    or_placeholder(value.map(|v| format!("{:.1}", v)))
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.as_ref();
        let title = current.map(|c| c.city.as_str()).unwrap_or(&self.city);
        writeln!(f, "{}", title)?;

        writeln!(
            f,
            "  Temperature:   {} °C",
            one_decimal(current.and_then(|c| c.temperature))
        )?;
        writeln!(
            f,
            "  Humidity:      {} %",
            or_placeholder(current.and_then(|c| c.humidity))
        )?;
        writeln!(
            f,
            "  Conditions:    {}",
            or_placeholder(current.and_then(|c| c.description.as_deref()))
        )?;
        writeln!(
            f,
            "  Wind:          {} m/s",
            one_decimal(current.and_then(|c| c.wind_speed))
        )?;
        writeln!(
            f,
            "  Precipitation: {} mm",
            one_decimal(current.map(|c| c.precipitation))
        )?;
        writeln!(f, "  UV index:      {}", one_decimal(self.uv_index))?;
        writeln!(f, "  Air quality:   {}", or_placeholder(self.air_quality))?;

        if !self.forecast.is_empty() {
            writeln!(f, "Forecast")?;
            for day in &self.forecast {
                writeln!(
                    f,
                    "  {}  {:>5} °C  {}",
                    day.date.format("%a %d %b"),
                    or_placeholder(day.temperature.map(|t| t.round() as i64)),
                    or_placeholder(day.description.as_deref())
                )?;
            }
        }

        for error in &self.errors {
            writeln!(f, "! {}", error)?;
        }
        Ok(())
    }
}
