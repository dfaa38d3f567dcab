//! Cities offered by the dashboard

/// City selected when none is given
pub const DEFAULT_CITY: &str = "Sint-Pieters-Leeuw, BE";

/// Static list of selectable cities, unsorted
const CITIES: &[&str] = &[
    "Belgrade",
    "Knokke, BE",
    "Paris",
    "London",
    "Berlin",
    "Madrid",
    "Rome",
    "Vienna",
    "Athens",
    "Budapest",
    "Prague",
    "Warsaw",
    "Dublin",
    "Brussels",
    "Amsterdam",
    "Lisbon",
    "Zurich",
    "Stockholm",
    "Oslo",
    "Copenhagen",
    "Helsinki",
    "Sofia",
    "Bucharest",
    "Ljubljana",
    "Zagreb",
    "Podgorica",
    "Sarajevo",
    "Skopje",
    "Tirana",
    "Sint-Pieters-Leeuw, BE",
    "Šabac, RS",
];

/// Returns all selectable cities in alphabetical order
pub fn all_cities() -> Vec<&'static str> {
    let mut cities = CITIES.to_vec();
    cities.sort_unstable();
    cities
}

/// Looks a city up by name, ignoring case
///
/// # Returns
/// * `Some(&str)` - The canonical spelling from the city list
/// * `None` - If the city is not offered
pub fn find_city(name: &str) -> Option<&'static str> {
    let wanted = name.trim().to_lowercase();
    CITIES.iter().copied().find(|city| city.to_lowercase() == wanted)
}
