/// Test fixtures: representative raw payloads from the upstream feeds.
///
/// They deliberately mix the shapes the normalizers must absorb: enveloped
/// and bare payloads, numeric strings, and offline-gauge sentinels.

/// Warning feed wrapped in a `{success, data}` envelope.
/// Two severe warnings and one advisory.
pub(crate) fn fixture_warnings_json() -> &'static str {
    r#"{
      "success": true,
      "data": [
        { "title": "Heavy Rain Warning", "issued": "2024-06-01T09:00:00Z" },
        { "title": "Flood Warning", "issued": "2024-06-01T09:05:00Z" },
        { "title": "Thunderstorm Advisory", "issued": "2024-06-01T08:40:00Z" }
      ]
    }"#
}

/// Nowcast with every value encoded as a string.
pub(crate) fn fixture_nowcast_json() -> &'static str {
    r#"{
      "success": true,
      "data": { "rainfall1h": "32.5", "rainfall24h": "120", "windSpeed": "11.2" }
    }"#
}

/// River-stage feed: one gauge above caution, one normal, one offline.
pub(crate) fn fixture_water_levels_json() -> &'static str {
    r#"[
      { "stationName": "Illinois River at Kingston Mines, IL", "waterLevel": 17.2 },
      { "stationName": "Illinois River at Henry, IL", "waterLevel": "9.8" },
      { "stationName": "Illinois River at Marseilles, IL", "waterLevel": "--" }
    ]"#
}

/// Advisory bulletins as a mix of bare strings and objects.
pub(crate) fn fixture_advisories_json() -> &'static str {
    r#"{
      "data": [
        "Heavy rain continues over the basin. Flood conditions possible along the river.",
        { "text": "Risk of landslide on saturated slopes; prepare for evacuation." }
      ]
    }"#
}
