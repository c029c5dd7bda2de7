//! Builds the map artifact: one clustered circle marker per school, colored by presence.
//! The HTML page uses Leaflet with the markercluster plugin; cluster bubbles are
//! colored in the browser from the `hasSpace` flag of their child markers.

use serde::Serialize;

use crate::data::catalog::Location;
use crate::data::category::Category;
use crate::data::store::{Record, RecordStore};

/// Centroid of Bavaria.
pub const MAP_CENTER: [f64; 2] = [48.97, 11.5];
pub const DEFAULT_ZOOM: u8 = 7;
pub const MARKER_RADIUS: u8 = 6;
pub const POPUP_MAX_WIDTH: u16 = 300;

const NO_SPACE_NOTICE: &str = "Kein Makerspace eingetragen.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Green,
    Red,
}

impl MarkerColor {
    pub fn for_presence(has_space: bool) -> Self {
        if has_space {
            Self::Green
        } else {
            Self::Red
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Red => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub name: String,
    pub category: Category,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "hasSpace")]
    pub has_space: bool,
    pub color: MarkerColor,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapArtifact {
    pub center: [f64; 2],
    pub zoom: u8,
    pub markers: Vec<Marker>,
    pub html: String,
}

impl MapArtifact {
    pub fn marker(&self, name: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.name == name)
    }
}

/// Bubble color of a cluster: green as soon as one child has a makerspace.
/// Mirrors the `iconCreateFunction` shipped in the page.
pub fn cluster_color<'a>(markers: impl IntoIterator<Item = &'a Marker>) -> MarkerColor {
    MarkerColor::for_presence(markers.into_iter().any(|m| m.has_space))
}

pub fn render_map(locations: &[Location], store: &RecordStore) -> MapArtifact {
    let empty = Record::default();
    let markers: Vec<Marker> = locations
        .iter()
        .map(|location| {
            let record = store.get(&location.name).unwrap_or(&empty);
            build_marker(location, record)
        })
        .collect();
    let html = page_html(&markers);
    tracing::debug!(markers = markers.len(), "rendered map");
    MapArtifact {
        center: MAP_CENTER,
        zoom: DEFAULT_ZOOM,
        markers,
        html,
    }
}

fn build_marker(location: &Location, record: &Record) -> Marker {
    let has_space = record.has_space();
    Marker {
        name: location.name.clone(),
        category: location.category,
        lat: location.lat,
        lon: location.lon,
        has_space,
        color: MarkerColor::for_presence(has_space),
        popup: popup_html(location, record),
    }
}

fn popup_html(location: &Location, record: &Record) -> String {
    let mut parts = vec![
        format!("<b>{}</b>", escape_html(&location.name)),
        format!("<br><i>{}</i>", location.category.label()),
    ];
    if !record.has_space() {
        parts.push(format!("<br><i>{NO_SPACE_NOTICE}</i>"));
        return parts.concat();
    }
    if !record.contact.is_empty() {
        parts.push(format!("<br><b>Kontakt:</b> {}", escape_html(&record.contact)));
    }
    if !record.email.is_empty() {
        let email = escape_html(&record.email);
        parts.push(format!("<br><b>Email:</b> <a href='mailto:{email}'>{email}</a>"));
    }
    if !record.website.is_empty() {
        let website = escape_html(&record.website);
        if is_web_link(&record.website) {
            parts.push(format!(
                "<br><b>Web:</b> <a href='{website}' target='_blank'>{website}</a>"
            ));
        } else {
            parts.push(format!("<br><b>Web:</b> {website}"));
        }
    }
    let tools = if record.tools.is_empty() {
        "–".to_string()
    } else {
        escape_html(&record.tools.join(", "))
    };
    parts.push(format!(
        "<hr style='margin:4px 0;'><i>{}</i><br>Werkzeuge: {tools}",
        escape_html(&record.space_name)
    ));
    parts.concat()
}

/// Only plain `http(s)://` addresses become clickable.
fn is_web_link(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Serialize)]
struct JsMarker<'a> {
    lat: f64,
    lon: f64,
    color: &'static str,
    #[serde(rename = "hasSpace")]
    has_space: bool,
    popup: &'a str,
}

fn page_html(markers: &[Marker]) -> String {
    let js_markers: Vec<JsMarker<'_>> = markers
        .iter()
        .map(|m| JsMarker {
            lat: m.lat,
            lon: m.lon,
            color: m.color.as_str(),
            has_space: m.has_space,
            popup: &m.popup,
        })
        .collect();
    let markers_json = serde_json::to_string(&js_markers)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/");

    PAGE_TEMPLATE
        .replace("__CENTER__", &format!("[{}, {}]", MAP_CENTER[0], MAP_CENTER[1]))
        .replace("__ZOOM__", &DEFAULT_ZOOM.to_string())
        .replace("__RADIUS__", &MARKER_RADIUS.to_string())
        .replace("__POPUP_WIDTH__", &POPUP_MAX_WIDTH.to_string())
        .replace("__MARKERS__", &markers_json)
}

const PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="de">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet.fullscreen@3.0.2/Control.FullScreen.css" />
  <link rel="stylesheet" href="https://unpkg.com/leaflet.locatecontrol@0.81.0/dist/L.Control.Locate.min.css" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <script src="https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"></script>
  <script src="https://unpkg.com/leaflet.fullscreen@3.0.2/Control.FullScreen.js"></script>
  <script src="https://unpkg.com/leaflet.locatecontrol@0.81.0/dist/L.Control.Locate.min.js"></script>
  <style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
  <div id="map"></div>
  <script>
    const MARKERS = __MARKERS__;
    const map = L.map('map').setView(__CENTER__, __ZOOM__);
    L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
      maxZoom: 19,
      attribution: '&copy; OpenStreetMap contributors'
    }).addTo(map);

    const cluster = L.markerClusterGroup({
      showCoverageOnHover: false,
      chunkedLoading: true,
      iconCreateFunction: function (cluster) {
        const has = cluster.getAllChildMarkers().some(m => m.options.hasSpace);
        const color = has ? 'green' : 'red';
        const count = cluster.getChildCount();
        return L.divIcon({html: `<div style='background:${color};border-radius:50%;width:32px;height:32px;display:flex;align-items:center;justify-content:center;color:white;font-weight:bold;'>${count}</div>`});
      }
    });

    const layers = MARKERS.map(m => L.circleMarker([m.lat, m.lon], {
      radius: __RADIUS__,
      color: m.color,
      fill: true,
      fillColor: m.color,
      fillOpacity: 0.9,
      hasSpace: m.hasSpace
    }).bindPopup(m.popup, {maxWidth: __POPUP_WIDTH__}));
    cluster.addLayers(layers);
    map.addLayer(cluster);

    L.control.fullscreen().addTo(map);
    L.control.locate().addTo(map);
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn loc(name: &str, category: Category) -> Location {
        Location {
            name: name.to_string(),
            lat: 48.1,
            lon: 11.6,
            category,
        }
    }

    fn store_with(entries: &str) -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("spaces.json");
        fs::write(&path, entries).expect("write");
        let store = RecordStore::load(&path, Vec::<String>::new()).expect("load");
        (dir, store)
    }

    #[test]
    fn markers_are_colored_by_presence() {
        let (_dir, store) = store_with(r#"{"A":{"space_name":"Werkstatt"},"B":{}}"#);
        let artifact = render_map(
            &[loc("A", Category::Gymnasium), loc("B", Category::Gymnasium)],
            &store,
        );
        assert_eq!(artifact.marker("A").map(|m| m.color), Some(MarkerColor::Green));
        assert_eq!(artifact.marker("B").map(|m| m.color), Some(MarkerColor::Red));
        assert_eq!(cluster_color(&artifact.markers), MarkerColor::Green);
        assert_eq!(cluster_color(artifact.marker("B")), MarkerColor::Red);
        assert_eq!(artifact.center, MAP_CENTER);
        assert_eq!(artifact.zoom, DEFAULT_ZOOM);
    }

    #[test]
    fn popup_lists_details_only_with_presence() {
        let (_dir, store) = store_with(
            r#"{
                "A":{"space_name":"FabLab","tools":["Laser","3D-Drucker"],"contact":"Frau M.","email":"m@example.org","website":"https://fablab.example"},
                "B":{"contact":"ignored"},
                "C":{"space_name":"Keller"}
            }"#,
        );
        let artifact = render_map(
            &[
                loc("A", Category::Realschule),
                loc("B", Category::Realschule),
                loc("C", Category::Realschule),
            ],
            &store,
        );

        let a = &artifact.markers[0].popup;
        assert!(a.contains("<b>A</b>"));
        assert!(a.contains("<i>Realschule</i>"));
        assert!(a.contains("<a href='mailto:m@example.org'>m@example.org</a>"));
        assert!(a.contains("target='_blank'"));
        assert!(a.contains("Werkzeuge: Laser, 3D-Drucker"));

        let b = &artifact.markers[1].popup;
        assert!(b.contains(NO_SPACE_NOTICE));
        assert!(!b.contains("ignored"));

        let c = &artifact.markers[2].popup;
        assert!(c.contains("Werkzeuge: –"));
        assert!(!c.contains("Kontakt"));
    }

    #[test]
    fn page_carries_cluster_rule_and_escapes_text() {
        let (_dir, store) = store_with(r#"{"<script>":{"space_name":"</script>"}}"#);
        let artifact = render_map(&[loc("<script>", Category::Sonstige)], &store);
        assert!(artifact.html.contains("showCoverageOnHover: false"));
        assert!(artifact.html.contains("m.options.hasSpace"));
        assert!(artifact.html.contains("\"hasSpace\":true"));
        assert!(!artifact.html.contains("<b><script>"));
        assert!(!artifact.html.contains("</script>\""));
    }

    #[test]
    fn only_http_websites_become_links() {
        let (_dir, store) = store_with(
            r#"{
                "A":{"space_name":"FabLab","website":"javascript:alert(1)"},
                "B":{"space_name":"Keller","website":"HTTP://keller.example"},
                "C":{"space_name":"Werkraum","website":"www.werkraum.example"}
            }"#,
        );
        let artifact = render_map(
            &[
                loc("A", Category::Gymnasium),
                loc("B", Category::Gymnasium),
                loc("C", Category::Gymnasium),
            ],
            &store,
        );

        let a = &artifact.markers[0].popup;
        assert!(!a.contains("href='javascript"));
        assert!(a.contains("<b>Web:</b> javascript:alert(1)"));
        assert!(artifact.markers[1]
            .popup
            .contains("<a href='HTTP://keller.example' target='_blank'>"));
        assert!(!artifact.markers[2].popup.contains("<a href"));
    }

    #[test]
    fn missing_record_renders_red() {
        let (_dir, store) = store_with("{}");
        let artifact = render_map(&[loc("Unbekannt", Category::Sonstige)], &store);
        assert_eq!(artifact.markers[0].color, MarkerColor::Red);
    }
}
