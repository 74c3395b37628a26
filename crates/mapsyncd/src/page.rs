//! Map page rendering
//!
//! The page is a static template with three placeholders, filled once at
//! startup from [`MapConfig`].

use mapsync_core::config::MapConfig;

const INDEX_TEMPLATE: &str = include_str!("../ui/index.html");

/// Fill the map page template
pub fn render_index(map: &MapConfig) -> String {
    let [lat, lng] = map.center;
    INDEX_TEMPLATE
        .replace("{{MAP_NAME}}", &escape_html(&map.name))
        .replace("{{MAP_CENTER}}", &format!("[{}, {}]", lat, lng))
        .replace("{{MAP_ZOOM}}", &map.zoom.to_string())
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
