//! Self-contained Leaflet page: boundaries, choropleth, heatmap,
//! category marker clusters and the district sidebar.

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use super::stats::{categories, ColorScale, DistrictCounts};
use crate::config::{Labels, MapConfig};
use crate::models::{GeoPoint, Record};
use crate::pip::District;

const LEAFLET_CSS: &str = "https://cdn.jsdelivr.net/npm/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://cdn.jsdelivr.net/npm/leaflet@1.9.4/dist/leaflet.js";
const CLUSTER_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet.markercluster/1.5.3/MarkerCluster.css";
const CLUSTER_DEFAULT_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet.markercluster/1.5.3/MarkerCluster.Default.css";
const CLUSTER_JS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/leaflet.markercluster/1.5.3/leaflet.markercluster.js";
const HEAT_JS: &str = "https://cdn.jsdelivr.net/gh/python-visualization/folium@main/folium/templates/leaflet_heat.min.js";
const JQUERY_JS: &str = "https://code.jquery.com/jquery-3.7.0.min.js";
const DATATABLES_CSS: &str = "https://cdn.datatables.net/1.13.7/css/jquery.dataTables.min.css";
const DATATABLES_JS: &str = "https://cdn.datatables.net/1.13.7/js/jquery.dataTables.min.js";

/// Marker payload embedded in the page
#[derive(Debug, Serialize)]
struct Marker {
    lat: f64,
    lon: f64,
    popup: String,
}

pub struct MapPage<'a> {
    records: &'a [Record],
    districts: Vec<&'a District>,
    center: GeoPoint,
    map: &'a MapConfig,
    labels: &'a Labels,
}

impl<'a> MapPage<'a> {
    pub fn new<I>(
        records: &'a [Record],
        districts: I,
        center: GeoPoint,
        map: &'a MapConfig,
        labels: &'a Labels,
    ) -> Self
    where
        I: IntoIterator<Item = &'a District>,
    {
        Self {
            records,
            districts: districts.into_iter().collect(),
            center,
            map,
            labels,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let html = self.render()?;
        std::fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Map written to {}", path.display());
        Ok(())
    }

    pub fn render(&self) -> Result<String> {
        let counts = DistrictCounts::from_records(self.records);
        let scale = ColorScale::linear(self.districts.iter().map(|d| counts.total(&d.name)));
        let categories = categories(self.records);
        let boundaries = self.boundaries(&counts, &scale);

        let data = json!({
            "center": [self.center.lat, self.center.lon],
            "zoom": self.map.zoom_start,
            "tiles": {
                "url": self.map.tiles_url,
                "attribution": self.map.tiles_attribution,
            },
            "boundaries": boundaries,
            "heat": self.heat_points(),
            "heatOptions": { "radius": self.map.heat_radius, "blur": self.map.heat_blur },
            "markers": self.markers(),
            "categories": categories,
            "counts": counts.by_category(),
            "labels": {
                "boundaries": self.labels.boundaries_layer,
                "density": self.labels.density_layer,
                "heat": self.labels.heat_layer,
            },
        });

        let mut html = String::with_capacity(64 * 1024);
        self.write_head(&mut html)?;
        html.push_str("<body>\n<div id=\"map\"></div>\n");
        self.write_sidebar(&mut html, &counts)?;
        self.write_legend(&mut html, &scale)?;

        writeln!(html, "<script>\nvar DATA = {};\n</script>", script_json(&data)?)?;
        writeln!(html, "<script>\n{}</script>", MAP_SCRIPT)?;
        writeln!(html, "<script>\n{}</script>", SIDEBAR_SCRIPT)?;
        html.push_str("</body>\n</html>\n");

        Ok(html)
    }

    fn write_head(&self, html: &mut String) -> Result<()> {
        writeln!(html, "<!DOCTYPE html>\n<html>\n<head>")?;
        writeln!(html, "<meta charset=\"utf-8\">")?;
        writeln!(
            html,
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">"
        )?;
        writeln!(html, "<title>{}</title>", escape_html(&self.labels.page_title))?;
        for css in [LEAFLET_CSS, CLUSTER_CSS, CLUSTER_DEFAULT_CSS, DATATABLES_CSS] {
            writeln!(html, "<link rel=\"stylesheet\" href=\"{}\">", css)?;
        }
        for js in [LEAFLET_JS, CLUSTER_JS, HEAT_JS, JQUERY_JS, DATATABLES_JS] {
            writeln!(html, "<script src=\"{}\"></script>", js)?;
        }
        writeln!(html, "<style>\n{}</style>", PAGE_STYLE)?;
        writeln!(html, "</head>")?;
        Ok(())
    }

    fn write_sidebar(&self, html: &mut String, counts: &DistrictCounts) -> Result<()> {
        let l = self.labels;
        writeln!(html, "<div id=\"sidebar\">")?;
        writeln!(
            html,
            "  <h4>{}<br><small>{}</small></h4>",
            escape_html(&l.sidebar_title),
            escape_html(&l.sidebar_subtitle)
        )?;
        writeln!(html, "  <table id=\"osTable\" class=\"display\">")?;
        writeln!(
            html,
            "    <thead><tr><th>{}</th><th>{}</th></tr></thead>",
            escape_html(&l.district_header),
            escape_html(&l.count_header)
        )?;
        html.push_str("    <tbody>");
        for (district, count) in counts.sorted_totals() {
            let name = escape_html(district);
            write!(
                html,
                "<tr data-os=\"{}\"><td>{}</td><td class=\"cnt\">{}</td></tr>",
                name, name, count
            )?;
        }
        html.push_str("</tbody>\n  </table>\n  <hr>\n");
        writeln!(html, "  <h4>{}</h4>", escape_html(&l.filter_title))?;
        writeln!(html, "  <div id=\"typeFilters\"></div>\n</div>")?;
        Ok(())
    }

    fn write_legend(&self, html: &mut String, scale: &ColorScale) -> Result<()> {
        writeln!(html, "<div id=\"legend\">")?;
        writeln!(html, "  <b>{}</b>", escape_html(&self.labels.legend_title))?;
        for (lo, hi, color) in scale.legend() {
            writeln!(
                html,
                "  <div><i style=\"background:{}\"></i>{:.1} &ndash; {:.1}</div>",
                color, lo, hi
            )?;
        }
        writeln!(html, "</div>")?;
        Ok(())
    }

    /// District polygons with name, count, fill colour and tooltip
    fn boundaries(&self, counts: &DistrictCounts, scale: &ColorScale) -> FeatureCollection {
        let features = self
            .districts
            .iter()
            .map(|district| {
                let count = counts.total(&district.name);
                let tooltip = format!(
                    "<b>{}:</b> {}<br><b>{}:</b> {}",
                    escape_html(&self.labels.district_header),
                    escape_html(&district.name),
                    escape_html(&self.labels.count_header),
                    count
                );

                let mut properties = district.properties.clone();
                properties.insert("district".to_string(), json!(district.name));
                properties.insert("count".to_string(), json!(count));
                properties.insert("color".to_string(), json!(scale.color(count)));
                properties.insert("tooltip".to_string(), json!(tooltip));

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(geojson::Value::from(&district.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    fn heat_points(&self) -> Vec<[f64; 2]> {
        self.records
            .iter()
            .filter_map(|r| r.location)
            .map(|p| [p.lat, p.lon])
            .collect()
    }

    /// category → markers; uncategorised records only feed the heatmap
    fn markers(&self) -> BTreeMap<String, Vec<Marker>> {
        let mut by_category: BTreeMap<String, Vec<Marker>> = BTreeMap::new();

        for record in self.records {
            let (category, location) = match (&record.category, record.location) {
                (Some(c), Some(p)) => (c, p),
                _ => continue,
            };

            let field = |v: &Option<String>| escape_html(v.as_deref().unwrap_or(""));
            let popup = format!(
                "<b>{}</b><br>{}<br>{}<br><i>{}</i>",
                field(&record.name),
                field(&record.address),
                escape_html(category),
                field(&record.district)
            );

            by_category.entry(category.clone()).or_default().push(Marker {
                lat: location.lat,
                lon: location.lon,
                popup,
            });
        }

        by_category
    }
}

/// Escape text for HTML element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// JSON safe to embed inside a `<script>` element
fn script_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

const PAGE_STYLE: &str = r#"html, body { width: 100%; height: 100%; margin: 0; padding: 0; }
#map { position: absolute; top: 0; bottom: 0; right: 0; left: 0; }
#sidebar { position: fixed; top: 70px; left: 10px; width: 280px; max-height: 80vh; overflow: auto;
  z-index: 999999; background: white; border-radius: 8px; padding: 10px 14px;
  box-shadow: 0 0 15px rgba(0,0,0,.2); font-size: 14px; }
#sidebar h4 { margin: 0 0 6px 0; }
#osTable { width: 100%; }
#osTable td.cnt { text-align: right; }
#osTable tbody tr { cursor: pointer; }
#legend { position: fixed; bottom: 30px; right: 10px; z-index: 999999; background: white;
  border-radius: 6px; padding: 6px 10px; font-size: 12px; box-shadow: 0 0 10px rgba(0,0,0,.2); }
#legend i { display: inline-block; width: 14px; height: 14px; margin-right: 6px; vertical-align: middle; opacity: 0.8; }
"#;

const MAP_SCRIPT: &str = r#"var map = L.map('map').setView(DATA.center, DATA.zoom);
var baseLayer = L.tileLayer(DATA.tiles.url, {
  attribution: DATA.tiles.attribution, subdomains: 'abcd', maxZoom: 20
}).addTo(map);

var choropleth = L.geoJson(DATA.boundaries, {
  style: function (f) {
    return { fillColor: f.properties.color, fillOpacity: 0.6, color: 'black', weight: 1, opacity: 0.4 };
  },
  interactive: false
}).addTo(map);

var geojson = L.geoJson(DATA.boundaries, {
  style: function () { return { fillOpacity: 0, weight: 1, color: 'black' }; },
  onEachFeature: function (f, layer) { layer.bindTooltip(f.properties.tooltip, { sticky: true }); }
}).addTo(map);

var heat = L.heatLayer(DATA.heat, DATA.heatOptions).addTo(map);

var catLayers = {};
DATA.categories.forEach(function (c) {
  var group = L.markerClusterGroup();
  (DATA.markers[c] || []).forEach(function (m) {
    L.marker([m.lat, m.lon]).bindPopup(m.popup).addTo(group);
  });
  group.addTo(map);
  catLayers[c] = group;
});

var overlays = {};
overlays[DATA.labels.boundaries] = geojson;
overlays[DATA.labels.density] = choropleth;
overlays[DATA.labels.heat] = heat;
DATA.categories.forEach(function (c) { overlays[c] = catLayers[c]; });
L.control.layers({ 'CartoDB positron': baseLayer }, overlays).addTo(map);
"#;

const SIDEBAR_SCRIPT: &str = r#"$(function () {
  var table = $('#osTable').DataTable({ paging: false, info: false, order: [[1, 'desc']] });

  var osLayers = {};
  geojson.eachLayer(function (l) { osLayers[l.feature.properties.district] = l; });

  $('#osTable tbody').on('click', 'tr', function () {
    var layer = osLayers[$(this).attr('data-os')];
    if (layer) {
      map.fitBounds(layer.getBounds());
      layer.setStyle({ weight: 3, color: '#000' });
      setTimeout(function () { geojson.resetStyle(layer); }, 1500);
    }
  });

  DATA.categories.forEach(function (c) {
    var box = $('<input type="checkbox" class="cat-filter" checked>').val(c);
    $('#typeFilters').append($('<div>').append($('<label>').append(box, document.createTextNode(' ' + c))));
  });

  var selectedCats = new Set(DATA.categories);

  function updateCounts() {
    $('#osTable tbody tr').each(function () {
      var byCat = DATA.counts[$(this).attr('data-os')] || {};
      var total = 0;
      selectedCats.forEach(function (c) { total += byCat[c] || 0; });
      $('td.cnt', this).text(total);
    });
    table.rows().invalidate('dom').order([[1, 'desc']]).draw(false);
  }

  $('.cat-filter').on('change', function () {
    var cat = $(this).val();
    if (this.checked) selectedCats.add(cat); else selectedCats.delete(cat);
    if (catLayers[cat]) {
      if (this.checked) map.addLayer(catLayers[cat]); else map.removeLayer(catLayers[cat]);
    }
    updateCounts();
  });
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn district(id: usize, name: &str, x0: f64) -> District {
        let p = polygon![
            (x: x0, y: 51.0),
            (x: x0 + 1.0, y: 51.0),
            (x: x0 + 1.0, y: 52.0),
            (x: x0, y: 52.0),
            (x: x0, y: 51.0),
        ];
        District {
            id,
            name: name.to_string(),
            properties: Default::default(),
            geometry: MultiPolygon::new(vec![p]),
        }
    }

    fn record(name: &str, category: &str, district: Option<&str>) -> Record {
        Record {
            address: Some(format!("{} 1", name)),
            category: Some(category.to_string()),
            name: Some(name.to_string()),
            location: Some(GeoPoint::new(51.5, 19.5)),
            district: district.map(String::from),
        }
    }

    fn render(records: &[Record], districts: &[District]) -> String {
        let map = MapConfig::default();
        let labels = Labels::default();
        MapPage::new(records, districts, GeoPoint::new(51.5, 19.5), &map, &labels)
            .render()
            .unwrap()
    }

    #[test]
    fn test_sidebar_sorted_by_count() {
        let districts = vec![district(0, "Bałuty", 19.0), district(1, "Widzew", 20.0)];
        let records = vec![
            record("A", "sklep", Some("Widzew")),
            record("B", "bar", Some("Bałuty")),
            record("C", "sklep", Some("Widzew")),
            record("D", "bar", None),
        ];

        let html = render(&records, &districts);
        let widzew = html.find("<tr data-os=\"Widzew\">").unwrap();
        let baluty = html.find("<tr data-os=\"Bałuty\">").unwrap();
        assert!(widzew < baluty);
        assert!(html.contains("<td class=\"cnt\">2</td>"));
        assert!(html.contains("\"counts\":{\"Bałuty\":{\"bar\":1},\"Widzew\":{\"sklep\":2}}"));
        assert!(html.contains("\"categories\":[\"bar\",\"sklep\"]"));
    }

    #[test]
    fn test_escapes_untrusted_text() {
        let districts = vec![district(0, "Stare <Polesie>", 19.0)];
        let records = vec![record("</script><b>x", "sklep", Some("Stare <Polesie>"))];

        let html = render(&records, &districts);
        assert!(html.contains("<tr data-os=\"Stare &lt;Polesie&gt;\">"));
        assert!(!html.contains("</script><b>x"));
        assert!(html.contains("&lt;/script&gt;&lt;b&gt;x"));
    }

    #[test]
    fn test_empty_map_still_renders() {
        let html = render(&[], &[]);
        assert!(html.contains("var DATA = "));
        assert!(html.contains("<tbody></tbody>"));
        assert!(html.contains("\"heat\":[]"));
    }

    #[test]
    fn test_legend_edges_keep_a_decimal() {
        let districts = vec![district(0, "Bałuty", 19.0), district(1, "Widzew", 20.0)];
        let records = vec![
            record("A", "sklep", Some("Widzew")),
            record("B", "bar", Some("Bałuty")),
            record("C", "sklep", Some("Widzew")),
        ];

        let html = render(&records, &districts);
        assert!(html.contains("</i>1.0 &ndash; 1.2</div>"));
        assert!(html.contains("</i>1.8 &ndash; 2.0</div>"));
        assert!(!html.contains("</i>1 &ndash; 1</div>"));
    }

    #[test]
    fn test_boundaries_carry_source_properties() {
        let mut baluty = district(0, "Bałuty", 19.0);
        baluty
            .properties
            .insert("kod".to_string(), serde_json::Value::from("BA"));
        baluty
            .properties
            .insert("count".to_string(), serde_json::Value::from("stale"));
        let records = vec![record("A", "sklep", Some("Bałuty"))];

        let html = render(&records, &[baluty]);
        assert!(html.contains("\"kod\":\"BA\""));
        assert!(html.contains("\"count\":1"));
        assert!(!html.contains("stale"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a & 'b' \"c\""), "a &amp; &#39;b&#39; &quot;c&quot;");
    }
}
