use districtmap::config::Config;
use districtmap::pip::{load_districts, points_centroid, DistrictIndex, PipService};
use districtmap::render::MapPage;
use districtmap::sheet::read_records;
use tempfile::TempDir;

const DISTRICTS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {"name": "Bałuty"},
      "geometry": {"type": "Polygon", "coordinates": [[[19.40,51.78],[19.50,51.78],[19.50,51.85],[19.40,51.85],[19.40,51.78]]]}
    },
    {
      "type": "Feature",
      "properties": {"name": "Śródmieście"},
      "geometry": {"type": "Polygon", "coordinates": [[[19.40,51.74],[19.50,51.74],[19.50,51.78],[19.40,51.78],[19.40,51.74]]]}
    },
    {
      "type": "Feature",
      "properties": {"name": "Widzew"},
      "geometry": {"type": "Polygon", "coordinates": [[[19.50,51.74],[19.60,51.74],[19.60,51.80],[19.50,51.80],[19.50,51.74]]]}
    }
  ]
}"#;

const SHEET: &str = "\
Nazwa punktu,Adres punktu,Rodzaj,lat,lon
Sklep A,Zgierska 5,sklep,51.80,19.45
Bar B,Piotrkowska 12,bar,51.76,19.45
Sklep C,Piotrkowska 30,sklep,51.75,19.46
Kiosk D,Daleka 1,kiosk,52.50,21.00
Bez E,Brak 2,sklep,,
";

#[test]
fn test_sheet_with_coordinates_to_map() {
    let dir = TempDir::new().unwrap();
    let sheet_path = dir.path().join("lista.csv");
    let districts_path = dir.path().join("osiedla.geojson");
    let out_path = dir.path().join("mapa.html");
    std::fs::write(&sheet_path, SHEET).unwrap();
    std::fs::write(&districts_path, DISTRICTS).unwrap();

    let config = Config::default();
    let sheet = read_records(&sheet_path, &config.input).unwrap();
    assert!(sheet.has_coordinates);
    assert_eq!(sheet.records.len(), 5);

    let pip = PipService::new(DistrictIndex::build(
        load_districts(&districts_path, "name").unwrap(),
    ));
    let points = pip.join(sheet.records);

    // Row without coordinates is dropped, the one outside the city is kept
    assert_eq!(points.len(), 4);
    let districts: Vec<Option<&str>> = points.iter().map(|p| p.district.as_deref()).collect();
    assert_eq!(
        districts,
        vec![Some("Bałuty"), Some("Śródmieście"), Some("Śródmieście"), None]
    );

    let center = points_centroid(&points).unwrap();
    assert!((center.lon - 19.84).abs() < 1e-9);

    MapPage::new(
        &points,
        pip.index().districts().map(|d| d.as_ref()),
        center,
        &config.map,
        &config.labels,
    )
    .write(&out_path)
    .unwrap();

    let html = std::fs::read_to_string(&out_path).unwrap();
    let srodmiescie = html.find("<tr data-os=\"Śródmieście\">").unwrap();
    let baluty = html.find("<tr data-os=\"Bałuty\">").unwrap();
    assert!(srodmiescie < baluty);
    // Districts without points are drawn but not listed
    assert!(!html.contains("<tr data-os=\"Widzew\">"));
    assert!(html.contains("\"district\":\"Widzew\""));
    assert!(html.contains("\"categories\":[\"bar\",\"kiosk\",\"sklep\"]"));
    assert!(html.contains("L.heatLayer"));
}
