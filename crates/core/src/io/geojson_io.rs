//! GeoJSON reading/writing for feature collections
//!
//! A bare Feature or Geometry document is read as a one-feature collection.
//! Features with a null geometry are kept.

use crate::error::{Error, Result};
use crate::vector::{AttributeValue, Feature, FeatureCollection, FeatureId};
use geojson::{feature::Id, GeoJson, JsonObject};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Read a GeoJSON file into a FeatureCollection
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    read_geojson_from_str(&text)
}

/// Parse a GeoJSON document held in memory
pub fn read_geojson_from_str(text: &str) -> Result<FeatureCollection> {
    let document: GeoJson = text.parse()?;

    match document {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().map(from_geojson).collect(),
        GeoJson::Feature(f) => Ok(std::iter::once(from_geojson(f)?).collect()),
        GeoJson::Geometry(g) => {
            let geometry = geo_types::Geometry::<f64>::try_from(g)?;
            Ok(std::iter::once(Feature::new(geometry)).collect())
        }
    }
}

fn from_geojson(feature: geojson::Feature) -> Result<Feature> {
    let geometry = match feature.geometry {
        Some(g) => Some(geo_types::Geometry::<f64>::try_from(g)?),
        None => None,
    };

    let properties = feature
        .properties
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, AttributeValue::from(v)))
        .collect();

    let id = feature.id.map(|id| match id {
        Id::String(s) => FeatureId::Text(s),
        Id::Number(n) => FeatureId::Number(n),
    });

    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn to_geojson(feature: &Feature) -> geojson::Feature {
    let properties: JsonObject = feature
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::from(v.clone())))
        .collect();

    geojson::Feature {
        bbox: None,
        geometry: feature
            .geometry
            .as_ref()
            .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
        id: feature.id.clone().map(|id| match id {
            FeatureId::Number(n) => Id::Number(n),
            FeatureId::Text(s) => Id::String(s),
        }),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Serialize a FeatureCollection as a GeoJSON document
pub fn write_geojson_to_writer<W: Write>(collection: &FeatureCollection, writer: W) -> Result<()> {
    let fc = geojson::FeatureCollection {
        bbox: None,
        features: collection.iter().map(to_geojson).collect(),
        foreign_members: None,
    };
    serde_json::to_writer(writer, &GeoJson::FeatureCollection(fc))?;
    Ok(())
}

/// Write a FeatureCollection to a GeoJSON file
pub fn write_geojson<P: AsRef<Path>>(collection: &FeatureCollection, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_geojson_to_writer(collection, &mut writer)?;
    writer.flush().map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, Geometry};

    const DOC: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "id": 7,
             "geometry": {"type": "Point", "coordinates": [1.5, 2.5]},
             "properties": {"NAME": "a", "POP": 10, "SHARE": 0.25}},
            {"type": "Feature", "geometry": null, "properties": null}
        ]
    }"#;

    #[test]
    fn test_read_collection() {
        let fc = read_geojson_from_str(DOC).unwrap();
        assert_eq!(fc.len(), 2);

        let first = &fc.features[0];
        assert_eq!(first.geometry, Some(Geometry::Point(point!(x: 1.5, y: 2.5))));
        assert_eq!(first.id, Some(FeatureId::Number(7.into())));
        assert_eq!(first.get_property("POP"), Some(&AttributeValue::Int(10)));
        assert_eq!(first.get_property("SHARE"), Some(&AttributeValue::Float(0.25)));

        assert!(fc.features[1].geometry.is_none());
        assert!(fc.features[1].properties.is_empty());
    }

    #[test]
    fn test_bare_geometry_document() {
        let fc = read_geojson_from_str(r#"{"type":"Point","coordinates":[3,4]}"#).unwrap();
        assert_eq!(fc.len(), 1);
        assert!(fc.features[0].properties.is_empty());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.geojson");

        let mut feature = Feature::new(Geometry::LineString(line_string![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 2.0),
        ]));
        feature.set_property("ID", 1i64);
        let fc: FeatureCollection = std::iter::once(feature).collect();

        write_geojson(&fc, &path).unwrap();
        assert_eq!(read_geojson(&path).unwrap(), fc);
    }

    #[test]
    fn test_ids_keep_their_json_type() {
        let mut fc = read_geojson_from_str(DOC).unwrap();
        fc.features[1].id = Some(FeatureId::Text("b".into()));

        let mut buf = Vec::new();
        write_geojson_to_writer(&fc, &mut buf).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(json["features"][0]["id"], serde_json::json!(7));
        assert_eq!(json["features"][1]["id"], serde_json::json!("b"));
        assert_eq!(read_geojson_from_str(std::str::from_utf8(&buf).unwrap()).unwrap(), fc);
    }

    #[test]
    fn test_malformed_is_input_error() {
        assert!(matches!(
            read_geojson_from_str("{\"type\": \"Nope\"}"),
            Err(Error::Input(_))
        ));
    }
}
