//! Projection of whole geometries and feature layers through a morphing grid

use super::mapper::{CoordinateMapper, Direction};
use crate::maybe_rayon::*;
use cartomorph_core::vector::FeatureCollection;
use geo::{Coord, Geometry, LineString, Triangle};

/// Map every coordinate of `geom` in place.
///
/// Rectangles become polygons first, since their deformed image is no longer
/// axis aligned.
pub fn project_geometry(geom: &mut Geometry<f64>, mapper: &CoordinateMapper<'_>, direction: Direction) {
    let map = |c: &mut Coord<f64>| *c = mapper.project(*c, direction);

    match geom {
        Geometry::Point(p) => map(&mut p.0),
        Geometry::Line(l) => {
            map(&mut l.start);
            map(&mut l.end);
        }
        Geometry::LineString(ls) => project_line_string(ls, mapper, direction),
        Geometry::Polygon(poly) => {
            poly.exterior_mut(|ext| project_line_string(ext, mapper, direction));
            poly.interiors_mut(|rings| {
                for ring in rings {
                    project_line_string(ring, mapper, direction);
                }
            });
        }
        Geometry::MultiPoint(mp) => mp.0.iter_mut().for_each(|p| map(&mut p.0)),
        Geometry::MultiLineString(mls) => {
            for ls in mls.0.iter_mut() {
                project_line_string(ls, mapper, direction);
            }
        }
        Geometry::MultiPolygon(mp) => {
            for poly in mp.0.iter_mut() {
                poly.exterior_mut(|ext| project_line_string(ext, mapper, direction));
                poly.interiors_mut(|rings| {
                    for ring in rings {
                        project_line_string(ring, mapper, direction);
                    }
                });
            }
        }
        Geometry::GeometryCollection(gc) => {
            for child in gc.0.iter_mut() {
                project_geometry(child, mapper, direction);
            }
        }
        Geometry::Rect(rect) => {
            let mut poly = Geometry::Polygon(rect.to_polygon());
            project_geometry(&mut poly, mapper, direction);
            *geom = poly;
        }
        Geometry::Triangle(tri) => {
            let [a, b, c] = tri.to_array().map(|v| mapper.project(v, direction));
            *tri = Triangle::new(a, b, c);
        }
    }
}

fn project_line_string(ls: &mut LineString<f64>, mapper: &CoordinateMapper<'_>, direction: Direction) {
    for c in ls.0.iter_mut() {
        *c = mapper.project(*c, direction);
    }
}

/// Project every feature geometry of a layer, one feature per task
pub fn project_features(
    features: &mut FeatureCollection,
    mapper: &CoordinateMapper<'_>,
    direction: Direction,
) {
    features.features.par_iter_mut().for_each(|feature| {
        if let Some(geom) = feature.geometry.as_mut() {
            project_geometry(geom, mapper, direction);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cartomorph_core::vector::Feature;
    use cartomorph_core::{GeoTransform, MorphGrid};
    use geo::{line_string, point, polygon, Rect};

    fn shifted_grid() -> MorphGrid {
        let mut grid = MorphGrid::regular(2, 2, GeoTransform::identity()).unwrap();
        grid.set_vertex(1, 1, Coord { x: 1.5, y: 1.0 }).unwrap();
        grid
    }

    #[test]
    fn test_point_and_line_string() {
        let grid = shifted_grid();
        let mapper = CoordinateMapper::new(&grid);

        let mut pt = Geometry::Point(point!(x: 1.0, y: 1.0));
        project_geometry(&mut pt, &mapper, Direction::Forward);
        assert_eq!(pt, Geometry::Point(point!(x: 1.5, y: 1.0)));

        let mut ls = Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 5.0, y: 5.0)]);
        project_geometry(&mut ls, &mapper, Direction::Forward);
        let Geometry::LineString(ls) = ls else {
            panic!("geometry type changed")
        };
        assert_eq!(ls.0[0], Coord { x: 0.0, y: 0.0 });
        assert_eq!(ls.0[1], Coord { x: 1.5, y: 1.0 });
        // Outside the grid
        assert_eq!(ls.0[2], Coord { x: 5.0, y: 5.0 });
    }

    #[test]
    fn test_polygon_stays_closed() {
        let grid = shifted_grid();
        let mapper = CoordinateMapper::new(&grid);

        let mut poly = Geometry::Polygon(polygon![
            (x: 0.5, y: 0.5),
            (x: 1.5, y: 0.5),
            (x: 1.5, y: 1.5),
            (x: 0.5, y: 1.5),
        ]);
        project_geometry(&mut poly, &mapper, Direction::Forward);
        project_geometry(&mut poly, &mapper, Direction::Backward);

        let Geometry::Polygon(poly) = poly else {
            panic!("geometry type changed")
        };
        let ring = poly.exterior();
        assert!(ring.is_closed());
        assert_relative_eq!(ring.0[2].x, 1.5, epsilon = 1e-9);
        assert_relative_eq!(ring.0[2].y, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rect_becomes_polygon() {
        let grid = shifted_grid();
        let mapper = CoordinateMapper::new(&grid);

        let mut rect = Geometry::Rect(Rect::new(Coord { x: 0.5, y: 0.5 }, Coord { x: 1.0, y: 1.0 }));
        project_geometry(&mut rect, &mapper, Direction::Forward);
        let Geometry::Polygon(poly) = rect else {
            panic!("expected a polygon")
        };
        assert!(poly.exterior().0.contains(&Coord { x: 1.5, y: 1.0 }));
    }

    #[test]
    fn test_triangle_vertices() {
        let grid = shifted_grid();
        let mapper = CoordinateMapper::new(&grid);

        let mut tri = Geometry::Triangle(Triangle::new(
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
        ));
        project_geometry(&mut tri, &mapper, Direction::Forward);
        let Geometry::Triangle(tri) = tri else {
            panic!("geometry type changed")
        };
        let vertices = tri.to_array();
        assert!(vertices.contains(&Coord { x: 1.5, y: 1.0 }));
        assert!(vertices.contains(&Coord { x: 2.0, y: 0.0 }));
    }

    #[test]
    fn test_nested_collection() {
        let grid = shifted_grid();
        let mapper = CoordinateMapper::new(&grid);

        let mut gc = Geometry::GeometryCollection(geo::GeometryCollection(vec![
            Geometry::Point(point!(x: 1.0, y: 1.0)),
            Geometry::GeometryCollection(geo::GeometryCollection(vec![Geometry::Point(
                point!(x: 1.0, y: 1.0),
            )])),
        ]));
        project_geometry(&mut gc, &mapper, Direction::Forward);

        let expected = Geometry::Point(point!(x: 1.5, y: 1.0));
        let Geometry::GeometryCollection(outer) = gc else {
            panic!("geometry type changed")
        };
        assert_eq!(outer.0[0], expected);
        let Geometry::GeometryCollection(inner) = &outer.0[1] else {
            panic!("geometry type changed")
        };
        assert_eq!(inner.0[0], expected);
    }

    #[test]
    fn test_project_features() {
        let grid = shifted_grid();
        let mapper = CoordinateMapper::new(&grid);

        let mut layer: FeatureCollection = vec![
            Feature::new(Geometry::Point(point!(x: 1.0, y: 1.0))),
            Feature::empty(),
        ]
        .into_iter()
        .collect();
        project_features(&mut layer, &mapper, Direction::Forward);

        assert_eq!(
            layer.features[0].geometry,
            Some(Geometry::Point(point!(x: 1.5, y: 1.0)))
        );
        assert!(layer.features[1].geometry.is_none());
    }
}
