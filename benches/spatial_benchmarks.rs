//! Criterion microbenchmarks for the geometry plumbing shared by the
//! dataframe engines.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geo::{Geometry, LineString, Point, Polygon};
use spatialbench::geom::{self, SpatialIndex};

fn square(x0: f64, y0: f64, side: f64) -> Geometry<f64> {
    Geometry::Polygon(Polygon::new(
        LineString::from(vec![
            (x0, y0),
            (x0 + side, y0),
            (x0 + side, y0 + side),
            (x0, y0 + side),
            (x0, y0),
        ]),
        vec![],
    ))
}

fn wkb_decode(c: &mut Criterion) {
    let wkbs: Vec<Vec<u8>> = (0..10_000)
        .map(|i: i64| {
            let x = -112.0 + ((i * 17 + 31) % 1000) as f64 / 1000.0;
            let y = 34.0 + ((i * 23 + 47) % 1000) as f64 / 1000.0;
            geom::to_wkb(&Geometry::Point(Point::new(x, y))).unwrap()
        })
        .collect();

    c.bench_function("wkb_decode_10k_points", |b| {
        b.iter(|| {
            for wkb in &wkbs {
                black_box(geom::from_wkb(wkb).unwrap());
            }
        })
    });
}

fn zone_index_probe(c: &mut Criterion) {
    let mut items = Vec::new();
    let mut key = 1i64;
    for row in 0..32 {
        for col in 0..32 {
            items.push((key, square(col as f64 * 0.1, row as f64 * 0.1, 0.1)));
            key += 1;
        }
    }
    let index = SpatialIndex::build(items);

    c.bench_function("zone_index_probe_1k_points", |b| {
        b.iter(|| {
            for i in 0..1000i64 {
                let p = Geometry::Point(Point::new(
                    ((i * 17) % 320) as f64 / 100.0,
                    ((i * 23) % 320) as f64 / 100.0,
                ));
                black_box(index.containing_key(&p));
            }
        })
    });
}

criterion_group!(benches, wkb_decode, zone_index_probe);
criterion_main!(benches);
