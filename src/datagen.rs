//! Synthetic benchmark dataset generator.
//!
//! Writes the six tables as parquet for a scale factor, deterministic under
//! a seed. The geography is a box around Sedona, AZ sliced into a grid of
//! county-style zones (one of them named 'Coconino County' so q2 has a
//! target), with building footprints and trip endpoints clustered around
//! the city center so the radius queries select real subsets.

use std::fs::{self, File};
use std::path::Path;

use geo::{Geometry, LineString, Polygon};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engines::frames::binary_series;
use crate::error::Result;
use crate::geom;

#[derive(Debug, Clone)]
pub struct GenConfig {
    pub scale_factor: f64,
    pub seed: u64,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            seed: 42,
        }
    }
}

const LON_MIN: f64 = -112.4;
const LON_MAX: f64 = -111.2;
const LAT_MIN: f64 = 34.3;
const LAT_MAX: f64 = 35.4;

const CENTER_LON: f64 = -111.7610;
const CENTER_LAT: f64 = 34.8697;

const ZONE_GRID: usize = 5;
const COUNTY_NAMES: [&str; 5] = [
    "Coconino County",
    "Yavapai County",
    "Gila County",
    "Navajo County",
    "Maricopa County",
];

/// Epoch millis of 2024-01-01T00:00:00Z; trips span the following 6 months.
const TIME_BASE_MS: i64 = 1_704_067_200_000;
const TIME_SPAN_MS: i64 = 182 * 24 * 3600 * 1000;

fn scaled(base: usize, scale_factor: f64) -> usize {
    ((base as f64 * scale_factor).round() as usize).max(1)
}

/// Generate all tables under `dir`; returns (table, row count) pairs.
pub fn generate(dir: &Path, cfg: &GenConfig) -> Result<Vec<(&'static str, usize)>> {
    fs::create_dir_all(dir)?;
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let n_customer = scaled(200, cfg.scale_factor);
    let n_driver = scaled(100, cfg.scale_factor);
    let n_vehicle = scaled(100, cfg.scale_factor);
    let n_building = scaled(150, cfg.scale_factor);
    let n_trip = scaled(5000, cfg.scale_factor);
    let n_zone = ZONE_GRID * ZONE_GRID;

    write_zones(dir)?;
    write_buildings(dir, &mut rng, n_building)?;
    write_customers(dir, n_customer)?;
    write_drivers(dir, &mut rng, n_driver)?;
    write_vehicles(dir, &mut rng, n_vehicle)?;
    write_trips(dir, &mut rng, n_trip, n_customer, n_driver, n_vehicle)?;

    Ok(vec![
        ("building", n_building),
        ("customer", n_customer),
        ("driver", n_driver),
        ("trip", n_trip),
        ("vehicle", n_vehicle),
        ("zone", n_zone),
    ])
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
    Geometry::Polygon(Polygon::new(
        LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
        vec![],
    ))
}

fn write_zones(dir: &Path) -> Result<()> {
    let cell_w = (LON_MAX - LON_MIN) / ZONE_GRID as f64;
    let cell_h = (LAT_MAX - LAT_MIN) / ZONE_GRID as f64;
    let center_cell = {
        let col = ((CENTER_LON - LON_MIN) / cell_w) as usize;
        let row = ((CENTER_LAT - LAT_MIN) / cell_h) as usize;
        row * ZONE_GRID + col
    };

    let mut keys = Vec::new();
    let mut names = Vec::new();
    let mut boundaries = Vec::new();
    let mut county = COUNTY_NAMES.iter().filter(|n| **n != COUNTY_NAMES[0]);
    for row in 0..ZONE_GRID {
        for col in 0..ZONE_GRID {
            let idx = row * ZONE_GRID + col;
            let x0 = LON_MIN + col as f64 * cell_w;
            let y0 = LAT_MIN + row as f64 * cell_h;
            keys.push(idx as i64 + 1);
            names.push(if idx == center_cell {
                COUNTY_NAMES[0].to_string()
            } else {
                county
                    .next()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| format!("Zone {}", idx + 1))
            });
            boundaries.push(geom::to_wkb(&rect(x0, y0, x0 + cell_w, y0 + cell_h))?);
        }
    }

    let mut df = DataFrame::new(vec![
        Series::new("z_zonekey".into(), keys).into_column(),
        Series::new("z_name".into(), names).into_column(),
        binary_series("z_boundary", &boundaries).into_column(),
    ])?;
    write_parquet(dir, "zone", &mut df)
}

fn write_buildings(dir: &Path, rng: &mut StdRng, count: usize) -> Result<()> {
    let mut keys = Vec::with_capacity(count);
    let mut names = Vec::with_capacity(count);
    let mut boundaries = Vec::with_capacity(count);
    for i in 0..count {
        // Footprints cluster downtown so overlap pairs and nearby-pickup
        // counts are non-trivial.
        let (cx, cy) = if rng.gen_bool(0.7) {
            (
                CENTER_LON + rng.gen_range(-0.05..0.05),
                CENTER_LAT + rng.gen_range(-0.05..0.05),
            )
        } else {
            (
                rng.gen_range(LON_MIN..LON_MAX),
                rng.gen_range(LAT_MIN..LAT_MAX),
            )
        };
        let half = rng.gen_range(0.0005..0.0025);
        keys.push(i as i64 + 1);
        names.push(format!("Building#{:06}", i + 1));
        boundaries.push(geom::to_wkb(&rect(cx - half, cy - half, cx + half, cy + half))?);
    }
    let mut df = DataFrame::new(vec![
        Series::new("b_buildingkey".into(), keys).into_column(),
        Series::new("b_name".into(), names).into_column(),
        binary_series("b_boundary", &boundaries).into_column(),
    ])?;
    write_parquet(dir, "building", &mut df)
}

fn write_customers(dir: &Path, count: usize) -> Result<()> {
    let keys: Vec<i64> = (1..=count as i64).collect();
    let names: Vec<String> = (1..=count).map(|i| format!("Customer#{i:09}")).collect();
    let phones: Vec<String> = (1..=count).map(|i| format!("928-555-{:04}", i % 10_000)).collect();
    let mut df = DataFrame::new(vec![
        Series::new("c_custkey".into(), keys).into_column(),
        Series::new("c_name".into(), names).into_column(),
        Series::new("c_phone".into(), phones).into_column(),
    ])?;
    write_parquet(dir, "customer", &mut df)
}

fn write_drivers(dir: &Path, rng: &mut StdRng, count: usize) -> Result<()> {
    let keys: Vec<i64> = (1..=count as i64).collect();
    let names: Vec<String> = (1..=count).map(|i| format!("Driver#{i:06}")).collect();
    let ratings: Vec<f64> = (0..count).map(|_| rng.gen_range(3.0..5.0)).collect();
    let mut df = DataFrame::new(vec![
        Series::new("d_driverkey".into(), keys).into_column(),
        Series::new("d_name".into(), names).into_column(),
        Series::new("d_rating".into(), ratings).into_column(),
    ])?;
    write_parquet(dir, "driver", &mut df)
}

fn write_vehicles(dir: &Path, rng: &mut StdRng, count: usize) -> Result<()> {
    let keys: Vec<i64> = (1..=count as i64).collect();
    let plates: Vec<String> = (1..=count).map(|i| format!("AZ-{i:05}")).collect();
    let capacities: Vec<i64> = (0..count).map(|_| rng.gen_range(2..=6)).collect();
    let mut df = DataFrame::new(vec![
        Series::new("v_vehiclekey".into(), keys).into_column(),
        Series::new("v_plate".into(), plates).into_column(),
        Series::new("v_capacity".into(), capacities).into_column(),
    ])?;
    write_parquet(dir, "vehicle", &mut df)
}

fn random_point(rng: &mut StdRng) -> (f64, f64) {
    if rng.gen_bool(0.6) {
        (
            CENTER_LON + rng.gen_range(-0.3..0.3),
            CENTER_LAT + rng.gen_range(-0.3..0.3),
        )
    } else {
        (
            rng.gen_range(LON_MIN..LON_MAX),
            rng.gen_range(LAT_MIN..LAT_MAX),
        )
    }
}

fn write_trips(
    dir: &Path,
    rng: &mut StdRng,
    count: usize,
    n_customer: usize,
    n_driver: usize,
    n_vehicle: usize,
) -> Result<()> {
    let mut tripkeys = Vec::with_capacity(count);
    let mut custkeys = Vec::with_capacity(count);
    let mut driverkeys = Vec::with_capacity(count);
    let mut vehiclekeys = Vec::with_capacity(count);
    let mut pickups: Vec<Vec<u8>> = Vec::with_capacity(count);
    let mut dropoffs: Vec<Vec<u8>> = Vec::with_capacity(count);
    let mut pickup_times = Vec::with_capacity(count);
    let mut dropoff_times = Vec::with_capacity(count);
    let mut distances = Vec::with_capacity(count);
    let mut fares = Vec::with_capacity(count);
    let mut tips = Vec::with_capacity(count);
    let mut totals = Vec::with_capacity(count);

    for i in 0..count {
        let (px, py) = random_point(rng);
        let (dx, dy) = random_point(rng);
        let pickup = Geometry::Point(geo::Point::new(px, py));
        let dropoff = Geometry::Point(geo::Point::new(dx, dy));

        // A couple of heavy riders so the repeat-customer query has groups.
        let custkey = if rng.gen_bool(0.15) {
            1 + (i % 3) as i64
        } else {
            rng.gen_range(1..=n_customer as i64)
        };
        let pickup_ms = TIME_BASE_MS + rng.gen_range(0..TIME_SPAN_MS);
        let duration_ms = rng.gen_range(5..=90) * 60_000;

        let line_m = geom::distance(&pickup, &dropoff) / 0.000009;
        let distance = line_m * rng.gen_range(1.05..2.5);
        let fare = 2.5 + distance * 0.0012;
        let tip = fare * rng.gen_range(0.0..0.3);

        tripkeys.push(i as i64 + 1);
        custkeys.push(custkey);
        driverkeys.push(rng.gen_range(1..=n_driver as i64));
        vehiclekeys.push(rng.gen_range(1..=n_vehicle as i64));
        pickups.push(geom::to_wkb(&pickup)?);
        dropoffs.push(geom::to_wkb(&dropoff)?);
        pickup_times.push(pickup_ms);
        dropoff_times.push(pickup_ms + duration_ms);
        distances.push(distance);
        fares.push(fare);
        tips.push(tip);
        totals.push(fare + tip);
    }

    let pickup_time_col = Series::new("t_pickuptime".into(), pickup_times)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    let dropoff_time_col = Series::new("t_dropofftime".into(), dropoff_times)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    let mut df = DataFrame::new(vec![
        Series::new("t_tripkey".into(), tripkeys).into_column(),
        Series::new("t_custkey".into(), custkeys).into_column(),
        Series::new("t_driverkey".into(), driverkeys).into_column(),
        Series::new("t_vehiclekey".into(), vehiclekeys).into_column(),
        binary_series("t_pickuploc", &pickups).into_column(),
        binary_series("t_dropoffloc", &dropoffs).into_column(),
        pickup_time_col.into_column(),
        dropoff_time_col.into_column(),
        Series::new("t_distance".into(), distances).into_column(),
        Series::new("t_fare".into(), fares).into_column(),
        Series::new("t_tip".into(), tips).into_column(),
        Series::new("t_totalamount".into(), totals).into_column(),
    ])?;
    write_parquet(dir, "trip", &mut df)
}

fn write_parquet(dir: &Path, table: &str, df: &mut DataFrame) -> Result<()> {
    let file = File::create(dir.join(format!("{table}.parquet")))?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataPaths;
    use crate::engines::frames;

    #[test]
    fn generates_all_tables_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = GenConfig {
            scale_factor: 0.02,
            seed: 7,
        };
        let counts = generate(dir.path(), &cfg).unwrap();
        assert_eq!(counts.len(), 6);

        let paths = DataPaths::discover(dir.path()).unwrap();
        for table in crate::TABLES {
            assert!(paths.get(table).is_ok(), "{table} missing");
        }

        let zone = frames::read_table(&paths, "zone").unwrap();
        assert_eq!(zone.height(), ZONE_GRID * ZONE_GRID);
        let names = zone.column("z_name").unwrap().str().unwrap();
        assert!(names.into_iter().any(|n| n == Some("Coconino County")));

        let trip = frames::read_table(&paths, "trip").unwrap();
        assert_eq!(trip.height(), 100);
        let geoms = frames::decode_geometries(&trip, "t_pickuploc").unwrap();
        assert!(geoms.iter().all(|g| g.is_some()));
    }

    #[test]
    fn same_seed_same_bytes() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let cfg = GenConfig {
            scale_factor: 0.01,
            seed: 11,
        };
        generate(a.path(), &cfg).unwrap();
        generate(b.path(), &cfg).unwrap();
        let bytes_a = std::fs::read(a.path().join("trip.parquet")).unwrap();
        let bytes_b = std::fs::read(b.path().join("trip.parquet")).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }
}
