//! Lazy Polars as the lazy dataframe engine.
//!
//! Every query is a `scan_parquet` pipeline collected at the end; geometry
//! predicates run inside expression UDFs over the WKB columns. Small
//! dimension tables (zones, buildings) are collected up front and indexed,
//! the index captured by the expressions that probe it.

use std::collections::BTreeMap;
use std::sync::Arc;

use polars::prelude::*;
use polars_ops::frame::MaintainOrderJoin;

use crate::data::DataPaths;
use crate::engines::{frames, QueryEngine};
use crate::error::{BenchError, Result};
use crate::geom::{self, SpatialIndex};

pub struct PolarsLazyEngine {
    paths: DataPaths,
}

impl PolarsLazyEngine {
    pub fn new(paths: DataPaths) -> Self {
        Self { paths }
    }
}

impl QueryEngine for PolarsLazyEngine {
    fn engine_name(&self) -> &'static str {
        "polars_lazy"
    }

    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn execute(&mut self, query: &str, _sql: Option<&str>) -> Result<u64> {
        let df = run_query(&self.paths, query)?;
        Ok(df.height() as u64)
    }
}

/// Run one suite query and return its result frame.
pub fn run_query(paths: &DataPaths, query: &str) -> Result<DataFrame> {
    match query {
        "q1" => q1(paths),
        "q2" => q2(paths),
        "q3" => q3(paths),
        "q4" => q4(paths),
        "q5" => q5(paths),
        "q6" => q6(paths),
        "q7" => q7(paths),
        "q8" => q8(paths),
        "q9" => q9(paths),
        "q10" => q10(paths),
        "q11" => q11(paths),
        "q12" => q12(paths),
        other => Err(BenchError::UnknownQuery(other.to_string())),
    }
}

fn sort_opts(descending: &[bool], nulls_last: bool) -> SortMultipleOptions {
    SortMultipleOptions::default()
        .with_order_descending_multi(descending.to_vec())
        .with_nulls_last(nulls_last)
}

fn q1(paths: &DataPaths) -> Result<DataFrame> {
    let center = Arc::new(geom::from_wkt("POINT (-111.7610 34.8697)")?);
    Ok(frames::scan_table(paths, "trip")?
        .filter(frames::dwithin_expr(col("t_pickuploc"), center.clone(), 0.45))
        .select([
            col("t_tripkey"),
            frames::x_expr(col("t_pickuploc")).alias("pickup_lon"),
            frames::y_expr(col("t_pickuploc")).alias("pickup_lat"),
            col("t_pickuptime"),
            frames::distance_to_expr(col("t_pickuploc"), center).alias("distance_to_center"),
        ])
        .sort_by_exprs(
            vec![col("distance_to_center"), col("t_tripkey")],
            sort_opts(&[false, false], false),
        )
        .collect()?)
}

fn q2(paths: &DataPaths) -> Result<DataFrame> {
    // The zone subquery collects first, like the scalar subquery it mirrors.
    let target = frames::scan_table(paths, "zone")?
        .filter(col("z_name").eq(lit("Coconino County")))
        .select([col("z_boundary")])
        .limit(1)
        .collect()?;
    if target.height() == 0 {
        return Ok(df!("trip_count_in_coconino_county" => [0u32])?);
    }
    let boundary = Arc::new(geom::decode_required(
        target.column("z_boundary")?.binary()?.get(0),
        "zone",
    )?);

    Ok(frames::scan_table(paths, "trip")?
        .filter(frames::intersects_expr(col("t_pickuploc"), boundary))
        .select([len().alias("trip_count_in_coconino_county")])
        .collect()?)
}

fn q3(paths: &DataPaths) -> Result<DataFrame> {
    let bbox = Arc::new(geom::from_wkt(
        "POLYGON((-111.9060 34.7347, -111.6160 34.7347, -111.6160 35.0047, -111.9060 35.0047, -111.9060 34.7347))",
    )?);
    Ok(frames::scan_table(paths, "trip")?
        .filter(frames::dwithin_expr(col("t_pickuploc"), bbox, 0.045))
        .with_column(
            col("t_pickuptime")
                .dt()
                .truncate(lit("1mo"))
                .alias("pickup_month"),
        )
        .group_by([col("pickup_month")])
        .agg([
            col("t_tripkey").len().alias("total_trips"),
            col("t_distance").mean().alias("avg_distance"),
            (col("t_dropofftime") - col("t_pickuptime"))
                .mean()
                .alias("avg_duration"),
            col("t_fare").mean().alias("avg_fare"),
        ])
        .sort(["pickup_month"], SortMultipleOptions::default())
        .collect()?)
}

fn q4(paths: &DataPaths) -> Result<DataFrame> {
    let zone = frames::scan_table(paths, "zone")?.collect()?;
    let index = Arc::new(frames::spatial_index(&zone, "z_zonekey", "z_boundary")?);

    Ok(frames::scan_table(paths, "trip")?
        .sort_by_exprs(
            vec![col("t_tip"), col("t_tripkey")],
            sort_opts(&[true, false], false),
        )
        .limit(1000)
        .with_column(
            frames::containing_key_expr(col("t_pickuploc"), index).alias("z_zonekey"),
        )
        .filter(col("z_zonekey").is_not_null())
        .group_by([col("z_zonekey")])
        .agg([len().alias("trip_count")])
        .join(
            zone.lazy().select([col("z_zonekey"), col("z_name")]),
            [col("z_zonekey")],
            [col("z_zonekey")],
            JoinArgs::new(JoinType::Inner),
        )
        .select([col("z_zonekey"), col("z_name"), col("trip_count")])
        .sort_by_exprs(
            vec![col("trip_count"), col("z_zonekey")],
            sort_opts(&[true, false], false),
        )
        .collect()?)
}

fn q5(paths: &DataPaths) -> Result<DataFrame> {
    Ok(frames::scan_table(paths, "trip")?
        .join(
            frames::scan_table(paths, "customer")?.select([col("c_custkey"), col("c_name")]),
            [col("t_custkey")],
            [col("c_custkey")],
            JoinArgs::new(JoinType::Inner),
        )
        .group_by([
            col("t_custkey"),
            col("c_name"),
            col("t_pickuptime")
                .dt()
                .truncate(lit("1mo"))
                .alias("pickup_month"),
        ])
        .agg([len().alias("dropoff_count"), col("t_dropoffloc")])
        .filter(col("dropoff_count").gt(lit(5)))
        .with_column(
            frames::hull_area_list_expr(col("t_dropoffloc")).alias("monthly_travel_hull_area"),
        )
        .select([
            col("t_custkey").alias("c_custkey"),
            col("c_name").alias("customer_name"),
            col("pickup_month"),
            col("monthly_travel_hull_area"),
            col("dropoff_count"),
        ])
        .sort_by_exprs(
            vec![col("dropoff_count"), col("c_custkey")],
            sort_opts(&[true, false], false),
        )
        .collect()?)
}

fn q6(paths: &DataPaths) -> Result<DataFrame> {
    let bbox = geom::from_wkt(
        "POLYGON((-112.2110 34.4197, -111.3110 34.4197, -111.3110 35.3197, -112.2110 35.3197, -112.2110 34.4197))",
    )?;
    let zone = frames::scan_table(paths, "zone")?.collect()?;
    let zone_geoms = frames::decode_geometries(&zone, "z_boundary")?;
    let zone_keys = zone.column("z_zonekey")?.i64()?;
    let mut candidates = Vec::new();
    for (i, g) in zone_geoms.iter().enumerate() {
        if let (Some(key), Some(g)) = (zone_keys.get(i), g) {
            if geom::intersects(&bbox, g) {
                candidates.push((key, g.clone()));
            }
        }
    }
    let index = Arc::new(SpatialIndex::build(candidates));

    Ok(frames::scan_table(paths, "trip")?
        .with_column(
            frames::containing_key_expr(col("t_pickuploc"), index).alias("z_zonekey"),
        )
        .filter(col("z_zonekey").is_not_null())
        .group_by([col("z_zonekey")])
        .agg([
            col("t_tripkey").len().alias("total_pickups"),
            col("t_totalamount").mean().alias("avg_distance"),
            (col("t_dropofftime") - col("t_pickuptime"))
                .mean()
                .alias("avg_duration"),
        ])
        .join(
            zone.lazy().select([col("z_zonekey"), col("z_name")]),
            [col("z_zonekey")],
            [col("z_zonekey")],
            JoinArgs::new(JoinType::Inner),
        )
        .select([
            col("z_zonekey"),
            col("z_name"),
            col("total_pickups"),
            col("avg_distance"),
            col("avg_duration"),
        ])
        .sort_by_exprs(
            vec![col("total_pickups"), col("z_zonekey")],
            sort_opts(&[true, false], false),
        )
        .collect()?)
}

fn q7(paths: &DataPaths) -> Result<DataFrame> {
    Ok(frames::scan_table(paths, "trip")?
        .with_column(
            frames::line_distance_m_expr(col("t_pickuploc"), col("t_dropoffloc"))
                .alias("line_distance_m"),
        )
        .with_column(
            col("t_distance")
                .cast(DataType::Float64)
                .alias("reported_distance_m"),
        )
        .with_column(
            frames::ratio_expr(col("reported_distance_m"), col("line_distance_m"))
                .alias("detour_ratio"),
        )
        .select([
            col("t_tripkey"),
            col("reported_distance_m"),
            col("line_distance_m"),
            col("detour_ratio"),
        ])
        .sort_by_exprs(
            vec![
                col("detour_ratio"),
                col("reported_distance_m"),
                col("t_tripkey"),
            ],
            sort_opts(&[true, true, false], true),
        )
        .collect()?)
}

fn q8(paths: &DataPaths) -> Result<DataFrame> {
    let building = frames::scan_table(paths, "building")?.collect()?;
    let index = Arc::new(frames::spatial_index(&building, "b_buildingkey", "b_boundary")?);

    Ok(frames::scan_table(paths, "trip")?
        .select([
            frames::keys_within_expr(col("t_pickuploc"), index, 0.0045).alias("b_buildingkey"),
        ])
        .select([col("b_buildingkey").explode()])
        .filter(col("b_buildingkey").is_not_null())
        .group_by([col("b_buildingkey")])
        .agg([len().alias("nearby_pickup_count")])
        .join(
            building.lazy().select([col("b_buildingkey"), col("b_name")]),
            [col("b_buildingkey")],
            [col("b_buildingkey")],
            JoinArgs::new(JoinType::Inner),
        )
        .select([
            col("b_buildingkey"),
            col("b_name"),
            col("nearby_pickup_count"),
        ])
        .sort_by_exprs(
            vec![col("nearby_pickup_count"), col("b_buildingkey")],
            sort_opts(&[true, false], false),
        )
        .collect()?)
}

fn q9(paths: &DataPaths) -> Result<DataFrame> {
    let building = frames::scan_table(paths, "building")?
        .select([col("b_buildingkey"), col("b_boundary")])
        .collect()?;
    // LazyFrame cross joins with empty keys still panic, so pair up eagerly
    // and go lazy for the rest.
    let pairs = building.cross_join(&building, Some("_right".into()), None, MaintainOrderJoin::None)?;

    let union = col("area1") + col("area2") - col("overlap_area");
    Ok(pairs
        .lazy()
        .filter(col("b_buildingkey").lt(col("b_buildingkey_right")))
        .filter(frames::intersects_pair_expr(
            col("b_boundary"),
            col("b_boundary_right"),
        ))
        .with_columns([
            frames::area_expr(col("b_boundary")).alias("area1"),
            frames::area_expr(col("b_boundary_right")).alias("area2"),
            frames::overlap_area_expr(col("b_boundary"), col("b_boundary_right"))
                .alias("overlap_area"),
        ])
        .with_column(
            when(col("overlap_area").eq(lit(0.0)))
                .then(lit(0.0))
                .when(union.clone().eq(lit(0.0)))
                .then(lit(1.0))
                .otherwise(col("overlap_area") / union)
                .alias("iou"),
        )
        .select([
            col("b_buildingkey").alias("building_1"),
            col("b_buildingkey_right").alias("building_2"),
            col("area1"),
            col("area2"),
            col("overlap_area"),
            col("iou"),
        ])
        .sort_by_exprs(
            vec![col("iou"), col("building_1"), col("building_2")],
            sort_opts(&[true, false, false], false),
        )
        .collect()?)
}

fn q10(paths: &DataPaths) -> Result<DataFrame> {
    let zone = frames::scan_table(paths, "zone")?.collect()?;
    let index = Arc::new(frames::spatial_index(&zone, "z_zonekey", "z_boundary")?);

    let stats = frames::scan_table(paths, "trip")?
        .with_column(frames::containing_key_expr(col("t_pickuploc"), index).alias("zone_key"))
        .filter(col("zone_key").is_not_null())
        .group_by([col("zone_key")])
        .agg([
            (col("t_dropofftime") - col("t_pickuptime"))
                .mean()
                .alias("avg_duration"),
            col("t_distance").mean().alias("avg_distance"),
            col("t_tripkey").len().alias("num_trips"),
        ]);

    Ok(zone
        .lazy()
        .select([col("z_zonekey"), col("z_name")])
        .join(
            stats,
            [col("z_zonekey")],
            [col("zone_key")],
            JoinArgs::new(JoinType::Left),
        )
        .with_column(col("num_trips").fill_null(lit(0)))
        .select([
            col("z_zonekey"),
            col("z_name").alias("pickup_zone"),
            col("avg_duration"),
            col("avg_distance"),
            col("num_trips"),
        ])
        .sort_by_exprs(
            vec![col("avg_duration"), col("z_zonekey")],
            sort_opts(&[true, false], true),
        )
        .collect()?)
}

fn q11(paths: &DataPaths) -> Result<DataFrame> {
    let zone = frames::scan_table(paths, "zone")?.collect()?;
    let index = Arc::new(frames::spatial_index(&zone, "z_zonekey", "z_boundary")?);

    Ok(frames::scan_table(paths, "trip")?
        .select([
            frames::containing_key_expr(col("t_pickuploc"), index.clone()).alias("pickup_zone"),
            frames::containing_key_expr(col("t_dropoffloc"), index).alias("dropoff_zone"),
        ])
        .filter(
            col("pickup_zone")
                .is_not_null()
                .and(col("dropoff_zone").is_not_null())
                .and(col("pickup_zone").neq(col("dropoff_zone"))),
        )
        .select([len().alias("cross_zone_trip_count")])
        .collect()?)
}

/// Q12 through the building R-tree: shortlist candidates by envelope, refine
/// with exact distances, keep the closest five. The KNN workaround every
/// engine without a KNN join ends up with.
fn q12(paths: &DataPaths) -> Result<DataFrame> {
    const CANDIDATE_POOL: usize = 32;

    let building = frames::scan_table(paths, "building")?.collect()?;
    let index = frames::spatial_index(&building, "b_buildingkey", "b_boundary")?;
    let names = {
        let keys = building.column("b_buildingkey")?.i64()?;
        let names = building.column("b_name")?.str()?;
        let mut map = BTreeMap::new();
        for (key, name) in keys.into_iter().zip(names.into_iter()) {
            if let Some(key) = key {
                map.insert(key, name.unwrap_or("").to_string());
            }
        }
        map
    };

    let trips = frames::scan_table(paths, "trip")?
        .select([col("t_tripkey"), col("t_pickuploc")])
        .collect()?;
    let t_keys = trips.column("t_tripkey")?.i64()?;
    let t_locs = trips.column("t_pickuploc")?.binary()?;

    let mut out_trip = Vec::new();
    let mut out_loc: Vec<Vec<u8>> = Vec::new();
    let mut out_bkey = Vec::new();
    let mut out_bname = Vec::new();
    let mut out_dist = Vec::new();
    for i in 0..trips.height() {
        let (Some(tripkey), Some(wkb)) = (t_keys.get(i), t_locs.get(i)) else {
            continue;
        };
        let pickup = geom::from_wkb(wkb)?;
        for (idx, dist) in index.nearest(&pickup, 5, CANDIDATE_POOL) {
            let key = index.key(idx);
            out_trip.push(tripkey);
            out_loc.push(wkb.to_vec());
            out_bkey.push(key);
            out_bname.push(names.get(&key).cloned().unwrap_or_default());
            out_dist.push(dist);
        }
    }

    let out = DataFrame::new(vec![
        Series::new("t_tripkey".into(), out_trip).into_column(),
        frames::binary_series("t_pickuploc", &out_loc).into_column(),
        Series::new("b_buildingkey".into(), out_bkey).into_column(),
        Series::new("building_name".into(), out_bname).into_column(),
        Series::new("distance_to_building".into(), out_dist).into_column(),
    ])?;
    Ok(out
        .lazy()
        .sort_by_exprs(
            vec![col("distance_to_building"), col("b_buildingkey")],
            sort_opts(&[false, false], false),
        )
        .collect()?)
}
