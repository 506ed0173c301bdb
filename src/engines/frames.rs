//! Polars-side plumbing shared by the eager and lazy dataframe engines.
//!
//! Polars has no geometry dtype, so geometry stays in WKB binary columns and
//! crosses into [`crate::geom`] at the edges: the eager engine decodes whole
//! columns up front, the lazy engine decodes inside the expression UDFs
//! built here.

use std::fs::File;
use std::sync::Arc;

use geo::{Geometry, MultiPoint};
use polars::prelude::*;

use crate::data::DataPaths;
use crate::error::Result;
use crate::geom::{self, SpatialIndex};

/// Read a whole table eagerly, stacking fragment files in sorted order.
pub fn read_table(paths: &DataPaths, table: &str) -> Result<DataFrame> {
    let mut out: Option<DataFrame> = None;
    for path in paths.files(table)? {
        let df = ParquetReader::new(File::open(&path)?).finish()?;
        match out.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&df)?;
            }
            None => out = Some(df),
        }
    }
    out.ok_or_else(|| crate::error::BenchError::MissingTable(table.to_string()))
}

/// Lazy scan over a table (single file or fragment glob).
pub fn scan_table(paths: &DataPaths, table: &str) -> Result<LazyFrame> {
    let glob = paths.glob_path(table)?;
    Ok(LazyFrame::scan_parquet(
        PlPath::new(&glob),
        ScanArgsParquet::default(),
    )?)
}

/// Decode a WKB column into geometries, positionally aligned with the frame.
pub fn decode_geometries(df: &DataFrame, column: &str) -> Result<Vec<Option<Geometry<f64>>>> {
    let ca = df.column(column)?.binary()?;
    let mut out = Vec::with_capacity(ca.len());
    for opt in ca.into_iter() {
        out.push(match opt {
            Some(bytes) => Some(geom::from_wkb(bytes)?),
            None => None,
        });
    }
    Ok(out)
}

/// Build a [`SpatialIndex`] from a key column and a WKB geometry column.
pub fn spatial_index(df: &DataFrame, key_col: &str, geom_col: &str) -> Result<SpatialIndex> {
    let keys = df.column(key_col)?.i64()?;
    let geoms = df.column(geom_col)?.binary()?;
    let mut items = Vec::with_capacity(df.height());
    for (key, wkb) in keys.into_iter().zip(geoms.into_iter()) {
        if let (Some(key), Some(wkb)) = (key, wkb) {
            items.push((key, geom::from_wkb(wkb)?));
        }
    }
    Ok(SpatialIndex::build(items))
}

pub fn binary_series(name: &str, values: &[Vec<u8>]) -> Series {
    let mut builder = BinaryChunkedBuilder::new(name.into(), values.len());
    for value in values {
        builder.append_value(value);
    }
    builder.finish().into_series()
}

pub fn bool_mask(values: &[bool]) -> BooleanChunked {
    BooleanChunked::from_slice("mask".into(), values)
}

fn decoded(opt: Option<&[u8]>) -> Option<Geometry<f64>> {
    opt.and_then(|bytes| geom::from_wkb(bytes).ok())
}

/// Output-type callback for [`Expr::map`], mirroring the old
/// `GetOutput::from_type`: keep the input field's name, set the given dtype.
fn out_field(dtype: DataType) -> impl Fn(&Schema, &Field) -> PolarsResult<Field> + Send + Sync + 'static {
    move |_schema: &Schema, field: &Field| Ok(Field::new(field.name().clone(), dtype.clone()))
}

/// Output-type callback for [`Expr::map_many`], mirroring the old
/// `GetOutput::from_type`: keep the first input field's name, set the dtype.
fn out_field_many(
    dtype: DataType,
) -> impl Fn(&Schema, &[Field]) -> PolarsResult<Field> + Send + Sync + 'static {
    move |_schema: &Schema, fields: &[Field]| Ok(Field::new(fields[0].name().clone(), dtype.clone()))
}

/// `distance(column, target)` as a lazy expression.
pub fn distance_to_expr(e: Expr, target: Arc<Geometry<f64>>) -> Expr {
    e.map(
        move |col: Column| {
            let s = col.as_materialized_series().clone();
            let ca = s.binary()?;
            let out: Float64Chunked = ca
                .into_iter()
                .map(|opt| decoded(opt).map(|g| geom::distance(&g, &target)))
                .collect();
            Ok(out.into_series().into())
        },
        out_field(DataType::Float64),
    )
}

/// `dwithin(column, target, dist)` as a lazy expression.
pub fn dwithin_expr(e: Expr, target: Arc<Geometry<f64>>, dist: f64) -> Expr {
    e.map(
        move |col: Column| {
            let s = col.as_materialized_series().clone();
            let ca = s.binary()?;
            let out: BooleanChunked = ca
                .into_iter()
                .map(|opt| Some(matches!(decoded(opt), Some(g) if geom::dwithin(&g, &target, dist))))
                .collect();
            Ok(out.into_series().into())
        },
        out_field(DataType::Boolean),
    )
}

/// `intersects(column, target)` as a lazy expression.
pub fn intersects_expr(e: Expr, target: Arc<Geometry<f64>>) -> Expr {
    e.map(
        move |col: Column| {
            let s = col.as_materialized_series().clone();
            let ca = s.binary()?;
            let out: BooleanChunked = ca
                .into_iter()
                .map(|opt| Some(matches!(decoded(opt), Some(g) if geom::intersects(&g, &target))))
                .collect();
            Ok(out.into_series().into())
        },
        out_field(DataType::Boolean),
    )
}

/// Point accessor expressions.
pub fn x_expr(e: Expr) -> Expr {
    point_coord_expr(e, geom::point_x)
}

pub fn y_expr(e: Expr) -> Expr {
    point_coord_expr(e, geom::point_y)
}

fn point_coord_expr(e: Expr, f: fn(&Geometry<f64>) -> Option<f64>) -> Expr {
    e.map(
        move |col: Column| {
            let s = col.as_materialized_series().clone();
            let ca = s.binary()?;
            let out: Float64Chunked = ca
                .into_iter()
                .map(|opt| decoded(opt).and_then(|g| f(&g)))
                .collect();
            Ok(out.into_series().into())
        },
        out_field(DataType::Float64),
    )
}

/// Key of the indexed geometry containing each point, null when none does.
pub fn containing_key_expr(e: Expr, index: Arc<SpatialIndex>) -> Expr {
    e.map(
        move |col: Column| {
            let s = col.as_materialized_series().clone();
            let ca = s.binary()?;
            let out: Int64Chunked = ca
                .into_iter()
                .map(|opt| decoded(opt).and_then(|g| index.containing_key(&g)))
                .collect();
            Ok(out.into_series().into())
        },
        out_field(DataType::Int64),
    )
}

/// Keys of all indexed geometries within `dist` of each point, as a list
/// column ready to explode.
pub fn keys_within_expr(e: Expr, index: Arc<SpatialIndex>, dist: f64) -> Expr {
    e.map(
        move |col: Column| {
            let s = col.as_materialized_series().clone();
            let ca = s.binary()?;
            let mut builder = ListPrimitiveChunkedBuilder::<Int64Type>::new(
                s.name().clone(),
                ca.len(),
                ca.len() * 2,
                DataType::Int64,
            );
            for opt in ca.into_iter() {
                match decoded(opt) {
                    Some(g) => {
                        let mut keys: Vec<i64> = index
                            .within_distance(&g, dist)
                            .into_iter()
                            .map(|i| index.key(i))
                            .collect();
                        keys.sort_unstable();
                        builder.append_slice(&keys);
                    }
                    None => builder.append_null(),
                }
            }
            Ok(builder.finish().into_series().into())
        },
        out_field(DataType::List(Box::new(DataType::Int64))),
    )
}

/// Straight-line distance between two point columns, in meters
/// (1 meter = 0.000009 degree).
pub fn line_distance_m_expr(a: Expr, b: Expr) -> Expr {
    a.map_many(
        |cols: &mut [Column]| {
            let sa = cols[0].as_materialized_series().clone();
            let sb = cols[1].as_materialized_series().clone();
            let ca = sa.binary()?;
            let cb = sb.binary()?;
            let out: Float64Chunked = ca
                .into_iter()
                .zip(cb.into_iter())
                .map(|(x, y)| match (decoded(x), decoded(y)) {
                    (Some(gx), Some(gy)) => Some(geom::distance(&gx, &gy) / 0.000009),
                    _ => None,
                })
                .collect();
            Ok(out.into_series().into())
        },
        &[b],
        out_field_many(DataType::Float64),
    )
}

/// `num / den` with nulls where the denominator is zero or null.
pub fn ratio_expr(num: Expr, den: Expr) -> Expr {
    num.map_many(
        |cols: &mut [Column]| {
            let sn = cols[0]
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let sd = cols[1]
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            let n = sn.f64()?;
            let d = sd.f64()?;
            let out: Float64Chunked = n
                .into_iter()
                .zip(d.into_iter())
                .map(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) if b != 0.0 => Some(a / b),
                    _ => None,
                })
                .collect();
            Ok(out.into_series().into())
        },
        &[den],
        out_field_many(DataType::Float64),
    )
}

/// Area of each geometry in a WKB column.
pub fn area_expr(e: Expr) -> Expr {
    e.map(
        |col: Column| {
            let s = col.as_materialized_series().clone();
            let ca = s.binary()?;
            let out: Float64Chunked = ca
                .into_iter()
                .map(|opt| decoded(opt).map(|g| geom::area(&g)))
                .collect();
            Ok(out.into_series().into())
        },
        out_field(DataType::Float64),
    )
}

/// Whether two WKB columns intersect, row by row.
pub fn intersects_pair_expr(a: Expr, b: Expr) -> Expr {
    a.map_many(
        |cols: &mut [Column]| {
            let sa = cols[0].as_materialized_series().clone();
            let sb = cols[1].as_materialized_series().clone();
            let ca = sa.binary()?;
            let cb = sb.binary()?;
            let out: BooleanChunked = ca
                .into_iter()
                .zip(cb.into_iter())
                .map(|(x, y)| match (decoded(x), decoded(y)) {
                    (Some(gx), Some(gy)) => Some(geom::intersects(&gx, &gy)),
                    _ => Some(false),
                })
                .collect();
            Ok(out.into_series().into())
        },
        &[b],
        out_field_many(DataType::Boolean),
    )
}

/// Area of the pairwise intersection of two WKB columns.
pub fn overlap_area_expr(a: Expr, b: Expr) -> Expr {
    a.map_many(
        |cols: &mut [Column]| {
            let sa = cols[0].as_materialized_series().clone();
            let sb = cols[1].as_materialized_series().clone();
            let ca = sa.binary()?;
            let cb = sb.binary()?;
            let out: Float64Chunked = ca
                .into_iter()
                .zip(cb.into_iter())
                .map(|(x, y)| match (decoded(x), decoded(y)) {
                    (Some(gx), Some(gy)) => Some(geom::area(&geom::intersection(&gx, &gy))),
                    _ => None,
                })
                .collect();
            Ok(out.into_series().into())
        },
        &[b],
        out_field_many(DataType::Float64),
    )
}

/// Convex-hull area of a list-of-WKB-points column (the q5 aggregate).
pub fn hull_area_list_expr(e: Expr) -> Expr {
    e.map(
        |col: Column| {
            let s = col.as_materialized_series().clone();
            let lists = s.list()?;
            let mut out: Vec<Option<f64>> = Vec::with_capacity(lists.len());
            for opt in lists.into_iter() {
                out.push(match opt {
                    Some(inner) => {
                        let bins = inner.binary()?;
                        let mut points = Vec::with_capacity(bins.len());
                        for wkb in bins.into_iter().flatten() {
                            if let Ok(Geometry::Point(p)) = geom::from_wkb(wkb) {
                                points.push(p);
                            }
                        }
                        Some(geom::hull_area(&MultiPoint(points)))
                    }
                    None => None,
                });
            }
            Ok(Series::new(s.name().clone(), out).into())
        },
        out_field(DataType::Float64),
    )
}
