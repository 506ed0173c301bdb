//! Spatial scalar UDFs for the DataFusion session.
//!
//! The dataset stores geometry as WKB, so every function takes the binary
//! column directly and delegates the actual geometry work to [`crate::geom`].
//! `st_collect` exists because DataFusion has no geometry aggregate: the
//! dialect aggregates with `array_agg` and collects the list into a
//! multipoint here.

use std::sync::Arc;

use datafusion::arrow::array::{Array, BinaryBuilder, BooleanBuilder, Float64Builder};
use datafusion::arrow::datatypes::{DataType, Field};
use datafusion::common::cast::{as_binary_array, as_float64_array, as_list_array, as_string_array};
use datafusion::error::{DataFusionError, Result};
use datafusion::logical_expr::{ColumnarValue, Volatility};
use datafusion::prelude::{create_udf, SessionContext};
use geo::{Geometry, MultiPoint, Point};

use crate::geom;

pub fn register_all(ctx: &SessionContext) {
    let bin = DataType::Binary;
    let f64t = DataType::Float64;
    let boolt = DataType::Boolean;
    let bin_list = DataType::List(Arc::new(Field::new("item", DataType::Binary, true)));

    ctx.register_udf(create_udf(
        "st_geomfromtext",
        vec![DataType::Utf8],
        bin.clone(),
        Volatility::Immutable,
        Arc::new(st_geomfromtext),
    ));
    ctx.register_udf(create_udf(
        "st_distance",
        vec![bin.clone(), bin.clone()],
        f64t.clone(),
        Volatility::Immutable,
        Arc::new(st_distance),
    ));
    ctx.register_udf(create_udf(
        "st_dwithin",
        vec![bin.clone(), bin.clone(), f64t.clone()],
        boolt.clone(),
        Volatility::Immutable,
        Arc::new(st_dwithin),
    ));
    ctx.register_udf(create_udf(
        "st_within",
        vec![bin.clone(), bin.clone()],
        boolt.clone(),
        Volatility::Immutable,
        Arc::new(st_within),
    ));
    ctx.register_udf(create_udf(
        "st_intersects",
        vec![bin.clone(), bin.clone()],
        boolt,
        Volatility::Immutable,
        Arc::new(st_intersects),
    ));
    ctx.register_udf(create_udf(
        "st_area",
        vec![bin.clone()],
        f64t.clone(),
        Volatility::Immutable,
        Arc::new(st_area),
    ));
    ctx.register_udf(create_udf(
        "st_intersection",
        vec![bin.clone(), bin.clone()],
        bin.clone(),
        Volatility::Immutable,
        Arc::new(st_intersection),
    ));
    ctx.register_udf(create_udf(
        "st_makeline",
        vec![bin.clone(), bin.clone()],
        bin.clone(),
        Volatility::Immutable,
        Arc::new(st_makeline),
    ));
    ctx.register_udf(create_udf(
        "st_length",
        vec![bin.clone()],
        f64t.clone(),
        Volatility::Immutable,
        Arc::new(st_length),
    ));
    ctx.register_udf(create_udf(
        "st_x",
        vec![bin.clone()],
        f64t.clone(),
        Volatility::Immutable,
        Arc::new(st_x),
    ));
    ctx.register_udf(create_udf(
        "st_y",
        vec![bin.clone()],
        f64t,
        Volatility::Immutable,
        Arc::new(st_y),
    ));
    ctx.register_udf(create_udf(
        "st_collect",
        vec![bin_list],
        bin.clone(),
        Volatility::Immutable,
        Arc::new(st_collect),
    ));
    ctx.register_udf(create_udf(
        "st_convexhull",
        vec![bin.clone()],
        bin,
        Volatility::Immutable,
        Arc::new(st_convexhull),
    ));
}

fn decode(bytes: &[u8]) -> Result<Geometry<f64>> {
    geom::from_wkb(bytes).map_err(|e| DataFusionError::Execution(format!("wkb decode: {e}")))
}

fn encode(geometry: &Geometry<f64>) -> Result<Vec<u8>> {
    geom::to_wkb(geometry).map_err(|e| DataFusionError::Execution(format!("wkb encode: {e}")))
}

fn unary_f64(
    args: &[ColumnarValue],
    f: impl Fn(&Geometry<f64>) -> Option<f64>,
) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let a = as_binary_array(&arrays[0])?;
    let mut out = Float64Builder::with_capacity(a.len());
    for i in 0..a.len() {
        if a.is_null(i) {
            out.append_null();
            continue;
        }
        out.append_option(f(&decode(a.value(i))?));
    }
    Ok(ColumnarValue::Array(Arc::new(out.finish())))
}

fn pair_f64(
    args: &[ColumnarValue],
    f: impl Fn(&Geometry<f64>, &Geometry<f64>) -> f64,
) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let a = as_binary_array(&arrays[0])?;
    let b = as_binary_array(&arrays[1])?;
    let mut out = Float64Builder::with_capacity(a.len());
    for i in 0..a.len() {
        if a.is_null(i) || b.is_null(i) {
            out.append_null();
            continue;
        }
        out.append_value(f(&decode(a.value(i))?, &decode(b.value(i))?));
    }
    Ok(ColumnarValue::Array(Arc::new(out.finish())))
}

fn pair_bool(
    args: &[ColumnarValue],
    f: impl Fn(&Geometry<f64>, &Geometry<f64>) -> bool,
) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let a = as_binary_array(&arrays[0])?;
    let b = as_binary_array(&arrays[1])?;
    let mut out = BooleanBuilder::with_capacity(a.len());
    for i in 0..a.len() {
        if a.is_null(i) || b.is_null(i) {
            out.append_value(false);
            continue;
        }
        out.append_value(f(&decode(a.value(i))?, &decode(b.value(i))?));
    }
    Ok(ColumnarValue::Array(Arc::new(out.finish())))
}

fn pair_wkb(
    args: &[ColumnarValue],
    f: impl Fn(&Geometry<f64>, &Geometry<f64>) -> Option<Geometry<f64>>,
) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let a = as_binary_array(&arrays[0])?;
    let b = as_binary_array(&arrays[1])?;
    let mut out = BinaryBuilder::new();
    for i in 0..a.len() {
        if a.is_null(i) || b.is_null(i) {
            out.append_null();
            continue;
        }
        match f(&decode(a.value(i))?, &decode(b.value(i))?) {
            Some(g) => out.append_value(encode(&g)?),
            None => out.append_null(),
        }
    }
    Ok(ColumnarValue::Array(Arc::new(out.finish())))
}

fn st_geomfromtext(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let texts = as_string_array(&arrays[0])?;
    let mut out = BinaryBuilder::new();
    for i in 0..texts.len() {
        if texts.is_null(i) {
            out.append_null();
            continue;
        }
        let geometry = geom::from_wkt(texts.value(i))
            .map_err(|e| DataFusionError::Execution(format!("wkt parse: {e}")))?;
        out.append_value(encode(&geometry)?);
    }
    Ok(ColumnarValue::Array(Arc::new(out.finish())))
}

fn st_distance(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    pair_f64(args, |a, b| geom::distance(a, b))
}

fn st_dwithin(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let a = as_binary_array(&arrays[0])?;
    let b = as_binary_array(&arrays[1])?;
    let d = as_float64_array(&arrays[2])?;
    let mut out = BooleanBuilder::with_capacity(a.len());
    for i in 0..a.len() {
        if a.is_null(i) || b.is_null(i) || d.is_null(i) {
            out.append_value(false);
            continue;
        }
        out.append_value(geom::dwithin(
            &decode(a.value(i))?,
            &decode(b.value(i))?,
            d.value(i),
        ));
    }
    Ok(ColumnarValue::Array(Arc::new(out.finish())))
}

fn st_within(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    pair_bool(args, |a, b| geom::within(a, b))
}

fn st_intersects(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    pair_bool(args, |a, b| geom::intersects(a, b))
}

fn st_area(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    unary_f64(args, |g| Some(geom::area(g)))
}

fn st_intersection(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    pair_wkb(args, |a, b| Some(geom::intersection(a, b)))
}

fn st_makeline(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    pair_wkb(args, |a, b| geom::make_line(a, b).map(Geometry::LineString))
}

fn st_length(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    unary_f64(args, |g| Some(geom::length(g)))
}

fn st_x(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    unary_f64(args, geom::point_x)
}

fn st_y(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    unary_f64(args, geom::point_y)
}

fn st_collect(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let lists = as_list_array(&arrays[0])?;
    let mut out = BinaryBuilder::new();
    for i in 0..lists.len() {
        if lists.is_null(i) {
            out.append_null();
            continue;
        }
        let values = lists.value(i);
        let bins = as_binary_array(&values)?;
        let mut points: Vec<Point<f64>> = Vec::with_capacity(bins.len());
        for j in 0..bins.len() {
            if bins.is_null(j) {
                continue;
            }
            if let Geometry::Point(p) = decode(bins.value(j))? {
                points.push(p);
            }
        }
        out.append_value(encode(&Geometry::MultiPoint(MultiPoint(points)))?);
    }
    Ok(ColumnarValue::Array(Arc::new(out.finish())))
}

fn st_convexhull(args: &[ColumnarValue]) -> Result<ColumnarValue> {
    let arrays = ColumnarValue::values_to_arrays(args)?;
    let a = as_binary_array(&arrays[0])?;
    let mut out = BinaryBuilder::new();
    for i in 0..a.len() {
        if a.is_null(i) {
            out.append_null();
            continue;
        }
        let hull = geom::convex_hull(&decode(a.value(i))?);
        out.append_value(encode(&Geometry::Polygon(hull))?);
    }
    Ok(ColumnarValue::Array(Arc::new(out.finish())))
}
