//! Unit tests for the gridstack building blocks
//!
//! These cover the pieces that work without touching the filesystem:
//! errors, cell masking, statistics, interpolation, tables and configuration.

use gridstack::{
    config::{EngineConfig, RasterKind, ViewOverrides, ViewSpec},
    errors::GridError,
    header::GridHeader,
    interpolation::{
        bilinear_interpolate, cubic_interpolate, nearest_interpolate, resample_grid, ResampleMethod,
    },
    nodata::{CellValue, Cells},
    parallel::{get_parallel_info, ParallelConfig},
    statistics::{percentile, reduce_stack, stack_layers, std_dev, BasicStats, StatOperation},
    table::{render_value, CategoryRow, CategoryTable, OrderedFields, TAB20},
};
use ndarray::{array, Array2};
use serde_json::Value;
use std::collections::BTreeSet;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_error_types() {
    let generic_err = GridError::Generic("Test error".to_string());
    assert_eq!(format!("{}", generic_err), "Test error");

    let member_err = GridError::MemberNotFound {
        name: "ndvi".to_string(),
    };
    assert!(format!("{}", member_err).contains("member 'ndvi' not found"));

    let parse_err = GridError::parse("grid.asc", 3, "bad value");
    let message = format!("{}", parse_err);
    assert!(message.contains("grid.asc"));
    assert!(message.contains("line 3"));
    assert!(message.contains("bad value"));

    let shape_err = GridError::ShapeMismatch {
        expected: (2, 2),
        found: (3, 3),
    };
    assert!(format!("{}", shape_err).contains("(2, 2)"));
}

#[test]
fn test_parallel_config() {
    let default_config = ParallelConfig::default();
    assert!(default_config.num_threads.is_none());

    let config_4 = ParallelConfig::with_threads(4);
    assert_eq!(config_4.num_threads, Some(4));

    let all_cores_config = ParallelConfig::all_cores();
    assert!(all_cores_config.num_threads.unwrap() > 0);

    assert!(default_config.current_threads() > 0);

    let info = get_parallel_info();
    assert!(info.available_cores > 0);
    assert!(info.current_threads > 0);
}

#[test]
fn test_float_cells_absent_form() {
    let mut cells = Cells::from_values(array![[1.0_f32, -9999.0], [3.0, 4.0]]);
    cells.to_internal(-9999.0);
    assert_eq!(cells.get(0, 1), None);
    assert!(cells.values()[[0, 1]].is_nan());
    assert_eq!(cells.absent_count(), 1);

    // a second conversion changes nothing
    cells.to_internal(-9999.0);
    assert_eq!(cells.absent_count(), 1);
    assert_eq!(cells.get(1, 1), Some(4.0));

    let external = cells.to_external(-9999.0).expect("external copy");
    assert_eq!(external, array![[1.0_f32, -9999.0], [3.0, 4.0]]);
    // the cells themselves stay internal
    assert!(cells.is_absent(0, 1));
}

#[test]
fn test_integer_cells_use_mask() {
    let mut cells = Cells::from_values(array![[1_i32, -9999], [-9999, 4]]);
    cells.to_internal(-9999.0);
    assert_eq!(cells.absent_count(), 2);
    assert_eq!(
        cells.absent_mask(),
        array![[false, true], [true, false]]
    );
    assert_eq!(cells.valid_values(), vec![1.0, 4.0]);

    let widened = cells.to_f64();
    assert!(widened[[0, 1]].is_nan());
    assert_eq!(widened[[1, 1]], 4.0);

    assert_eq!(
        cells.to_external(-9999.0).expect("external copy"),
        array![[1, -9999], [-9999, 4]]
    );
}

#[test]
fn test_fractional_nodata_never_matches_integer_cells() {
    let mut cells = Cells::from_values(array![[-9999_i32, 2]]);
    cells.to_internal(-9999.5);
    assert_eq!(cells.absent_count(), 0);
    assert_eq!(i32::exact_from(-9999.5), None);
    assert_eq!(i32::exact_from(-9999.0), Some(-9999));
}

#[test]
fn test_unrepresentable_nodata_fails_export() {
    let mut cells = Cells::<u8>::from_f64(&array![[1.0, f64::NAN]]);
    cells.to_internal(-9999.0);
    assert_eq!(cells.absent_count(), 1);
    assert!(cells.to_external(-9999.0).is_err());
    assert!(cells.to_external(255.0).is_ok());
}

#[test]
fn test_mark_absent_and_map_valid() {
    let mut cells = Cells::<u16>::from_values(array![[1, 2], [3, 4]]);
    cells.mark_absent(&array![[true, false], [false, false]]);
    cells.map_valid(|v| v * 10);
    assert_eq!(cells.get(0, 0), None);
    assert_eq!(cells.get(0, 1), Some(20));
    assert_eq!(cells.get(1, 1), Some(40));
}

#[test]
fn test_header_geometry() {
    let header = GridHeader::new(3, 2, 100.0, 200.0, 10.0, -9999.0);
    assert_eq!(header.shape(), (2, 3));
    assert_eq!(header.cell_count(), 6);

    let bbox = header.bbox();
    assert_eq!(bbox.xmin, 100.0);
    assert_eq!(bbox.xmax, 130.0);
    assert_eq!(bbox.ymin, 200.0);
    assert_eq!(bbox.ymax, 220.0);

    // row 0 is the northern row
    assert_eq!(header.cell_center(0, 0), (105.0, 215.0));
    assert_eq!(header.cell_center(1, 2), (125.0, 205.0));

    let (row, col) = header.fractional_index(125.0, 205.0);
    assert!(approx(row, 1.0));
    assert!(approx(col, 2.0));
}

#[test]
fn test_stat_operation_parsing() {
    assert_eq!("mean".parse::<StatOperation>().unwrap(), StatOperation::Mean);
    assert_eq!("SD".parse::<StatOperation>().unwrap(), StatOperation::Std);
    assert_eq!("std".parse::<StatOperation>().unwrap(), StatOperation::Std);
    assert_eq!(
        "p90".parse::<StatOperation>().unwrap(),
        StatOperation::Percentile(90.0)
    );
    assert!("p150".parse::<StatOperation>().is_err());
    assert!("mode".parse::<StatOperation>().is_err());

    assert_eq!(StatOperation::Percentile(90.0).to_string(), "p90");
    assert_eq!(StatOperation::Percentile(90.0).label(), "90th percentile");
    assert_eq!(StatOperation::Std.label(), "SD");
    assert_eq!(StatOperation::Median.as_str(), "median");
}

#[test]
fn test_stat_operations_apply() {
    let values = [1.0, 2.0, 3.0, 4.0];
    assert!(approx(StatOperation::Mean.apply(&values), 2.5));
    assert!(approx(StatOperation::Sum.apply(&values), 10.0));
    assert!(approx(StatOperation::Min.apply(&values), 1.0));
    assert!(approx(StatOperation::Max.apply(&values), 4.0));
    assert!(approx(StatOperation::Median.apply(&values), 2.5));
    assert!(approx(StatOperation::Std.apply(&values), 1.25_f64.sqrt()));
    assert!(StatOperation::Mean.apply(&[]).is_nan());
}

#[test]
fn test_percentile_linear_between_ranks() {
    let values = [4.0, 1.0, 3.0, 2.0];
    assert!(approx(percentile(&values, 0.0), 1.0));
    assert!(approx(percentile(&values, 25.0), 1.75));
    assert!(approx(percentile(&values, 75.0), 3.25));
    assert!(approx(percentile(&values, 100.0), 4.0));
    assert!(approx(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0));
}

#[test]
fn test_basic_stats() {
    let stats = BasicStats::from_values(&[1.0, f64::NAN, 2.0, 3.0, 4.0]);
    assert_eq!(stats.count, 4);
    assert!(approx(stats.sum, 10.0));
    assert!(approx(stats.mean, 2.5));
    assert!(approx(stats.min, 1.0));
    assert!(approx(stats.p25, 1.75));
    assert!(approx(stats.median, 2.5));
    assert!(approx(stats.p75, 3.25));
    assert!(approx(stats.max, 4.0));

    let fields = stats.to_fields(Some("elev"));
    let keys: Vec<&str> = fields.keys().collect();
    assert_eq!(
        keys,
        vec![
            "elev_count",
            "elev_sum",
            "elev_mean",
            "elev_sd",
            "elev_min",
            "elev_p25",
            "elev_median",
            "elev_p75",
            "elev_max"
        ]
    );
    assert_eq!(fields.get("elev_count"), Some(&Value::from(4_usize)));

    let empty = BasicStats::from_values(&[f64::NAN]);
    assert_eq!(empty.count, 0);
    assert!(empty.mean.is_nan());
}

#[test]
fn test_reduce_stack_mean_with_absent_cells() {
    let layers = vec![
        array![[1.0, 2.0], [3.0, 4.0]],
        array![[5.0, 6.0], [7.0, f64::NAN]],
    ];

    let skipped = reduce_stack(&layers, StatOperation::Mean, true).unwrap();
    assert_eq!(skipped, array![[3.0, 4.0], [5.0, 4.0]]);

    let propagated = reduce_stack(&layers, StatOperation::Mean, false).unwrap();
    assert!(approx(propagated[[0, 0]], 3.0));
    assert!(propagated[[1, 1]].is_nan());
}

#[test]
fn test_reduce_stack_rejects_mismatched_layers() {
    let layers = vec![Array2::<f64>::zeros((2, 2)), Array2::<f64>::zeros((3, 2))];
    assert!(matches!(
        stack_layers(&layers),
        Err(GridError::ShapeMismatch { .. })
    ));
    assert!(reduce_stack(&[], StatOperation::Sum, true).is_err());

    let stacked = stack_layers(&[array![[1.0, 2.0]], array![[3.0, 4.0]]]).unwrap();
    assert_eq!(stacked, array![[1.0, 2.0], [3.0, 4.0]]);
}

#[test]
fn test_bilinear_interpolation() {
    let data = array![[0.0, 1.0], [2.0, 3.0]];
    assert!(approx(bilinear_interpolate(&data, 0.5, 0.5), 1.5));
    assert!(approx(bilinear_interpolate(&data, 0.0, 1.0), 1.0));
    assert!(approx(bilinear_interpolate(&data, 1.0, 0.25), 2.25));
    // outside the hull of cell centers
    assert!(bilinear_interpolate(&data, -0.5, 0.5).is_nan());

    // absent corners are dropped and the rest reweighted
    let holed = array![[0.0, f64::NAN], [2.0, 3.0]];
    assert!(approx(bilinear_interpolate(&holed, 0.5, 0.5), 5.0 / 3.0));
    assert!(approx(bilinear_interpolate(&holed, 0.0, 0.0), 0.0));
    assert!(approx(bilinear_interpolate(&holed, 1.0, 1.0), 3.0));
    assert!(bilinear_interpolate(&holed, 0.0, 1.0).is_nan());
}

#[test]
fn test_nearest_interpolation_skips_absent_cells() {
    let data = array![[1.0, f64::NAN, 3.0], [4.0, 5.0, 6.0]];
    assert_eq!(nearest_interpolate(&data, 0.0, 0.1), 1.0);
    assert_eq!(nearest_interpolate(&data, 1.2, 2.4), 6.0);
    // (0, 1) is absent; the closest valid center is (1, 1)
    assert_eq!(nearest_interpolate(&data, 0.1, 1.0), 5.0);
    // outside the lattice resolves to the edge
    assert_eq!(nearest_interpolate(&data, -3.0, 10.0), 3.0);

    let empty = Array2::from_elem((2, 2), f64::NAN);
    assert!(nearest_interpolate(&empty, 0.0, 0.0).is_nan());
}

#[test]
fn test_cubic_interpolation_reproduces_planes() {
    let data = Array2::from_shape_fn((4, 4), |(r, c)| r as f64 + 2.0 * c as f64);
    assert!((cubic_interpolate(&data, 1.5, 1.5) - 4.5).abs() < 1e-9);
    assert!((cubic_interpolate(&data, 1.25, 2.0) - 5.25).abs() < 1e-9);
    assert!(cubic_interpolate(&data, 5.0, 1.0).is_nan());

    let mut holed = data.clone();
    holed[[1, 1]] = f64::NAN;
    assert!((cubic_interpolate(&holed, 2.0, 2.0) - 6.0).abs() < 1e-9);
    assert!(cubic_interpolate(&holed, 1.0, 1.0).is_nan());
}

#[test]
fn test_resample_grid_to_coarser_header() {
    let source = GridHeader::new(2, 2, 0.0, 0.0, 10.0, -9999.0);
    let target = GridHeader::new(1, 1, 0.0, 0.0, 20.0, -9999.0);
    let data = array![[1.0, 2.0], [3.0, 4.0]];

    let linear = resample_grid(&data, &source, &target, ResampleMethod::Linear).unwrap();
    assert_eq!(linear.dim(), (1, 1));
    assert!(approx(linear[[0, 0]], 2.5));

    let wrong = Array2::<f64>::zeros((3, 3));
    assert!(resample_grid(&wrong, &source, &target, ResampleMethod::Nearest).is_err());
}

#[test]
fn test_resample_method_parsing() {
    assert_eq!(
        "nearest".parse::<ResampleMethod>().unwrap(),
        ResampleMethod::Nearest
    );
    assert_eq!(
        "bilinear".parse::<ResampleMethod>().unwrap(),
        ResampleMethod::Linear
    );
    assert_eq!(
        "Cubic".parse::<ResampleMethod>().unwrap(),
        ResampleMethod::Cubic
    );
    assert!("spline".parse::<ResampleMethod>().is_err());
    assert_eq!(ResampleMethod::default(), ResampleMethod::Linear);
}

#[test]
fn test_category_table_normalization() {
    let table = CategoryTable::new(vec![
        CategoryRow::new(3, " Water ", "WAT"),
        CategoryRow::new(1, "Urban", " URB ").with_color("gray"),
        CategoryRow::new(2, "Forest", "FOR"),
    ])
    .unwrap();

    assert_eq!(table.ids(), vec![1, 2, 3]);
    let water = table.get(3).unwrap();
    assert_eq!(water.name, "Water");
    assert_eq!(water.color, TAB20[2]);
    assert_eq!(table.get(1).unwrap().alias, "URB");
    assert_eq!(table.get(1).unwrap().color, "gray");
    assert_eq!(table.max_id(), Some(3));
    assert!(!table.contains(4));

    let duplicated = CategoryTable::new(vec![
        CategoryRow::new(1, "A", "a"),
        CategoryRow::new(1, "B", "b"),
    ]);
    assert!(matches!(
        duplicated,
        Err(GridError::DuplicateCategory { id: 1 })
    ));
}

#[test]
fn test_category_table_color_ramp_fills_gaps() {
    let table = CategoryTable::new(vec![
        CategoryRow::new(1, "A", "a").with_color("red"),
        CategoryRow::new(3, "C", "c").with_color("blue"),
    ])
    .unwrap();
    assert_eq!(
        table.color_ramp(),
        vec![(1, "red".to_string()), (3, "blue".to_string())]
    );
    assert!(CategoryTable::empty().color_ramp().is_empty());

    let view = ViewSpec::default().with_overrides(&ViewOverrides {
        colors: Some(table.color_ramp()),
        ..ViewOverrides::default()
    });
    assert_eq!(view.color_of(0), Some("red"));
    assert_eq!(view.color_of(1), Some("red"));
    assert_eq!(view.color_of(2), Some("blue"));
    assert_eq!(view.color_of(3), Some("blue"));
    assert_eq!(view.color_of(4), None);
}

#[test]
fn test_sparse_category_ids_keep_ramp_small() {
    let table = CategoryTable::new(vec![
        CategoryRow::new(1, "Low", "LO"),
        CategoryRow::new(200_000_000, "High", "HI"),
    ])
    .unwrap();
    let ramp = table.color_ramp();
    assert_eq!(ramp.len(), 2);
    assert_eq!(ramp[1].0, 200_000_000);

    let view = ViewSpec::default().with_overrides(&ViewOverrides {
        colors: Some(ramp.clone()),
        ..ViewOverrides::default()
    });
    assert_eq!(view.color_of(150_000_000), Some(ramp[1].1.as_str()));
}

#[test]
fn test_category_table_fields_and_union() {
    let mut first = CategoryTable::new(vec![
        CategoryRow::new(1, "Urban", "URB"),
        CategoryRow::new(2, "Forest", "FOR"),
    ])
    .unwrap();
    first.set_field(2, "Cell_count", 12).unwrap();
    assert!(matches!(
        first.set_field(9, "Cell_count", 1),
        Err(GridError::CategoryNotFound { id: 9 })
    ));
    assert_eq!(first.field_names(), vec!["Cell_count".to_string()]);

    let second = CategoryTable::new(vec![
        CategoryRow::new(2, "Woodland", "WDL"),
        CategoryRow::new(5, "Water", "WAT"),
    ])
    .unwrap();
    let merged = CategoryTable::union([&first, &second]);
    assert_eq!(merged.ids(), vec![1, 2, 5]);
    assert_eq!(merged.get(2).unwrap().name, "Woodland");

    let mut retained = merged.clone();
    retained.retain_ids(&BTreeSet::from([1, 5]));
    assert_eq!(retained.ids(), vec![1, 5]);
}

#[test]
fn test_preset_tables() {
    let aoi = CategoryTable::aoi();
    assert_eq!(aoi.ids(), vec![1, 2]);
    assert_eq!(aoi.get(1).unwrap().color, "magenta");

    let ldd = CategoryTable::ldd();
    assert_eq!(ldd.len(), 9);
    assert_eq!(ldd.get(5).unwrap().alias, "5-C");

    let change = CategoryTable::lulc_change();
    let names: Vec<&str> = change.rows().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Retraction", "Stable", "Expansion"]);

    let zones = CategoryTable::zones(&BTreeSet::from([4, 7]), "Zone", "ZN");
    assert_eq!(zones.get(7).unwrap().name, "Zone 7");
    assert_eq!(zones.get(4).unwrap().alias, "ZN4");
}

#[test]
fn test_ordered_fields() {
    let mut fields = OrderedFields::new().with("b", 1).with("a", "x");
    fields.insert("b", 2.5);
    let keys: Vec<&str> = fields.keys().collect();
    assert_eq!(keys, vec!["b", "a"]);
    assert_eq!(fields.get_f64("b"), Some(2.5));
    assert_eq!(fields.remove("a"), Some(Value::from("x")));
    assert_eq!(fields.len(), 1);

    assert_eq!(render_value(&Value::Null), "");
    assert_eq!(render_value(&Value::from("text")), "text");
    assert_eq!(render_value(&Value::from(3)), "3");
}

#[test]
fn test_kind_defaults_and_views() {
    let ndvi = RasterKind::Ndvi.defaults();
    assert_eq!(ndvi.clamp, Some((-1.0, 1.0)));
    assert_eq!(ndvi.varalias, "NDVI");
    assert!(RasterKind::Lulc.is_categorical());
    assert!(!RasterKind::Elevation.is_categorical());
    assert!(RasterKind::Zones.derives_table());
    assert!(RasterKind::Aoi.defaults().preset_table.is_some());
    assert_eq!(RasterKind::ALL.len(), 19);
    assert_eq!(RasterKind::LulcChange.to_string(), "lulc-change");

    let view = ViewSpec::for_kind(RasterKind::Et24h);
    assert_eq!(view.vmax, Some(15.0));
    assert_eq!(view.nbins, ViewSpec::DEFAULT_NBINS);

    let changed = view.with_overrides(&ViewOverrides {
        cmap: Some("viridis".to_string()),
        nbins: Some(10),
        ..ViewOverrides::default()
    });
    assert_eq!(changed.cmap, "viridis");
    assert_eq!(changed.nbins, 10);
    assert_eq!(changed.vmax, Some(15.0));
}

#[test]
fn test_engine_config_geographic_cells() {
    let config = EngineConfig::default();
    assert!(config.is_geographic(Some("GEOGCS[\"WGS 84\"]")));
    assert!(!config.is_geographic(Some("PROJCS[\"SIRGAS 2000 / UTM 22S\"]")));
    assert!(!config.is_geographic(None));

    assert!(approx(config.cell_area_m2(30.0, None), 900.0));
    let side = config.cell_side_meters(0.001, Some("GEOGCS[\"WGS 84\"]"));
    assert!(approx(side, 111.111));
}
