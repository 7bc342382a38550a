use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use tdspu::catalog::CatalogLayout;
use tdspu::testing::MemoryReader;
use tdspu::{
    CatalogRun, Error, FunctionRegistry, ListEnumerator, Pipeline, Renderer, RunConfig,
    WalkDirEnumerator,
};

const UNITS: &str = "days since 1850-01-01";

const CONFIG: &str = r#"
drs: [project, model, experiment, table, ensemble, variable]
grouping:
  facets: [model, table, ensemble, variable]
matching:
  temporal: [table]
  ignore: []
  projects:
    CMIP5:
      ignore: [ensemble]
output:
  ncml: "{model}/{table}/{variable}_{ensemble}.ncml"
catalog:
  name: test
  filter_facets: [variable, table]
"#;

struct Tree {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    dest: PathBuf,
}

fn touch(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
    fs::write(&path, vec![0u8; 100]).expect("write");
    path
}

fn tree() -> (Tree, MemoryReader) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path().join("data");
    let dest = tmp.path().join("out");

    let d1 = touch(&root, "CMIP5/M/hist/day/r1i1p1/tas/tas_day_M_hist_r1i1p1_1850.nc");
    let d2 = touch(&root, "CMIP5/M/hist/day/r1i1p1/tas/tas_day_M_hist_r1i1p1_1851.nc");
    let m1 = touch(&root, "CMIP5/M/hist/Amon/r1i1p1/tas/tas_Amon_M_hist_r1i1p1_1850.nc");
    let _fx = touch(&root, "CMIP5/M/hist/fx/r0i0p0/areacella/areacella_fx_M_hist_r0i0p0.nc");
    let _bad = touch(&root, "CMIP5/M/hist/day/stray.nc");

    let reader = MemoryReader::new()
        .with_time(&d1, UNITS, 365, 0.5, 1.0)
        .with_time(&d2, UNITS, 365, 365.5, 1.0)
        .with_time(&m1, UNITS, 12, 15.5, 30.0);
    (Tree { _tmp: tmp, root, dest }, reader)
}

fn pipeline(config: RunConfig, reader: MemoryReader) -> Pipeline {
    let renderer = Renderer::new(&FunctionRegistry::builtin()).expect("built-in templates");
    Pipeline::new(config, renderer, Arc::new(reader))
}

fn member_locations(xml: &str) -> Vec<String> {
    let start = xml.find("type=\"joinExisting\"").expect("joinExisting");
    let end = start + xml[start..].find("</aggregation>").expect("end");
    Regex::new(r#"location="([^"]*)""#)
        .expect("regex")
        .captures_iter(&xml[start..end])
        .map(|c| c[1].to_string())
        .collect()
}

#[tokio::test]
async fn test_ncml_run_writes_documents_and_catalog() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    let config = RunConfig::from_yaml(CONFIG)?;
    let pipeline = pipeline(config, reader);

    let run = CatalogRun::default();
    let report = pipeline
        .run_ncml(&tree.root, &WalkDirEnumerator::new(), &tree.dest, Some(&run))
        .await?;

    assert!(report.is_success(), "{report}");
    assert_eq!(report.accepted, 4);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].kind, "SchemaMismatch");
    assert_eq!(report.groups, 2);
    assert_eq!(report.fixed, 1);
    assert_eq!(report.written.len(), 3);
    assert_eq!(report.notices.len(), 1);
    assert_eq!(report.notices[0].kind, "InsufficientSamples");

    let day = fs::read_to_string(tree.dest.join("M/day/tas_r1i1p1.ncml"))?;
    let locations = member_locations(&day);
    assert_eq!(locations.len(), 2);
    assert!(locations[0].ends_with("tas_day_M_hist_r1i1p1_1850.nc"));
    assert!(locations[1].ends_with("tas_day_M_hist_r1i1p1_1851.nc"));
    assert!(day.contains(r#"<values start="0.5" increment="365.0"/>"#));
    assert!(day.contains(r#"<attribute name="size" type="long" value="300"/>"#));

    let mon = fs::read_to_string(tree.dest.join("M/Amon/tas_r1i1p1.ncml"))?;
    assert!(!mon.contains("increment="));
    for doc in [&day, &mon] {
        assert!(doc.contains("areacella_fx_M_hist_r0i0p0.nc"));
    }

    let catalog = fs::read_to_string(tree.dest.join("catalog.xml"))?;
    assert!(catalog.contains(r#"<catalog name="test""#));
    assert_eq!(catalog.matches("<dataset ").count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_output_does_not_stop_siblings() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    fs::create_dir_all(tree.dest.join("M"))?;
    fs::write(tree.dest.join("M/Amon"), b"in the way")?;

    let pipeline = pipeline(RunConfig::from_yaml(CONFIG)?, reader);
    let report = pipeline
        .run_ncml(&tree.root, &WalkDirEnumerator::new(), &tree.dest, None)
        .await?;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "OutputWriteFailure");
    assert_eq!(report.written, vec![tree.dest.join("M/day/tas_r1i1p1.ncml")]);
    Ok(())
}

#[tokio::test]
async fn test_regeneration_is_identical() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    let pipeline = pipeline(RunConfig::from_yaml(CONFIG)?, reader);

    _ = pipeline
        .run_ncml(&tree.root, &WalkDirEnumerator::new(), &tree.dest, None)
        .await?;
    let first = fs::read_to_string(tree.dest.join("M/day/tas_r1i1p1.ncml"))?;
    _ = pipeline
        .run_ncml(&tree.root, &WalkDirEnumerator::new(), &tree.dest, None)
        .await?;
    let second = fs::read_to_string(tree.dest.join("M/day/tas_r1i1p1.ncml"))?;
    assert_eq!(first, second);

    let leftovers: Vec<_> = fs::read_dir(tree.dest.join("M/day"))?.collect();
    assert_eq!(leftovers.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_catalog_run_split_by_table() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    let pipeline = pipeline(RunConfig::from_yaml(CONFIG)?, reader);

    let run = CatalogRun {
        ncml_dir: None,
        scan: true,
        layout: CatalogLayout::Flat,
        split_by: Some("table".to_string()),
    };
    let report = pipeline
        .run_catalog(&tree.root, &WalkDirEnumerator::new(), &tree.dest, &run)
        .await?;
    assert!(report.is_success(), "{report}");
    assert_eq!(report.written.len(), 3);

    let root = fs::read_to_string(tree.dest.join("catalog.xml"))?;
    assert!(root.contains(r#"xlink:href="Amon/catalog.xml""#));
    assert!(root.contains(r#"xlink:href="day/catalog.xml""#));

    let day = fs::read_to_string(tree.dest.join("day/catalog.xml"))?;
    assert!(day.contains(r#"<include wildcard="tas_day*"/>"#));
    assert!(day.contains("<datasetScan "));
    Ok(())
}

#[tokio::test]
async fn test_catalog_rejects_unknown_split_facet() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    let pipeline = pipeline(RunConfig::from_yaml(CONFIG)?, reader);
    let run = CatalogRun {
        split_by: Some("realm".to_string()),
        ..CatalogRun::default()
    };
    let err = pipeline
        .run_catalog(&tree.root, &WalkDirEnumerator::new(), &tree.dest, &run)
        .await
        .expect_err("realm is not a grouping facet");
    assert!(matches!(err, Error::UnknownFacet { .. }));
    Ok(())
}

#[tokio::test]
async fn test_file_list_input() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    let pipeline = pipeline(RunConfig::from_yaml(CONFIG)?, reader);
    let list = ListEnumerator::from_reader(
        "CMIP5/M/hist/day/r1i1p1/tas/tas_day_M_hist_r1i1p1_1850.nc\n".as_bytes(),
    )?;

    let report = pipeline.run_ncml(&tree.root, &list, &tree.dest, None).await?;
    assert_eq!(report.accepted, 1);
    assert_eq!(report.groups, 1);
    assert_eq!(report.notices.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_wrong_drs_aborts_run() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    let config = RunConfig::from_yaml(
        r#"
drs: [project, model, variable]
grouping:
  facets: [model, variable]
output:
  ncml: "{model}_{variable}.ncml"
catalog:
  filter_facets: [variable]
"#,
    )?;
    let err = pipeline(config, reader)
        .run_ncml(&tree.root, &WalkDirEnumerator::new(), &tree.dest, None)
        .await
        .expect_err("no file matches a three-level DRS");
    assert!(matches!(err, Error::SchemaMisconfigured { .. }));
    assert!(!tree.dest.exists());
    Ok(())
}

#[tokio::test]
async fn test_colliding_document_paths_fail_the_later_group() -> tdspu::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("data");
    let dest = tmp.path().join("out");
    let first = touch(&root, "x_y/z/f_1.nc");
    let second = touch(&root, "x/y_z/f_1.nc");
    let reader = MemoryReader::new()
        .with_time(&first, UNITS, 1, 0.0, 1.0)
        .with_time(&second, UNITS, 1, 100.0, 1.0);
    let config = RunConfig::from_yaml(
        r#"
drs: [a, b]
variable_facet: b
grouping:
  facets: [a, b]
output:
  ncml: "{a}_{b}.ncml"
catalog:
  filter_facets: []
"#,
    )?;

    let report = pipeline(config, reader)
        .run_ncml(&root, &WalkDirEnumerator::new(), &dest, None)
        .await?;

    assert_eq!(report.groups, 2);
    assert_eq!(report.written, vec![dest.join("x_y_z.ncml")]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "OutputWriteFailure");
    assert_eq!(report.failures[0].target, "x_y_z");
    assert!(report.failures[0].reason.contains("already written"));
    assert!(!report.is_success());

    let kept = fs::read_to_string(dest.join("x_y_z.ncml"))?;
    assert!(kept.contains("x/y_z/f_1.nc"), "{kept}");
    Ok(())
}

#[tokio::test]
async fn test_catalog_roots_default_to_run_directories() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    let pipeline = pipeline(RunConfig::from_yaml(CONFIG)?, reader);
    let run = CatalogRun::default();
    _ = pipeline
        .run_ncml(&tree.root, &WalkDirEnumerator::new(), &tree.dest, Some(&run))
        .await?;

    let catalog = fs::read_to_string(tree.dest.join("catalog.xml"))?;
    let root = format!(
        r#"<datasetRoot path="test" location="{}"/>"#,
        tree.dest.display()
    );
    assert!(catalog.contains(&root), "{catalog}");
    assert!(catalog.contains(r#"urlPath="test/M/day/tas_r1i1p1.ncml""#), "{catalog}");
    assert!(catalog.contains(r#"urlPath="test/M/Amon/tas_r1i1p1.ncml""#), "{catalog}");
    Ok(())
}

#[tokio::test]
async fn test_scans_cover_every_member_directory() -> tdspu::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("data");
    let dest = tmp.path().join("out");
    _ = touch(&root, "CMIP5/M/hist/day/r1i1p1/tas/tas_day_M_hist_r1i1p1_1850.nc");
    _ = touch(&root, "CMIP5/M/hist/day/r2i1p1/tas/tas_day_M_hist_r2i1p1_1850.nc");
    let config = RunConfig::from_yaml(
        r#"
drs: [project, model, experiment, table, ensemble, variable]
grouping:
  facets: [model, table, variable]
output:
  ncml: "{model}/{table}_{variable}.ncml"
catalog:
  name: test
"#,
    )?;
    let run = CatalogRun {
        scan: true,
        ..CatalogRun::default()
    };

    let report = pipeline(config, MemoryReader::new())
        .run_catalog(&root, &WalkDirEnumerator::new(), &dest, &run)
        .await?;
    assert_eq!(report.groups, 1);

    let catalog = fs::read_to_string(dest.join("catalog.xml"))?;
    assert_eq!(catalog.matches("<datasetScan ").count(), 2, "{catalog}");
    assert!(catalog.contains(r#"path="test_data/CMIP5/M/hist/day/r1i1p1/tas""#), "{catalog}");
    assert!(catalog.contains(r#"path="test_data/CMIP5/M/hist/day/r2i1p1/tas""#), "{catalog}");
    assert!(catalog.contains(r#"ID="M_day_tas_files_2""#), "{catalog}");
    Ok(())
}

#[tokio::test]
async fn test_unwritten_document_is_a_notice() -> tdspu::Result<()> {
    let (tree, reader) = tree();
    let pipeline = pipeline(RunConfig::from_yaml(CONFIG)?, reader);
    let run = CatalogRun {
        ncml_dir: Some(tree.dest.join("never-written")),
        ..CatalogRun::default()
    };

    let report = pipeline
        .run_catalog(&tree.root, &WalkDirEnumerator::new(), &tree.dest, &run)
        .await?;
    assert!(report.is_success(), "{report}");
    assert_eq!(report.notices.len(), 2);
    assert!(report.notices.iter().all(|n| n.kind == "DocumentMissing"));
    Ok(())
}
