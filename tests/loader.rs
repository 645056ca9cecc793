use anyhow::Result;
use communes::{
    communes::build_profiles, verify::VerificationSummary, Config, DatasetKind, LoadError,
    LoadSource, Loader,
};
use rust_xlsxwriter::Workbook;
use std::{fmt::Write as _, fs, path::Path};
use tempfile::tempdir;

fn code(i: usize) -> String {
    format!("{:05}", 1000 + i)
}

/// Write a semicolon CSV shaped like the INSEE base-cc files.
fn write_base_cc(path: &Path, headers: &[&str], rows: usize) -> Result<()> {
    let mut text = String::new();
    writeln!(text, "{}", headers.join(";"))?;
    for i in 0..rows {
        write!(text, "\"{}\";\"Commune {}\"", code(i), i)?;
        for j in 2..headers.len() {
            write!(text, ";{},5", (i * j) % 997)?;
        }
        text.push('\n');
    }
    fs::write(path, text)?;
    Ok(())
}

fn write_income(path: &Path, rows: usize) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Code Commune")?;
    sheet.write_string(0, 1, "Nom Commune")?;
    sheet.write_string(0, 2, "Niveau de vie Commune")?;
    for i in 0..rows {
        let r = i as u32 + 1;
        sheet.write_number(r, 0, (1000 + i) as f64)?;
        sheet.write_string(r, 1, format!("Commune {}", i))?;
        sheet.write_number(r, 2, 18_000.0 + (i % 500) as f64 * 10.0)?;
    }
    workbook.save(path)?;
    Ok(())
}

fn write_employment(config: &Config, rows: usize) -> Result<()> {
    write_base_cc(
        &config.raw_path(DatasetKind::Employment),
        &["CODGEO", "LIBGEO", "P20_POP1564", "P20_ACT1564", "P20_CHOM1564"],
        rows,
    )
}

fn write_housing(config: &Config, rows: usize) -> Result<()> {
    write_base_cc(
        &config.raw_path(DatasetKind::Housing),
        &["CODGEO", "LIBGEO", "P21_LOG", "P21_RP", "P21_MAISON", "P21_MEN", "P21_POP"],
        rows,
    )
}

fn setup(rows_offset: isize) -> Result<(tempfile::TempDir, Config)> {
    let dir = tempdir()?;
    let config = Config::from_data_dir(dir.path());
    fs::create_dir_all(&config.raw_dir)?;
    let n = |kind: DatasetKind| (kind.expected_rows() as isize + rows_offset) as usize;
    write_employment(&config, n(DatasetKind::Employment))?;
    write_housing(&config, n(DatasetKind::Housing))?;
    write_income(&config.raw_path(DatasetKind::Income), n(DatasetKind::Income))?;
    Ok((dir, config))
}

#[test]
fn complete_downloads_report_documented_counts() -> Result<()> {
    let (_dir, config) = setup(0)?;
    let loader = Loader::new(config);

    for kind in DatasetKind::ALL {
        let loaded = loader.load(kind)?;
        assert_eq!(loaded.table.len(), kind.expected_rows(), "{}", kind);
        assert!(loaded.report.is_complete());
        assert_eq!(loaded.table.duplicate_keys(), 0);
    }

    let income = loader.load(DatasetKind::Income)?.table;
    assert_eq!(income.key_header(), "Code Commune");
    assert!(income.contains("01000"));

    let summary = VerificationSummary::run(&loader);
    assert!(summary.is_success());
    let text = summary.to_string();
    assert!(text.contains("✓ employment: 34,963 communes (cache"));
    assert!(text.contains("✓ housing: 34,963 communes"));
    assert!(text.contains("✓ income: 36,572 communes"));
    Ok(())
}

#[test]
fn missing_file_names_expected_location() -> Result<()> {
    let dir = tempdir()?;
    let config = Config::from_data_dir(dir.path());
    let expected = config.raw_path(DatasetKind::Housing);

    match Loader::new(config).load(DatasetKind::Housing) {
        Err(LoadError::MissingFile { dataset, path }) => {
            assert_eq!(dataset, DatasetKind::Housing);
            assert_eq!(path, expected);
        }
        other => panic!("expected MissingFile, got {:?}", other.map(|l| l.report)),
    }

    let err = Loader::new(Config::from_data_dir(dir.path()))
        .load(DatasetKind::Income)
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("Niveau_de_vie_2013_a_la_commune-Global_Map_Solution (1).xlsx"));
    Ok(())
}

#[test]
fn cache_round_trip_is_identical_and_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let config = Config::from_data_dir(dir.path());
    fs::create_dir_all(&config.raw_dir)?;
    write_housing(&config, 500)?;
    let loader = Loader::new(config.clone());

    let first = loader.load(DatasetKind::Housing)?;
    assert_eq!(first.report.source, LoadSource::Raw);
    assert!(!first.report.is_complete());

    let second = loader.load(DatasetKind::Housing)?;
    let third = Loader::new(config).load(DatasetKind::Housing)?;
    for cached in [&second, &third] {
        assert_eq!(cached.report.source, LoadSource::Cache);
        assert_eq!(cached.table, first.table);
        assert_eq!(cached.table.key_set(), first.table.key_set());
    }
    Ok(())
}

#[test]
fn broken_cache_falls_back_to_raw() -> Result<()> {
    let dir = tempdir()?;
    let config = Config::from_data_dir(dir.path());
    fs::create_dir_all(&config.raw_dir)?;
    write_employment(&config, 200)?;
    let loader = Loader::new(config.clone());
    let cache = loader.cache().expect("cache enabled by default");

    let original = loader.load(DatasetKind::Employment)?.table;

    // corrupted data file
    fs::write(cache.data_path(DatasetKind::Employment), b"not parquet")?;
    let reloaded = loader.load(DatasetKind::Employment)?;
    assert_eq!(reloaded.report.source, LoadSource::Raw);
    assert_eq!(reloaded.table, original);

    // rewritten by the fallback
    assert_eq!(loader.load(DatasetKind::Employment)?.report.source, LoadSource::Cache);

    // whole cache directory gone
    fs::remove_dir_all(&config.cache_dir)?;
    let reloaded = loader.load(DatasetKind::Employment)?;
    assert_eq!(reloaded.report.source, LoadSource::Raw);
    assert_eq!(reloaded.table, original);

    // garbage manifest
    fs::write(cache.manifest_path(DatasetKind::Employment), "{")?;
    assert_eq!(loader.load(DatasetKind::Employment)?.report.source, LoadSource::Raw);
    Ok(())
}

#[test]
fn modified_raw_file_invalidates_cache() -> Result<()> {
    let dir = tempdir()?;
    let config = Config::from_data_dir(dir.path());
    fs::create_dir_all(&config.raw_dir)?;
    write_housing(&config, 100)?;
    let loader = Loader::new(config.clone());

    assert_eq!(loader.load(DatasetKind::Housing)?.report.source, LoadSource::Raw);
    assert_eq!(loader.load(DatasetKind::Housing)?.report.source, LoadSource::Cache);

    write_housing(&config, 101)?;
    let reloaded = loader.load(DatasetKind::Housing)?;
    assert_eq!(reloaded.report.source, LoadSource::Raw);
    assert_eq!(reloaded.table.len(), 101);
    Ok(())
}

#[test]
fn no_cache_never_writes() -> Result<()> {
    let dir = tempdir()?;
    let config = Config::from_data_dir(dir.path()).with_cache(false);
    fs::create_dir_all(&config.raw_dir)?;
    write_housing(&config, 10)?;
    let loader = Loader::new(config.clone());

    assert!(loader.cache().is_none());
    assert_eq!(loader.load(DatasetKind::Housing)?.report.source, LoadSource::Raw);
    assert_eq!(loader.load(DatasetKind::Housing)?.report.source, LoadSource::Raw);
    assert!(!config.cache_dir.exists());
    Ok(())
}

#[test]
fn profiles_join_housing_and_income() -> Result<()> {
    let dir = tempdir()?;
    let config = Config::from_data_dir(dir.path()).with_cache(false);
    fs::create_dir_all(&config.raw_dir)?;
    write_housing(&config, 20)?;
    write_income(&config.raw_path(DatasetKind::Income), 10)?;
    let loader = Loader::new(config);

    let housing = loader.load(DatasetKind::Housing)?.table;
    let income = loader.load(DatasetKind::Income)?.table;
    let profiles = build_profiles(&housing, Some(&income))?;

    assert_eq!(profiles.len(), 20);
    assert_eq!(profiles[0].code, "01000");
    assert_eq!(profiles[0].name, "Commune 0");
    assert!(!profiles[0].income_imputed);
    assert_eq!(profiles[0].median_income, 18_000.0);
    assert_eq!(profiles.iter().filter(|p| p.income_imputed).count(), 10);
    assert!(profiles
        .iter()
        .all(|p| (0.0..=100.0).contains(&p.pct_houses) && p.dwellings >= 1));
    Ok(())
}
