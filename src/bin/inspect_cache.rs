// src/bin/inspect_cache.rs

use anyhow::{Context, Result};
use communes::{cache::CacheManifest, verify::format_count};
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::{env, fs::File, path::Path, process::exit};

fn main() {
    // Expect exactly one CLI argument: path to a cache Parquet file.
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "inspect_cache".to_string());
    match (args.next(), args.next()) {
        (Some(file), None) => {
            if let Err(e) = inspect_cache(Path::new(&file)) {
                eprintln!("Error: {:#}", e);
                exit(1);
            }
        }
        _ => {
            eprintln!("{}", usage(&program));
            exit(1);
        }
    }
}

fn usage(program: &str) -> String {
    format!("Usage: {} <PARQUET_FILE>", program)
}

/// Print footer, columns, row groups and key-value metadata of a cache
/// file, followed by its sidecar manifest when one sits next to it.
fn inspect_cache(path: &Path) -> Result<()> {
    // 1) Footer
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = SerializedFileReader::new(file)
        .with_context(|| format!("reading parquet footer of {}", path.display()))?;
    let parquet_meta = reader.metadata();
    let file_meta = parquet_meta.file_metadata();
    let file_size_disk = std::fs::metadata(path)?.len();

    println!("=== Cache file: {} ===", path.display());
    println!(
        "Created by:           {}",
        file_meta.created_by().unwrap_or("<unknown>")
    );
    println!("Total rows:           {}", format_count(file_meta.num_rows() as usize));
    println!("Number of row groups: {}", parquet_meta.num_row_groups());
    println!("File size on disk:    {} bytes", file_size_disk);
    println!();

    // 2) Key-value metadata written by the cache
    println!("=== Key-value metadata ===");
    match file_meta.key_value_metadata() {
        Some(kvs) if !kvs.is_empty() => {
            for kv in kvs {
                println!("- {} = {}", kv.key, kv.value.as_deref().unwrap_or("<none>"));
            }
        }
        _ => println!("<none>"),
    }
    println!();

    // 3) Columns
    println!("=== Columns ===");
    for col_desc in file_meta.schema_descr().columns() {
        let logical = col_desc
            .logical_type()
            .as_ref()
            .map_or("<none>".to_string(), |lt| format!("{:?}", lt));
        println!(
            "- {:<30} | Physical: {:<10} | Logical: {}",
            col_desc.name(),
            format!("{:?}", col_desc.physical_type()),
            logical
        );
    }
    println!();

    // 4) Row groups
    for rg_idx in 0..parquet_meta.num_row_groups() {
        print_row_group(rg_idx, parquet_meta.row_group(rg_idx));
    }

    // 5) Sidecar manifest: <dataset>.parquet -> <dataset>.manifest.json
    let manifest_path = path.with_extension("manifest.json");
    if manifest_path.is_file() {
        let manifest = CacheManifest::read(&manifest_path)?;
        println!("=== Manifest: {} ===", manifest_path.display());
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        println!("No manifest at {}", manifest_path.display());
    }
    Ok(())
}

fn print_row_group(idx: usize, rg_md: &RowGroupMetaData) {
    println!("--- Row Group {} ---", idx);
    println!("  Rows:               {}", rg_md.num_rows());
    println!("  Uncompressed size:  {} bytes", rg_md.total_byte_size());
    println!("  Compressed size:    {} bytes", rg_md.compressed_size());
    for col_md in rg_md.columns() {
        println!(
            "  > {:<28} {:?}, {} values, {} -> {} bytes",
            col_md.column_descr().name(),
            col_md.compression(),
            col_md.num_values(),
            col_md.uncompressed_size(),
            col_md.compressed_size()
        );
    }
    println!();
}
