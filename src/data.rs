//! Discovery of the benchmark dataset on disk.
//!
//! Each table is either a directory of parquet fragments
//! (`trip/trip.1.parquet`, ...) or a single file (`trip.parquet`). The
//! engines consume the discovered location in different renderings: a glob
//! for DuckDB and lazy scans, a file list for eager reads, and a listing path
//! for DataFusion.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};
use crate::TABLES;

#[derive(Debug, Clone, Default)]
pub struct DataPaths {
    tables: BTreeMap<String, PathBuf>,
}

impl DataPaths {
    /// Locate all tables under `data_dir`.
    ///
    /// Preference order per table: a `<table>/` directory, then
    /// `<table>.parquet`, then the first `<table>*.parquet` match. Tables
    /// without data are simply absent; queries touching them fail with
    /// [`BenchError::MissingTable`].
    pub fn discover(data_dir: &Path) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for table in TABLES {
            let dir = data_dir.join(table);
            if dir.is_dir() {
                tables.insert(table.to_string(), dir);
                continue;
            }
            let single = data_dir.join(format!("{table}.parquet"));
            if single.is_file() {
                tables.insert(table.to_string(), single);
                continue;
            }
            if let Some(found) = first_prefix_match(data_dir, table)? {
                tables.insert(table.to_string(), found);
            }
        }
        Ok(Self { tables })
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn get(&self, table: &str) -> Result<&Path> {
        self.tables
            .get(table)
            .map(PathBuf::as_path)
            .ok_or_else(|| BenchError::MissingTable(table.to_string()))
    }

    /// Path with a `*.parquet` glob appended for directories. DuckDB's
    /// `read_parquet` and Polars' `scan_parquet` both take this form.
    pub fn glob_path(&self, table: &str) -> Result<String> {
        let path = self.get(table)?;
        if path.is_dir() {
            Ok(path.join("*.parquet").to_string_lossy().into_owned())
        } else {
            Ok(path.to_string_lossy().into_owned())
        }
    }

    /// Path for DataFusion's listing tables: directories keep a trailing
    /// separator so they register as a table of fragments.
    pub fn listing_path(&self, table: &str) -> Result<String> {
        let path = self.get(table)?;
        let mut s = path.to_string_lossy().into_owned();
        if path.is_dir() && !s.ends_with('/') {
            s.push('/');
        }
        Ok(s)
    }

    /// Concrete parquet files for eager readers, sorted for determinism.
    pub fn files(&self, table: &str) -> Result<Vec<PathBuf>> {
        let path = self.get(table)?;
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|x| x == "parquet").unwrap_or(false))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(BenchError::MissingTable(table.to_string()));
        }
        Ok(files)
    }
}

fn first_prefix_match(data_dir: &Path, table: &str) -> Result<Option<PathBuf>> {
    if !data_dir.is_dir() {
        return Ok(None);
    }
    let mut matches: Vec<PathBuf> = fs::read_dir(data_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension().map(|x| x == "parquet").unwrap_or(false)
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(table))
                    .unwrap_or(false)
        })
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn discovers_single_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("trip.parquet")).unwrap();
        let paths = DataPaths::discover(dir.path()).unwrap();
        assert!(paths.get("trip").is_ok());
        assert!(paths.get("zone").is_err());
        assert!(paths.glob_path("trip").unwrap().ends_with("trip.parquet"));
    }

    #[test]
    fn discovers_fragment_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("zone")).unwrap();
        File::create(dir.path().join("zone").join("zone.1.parquet")).unwrap();
        File::create(dir.path().join("zone").join("zone.2.parquet")).unwrap();
        let paths = DataPaths::discover(dir.path()).unwrap();
        assert!(paths.glob_path("zone").unwrap().ends_with("*.parquet"));
        assert_eq!(paths.files("zone").unwrap().len(), 2);
        assert!(paths.listing_path("zone").unwrap().ends_with('/'));
    }

    #[test]
    fn falls_back_to_prefix_match() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("building.0001.parquet")).unwrap();
        let paths = DataPaths::discover(dir.path()).unwrap();
        assert!(paths
            .get("building")
            .unwrap()
            .to_string_lossy()
            .ends_with("building.0001.parquet"));
    }

    #[test]
    fn empty_directory_has_no_tables() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::discover(dir.path()).unwrap();
        assert!(paths.is_empty());
    }
}
