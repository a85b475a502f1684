//! Run settings: input/output folders, discovered samples and tool locations.

use crate::Result;

use anyhow::{Context, bail};
use chrono::{DateTime, Local};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static SPECTRA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mzxml|mzml|mgf)$").expect("valid spectra regex"));

/// Subfolders every output folder carries.
pub const OUTPUT_SUBFOLDERS: [&str; 3] = ["QC", "reports", "libraries"];

/// Where the external programs live.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub peakdetector_bin_path: PathBuf,
    pub peakdetector_methods_path: PathBuf,
    pub mzdeltas_bin_path: PathBuf,
    /// Command used to run R scripts (looked up on PATH).
    pub rcmd: String,
    pub r_scripts_path: PathBuf,
    pub r_mzkit_path: PathBuf,
}

impl ToolPaths {
    /// Every configured path must exist.
    pub fn verify(&self) -> Result<()> {
        for path in [
            &self.peakdetector_bin_path,
            &self.peakdetector_methods_path,
            &self.mzdeltas_bin_path,
            &self.r_scripts_path,
            &self.r_mzkit_path,
        ] {
            if !path.exists() {
                bail!("configuration path not found: {}", path.display());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub data_folder: PathBuf,
    pub output_folder: PathBuf,
    pub mzrolldb_file: PathBuf,
    pub sample_files: Vec<PathBuf>,
    pub tools: ToolPaths,
    pub start_time: DateTime<Local>,
    pub verbose: bool,
}

impl RunSettings {
    /// Check the data folder, discover samples and bootstrap the output folder.
    pub fn prepare(
        data_folder: &Path,
        output_folder: &Path,
        tools: ToolPaths,
        verbose: bool,
    ) -> Result<Self> {
        let start_time = Local::now();

        if !data_folder.is_dir() {
            bail!("data_folder path {} does not exist", data_folder.display());
        }

        let sample_files = find_sample_files(data_folder)?;
        if sample_files.is_empty() {
            bail!("Didn't find any spectra files in {}", data_folder.display());
        }

        if contains_mzrolldb(data_folder)? {
            bail!("mzkit can't run on a data folder containing a .mzrollDB file");
        }

        let output_folder = initialize_output_folder(output_folder)?;

        Ok(Self {
            data_folder: data_folder.to_path_buf(),
            mzrolldb_file: output_folder.join("peakdetector.mzrollDB"),
            output_folder,
            sample_files,
            tools,
            start_time,
            verbose,
        })
    }
}

/// Recursively collect spectra files (.mzXML, .mzML, .mgf), sorted by path.
///
/// Symlinks are not followed, so a link back to an ancestor is not rescanned.
pub fn find_sample_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut matched = Vec::new();
    for entry in WalkDir::new(folder).follow_links(false) {
        let entry = entry.with_context(|| format!("read data folder {}", folder.display()))?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|n| SPECTRA_RE.is_match(n))
        {
            matched.push(entry.into_path());
        }
    }

    matched.sort();
    if matched.is_empty() {
        warn!(folder = %folder.display(), "could not find any spectra files");
    }
    info!("# Found {} mass spec samples", matched.len());
    Ok(matched)
}

fn contains_mzrolldb(folder: &Path) -> Result<bool> {
    for entry in fs::read_dir(folder).with_context(|| format!("read {}", folder.display()))? {
        let name = entry?.file_name();
        if name.to_string_lossy().ends_with(".mzrollDB") {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Create the output folder and its standard subfolders when missing.
pub fn initialize_output_folder(output_folder: &Path) -> Result<PathBuf> {
    if !output_folder.exists() {
        info!("# Creating {}", output_folder.display());
    }
    for sub in OUTPUT_SUBFOLDERS {
        let dir = output_folder.join(sub);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "creating output subfolder");
            fs::create_dir_all(&dir)
                .with_context(|| format!("Can't create output folder: {}", dir.display()))?;
        }
    }
    info!("# Reports will saved to {} folder.", output_folder.display());
    Ok(output_folder.to_path_buf())
}
