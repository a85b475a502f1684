//! Process-backed module runner.
//!
//! Modules are dispatched on their `language`:
//! - `R`:   `<rcmd> <r_mzkit_path> output_folder=.. rwrapper=<module> r_scripts_path=.. k=v...`
//! - `bin`: one of the known binaries (peakdetector, mzDeltas), with flags
//!   built from the resolved parameters.
//!
//! A non-zero exit status is a recoverable failure. Everything else that goes
//! wrong (unknown language, missing binary, missing parameter) is fatal.

use crate::config::ResolvedModule;
use crate::pipeline::{ModuleFailure, ModuleRunner};
use crate::settings::RunSettings;

use anyhow::{Context, anyhow, bail};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::{error, info};

/// Invocation family of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Bin,
    R,
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bin" => Ok(Self::Bin),
            "R" => Ok(Self::R),
            other => bail!(
                "invalid language: {} does not have a defined calling method",
                other
            ),
        }
    }
}

/// peakdetector flags that fall back to a default when the module does not
/// set the parameter: (flag, parameter, default).
const PEAKDETECTOR_TUNING: &[(&str, &str, &str)] = &[
    ("-r", "rtStepSize", "10"),
    ("-p", "precursorPPM", "5"),
    ("-y", "eic_smoothingWindow", "5"),
    ("-7", "baseline_smoothingWindow", "5"),
    ("-8", "baseline_dropTopX", "60"),
    ("-g", "grouping_maxRtWindow", "0.5"),
    ("-b", "minGoodGroupCount", "1"),
    ("-q", "minQuality", "0.5"),
    ("-z", "minSignalBaseLineRatio", "5"),
    ("-u", "mergeOverlap", "0.8"),
];

/// mzDeltas flags, all required: (flag, parameter).
const MZDELTAS_FLAGS: &[(&str, &str)] = &[
    ("--minintensity", "minintensity"),
    ("--max_mzs", "max_mzs"),
    ("--ppm", "ppm"),
    ("--mincor", "mincor"),
    ("--historylen", "historylen"),
];

pub struct ProcessRunner<'a> {
    settings: &'a RunSettings,
}

impl<'a> ProcessRunner<'a> {
    pub fn new(settings: &'a RunSettings) -> Self {
        Self { settings }
    }

    fn call_r_module(&self, module: &ResolvedModule) -> Result<(), ModuleFailure> {
        let tools = &self.settings.tools;
        let mut cmd = Command::new(&tools.rcmd);
        cmd.arg(&tools.r_mzkit_path)
            .arg(format!("output_folder={}", self.settings.output_folder.display()))
            .arg(format!("rwrapper={}", module.name))
            .arg(format!("r_scripts_path={}", tools.r_scripts_path.display()));
        for (key, value) in &module.parameters {
            cmd.arg(format!("{}={}", key, scalar_text(value)));
        }
        self.run_command(&module.name, cmd)
    }

    fn call_bin_module(&self, stage: &str, module: &ResolvedModule) -> Result<(), ModuleFailure> {
        match module.name.as_str() {
            "peakdetector" | "peakdetector_mzkitchen_search" => {
                let input = match stage {
                    "peakdetector" => self.settings.data_folder.clone(),
                    "alignment" => self.settings.mzrolldb_file.clone(),
                    other => {
                        return Err(anyhow!("Called peakdetector from undefined pipe: {}", other).into());
                    }
                };
                let cmd = self.peakdetector_command(&input, module)?;
                self.run_command(&module.name, cmd)
            }
            "mz_deltas" => {
                let (cmd, output_file) = self.mzdeltas_command(module)?;
                self.run_command(&module.name, cmd)?;
                if !output_file.is_file() {
                    return Err(anyhow!("Outfile not found: {}", output_file.display()).into());
                }
                Ok(())
            }
            other => Err(anyhow!(
                "{} doesn't have a defined method for calling the appropriate binary",
                other
            )
            .into()),
        }
    }

    fn peakdetector_command(&self, input: &Path, module: &ResolvedModule) -> crate::Result<Command> {
        let tools = &self.settings.tools;
        let binary = locate_binary(&tools.peakdetector_bin_path, "peakdetector")?;
        if !tools.peakdetector_methods_path.exists() {
            bail!(
                "Cannot find peakdetector methods folder: {}",
                tools.peakdetector_methods_path.display()
            );
        }

        let params = &module.parameters;
        let is_mzrolldb = input.to_string_lossy().ends_with(".mzrollDB");
        let align_samples = if is_mzrolldb {
            "0".to_string()
        } else {
            required_param(module, "alignSamples")?
        };

        let mut cmd = Command::new(&binary);
        let ms2 = required_param(module, "ms2")?;
        if !ms2.is_empty() {
            cmd.arg(ms2);
        }
        cmd.arg(format!("-i{}", required_param(module, "minintensity")?))
            .arg(format!("-m{}", tools.peakdetector_methods_path.display()))
            .arg(format!("-o{}", self.settings.output_folder.display()))
            .arg(format!("-a{}", align_samples));

        for (flag, key, default) in PEAKDETECTOR_TUNING {
            let value = params
                .get(*key)
                .map(scalar_text)
                .unwrap_or_else(|| default.to_string());
            cmd.arg(format!("{}{}", flag, value));
        }

        // mzkitchen msp search: each flag only applies when the previous one is set.
        if let Some(search_type) = optional_param(module, "mzkitchenSearchType") {
            cmd.arg(format!("-0{}", search_type));
            if let Some(msp) = optional_param(module, "mzkitchenMspFile") {
                cmd.arg(format!("-1{}", msp));
                if let Some(search_params) = optional_param(module, "mzkitchenSearchParameters") {
                    cmd.arg(format!("-9{}", search_params));
                }
            }
        }

        cmd.arg(directory_arg(input, is_mzrolldb));

        if let Some(alignment) = optional_param(module, "alignmentFile") {
            cmd.arg(alignment);
        }
        Ok(cmd)
    }

    fn mzdeltas_command(&self, module: &ResolvedModule) -> crate::Result<(Command, PathBuf)> {
        let tools = &self.settings.tools;
        if !tools.mzdeltas_bin_path.exists() {
            bail!(
                "Can not find mzDeltas binary at {}",
                tools.mzdeltas_bin_path.display()
            );
        }
        let binary = locate_binary(&tools.mzdeltas_bin_path, "mzDeltas")?;
        let output_file = self.settings.output_folder.join("mzdeltas.out");

        let mut cmd = Command::new(&binary);
        for (flag, key) in MZDELTAS_FLAGS {
            cmd.arg(flag).arg(required_param(module, key)?);
        }
        cmd.arg("--output")
            .arg(&output_file)
            .arg(directory_arg(&self.settings.data_folder, false));
        Ok((cmd, output_file))
    }

    fn run_command(&self, module: &str, mut cmd: Command) -> Result<(), ModuleFailure> {
        info!(module, "#RUNNING {:?}", cmd);
        let output = cmd
            .output()
            .with_context(|| format!("spawn {:?} for module {}", cmd.get_program(), module))?;

        if self.settings.verbose {
            print!("{}", String::from_utf8_lossy(&output.stdout));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            error!(module, status = %output.status, "{}", stderr.trim_end());
            return Err(ModuleFailure::Recoverable(stderr));
        }
        Ok(())
    }
}

impl ModuleRunner for ProcessRunner<'_> {
    fn invoke(&mut self, stage: &str, module: &ResolvedModule) -> Result<(), ModuleFailure> {
        match module.language.parse::<Language>()? {
            Language::Bin => self.call_bin_module(stage, module),
            Language::R => self.call_r_module(module),
        }
    }
}

/// Text form of a scalar parameter as handed to external programs.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

fn required_param(module: &ResolvedModule, key: &str) -> crate::Result<String> {
    module
        .parameters
        .get(key)
        .map(scalar_text)
        .ok_or_else(|| anyhow!("module {} is missing parameter '{}'", module.name, key))
}

/// A parameter that is present and neither empty nor `false`.
fn optional_param(module: &ResolvedModule, key: &str) -> Option<String> {
    match module.parameters.get(key)? {
        Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        v => Some(scalar_text(v)),
    }
}

/// Input folders are passed with a trailing separator so the tool scans the
/// whole directory.
fn directory_arg(path: &Path, is_file: bool) -> String {
    let mut s = path.display().to_string();
    if !is_file && !s.ends_with('/') {
        s.push('/');
    }
    s
}

/// `<dir>/<name>`, or the macOS app bundle layout when the plain binary is absent.
fn locate_binary(dir: &Path, name: &str) -> crate::Result<PathBuf> {
    let plain = dir.join(name);
    if plain.exists() {
        return Ok(plain);
    }
    if cfg!(target_os = "macos") {
        let bundled = dir
            .join(format!("{}.app", name))
            .join("Contents")
            .join("MacOS")
            .join(name);
        if bundled.exists() {
            return Ok(bundled);
        }
    }
    bail!("Cannot find {} binary: {}", name, plain.display())
}
