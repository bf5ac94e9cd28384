//! JSON dataset ingest.
//!
//! One file per experiment at `<data_dir>/<machine>/<date>/<TAG>.json`:
//!
//! - RB: `survival[group][length][repetition] = count`, optionally with a
//!   `leakage_postselect` object of the same shape
//! - crosstalk: `survival[group][length] = count`
//! - SPAM: `survival[group]["0" | "1"] = count`
//!
//! Every file carries a top-level `shots`. Unknown fields are ignored. No
//! fitting happens here; the output is the validated, immutable dataset.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::aggregate::DataSource;
use crate::domain::{
    Dataset, ExperimentData, ExperimentKind, QubitGroup, RbData, SpamCounts, SurvivalTable,
};
use crate::error::{AppError, AppResult};

/// Per-length entry: a bare count or a repetition-indexed map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LengthEntry {
    Count(u32),
    Reps(BTreeMap<String, u32>),
}

type DecayGroups = BTreeMap<String, BTreeMap<String, LengthEntry>>;

#[derive(Debug, Deserialize)]
struct DecayFile {
    shots: u32,
    survival: DecayGroups,
    #[serde(default)]
    leakage_postselect: Option<DecayGroups>,
}

#[derive(Debug, Deserialize)]
struct SpamFile {
    shots: u32,
    survival: BTreeMap<String, BTreeMap<String, u32>>,
}

/// Reads experiment files from one machine/date folder.
#[derive(Debug, Clone)]
pub struct JsonDataSource {
    pub data_dir: PathBuf,
    pub machine: String,
    pub date: String,
}

impl JsonDataSource {
    pub fn new(data_dir: impl Into<PathBuf>, machine: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            machine: machine.into(),
            date: date.into(),
        }
    }

    pub fn path_for(&self, kind: ExperimentKind) -> PathBuf {
        self.data_dir
            .join(&self.machine)
            .join(&self.date)
            .join(format!("{}.json", kind.tag()))
    }
}

impl DataSource for JsonDataSource {
    fn load(&self, kind: ExperimentKind) -> AppResult<ExperimentData> {
        let path = self.path_for(kind);
        let text = read_file(&path)?;
        info!(path = %path.display(), kind = %kind, "loaded dataset");
        let data = match kind {
            ExperimentKind::SqRb | ExperimentKind::TqRb | ExperimentKind::MemoryRb => {
                ExperimentData::Rb(parse_rb(&text)?)
            }
            ExperimentKind::MeasurementCrosstalk | ExperimentKind::ResetCrosstalk => {
                ExperimentData::Decay(parse_decay(&text)?)
            }
            ExperimentKind::Spam => ExperimentData::Spam(parse_spam(&text)?),
        };
        Ok(data)
    }
}

fn read_file(path: &Path) -> AppResult<String> {
    if !path.exists() {
        return Err(AppError::MissingData(format!(
            "No dataset at '{}'.",
            path.display()
        )));
    }
    fs::read_to_string(path)
        .map_err(|e| AppError::Io(format!("Failed to read '{}': {e}", path.display())))
}

/// Parse an RB file with its optional leakage-post-selected block.
pub fn parse_rb(json: &str) -> AppResult<RbData> {
    let file: DecayFile = serde_json::from_str(json)
        .map_err(|e| AppError::invalid(format!("Invalid RB dataset JSON: {e}")))?;
    let standard = build_decay(file.shots, file.survival)?;
    let leakage = match file.leakage_postselect {
        Some(groups) => Some(build_decay(file.shots, groups)?),
        None => {
            debug!("RB dataset has no leakage_postselect block");
            None
        }
    };
    Ok(RbData { standard, leakage })
}

/// Parse a crosstalk decay file.
pub fn parse_decay(json: &str) -> AppResult<Dataset<SurvivalTable>> {
    let file: DecayFile = serde_json::from_str(json)
        .map_err(|e| AppError::invalid(format!("Invalid decay dataset JSON: {e}")))?;
    build_decay(file.shots, file.survival)
}

/// Parse a SPAM file.
pub fn parse_spam(json: &str) -> AppResult<Dataset<SpamCounts>> {
    let file: SpamFile = serde_json::from_str(json)
        .map_err(|e| AppError::invalid(format!("Invalid SPAM dataset JSON: {e}")))?;

    let mut groups = BTreeMap::new();
    for (label, states) in file.survival {
        let state = |key: &str| -> AppResult<u32> {
            let count = *states.get(key).ok_or_else(|| {
                AppError::invalid(format!("SPAM group '{label}' has no count for state {key}."))
            })?;
            if count > file.shots {
                return Err(AppError::invalid(format!(
                    "SPAM count {count} for group '{label}' exceeds {} shots.",
                    file.shots
                )));
            }
            Ok(count)
        };
        let counts = SpamCounts {
            zero: state("0")?,
            one: state("1")?,
        };
        groups.insert(label.parse::<QubitGroup>()?, counts);
    }
    Dataset::new(file.shots, groups)
}

fn build_decay(shots: u32, groups: DecayGroups) -> AppResult<Dataset<SurvivalTable>> {
    let mut tables = BTreeMap::new();
    for (label, lengths) in groups {
        let mut rows = BTreeMap::new();
        for (length, entry) in lengths {
            let m: u32 = length.trim().parse().map_err(|_| {
                AppError::invalid(format!("Group '{label}' has a non-integer sequence length '{length}'."))
            })?;
            rows.insert(m, repetition_counts(&label, entry)?);
        }
        let table = SurvivalTable::new(rows, shots)
            .map_err(|e| AppError::invalid(format!("Group '{label}': {e}")))?;
        tables.insert(label.parse::<QubitGroup>()?, table);
    }
    let dataset = Dataset::new(shots, tables)?;
    dataset.check_shared_lengths()?;
    Ok(dataset)
}

/// Counts ordered by numeric repetition index.
fn repetition_counts(label: &str, entry: LengthEntry) -> AppResult<Vec<u32>> {
    match entry {
        LengthEntry::Count(count) => Ok(vec![count]),
        LengthEntry::Reps(reps) => {
            let mut indexed = reps
                .into_iter()
                .map(|(idx, count)| {
                    idx.trim()
                        .parse::<usize>()
                        .map(|i| (i, count))
                        .map_err(|_| AppError::invalid(format!("Group '{label}' has a bad repetition index '{idx}'.")))
                })
                .collect::<AppResult<Vec<_>>>()?;
            indexed.sort_unstable_by_key(|&(i, _)| i);
            Ok(indexed.into_iter().map(|(_, c)| c).collect())
        }
    }
}
