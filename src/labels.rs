//! Zone names for qubit groups.
//!
//! The estimation core only knows qubit indices. Reports may swap those for
//! the machine's zone names through a `GroupLabeler`; the static tables below
//! cover the machines we have data for.

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::domain::QubitGroup;

/// Maps a qubit group to a display label.
pub trait GroupLabeler {
    fn label(&self, group: &QubitGroup) -> Option<String>;
}

/// Keeps the qubit-index labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexLabels;

impl GroupLabeler for IndexLabels {
    fn label(&self, _group: &QubitGroup) -> Option<String> {
        None
    }
}

/// Static zone table keyed by qubit-group label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneTable {
    entries: &'static [(&'static str, &'static str)],
}

const ZONES_H1: &[(&str, &str)] = &[
    ("0, 1", "G1"),
    ("2, 3", "G2"),
    ("4, 5", "G3"),
    ("6, 7", "G4"),
    ("8, 9", "G5"),
    ("0", "G1-left"),
    ("1", "G1-right"),
    ("2", "G2-left"),
    ("3", "G2-right"),
    ("4", "G3-left"),
    ("5", "G3-right"),
    ("6", "G4-left"),
    ("7", "G4-right"),
    ("8", "G5-left"),
    ("9", "G5-right"),
];

const ZONES_H1_LEGACY: &[(&str, &str)] = &[
    ("0, 1", "G2"),
    ("2, 3", "G3"),
    ("4, 5", "G4"),
    ("0", "G2-left"),
    ("1", "G2-right"),
    ("2", "G3-left"),
    ("3", "G3-right"),
    ("4", "G4-left"),
    ("5", "G4-right"),
];

const ZONES_H2: &[(&str, &str)] = &[
    ("0, 1", "DG01"),
    ("2, 3", "DG02"),
    ("4, 5", "DG03"),
    ("6, 7", "DG04"),
    ("0", "DG01-left"),
    ("1", "DG01-right"),
    ("2", "DG02-left"),
    ("3", "DG02-right"),
    ("4", "DG03-left"),
    ("5", "DG03-right"),
    ("6", "DG04-left"),
    ("7", "DG04-right"),
];

impl ZoneTable {
    /// Pick the table for a machine and dataset date (`YYYY_MM_DD`).
    ///
    /// H1-2 switched to the H1-1 layout after 2022. Unknown machines, or an
    /// H1-2 date that cannot be parsed, get no table.
    pub fn for_machine(machine: &str, date: &str) -> Option<Self> {
        let entries = match machine {
            "H1-1" | "REIMEI" => ZONES_H1,
            "H1-2" => match parse_date(date) {
                Some(d) if d.year() > 2022 => ZONES_H1,
                Some(_) => ZONES_H1_LEGACY,
                None => {
                    warn!(date, "could not parse dataset date; keeping qubit labels");
                    return None;
                }
            },
            "H2-1" => ZONES_H2,
            _ => return None,
        };
        Some(Self { entries })
    }
}

impl GroupLabeler for ZoneTable {
    fn label(&self, group: &QubitGroup) -> Option<String> {
        let key = group.to_string();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, name)| name.to_string())
    }
}

impl<L: GroupLabeler> GroupLabeler for Option<L> {
    fn label(&self, group: &QubitGroup) -> Option<String> {
        self.as_ref().and_then(|l| l.label(group))
    }
}

/// Labels for a set of groups.
///
/// Zone names are used only when every group has one; otherwise all groups
/// keep their index labels so a report never mixes the two.
pub fn relabel<'a>(
    labeler: &dyn GroupLabeler,
    groups: impl IntoIterator<Item = &'a QubitGroup>,
) -> Vec<String> {
    let groups: Vec<&QubitGroup> = groups.into_iter().collect();
    let named: Option<Vec<String>> = groups.iter().map(|g| labeler.label(g)).collect();
    named.unwrap_or_else(|| groups.iter().map(|g| g.to_string()).collect())
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y_%m_%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(label: &str) -> QubitGroup {
        label.parse().unwrap()
    }

    #[test]
    fn machine_table_selection() {
        let h1 = ZoneTable::for_machine("H1-1", "2021_05_01").unwrap();
        assert_eq!(h1.label(&group("0, 1")).as_deref(), Some("G1"));

        let h12_new = ZoneTable::for_machine("H1-2", "2023_01_10").unwrap();
        assert_eq!(h12_new.label(&group("1")).as_deref(), Some("G1-right"));

        let h12_old = ZoneTable::for_machine("H1-2", "2022_06_10").unwrap();
        assert_eq!(h12_old.label(&group("1")).as_deref(), Some("G2-right"));

        let h2 = ZoneTable::for_machine("H2-1", "2024_01_01").unwrap();
        assert_eq!(h2.label(&group("6, 7")).as_deref(), Some("DG04"));

        assert!(ZoneTable::for_machine("X9-9", "2024_01_01").is_none());
        assert!(ZoneTable::for_machine("H1-2", "not-a-date").is_none());
    }

    #[test]
    fn relabel_is_all_or_nothing() {
        let table = ZoneTable::for_machine("H1-2", "2022_01_01").unwrap();
        let known = [group("0"), group("1")];
        assert_eq!(relabel(&table, &known), vec!["G2-left", "G2-right"]);

        // "7" has no legacy zone, so nobody gets renamed.
        let mixed = [group("0"), group("7")];
        assert_eq!(relabel(&table, &mixed), vec!["0", "7"]);

        assert_eq!(relabel(&IndexLabels, &known), vec!["0", "1"]);
    }
}
