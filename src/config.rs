// Static lookup tables and processing switches.
//
// Everything here is fixed business configuration: branch areas, staff
// rosters, target brackets and tag lists. A `Config` is built once at
// startup (defaults or a TOML file) and handed to the pipeline by reference.
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Whether every upload is classified, or a single upload is treated as a
/// plain control-record export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    SingleFile,
    MultiFile,
}

/// How a percent-of-target with a zero target is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroTargetPolicy {
    NotAvailable,
    Zero,
    Infinite,
}

impl ZeroTargetPolicy {
    pub fn label(self) -> &'static str {
        match self {
            ZeroTargetPolicy::NotAvailable => "N/A",
            ZeroTargetPolicy::Zero => "0%",
            ZeroTargetPolicy::Infinite => "∞%",
        }
    }
}

/// A postal prefix entry: either one prefix or an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefixSpec {
    Single(u32),
    Range { from: u32, to: u32 },
}

impl PrefixSpec {
    pub fn contains(&self, prefix: u32) -> bool {
        match *self {
            PrefixSpec::Single(p) => p == prefix,
            PrefixSpec::Range { from, to } => (from..=to).contains(&prefix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchArea {
    pub branch: String,
    pub prefixes: Vec<PrefixSpec>,
}

impl BranchArea {
    pub fn covers(&self, prefix: u32) -> bool {
        self.prefixes.iter().any(|p| p.contains(prefix))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStaff {
    pub branch: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBracket {
    pub target: i64,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Gebietsbetreuer,
    Filialleiter,
    Regionalleiter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roles {
    pub gebietsbetreuer: Vec<String>,
    pub filialleiter: Vec<String>,
    pub regionalleiter: Vec<String>,
}

impl Roles {
    pub fn names(&self, role: Role) -> &[String] {
        match role {
            Role::Gebietsbetreuer => &self.gebietsbetreuer,
            Role::Filialleiter => &self.filialleiter,
            Role::Regionalleiter => &self.regionalleiter,
        }
    }

    pub fn role_of(&self, name: &str) -> Option<Role> {
        [Role::Regionalleiter, Role::Filialleiter, Role::Gebietsbetreuer]
            .into_iter()
            .find(|role| self.names(*role).iter().any(|n| n == name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: PipelineMode,
    pub accepted_extensions: Vec<String>,
    /// Column whose presence marks a target/actual (SOLL/IST) sheet.
    pub special_marker: String,
    /// Columns whose presence marks one of the monthly report sheets.
    pub monthly_markers: Vec<String>,
    pub excluded_branch: String,
    pub excluded_tags: Vec<String>,
    pub distributor_fault_tags: Vec<String>,
    pub distributor_performance_tags: Vec<String>,
    pub unknown_distributor: String,
    pub branch_areas: Vec<BranchArea>,
    pub branch_staff: Vec<BranchStaff>,
    pub target_brackets: Vec<TargetBracket>,
    pub excluded_recorders: Vec<String>,
    pub roles: Roles,
    pub working_days: f64,
    pub zero_target_policy: ZeroTargetPolicy,
}

impl Config {
    pub fn load_from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in tables.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!(path = %path.display(), "loading configuration");
            Self::load_from_file(path)
        } else {
            tracing::info!(path = %path.display(), "no configuration file, using built-in tables");
            Ok(Self::default())
        }
    }

    pub fn is_fault_tag(&self, tag: &str) -> bool {
        self.distributor_fault_tags.iter().any(|t| t == tag)
    }

    pub fn is_performance_tag(&self, tag: &str) -> bool {
        self.distributor_performance_tags.iter().any(|t| t == tag)
    }

    pub fn is_excluded_recorder(&self, name: &str) -> bool {
        self.excluded_recorders.iter().any(|n| n == name)
    }

    /// Reverse expansion of `branch_staff`: name -> branch.
    /// A name listed under several branches resolves to the last one.
    pub fn person_index(&self) -> HashMap<&str, &str> {
        let mut index = HashMap::new();
        for staff in &self.branch_staff {
            for name in &staff.names {
                index.insert(name.as_str(), staff.branch.as_str());
            }
        }
        index
    }

    /// Default target for a person, 0 when the name is in no bracket.
    pub fn default_target(&self, name: &str) -> i64 {
        self.target_brackets
            .iter()
            .find(|b| b.names.iter().any(|n| n == name))
            .map(|b| b.target)
            .unwrap_or(0)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn area(branch: &str, prefixes: Vec<PrefixSpec>) -> BranchArea {
    BranchArea { branch: branch.to_string(), prefixes }
}

fn range(from: u32, to: u32) -> PrefixSpec {
    PrefixSpec::Range { from, to }
}

fn staff(branch: &str, names: &[&str]) -> BranchStaff {
    BranchStaff { branch: branch.to_string(), names: strings(names) }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: PipelineMode::MultiFile,
            accepted_extensions: strings(&["xlsx", "csv"]),
            special_marker: crate::columns::TARGET.to_string(),
            monthly_markers: strings(&["REKLAMATIONSGRUND", "ZUSTELLQUOTE", "KONTROLLQUOTE"]),
            excluded_branch: "Fil12".to_string(),
            excluded_tags: strings(&["KEINE_ANGABE", "TESTKONTROLLE", "NACHKONTROLLE"]),
            distributor_fault_tags: strings(&[
                "FALSCHE_ABGABESTELLE",
                "NICHT_ZUGESTELLT",
                "TEILZUSTELLUNG",
                "WERBEVERZICHT_MISSACHTET",
                "IM_FREIEN_ABGELEGT",
                "MEHRFACHZUSTELLUNG",
            ]),
            distributor_performance_tags: strings(&[
                "FALSCHE_ABGABESTELLE",
                "NICHT_ZUGESTELLT",
                "TEILZUSTELLUNG",
                "WERBEVERZICHT_MISSACHTET",
                "IM_FREIEN_ABGELEGT",
                "MEHRFACHZUSTELLUNG",
                "VERSPAETET",
                "BESCHAEDIGT",
            ]),
            unknown_distributor: "Verteiler unbekannt".to_string(),
            branch_areas: vec![
                area("Fil01", vec![range(1010, 1239), PrefixSpec::Single(1300)]),
                area("Fil02", vec![range(2000, 2299)]),
                area("Fil03", vec![range(2300, 2899)]),
                area("Fil04", vec![range(3000, 3999)]),
                area("Fil05", vec![range(4000, 4999)]),
                area("Fil06", vec![range(5000, 5799)]),
                area("Fil07", vec![range(6000, 6699), range(9900, 9999)]),
                area("Fil08", vec![range(6700, 6999)]),
                area("Fil09", vec![range(7000, 7999)]),
                area("Fil10", vec![range(8000, 8999)]),
                area("Fil11", vec![range(9000, 9899)]),
            ],
            branch_staff: vec![
                staff("Fil01", &["Gruber Thomas", "Novak Petra", "Hofer Stefan"]),
                staff("Fil02", &["Wagner Julia", "Bauer Markus"]),
                staff("Fil03", &["Pichler Sandra", "Steiner Lukas"]),
                staff("Fil04", &["Moser Andrea", "Mayer Florian"]),
                staff("Fil05", &["Huber Daniela", "Leitner Martin"]),
                staff("Fil06", &["Schwarz Katharina", "Eder Michael"]),
                staff("Fil07", &["Fuchs Barbara", "Berger Christoph"]),
                staff("Fil08", &["Wolf Sabine"]),
                staff("Fil09", &["Schmid Johannes", "Winkler Eva"]),
                staff("Fil10", &["Reiter Manuel", "Lang Claudia"]),
                staff("Fil11", &["Koller Bernhard", "Weber Monika"]),
            ],
            target_brackets: vec![
                TargetBracket {
                    target: 120,
                    names: strings(&["Gruber Thomas", "Novak Petra", "Wagner Julia", "Huber Daniela", "Reiter Manuel"]),
                },
                TargetBracket {
                    target: 100,
                    names: strings(&[
                        "Hofer Stefan", "Bauer Markus", "Pichler Sandra", "Steiner Lukas", "Moser Andrea",
                        "Leitner Martin", "Schwarz Katharina", "Fuchs Barbara", "Schmid Johannes", "Koller Bernhard",
                    ]),
                },
                TargetBracket {
                    target: 80,
                    names: strings(&[
                        "Mayer Florian", "Eder Michael", "Berger Christoph", "Wolf Sabine", "Winkler Eva",
                        "Lang Claudia", "Weber Monika",
                    ]),
                },
            ],
            excluded_recorders: strings(&["Testerfasser", "Admin Zentrale"]),
            roles: Roles {
                gebietsbetreuer: strings(&[
                    "Novak Petra", "Hofer Stefan", "Bauer Markus", "Steiner Lukas", "Mayer Florian", "Leitner Martin",
                    "Eder Michael", "Berger Christoph", "Winkler Eva", "Lang Claudia", "Weber Monika",
                ]),
                filialleiter: strings(&[
                    "Wagner Julia", "Pichler Sandra", "Moser Andrea", "Huber Daniela", "Schwarz Katharina",
                    "Fuchs Barbara", "Wolf Sabine", "Schmid Johannes", "Reiter Manuel", "Koller Bernhard",
                ]),
                regionalleiter: strings(&["Gruber Thomas"]),
            },
            working_days: 16.0,
            zero_target_policy: ZeroTargetPolicy::NotAvailable,
        }
    }
}
