//! The file map: every recognized device in one data-run file, plus the
//! groups that could not be mapped.
//!
//! Mapping is eager and total over the file's top-level device groups. A
//! group that matches no layout descriptor, or whose extraction fails,
//! lands in the unknowns list with a reason; it never aborts the map.
//! Only a file missing both top-level containers is rejected outright.

use std::path::PathBuf;

use log::warn;

use super::constants::{
    DATA_GROUP, LAPD_VERSION_ATTR, MAIN_DIGITIZER_CANDIDATES, MSI_GROUP,
};
use super::container;
use super::controls::ControlConfig;
use super::digitizers::DigiConfig;
use super::error::OpenError;
use super::msi::MsiConfig;
use super::registry::{ConType, DeviceCategory, DeviceConfig, ProbeResult, Registry};

/// File-level metadata stored as attributes on the raw-data group.
/// Missing attributes read as empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetadata {
    pub investigator: String,
    pub experiment_name: String,
    pub experiment_description: String,
    pub experiment_set_name: String,
    pub experiment_set_description: String,
    pub data_run: String,
    pub description: String,
    pub status: String,
    pub status_date: String,
}

/// Lifecycle of a file map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Unopened,
    InProgress,
    Mapped,
    Failed,
}

/// A device group that could not be mapped, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Unknown {
    pub path: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct FileMap {
    state: MapState,
    lapd_version: Option<String>,
    metadata: RunMetadata,
    digitizers: Vec<DigiConfig>,
    controls: Vec<ControlConfig>,
    msi: Vec<MsiConfig>,
    run_sequence: Option<String>,
    unknowns: Vec<Unknown>,
}

impl FileMap {
    pub fn new() -> Self {
        Self {
            state: MapState::Unopened,
            lapd_version: None,
            metadata: RunMetadata::default(),
            digitizers: Vec::new(),
            controls: Vec::new(),
            msi: Vec::new(),
            run_sequence: None,
            unknowns: Vec::new(),
        }
    }

    /// Map every device group of `file`. Transitions Unopened →
    /// InProgress → Mapped, or → Failed when the file is not a data-run
    /// file at all.
    pub fn map(&mut self, file: &hdf5::File, registry: &Registry) -> Result<(), OpenError> {
        self.state = MapState::InProgress;

        let msi_group = file.group(MSI_GROUP).ok();
        let data_group = file.group(DATA_GROUP).ok();
        if msi_group.is_none() && data_group.is_none() {
            self.state = MapState::Failed;
            return Err(OpenError::NotLapdFile(PathBuf::from(file.filename())));
        }

        self.lapd_version = container::attr_str(file, LAPD_VERSION_ATTR);
        if self.lapd_version.is_none() {
            warn!("root attribute '{LAPD_VERSION_ATTR}' not found; this file may not have been generated by the facility DAQ");
        }

        if let Some(group) = &msi_group {
            for name in container::subgroup_names(group)? {
                let child = group.group(&name)?;
                match registry.probe(DeviceCategory::Msi, &name, &child) {
                    ProbeResult::Mapped(DeviceConfig::Msi(config)) => self.msi.push(config),
                    ProbeResult::Mapped(_) => unreachable!("MSI probe returned a non-MSI config"),
                    ProbeResult::NotRecognized => self.push_unknown(
                        child.name(),
                        "no diagnostic layout matched the group".to_string(),
                    ),
                    ProbeResult::Failed(e) => self.push_unknown(child.name(), e.why),
                }
            }
        } else {
            warn!("group '{MSI_GROUP}' not found; no diagnostics will be mapped");
        }

        if let Some(group) = &data_group {
            self.metadata = read_metadata(group);
            for name in container::subgroup_names(group)? {
                let child = group.group(&name)?;
                self.probe_data_device(registry, &name, &child);
            }
        } else {
            warn!("group '{DATA_GROUP}' not found; no digitizers or control devices will be mapped");
        }

        self.state = MapState::Mapped;
        Ok(())
    }

    /// Probe one raw-data child against each category in turn.
    fn probe_data_device(&mut self, registry: &Registry, name: &str, child: &hdf5::Group) {
        for category in [
            DeviceCategory::Digitizer,
            DeviceCategory::Control,
            DeviceCategory::RunSequence,
        ] {
            match registry.probe(category, name, child) {
                ProbeResult::Mapped(DeviceConfig::Digitizer(config)) => {
                    self.digitizers.push(config);
                    return;
                }
                ProbeResult::Mapped(DeviceConfig::Control(config)) => {
                    self.controls.push(config);
                    return;
                }
                ProbeResult::Mapped(DeviceConfig::RunSequence(path)) => {
                    self.run_sequence = Some(path);
                    return;
                }
                ProbeResult::Mapped(DeviceConfig::Msi(_)) => {
                    unreachable!("raw-data probe returned an MSI config")
                }
                ProbeResult::Failed(e) => {
                    self.push_unknown(child.name(), e.why);
                    return;
                }
                ProbeResult::NotRecognized => {}
            }
        }
        self.push_unknown(child.name(), "no device layout matched the group".to_string());
    }

    fn push_unknown(&mut self, path: String, reason: String) {
        warn!("'{path}' could not be mapped: {reason}");
        self.unknowns.push(Unknown { path, reason });
    }

    pub fn state(&self) -> MapState {
        self.state
    }

    /// Value of the DAQ software-version root attribute, when present.
    pub fn lapd_version(&self) -> Option<&str> {
        self.lapd_version.as_deref()
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn digitizers(&self) -> &[DigiConfig] {
        &self.digitizers
    }

    pub fn controls(&self) -> &[ControlConfig] {
        &self.controls
    }

    pub fn msi(&self) -> &[MsiConfig] {
        &self.msi
    }

    pub fn run_sequence(&self) -> Option<&str> {
        self.run_sequence.as_deref()
    }

    pub fn unknowns(&self) -> &[Unknown] {
        &self.unknowns
    }

    pub fn digitizer(&self, name: &str) -> Option<&DigiConfig> {
        self.digitizers.iter().find(|d| d.name == name)
    }

    pub fn control(&self, name: &str) -> Option<&ControlConfig> {
        self.controls.iter().find(|c| c.name == name)
    }

    pub fn controls_of_type(&self, contype: ConType) -> impl Iterator<Item = &ControlConfig> {
        self.controls.iter().filter(move |c| c.contype == contype)
    }

    /// The default digitizer: the only one mapped, else the first mapped
    /// candidate of the facility's usual main digitizers.
    pub fn main_digitizer(&self) -> Option<&DigiConfig> {
        match self.digitizers.len() {
            0 => None,
            1 => self.digitizers.first(),
            _ => MAIN_DIGITIZER_CANDIDATES
                .iter()
                .find_map(|name| self.digitizer(name)),
        }
    }
}

impl Default for FileMap {
    fn default() -> Self {
        Self::new()
    }
}

fn read_metadata(group: &hdf5::Group) -> RunMetadata {
    let attr = |name: &str| container::attr_str(group, name).unwrap_or_default();
    RunMetadata {
        investigator: attr("Investigator"),
        experiment_name: attr("Experiment name"),
        experiment_description: attr("Experiment description"),
        experiment_set_name: attr("Experiment set name"),
        experiment_set_description: attr("Experiment set description"),
        data_run: attr("Data run"),
        description: attr("Description"),
        status: attr("Status"),
        status_date: attr("Status date"),
    }
}
