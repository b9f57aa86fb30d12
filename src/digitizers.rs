//! Digitizer layout descriptors and configuration records.
//!
//! Two digitizer models are known: the SIS 3301 (14 bit, 100 MHz) and the
//! SIS crate (SIS 3302 and SIS 3305 ADCs selected per board). Both share
//! the same group shape:
//!
//! ```text
//! +-- SIS 3301
//! |   +-- Configuration: Config01
//! |   |   +-- Boards[0]            (attr Board)
//! |   |   |   +-- Channels[0]      (attr Channel)
//! |   +-- Config01 [0:0]           (2-D i16 dataset, shots x samples)
//! |   +-- Config01 [0:0] headers   (compound dataset, one row per shot)
//! ```

use hdf5::{Dataset, Group, H5Type};
use log::warn;

use super::container;
use super::error::MappingError;

/// Header rows written by current DAQ software.
#[derive(H5Type, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct HeaderRow {
    pub shot_number: u32,
    pub timestamp: f64,
}

/// Header rows written by pre-renaming DAQ software; the shot-number
/// member was originally called `shot`.
#[derive(H5Type, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct LegacyHeaderRow {
    pub shot: u32,
    pub timestamp: f64,
}

/// Which header layout a configuration's datasets carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotField {
    Modern,
    Legacy,
}

/// One connected board of an ADC, with its acquisition parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AdcConnection {
    pub adc: String,
    pub board: u32,
    pub channels: Vec<u32>,
    pub bit: u32,
    pub clock_rate_hz: f64,
    /// Shot count of the board's datasets (0 for inactive configurations).
    pub nshotnum: usize,
    /// Time-sample count of the board's datasets.
    pub nt: usize,
}

/// One named digitizer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DigiConfigEntry {
    pub name: String,
    /// A configuration is active when its datasets exist in the group.
    pub active: bool,
    pub shot_field: ShotField,
    pub shot_average: Option<u32>,
    pub sample_average: Option<u32>,
    pub connections: Vec<AdcConnection>,
}

/// Configuration record for one mapped digitizer device.
#[derive(Debug, Clone, PartialEq)]
pub struct DigiConfig {
    pub name: String,
    pub path: String,
    pub configs: Vec<DigiConfigEntry>,
}

impl DigiConfig {
    pub fn active_configs(&self) -> impl Iterator<Item = &DigiConfigEntry> {
        self.configs.iter().filter(|c| c.active)
    }

    pub fn find_config(&self, name: &str) -> Option<&DigiConfigEntry> {
        self.configs.iter().find(|c| c.name == name)
    }

    /// Name of the dataset holding digitizer data for a board/channel:
    /// `<config> [<board>:<channel>]`.
    pub fn dataset_name(config: &str, board: u32, channel: u32) -> String {
        format!("{config} [{board}:{channel}]")
    }

    /// Name of the header dataset paired with [`Self::dataset_name`].
    pub fn header_dataset_name(config: &str, board: u32, channel: u32) -> String {
        format!("{} headers", Self::dataset_name(config, board, channel))
    }
}

/// Read the full shot-number column of a header dataset.
pub fn read_header_shots(dset: &Dataset, field: ShotField) -> hdf5::Result<Vec<u32>> {
    match field {
        ShotField::Modern => Ok(dset
            .read_1d::<HeaderRow>()?
            .iter()
            .map(|r| r.shot_number)
            .collect()),
        ShotField::Legacy => Ok(dset
            .read_1d::<LegacyHeaderRow>()?
            .iter()
            .map(|r| r.shot)
            .collect()),
    }
}

/// Parse `Configuration: <name>` into the configuration name.
fn parse_config_name(group_name: &str) -> Option<&str> {
    group_name
        .strip_prefix("Configuration: ")
        .filter(|rest| !rest.is_empty())
}

/// Parse the `Samples to average` attribute: `Average <N> Samples` or
/// `No averaging`. Counts of 0 or 1 normalize to no averaging.
fn parse_sample_average(group: &Group) -> Option<u32> {
    let text = container::attr_str(group, "Samples to average")?;
    if text == "No averaging" {
        return None;
    }
    let count = text
        .strip_prefix("Average ")
        .and_then(|rest| rest.strip_suffix(" Samples"))
        .and_then(|n| n.parse::<u32>().ok());
    match count {
        Some(0) | Some(1) => None,
        Some(n) => Some(n),
        None => {
            warn!("Unparsable sample averaging '{text}', treating as no averaging");
            None
        }
    }
}

fn parse_shot_average(group: &Group) -> Option<u32> {
    match container::attr_u32(group, "Shots to average") {
        Some(0) | Some(1) | None => None,
        Some(n) => Some(n),
    }
}

/// Resolve the ADC parameters for one board group of the given model.
/// Returns `(adc name, bit depth, clock rate in Hz)`.
fn board_adc(model: &str, board_group: &Group) -> Option<(String, u32, f64)> {
    match model {
        "SIS 3301" => Some(("SIS 3301".to_string(), 14, 100.0e6)),
        "SIS crate" => match container::attr_str(board_group, "Adc").as_deref() {
            Some("SIS 3302") => Some(("SIS 3302".to_string(), 16, 100.0e6)),
            Some("SIS 3305") => Some(("SIS 3305".to_string(), 10, 1.25e9)),
            other => {
                warn!("Board group has unrecognized Adc attribute {other:?}, skipping board");
                None
            }
        },
        _ => None,
    }
}

/// Gather the connected boards and channels declared under one
/// configuration group.
fn find_adc_connections(
    model: &str,
    config_group: &Group,
    path: &str,
    active: bool,
) -> Result<Vec<AdcConnection>, MappingError> {
    let mut connections: Vec<AdcConnection> = Vec::new();
    for bname in container::subgroup_names(config_group)
        .map_err(|e| MappingError::new(path, e.to_string()))?
    {
        if !(bname.starts_with("Boards[") && bname.ends_with(']')) {
            warn!("'{bname}' does not match the expected board group name, skipping");
            continue;
        }
        let board_group = config_group
            .group(&bname)
            .map_err(|e| MappingError::new(path, e.to_string()))?;
        let board = match container::attr_u32(&board_group, "Board") {
            Some(b) => b,
            None => {
                return Err(MappingError::new(path, "board attribute 'Board' missing"));
            }
        };
        if connections.iter().any(|c| c.board == board) {
            let why = format!("duplicate board number {board} in '{bname}'");
            if active {
                return Err(MappingError::new(path, why));
            }
            warn!("{why}, skipping");
            continue;
        }
        let (adc, bit, clock_rate_hz) = match board_adc(model, &board_group) {
            Some(info) => info,
            None => continue,
        };

        let mut channels = Vec::new();
        for cname in container::subgroup_names(&board_group)
            .map_err(|e| MappingError::new(path, e.to_string()))?
        {
            if !(cname.starts_with("Channels[") && cname.ends_with(']')) {
                warn!("'{cname}' does not match the expected channel group name, skipping");
                continue;
            }
            let ch_group = board_group
                .group(&cname)
                .map_err(|e| MappingError::new(path, e.to_string()))?;
            match container::attr_u32(&ch_group, "Channel") {
                Some(ch) if !channels.contains(&ch) => channels.push(ch),
                Some(ch) => warn!("duplicate channel number {ch} on board {board}, skipping"),
                None => {
                    return Err(MappingError::new(
                        path,
                        "channel attribute 'Channel' missing",
                    ));
                }
            }
        }
        if channels.is_empty() {
            warn!("board {board} declares no valid channels, skipping");
            continue;
        }
        connections.push(AdcConnection {
            adc,
            board,
            channels,
            bit,
            clock_rate_hz,
            nshotnum: 0,
            nt: 0,
        });
    }
    Ok(connections)
}

/// Review the datasets behind an active configuration's connections:
/// every board/channel combination must have a data and a header dataset
/// with consistent shapes, and the header dtype fixes the shot-field
/// layout. Invalid channels are dropped with a warning.
fn review_datasets(
    group: &Group,
    config_name: &str,
    connections: &mut Vec<AdcConnection>,
    path: &str,
) -> Result<ShotField, MappingError> {
    let mut shot_field: Option<ShotField> = None;
    let mut kept = Vec::new();
    for mut conn in connections.drain(..) {
        let mut channels = Vec::new();
        let mut nshotnum: Option<usize> = None;
        let mut nt: Option<usize> = None;
        for &ch in &conn.channels {
            let dname = DigiConfig::dataset_name(config_name, conn.board, ch);
            let hname = DigiConfig::header_dataset_name(config_name, conn.board, ch);
            let (dset, hdset) = match (group.dataset(&dname), group.dataset(&hname)) {
                (Ok(d), Ok(h)) => (d, h),
                _ => {
                    warn!(
                        "dataset '{dname}' or its header not found for board {} channel {ch}, \
                         dropping channel",
                        conn.board
                    );
                    continue;
                }
            };
            let dshape = dset.shape();
            if dshape.len() != 2 {
                warn!("dataset '{dname}' is not a 2-D array, dropping channel");
                continue;
            }
            if hdset.shape().first().copied() != dshape.first().copied() {
                warn!("dataset and header for '{dname}' disagree on shot count, dropping channel");
                continue;
            }
            let fields = container::compound_field_names(&hdset)
                .map_err(|e| MappingError::new(path, e.to_string()))?;
            let this_field = match fields {
                Some(names) if names.iter().any(|n| n == "shot_number") => ShotField::Modern,
                Some(names) if names.iter().any(|n| n == "shot") => ShotField::Legacy,
                _ => {
                    warn!("header '{hname}' has no recognizable shot-number member, dropping channel");
                    continue;
                }
            };
            match shot_field {
                None => shot_field = Some(this_field),
                Some(existing) if existing != this_field => {
                    warn!("header '{hname}' disagrees on shot-field layout, dropping channel");
                    continue;
                }
                Some(_) => {}
            }
            match (nshotnum, nt) {
                (None, None) => {
                    nshotnum = Some(dshape[0]);
                    nt = Some(dshape[1]);
                }
                (Some(ns), Some(ts)) if ns != dshape[0] || ts != dshape[1] => {
                    warn!("dataset '{dname}' shape is inconsistent with the board's other channels, dropping channel");
                    continue;
                }
                _ => {}
            }
            channels.push(ch);
        }
        if channels.is_empty() {
            warn!(
                "board {} of configuration '{config_name}' has no valid channels, dropping board",
                conn.board
            );
            continue;
        }
        conn.channels = channels;
        conn.nshotnum = nshotnum.unwrap_or(0);
        conn.nt = nt.unwrap_or(0);
        kept.push(conn);
    }
    *connections = kept;
    Ok(shot_field.unwrap_or(ShotField::Modern))
}

fn extract_digitizer(group: &Group, model: &str) -> Result<DigiConfig, MappingError> {
    let path = group.name();
    let dataset_names =
        container::dataset_names(group).map_err(|e| MappingError::new(&path, e.to_string()))?;
    let mut configs = Vec::new();

    for gname in
        container::subgroup_names(group).map_err(|e| MappingError::new(&path, e.to_string()))?
    {
        let config_name = match parse_config_name(&gname) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let config_group = group
            .group(&gname)
            .map_err(|e| MappingError::new(&path, e.to_string()))?;
        let active = dataset_names
            .iter()
            .any(|d| d.starts_with(&format!("{config_name} [")));

        let mut connections = find_adc_connections(model, &config_group, &path, active)?;
        let shot_field = if active {
            review_datasets(group, &config_name, &mut connections, &path)?
        } else {
            ShotField::Modern
        };
        configs.push(DigiConfigEntry {
            name: config_name,
            active,
            shot_field,
            shot_average: parse_shot_average(&config_group),
            sample_average: parse_sample_average(&config_group),
            connections,
        });
    }

    if configs.is_empty() {
        return Err(MappingError::new(&path, "there are no mappable configurations"));
    }
    if !configs.iter().any(|c| c.active) {
        return Err(MappingError::new(&path, "there are no active configurations"));
    }
    for config in configs.iter().filter(|c| c.active) {
        if config.connections.is_empty() {
            return Err(MappingError::new(
                &path,
                format!(
                    "active configuration '{}' has no connected boards and channels",
                    config.name
                ),
            ));
        }
    }

    Ok(DigiConfig {
        name: model.to_string(),
        path,
        configs,
    })
}

pub(crate) fn extract_sis3301(
    group: &Group,
) -> Result<super::registry::DeviceConfig, MappingError> {
    extract_digitizer(group, "SIS 3301").map(super::registry::DeviceConfig::Digitizer)
}

pub(crate) fn extract_sis_crate(
    group: &Group,
) -> Result<super::registry::DeviceConfig, MappingError> {
    extract_digitizer(group, "SIS crate").map(super::registry::DeviceConfig::Digitizer)
}
