//! Control-device layout descriptors and configuration records.
//!
//! Three control devices are known. The 6K Compumotor records probe
//! motion, one dataset per receptacle. Waveform and N5700_PS are
//! command-list devices: every configuration shares the single
//! `Run time list` dataset and is told apart by its `configuration`
//! column, and the per-command state (frequency, voltage) is parsed out
//! of the command strings lazily on first read.

use std::sync::OnceLock;

use hdf5::types::FixedAscii;
use hdf5::{Group, H5Type};
use log::warn;

use super::container;
use super::error::MappingError;
use super::registry::{ConType, DeviceConfig};

/// Row layout of a 6K Compumotor `XY[<r>]: <probe>` dataset.
#[derive(H5Type, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct SixKRow {
    pub shot_number: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub theta: f64,
    pub phi: f64,
}

/// Row layout of the shared `Run time list` dataset of command-list
/// devices.
#[derive(H5Type, Clone, Copy, Debug)]
#[repr(C)]
pub struct RunTimeListRow {
    pub shot_number: u32,
    pub command_index: i32,
    pub configuration: FixedAscii<32>,
}

impl RunTimeListRow {
    /// The configuration name with fixed-width padding stripped.
    pub fn configuration_name(&self) -> &str {
        self.configuration.as_str().trim_end()
    }
}

/// A probe drive motion list (grid the probe was stepped over).
#[derive(Debug, Clone, PartialEq)]
pub struct MotionList {
    pub name: String,
    pub nx: Option<u32>,
    pub ny: Option<u32>,
    pub dx: Option<f64>,
    pub dy: Option<f64>,
}

/// Per-receptacle configuration of the 6K Compumotor.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionConfig {
    pub receptacle: u32,
    pub probe_name: String,
    pub port: Option<u32>,
    pub motion_lists: Vec<MotionList>,
}

/// Which value pattern a device's command strings carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPattern {
    /// `FREQ <f>` and `VOLT <f>` commands (Waveform generators).
    FreqVolt,
    /// `VOLT <f>` commands only (power supplies).
    VoltOnly,
}

/// Typed state parsed out of one command string.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
    pub command: String,
    pub frequency: Option<f64>,
    pub voltage: Option<f64>,
}

/// Configuration of a command-list device.
///
/// The raw command strings are stored at map time; the typed
/// [`ResolvedCommand`]s are computed once, on first use.
#[derive(Debug, Clone)]
pub struct CommandListConfig {
    pub ip_address: Option<String>,
    /// `Generator type` for Waveform, `Power supply device` for N5700_PS.
    pub device_label: Option<String>,
    pub gpib_address: Option<u32>,
    pub initial_state: Option<String>,
    pub commands: Vec<String>,
    pub pattern: CommandPattern,
    resolved: OnceLock<Vec<ResolvedCommand>>,
}

impl CommandListConfig {
    pub fn new(
        ip_address: Option<String>,
        device_label: Option<String>,
        gpib_address: Option<u32>,
        initial_state: Option<String>,
        commands: Vec<String>,
        pattern: CommandPattern,
    ) -> Self {
        Self {
            ip_address,
            device_label,
            gpib_address,
            initial_state,
            commands,
            pattern,
            resolved: OnceLock::new(),
        }
    }

    /// The typed per-command state. Parsed once; later calls return the
    /// same slice.
    pub fn resolved(&self) -> &[ResolvedCommand] {
        self.resolved.get_or_init(|| {
            self.commands
                .iter()
                .map(|cmd| resolve_command(cmd, self.pattern))
                .collect()
        })
    }
}

impl PartialEq for CommandListConfig {
    fn eq(&self, other: &Self) -> bool {
        self.ip_address == other.ip_address
            && self.device_label == other.device_label
            && self.gpib_address == other.gpib_address
            && self.initial_state == other.initial_state
            && self.commands == other.commands
            && self.pattern == other.pattern
    }
}

/// The device-specific half of a control configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Motion(MotionConfig),
    CommandList(CommandListConfig),
}

/// One named configuration of a control device, and the dataset its
/// state is read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfigEntry {
    pub name: String,
    pub dataset_name: String,
    pub kind: ControlKind,
}

/// Configuration record for one mapped control device.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    pub name: String,
    pub path: String,
    pub contype: ConType,
    pub configs: Vec<ControlConfigEntry>,
}

impl ControlConfig {
    pub fn find_config(&self, name: &str) -> Option<&ControlConfigEntry> {
        self.configs.iter().find(|c| c.name == name)
    }
}

/// Parse the value following `key` in a command string, e.g.
/// `FREQ 4.0e4` with key `FREQ` gives `40000.0`. SCPI path prefixes
/// such as `SOURCE1:FREQ` are accepted.
fn command_value(command: &str, key: &str) -> Option<f64> {
    let mut tokens = command.split_whitespace();
    while let Some(token) = tokens.next() {
        let leaf = token.rsplit(':').next().unwrap_or(token);
        if leaf.eq_ignore_ascii_case(key) {
            return tokens.next().and_then(|v| v.parse().ok());
        }
    }
    None
}

fn resolve_command(command: &str, pattern: CommandPattern) -> ResolvedCommand {
    let frequency = match pattern {
        CommandPattern::FreqVolt => command_value(command, "FREQ"),
        CommandPattern::VoltOnly => None,
    };
    ResolvedCommand {
        command: command.to_string(),
        frequency,
        voltage: command_value(command, "VOLT"),
    }
}

/// Parse `Probe: XY[<r>]: <probe name>` into receptacle and probe name.
fn parse_probe_group_name(name: &str) -> Option<(u32, &str)> {
    let rest = name.strip_prefix("Probe: XY[")?;
    let (receptacle, rest) = rest.split_once("]: ")?;
    let receptacle = receptacle.parse().ok()?;
    if rest.is_empty() {
        return None;
    }
    Some((receptacle, rest))
}

pub(crate) fn extract_sixk(group: &Group) -> Result<DeviceConfig, MappingError> {
    let path = group.name();
    let dataset_names =
        container::dataset_names(group).map_err(|e| MappingError::new(&path, e.to_string()))?;

    let mut motion_lists = Vec::new();
    let mut probes = Vec::new();
    for gname in
        container::subgroup_names(group).map_err(|e| MappingError::new(&path, e.to_string()))?
    {
        if let Some(list_name) = gname.strip_prefix("Motion list: ") {
            let list_group = group
                .group(&gname)
                .map_err(|e| MappingError::new(&path, e.to_string()))?;
            motion_lists.push(MotionList {
                name: list_name.to_string(),
                nx: container::attr_u32(&list_group, "Nx"),
                ny: container::attr_u32(&list_group, "Ny"),
                dx: container::attr_f64(&list_group, "Delta x"),
                dy: container::attr_f64(&list_group, "Delta y"),
            });
        } else if let Some((receptacle, probe_name)) = parse_probe_group_name(&gname) {
            let probe_group = group
                .group(&gname)
                .map_err(|e| MappingError::new(&path, e.to_string()))?;
            probes.push((
                receptacle,
                probe_name.to_string(),
                container::attr_u32(&probe_group, "Port"),
            ));
        } else {
            warn!("'{gname}' does not look like a probe or motion-list group, skipping");
        }
    }

    let mut configs = Vec::new();
    for (receptacle, probe_name, port) in probes {
        let dataset_name = format!("XY[{receptacle}]: {probe_name}");
        if !dataset_names.contains(&dataset_name) {
            warn!("probe '{probe_name}' has no dataset '{dataset_name}', dropping");
            continue;
        }
        if configs
            .iter()
            .any(|c: &ControlConfigEntry| c.name == receptacle.to_string())
        {
            warn!("duplicate receptacle {receptacle}, skipping probe '{probe_name}'");
            continue;
        }
        configs.push(ControlConfigEntry {
            name: receptacle.to_string(),
            dataset_name,
            kind: ControlKind::Motion(MotionConfig {
                receptacle,
                probe_name,
                port,
                motion_lists: motion_lists.clone(),
            }),
        });
    }
    if configs.is_empty() {
        return Err(MappingError::new(&path, "there are no mappable probe configurations"));
    }
    configs.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(DeviceConfig::Control(ControlConfig {
        name: "6K Compumotor".to_string(),
        path,
        contype: ConType::Motion,
        configs,
    }))
}

struct CommandListAttrs {
    device: &'static str,
    contype: ConType,
    command_list_attr: &'static str,
    device_label_attr: &'static str,
    has_gpib: bool,
    pattern: CommandPattern,
}

fn extract_command_list(group: &Group, attrs: CommandListAttrs) -> Result<DeviceConfig, MappingError> {
    let path = group.name();
    if group.dataset("Run time list").is_err() {
        return Err(MappingError::new(&path, "dataset 'Run time list' not found"));
    }

    let mut configs = Vec::new();
    for gname in
        container::subgroup_names(group).map_err(|e| MappingError::new(&path, e.to_string()))?
    {
        let config_group = group
            .group(&gname)
            .map_err(|e| MappingError::new(&path, e.to_string()))?;
        let commands: Vec<String> = match container::attr_str(&config_group, attrs.command_list_attr)
        {
            Some(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                return Err(MappingError::new(
                    &path,
                    format!(
                        "configuration '{gname}' is missing attribute '{}'",
                        attrs.command_list_attr
                    ),
                ));
            }
        };
        if commands.is_empty() {
            return Err(MappingError::new(
                &path,
                format!("configuration '{gname}' has an empty command list"),
            ));
        }
        let ip_address = container::attr_str(&config_group, "IP address");
        if ip_address.is_none() {
            warn!("configuration '{gname}' of '{}' has no IP address", attrs.device);
        }
        configs.push(ControlConfigEntry {
            name: gname,
            dataset_name: "Run time list".to_string(),
            kind: ControlKind::CommandList(CommandListConfig::new(
                ip_address,
                container::attr_str(&config_group, attrs.device_label_attr),
                if attrs.has_gpib {
                    container::attr_u32(&config_group, "GPIB address")
                } else {
                    None
                },
                container::attr_str(&config_group, "Initial state"),
                commands,
                attrs.pattern,
            )),
        });
    }
    if configs.is_empty() {
        return Err(MappingError::new(&path, "there are no mappable configurations"));
    }

    Ok(DeviceConfig::Control(ControlConfig {
        name: attrs.device.to_string(),
        path,
        contype: attrs.contype,
        configs,
    }))
}

pub(crate) fn extract_waveform(group: &Group) -> Result<DeviceConfig, MappingError> {
    extract_command_list(
        group,
        CommandListAttrs {
            device: "Waveform",
            contype: ConType::Waveform,
            command_list_attr: "Waveform command list",
            device_label_attr: "Generator type",
            has_gpib: true,
            pattern: CommandPattern::FreqVolt,
        },
    )
}

pub(crate) fn extract_n5700ps(group: &Group) -> Result<DeviceConfig, MappingError> {
    extract_command_list(
        group,
        CommandListAttrs {
            device: "N5700_PS",
            contype: ConType::Power,
            command_list_attr: "N5700 power supply command list",
            device_label_attr: "Power supply device",
            has_gpib: false,
            pattern: CommandPattern::VoltOnly,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_group_name_parsing() {
        assert_eq!(
            parse_probe_group_name("Probe: XY[3]: LP probe"),
            Some((3, "LP probe"))
        );
        assert_eq!(parse_probe_group_name("Probe: XY[]: LP"), None);
        assert_eq!(parse_probe_group_name("Motion list: fine grid"), None);
    }

    #[test]
    fn command_values_parse() {
        let cmd = resolve_command("SOURCE1:FREQ 40000.0 VOLT 2.5", CommandPattern::FreqVolt);
        assert_eq!(cmd.frequency, Some(40000.0));
        assert_eq!(cmd.voltage, Some(2.5));

        let cmd = resolve_command("VOLT 12.0", CommandPattern::VoltOnly);
        assert_eq!(cmd.frequency, None);
        assert_eq!(cmd.voltage, Some(12.0));

        let cmd = resolve_command("OUTPUT ON", CommandPattern::FreqVolt);
        assert_eq!(cmd.frequency, None);
        assert_eq!(cmd.voltage, None);
    }

    #[test]
    fn command_resolution_is_idempotent() {
        let config = CommandListConfig::new(
            None,
            None,
            None,
            None,
            vec!["FREQ 100.0".to_string(), "FREQ 200.0".to_string()],
            CommandPattern::FreqVolt,
        );
        let first = config.resolved().to_vec();
        let second = config.resolved().to_vec();
        assert_eq!(first, second);
        assert_eq!(first[1].frequency, Some(200.0));
    }
}
