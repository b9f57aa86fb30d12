//! Correlated reading of digitizer, control, and diagnostic data.
//!
//! All three read operations share the same shape: resolve the request
//! against the file map, build a shot-number index per dataset, merge
//! the requested shots across the datasets (intersection by default,
//! union with fill values otherwise), then pull the surviving rows.
//!
//! Every output carries a [`RecordMeta`] side-record describing where
//! the data came from, what conversions were applied, and any warnings
//! raised while assembling it.

use log::warn;
use ndarray::Array2;

use super::constants::{FILL_BITS, FILL_F64, FILL_I64, VOLTAGE_OFFSET_ATTR, VOLTAGE_SCALE_ATTR};
use super::container;
use super::controls::{
    ControlConfig, ControlConfigEntry, ControlKind, RunTimeListRow, SixKRow,
};
use super::digitizers::{self, DigiConfig, DigiConfigEntry};
use super::error::ReadError;
use super::file_map::FileMap;
use super::msi::MsiSummaryRow;
use super::selector::Selector;
use super::shot_index::{contiguous_block, ShotIndex};

/// A request for digitizer data from one board/channel, optionally
/// correlated with control devices.
#[derive(Debug, Clone)]
pub struct DigitizerRequest {
    /// Digitizer device name; defaults to the file's main digitizer.
    pub digitizer: Option<String>,
    /// Configuration name; defaults to the sole active configuration.
    pub config: Option<String>,
    pub board: u32,
    pub channel: u32,
    /// Require a particular ADC on the selected connection.
    pub adc: Option<String>,
    pub shots: Option<Vec<i64>>,
    pub rows: Option<Vec<usize>>,
    pub controls: Vec<(String, Option<String>)>,
    /// Keep only shots present in every dataset (default), or keep all
    /// requested shots and fill the gaps.
    pub intersection_set: bool,
    /// Skip the bit-to-voltage conversion.
    pub keep_bits: bool,
    /// Suppress log emission of this read's warnings; they are still
    /// recorded in the output metadata.
    pub silent: bool,
}

impl DigitizerRequest {
    pub fn new(board: u32, channel: u32) -> Self {
        Self {
            digitizer: None,
            config: None,
            board,
            channel,
            adc: None,
            shots: None,
            rows: None,
            controls: Vec::new(),
            intersection_set: true,
            keep_bits: false,
            silent: false,
        }
    }

    pub fn with_digitizer(mut self, name: impl Into<String>) -> Self {
        self.digitizer = Some(name.into());
        self
    }

    pub fn with_config(mut self, name: impl Into<String>) -> Self {
        self.config = Some(name.into());
        self
    }

    pub fn with_adc(mut self, name: impl Into<String>) -> Self {
        self.adc = Some(name.into());
        self
    }

    pub fn with_shots(mut self, shots: Vec<i64>) -> Self {
        self.shots = Some(shots);
        self
    }

    pub fn with_rows(mut self, rows: Vec<usize>) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn with_controls<S: Into<String>>(mut self, controls: Vec<(S, Option<S>)>) -> Self {
        self.controls = controls
            .into_iter()
            .map(|(d, c)| (d.into(), c.map(Into::into)))
            .collect();
        self
    }

    pub fn union(mut self) -> Self {
        self.intersection_set = false;
        self
    }

    pub fn keep_bits(mut self) -> Self {
        self.keep_bits = true;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// A request for control-device state alone. The first listed device's
/// dataset drives row selection; every listed device constrains the
/// intersection.
#[derive(Debug, Clone)]
pub struct ControlRequest {
    pub controls: Vec<(String, Option<String>)>,
    pub shots: Option<Vec<i64>>,
    pub rows: Option<Vec<usize>>,
    pub intersection_set: bool,
    pub silent: bool,
}

impl ControlRequest {
    pub fn new<S: Into<String>>(controls: Vec<(S, Option<S>)>) -> Self {
        Self {
            controls: controls
                .into_iter()
                .map(|(d, c)| (d.into(), c.map(Into::into)))
                .collect(),
            shots: None,
            rows: None,
            intersection_set: true,
            silent: false,
        }
    }

    pub fn with_shots(mut self, shots: Vec<i64>) -> Self {
        self.shots = Some(shots);
        self
    }

    pub fn with_rows(mut self, rows: Vec<usize>) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn union(mut self) -> Self {
        self.intersection_set = false;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Digitizer samples, in raw bits or converted volts.
#[derive(Debug, Clone)]
pub enum Signal {
    Bits(Array2<i16>),
    Volts(Array2<f64>),
}

/// Per-shot state columns contributed by one composed control device.
#[derive(Debug, Clone)]
pub enum ControlFields {
    Motion {
        /// One `[x, y, z]` row per shot.
        xyz: Array2<f64>,
        theta: Vec<f64>,
        phi: Vec<f64>,
    },
    CommandList {
        command_index: Vec<i64>,
        command: Vec<String>,
        frequency: Vec<f64>,
        voltage: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
pub struct ControlColumns {
    pub device: String,
    pub config: String,
    pub fields: ControlFields,
}

/// Provenance and conversion record attached to every read.
#[derive(Debug, Clone, Default)]
pub struct RecordMeta {
    pub device: String,
    pub config: String,
    pub dataset_path: String,
    pub board: Option<u32>,
    pub channel: Option<u32>,
    pub adc: Option<String>,
    pub bit: Option<u32>,
    pub clock_rate_hz: Option<f64>,
    pub shot_average: Option<u32>,
    pub sample_average: Option<u32>,
    /// Calibration actually applied; `None` when the signal is in bits.
    pub voltage_scale: Option<f64>,
    pub voltage_offset: Option<f64>,
    /// Composed control devices as `(device, configuration)` pairs.
    pub controls: Vec<(String, String)>,
    pub scalar_attrs: Vec<(String, f64)>,
    pub array_attrs: Vec<(String, Vec<f64>)>,
    pub warnings: Vec<String>,
}

#[derive(Debug)]
pub struct DigitizerData {
    pub shotnum: Vec<u32>,
    pub signal: Signal,
    pub controls: Vec<ControlColumns>,
    pub meta: RecordMeta,
}

impl DigitizerData {
    pub fn signal_bits(&self) -> Option<&Array2<i16>> {
        match &self.signal {
            Signal::Bits(b) => Some(b),
            Signal::Volts(_) => None,
        }
    }

    pub fn signal_volts(&self) -> Option<&Array2<f64>> {
        match &self.signal {
            Signal::Volts(v) => Some(v),
            Signal::Bits(_) => None,
        }
    }

    /// Probe positions, present iff a motion control was composed.
    pub fn xyz(&self) -> Option<&Array2<f64>> {
        self.controls.iter().find_map(|c| match &c.fields {
            ControlFields::Motion { xyz, .. } => Some(xyz),
            _ => None,
        })
    }
}

#[derive(Debug)]
pub struct ControlData {
    pub shotnum: Vec<u32>,
    pub controls: Vec<ControlColumns>,
    pub meta: RecordMeta,
}

#[derive(Debug)]
pub struct DiagnosticData {
    pub shotnum: Vec<u32>,
    pub timestamp: Vec<f64>,
    pub data_valid: Vec<i8>,
    pub signals: Vec<(String, Array2<f32>)>,
    pub meta: RecordMeta,
}

/// Warning collector for one read. Warnings always land in the output
/// metadata; the `silent` flag only gates log emission.
struct WarnLog {
    silent: bool,
    recorded: Vec<String>,
}

impl WarnLog {
    fn new(silent: bool) -> Self {
        Self {
            silent,
            recorded: Vec::new(),
        }
    }

    fn push(&mut self, msg: String) {
        if !self.silent {
            warn!("{msg}");
        }
        self.recorded.push(msg);
    }
}

enum ControlRows {
    Motion(Vec<SixKRow>),
    CommandList(Vec<RunTimeListRow>),
}

/// One control device resolved for a read: its full dataset rows and a
/// shot index over its configuration block.
struct ComposedControl<'m> {
    device: &'m ControlConfig,
    entry: &'m ControlConfigEntry,
    /// Shot-number column of the configuration block, in row order.
    shots: Vec<u32>,
    index: ShotIndex,
    rows: ControlRows,
}

fn resolve_digitizer<'m>(map: &'m FileMap, name: Option<&str>) -> Result<&'m DigiConfig, ReadError> {
    match name {
        Some(n) => map
            .digitizer(n)
            .ok_or_else(|| ReadError::UnknownDevice(n.to_string())),
        None => {
            if map.digitizers().is_empty() {
                return Err(ReadError::NoDigitizers);
            }
            map.main_digitizer().ok_or_else(|| {
                ReadError::AmbiguousDigitizer(
                    map.digitizers().iter().map(|d| d.name.clone()).collect(),
                )
            })
        }
    }
}

fn resolve_digi_config<'m>(
    digi: &'m DigiConfig,
    name: Option<&str>,
) -> Result<&'m DigiConfigEntry, ReadError> {
    match name {
        Some(n) => {
            let config = digi
                .find_config(n)
                .ok_or_else(|| ReadError::UnknownConfiguration {
                    device: digi.name.clone(),
                    config: n.to_string(),
                })?;
            if !config.active {
                return Err(ReadError::InactiveConfiguration {
                    device: digi.name.clone(),
                    config: n.to_string(),
                });
            }
            Ok(config)
        }
        None => {
            let mut active = digi.active_configs();
            match (active.next(), active.next()) {
                (Some(config), None) => Ok(config),
                (Some(_), Some(_)) => Err(ReadError::AmbiguousConfiguration(digi.name.clone())),
                (None, _) => Err(ReadError::NoActiveConfiguration(digi.name.clone())),
            }
        }
    }
}

/// Resolve the listed control devices against the map and index their
/// datasets. A missing device is an error for control-driven reads and
/// a recorded warning otherwise.
fn compose_controls<'m>(
    file: &hdf5::File,
    map: &'m FileMap,
    requested: &[(String, Option<String>)],
    missing_is_error: bool,
    warnlog: &mut WarnLog,
) -> Result<Vec<ComposedControl<'m>>, ReadError> {
    let mut out: Vec<ComposedControl<'m>> = Vec::new();
    for (name, config_name) in requested {
        let device = match map.control(name) {
            Some(d) => d,
            None if missing_is_error => {
                return Err(ReadError::UnknownDevice(name.clone()));
            }
            None => {
                warnlog.push(format!(
                    "control device '{name}' is not mapped in this file; reading without it"
                ));
                continue;
            }
        };
        if let Some(prev) = out.iter().find(|c| c.device.contype == device.contype) {
            return Err(ReadError::DuplicateControlType(
                prev.device.name.clone(),
                device.name.clone(),
                device.contype,
            ));
        }
        let entry = match config_name {
            Some(cn) => device
                .find_config(cn)
                .ok_or_else(|| ReadError::UnknownConfiguration {
                    device: device.name.clone(),
                    config: cn.clone(),
                })?,
            None if device.configs.len() == 1 => &device.configs[0],
            None => return Err(ReadError::AmbiguousConfiguration(device.name.clone())),
        };
        let group = file.group(&device.path)?;
        let dset = group.dataset(&entry.dataset_name)?;
        let (shots, index, rows) = match &entry.kind {
            ControlKind::Motion(_) => {
                let rows = dset.read_1d::<SixKRow>()?.to_vec();
                let shots: Vec<u32> = rows.iter().map(|r| r.shot_number).collect();
                let index = ShotIndex::new(&shots);
                (shots, index, ControlRows::Motion(rows))
            }
            ControlKind::CommandList(_) => {
                let all = dset.read_1d::<RunTimeListRow>()?.to_vec();
                let block = contiguous_block(
                    all.iter().map(|r| r.configuration_name() == entry.name),
                    &entry.dataset_name,
                )?;
                let (start, len) = block.unwrap_or((0, 0));
                if len == 0 {
                    warnlog.push(format!(
                        "configuration '{}' of '{}' has no rows in '{}'",
                        entry.name, device.name, entry.dataset_name
                    ));
                }
                // Only the configuration's own block is kept; all later
                // indexing is block-local.
                let rows = all[start..start + len].to_vec();
                let shots: Vec<u32> = rows.iter().map(|r| r.shot_number).collect();
                let index = ShotIndex::new(&shots);
                (shots, index, ControlRows::CommandList(rows))
            }
        };
        for &shot in index.duplicates() {
            warnlog.push(format!(
                "shot number {shot} appears more than once in '{}'; keeping its first row",
                entry.dataset_name
            ));
        }
        out.push(ComposedControl {
            device,
            entry,
            shots,
            index,
            rows,
        });
    }
    Ok(out)
}

/// Merge the requested shots across every required dataset.
fn merge_shots<'a>(
    requested: Vec<u32>,
    indices: impl Iterator<Item = &'a ShotIndex> + Clone,
    intersection_set: bool,
) -> Result<Vec<u32>, ReadError> {
    if !intersection_set {
        return Ok(requested);
    }
    let kept: Vec<u32> = requested
        .into_iter()
        .filter(|&s| indices.clone().all(|ix| ix.row_of(s).is_some()))
        .collect();
    if kept.is_empty() {
        return Err(ReadError::EmptyIntersection);
    }
    Ok(kept)
}

/// Turn a selector into the driving shot list, given the driving
/// dataset's shot column (block-local).
fn requested_shots(
    selector: &Selector,
    shot_column: &[u32],
    dataset: &str,
) -> Result<Vec<u32>, ReadError> {
    match selector {
        Selector::All => Ok(shot_column.to_vec()),
        Selector::Shots(shots) => Ok(shots.clone()),
        Selector::Rows(rows) => {
            let nrows = shot_column.len();
            let mut shots = Vec::with_capacity(rows.len());
            for &r in rows {
                if r >= nrows {
                    return Err(ReadError::IndexOutOfRange {
                        dataset: dataset.to_string(),
                        index: r,
                        rows: nrows,
                    });
                }
                shots.push(shot_column[r]);
            }
            Ok(shots)
        }
    }
}

/// Assemble one control device's per-shot columns for the final shot
/// list, filling rows for shots the device did not record.
fn control_columns(control: &ComposedControl<'_>, shotnum: &[u32]) -> ControlColumns {
    let n = shotnum.len();
    let fields = match (&control.rows, &control.entry.kind) {
        (ControlRows::Motion(rows), _) => {
            let mut xyz = Array2::from_elem((n, 3), FILL_F64);
            let mut theta = vec![FILL_F64; n];
            let mut phi = vec![FILL_F64; n];
            for (i, &shot) in shotnum.iter().enumerate() {
                if let Some(r) = control.index.row_of(shot) {
                    let row = &rows[r];
                    xyz[[i, 0]] = row.x;
                    xyz[[i, 1]] = row.y;
                    xyz[[i, 2]] = row.z;
                    theta[i] = row.theta;
                    phi[i] = row.phi;
                }
            }
            ControlFields::Motion { xyz, theta, phi }
        }
        (ControlRows::CommandList(rows), ControlKind::CommandList(config)) => {
            let resolved = config.resolved();
            let mut command_index = vec![FILL_I64; n];
            let mut command = vec![String::new(); n];
            let mut frequency = vec![FILL_F64; n];
            let mut voltage = vec![FILL_F64; n];
            for (i, &shot) in shotnum.iter().enumerate() {
                if let Some(r) = control.index.row_of(shot) {
                    let ci = rows[r].command_index;
                    command_index[i] = i64::from(ci);
                    if ci >= 0 {
                        if let Some(cmd) = resolved.get(ci as usize) {
                            command[i] = cmd.command.clone();
                            frequency[i] = cmd.frequency.unwrap_or(FILL_F64);
                            voltage[i] = cmd.voltage.unwrap_or(FILL_F64);
                        }
                    }
                }
            }
            ControlFields::CommandList {
                command_index,
                command,
                frequency,
                voltage,
            }
        }
        (ControlRows::CommandList(_), ControlKind::Motion(_)) => {
            unreachable!("command-list rows paired with a motion configuration")
        }
    };
    ControlColumns {
        device: control.device.name.clone(),
        config: control.entry.name.clone(),
        fields,
    }
}

/// Read digitizer data for one board/channel, correlated with any
/// composed control devices.
pub fn read_digitizer(
    file: &hdf5::File,
    map: &FileMap,
    request: &DigitizerRequest,
) -> Result<DigitizerData, ReadError> {
    let mut warnlog = WarnLog::new(request.silent);

    let digi = resolve_digitizer(map, request.digitizer.as_deref())?;
    let config = resolve_digi_config(digi, request.config.as_deref())?;
    let conn = config
        .connections
        .iter()
        .find(|c| c.board == request.board && c.channels.contains(&request.channel))
        .ok_or_else(|| ReadError::BadBoardChannel {
            device: digi.name.clone(),
            board: request.board,
            channel: request.channel,
        })?;
    if let Some(adc) = &request.adc {
        if conn.adc != *adc {
            return Err(ReadError::BadAdc(adc.clone()));
        }
    }

    let group = file.group(&digi.path)?;
    let dataset_name = DigiConfig::dataset_name(&config.name, request.board, request.channel);
    let dset = group.dataset(&dataset_name)?;
    let header_name =
        DigiConfig::header_dataset_name(&config.name, request.board, request.channel);
    let hdset = group.dataset(&header_name)?;

    let shot_column = digitizers::read_header_shots(&hdset, config.shot_field)?;
    let index = ShotIndex::new(&shot_column);
    for &shot in index.duplicates() {
        warnlog.push(format!(
            "shot number {shot} appears more than once in '{header_name}'; keeping its first row"
        ));
    }

    let selector = Selector::from_parts(request.shots.as_deref(), request.rows.as_deref())?;
    let requested = requested_shots(&selector, &shot_column, &dataset_name)?;

    let composed = compose_controls(file, map, &request.controls, false, &mut warnlog)?;
    let shotnum = merge_shots(
        requested,
        std::iter::once(&index).chain(composed.iter().map(|c| &c.index)),
        request.intersection_set,
    )?;

    // Gather the signal rows that exist; the rest stay at the fill value.
    let nt = dset.shape().get(1).copied().unwrap_or(0);
    let present: Vec<(usize, usize)> = shotnum
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| index.row_of(s).map(|r| (i, r)))
        .collect();
    let rows: Vec<usize> = present.iter().map(|&(_, r)| r).collect();
    let gathered = container::read_rows_2d::<i16>(&dset, &rows)?;
    let mut bits = Array2::from_elem((shotnum.len(), nt), FILL_BITS);
    for (k, &(i, _)) in present.iter().enumerate() {
        bits.row_mut(i).assign(&gathered.row(k));
    }

    let scale = container::attr_f64(&dset, VOLTAGE_SCALE_ATTR);
    let offset = container::attr_f64(&dset, VOLTAGE_OFFSET_ATTR);
    let (signal, applied) = if request.keep_bits {
        (Signal::Bits(bits), None)
    } else {
        match (scale, offset) {
            (Some(sc), Some(of)) => {
                // Convert every sample numerically, then blank the rows
                // with no recorded shot. Matching on the bit fill value
                // would corrupt genuine i16::MIN samples.
                let mut volts = bits.mapv(|b| sc * f64::from(b) + of);
                let mut absent = vec![true; shotnum.len()];
                for &(i, _) in &present {
                    absent[i] = false;
                }
                for (i, &gone) in absent.iter().enumerate() {
                    if gone {
                        volts.row_mut(i).fill(FILL_F64);
                    }
                }
                (Signal::Volts(volts), Some((sc, of)))
            }
            _ => {
                warnlog.push(format!(
                    "dataset '{dataset_name}' has no calibration attributes; signal left in bits"
                ));
                (Signal::Bits(bits), None)
            }
        }
    };

    let controls: Vec<ControlColumns> = composed
        .iter()
        .map(|c| control_columns(c, &shotnum))
        .collect();

    let meta = RecordMeta {
        device: digi.name.clone(),
        config: config.name.clone(),
        dataset_path: format!("{}/{dataset_name}", digi.path),
        board: Some(request.board),
        channel: Some(request.channel),
        adc: Some(conn.adc.clone()),
        bit: Some(conn.bit),
        clock_rate_hz: Some(conn.clock_rate_hz),
        shot_average: config.shot_average,
        sample_average: config.sample_average,
        voltage_scale: applied.map(|(sc, _)| sc),
        voltage_offset: applied.map(|(_, of)| of),
        controls: controls
            .iter()
            .map(|c| (c.device.clone(), c.config.clone()))
            .collect(),
        scalar_attrs: Vec::new(),
        array_attrs: Vec::new(),
        warnings: warnlog.recorded,
    };

    Ok(DigitizerData {
        shotnum,
        signal,
        controls,
        meta,
    })
}

/// Read control-device state alone. The first listed device drives row
/// selection; every listed device constrains the intersection.
pub fn read_control(
    file: &hdf5::File,
    map: &FileMap,
    request: &ControlRequest,
) -> Result<ControlData, ReadError> {
    let mut warnlog = WarnLog::new(request.silent);

    if request.controls.is_empty() {
        return Err(ReadError::NoControls);
    }
    let composed = compose_controls(file, map, &request.controls, true, &mut warnlog)?;
    let driver = &composed[0];

    let selector = Selector::from_parts(request.shots.as_deref(), request.rows.as_deref())?;
    let requested = requested_shots(&selector, &driver.shots, &driver.entry.dataset_name)?;
    let shotnum = merge_shots(
        requested,
        composed.iter().map(|c| &c.index),
        request.intersection_set,
    )?;

    let controls: Vec<ControlColumns> = composed
        .iter()
        .map(|c| control_columns(c, &shotnum))
        .collect();

    let meta = RecordMeta {
        device: driver.device.name.clone(),
        config: driver.entry.name.clone(),
        dataset_path: format!("{}/{}", driver.device.path, driver.entry.dataset_name),
        controls: controls
            .iter()
            .map(|c| (c.device.clone(), c.config.clone()))
            .collect(),
        warnings: warnlog.recorded,
        ..RecordMeta::default()
    };

    Ok(ControlData {
        shotnum,
        controls,
        meta,
    })
}

/// Read every recorded shot of one MSI diagnostic.
pub fn read_diagnostic(
    file: &hdf5::File,
    map: &FileMap,
    name: &str,
) -> Result<DiagnosticData, ReadError> {
    let diag = map
        .msi()
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| ReadError::UnknownDevice(name.to_string()))?;
    let group = file.group(&diag.path)?;

    let summary = group.dataset(&diag.summary_dataset)?;
    let rows = summary.read_1d::<MsiSummaryRow>()?.to_vec();

    let mut signals = Vec::new();
    for sname in &diag.signal_datasets {
        let dset = group.dataset(sname)?;
        signals.push((sname.clone(), dset.read_2d::<f32>()?));
    }

    let meta = RecordMeta {
        device: diag.name.clone(),
        dataset_path: format!("{}/{}", diag.path, diag.summary_dataset),
        scalar_attrs: diag.scalar_attrs.clone(),
        array_attrs: diag.array_attrs.clone(),
        ..RecordMeta::default()
    };

    Ok(DiagnosticData {
        shotnum: rows.iter().map(|r| r.shot_number).collect(),
        timestamp: rows.iter().map(|r| r.timestamp).collect(),
        data_valid: rows.iter().map(|r| r.data_valid).collect(),
        signals,
        meta,
    })
}
