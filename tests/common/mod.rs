//! Builders for faux data-run files used by the integration tests.
//!
//! The files are written with the same row structs the crate reads, so
//! the on-disk compound layouts always match what the readers expect.

#![allow(dead_code)]

use std::path::PathBuf;

use hdf5::types::{FixedAscii, VarLenUnicode};
use hdf5::{Group, Location};
use ndarray::Array2;
use tempfile::TempDir;

use lapd_h5::controls::{RunTimeListRow, SixKRow};
use lapd_h5::digitizers::{HeaderRow, LegacyHeaderRow};
use lapd_h5::msi::MsiSummaryRow;

pub const SCALE: f64 = 0.0012207;
pub const OFFSET: f64 = -2.5;

pub fn write_str_attr(loc: &Location, name: &str, value: &str) {
    let value: VarLenUnicode = value.parse().unwrap();
    loc.new_attr::<VarLenUnicode>()
        .create(name)
        .unwrap()
        .write_scalar(&value)
        .unwrap();
}

pub fn write_u32_attr(loc: &Location, name: &str, value: u32) {
    loc.new_attr::<u32>()
        .create(name)
        .unwrap()
        .write_scalar(&value)
        .unwrap();
}

pub fn write_f64_attr(loc: &Location, name: &str, value: f64) {
    loc.new_attr::<f64>()
        .create(name)
        .unwrap()
        .write_scalar(&value)
        .unwrap();
}

pub fn write_f64_array_attr(loc: &Location, name: &str, values: &[f64]) {
    loc.new_attr::<f64>()
        .shape(values.len())
        .create(name)
        .unwrap()
        .write_raw(values)
        .unwrap();
}

fn ensure_group(parent: &Group, name: &str) -> Group {
    parent
        .group(name)
        .or_else(|_| parent.create_group(name))
        .unwrap()
}

/// A new HDF5 file with the facility's root attribute, both top-level
/// groups, and run metadata. The returned handle must be dropped before
/// the file is reopened through the crate.
pub fn base_file() -> (TempDir, PathBuf, hdf5::File) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.hdf5");
    let file = hdf5::File::create(&path).unwrap();

    write_str_attr(&file, "LaPD HDF5 software version", "1.2");
    file.create_group("MSI").unwrap();
    let data = file.create_group("Raw data + config").unwrap();
    write_str_attr(&data, "Investigator", "K. Tester");
    write_str_attr(&data, "Experiment name", "wave damping");
    write_str_attr(&data, "Experiment description", "Alfven wave damping scan");
    write_str_attr(&data, "Experiment set name", "waves");
    write_str_attr(&data, "Experiment set description", "wave campaigns");
    write_str_attr(&data, "Data run", "run 42");
    write_str_attr(&data, "Description", "radial scan at 1 kG");
    write_str_attr(&data, "Status", "done");
    write_str_attr(&data, "Status date", "8/24/2026 10:04:00 AM");

    (dir, path, file)
}

/// Deterministic sample value for a shot/sample pair.
pub fn bit_value(shot: u32, sample: usize) -> i16 {
    (shot * 10) as i16 + sample as i16
}

fn add_digitizer_datasets(
    digi: &Group,
    config: &str,
    board: u32,
    channels: &[u32],
    first_shot: u32,
    nshots: usize,
    nt: usize,
    calibrated: bool,
    legacy: bool,
) {
    for &ch in channels {
        let data = Array2::from_shape_fn((nshots, nt), |(i, t)| {
            bit_value(first_shot + i as u32, t)
        });
        let name = format!("{config} [{board}:{ch}]");
        let dset = digi
            .new_dataset_builder()
            .with_data(&data)
            .create(name.as_str())
            .unwrap();
        if calibrated {
            write_f64_attr(&dset, "Voltage scale", SCALE);
            write_f64_attr(&dset, "Voltage offset", OFFSET);
        }

        let hname = format!("{name} headers");
        if legacy {
            let rows: Vec<LegacyHeaderRow> = (0..nshots)
                .map(|i| LegacyHeaderRow {
                    shot: first_shot + i as u32,
                    timestamp: i as f64 * 1e-3,
                })
                .collect();
            digi.new_dataset_builder()
                .with_data(&rows)
                .create(hname.as_str())
                .unwrap();
        } else {
            let rows: Vec<HeaderRow> = (0..nshots)
                .map(|i| HeaderRow {
                    shot_number: first_shot + i as u32,
                    timestamp: i as f64 * 1e-3,
                })
                .collect();
            digi.new_dataset_builder()
                .with_data(&rows)
                .create(hname.as_str())
                .unwrap();
        }
    }
}

/// Add a SIS 3301 configuration with one board and its datasets.
pub fn add_sis3301(
    data_group: &Group,
    config: &str,
    board: u32,
    channels: &[u32],
    first_shot: u32,
    nshots: usize,
    nt: usize,
    calibrated: bool,
) {
    add_sis3301_opts(
        data_group, config, board, channels, first_shot, nshots, nt, calibrated, false,
    );
}

pub fn add_sis3301_opts(
    data_group: &Group,
    config: &str,
    board: u32,
    channels: &[u32],
    first_shot: u32,
    nshots: usize,
    nt: usize,
    calibrated: bool,
    legacy: bool,
) {
    let digi = ensure_group(data_group, "SIS 3301");
    let cfg = ensure_group(&digi, &format!("Configuration: {config}"));
    write_u32_attr(&cfg, "Shots to average", 1);
    write_str_attr(&cfg, "Samples to average", "No averaging");
    let bgroup = ensure_group(&cfg, &format!("Boards[{board}]"));
    write_u32_attr(&bgroup, "Board", board);
    for (j, &ch) in channels.iter().enumerate() {
        let cgroup = ensure_group(&bgroup, &format!("Channels[{j}]"));
        write_u32_attr(&cgroup, "Channel", ch);
    }
    add_digitizer_datasets(
        &digi, config, board, channels, first_shot, nshots, nt, calibrated, legacy,
    );
}

/// Add a calibrated SIS 3301 configuration whose single channel carries
/// the given samples and header shot numbers verbatim.
pub fn add_sis3301_raw(
    data_group: &Group,
    config: &str,
    board: u32,
    channel: u32,
    shots: &[u32],
    data: &Array2<i16>,
) {
    assert_eq!(data.nrows(), shots.len());
    let digi = ensure_group(data_group, "SIS 3301");
    let cfg = ensure_group(&digi, &format!("Configuration: {config}"));
    let bgroup = ensure_group(&cfg, &format!("Boards[{board}]"));
    write_u32_attr(&bgroup, "Board", board);
    let cgroup = ensure_group(&bgroup, "Channels[0]");
    write_u32_attr(&cgroup, "Channel", channel);

    let name = format!("{config} [{board}:{channel}]");
    let dset = digi
        .new_dataset_builder()
        .with_data(data)
        .create(name.as_str())
        .unwrap();
    write_f64_attr(&dset, "Voltage scale", SCALE);
    write_f64_attr(&dset, "Voltage offset", OFFSET);

    let rows: Vec<HeaderRow> = shots
        .iter()
        .enumerate()
        .map(|(i, &s)| HeaderRow {
            shot_number: s,
            timestamp: i as f64 * 1e-3,
        })
        .collect();
    let hname = format!("{name} headers");
    digi.new_dataset_builder()
        .with_data(&rows)
        .create(hname.as_str())
        .unwrap();
}

/// Add a SIS crate configuration with one board of the named ADC.
pub fn add_sis_crate(
    data_group: &Group,
    config: &str,
    adc: &str,
    board: u32,
    channels: &[u32],
    first_shot: u32,
    nshots: usize,
    nt: usize,
) {
    let digi = ensure_group(data_group, "SIS crate");
    let cfg = ensure_group(&digi, &format!("Configuration: {config}"));
    let bgroup = ensure_group(&cfg, &format!("Boards[{board}]"));
    write_u32_attr(&bgroup, "Board", board);
    write_str_attr(&bgroup, "Adc", adc);
    for (j, &ch) in channels.iter().enumerate() {
        let cgroup = ensure_group(&bgroup, &format!("Channels[{j}]"));
        write_u32_attr(&cgroup, "Channel", ch);
    }
    add_digitizer_datasets(
        &digi, config, board, channels, first_shot, nshots, nt, true, false,
    );
}

/// Deterministic probe position for a shot.
pub fn probe_position(shot: u32) -> (f64, f64, f64) {
    (shot as f64, -(shot as f64), 0.25)
}

/// Add a 6K Compumotor with one probe drive recording the given shots.
pub fn add_sixk(data_group: &Group, receptacle: u32, probe: &str, shots: &[u32]) {
    let sixk = ensure_group(data_group, "6K Compumotor");
    let pgroup = ensure_group(&sixk, &format!("Probe: XY[{receptacle}]: {probe}"));
    write_u32_attr(&pgroup, "Receptacle", receptacle);
    write_str_attr(&pgroup, "Probe name", probe);
    write_u32_attr(&pgroup, "Port", 27);
    let mgroup = ensure_group(&sixk, "Motion list: fine grid");
    write_u32_attr(&mgroup, "Nx", 11);
    write_u32_attr(&mgroup, "Ny", 11);
    write_f64_attr(&mgroup, "Delta x", 0.5);
    write_f64_attr(&mgroup, "Delta y", 0.5);

    let rows: Vec<SixKRow> = shots
        .iter()
        .map(|&s| {
            let (x, y, z) = probe_position(s);
            SixKRow {
                shot_number: s,
                x,
                y,
                z,
                theta: 0.1 * s as f64,
                phi: 0.2 * s as f64,
            }
        })
        .collect();
    let name = format!("XY[{receptacle}]: {probe}");
    sixk.new_dataset_builder()
        .with_data(&rows)
        .create(name.as_str())
        .unwrap();
}

pub fn rtl_row(shot: u32, command_index: i32, config: &str) -> RunTimeListRow {
    RunTimeListRow {
        shot_number: shot,
        command_index,
        configuration: FixedAscii::from_ascii(config.as_bytes()).unwrap(),
    }
}

/// Rows for one configuration block: shots in order, command index
/// cycling through the command list.
pub fn rtl_block(shots: impl Iterator<Item = u32>, ncommands: usize, config: &str) -> Vec<RunTimeListRow> {
    shots
        .enumerate()
        .map(|(k, s)| rtl_row(s, (k % ncommands) as i32, config))
        .collect()
}

/// Add a Waveform generator: one subgroup per `(name, commands)` pair
/// plus the shared `Run time list` built from `rows`.
pub fn add_waveform(data_group: &Group, configs: &[(&str, &[&str])], rows: &[RunTimeListRow]) {
    let wave = ensure_group(data_group, "Waveform");
    for (name, commands) in configs {
        let cfg = ensure_group(&wave, name);
        write_str_attr(&cfg, "IP address", "192.168.1.40");
        write_str_attr(&cfg, "Generator type", "Agilent 33220A");
        write_u32_attr(&cfg, "GPIB address", 10);
        write_str_attr(&cfg, "Initial state", "*RST");
        write_str_attr(&cfg, "Waveform command list", &commands.join("\n"));
    }
    wave.new_dataset_builder()
        .with_data(rows)
        .create("Run time list")
        .unwrap();
}

/// Add an N5700 power supply with one configuration.
pub fn add_n5700(data_group: &Group, config: &str, commands: &[&str], rows: &[RunTimeListRow]) {
    let ps = ensure_group(data_group, "N5700_PS");
    let cfg = ensure_group(&ps, config);
    write_str_attr(&cfg, "IP address", "192.168.1.41");
    write_str_attr(&cfg, "Power supply device", "N5751A");
    write_str_attr(&cfg, "Initial state", "*RST");
    write_str_attr(&cfg, "N5700 power supply command list", &commands.join("\n"));
    ps.new_dataset_builder()
        .with_data(rows)
        .create("Run time list")
        .unwrap();
}

fn msi_summary(nshots: usize) -> Vec<MsiSummaryRow> {
    (0..nshots)
        .map(|i| MsiSummaryRow {
            shot_number: 1 + i as u32,
            timestamp: i as f64 * 1e-3,
            data_valid: 1,
        })
        .collect()
}

/// Add a Gas pressure diagnostic with `namu` partial-pressure channels.
pub fn add_gas_pressure(msi_group: &Group, nshots: usize, namu: usize) {
    let gas = ensure_group(msi_group, "Gas pressure");
    let amus: Vec<f64> = (0..namu).map(|a| 1.0 + a as f64).collect();
    write_f64_array_attr(&gas, "RGA AMUs", &amus);
    gas.new_dataset_builder()
        .with_data(&msi_summary(nshots))
        .create("Gas pressure summary")
        .unwrap();
    let data = Array2::from_shape_fn((nshots, namu), |(i, a)| (i + a) as f32 * 1e-6);
    gas.new_dataset_builder()
        .with_data(&data)
        .create("RGA partial pressures")
        .unwrap();
}

/// Add a Magnetic field diagnostic with an `nz`-point axial profile.
pub fn add_magnetic_field(msi_group: &Group, nshots: usize, nz: usize) {
    let field = ensure_group(msi_group, "Magnetic field");
    let z: Vec<f64> = (0..nz).map(|k| k as f64 * 0.32).collect();
    write_f64_array_attr(&field, "Profile z locations", &z);
    field
        .new_dataset_builder()
        .with_data(&msi_summary(nshots))
        .create("Magnetic field summary")
        .unwrap();
    for (name, ncols) in [("Magnetic field profile", nz), ("Magnet power supply currents", 12)] {
        let data = Array2::from_shape_fn((nshots, ncols), |(i, k)| (i * ncols + k) as f32);
        field
            .new_dataset_builder()
            .with_data(&data)
            .create(name)
            .unwrap();
    }
}

/// Add a Discharge diagnostic with `nshots` shots of `nt`-sample traces.
pub fn add_discharge(msi_group: &Group, nshots: usize, nt: usize) {
    let discharge = ensure_group(msi_group, "Discharge");
    write_f64_attr(&discharge, "Current conversion factor", 0.5);
    write_f64_attr(&discharge, "Voltage conversion factor", 2.0);
    write_f64_attr(&discharge, "Start time", -5e-3);
    write_f64_attr(&discharge, "Timestep", 1e-5);

    let rows: Vec<MsiSummaryRow> = (0..nshots)
        .map(|i| MsiSummaryRow {
            shot_number: 1 + i as u32,
            timestamp: i as f64 * 1e-3,
            data_valid: 1,
        })
        .collect();
    discharge
        .new_dataset_builder()
        .with_data(&rows)
        .create("Discharge summary")
        .unwrap();

    for name in ["Discharge current", "Cathode-anode voltage"] {
        let data = Array2::from_shape_fn((nshots, nt), |(i, t)| (i * nt + t) as f32);
        discharge
            .new_dataset_builder()
            .with_data(&data)
            .create(name)
            .unwrap();
    }
}
