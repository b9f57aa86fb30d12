//! Machine-state (MSI) diagnostic layout descriptors.
//!
//! Every MSI diagnostic follows the same shape: one compound summary
//! dataset with a row per shot, plus one or more 2-D signal datasets
//! sharing that row count, plus conversion attributes on the group. The
//! per-diagnostic descriptors differ only in the names involved.

use hdf5::{Group, H5Type};
use log::warn;

use super::container;
use super::error::MappingError;
use super::registry::DeviceConfig;

/// Row layout of an MSI summary dataset.
#[derive(H5Type, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct MsiSummaryRow {
    pub shot_number: u32,
    pub timestamp: f64,
    pub data_valid: i8,
}

/// Configuration record for one mapped MSI diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct MsiConfig {
    pub name: String,
    pub path: String,
    pub summary_dataset: String,
    pub signal_datasets: Vec<String>,
    /// Scalar conversion attributes found on the group.
    pub scalar_attrs: Vec<(String, f64)>,
    /// Array-valued attributes found on the group (axis locations etc.).
    pub array_attrs: Vec<(String, Vec<f64>)>,
}

struct MsiShape {
    device: &'static str,
    summary: &'static str,
    signals: &'static [&'static str],
    scalar_attrs: &'static [&'static str],
    array_attrs: &'static [&'static str],
}

fn extract_msi(group: &Group, shape: MsiShape) -> Result<DeviceConfig, MappingError> {
    let path = group.name();

    let summary = group
        .dataset(shape.summary)
        .map_err(|_| MappingError::new(&path, format!("dataset '{}' not found", shape.summary)))?;
    let nrows = summary.shape().first().copied().unwrap_or(0);

    let mut signal_datasets = Vec::new();
    for &name in shape.signals {
        let dset = group
            .dataset(name)
            .map_err(|_| MappingError::new(&path, format!("dataset '{name}' not found")))?;
        let dshape = dset.shape();
        if dshape.len() != 2 {
            return Err(MappingError::new(
                &path,
                format!("dataset '{name}' is not a 2-D array"),
            ));
        }
        if dshape[0] != nrows {
            return Err(MappingError::new(
                &path,
                format!("dataset '{name}' disagrees with '{}' on shot count", shape.summary),
            ));
        }
        signal_datasets.push(name.to_string());
    }

    let mut scalar_attrs = Vec::new();
    for &name in shape.scalar_attrs {
        match container::attr_f64(group, name) {
            Some(value) => scalar_attrs.push((name.to_string(), value)),
            None => warn!("'{}' has no attribute '{name}'", shape.device),
        }
    }
    let mut array_attrs = Vec::new();
    for &name in shape.array_attrs {
        match container::attr_f64_array(group, name) {
            Some(values) => array_attrs.push((name.to_string(), values)),
            None => warn!("'{}' has no attribute '{name}'", shape.device),
        }
    }

    Ok(DeviceConfig::Msi(MsiConfig {
        name: shape.device.to_string(),
        path,
        summary_dataset: shape.summary.to_string(),
        signal_datasets,
        scalar_attrs,
        array_attrs,
    }))
}

pub(crate) fn extract_discharge(group: &Group) -> Result<DeviceConfig, MappingError> {
    extract_msi(
        group,
        MsiShape {
            device: "Discharge",
            summary: "Discharge summary",
            signals: &["Discharge current", "Cathode-anode voltage"],
            scalar_attrs: &[
                "Current conversion factor",
                "Voltage conversion factor",
                "Start time",
                "Timestep",
            ],
            array_attrs: &[],
        },
    )
}

pub(crate) fn extract_gas_pressure(group: &Group) -> Result<DeviceConfig, MappingError> {
    extract_msi(
        group,
        MsiShape {
            device: "Gas pressure",
            summary: "Gas pressure summary",
            signals: &["RGA partial pressures"],
            scalar_attrs: &[],
            array_attrs: &["RGA AMUs"],
        },
    )
}

pub(crate) fn extract_magnetic_field(group: &Group) -> Result<DeviceConfig, MappingError> {
    extract_msi(
        group,
        MsiShape {
            device: "Magnetic field",
            summary: "Magnetic field summary",
            signals: &["Magnetic field profile", "Magnet power supply currents"],
            scalar_attrs: &[],
            array_attrs: &["Profile z locations"],
        },
    )
}
