use std::path::PathBuf;
use thiserror::Error;

use super::registry::{ConType, DeviceCategory};

/// Errors detected while assembling the layout-descriptor registry.
///
/// These indicate a defect in the built-in catalogue, not in any file, and
/// are raised at registry-build time rather than at file-open time.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Descriptors '{0}' and '{1}' of category {2:?} both match group '{3}'")]
    AmbiguousDescriptors(String, String, DeviceCategory, String),
}

/// A recoverable per-device mapping failure.
///
/// The group matched a descriptor but its configuration could not be
/// extracted. The device is reported in the file map's unknowns list and
/// mapping continues.
#[derive(Debug, Clone, Error)]
#[error("Mapping of '{path}' failed: {why}")]
pub struct MappingError {
    pub path: String,
    pub why: String,
}

impl MappingError {
    pub fn new(path: impl Into<String>, why: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            why: why.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Could not open file because {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("File {0:?} is not a recognized LAPD data-run file; neither the MSI group nor the raw-data group exists")]
    NotLapdFile(PathBuf),
    #[error("Registry is misconfigured: {0}")]
    RegistryError(#[from] RegistryError),
    #[error("Open failed due to HDF5 error: {0}")]
    Hdf5Error(#[from] hdf5::Error),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("File has no mapped digitizers")]
    NoDigitizers,
    #[error("No control devices were listed in the request")]
    NoControls,
    #[error("Multiple digitizers are mapped and none was selected; specify one of {0:?}")]
    AmbiguousDigitizer(Vec<String>),
    #[error("Device '{0}' is not mapped in this file")]
    UnknownDevice(String),
    #[error("'{config}' is not a configuration of device '{device}'")]
    UnknownConfiguration { device: String, config: String },
    #[error("Device '{0}' has multiple configurations; one must be named")]
    AmbiguousConfiguration(String),
    #[error("Device '{0}' has no active configuration")]
    NoActiveConfiguration(String),
    #[error("'{config}' is a configuration of device '{device}' but is not active")]
    InactiveConfiguration { device: String, config: String },
    #[error("Board {board} channel {channel} is not a mapped connection of '{device}'")]
    BadBoardChannel {
        device: String,
        board: u32,
        channel: u32,
    },
    #[error("ADC '{0}' is not part of the selected configuration")]
    BadAdc(String),
    #[error("Only one control device per control type may be composed; '{0}' and '{1}' are both {2:?}")]
    DuplicateControlType(String, String, ConType),
    #[error("Row index {index} is out of range for dataset '{dataset}' with {rows} rows")]
    IndexOutOfRange {
        dataset: String,
        index: usize,
        rows: usize,
    },
    #[error("Shot-number selection is empty after conditioning (all values must be >= 1)")]
    EmptyShotSelection,
    #[error("Requested shots have no rows in common with the required datasets")]
    EmptyIntersection,
    #[error("Layout not supported: {0}")]
    UnsupportedLayout(String),
    #[error("Read failed due to HDF5 error: {0}")]
    Hdf5Error(#[from] hdf5::Error),
}
