//! Well-known names and sentinel values used across the crate.

/// HDF5 group housing the MSI diagnostics.
pub const MSI_GROUP: &str = "MSI";
/// HDF5 group housing digitizers, control devices, and the run sequence.
pub const DATA_GROUP: &str = "Raw data + config";
/// The run-sequence group inside [`DATA_GROUP`].
pub const RUN_SEQUENCE_GROUP: &str = "Data run sequence";

/// Root attribute identifying a file generated by the LAPD DAQ software.
pub const LAPD_VERSION_ATTR: &str = "LaPD HDF5 software version";

/// Ordered candidates for the default ("main") digitizer when more than one
/// digitizer is mapped.
pub const MAIN_DIGITIZER_CANDIDATES: [&str; 2] = ["SIS 3301", "SIS crate"];

/// Fill value for floating-point fields on shots absent from a dataset.
pub const FILL_F64: f64 = f64::NAN;
/// Fill value for signed-integer fields on shots absent from a dataset.
pub const FILL_I64: i64 = -99_999;
/// Fill value for raw digitizer bit samples on absent shots.
pub const FILL_BITS: i16 = i16::MIN;

/// Calibration attributes stored on digitizer data datasets.
pub const VOLTAGE_SCALE_ATTR: &str = "Voltage scale";
pub const VOLTAGE_OFFSET_ATTR: &str = "Voltage offset";
