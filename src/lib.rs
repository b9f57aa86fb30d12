//! # lapd_h5
//!
//! lapd_h5 provides structured, version-tolerant access to the HDF5 data-run
//! files produced by the LAPD data-acquisition system. A data-run file stores
//! three classes of recordings: MSI diagnostics that capture machine state,
//! digitizer recordings of probe signals, and control-device recordings of
//! apparatus state (probe position, driving waveform, supply voltage).
//!
//! The library does two jobs:
//!
//! 1. **Mapping** -- when a file is opened, every child of the `MSI` and
//!    `Raw data + config` groups is probed against a fixed catalogue of known
//!    device layouts. Recognized devices get a configuration record
//!    describing where their data lives and how to interpret it; everything
//!    else lands in an "unknowns" list for diagnostic reporting. See
//!    [`file_map::FileMap`].
//!
//! 2. **Correlated reading** -- the three read operations
//!    ([`file::File::read_digitizer`], [`file::File::read_control`],
//!    [`file::File::read_diagnostic`]) reconcile recordings from datasets
//!    that may cover different subsets of acquisition cycles ("shot
//!    numbers") into one aligned output collection, with a strict
//!    intersection policy or an explicit union-with-fill policy.
//!
//! ## Example
//!
//! ```no_run
//! use lapd_h5::file::File;
//! use lapd_h5::reader::DigitizerRequest;
//!
//! let file = File::open("run_0042.hdf5")?;
//! let data = file.read_digitizer(
//!     DigitizerRequest::new(0, 1).with_controls(vec![("6K Compumotor", None)]),
//! )?;
//! for (shot, row) in data.shotnum.iter().zip(data.signal_volts().unwrap().rows()) {
//!     println!("shot {shot}: first sample {}", row[0]);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Scope
//!
//! The library is read-only. The underlying HDF5 primitives are consumed
//! from the `hdf5` crate; no write support, no HDF5 tuning surface, and no
//! plotting or reporting utilities are provided.

pub mod constants;
pub mod container;
pub mod controls;
pub mod digitizers;
pub mod error;
pub mod file;
pub mod file_map;
pub mod msi;
pub mod reader;
pub mod registry;
pub mod selector;
pub mod shot_index;
