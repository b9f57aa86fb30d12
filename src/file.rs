//! The file facade: open a data-run file, map it eagerly, and serve
//! correlated reads against the map.

use std::path::Path;

use super::error::{OpenError, ReadError};
use super::file_map::{FileMap, RunMetadata};
use super::reader::{
    self, ControlData, ControlRequest, DiagnosticData, DigitizerData, DigitizerRequest,
};
use super::registry::Registry;

/// An open, fully mapped LAPD data-run file.
///
/// Opening maps the whole file up front, so every device the file
/// contains is known (or reported unmappable) before any read happens.
#[derive(Debug)]
pub struct File {
    file: hdf5::File,
    map: FileMap,
}

impl File {
    /// Open and map a data-run file with the built-in device catalogue.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        Self::open_with_registry(path, &Registry::builtin()?)
    }

    /// Open and map a data-run file against an explicit device catalogue.
    pub fn open_with_registry(
        path: impl AsRef<Path>,
        registry: &Registry,
    ) -> Result<Self, OpenError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(OpenError::BadFilePath(path.to_path_buf()));
        }
        let file = hdf5::File::open(path)?;
        let mut map = FileMap::new();
        map.map(&file, registry)?;
        Ok(Self { file, map })
    }

    pub fn file_map(&self) -> &FileMap {
        &self.map
    }

    pub fn metadata(&self) -> &RunMetadata {
        self.map.metadata()
    }

    /// Version string the facility DAQ stamped on the file, when present.
    pub fn lapd_version(&self) -> Option<&str> {
        self.map.lapd_version()
    }

    pub fn read_digitizer(&self, request: DigitizerRequest) -> Result<DigitizerData, ReadError> {
        reader::read_digitizer(&self.file, &self.map, &request)
    }

    pub fn read_control(&self, request: ControlRequest) -> Result<ControlData, ReadError> {
        reader::read_control(&self.file, &self.map, &request)
    }

    pub fn read_diagnostic(&self, name: &str) -> Result<DiagnosticData, ReadError> {
        reader::read_diagnostic(&self.file, &self.map, name)
    }
}
