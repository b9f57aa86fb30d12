//! The layout-descriptor registry and device prober.
//!
//! Known device layouts are described by a fixed table of
//! [`LayoutDescriptor`]s, one per device variant: a discriminator over the
//! candidate group name, a category tag, and an extraction function that
//! turns the group into a configuration record. Adding support for a new
//! device model is a table addition, not a new type.

use hdf5::Group;

use super::controls::{self, ControlConfig};
use super::digitizers::{self, DigiConfig};
use super::error::{MappingError, RegistryError};
use super::msi::{self, MsiConfig};

/// The three recording classes plus the run-sequence group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    Digitizer,
    Control,
    Msi,
    RunSequence,
}

/// Control-device type tag, used to enforce at-most-one-per-type
/// composition in a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConType {
    Motion,
    Power,
    Waveform,
    Timing,
}

/// Configuration record produced by a successful probe.
#[derive(Debug, Clone)]
pub enum DeviceConfig {
    Digitizer(DigiConfig),
    Control(ControlConfig),
    Msi(MsiConfig),
    /// Run-sequence groups are recognized but carry no configuration; the
    /// value is the group path.
    RunSequence(String),
}

/// One known device layout: how to recognize it and how to extract its
/// configuration.
pub struct LayoutDescriptor {
    /// Canonical device (group) name, used for display and for the
    /// registry-build ambiguity check.
    pub device_name: &'static str,
    pub category: DeviceCategory,
    /// Control-type tag; `Some` only for [`DeviceCategory::Control`].
    pub contype: Option<ConType>,
    /// Discriminator over the candidate group name. Total: never fails.
    matcher: fn(&str) -> bool,
    extract: fn(&Group) -> Result<DeviceConfig, MappingError>,
}

impl LayoutDescriptor {
    pub fn matches(&self, group_name: &str) -> bool {
        (self.matcher)(group_name)
    }
}

impl std::fmt::Debug for LayoutDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutDescriptor")
            .field("device_name", &self.device_name)
            .field("category", &self.category)
            .field("contype", &self.contype)
            .finish()
    }
}

/// Outcome of probing one candidate group.
#[derive(Debug)]
pub enum ProbeResult {
    Mapped(DeviceConfig),
    /// No descriptor of the requested category matched the group.
    NotRecognized,
    /// A descriptor matched but extraction failed; recoverable, the group
    /// goes to the unknowns list.
    Failed(MappingError),
}

fn extract_run_sequence(group: &Group) -> Result<DeviceConfig, MappingError> {
    Ok(DeviceConfig::RunSequence(group.name()))
}

/// The read-only descriptor table, populated at process start.
#[derive(Debug)]
pub struct Registry {
    descriptors: Vec<LayoutDescriptor>,
}

impl Registry {
    /// Build the built-in catalogue of known LAPD device layouts.
    pub fn builtin() -> Result<Self, RegistryError> {
        let descriptors = vec![
            LayoutDescriptor {
                device_name: "SIS 3301",
                category: DeviceCategory::Digitizer,
                contype: None,
                matcher: |name| name == "SIS 3301",
                extract: digitizers::extract_sis3301,
            },
            LayoutDescriptor {
                device_name: "SIS crate",
                category: DeviceCategory::Digitizer,
                contype: None,
                matcher: |name| name == "SIS crate",
                extract: digitizers::extract_sis_crate,
            },
            LayoutDescriptor {
                device_name: "6K Compumotor",
                category: DeviceCategory::Control,
                contype: Some(ConType::Motion),
                matcher: |name| name == "6K Compumotor",
                extract: controls::extract_sixk,
            },
            LayoutDescriptor {
                device_name: "Waveform",
                category: DeviceCategory::Control,
                contype: Some(ConType::Waveform),
                matcher: |name| name == "Waveform",
                extract: controls::extract_waveform,
            },
            LayoutDescriptor {
                device_name: "N5700_PS",
                category: DeviceCategory::Control,
                contype: Some(ConType::Power),
                matcher: |name| name == "N5700_PS",
                extract: controls::extract_n5700ps,
            },
            LayoutDescriptor {
                device_name: "Discharge",
                category: DeviceCategory::Msi,
                contype: None,
                matcher: |name| name == "Discharge",
                extract: msi::extract_discharge,
            },
            LayoutDescriptor {
                device_name: "Gas pressure",
                category: DeviceCategory::Msi,
                contype: None,
                matcher: |name| name == "Gas pressure",
                extract: msi::extract_gas_pressure,
            },
            LayoutDescriptor {
                device_name: "Magnetic field",
                category: DeviceCategory::Msi,
                contype: None,
                matcher: |name| name == "Magnetic field",
                extract: msi::extract_magnetic_field,
            },
            LayoutDescriptor {
                device_name: "Data run sequence",
                category: DeviceCategory::RunSequence,
                contype: None,
                matcher: |name| name == "Data run sequence",
                extract: extract_run_sequence,
            },
        ];
        Self::from_descriptors(descriptors)
    }

    /// Build a registry from an explicit descriptor table, verifying that
    /// no two descriptors of the same category claim the same group.
    pub fn from_descriptors(
        descriptors: Vec<LayoutDescriptor>,
    ) -> Result<Self, RegistryError> {
        for (i, a) in descriptors.iter().enumerate() {
            for b in descriptors.iter().skip(i + 1) {
                if a.category != b.category {
                    continue;
                }
                // Probe each matcher with the other's canonical name.
                if a.matches(b.device_name) || b.matches(a.device_name) {
                    return Err(RegistryError::AmbiguousDescriptors(
                        a.device_name.to_string(),
                        b.device_name.to_string(),
                        a.category,
                        if a.matches(b.device_name) {
                            b.device_name.to_string()
                        } else {
                            a.device_name.to_string()
                        },
                    ));
                }
            }
        }
        Ok(Self { descriptors })
    }

    /// Probe one candidate group against every descriptor of `category`.
    pub fn probe(&self, category: DeviceCategory, name: &str, group: &Group) -> ProbeResult {
        for descriptor in self
            .descriptors
            .iter()
            .filter(|d| d.category == category)
        {
            if descriptor.matches(name) {
                return match (descriptor.extract)(group) {
                    Ok(config) => ProbeResult::Mapped(config),
                    Err(e) => ProbeResult::Failed(e),
                };
            }
        }
        ProbeResult::NotRecognized
    }

    /// The control-type tag for a mapped control device name.
    pub fn contype_of(&self, device_name: &str) -> Option<ConType> {
        self.descriptors
            .iter()
            .find(|d| d.category == DeviceCategory::Control && d.matches(device_name))
            .and_then(|d| d.contype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_extract(_: &Group) -> Result<DeviceConfig, MappingError> {
        Err(MappingError::new("/", "dummy"))
    }

    #[test]
    fn builtin_registry_is_consistent() {
        assert!(Registry::builtin().is_ok());
    }

    #[test]
    fn duplicate_matchers_in_one_category_are_rejected() {
        let descriptors = vec![
            LayoutDescriptor {
                device_name: "SIS 3301",
                category: DeviceCategory::Digitizer,
                contype: None,
                matcher: |name| name.starts_with("SIS"),
                extract: dummy_extract,
            },
            LayoutDescriptor {
                device_name: "SIS crate",
                category: DeviceCategory::Digitizer,
                contype: None,
                matcher: |name| name == "SIS crate",
                extract: dummy_extract,
            },
        ];
        assert!(matches!(
            Registry::from_descriptors(descriptors),
            Err(RegistryError::AmbiguousDescriptors(..))
        ));
    }

    #[test]
    fn same_matcher_in_different_categories_is_allowed() {
        let descriptors = vec![
            LayoutDescriptor {
                device_name: "Thing",
                category: DeviceCategory::Digitizer,
                contype: None,
                matcher: |name| name == "Thing",
                extract: dummy_extract,
            },
            LayoutDescriptor {
                device_name: "Thing",
                category: DeviceCategory::Msi,
                contype: None,
                matcher: |name| name == "Thing",
                extract: dummy_extract,
            },
        ];
        assert!(Registry::from_descriptors(descriptors).is_ok());
    }
}
