//! XML configuration parsing and validation (§6 "Configuration file").
//!
//! Parses the `<solver-interface>` document into a typed [`Configuration`],
//! then runs the static checks §6/§9 call out as configuration-time rather
//! than runtime failures.

use crate::error::{CoreError, Result};
use crate::scheme::{Role, SchemeOrdering, SchemeRigor, WindowSizeMethod};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename = "solver-interface")]
pub struct Configuration {
    #[serde(rename = "@dimensions")]
    pub dimensions: usize,
    #[serde(rename = "@experimental", default)]
    pub experimental: bool,

    #[serde(rename = "data", default)]
    pub data: Vec<DataConfig>,
    #[serde(rename = "global-data", default)]
    pub global_data: Vec<DataConfig>,
    #[serde(rename = "mesh", default)]
    pub meshes: Vec<MeshConfig>,
    #[serde(rename = "participant", default)]
    pub participants: Vec<ParticipantConfig>,
    #[serde(rename = "m2n", default)]
    pub m2ns: Vec<M2nConfig>,
    #[serde(rename = "coupling-scheme")]
    pub coupling_scheme: CouplingSchemeConfig,
}

#[derive(Debug, Deserialize)]
pub struct DataConfig {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@type", default = "default_data_kind")]
    pub kind: String, // "scalar" | "vector"
}

fn default_data_kind() -> String {
    "scalar".to_string()
}

impl DataConfig {
    pub fn dims(&self, space_dims: usize) -> usize {
        if self.kind == "vector" {
            space_dims
        } else {
            1
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UseDataConfig {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MeshConfig {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "use-data", default)]
    pub use_data: Vec<UseDataConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ProvideMeshConfig {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveMeshConfig {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@from")]
    pub from: String,
    #[serde(rename = "@safety-factor", default)]
    pub safety_factor: f64,
}

#[derive(Debug, Deserialize)]
pub struct ReadDataConfig {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@mesh")]
    pub mesh: String,
    /// Supplements §6's grammar: how many past windows this read buffer
    /// interpolates across. `0` means "only ever read at the window end".
    #[serde(rename = "@waveform-order", default)]
    pub waveform_order: usize,
}

#[derive(Debug, Deserialize)]
pub struct WriteDataConfig {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@mesh")]
    pub mesh: String,
}

#[derive(Debug, Deserialize)]
pub struct MappingConfig {
    #[serde(rename = "@constraint")]
    pub constraint: String, // "consistent" | "conservative"
    #[serde(rename = "@from")]
    pub from: String,
    #[serde(rename = "@to")]
    pub to: String,
    #[serde(rename = "@timing", default = "default_timing")]
    pub timing: String, // "initial" | "onadvance"
}

fn default_timing() -> String {
    "onadvance".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ParticipantConfig {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "provide-mesh", default)]
    pub provide_mesh: Vec<ProvideMeshConfig>,
    #[serde(rename = "receive-mesh", default)]
    pub receive_mesh: Vec<ReceiveMeshConfig>,
    #[serde(rename = "read-data", default)]
    pub read_data: Vec<ReadDataConfig>,
    #[serde(rename = "write-data", default)]
    pub write_data: Vec<WriteDataConfig>,
    #[serde(rename = "mapping", default)]
    pub mapping: Vec<MappingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct M2nConfig {
    #[serde(rename = "@from")]
    pub from: String,
    #[serde(rename = "@to")]
    pub to: String,
    #[serde(rename = "@type", default = "default_m2n_type")]
    pub transport: String, // "sockets" | "mpi"
}

fn default_m2n_type() -> String {
    "sockets".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ExchangeConfig {
    #[serde(rename = "@data")]
    pub data: String,
    #[serde(rename = "@mesh")]
    pub mesh: String,
    #[serde(rename = "@from")]
    pub from: String,
    #[serde(rename = "@to")]
    pub to: String,
    #[serde(rename = "@initialize", default)]
    pub initialize: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConvergenceMeasureConfig {
    #[serde(rename = "@data")]
    pub data: String,
    #[serde(rename = "@mesh")]
    pub mesh: String,
    #[serde(rename = "@limit")]
    pub limit: f64,
    #[serde(rename = "@suffices", default)]
    pub suffices: bool,
    #[serde(rename = "@strict", default)]
    pub strict: bool,
    #[serde(rename = "@type", default = "default_measure_type")]
    pub kind: String, // "absolute" | "relative"
}

fn default_measure_type() -> String {
    "absolute".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ParticipantsConfig {
    #[serde(rename = "@first")]
    pub first: String,
    #[serde(rename = "@second")]
    pub second: String,
}

#[derive(Debug, Deserialize)]
pub struct TimeWindowSizeConfig {
    #[serde(rename = "@value", default)]
    pub value: f64,
    #[serde(rename = "@method", default = "default_window_method")]
    pub method: String, // "fixed" | "first-participant"
}

fn default_window_method() -> String {
    "fixed".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AccelerationConfig {
    #[serde(rename = "@type")]
    pub kind: String, // "constant" | "aitken" | "IQN-ILS"
    #[serde(rename = "@initial-relaxation", default = "default_relaxation")]
    pub initial_relaxation: f64,
    #[serde(rename = "@max-used-iterations", default = "default_max_columns")]
    pub max_used_iterations: usize,
}

fn default_relaxation() -> f64 {
    0.1
}

fn default_max_columns() -> usize {
    8
}

#[derive(Debug, Deserialize)]
pub struct CouplingSchemeConfig {
    #[serde(rename = "@type")]
    pub kind: String, // "serial-explicit" | "serial-implicit" | "parallel-explicit" | "parallel-implicit" | "multi" | "compositional"
    #[serde(rename = "max-time")]
    pub max_time: Option<MaxTimeConfig>,
    #[serde(rename = "time-window-size")]
    pub time_window_size: TimeWindowSizeConfig,
    #[serde(rename = "participants")]
    pub participants: Option<ParticipantsConfig>,
    #[serde(rename = "exchange", default)]
    pub exchange: Vec<ExchangeConfig>,
    #[serde(rename = "convergence-measure", default)]
    pub convergence_measure: Vec<ConvergenceMeasureConfig>,
    #[serde(rename = "extrapolation-order")]
    pub extrapolation_order: Option<ValueConfig>,
    #[serde(rename = "max-iterations")]
    pub max_iterations: Option<ValueConfig>,
    #[serde(rename = "acceleration")]
    pub acceleration: Option<AccelerationConfig>,
}

#[derive(Debug, Deserialize)]
pub struct MaxTimeConfig {
    #[serde(rename = "@value")]
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct ValueConfig {
    #[serde(rename = "@value")]
    pub value: usize,
}

impl Configuration {
    pub fn parse(xml: &str) -> Result<Self> {
        quick_xml::de::from_str(xml).map_err(|e| CoreError::configuration(format!("malformed configuration: {}", e)))
    }

    /// Runs the configuration-time checks §6/§9 require before any mesh or
    /// data is constructed.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions != 2 && self.dimensions != 3 {
            return Err(CoreError::configuration(format!(
                "dimensions must be 2 or 3, got {}",
                self.dimensions
            )));
        }

        let order = self
            .coupling_scheme
            .extrapolation_order
            .as_ref()
            .map(|v| v.value)
            .unwrap_or(0);
        if order > 1 {
            return Err(CoreError::configuration(format!(
                "extrapolation-order {} is not supported; only 0 or 1 are valid",
                order
            )));
        }

        let is_first_participant = self.coupling_scheme.time_window_size.method == "first-participant";

        // §9 open question: elevate the first-participant + non-trivial
        // relativeReadTime combination to a configuration-time error rather
        // than a confusing runtime one.
        if is_first_participant {
            for participant in &self.participants {
                for read in &participant.read_data {
                    if read.waveform_order > 0 {
                        return Err(CoreError::configuration(format!(
                            "participant '{}' read-data '{}' requests waveform-order {} (non-trivial relativeReadTime), which is incompatible with the first-participant time-window-size method",
                            participant.name, read.name, read.waveform_order
                        )));
                    }
                }
            }
        }

        let rigor_is_implicit = self.coupling_scheme.kind.ends_with("implicit");
        if rigor_is_implicit && self.coupling_scheme.convergence_measure.is_empty() {
            return Err(CoreError::configuration(
                "an implicit coupling scheme requires at least one convergence-measure",
            ));
        }

        Ok(())
    }

    pub fn ordering(&self) -> Result<SchemeOrdering> {
        if self.coupling_scheme.kind.starts_with("serial") {
            Ok(SchemeOrdering::Serial)
        } else if self.coupling_scheme.kind.starts_with("parallel") {
            Ok(SchemeOrdering::Parallel)
        } else {
            Err(CoreError::configuration(format!(
                "unsupported coupling-scheme type '{}' for a bi-participant scheme",
                self.coupling_scheme.kind
            )))
        }
    }

    pub fn rigor(&self) -> SchemeRigor {
        if self.coupling_scheme.kind.ends_with("implicit") {
            SchemeRigor::Implicit
        } else {
            SchemeRigor::Explicit
        }
    }

    pub fn role_for(&self, participant_name: &str) -> Result<Role> {
        let participants = self.coupling_scheme.participants.as_ref().ok_or_else(|| {
            CoreError::configuration("coupling-scheme is missing a <participants first=... second=... /> element")
        })?;
        if participants.first == participant_name {
            Ok(Role::First)
        } else if participants.second == participant_name {
            Ok(Role::Second)
        } else {
            Err(CoreError::configuration(format!(
                "participant '{}' is not named in the coupling-scheme's <participants>",
                participant_name
            )))
        }
    }

    pub fn window_size_method(&self) -> WindowSizeMethod {
        match self.coupling_scheme.time_window_size.method.as_str() {
            "first-participant" => WindowSizeMethod::FirstParticipant,
            _ => WindowSizeMethod::Fixed(self.coupling_scheme.time_window_size.value),
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.coupling_scheme.max_iterations.as_ref().map(|v| v.value).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_EXPLICIT: &str = r#"
        <solver-interface dimensions="2">
          <data name="Forces" type="scalar" />
          <mesh name="MeshA">
            <use-data name="Forces" />
          </mesh>
          <participant name="A">
            <provide-mesh name="MeshA" />
            <write-data name="Forces" mesh="MeshA" />
          </participant>
          <participant name="B">
            <receive-mesh name="MeshA" from="A" />
            <read-data name="Forces" mesh="MeshA" />
          </participant>
          <m2n from="A" to="B" type="sockets" />
          <coupling-scheme type="serial-explicit">
            <max-time value="10.0" />
            <time-window-size value="1.0" method="fixed" />
            <participants first="A" second="B" />
          </coupling-scheme>
        </solver-interface>
    "#;

    #[test]
    fn parses_minimal_explicit_configuration() {
        let config = Configuration::parse(MINIMAL_EXPLICIT).unwrap();
        assert_eq!(config.dimensions, 2);
        assert_eq!(config.participants.len(), 2);
        assert!(config.validate().is_ok());
        assert_eq!(config.ordering().unwrap(), SchemeOrdering::Serial);
        assert_eq!(config.rigor(), SchemeRigor::Explicit);
        assert_eq!(config.role_for("A").unwrap(), Role::First);
        assert_eq!(config.role_for("B").unwrap(), Role::Second);
    }

    #[test]
    fn implicit_scheme_without_convergence_measure_is_rejected() {
        let xml = MINIMAL_EXPLICIT.replace("serial-explicit", "serial-implicit");
        let config = Configuration::parse(&xml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn first_participant_method_rejects_nontrivial_waveform_order() {
        let xml = MINIMAL_EXPLICIT
            .replace(r#"method="fixed""#, r#"method="first-participant""#)
            .replace(r#"<read-data name="Forces" mesh="MeshA" />"#, r#"<read-data name="Forces" mesh="MeshA" waveform-order="1" />"#);
        let config = Configuration::parse(&xml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_participant_role_is_a_configuration_error() {
        let config = Configuration::parse(MINIMAL_EXPLICIT).unwrap();
        assert!(config.role_for("C").is_err());
    }
}
