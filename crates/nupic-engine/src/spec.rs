// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Static description of a region type.
//!
//! A [`Spec`] is produced once per type by the type's spec function and
//! shared read-only (through `Arc`) by every region of that type. The
//! factory cache owns it.

use nupic_types::{BasicType, Collection};

use crate::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub description: String,
    pub data_type: BasicType,
    /// Elements per node; 0 means variable
    pub count: usize,
    pub required: bool,
    /// Region-level inputs see the whole region as a single node
    pub region_level: bool,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub description: String,
    pub data_type: BasicType,
    /// Elements per node; 0 means the implementation decides at init
    pub count: usize,
    pub region_level: bool,
    pub is_default: bool,
}

/// When a parameter may be read or written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterAccess {
    /// Only settable at construction
    Create,
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub description: String,
    pub data_type: BasicType,
    /// 1 for scalars, 0 for arrays (or strings when `data_type` is Byte)
    pub count: usize,
    pub constraints: String,
    /// JSON literal; empty means the parameter must be supplied
    pub default_value: String,
    pub access: ParameterAccess,
}

impl ParameterSpec {
    pub fn is_string(&self) -> bool {
        self.data_type == BasicType::Byte && self.count == 0
    }

    pub fn is_array(&self) -> bool {
        self.count == 0 && !self.is_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct Spec {
    pub description: String,
    /// Regions of this type always have exactly one node
    pub single_node_only: bool,
    pub inputs: Collection<InputSpec>,
    pub outputs: Collection<OutputSpec>,
    pub parameters: Collection<ParameterSpec>,
    pub commands: Collection<CommandSpec>,
}

impl Spec {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn add_input(&mut self, name: &str, input: InputSpec) -> EngineResult<()> {
        Ok(self.inputs.add(name, input)?)
    }

    pub fn add_output(&mut self, name: &str, output: OutputSpec) -> EngineResult<()> {
        Ok(self.outputs.add(name, output)?)
    }

    pub fn add_parameter(&mut self, name: &str, parameter: ParameterSpec) -> EngineResult<()> {
        Ok(self.parameters.add(name, parameter)?)
    }

    pub fn add_command(&mut self, name: &str, command: CommandSpec) -> EngineResult<()> {
        Ok(self.commands.add(name, command)?)
    }

    /// The input flagged default, or the only input
    pub fn default_input_name(&self) -> EngineResult<&str> {
        default_name(self.inputs.iter().map(|(n, i)| (n, i.is_default)), "input")
    }

    /// The output flagged default, or the only output
    pub fn default_output_name(&self) -> EngineResult<&str> {
        default_name(self.outputs.iter().map(|(n, o)| (n, o.is_default)), "output")
    }
}

fn default_name<'a>(
    entries: impl Iterator<Item = (&'a str, bool)>,
    kind: &str,
) -> EngineResult<&'a str> {
    let entries: Vec<(&str, bool)> = entries.collect();
    if let Some((name, _)) = entries.iter().find(|(_, is_default)| *is_default) {
        return Ok(*name);
    }
    match entries.as_slice() {
        [(name, _)] => Ok(*name),
        [] => Err(EngineError::UnknownEndpoint(format!("region type has no {}", kind))),
        _ => Err(EngineError::UnknownEndpoint(format!(
            "no default {} among {} candidates",
            kind,
            entries.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(is_default: bool) -> OutputSpec {
        OutputSpec {
            description: String::new(),
            data_type: BasicType::Real32,
            count: 1,
            region_level: false,
            is_default,
        }
    }

    #[test]
    fn test_default_output_flagged() {
        let mut spec = Spec::new("test");
        spec.add_output("a", output(false)).unwrap();
        spec.add_output("b", output(true)).unwrap();
        assert_eq!(spec.default_output_name().unwrap(), "b");
    }

    #[test]
    fn test_single_output_is_default() {
        let mut spec = Spec::new("test");
        spec.add_output("only", output(false)).unwrap();
        assert_eq!(spec.default_output_name().unwrap(), "only");
        assert!(spec.default_input_name().is_err());
    }

    #[test]
    fn test_ambiguous_default() {
        let mut spec = Spec::new("test");
        spec.add_output("a", output(false)).unwrap();
        spec.add_output("b", output(false)).unwrap();
        assert!(matches!(
            spec.default_output_name(),
            Err(EngineError::UnknownEndpoint(_))
        ));
        assert!(matches!(
            spec.add_output("a", output(true)),
            Err(EngineError::Types(_))
        ));
    }
}
