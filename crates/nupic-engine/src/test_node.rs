// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Built-in `TestNode` region type.
//!
//! Deterministic reference implementation used to exercise links, runs and
//! checkpoints. Output `bottomUpOut` has two Real64 elements per node:
//!
//! ```text
//! out[0] = len(node input) + iteration
//! out[i] = node + sum(node input) + (i - 1) * delta     (i >= 1)
//! ```

use std::io::Read;

use nupic_types::{BasicType, TypedBuffer};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bundle_io::BundleIo;
use crate::parameters::{ParameterMap, ParameterValue};
use crate::region_impl::{RegionContext, RegionImpl, RegionIo, RegionTypeEntry};
use crate::spec::{CommandSpec, InputSpec, OutputSpec, ParameterAccess, ParameterSpec, Spec};
use crate::{EngineError, EngineResult};

const MAIN_COOKIE: &str = "TestNode-v1";
const AUX_TEXT: &str = "This is an auxiliary stream\n";
const INPUT: &str = "bottomUpIn";
const OUTPUT: &str = "bottomUpOut";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TestNodeState {
    cookie: String,
    int32_param: i32,
    uint32_param: u32,
    int64_param: i64,
    uint64_param: u64,
    real32_param: f32,
    real64_param: f64,
    string_param: String,
    real32_array_param: Vec<f32>,
    int64_array_param: Vec<i64>,
    output_element_count: usize,
    delta: f64,
    iteration: u64,
}

#[derive(Debug)]
pub struct TestNode {
    region_name: String,
    state: TestNodeState,
}

impl TestNode {
    pub const TYPE_NAME: &'static str = "TestNode";

    pub fn entry() -> RegionTypeEntry {
        RegionTypeEntry {
            create: Self::create,
            deserialize: Self::deserialize,
            spec: Self::spec,
        }
    }

    pub fn create(params: &ParameterMap, context: &RegionContext<'_>) -> EngineResult<Box<dyn RegionImpl>> {
        let real32_array_param = match params.get("real32ArrayParam")?.as_array()?.as_slice::<f32>()? {
            [] => (0..8).map(|i| (i * 32) as f32).collect(),
            supplied => supplied.to_vec(),
        };
        let int64_array_param = match params.get("int64ArrayParam")?.as_array()?.as_slice::<i64>()? {
            [] => (0..4).map(|i| i * 64).collect(),
            supplied => supplied.to_vec(),
        };

        let state = TestNodeState {
            cookie: MAIN_COOKIE.to_string(),
            int32_param: narrow(params.get_i64("int32Param")?, "int32Param")?,
            uint32_param: narrow(params.get_u64("uint32Param")?, "uint32Param")?,
            int64_param: params.get_i64("int64Param")?,
            uint64_param: params.get_u64("uint64Param")?,
            real32_param: params.get_f64("real32Param")? as f32,
            real64_param: params.get_f64("real64Param")?,
            string_param: params.get_str("stringParam")?.to_string(),
            real32_array_param,
            int64_array_param,
            output_element_count: 2,
            delta: 1.0,
            iteration: 0,
        };
        Ok(Box::new(TestNode {
            region_name: context.region_name.to_string(),
            state,
        }))
    }

    pub fn deserialize(bundle: &mut BundleIo, context: &RegionContext<'_>) -> EngineResult<Box<dyn RegionImpl>> {
        let state: TestNodeState = {
            let mut reader = bundle.input_stream("main")?;
            bincode::deserialize_from(&mut reader)?
        };
        if state.cookie != MAIN_COOKIE {
            return Err(EngineError::BadCheckpoint(format!(
                "main stream of TestNode region '{}' starts with '{}', expected '{}'",
                context.region_name, state.cookie, MAIN_COOKIE
            )));
        }

        let mut aux = String::new();
        bundle.input_stream("aux")?.read_to_string(&mut aux)?;
        if aux != AUX_TEXT {
            return Err(EngineError::BadCheckpoint(format!(
                "invalid aux stream for TestNode region '{}'",
                context.region_name
            )));
        }

        debug!(target: "nupic-engine", "TestNode '{}' restored at iteration {}", context.region_name, state.iteration);
        Ok(Box::new(TestNode {
            region_name: context.region_name.to_string(),
            state,
        }))
    }

    pub fn spec() -> EngineResult<Spec> {
        let mut spec = Spec::new("Deterministic test region");

        let scalars = [
            ("int32Param", "Int32 scalar parameter", BasicType::Int32, "32"),
            ("uint32Param", "UInt32 scalar parameter", BasicType::UInt32, "33"),
            ("int64Param", "Int64 scalar parameter", BasicType::Int64, "64"),
            ("uint64Param", "UInt64 scalar parameter", BasicType::UInt64, "65"),
            ("real32Param", "Real32 scalar parameter", BasicType::Real32, "32.1"),
            ("real64Param", "Real64 scalar parameter", BasicType::Real64, "64.1"),
        ];
        for (name, description, data_type, default_value) in scalars {
            spec.add_parameter(name, read_write(description, data_type, 1, default_value))?;
        }
        spec.add_parameter(
            "real32ArrayParam",
            read_write("Real32 array parameter", BasicType::Real32, 0, "[]"),
        )?;
        spec.add_parameter(
            "int64ArrayParam",
            read_write("Int64 array parameter", BasicType::Int64, 0, "[]"),
        )?;
        spec.add_parameter(
            "stringParam",
            read_write("String parameter", BasicType::Byte, 0, "\"nodespec value\""),
        )?;
        spec.add_parameter(
            "iteration",
            ParameterSpec {
                description: "Completed compute steps".to_string(),
                data_type: BasicType::UInt64,
                count: 1,
                constraints: String::new(),
                default_value: "0".to_string(),
                access: ParameterAccess::ReadOnly,
            },
        )?;

        spec.add_input(
            INPUT,
            InputSpec {
                description: "Primary input for the node".to_string(),
                data_type: BasicType::Real64,
                count: 0,
                required: false,
                region_level: false,
                is_default: true,
            },
        )?;
        spec.add_output(
            OUTPUT,
            OutputSpec {
                description: "Primary output for the node".to_string(),
                data_type: BasicType::Real64,
                count: 0,
                region_level: false,
                is_default: true,
            },
        )?;
        spec.add_command(
            "setDelta",
            CommandSpec {
                description: "setDelta <value>: replace delta, returns the previous value".to_string(),
            },
        )?;
        Ok(spec)
    }
}

fn read_write(description: &str, data_type: BasicType, count: usize, default_value: &str) -> ParameterSpec {
    ParameterSpec {
        description: description.to_string(),
        data_type,
        count,
        constraints: String::new(),
        default_value: default_value.to_string(),
        access: ParameterAccess::ReadWrite,
    }
}

fn narrow<S: TryInto<T>, T>(value: S, name: &str) -> EngineResult<T> {
    value
        .try_into()
        .map_err(|_| EngineError::InvalidParameter(format!("'{}' is out of range", name)))
}

impl RegionImpl for TestNode {
    fn compute(&mut self, io: &mut RegionIo<'_>) -> EngineResult<()> {
        let nodes = io.node_count();
        let per_node = self.state.output_element_count;
        let input = io.input(INPUT)?;

        let mut values = vec![0.0f64; nodes * per_node];
        let mut node_input: Vec<f64> = Vec::new();
        for node in 0..nodes {
            input.node_input(node, &mut node_input)?;
            let sum: f64 = node_input.iter().sum();
            let out = &mut values[node * per_node..(node + 1) * per_node];
            out[0] = (node_input.len() as u64 + self.state.iteration) as f64;
            for (i, slot) in out.iter_mut().enumerate().skip(1) {
                *slot = node as f64 + sum + (i - 1) as f64 * self.state.delta;
            }
        }

        let output = io.output_data_mut(OUTPUT)?.as_mut_slice::<f64>()?;
        if output.len() != values.len() {
            return Err(EngineError::Compute(format!(
                "TestNode '{}' output holds {} elements, expected {}",
                self.region_name,
                output.len(),
                values.len()
            )));
        }
        output.copy_from_slice(&values);
        self.state.iteration += 1;
        Ok(())
    }

    fn serialize(&self, bundle: &mut BundleIo) -> EngineResult<()> {
        let mut main = bundle.output_stream("main")?;
        bincode::serialize_into(&mut main, &self.state)?;
        main.finish()?;

        let mut aux = bundle.output_stream("aux")?;
        std::io::Write::write_all(&mut aux, AUX_TEXT.as_bytes())?;
        aux.finish()
    }

    fn node_output_element_count(&self, output: &str) -> EngineResult<usize> {
        if output == OUTPUT {
            Ok(self.state.output_element_count)
        } else {
            Err(EngineError::NotFound(format!("TestNode output '{}'", output)))
        }
    }

    fn get_parameter(&self, name: &str) -> EngineResult<ParameterValue> {
        let s = &self.state;
        Ok(match name {
            "int32Param" => ParameterValue::Int32(s.int32_param),
            "uint32Param" => ParameterValue::UInt32(s.uint32_param),
            "int64Param" => ParameterValue::Int64(s.int64_param),
            "uint64Param" => ParameterValue::UInt64(s.uint64_param),
            "real32Param" => ParameterValue::Real32(s.real32_param),
            "real64Param" => ParameterValue::Real64(s.real64_param),
            "stringParam" => ParameterValue::String(s.string_param.clone()),
            "real32ArrayParam" => ParameterValue::Array(TypedBuffer::from_values(&s.real32_array_param)),
            "int64ArrayParam" => ParameterValue::Array(TypedBuffer::from_values(&s.int64_array_param)),
            "iteration" => ParameterValue::UInt64(s.iteration),
            _ => return Err(EngineError::NotFound(format!("TestNode parameter '{}'", name))),
        })
    }

    fn set_parameter(&mut self, name: &str, value: ParameterValue) -> EngineResult<()> {
        let s = &mut self.state;
        match (name, value) {
            ("int32Param", ParameterValue::Int32(v)) => s.int32_param = v,
            ("uint32Param", ParameterValue::UInt32(v)) => s.uint32_param = v,
            ("int64Param", ParameterValue::Int64(v)) => s.int64_param = v,
            ("uint64Param", ParameterValue::UInt64(v)) => s.uint64_param = v,
            ("real32Param", ParameterValue::Real32(v)) => s.real32_param = v,
            ("real64Param", ParameterValue::Real64(v)) => s.real64_param = v,
            ("stringParam", ParameterValue::String(v)) => s.string_param = v,
            ("real32ArrayParam", ParameterValue::Array(v)) => s.real32_array_param = v.as_slice::<f32>()?.to_vec(),
            ("int64ArrayParam", ParameterValue::Array(v)) => s.int64_array_param = v.as_slice::<i64>()?.to_vec(),
            (name, value) => {
                return Err(EngineError::InvalidParameter(format!(
                    "TestNode cannot set '{}' to {:?}",
                    name, value
                )))
            }
        }
        Ok(())
    }

    fn execute_command(&mut self, args: &[&str]) -> EngineResult<String> {
        match args {
            ["setDelta", value] => {
                let delta: f64 = value
                    .parse()
                    .map_err(|_| EngineError::InvalidParameter(format!("setDelta: bad value '{}'", value)))?;
                let previous = std::mem::replace(&mut self.state.delta, delta);
                Ok(previous.to_string())
            }
            _ => Err(EngineError::InvalidParameter(format!(
                "TestNode command {:?} not understood",
                args
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle_io::BundleMode;
    use tempfile::tempdir;

    fn context() -> RegionContext<'static> {
        RegionContext {
            region_name: "node",
            type_name: TestNode::TYPE_NAME,
        }
    }

    fn build(params: &str) -> Box<dyn RegionImpl> {
        let spec = TestNode::spec().unwrap();
        let params = ParameterMap::from_json(params, &spec, TestNode::TYPE_NAME).unwrap();
        TestNode::create(&params, &context()).unwrap()
    }

    #[test]
    fn test_defaults_and_overrides() {
        let node = build(r#"{"int32Param": -5, "stringParam": "hi", "int64ArrayParam": [7, 8]}"#);
        assert_eq!(node.get_parameter("int32Param").unwrap(), ParameterValue::Int32(-5));
        assert_eq!(node.get_parameter("uint64Param").unwrap(), ParameterValue::UInt64(65));
        assert_eq!(
            node.get_parameter("stringParam").unwrap(),
            ParameterValue::String("hi".into())
        );
        let int64s = node.get_parameter("int64ArrayParam").unwrap();
        assert_eq!(int64s.as_array().unwrap().as_slice::<i64>().unwrap(), &[7, 8]);
        let real32s = node.get_parameter("real32ArrayParam").unwrap();
        assert_eq!(real32s.as_array().unwrap().count(), 8);
        assert_eq!(node.node_output_element_count(OUTPUT).unwrap(), 2);
        assert!(node.node_output_element_count("other").is_err());
    }

    #[test]
    fn test_commands() {
        let mut node = build("");
        assert_eq!(node.execute_command(&["setDelta", "2.5"]).unwrap(), "1");
        assert_eq!(node.execute_command(&["setDelta", "3"]).unwrap(), "2.5");
        assert!(node.execute_command(&["setDelta", "x"]).is_err());
        assert!(node.execute_command(&["explode"]).is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let dir = tempdir().unwrap();
        let mut node = build(r#"{"real64Param": 1.5}"#);
        node.execute_command(&["setDelta", "4"]).unwrap();

        let mut writer = BundleIo::new(dir.path(), "net", "node", BundleMode::Write);
        node.serialize(&mut writer).unwrap();

        let mut reader = BundleIo::new(dir.path(), "net", "node", BundleMode::Read);
        let restored = TestNode::deserialize(&mut reader, &context()).unwrap();
        assert_eq!(restored.get_parameter("real64Param").unwrap(), ParameterValue::Real64(1.5));

        std::fs::write(reader.path("aux"), "tampered").unwrap();
        assert!(matches!(
            TestNode::deserialize(&mut reader, &context()),
            Err(EngineError::BadCheckpoint(_))
        ));
    }

    #[test]
    fn test_read_only_iteration_parameter() {
        let spec = TestNode::spec().unwrap();
        assert!(ParameterMap::from_json(r#"{"iteration": 3}"#, &spec, TestNode::TYPE_NAME).is_err());
    }
}
