// src/workspace/parameter.rs

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::config::{ParameterConfig, ParameterKind};
use crate::errors::{PhasegraphError, Result};

/// One `--param NAME[=VALUE]` occurrence from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterArg {
    pub name: String,
    pub value: Option<String>,
}

impl FromStr for ParameterArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (name, value) = match s.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (s, None),
        };
        if name.is_empty() {
            return Err(format!("invalid parameter '{s}': missing name"));
        }
        let name = if name.starts_with("--") {
            name.to_string()
        } else {
            format!("--{name}")
        };
        Ok(ParameterArg { name, value })
    }
}

/// Value bound to a custom parameter for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    Flag(bool),
    Text(Option<String>),
    List(Vec<String>),
}

/// A CLI-level option forwarded to the commands of specific phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomParameter {
    pub long_name: String,
    pub associated_phases: BTreeSet<String>,
    pub value: ParameterValue,
}

impl CustomParameter {
    pub fn flag(long_name: impl Into<String>, set: bool) -> Self {
        Self::new(long_name, ParameterValue::Flag(set))
    }

    pub fn text(long_name: impl Into<String>, value: Option<&str>) -> Self {
        Self::new(long_name, ParameterValue::Text(value.map(str::to_string)))
    }

    pub fn list<I, S>(long_name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            long_name,
            ParameterValue::List(values.into_iter().map(Into::into).collect()),
        )
    }

    fn new(long_name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            long_name: long_name.into(),
            associated_phases: BTreeSet::new(),
            value,
        }
    }

    pub fn for_phase(mut self, phase: impl Into<String>) -> Self {
        self.associated_phases.insert(phase.into());
        self
    }

    /// Render this parameter as command-line tokens.
    ///
    /// - flag: `--name` when set, nothing otherwise
    /// - text/choice: `--name value` when a value is present
    /// - list: `--name v` for each value
    pub fn append_to_arg_list(&self, args: &mut Vec<String>) {
        match &self.value {
            ParameterValue::Flag(true) => args.push(self.long_name.clone()),
            ParameterValue::Flag(false) | ParameterValue::Text(None) => {}
            ParameterValue::Text(Some(value)) => {
                args.push(self.long_name.clone());
                args.push(value.clone());
            }
            ParameterValue::List(values) => {
                for value in values {
                    args.push(self.long_name.clone());
                    args.push(value.clone());
                }
            }
        }
    }

    /// Bind a declared parameter to the values given on the command line.
    pub fn bind(long_name: &str, cfg: &ParameterConfig, given: &[&ParameterArg]) -> Result<Self> {
        let err = |msg: String| PhasegraphError::ConfigError(msg);

        let value = match cfg.kind {
            ParameterKind::Flag => {
                if let Some(arg) = given.iter().find(|a| a.value.is_some()) {
                    return Err(err(format!(
                        "flag parameter '{}' does not take a value (got '{}')",
                        long_name,
                        arg.value.as_deref().unwrap_or_default()
                    )));
                }
                ParameterValue::Flag(!given.is_empty())
            }
            ParameterKind::String | ParameterKind::Choice => {
                if given.len() > 1 {
                    return Err(err(format!(
                        "parameter '{}' may only be given once",
                        long_name
                    )));
                }
                let value = match given.first() {
                    Some(arg) => match arg.value.as_deref() {
                        Some(v) => Some(v.to_string()),
                        None => {
                            return Err(err(format!(
                                "parameter '{}' requires a value ({}=<value>)",
                                long_name, long_name
                            )));
                        }
                    },
                    None => cfg.default_value.clone(),
                };
                if cfg.kind == ParameterKind::Choice {
                    if let Some(v) = value.as_deref() {
                        if !cfg.alternatives.iter().any(|a| a == v) {
                            return Err(err(format!(
                                "'{}' is not a valid value for '{}' (expected one of: {})",
                                v,
                                long_name,
                                cfg.alternatives.join(", ")
                            )));
                        }
                    }
                }
                ParameterValue::Text(value)
            }
            ParameterKind::StringList => {
                let mut values = Vec::with_capacity(given.len());
                for arg in given {
                    match arg.value.as_deref() {
                        Some(v) => values.push(v.to_string()),
                        None => {
                            return Err(err(format!(
                                "parameter '{}' requires a value ({}=<value>)",
                                long_name, long_name
                            )));
                        }
                    }
                }
                ParameterValue::List(values)
            }
        };

        Ok(Self {
            long_name: long_name.to_string(),
            associated_phases: cfg.phases.iter().cloned().collect(),
            value,
        })
    }
}

/// All custom parameters of a run, keyed by long name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    parameters: BTreeMap<String, CustomParameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, parameter: CustomParameter) {
        self.parameters.insert(parameter.long_name.clone(), parameter);
    }

    pub fn get(&self, long_name: &str) -> Option<&CustomParameter> {
        self.parameters.get(long_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomParameter> {
        self.parameters.values()
    }

    /// Long names of the parameters associated with `phase`, in order.
    pub fn names_for_phase(&self, phase: &str) -> Vec<String> {
        self.parameters
            .values()
            .filter(|p| p.associated_phases.contains(phase))
            .map(|p| p.long_name.clone())
            .collect()
    }

    /// Bind every declared parameter to the command-line arguments.
    ///
    /// Arguments naming an undeclared parameter are rejected.
    pub fn bind(declared: &BTreeMap<String, ParameterConfig>, args: &[ParameterArg]) -> Result<Self> {
        if let Some(unknown) = args.iter().find(|a| !declared.contains_key(&a.name)) {
            return Err(PhasegraphError::ConfigError(format!(
                "unknown parameter '{}'",
                unknown.name
            )));
        }

        let mut set = ParameterSet::new();
        for (long_name, cfg) in declared.iter() {
            let given: Vec<&ParameterArg> = args.iter().filter(|a| &a.name == long_name).collect();
            set.insert(CustomParameter::bind(long_name, cfg, &given)?);
        }
        Ok(set)
    }
}
