// src/exec/factory.rs

//! Decides what, if anything, each operation runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::cache::BuildCacheConfiguration;
use crate::change::ChangeAnalyzer;
use crate::errors::{PhasegraphError, Result};
use crate::exec::noop::NoOpOperationRunner;
use crate::exec::runner::OperationRunner;
use crate::exec::shell::ShellOperationRunner;
use crate::types::{ExecutionTarget, OperationStatus};
use crate::workspace::{ParameterSet, Phase, Project, ScriptLookup};

/// Builds one [`OperationRunner`] per (phase, project).
///
/// Custom parameter arguments depend only on the phase, so they are rendered
/// once per phase and shared by every project. The cache lives as long as
/// the factory, i.e. one run.
pub struct OperationRunnerFactory {
    parameters: Arc<ParameterSet>,
    build_cache: Option<Arc<BuildCacheConfiguration>>,
    change_analyzer: Arc<dyn ChangeAnalyzer>,
    allow_incremental: bool,
    target: ExecutionTarget,
    parameter_cache: Mutex<HashMap<String, Arc<[String]>>>,
    renders: AtomicUsize,
}

impl OperationRunnerFactory {
    pub fn new(
        parameters: Arc<ParameterSet>,
        build_cache: Option<Arc<BuildCacheConfiguration>>,
        change_analyzer: Arc<dyn ChangeAnalyzer>,
        allow_incremental: bool,
    ) -> Self {
        Self {
            parameters,
            build_cache,
            change_analyzer,
            allow_incremental,
            target: ExecutionTarget::host(),
            parameter_cache: Mutex::new(HashMap::new()),
            renders: AtomicUsize::new(0),
        }
    }

    /// Resolve command lines for `target` instead of the host platform.
    pub fn with_target(mut self, target: ExecutionTarget) -> Self {
        self.target = target;
        self
    }

    /// Number of times a phase's parameter list was actually rendered.
    pub fn parameter_renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    /// Rendered custom parameter arguments for `phase`.
    ///
    /// The lock is held while rendering, so concurrent first calls for the
    /// same phase render exactly once.
    pub fn custom_parameter_args(&self, phase: &Phase) -> Arc<[String]> {
        let mut cache = self
            .parameter_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(args) = cache.get(&phase.name) {
            return Arc::clone(args);
        }

        let mut args = Vec::new();
        for name in phase.associated_parameters.iter() {
            match self.parameters.get(name) {
                Some(param) => param.append_to_arg_list(&mut args),
                None => trace!(phase = %phase.name, parameter = %name, "parameter not bound; skipping"),
            }
        }
        self.renders.fetch_add(1, Ordering::SeqCst);
        debug!(phase = %phase.name, ?args, "rendered custom parameters");

        let args: Arc<[String]> = args.into();
        cache.insert(phase.name.clone(), Arc::clone(&args));
        args
    }

    /// Resolve the command line for `(phase, project)`.
    ///
    /// - `Ok(None)`: nothing to run (empty script, or a missing one the phase
    ///   tolerates).
    /// - `Err(MissingScript)`: missing or null script on a phase that requires it.
    pub fn resolve_command(&self, phase: &Phase, project: &Project) -> Result<Option<String>> {
        let raw = match project.script(&phase.name) {
            ScriptLookup::Missing | ScriptLookup::Null => {
                if phase.ignore_missing_script {
                    return Ok(None);
                }
                return Err(PhasegraphError::MissingScript {
                    project: project.name.clone(),
                    phase: phase.name.clone(),
                });
            }
            ScriptLookup::Empty => return Ok(None),
            ScriptLookup::Command(raw) => raw,
        };

        let args = self.custom_parameter_args(phase);
        let mut command_line = raw.to_string();
        if !args.is_empty() {
            command_line.push(' ');
            command_line.push_str(&args.join(" "));
        }

        if self.target == ExecutionTarget::Windows {
            command_line = convert_slashes_for_windows(&command_line);
        }

        Ok(Some(command_line))
    }

    pub fn create_operation_runner(&self, phase: &Phase, project: &Arc<Project>) -> Result<OperationRunner> {
        let command_line = self.resolve_command(phase, project)?;
        let display_name = phase.display_name_for(&project.name);

        let runner = match command_line {
            Some(command_line) => OperationRunner::Shell(ShellOperationRunner {
                command_line,
                display_name,
                phase_name: phase.name.clone(),
                project: Arc::clone(project),
                build_cache: self.build_cache.clone(),
                change_analyzer: Arc::clone(&self.change_analyzer),
                allow_incremental: self.allow_incremental,
            }),
            // Nothing to run is reported as satisfied from cache.
            None => OperationRunner::NoOp(NoOpOperationRunner::new(
                display_name,
                OperationStatus::FromCache,
                false,
            )),
        };

        debug!(
            operation = %runner.display_name(),
            cmd = ?runner.command_line(),
            "created operation runner"
        );
        Ok(runner)
    }
}

/// Rewrite `/` to `\` for `cmd.exe`.
///
/// Applies to the whole command line, so path-valued parameter arguments are
/// converted along with the executable.
pub fn convert_slashes_for_windows(command_line: &str) -> String {
    command_line.replace('/', "\\")
}
