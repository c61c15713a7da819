// src/exec/shell.rs

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::cache::{BuildCacheConfiguration, CachedResult};
use crate::change::{ChangeAnalyzer, Fingerprint};
use crate::exec::process::run_shell_command;
use crate::exec::runner::{OperationResult, RunnerContext};
use crate::types::OperationStatus;
use crate::workspace::Project;

/// Runner that executes a resolved command line in the project folder.
#[derive(Debug)]
pub struct ShellOperationRunner {
    pub command_line: String,
    pub display_name: String,
    pub phase_name: String,
    pub project: Arc<Project>,
    /// `None` disables caching entirely.
    pub build_cache: Option<Arc<BuildCacheConfiguration>>,
    pub change_analyzer: Arc<dyn ChangeAnalyzer>,
    pub allow_incremental: bool,
}

impl ShellOperationRunner {
    /// Execute the operation.
    ///
    /// A non-zero exit code is a `Failure` result, not an error. Errors that
    /// prevent the process from running at all are logged and also reported
    /// as `Failure`, with the message in [`OperationResult::error`].
    pub async fn execute(&self, ctx: &RunnerContext) -> OperationResult {
        let started = Instant::now();
        let mut result = match self.execute_inner(ctx).await {
            Ok(result) => result,
            Err(err) => {
                error!(
                    operation = %self.display_name,
                    error = %format!("{err:#}"),
                    "operation could not be executed"
                );
                OperationResult::infrastructure_failure(format!("{err:#}"))
            }
        };
        result.duration = started.elapsed();
        result
    }

    async fn execute_inner(&self, ctx: &RunnerContext) -> Result<OperationResult> {
        let fingerprint = match &self.build_cache {
            Some(_) => self.compute_fingerprint().await,
            None => None,
        };

        if self.allow_incremental {
            if let (Some(cache), Some(fp)) = (&self.build_cache, &fingerprint) {
                if let Some(restored) = self.try_restore(cache, fp) {
                    return Ok(restored);
                }
            }
        }

        if ctx.is_cancelled() {
            return Ok(OperationResult::with_status(OperationStatus::Aborted));
        }

        let mut cancel = ctx.cancel.clone();
        let outcome = run_shell_command(
            &self.display_name,
            &self.command_line,
            &self.project.folder,
            &mut cancel,
            ctx.grace_period,
        )
        .await?;

        let status = if outcome.cancelled {
            OperationStatus::Aborted
        } else if outcome.success {
            OperationStatus::Success
        } else {
            OperationStatus::Failure
        };

        if status == OperationStatus::Success {
            if let (Some(cache), Some(fp)) = (&self.build_cache, &fingerprint) {
                self.record_success(cache, fp, outcome.exit_code.unwrap_or(0), &outcome.output);
            }
        }

        Ok(OperationResult {
            status,
            exit_code: outcome.exit_code,
            output: outcome.output,
            duration: Default::default(),
            error: None,
        })
    }

    /// Fingerprinting walks the project tree, so it runs on the blocking pool.
    ///
    /// Failures disable caching for this execution only.
    async fn compute_fingerprint(&self) -> Option<Fingerprint> {
        let analyzer = Arc::clone(&self.change_analyzer);
        let project = Arc::clone(&self.project);
        let phase = self.phase_name.clone();
        let command_line = self.command_line.clone();

        let res = tokio::task::spawn_blocking(move || {
            analyzer.fingerprint(&project, &phase, &command_line)
        })
        .await
        .context("fingerprint task panicked")
        .and_then(|r| r);

        match res {
            Ok(fp) => Some(fp),
            Err(e) => {
                warn!(
                    operation = %self.display_name,
                    error = %format!("{e:#}"),
                    "could not compute fingerprint; running without cache"
                );
                None
            }
        }
    }

    /// Reuse an earlier result, if the project is unchanged or the cache has
    /// an entry for `fingerprint`. Errors are treated as a miss.
    fn try_restore(&self, cache: &BuildCacheConfiguration, fingerprint: &Fingerprint) -> Option<OperationResult> {
        let entry = match cache.store.try_restore(fingerprint) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(operation = %self.display_name, error = %format!("{e:#}"), "build cache read failed; treating as miss");
                None
            }
        };

        let unchanged = match self
            .change_analyzer
            .is_project_unchanged(&self.project, &self.phase_name, fingerprint)
        {
            Ok(unchanged) => unchanged,
            Err(e) => {
                warn!(operation = %self.display_name, error = %format!("{e:#}"), "change analysis failed; assuming changed");
                false
            }
        };

        if !unchanged && entry.is_none() {
            debug!(operation = %self.display_name, %fingerprint, "no reusable result");
            return None;
        }

        info!(
            operation = %self.display_name,
            %fingerprint,
            unchanged,
            cache_hit = entry.is_some(),
            "reusing previous result"
        );

        let mut result = OperationResult::with_status(OperationStatus::FromCache);
        if let Some(entry) = entry {
            result.exit_code = Some(entry.exit_code);
            result.output = entry.output;
        }
        Some(result)
    }

    /// Best effort: failures are logged and never change the result.
    fn record_success(&self, cache: &BuildCacheConfiguration, fingerprint: &Fingerprint, exit_code: i32, output: &str) {
        let entry = CachedResult {
            project: self.project.name.clone(),
            phase: self.phase_name.clone(),
            exit_code,
            output: output.to_string(),
        };
        if let Err(e) = cache.store.store(fingerprint, &entry) {
            warn!(operation = %self.display_name, error = %format!("{e:#}"), "failed to write build cache entry");
        }
        if let Err(e) = self
            .change_analyzer
            .record_success(&self.project, &self.phase_name, fingerprint)
        {
            warn!(operation = %self.display_name, error = %format!("{e:#}"), "failed to record operation state");
        }
    }
}
