use super::defaults::{
    MAX_BASE_DELAY_MS, MAX_RESTART_LIMIT, MAX_WORKER_ARGS, MAX_WORKER_ARG_BYTES,
    MIN_BASE_DELAY_MS, WORKER_CMD_ALLOWLIST,
};
use super::AppConfig;
use crate::supervisor::WorkerConfig;
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
};

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize paths.
    ///
    /// The supervisor never re-checks paths at spawn time; a worker script
    /// that cannot be found must be rejected here, before anything runs.
    pub fn validate(&mut self) -> Result<()> {
        if self.max_restarts > MAX_RESTART_LIMIT {
            bail!(
                "--max-restarts must be between 0 and {MAX_RESTART_LIMIT}, got {}",
                self.max_restarts
            );
        }
        if !(MIN_BASE_DELAY_MS..=MAX_BASE_DELAY_MS).contains(&self.restart_base_delay_ms) {
            bail!(
                "--restart-base-delay-ms must be between {MIN_BASE_DELAY_MS} and {MAX_BASE_DELAY_MS}, got {}",
                self.restart_base_delay_ms
            );
        }
        if self.worker_args.len() > MAX_WORKER_ARGS {
            bail!(
                "--worker-arg repeated too many times (max {MAX_WORKER_ARGS}, got {})",
                self.worker_args.len()
            );
        }
        let total_arg_bytes: usize = self.worker_args.iter().map(|arg| arg.len()).sum();
        if total_arg_bytes > MAX_WORKER_ARG_BYTES {
            bail!("combined --worker-arg length exceeds {MAX_WORKER_ARG_BYTES} bytes");
        }

        self.worker_cmd = sanitize_binary(&self.worker_cmd, "--worker-cmd", WORKER_CMD_ALLOWLIST)?;

        let script = self
            .worker_script
            .canonicalize()
            .with_context(|| {
                format!(
                    "failed to canonicalize --worker-script '{}'",
                    self.worker_script.display()
                )
            })?;
        if !script.is_file() {
            bail!("--worker-script '{}' is not a file", script.display());
        }
        self.worker_script = script;

        if let Some(dir) = &self.working_dir {
            let dir = dir.canonicalize().with_context(|| {
                format!("failed to canonicalize --working-dir '{}'", dir.display())
            })?;
            if !dir.is_dir() {
                bail!("--working-dir '{}' is not a directory", dir.display());
            }
            self.working_dir = Some(dir);
        }

        Ok(())
    }

    /// Snapshot the validated settings as the supervisor's worker description.
    pub fn worker_config(&self) -> WorkerConfig {
        let working_dir = self.working_dir.clone().unwrap_or_else(|| {
            self.worker_script
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        let name = self
            .worker_script
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "worker".to_string());
        let mut args = vec![self.worker_script.to_string_lossy().into_owned()];
        args.extend(self.worker_args.iter().cloned());
        WorkerConfig {
            name,
            command: self.worker_cmd.clone(),
            args,
            working_dir,
            max_restarts: self.max_restarts,
            base_delay_ms: self.restart_base_delay_ms,
        }
    }
}

/// Allow either a known interpreter name or an existing executable path.
///
/// The command line ends up in `Command::new` verbatim, so anything that is
/// neither allowlisted nor a real executable on disk is rejected up front.
pub(super) fn sanitize_binary(value: &str, flag: &str, allowlist: &[&str]) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    if let Some(allowed) = allowlist
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(trimmed))
    {
        return Ok((*allowed).to_string());
    }

    let path = Path::new(trimmed);
    if !path.is_absolute() && !trimmed.contains(std::path::MAIN_SEPARATOR) {
        bail!("{flag} must be one of {allowlist:?} or an existing binary path");
    }

    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to canonicalize {flag} '{trimmed}'"))?;
    let metadata = fs::metadata(&canonical)
        .with_context(|| format!("failed to inspect {flag} '{}'", canonical.display()))?;
    if !metadata.is_file() {
        bail!("{flag} '{}' is not a file", canonical.display());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        if mode & 0o111 == 0 {
            bail!(
                "{flag} '{}' exists but is not executable (mode {:o})",
                canonical.display(),
                mode
            );
        }
    }
    canonical
        .to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("{flag} must be valid UTF-8"))
}
