//! Validate-then-swap installation of candidate configs.
//!
//! # Responsibilities
//! - Write the candidate to a freshly named scratch file
//! - Run the syntax check against the scratch file
//! - Compare fingerprints with the installed config
//! - Atomically replace the installed config and reload on change
//!
//! # Design Decisions
//! - A rejected candidate never reaches the destination; the scratch file is
//!   kept for inspection
//! - The destination is only ever replaced by rename
//! - A failed reload leaves the new config in place

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use crate::config::InstallSettings;
use crate::error::{ConfdError, ConfdResult};
use crate::install::command::{CommandLine, CommandRunner, SystemRunner};
use crate::install::fingerprint::fingerprint_file;

const SCRATCH_PREFIX: &str = "haproxy.cfg.";

/// Result of a successful install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Candidate matches the installed config; nothing was done.
    Unchanged,
    /// Candidate was installed and haproxy reloaded.
    Installed,
}

impl InstallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallOutcome::Unchanged => "unchanged",
            InstallOutcome::Installed => "installed",
        }
    }
}

/// Installs candidate configs at the destination path.
pub struct Installer<R: CommandRunner = SystemRunner> {
    destination: PathBuf,
    scratch_dir: PathBuf,
    check: CommandLine,
    reload: CommandLine,
    timeout: Duration,
    runner: R,
}

impl Installer<SystemRunner> {
    /// Create an installer running real commands.
    pub fn new(settings: &InstallSettings) -> ConfdResult<Self> {
        Self::with_runner(settings, SystemRunner)
    }
}

impl<R: CommandRunner> Installer<R> {
    pub fn with_runner(settings: &InstallSettings, runner: R) -> ConfdResult<Self> {
        Ok(Self {
            destination: settings.destination.clone(),
            scratch_dir: settings.scratch_dir.clone(),
            check: CommandLine::parse(&settings.check_cmd)?,
            reload: CommandLine::parse(&settings.reload_cmd)?,
            timeout: Duration::from_secs(settings.command_timeout_secs),
            runner,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Validate the candidate and install it if it differs from the live config.
    pub async fn install(&self, candidate: &[u8]) -> ConfdResult<InstallOutcome> {
        let scratch = self.write_scratch(candidate).await?;
        tracing::debug!(scratch = ?scratch, bytes = candidate.len(), "Wrote temporary config");

        self.validate(&scratch).await?;
        tracing::info!(scratch = ?scratch, "Syntax check of temporary config successful");

        let changed = match self.differs_from_installed(&scratch).await {
            Ok(changed) => changed,
            Err(e) => {
                discard_scratch(&scratch).await;
                return Err(e);
            }
        };

        if !changed {
            tracing::info!(destination = ?self.destination, "No changes in endpoints found, skipping installation");
            discard_scratch(&scratch).await;
            return Ok(InstallOutcome::Unchanged);
        }

        tracing::info!(scratch = ?scratch, destination = ?self.destination, "Installing config");
        if let Err(e) = self.replace_destination(&scratch, candidate).await {
            discard_scratch(&scratch).await;
            return Err(e);
        }
        self.reload().await?;

        Ok(InstallOutcome::Installed)
    }

    /// Write bytes to a new, uniquely named file in the scratch dir and keep it.
    async fn write_scratch(&self, bytes: &[u8]) -> ConfdResult<PathBuf> {
        let dir = self.scratch_dir.clone();
        let bytes = bytes.to_vec();
        let written = tokio::task::spawn_blocking(move || {
            write_temp(&dir, SCRATCH_PREFIX, &bytes)?
                .into_temp_path()
                .keep()
                .map_err(|e| e.error)
        })
        .await
        .map_err(|e| ConfdError::Install(format!("Scratch write task failed: {}", e)))?;

        written.map_err(|e| {
            ConfdError::Install(format!(
                "Failed to write generated config to {:?}: {}",
                self.scratch_dir, e
            ))
        })
    }

    async fn differs_from_installed(&self, scratch: &Path) -> ConfdResult<bool> {
        let installed = fingerprint_file(&self.destination).await.map_err(|e| {
            ConfdError::Install(format!("Failed to read {:?}: {}", self.destination, e))
        })?;
        let fresh = fingerprint_file(scratch)
            .await
            .map_err(|e| ConfdError::Install(format!("Failed to read {:?}: {}", scratch, e)))?;
        tracing::debug!(
            installed = installed.as_deref().unwrap_or("<none>"),
            candidate = fresh.as_deref().unwrap_or("<none>"),
            "Config fingerprints"
        );

        Ok(installed.is_none() || installed != fresh)
    }

    async fn validate(&self, scratch: &Path) -> ConfdResult<()> {
        let cmd = self.check.with_arg(scratch.to_string_lossy());
        tracing::debug!(command = %cmd, "Executing syntax check");

        let output = self
            .runner
            .run(&cmd, self.timeout)
            .await
            .map_err(|e| ConfdError::Validation {
                path: scratch.to_path_buf(),
                detail: format!("{}: {}", cmd.program, e),
            })?;

        if output.success {
            Ok(())
        } else {
            Err(ConfdError::Validation {
                path: scratch.to_path_buf(),
                detail: output.describe(),
            })
        }
    }

    /// Move the scratch file over the destination.
    ///
    /// Falls back to writing a sibling temp file next to the destination and
    /// renaming that when the scratch dir is on another filesystem.
    async fn replace_destination(&self, scratch: &Path, candidate: &[u8]) -> ConfdResult<()> {
        let rename_err = match tokio::fs::rename(scratch, &self.destination).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        tracing::debug!(error = %rename_err, "Direct rename failed, staging next to destination");

        let destination = self.destination.clone();
        let bytes = candidate.to_vec();
        tokio::task::spawn_blocking(move || stage_beside(&destination, &bytes))
            .await
            .map_err(|e| ConfdError::Install(format!("Staging task failed: {}", e)))?
            .map_err(|e| {
                ConfdError::Install(format!(
                    "Failed to move {:?} to {:?}: {}; staging beside it failed: {}",
                    scratch, self.destination, rename_err, e
                ))
            })?;

        discard_scratch(scratch).await;
        Ok(())
    }

    async fn reload(&self) -> ConfdResult<()> {
        tracing::debug!(command = %self.reload, "Executing haproxy reload");

        let output = self
            .runner
            .run(&self.reload, self.timeout)
            .await
            .map_err(|e| ConfdError::Reload(format!("{}: {}", self.reload, e)))?;

        if output.success {
            tracing::info!("Successfully reloaded haproxy");
            Ok(())
        } else {
            Err(ConfdError::Reload(format!("{}: {}", self.reload, output.describe())))
        }
    }
}

/// Write `bytes` to a temp file in the destination's directory and rename it
/// over the destination.
fn stage_beside(destination: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    write_temp(dir, ".haproxy.cfg.", bytes)?
        .persist(destination)
        .map_err(|e| e.error)?;
    Ok(())
}

/// Remove a scratch file that is no longer needed. Already gone is fine.
async fn discard_scratch(scratch: &Path) {
    match tokio::fs::remove_file(scratch).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(scratch = ?scratch, error = %e, "Failed to remove temporary config"),
    }
}

fn write_temp(dir: &Path, prefix: &str, bytes: &[u8]) -> io::Result<NamedTempFile> {
    let mut file = Builder::new().prefix(prefix).rand_bytes(8).tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::command::CommandOutput;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;

    /// Answers every command with a scripted exit and records the calls.
    struct ScriptedRunner {
        check_ok: bool,
        reload_ok: bool,
        calls: Mutex<Vec<CommandLine>>,
    }

    impl ScriptedRunner {
        fn new(check_ok: bool, reload_ok: bool) -> Self {
            Self {
                check_ok,
                reload_ok,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn programs(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.program.clone())
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(&self, cmd: &CommandLine, _timeout: Duration) -> io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(cmd.clone());
            let success = match cmd.program.as_str() {
                "check" => self.check_ok,
                _ => self.reload_ok,
            };
            Ok(CommandOutput {
                success,
                status: if success { "exit status: 0" } else { "exit status: 1" }.to_string(),
                stderr: if success { String::new() } else { "boom".to_string() },
            })
        }
    }

    fn settings(dir: &Path) -> InstallSettings {
        let scratch = dir.join("scratch");
        std::fs::create_dir_all(&scratch).unwrap();
        InstallSettings {
            destination: dir.join("haproxy.cfg"),
            scratch_dir: scratch,
            check_cmd: "check -c -f".to_string(),
            reload_cmd: "reload".to_string(),
            command_timeout_secs: 5,
        }
    }

    fn scratch_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir.join("scratch"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_first_install_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(true, true)).unwrap();

        let outcome = installer.install(b"global\n").await.unwrap();

        assert_eq!(outcome, InstallOutcome::Installed);
        assert_eq!(std::fs::read(dir.path().join("haproxy.cfg")).unwrap(), b"global\n");
        assert_eq!(installer.runner().programs(), vec!["check", "reload"]);
        assert!(scratch_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_check_receives_scratch_path_last() {
        let dir = tempfile::tempdir().unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(true, true)).unwrap();
        installer.install(b"global\n").await.unwrap();

        let calls = installer.runner().calls.lock().unwrap();
        let check = &calls[0];
        assert_eq!(&check.args[..2], &["-c".to_string(), "-f".to_string()]);
        let scratch = PathBuf::from(check.args.last().unwrap());
        assert!(scratch.starts_with(dir.path().join("scratch")));
        assert!(scratch
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SCRATCH_PREFIX));
    }

    #[tokio::test]
    async fn test_unchanged_skips_reload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("haproxy.cfg"), b"global\n").unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(true, true)).unwrap();

        let outcome = installer.install(b"global\n").await.unwrap();

        assert_eq!(outcome, InstallOutcome::Unchanged);
        assert_eq!(installer.runner().programs(), vec!["check"]);
        assert!(scratch_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_rejected_candidate_never_installed() {
        let dir = tempfile::tempdir().unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(false, true)).unwrap();

        let err = installer.install(b"garbage").await.unwrap_err();

        assert!(matches!(err, ConfdError::Validation { .. }));
        assert!(!dir.path().join("haproxy.cfg").exists());
        assert_eq!(installer.runner().programs(), vec!["check"]);
        let kept = scratch_files(dir.path());
        assert_eq!(kept.len(), 1);
        assert_eq!(std::fs::read(&kept[0]).unwrap(), b"garbage");
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_new_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("haproxy.cfg"), b"old\n").unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(true, false)).unwrap();

        let err = installer.install(b"new\n").await.unwrap_err();

        assert!(matches!(err, ConfdError::Reload(_)));
        assert!(err.to_string().contains("boom"));
        assert_eq!(std::fs::read(dir.path().join("haproxy.cfg")).unwrap(), b"new\n");
    }

    #[tokio::test]
    async fn test_scratch_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(false, true)).unwrap();

        for _ in 0..5 {
            let _ = installer.install(b"x").await;
        }
        assert_eq!(scratch_files(dir.path()).len(), 5);
    }

    #[tokio::test]
    async fn test_missing_scratch_dir_is_install_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path());
        settings.scratch_dir = dir.path().join("missing");
        let installer = Installer::with_runner(&settings, ScriptedRunner::new(true, true)).unwrap();

        assert!(matches!(
            installer.install(b"x").await,
            Err(ConfdError::Install(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_destination_discards_scratch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("haproxy.cfg")).unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(true, true)).unwrap();

        let err = installer.install(b"global\n").await.unwrap_err();

        assert!(matches!(err, ConfdError::Install(_)), "{:?}", err);
        assert_eq!(installer.runner().programs(), vec!["check"]);
        assert!(scratch_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_move_discards_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path());
        settings.destination = dir.path().join("missing").join("haproxy.cfg");
        let installer = Installer::with_runner(&settings, ScriptedRunner::new(true, true)).unwrap();

        let err = installer.install(b"global\n").await.unwrap_err();

        assert!(matches!(err, ConfdError::Install(_)), "{:?}", err);
        assert_eq!(installer.runner().programs(), vec!["check"]);
        assert!(scratch_files(dir.path()).is_empty());
    }

    /// Two large configs that differ everywhere, with different lengths.
    fn two_configs() -> (Vec<u8>, Vec<u8>) {
        let a = "backend alpha\n  server a 10.0.0.1:80\n".repeat(20_000);
        let b = "backend beta\n  server bb 10.0.0.22:8080\n".repeat(25_000);
        (a.into_bytes(), b.into_bytes())
    }

    /// Read `path` in a loop until stopped; returns (reads, reads that were
    /// neither full config).
    fn watch_reads(
        path: PathBuf,
        a: Vec<u8>,
        b: Vec<u8>,
        stop: Arc<AtomicBool>,
    ) -> JoinHandle<(usize, usize)> {
        std::thread::spawn(move || {
            let (mut reads, mut torn) = (0, 0);
            while !stop.load(Ordering::SeqCst) {
                let seen = std::fs::read(&path).unwrap();
                reads += 1;
                if seen != a && seen != b {
                    torn += 1;
                }
            }
            (reads, torn)
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_only_see_whole_configs() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = two_configs();
        let destination = dir.path().join("haproxy.cfg");
        std::fs::write(&destination, &a).unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(true, true)).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let reader = watch_reads(destination.clone(), a.clone(), b.clone(), stop.clone());

        for i in 0..20 {
            let candidate = if i % 2 == 0 { &b } else { &a };
            let outcome = installer.install(candidate).await.unwrap();
            assert_eq!(outcome, InstallOutcome::Installed);
        }

        stop.store(true, Ordering::SeqCst);
        let (reads, torn) = reader.join().unwrap();
        assert!(reads > 0);
        assert_eq!(torn, 0, "{} of {} reads saw a partial config", torn, reads);
        assert_eq!(std::fs::read(&destination).unwrap(), a);
    }

    #[test]
    fn test_staged_replace_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = two_configs();
        let destination = dir.path().join("haproxy.cfg");
        std::fs::write(&destination, &a).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let reader = watch_reads(destination.clone(), a.clone(), b.clone(), stop.clone());

        for i in 0..20 {
            let candidate = if i % 2 == 0 { &b } else { &a };
            stage_beside(&destination, candidate).unwrap();
        }

        stop.store(true, Ordering::SeqCst);
        let (reads, torn) = reader.join().unwrap();
        assert!(reads > 0);
        assert_eq!(torn, 0, "{} of {} reads saw a partial config", torn, reads);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|name| name != "haproxy.cfg")
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[tokio::test]
    async fn test_fallback_used_when_scratch_vanishes() {
        let dir = tempfile::tempdir().unwrap();
        let installer =
            Installer::with_runner(&settings(dir.path()), ScriptedRunner::new(true, true)).unwrap();
        let scratch = dir.path().join("scratch").join("haproxy.cfg.gone");

        installer
            .replace_destination(&scratch, b"global\n")
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("haproxy.cfg")).unwrap(), b"global\n");
    }
}
