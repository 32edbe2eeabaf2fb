//! Book building: run the build tool per book on a bounded worker pool.

use crate::config::RunOptions;
use crate::error::{Error, Result};
use crate::publish::Publisher;
use crate::types::base_name;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, mpsc};
use std::thread;

/// Upper bound on concurrent builds; CI workers fail under heavier load.
pub const MAX_JOBS: usize = 4;

/// Result of building one book. Failures are data, never panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub book: String,
    pub success: bool,
    pub output: String,
    pub returncode: Option<i32>,
}

/// Builds a single book directory.
pub trait BookBuilder: Sync {
    fn build(&self, book: &Path) -> BuildOutcome;
}

/// Number of concurrent builds for this machine.
pub fn max_jobs() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_JOBS)
}

/// Build every book, `jobs` at a time, and return once all are done.
///
/// Each worker pulls the next book from a shared queue and sends its
/// outcome over a channel. Completion order is unspecified.
pub fn build_books<B: BookBuilder + ?Sized>(books: &[PathBuf], builder: &B, jobs: usize) -> Vec<BuildOutcome> {
    let jobs = jobs.clamp(1, books.len().max(1));
    let queue = Mutex::new(books.iter());
    let (tx, rx) = mpsc::channel();

    thread::scope(|s| {
        for _ in 0..jobs {
            let tx = tx.clone();
            let queue = &queue;
            s.spawn(move || {
                loop {
                    let next = queue.lock().ok().and_then(|mut q| q.next().cloned());
                    let Some(book) = next else {
                        break;
                    };
                    if tx.send(builder.build(&book)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    rx.into_iter().collect()
}

/// Build books one after another on the calling thread.
pub fn build_books_serial<B: BookBuilder + ?Sized>(books: &[PathBuf], builder: &B) -> Vec<BuildOutcome> {
    books.iter().map(|b| builder.build(b)).collect()
}

/// Fail unless `program` is an executable file on `PATH`.
pub fn ensure_program(program: &str) -> Result<PathBuf> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| Error::MissingProgram(program.to_string()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("cmd").is_file() || path.with_extension("exe").is_file()
}

/// Operating system and profile values of each install guide variant.
const INSTALL_GUIDE_PROFILES: [(&str, &str); 4] = [
    ("apt-debian", "debian"),
    ("yum", "centos;fedora;rhel"),
    ("zypper", "opensuse;sles"),
    ("apt", "ubuntu"),
];

/// Builds a book with Maven: `clean`, then `generate-sources`.
///
/// The combined output is logged to `<log_dir>/build-[<lang>-]<book>.log`
/// and successful builds are handed to the publisher.
pub struct MavenBuilder {
    pub program: String,
    pub release_path: String,
    pub comments_enabled: String,
    pub language: Option<String>,
    pub log_dir: PathBuf,
    pub publisher: Option<Publisher>,
}

impl MavenBuilder {
    pub fn new(options: &RunOptions, log_dir: &Path, publisher: Option<Publisher>) -> Self {
        Self {
            program: "mvn".to_string(),
            release_path: options.release_path.clone(),
            comments_enabled: options.comments_enabled.clone(),
            language: options.language.clone(),
            log_dir: log_dir.to_path_buf(),
            publisher,
        }
    }

    /// Argument lists run in order in the directory of `book`.
    ///
    /// The install guide is generated once per packaging profile.
    pub fn steps(&self, book: &str) -> Vec<Vec<String>> {
        let mut steps = vec![vec!["clean".to_string()]];
        if book == "install-guide" {
            for (system, profile) in INSTALL_GUIDE_PROFILES {
                let mut args = self.generate_sources();
                args.push(format!("-Doperating.system={system}"));
                args.push(format!("-Dprofile.os={profile}"));
                steps.push(args);
            }
        } else {
            steps.push(self.generate_sources());
        }
        steps
    }

    fn generate_sources(&self) -> Vec<String> {
        vec![
            "generate-sources".to_string(),
            "-B".to_string(),
            format!("-Dcomments.enabled={}", self.comments_enabled),
            format!("-Drelease.path.name={}", self.release_path),
        ]
    }

    pub fn log_file(&self, book: &str) -> PathBuf {
        let name = match &self.language {
            Some(lang) => format!("build-{lang}-{book}.log"),
            None => format!("build-{book}.log"),
        };
        self.log_dir.join(name)
    }
}

impl BookBuilder for MavenBuilder {
    fn build(&self, book: &Path) -> BuildOutcome {
        let name = base_name(book).to_string();
        let mut output = String::new();
        let mut success = true;
        let mut returncode = Some(0);

        for args in self.steps(&name) {
            match Command::new(&self.program).args(&args).current_dir(book).output() {
                Ok(out) => {
                    output.push_str(&String::from_utf8_lossy(&out.stdout));
                    output.push_str(&String::from_utf8_lossy(&out.stderr));
                    if !out.status.success() {
                        success = false;
                        returncode = out.status.code();
                        break;
                    }
                },
                Err(e) => {
                    output.push_str(&format!("cannot run {}: {e}\n", self.program));
                    success = false;
                    returncode = None;
                    break;
                },
            }
        }

        let log = self.log_file(&name);
        if let Err(e) = std::fs::write(&log, &output) {
            tracing::warn!(log = %log.display(), error = %e, "cannot write build log");
        }

        if success {
            if let Some(publisher) = &self.publisher {
                if let Err(e) = publisher.publish(book) {
                    tracing::warn!(book = %name, error = %e, "publishing failed");
                }
            }
        }

        BuildOutcome {
            book: name,
            success,
            output,
            returncode,
        }
    }
}
