//! Host detection: operating system, hostname and the built-in flags.
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::PlatformError;
use crate::exec::Executor;

/// Detected operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// macOS.
    Darwin,
    /// Linux, including WSL.
    Linux,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Darwin => write!(f, "darwin"),
            Self::Linux => write!(f, "linux"),
        }
    }
}

/// Host information gathered once per run.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// Running under Windows Subsystem for Linux.
    pub is_wsl: bool,
    /// Fully-qualified host name when available.
    pub hostname: String,
    /// Home directory of the invoking user.
    pub home: PathBuf,
}

impl Platform {
    /// Detect the current platform.
    ///
    /// # Errors
    ///
    /// Returns an error on unsupported operating systems or when the home
    /// directory cannot be determined.
    pub fn detect(executor: &dyn Executor) -> Result<Self, PlatformError> {
        let os = detect_os()?;
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PlatformError::DetectionFailed("HOME is not set".to_string()))?;
        Ok(Self {
            os,
            is_wsl: os == Os::Linux && detect_wsl(),
            hostname: detect_hostname(executor),
            home,
        })
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub fn new(os: Os, is_wsl: bool, hostname: &str, home: PathBuf) -> Self {
        Self {
            os,
            is_wsl,
            hostname: hostname.to_string(),
            home,
        }
    }

    /// Whether the host runs macOS.
    #[must_use]
    pub fn is_macos(&self) -> bool {
        self.os == Os::Darwin
    }

    /// Whether the host runs Linux.
    #[must_use]
    pub fn is_linux(&self) -> bool {
        self.os == Os::Linux
    }

    /// Flags every render context carries regardless of configuration.
    #[must_use]
    pub fn builtin_flags(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([
            ("is_macos".to_string(), self.is_macos()),
            ("is_linux".to_string(), self.is_linux()),
            ("is_wsl".to_string(), self.is_wsl),
        ])
    }
}

fn detect_os() -> Result<Os, PlatformError> {
    if cfg!(target_os = "macos") {
        Ok(Os::Darwin)
    } else if cfg!(target_os = "linux") {
        Ok(Os::Linux)
    } else {
        Err(PlatformError::Unsupported {
            platform: std::env::consts::OS.to_string(),
        })
    }
}

fn detect_wsl() -> bool {
    if std::env::var_os("WSL_DISTRO_NAME").is_some() {
        return true;
    }
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .is_ok_and(|release| release.to_lowercase().contains("microsoft"))
}

fn detect_hostname(executor: &dyn Executor) -> String {
    if let Ok(name) = executor.capture("hostname", &["-f"])
        && !name.is_empty()
    {
        return name;
    }
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
