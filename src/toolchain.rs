//! External tool discovery.
//!
//! The pipeline drives four external programs: the Matroska `mkvinfo` and
//! `mkvextract` tools, a Java runtime hosting the BDSup2Sub converter jar,
//! and the `tesseract` recogniser. [`Toolchain`] records where each one was
//! found; stage constructors call [`Toolchain::require`] and fail with
//! [`Sub2SrtError::MissingDependency`] when a tool is absent.

use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use crate::error::Sub2SrtError;

/// Environment variable naming the BDSup2Sub jar.
pub const BDSUP2SUB_JAR_ENV: &str = "BDSUP2SUB_JAR";

/// An external program the pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// `mkvinfo`, used to list the tracks of a container.
    MkvInfo,
    /// `mkvextract`, used to pull tracks out of a container.
    MkvExtract,
    /// The Java runtime that hosts the converter.
    Java,
    /// The BDSup2Sub converter jar.
    BdSup2Sub,
    /// The `tesseract` OCR engine.
    Tesseract,
}

impl Tool {
    /// Every tool, in pipeline order.
    pub const ALL: [Tool; 5] = [
        Tool::MkvInfo,
        Tool::MkvExtract,
        Tool::Java,
        Tool::BdSup2Sub,
        Tool::Tesseract,
    ];

    /// How to make the tool available.
    pub fn install_hint(self) -> &'static str {
        match self {
            Tool::MkvInfo | Tool::MkvExtract => {
                "install MKVToolNix and make sure its binaries are on PATH"
            }
            Tool::Java => "install a Java runtime or set JAVA_HOME",
            Tool::BdSup2Sub => {
                "download BDSup2Sub and pass --jar or set BDSUP2SUB_JAR to the jar path"
            }
            Tool::Tesseract => "install tesseract-ocr and make sure it is on PATH",
        }
    }
}

impl Display for Tool {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Tool::MkvInfo => write!(f, "mkvinfo"),
            Tool::MkvExtract => write!(f, "mkvextract"),
            Tool::Java => write!(f, "java"),
            Tool::BdSup2Sub => write!(f, "bdsup2sub"),
            Tool::Tesseract => write!(f, "tesseract"),
        }
    }
}

/// Resolved locations of the external tools.
///
/// A default-constructed toolchain has nothing resolved, which is useful
/// for exercising stages that are given their collaborators directly.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    mkvinfo: Option<PathBuf>,
    mkvextract: Option<PathBuf>,
    java: Option<PathBuf>,
    bdsup2sub: Option<PathBuf>,
    tesseract: Option<PathBuf>,
}

impl Toolchain {
    /// Look every tool up on `PATH`.
    ///
    /// `java` is taken from `$JAVA_HOME/bin/java` when `JAVA_HOME` is set,
    /// and the converter jar from `BDSUP2SUB_JAR`.
    pub fn discover() -> Self {
        let java = match env::var_os("JAVA_HOME") {
            Some(home) => Some(Path::new(&home).join("bin").join("java")).filter(|p| p.exists()),
            None => which::which("java").ok(),
        };

        let toolchain = Self {
            mkvinfo: which::which("mkvinfo").ok(),
            mkvextract: which::which("mkvextract").ok(),
            java,
            bdsup2sub: env::var_os(BDSUP2SUB_JAR_ENV)
                .map(PathBuf::from)
                .filter(|p| p.is_file()),
            tesseract: which::which("tesseract").ok(),
        };
        log::debug!("Discovered toolchain: {toolchain:?}");
        toolchain
    }

    /// Use an explicit converter jar instead of the environment.
    ///
    /// A path that does not exist leaves the jar unresolved.
    #[must_use]
    pub fn with_bdsup2sub_jar(mut self, jar: impl Into<PathBuf>) -> Self {
        let jar = jar.into();
        self.bdsup2sub = jar.is_file().then_some(jar);
        self
    }

    /// Use an explicit path for one tool.
    #[must_use]
    pub fn with_tool(mut self, tool: Tool, path: impl Into<PathBuf>) -> Self {
        let path = Some(path.into());
        match tool {
            Tool::MkvInfo => self.mkvinfo = path,
            Tool::MkvExtract => self.mkvextract = path,
            Tool::Java => self.java = path,
            Tool::BdSup2Sub => self.bdsup2sub = path,
            Tool::Tesseract => self.tesseract = path,
        }
        self
    }

    /// Where `tool` was found, if anywhere.
    pub fn locate(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::MkvInfo => self.mkvinfo.as_deref(),
            Tool::MkvExtract => self.mkvextract.as_deref(),
            Tool::Java => self.java.as_deref(),
            Tool::BdSup2Sub => self.bdsup2sub.as_deref(),
            Tool::Tesseract => self.tesseract.as_deref(),
        }
    }

    /// Resolve `tool` or fail with [`Sub2SrtError::MissingDependency`].
    pub fn require(&self, tool: Tool) -> Result<PathBuf, Sub2SrtError> {
        self.locate(tool)
            .map(Path::to_path_buf)
            .ok_or_else(|| Sub2SrtError::MissingDependency {
                tool: tool.to_string(),
                hint: tool.install_hint().to_string(),
            })
    }

    /// Availability of every tool, in pipeline order.
    pub fn report(&self) -> Vec<(Tool, Option<PathBuf>)> {
        Tool::ALL
            .iter()
            .map(|&tool| (tool, self.locate(tool).map(Path::to_path_buf)))
            .collect()
    }
}
