// ABOUTME: Locates the database command-line clients this tool drives
// ABOUTME: Searches PATH first, then OS-specific well-known install directories

use anyhow::{bail, Result};
use globset::{GlobBuilder, GlobMatcher};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use which::which;

/// Client binaries the checker reports on, with a display description
pub const KNOWN_TOOLS: &[(&str, &str)] = &[
    ("psql", "PostgreSQL Client"),
    ("mysql", "MySQL Client"),
    ("isql", "Firebird SQL Client"),
    ("sqlite3", "SQLite3 Client"),
];

/// Where a tool was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    /// Given explicitly on the command line or in the config file
    Explicit,
    /// Found through a PATH lookup
    Path,
    /// Found in one of the well-known install directories
    CommonDirectory,
}

/// A resolved client binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLocation {
    pub name: String,
    pub path: PathBuf,
    pub source: ToolSource,
}

/// The tool is neither on PATH nor in any well-known directory
#[derive(Debug, thiserror::Error)]
#[error(
    "Could not find '{tool}' in PATH or common directories.\n\
     \n\
     {hint}"
)]
pub struct ToolNotFound {
    pub tool: String,
    pub hint: &'static str,
}

/// A resolved tool could not be started
#[derive(Debug, thiserror::Error)]
#[error("Failed to execute {tool} at '{}'. Is it installed and executable?", .path.display())]
pub struct ToolFailedToStart {
    pub tool: String,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Wrap a spawn failure so callers can treat it as fatal
pub fn spawn_error(tool: &str, path: &Path, source: std::io::Error) -> anyhow::Error {
    ToolFailedToStart {
        tool: tool.to_string(),
        path: path.to_path_buf(),
        source,
    }
    .into()
}

/// Setup failures that end the whole run instead of skipping a table
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ToolNotFound>().is_some()
        || err.downcast_ref::<ToolFailedToStart>().is_some()
        || err.downcast_ref::<crate::encoding::DecodeError>().is_some()
}

/// Operating system families with their own install layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

/// Well-known directories to search when a tool is not on PATH
///
/// Windows entries may carry `*` wildcards standing for version numbers;
/// they are expanded against the file system at lookup time.
pub fn search_dirs(platform: Platform, tool: &str) -> &'static [&'static str] {
    match (platform, tool) {
        (Platform::MacOs, "psql") => &[
            "/Applications/Postgres.app/Contents/Versions/latest/bin",
            "/usr/local/bin",
            "/opt/homebrew/bin",
        ],
        (Platform::MacOs, "mysql") => &["/usr/local/mysql/bin", "/usr/local/bin", "/opt/homebrew/bin"],
        (Platform::MacOs, "isql") => &[
            "/Library/Frameworks/Firebird.framework/Versions/Current/Resources/bin",
            "/usr/local/bin",
            "/opt/firebird/bin",
        ],
        (Platform::MacOs, "sqlite3") => &["/usr/bin"],

        (Platform::Linux, "psql") => &["/usr/bin", "/usr/local/bin", "/opt/postgresql/bin"],
        (Platform::Linux, "mysql") => &["/usr/bin", "/usr/local/bin"],
        (Platform::Linux, "isql") => &["/opt/firebird/bin", "/usr/bin", "/usr/local/bin"],
        (Platform::Linux, "sqlite3") => &["/usr/bin"],

        (Platform::Windows, "psql") => &["C:\\Program Files\\PostgreSQL\\*\\bin"],
        (Platform::Windows, "mysql") => &["C:\\Program Files\\MySQL\\MySQL Server *\\bin"],
        (Platform::Windows, "isql") => &["C:\\Program Files\\Firebird\\Firebird_*"],
        (Platform::Windows, "sqlite3") => &["C:\\sqlite"],

        _ => &[],
    }
}

/// Executable names tried for a tool
///
/// Debian and Ubuntu install Firebird's isql as `isql-fb` to avoid a
/// clash with unixODBC.
pub fn candidate_names(tool: &str) -> Vec<&str> {
    match tool {
        "isql" => vec!["isql", "isql-fb"],
        other => vec![other],
    }
}

fn install_hint(tool: &str) -> &'static str {
    match tool {
        "psql" => {
            "Please install PostgreSQL client tools:\n\
             - Ubuntu/Debian: sudo apt-get install postgresql-client\n\
             - macOS: brew install postgresql\n\
             - RHEL/CentOS: sudo yum install postgresql\n\
             - Windows: Download from https://www.postgresql.org/download/windows/"
        }
        "isql" => {
            "Please install the Firebird client tools:\n\
             - Ubuntu/Debian: sudo apt-get install firebird3.0-utils\n\
             - macOS/Windows: install Firebird from https://firebirdsql.org/en/downloads/\n\
             Or pass the full path with --isql-path."
        }
        "sqlite3" => {
            "Please install the SQLite command-line shell:\n\
             - Ubuntu/Debian: sudo apt-get install sqlite3\n\
             - macOS: brew install sqlite\n\
             - Windows: Download from https://sqlite.org/download.html and place sqlite3.exe in C:\\sqlite"
        }
        "mysql" => {
            "Please install MySQL client tools:\n\
             - Ubuntu/Debian: sudo apt-get install mysql-client\n\
             - macOS: brew install mysql-client"
        }
        _ => "Please install it or pass its full path explicitly.",
    }
}

/// Locate a tool: PATH first, then the well-known directories
///
/// # Errors
///
/// Returns [`ToolNotFound`] (wrapped in `anyhow::Error`) when no candidate
/// exists. Callers treat this as fatal.
///
/// # Examples
///
/// ```no_run
/// # use tablehop::tools::locate_tool;
/// # fn example() -> anyhow::Result<()> {
/// let psql = locate_tool("psql")?;
/// println!("psql at {}", psql.path.display());
/// # Ok(())
/// # }
/// ```
pub fn locate_tool(tool: &str) -> Result<ToolLocation> {
    if let Some(path) = find_on_path(tool) {
        return Ok(ToolLocation {
            name: tool.to_string(),
            path,
            source: ToolSource::Path,
        });
    }

    tracing::debug!("'{}' not on PATH, searching common directories", tool);

    if let Some(path) = find_in_dirs(tool, search_dirs(Platform::current(), tool)) {
        return Ok(ToolLocation {
            name: tool.to_string(),
            path,
            source: ToolSource::CommonDirectory,
        });
    }

    Err(ToolNotFound {
        tool: tool.to_string(),
        hint: install_hint(tool),
    }
    .into())
}

/// Resolve a tool, preferring an explicit path when one is configured
pub fn resolve_tool(tool: &str, explicit: Option<&Path>) -> Result<ToolLocation> {
    match explicit {
        Some(path) => {
            if !path.is_file() {
                bail!(
                    "The {} executable was not found at '{}'. Please check the path.",
                    tool,
                    path.display()
                );
            }
            Ok(ToolLocation {
                name: tool.to_string(),
                path: path.to_path_buf(),
                source: ToolSource::Explicit,
            })
        }
        None => locate_tool(tool),
    }
}

/// PATH lookup over every candidate name of the tool
pub fn find_on_path(tool: &str) -> Option<PathBuf> {
    candidate_names(tool)
        .into_iter()
        .find_map(|name| which(name).ok())
}

/// Search directories (wildcards allowed) for the tool binary
///
/// A directory matches when it contains `<name>` or `<name>.exe` as a
/// regular file.
pub fn find_in_dirs<S: AsRef<str>>(tool: &str, dirs: &[S]) -> Option<PathBuf> {
    for pattern in dirs {
        for dir in expand_dir_pattern(pattern.as_ref()) {
            for name in candidate_names(tool) {
                let plain = dir.join(name);
                if plain.is_file() {
                    return Some(plain);
                }
                let exe = dir.join(format!("{}.exe", name));
                if exe.is_file() {
                    return Some(exe);
                }
            }
        }
    }
    None
}

/// Expand `*`/`?` wildcards in directory components
///
/// Components without wildcards are appended verbatim; wildcard
/// components are matched against the entries of every directory built
/// so far. Results are sorted so the newest-looking version names come
/// last in lexical order.
pub fn expand_dir_pattern(pattern: &str) -> Vec<PathBuf> {
    if !pattern.contains(['*', '?']) {
        return vec![PathBuf::from(pattern)];
    }

    let mut bases = vec![PathBuf::new()];

    for component in Path::new(pattern).components() {
        let part = component.as_os_str().to_string_lossy();
        let is_wildcard = matches!(component, Component::Normal(_)) && part.contains(['*', '?']);

        if !is_wildcard {
            for base in &mut bases {
                base.push(component.as_os_str());
            }
            continue;
        }

        let Some(matcher) = component_matcher(&part) else {
            tracing::debug!("Ignoring unusable search pattern '{}'", pattern);
            return Vec::new();
        };

        let mut next = Vec::new();
        for base in &bases {
            let Ok(entries) = std::fs::read_dir(base) else {
                continue;
            };
            let mut matched: Vec<PathBuf> = entries
                .flatten()
                .filter(|entry| entry.path().is_dir())
                .filter(|entry| matcher.is_match(entry.file_name()))
                .map(|entry| entry.path())
                .collect();
            matched.sort();
            next.extend(matched);
        }
        bases = next;
    }

    bases
}

/// Compile one wildcard path component into a matcher
///
/// Windows directory names compare case-insensitively. An unparsable
/// component yields `None` and matches nothing.
pub fn component_matcher(part: &str) -> Option<GlobMatcher> {
    GlobBuilder::new(part)
        .case_insensitive(cfg!(windows))
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .ok()
}
