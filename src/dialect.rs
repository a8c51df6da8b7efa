use std::fmt;

/// Exact first line of a Linux overlay capture
pub const LINUX_OVERLAY_HEADER: &str = "os,cpu,gpu,ram,kernel,driver,cpuscheduler";

/// Marker contained in the first line of a Windows hardware-monitor log
pub const WINDOWS_MONITOR_MARKER: &str = ", Hardware monitoring log v";

/// The capture dialects the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Linux overlay CSV
    LinuxOverlay,
    /// Windows hardware-monitor log
    WindowsMonitor,
}

impl Dialect {
    /// Identify the dialect from the first line of an upload
    ///
    /// Trailing commas and whitespace are ignored. The overlay header must
    /// match exactly; the monitor marker may appear anywhere in the line.
    /// Returns `None` for anything else.
    pub fn detect(first_line: &str) -> Option<Dialect> {
        let line = first_line.trim_end_matches(|c: char| c == ',' || c.is_whitespace());

        if line == LINUX_OVERLAY_HEADER {
            Some(Dialect::LinuxOverlay)
        } else if line.contains(WINDOWS_MONITOR_MARKER) {
            Some(Dialect::WindowsMonitor)
        } else {
            None
        }
    }

    /// File suffix stripped from the upload name to form the run label
    pub fn label_suffix(self) -> &'static str {
        match self {
            Dialect::LinuxOverlay => ".csv",
            Dialect::WindowsMonitor => ".hml",
        }
    }

    /// Build the run label for an upload named `filename`
    pub fn label_for(self, filename: &str) -> String {
        filename
            .strip_suffix(self.label_suffix())
            .unwrap_or(filename)
            .to_string()
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::LinuxOverlay => write!(f, "linux-overlay"),
            Dialect::WindowsMonitor => write!(f, "windows-monitor"),
        }
    }
}
