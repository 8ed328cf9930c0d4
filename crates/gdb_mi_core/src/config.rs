use std::time::Duration;

const DEFAULT_GDB_PATH: &str = "gdb";
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MiConfig {
    /// Debugger binary; a bare name is resolved through `PATH`.
    pub gdb_path: String,
    pub gdb_args: Vec<String>,
    pub command_timeout: Duration,
    pub shutdown_grace: Duration,
}

fn default_gdb_args() -> Vec<String> {
    vec!["--interpreter=mi3".to_string(), "-q".to_string()]
}

impl Default for MiConfig {
    fn default() -> Self {
        Self {
            gdb_path: DEFAULT_GDB_PATH.to_string(),
            gdb_args: default_gdb_args(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl MiConfig {
    pub fn new(gdb_path: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            gdb_path: gdb_path.into(),
            command_timeout,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let gdb_path = std::env::var("GDB_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GDB_PATH.to_string());

        let command_timeout = std::env::var("GDB_TIMEOUT")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT);

        Self {
            gdb_path,
            command_timeout,
            ..Self::default()
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MiConfig::default();
        assert_eq!(config.gdb_path, "gdb");
        assert_eq!(config.gdb_args, vec!["--interpreter=mi3", "-q"]);
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_new_config() {
        let config = MiConfig::new("/opt/gdb/bin/gdb", Duration::from_secs(10));
        assert_eq!(config.gdb_path, "/opt/gdb/bin/gdb");
        assert_eq!(config.command_timeout, Duration::from_secs(10));
        assert_eq!(config.gdb_args, vec!["--interpreter=mi3", "-q"]);
    }

    // Both env cases live in one test so they cannot race each other.
    #[test]
    fn test_from_env() {
        std::env::remove_var("GDB_PATH");
        std::env::remove_var("GDB_TIMEOUT");

        let config = MiConfig::from_env();
        assert_eq!(config.gdb_path, "gdb");
        assert_eq!(config.command_timeout, Duration::from_secs(30));

        std::env::set_var("GDB_PATH", "/usr/local/bin/gdb-multiarch");
        std::env::set_var("GDB_TIMEOUT", "5");

        let config = MiConfig::from_env();
        assert_eq!(config.gdb_path, "/usr/local/bin/gdb-multiarch");
        assert_eq!(config.command_timeout, Duration::from_secs(5));

        std::env::set_var("GDB_TIMEOUT", "not-a-number");
        let config = MiConfig::from_env();
        assert_eq!(config.command_timeout, Duration::from_secs(30));

        std::env::remove_var("GDB_PATH");
        std::env::remove_var("GDB_TIMEOUT");
    }
}
