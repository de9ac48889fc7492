//! Runtime configuration.

use std::env;
use std::time::Duration;

use crate::event::EventPriority;

/// Default time the run loop waits for terminal input per iteration.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Terminal settings applied while a [`System`](crate::System) is alive.
///
/// The default is the managed mode every widget expects: unbuffered,
/// unechoed input with extended keys and mouse reporting, and no visible
/// cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalMode {
    /// Deliver input line by line instead of per key.
    pub line_buffering: bool,
    /// Echo typed characters back to the screen.
    pub echo: bool,
    /// Report function, arrow and keypad keys as escape sequences.
    pub extended_keys: bool,
    /// Report mouse buttons and wheel.
    pub mouse_tracking: bool,
    /// Show the hardware cursor.
    pub cursor_visible: bool,
}

impl Default for TerminalMode {
    fn default() -> Self {
        Self {
            line_buffering: false,
            echo: false,
            extended_keys: true,
            mouse_tracking: true,
            cursor_visible: false,
        }
    }
}

/// Configuration for a [`System`](crate::System).
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// Terminal mode entered at construction.
    pub terminal_mode: TerminalMode,
    /// Longest a run loop iteration blocks waiting for input.
    pub poll_interval: Duration,
    /// Priority of input and resize events posted to the head node.
    pub input_priority: i32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            terminal_mode: TerminalMode::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            input_priority: EventPriority::High.into(),
        }
    }
}

impl SystemConfig {
    /// Build a configuration from `TERMWEAVE_*` environment variables.
    ///
    /// - `TERMWEAVE_MOUSE=0` disables mouse tracking.
    /// - `TERMWEAVE_CURSOR=1` keeps the cursor visible.
    /// - `TERMWEAVE_POLL_MS=<n>` sets the input poll interval.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(mouse) = flag(&lookup, "TERMWEAVE_MOUSE") {
            config.terminal_mode.mouse_tracking = mouse;
        }
        if let Some(cursor) = flag(&lookup, "TERMWEAVE_CURSOR") {
            config.terminal_mode.cursor_visible = cursor;
        }
        if let Some(ms) = lookup("TERMWEAVE_POLL_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            config.poll_interval = Duration::from_millis(ms);
        }
        config
    }

    /// Set the terminal mode.
    pub fn with_terminal_mode(mut self, mode: TerminalMode) -> Self {
        self.terminal_mode = mode;
        self
    }

    /// Set the input poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the priority of posted input events.
    pub fn with_input_priority(mut self, priority: impl Into<i32>) -> Self {
        self.input_priority = priority.into();
        self
    }
}

fn flag<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key)?.trim() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_is_managed_mode() {
        let mode = TerminalMode::default();
        assert!(!mode.line_buffering);
        assert!(!mode.echo);
        assert!(mode.extended_keys);
        assert!(mode.mouse_tracking);
        assert!(!mode.cursor_visible);
    }

    #[test]
    fn test_empty_env_keeps_defaults() {
        let config = SystemConfig::from_lookup(lookup(&[]));
        assert_eq!(config.terminal_mode, TerminalMode::default());
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.input_priority, 1);
    }

    #[test]
    fn test_env_overrides() {
        let config = SystemConfig::from_lookup(lookup(&[
            ("TERMWEAVE_MOUSE", "0"),
            ("TERMWEAVE_CURSOR", "true"),
            ("TERMWEAVE_POLL_MS", " 5 "),
        ]));
        assert!(!config.terminal_mode.mouse_tracking);
        assert!(config.terminal_mode.cursor_visible);
        assert_eq!(config.poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_garbage_values_ignored() {
        let config = SystemConfig::from_lookup(lookup(&[
            ("TERMWEAVE_MOUSE", "maybe"),
            ("TERMWEAVE_POLL_MS", "soon"),
        ]));
        assert!(config.terminal_mode.mouse_tracking);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_builder_methods() {
        let config = SystemConfig::default()
            .with_poll_interval(Duration::ZERO)
            .with_input_priority(EventPriority::Critical)
            .with_terminal_mode(TerminalMode {
                echo: true,
                ..TerminalMode::default()
            });
        assert_eq!(config.poll_interval, Duration::ZERO);
        assert_eq!(config.input_priority, 2);
        assert!(config.terminal_mode.echo);
    }
}
