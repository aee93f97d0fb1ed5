//! Profiler configuration.
//!
//! [`ProfilerConfig`] holds the soft limits of the identifier resolver, the trial size of the
//! argument query, what the enter handler captures, and which event categories are requested
//! from the runtime. A profiler is loaded into a process it does not control, so the usual way
//! to configure it is through environment variables, see [`ProfilerConfig::from_env`].

use crate::{arguments::ArgumentDescriptor, runtime::EventMask, Error, Result};

/// Configuration for one attached profiler.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProfilerConfig {
    /// Size in bytes of the first argument query buffer (default: header plus one range)
    pub trial_argument_size: usize,

    /// Maximum number of generic type arguments per class before resolution fails (default: 256)
    pub max_type_arguments: usize,

    /// Capacity of name buffers in UTF-16 units, longer names are truncated (default: 256)
    pub max_name_length: usize,

    /// Maximum nesting depth of generic arguments during resolution (default: 32)
    pub max_resolution_depth: usize,

    /// Prefix class names with their module name
    pub qualify_class_names: bool,

    /// Resolve the owning class name of entered functions
    pub resolve_class_names: bool,

    /// Resolve method names and argument descriptors on enter; disabling this reduces enter
    /// records to the function identity
    pub resolve_enter_details: bool,

    /// Copy the raw bytes of each argument range into the enter record
    pub capture_argument_bytes: bool,

    /// Event categories requested from the runtime during attach
    pub event_mask: EventMask,

    /// Maximum number of retained diagnostics (default: 4096)
    pub max_diagnostics: usize,

    /// Log level used when the profiler initialises its own logger
    pub log_level: log::LevelFilter,

    /// Initialise `env_logger` during attach
    pub init_logger: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            trial_argument_size: ArgumentDescriptor::size_for(1),
            max_type_arguments: 256,
            max_name_length: 256,
            max_resolution_depth: 32,
            qualify_class_names: false,
            resolve_class_names: true,
            resolve_enter_details: true,
            capture_argument_bytes: true,
            event_mask: EventMask::tracing(),
            max_diagnostics: 4096,
            log_level: log::LevelFilter::Info,
            init_logger: true,
        }
    }
}

impl ProfilerConfig {
    /// Creates an identity-only configuration
    ///
    /// Enter events only carry the function identity, no names are resolved and no argument
    /// memory is read. Hooks are still registered with full frame detail.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            resolve_class_names: false,
            resolve_enter_details: false,
            capture_argument_bytes: false,
            ..Self::default()
        }
    }

    /// Creates a configuration with module-qualified class names and debug logging
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            qualify_class_names: true,
            log_level: log::LevelFilter::Debug,
            ..Self::default()
        }
    }

    /// Loads the configuration from `ELTSCOPE_*` environment variables on top of the defaults
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable holds a malformed value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup
    ///
    /// Recognised keys: `ELTSCOPE_QUALIFY`, `ELTSCOPE_CAPTURE_ARGS`, `ELTSCOPE_CLASS_NAMES`,
    /// `ELTSCOPE_MAX_TYPE_ARGS`, `ELTSCOPE_MAX_NAME_LENGTH`, `ELTSCOPE_MAX_DEPTH`,
    /// `ELTSCOPE_LOG`. Booleans accept `1/0`, `true/false`, `yes/no`, `on/off`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable holds a malformed value or the resulting
    /// configuration fails [`ProfilerConfig::validate`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("ELTSCOPE_QUALIFY") {
            config.qualify_class_names = parse_bool("ELTSCOPE_QUALIFY", &value)?;
        }
        if let Some(value) = lookup("ELTSCOPE_CAPTURE_ARGS") {
            config.capture_argument_bytes = parse_bool("ELTSCOPE_CAPTURE_ARGS", &value)?;
        }
        if let Some(value) = lookup("ELTSCOPE_CLASS_NAMES") {
            config.resolve_class_names = parse_bool("ELTSCOPE_CLASS_NAMES", &value)?;
        }
        if let Some(value) = lookup("ELTSCOPE_MAX_TYPE_ARGS") {
            config.max_type_arguments = parse_usize("ELTSCOPE_MAX_TYPE_ARGS", &value)?;
        }
        if let Some(value) = lookup("ELTSCOPE_MAX_NAME_LENGTH") {
            config.max_name_length = parse_usize("ELTSCOPE_MAX_NAME_LENGTH", &value)?;
        }
        if let Some(value) = lookup("ELTSCOPE_MAX_DEPTH") {
            config.max_resolution_depth = parse_usize("ELTSCOPE_MAX_DEPTH", &value)?;
        }
        if let Some(value) = lookup("ELTSCOPE_LOG") {
            config.log_level = value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("ELTSCOPE_LOG: unknown level '{value}'")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the limits for values the tracer cannot operate with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.trial_argument_size < ArgumentDescriptor::HEADER_SIZE {
            return Err(Error::Config(format!(
                "trial_argument_size {} is smaller than the descriptor header ({})",
                self.trial_argument_size,
                ArgumentDescriptor::HEADER_SIZE
            )));
        }
        if self.max_name_length < 2 {
            return Err(Error::Config(
                "max_name_length must hold at least one character and a terminator".to_string(),
            ));
        }
        if self.max_resolution_depth == 0 {
            return Err(Error::Config(
                "max_resolution_depth must be at least 1".to_string(),
            ));
        }
        if self.max_type_arguments == 0 {
            return Err(Error::Config(
                "max_type_arguments must be at least 1".to_string(),
            ));
        }
        if self.max_diagnostics == 0 {
            return Err(Error::Config("max_diagnostics must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key}: expected a boolean, got '{value}'"))),
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: expected a number, got '{value}'")))
}
