//! Compiler configuration (§6 "Configuration options").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppDomainConflictResolution {
    Fail,
    UseChild,
    UseParent,
}

impl Default for AppDomainConflictResolution {
    fn default() -> Self {
        // See DESIGN.md's Open Question decisions: `UseChild` is the only
        // policy that doesn't force every parent/child script pair sharing
        // a name to be treated as a hard conflict.
        Self::UseChild
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScriptInitializerRunMode {
    None,
    RunEntryPoints,
    RunAll,
}

impl Default for ScriptInitializerRunMode {
    fn default() -> Self {
        Self::RunAll
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegerArithmeticMode {
    Default,
    ExplicitOnly,
    Aggressive,
}

impl Default for IntegerArithmeticMode {
    fn default() -> Self {
        Self::Default
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub emit_assembly_name: Option<String>,
    /// `<= 1` disables parallelism; the scheduler runs phases 1-3
    /// sequentially on the calling thread.
    pub parallel_compile_threads: usize,
    pub app_domain_conflict_resolution: AppDomainConflictResolution,
    pub script_initializer_run_mode: ScriptInitializerRunMode,
    pub emit_property_definitions: bool,
    pub emit_param_names: bool,
    pub integer_arithmetic_mode: IntegerArithmeticMode,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            emit_assembly_name: None,
            // See DESIGN.md: matches rayon's own default pool sizing
            // convention rather than hard-coding a number here.
            parallel_compile_threads: std::thread::available_parallelism()
                .map(|n| n.get().min(8))
                .unwrap_or(1),
            app_domain_conflict_resolution: AppDomainConflictResolution::default(),
            script_initializer_run_mode: ScriptInitializerRunMode::default(),
            emit_property_definitions: true,
            emit_param_names: true,
            integer_arithmetic_mode: IntegerArithmeticMode::default(),
        }
    }
}

impl CompilerOptions {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel_compile_threads > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_enable_parallelism_when_multiple_cores_are_available() {
        let opts = CompilerOptions::default();
        assert!(opts.parallel_compile_threads >= 1);
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let opts = CompilerOptions::from_toml_str(
            r#"
            parallel_compile_threads = 1
            app_domain_conflict_resolution = "FAIL"
            "#,
        )
        .unwrap();
        assert_eq!(opts.parallel_compile_threads, 1);
        assert_eq!(
            opts.app_domain_conflict_resolution,
            AppDomainConflictResolution::Fail
        );
        assert!(!opts.is_parallel());
        // Untouched fields still take their defaults.
        assert_eq!(
            opts.script_initializer_run_mode,
            ScriptInitializerRunMode::RunAll
        );
    }
}
