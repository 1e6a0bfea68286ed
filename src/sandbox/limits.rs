//! Resource limiting for the script engine.

use rhai::Engine;

/// Limits enforced on every module evaluation and listener invocation.
///
/// `max_operations` plays the role of an instruction budget: a module stuck
/// in a loop fails with a runtime error instead of freezing the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLimits {
    /// Maximum operations per evaluation (`None` for unlimited).
    pub max_operations: Option<u64>,
    /// Maximum nesting of function calls.
    pub max_call_levels: usize,
    /// Maximum expression nesting depth (global, inside functions).
    pub max_expr_depth: (usize, usize),
    /// Maximum string length in bytes (0 for unlimited).
    pub max_string_size: usize,
    /// Maximum array length (0 for unlimited).
    pub max_array_size: usize,
    /// Maximum object map size (0 for unlimited).
    pub max_map_size: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_operations: Some(50_000_000),
            max_call_levels: 64,
            max_expr_depth: (128, 64),
            max_string_size: 16 * 1024 * 1024, // 16MB
            max_array_size: 1_000_000,
            max_map_size: 1_000_000,
        }
    }
}

impl EngineLimits {
    /// Limits that only keep the engine from overflowing the native stack.
    pub fn unlimited() -> Self {
        Self {
            max_operations: None,
            max_string_size: 0,
            max_array_size: 0,
            max_map_size: 0,
            ..Self::default()
        }
    }

    /// Set the operation budget.
    pub fn with_max_operations(mut self, operations: u64) -> Self {
        self.max_operations = Some(operations);
        self
    }

    /// Apply the limits to an engine.
    pub fn apply(&self, engine: &mut Engine) {
        engine.set_max_operations(self.max_operations.unwrap_or(0));
        engine.set_max_call_levels(self.max_call_levels);
        engine.set_max_expr_depths(self.max_expr_depth.0, self.max_expr_depth.1);
        engine.set_max_string_size(self.max_string_size);
        engine.set_max_array_size(self.max_array_size);
        engine.set_max_map_size(self.max_map_size);
    }
}
