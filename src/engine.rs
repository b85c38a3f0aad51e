use rhai::{
    packages::{Package, StandardPackage},
    Engine,
};

use crate::config::EngineConfig;

/// Build a sandboxed engine for one execution.
///
/// The engine is raw plus the standard package only: scripts get arithmetic,
/// strings, arrays, and maps, but no module loading and no host I/O beyond
/// the capability objects the executor injects.
///
/// rhai has no byte-accounting hook, so the configured memory ceiling is
/// enforced as per-value data caps derived from the megabyte budget. The
/// statement budget maps to the engine's operation counter, its native
/// between-operations preemption point.
pub(crate) fn build_engine(config: &EngineConfig) -> Engine {
    let mut engine = Engine::new_raw();
    engine.register_global_module(StandardPackage::new().as_shared_module());

    engine.set_max_strings_interned(1024);
    engine.set_strict_variables(true);
    engine.set_fail_on_invalid_map_property(true);

    engine.set_max_operations(config.max_statements());
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 32);

    // limit_memory_mb is validated to at most 1000, so this cannot overflow.
    let budget_bytes = (config.limit_memory_mb() as usize) << 20;
    engine.set_max_string_size(budget_bytes);
    engine.set_max_array_size(budget_bytes / 16);
    engine.set_max_map_size(budget_bytes / 32);

    engine
}
