//! One-shot sandboxed script execution.

use std::time::Instant;

use rhai::{Dynamic, EvalAltResult, Position, Scope};
use tracing::{debug, info};

use crate::{
    config::EngineConfig,
    engine::build_engine,
    error::{Error, LimitKind, Result},
    fetch::HttpHelper,
    resultset::{ResultSet, ResultSetBuilder, RowLimit},
};

/// Executes scripts against a fixed configuration.
///
/// Every call to [`execute`](Self::execute) builds a fresh engine, a fresh
/// `resultset` builder, and a fresh `helper`. Nothing is shared between
/// executions, so an executor may serve concurrent calls from independent
/// threads.
pub struct ScriptExecutor {
    config: EngineConfig,
}

impl ScriptExecutor {
    /// Create an executor using the given limits.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The limits this executor applies.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one script to completion and return its result set.
    ///
    /// The script sees two scope bindings: `resultset` (schema and row
    /// emission) and `helper` (HTTP fetch). The row limit is applied on the
    /// host side after the script finishes; scripts never observe it.
    pub fn execute(&self, script: &str, limit: RowLimit) -> Result<ResultSet> {
        if script.trim().is_empty() {
            return Err(Error::InvalidArgument("script must not be empty".into()));
        }

        debug!(
            script_bytes = script.len(),
            memory_mb = self.config.limit_memory_mb(),
            timeout_secs = self.config.timeout().as_secs(),
            max_statements = self.config.max_statements(),
            "executing script"
        );

        let mut engine = build_engine(&self.config);

        engine.on_print(|text| info!(target: "script", "{text}"));
        engine.on_debug(|text, source, pos| {
            debug!(target: "script", ?source, line = pos.line(), "{text}")
        });

        let start = Instant::now();
        let timeout = self.config.timeout();
        engine.on_progress(move |_| {
            if start.elapsed() > timeout {
                Some(Dynamic::from(Error::ResourceExceeded {
                    kind: LimitKind::Timeout,
                }))
            } else {
                None
            }
        });

        let builder = ResultSetBuilder::new();
        register_host_objects(&mut engine);

        let mut scope = Scope::new();
        scope.push("resultset", builder.clone());
        scope.push("helper", HttpHelper::new());

        engine
            .run_with_scope(&mut scope, script)
            .map_err(|err| map_eval_error(*err))?;

        let set = builder.finalize(limit)?;
        debug!(
            columns = set.columns.len(),
            rows = set.rows.len(),
            "script finished"
        );
        Ok(set)
    }
}

/// Register the script-callable methods of the two capability objects.
fn register_host_objects(engine: &mut rhai::Engine) {
    engine.register_type_with_name::<ResultSetBuilder>("ResultSet");
    engine.register_fn(
        "declare_schema",
        |builder: &mut ResultSetBuilder, fields: rhai::Map| builder.declare_schema(fields),
    );
    engine.register_fn(
        "declare_schema",
        |builder: &mut ResultSetBuilder, fields: rhai::Array| {
            builder.declare_schema_pairs(fields).map_err(raise)
        },
    );
    engine.register_fn(
        "emit_row",
        |builder: &mut ResultSetBuilder, value: Dynamic| builder.emit_row(&value).map_err(raise),
    );

    engine.register_type_with_name::<HttpHelper>("HttpHelper");
    engine.register_fn("fetch", |helper: &mut HttpHelper, url: Dynamic| {
        helper.fetch(&url, None).map_err(raise)
    });
    engine.register_fn(
        "fetch",
        |helper: &mut HttpHelper, url: Dynamic, options: rhai::Map| {
            helper.fetch(&url, Some(&options)).map_err(raise)
        },
    );
}

/// Carry a host error through the interpreter as a typed payload so it can
/// be recovered intact after evaluation.
fn raise(err: Error) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(err),
        Position::NONE,
    ))
}

/// Translate an interpreter failure into the crate taxonomy, unwrapping
/// host-raised payloads and guard terminations.
fn map_eval_error(err: EvalAltResult) -> Error {
    let pos = err.position();
    match err {
        EvalAltResult::ErrorRuntime(token, _) | EvalAltResult::ErrorTerminated(token, _) => {
            match token.clone().try_cast::<Error>() {
                Some(host_err) => host_err,
                None => Error::ScriptRuntime {
                    message: token.to_string(),
                }
                .at(pos),
            }
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => map_eval_error(*inner),
        EvalAltResult::ErrorTooManyOperations(_) => Error::ResourceExceeded {
            kind: LimitKind::Statements,
        },
        EvalAltResult::ErrorDataTooLarge(..) => Error::ResourceExceeded {
            kind: LimitKind::Memory,
        },
        EvalAltResult::ErrorParsing(kind, _) => Error::Parse {
            message: kind.to_string(),
        }
        .at(pos),
        other => Error::ScriptRuntime {
            message: other.to_string(),
        },
    }
}
