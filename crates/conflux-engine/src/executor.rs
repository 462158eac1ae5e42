//! Plan execution — the per-request run loop.
//!
//! Iterates the plan layer by layer. By default dispatch is strictly
//! sequential in plan order; when the flow opts into parallel execution,
//! blocks of the same layer dispatch concurrently and this coordinating
//! task remains the only writer into `context.results`, so for any
//! connection `a -> b`, `a`'s result is fully recorded before `b`'s
//! inputs resolve.

use tokio::time::Instant;

use crate::cache::DefinitionCache;
use crate::dispatcher::{failure_result, DispatchPolicy, Dispatcher};
use crate::errors::{BlockError, EngineError};
use crate::planner::ExecutionPlan;
use crate::resolver::{self, ExpressionMode};
use crate::types::{BlockExecutionResult, BlockInstance, BlockStatus, ExecutionContext, FlowDef};

pub(crate) struct RunParams<'a> {
    pub defs: &'a DefinitionCache,
    pub dispatcher: &'a Dispatcher,
    pub flow: &'a FlowDef,
    pub plan: &'a ExecutionPlan,
    pub expression_mode: ExpressionMode,
    pub default_block_timeout_ms: u64,
    pub is_test: bool,
}

/// Run every layer of the plan to completion or first fatal failure.
///
/// A block failure is fatal unless its instance set `continue_on_error`;
/// contained failures are recorded and downstream mappings from them
/// resolve to nothing. Flow-level `error_handling` values other than
/// `stop` are reserved and behave as `stop`.
pub(crate) async fn run_plan(
    params: &RunParams<'_>,
    ctx: &mut ExecutionContext,
) -> Result<(), EngineError> {
    for layer in &params.plan.layers {
        if params.flow.config.parallel && layer.len() > 1 {
            run_layer_parallel(params, layer, ctx).await?;
        } else {
            run_layer_sequential(params, layer, ctx).await?;
        }
    }
    Ok(())
}

async fn run_layer_sequential(
    params: &RunParams<'_>,
    layer: &[String],
    ctx: &mut ExecutionContext,
) -> Result<(), EngineError> {
    for id in layer {
        let Some(instance) = find_instance(params.flow, id) else {
            continue;
        };
        let (instance_id, result) = run_block(params, instance, ctx).await?;
        let aborts = result.status == BlockStatus::Failure && !continues_on_error(instance);
        ctx.record(instance_id.clone(), result);
        if aborts {
            return Err(fatal_failure(&instance_id, &ctx.results[&instance_id]));
        }
    }
    Ok(())
}

/// Dispatch one layer concurrently. Siblings have no ordering between
/// themselves; a fatal failure aborts after the whole layer has been
/// awaited and recorded, reporting the first failure in layer order.
async fn run_layer_parallel(
    params: &RunParams<'_>,
    layer: &[String],
    ctx: &mut ExecutionContext,
) -> Result<(), EngineError> {
    let instances: Vec<&BlockInstance> = layer
        .iter()
        .filter_map(|id| find_instance(params.flow, id))
        .collect();

    let ctx_ref: &ExecutionContext = ctx;
    let outcomes = futures::future::join_all(
        instances
            .iter()
            .map(|instance| run_block(params, instance, ctx_ref)),
    )
    .await;

    for outcome in outcomes {
        let (instance_id, result) = outcome?;
        ctx.record(instance_id, result);
    }

    for instance in instances {
        let Some(result) = ctx.results.get(&instance.id) else {
            continue;
        };
        if result.status == BlockStatus::Failure && !continues_on_error(instance) {
            return Err(fatal_failure(&instance.id, result));
        }
    }
    Ok(())
}

/// Resolve inputs and dispatch one block. Definition lookups go through
/// the cache; a missing definition is a per-block failure (containment
/// applies), a store error is fatal to the flow.
async fn run_block(
    params: &RunParams<'_>,
    instance: &BlockInstance,
    ctx: &ExecutionContext,
) -> Result<(String, BlockExecutionResult), EngineError> {
    let start = Instant::now();

    let Some(def) = params.defs.block(&instance.block_id).await? else {
        let error = BlockError::DefMissing {
            id: instance.block_id.clone(),
        };
        return Ok((instance.id.clone(), failure_result(&error, None, elapsed(start))));
    };

    let inputs = match resolver::resolve_inputs(instance, ctx, params.expression_mode) {
        Ok(inputs) => inputs,
        Err(error) => {
            return Ok((instance.id.clone(), failure_result(&error, None, elapsed(start))))
        }
    };

    let policy = DispatchPolicy::resolve(
        instance.config.as_ref(),
        &params.flow.config,
        params.default_block_timeout_ms,
    );
    let result = params
        .dispatcher
        .dispatch(&def, &instance.id, &inputs, policy, params.is_test)
        .await;
    Ok((instance.id.clone(), result))
}

fn find_instance<'a>(flow: &'a FlowDef, id: &str) -> Option<&'a BlockInstance> {
    flow.blocks.iter().find(|b| b.id == id)
}

fn continues_on_error(instance: &BlockInstance) -> bool {
    instance
        .config
        .as_ref()
        .map(|c| c.continue_on_error)
        .unwrap_or(false)
}

fn fatal_failure(block_id: &str, result: &BlockExecutionResult) -> EngineError {
    let (code, message) = result
        .error
        .as_ref()
        .map(|e| {
            (
                e.code.clone().unwrap_or_else(|| "EXECUTION_ERROR".into()),
                e.message.clone(),
            )
        })
        .unwrap_or_else(|| ("EXECUTION_ERROR".into(), "block failed".into()));
    EngineError::BlockFailed {
        block_id: block_id.to_string(),
        code,
        message,
    }
}

fn elapsed(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
