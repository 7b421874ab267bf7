//! Waits on self-hosted runner registration.
//!
//! Runner registration is asynchronous on the platform side: a freshly booted
//! instance shows up by label some time after creation, starts `offline`, and
//! de-registers on its own once its single job is done.

use ghrunner_core::{await_condition, ErrorAction, PollBudget, Runner, RunnerId};
use ghrunner_github::{CiPlatform, PlatformError};
use tracing::{debug, info};

use crate::config::Timings;
use crate::error::TendError;

const APPEAR: &str = "wait for the runner to appear";
const DEREGISTER: &str = "wait for the runner to be de-registered";

fn retry_not_found(e: &PlatformError) -> ErrorAction {
    if e.is_not_found() {
        ErrorAction::Retry
    } else {
        ErrorAction::Abort
    }
}

/// Wait until exactly one runner carries `label`.
///
/// No match yet is retried; more than one match aborts at once.
pub async fn await_runner_appears(
    platform: &dyn CiPlatform,
    label: &str,
    budget: PollBudget,
) -> Result<Runner, TendError> {
    await_condition(
        APPEAR,
        label,
        budget,
        || platform.find_one_runner_by_label(label),
        |_: &Runner| true,
        retry_not_found,
    )
    .await?
    .into_reached()
    .ok_or_else(|| TendError::ResourceNotFound {
        operation: APPEAR.to_string(),
        resource: label.to_string(),
    })
}

/// Wait until runner `id` reports a state other than `initial`.
///
/// The runner is known to exist, so any probe error is fatal.
pub async fn await_state_left(
    platform: &dyn CiPlatform,
    id: RunnerId,
    initial: &str,
    budget: PollBudget,
) -> Result<Runner, TendError> {
    let operation = format!("wait for the runner to leave {initial:?} state");
    let resource = format!("runner {id}");
    let outcome = await_condition(
        &operation,
        &resource,
        budget,
        || platform.get_runner(id),
        |r: &Runner| r.status != initial,
        |_: &PlatformError| ErrorAction::Abort,
    )
    .await?;

    outcome.into_reached().ok_or(TendError::ResourceNotFound {
        operation,
        resource,
    })
}

/// Wait until runner `id` reports state `target`.
pub async fn await_state_equal(
    platform: &dyn CiPlatform,
    id: RunnerId,
    target: &str,
    budget: PollBudget,
) -> Result<Runner, TendError> {
    let operation = format!("wait for the runner to enter {target:?} state");
    let resource = format!("runner {id}");
    let outcome = await_condition(
        &operation,
        &resource,
        budget,
        || platform.get_runner(id),
        |r: &Runner| r.status == target,
        |_: &PlatformError| ErrorAction::Abort,
    )
    .await?;

    outcome.into_reached().ok_or(TendError::ResourceNotFound {
        operation,
        resource,
    })
}

/// Wait until runner `id` is gone.
///
/// A not-found probe is the awaited outcome; any other error is fatal.
pub async fn await_disappearance(
    platform: &dyn CiPlatform,
    id: RunnerId,
    budget: PollBudget,
) -> Result<(), TendError> {
    await_condition(
        DEREGISTER,
        &format!("runner {id}"),
        budget,
        || platform.get_runner(id),
        |_: &Runner| false,
        |e: &PlatformError| {
            if e.is_not_found() {
                ErrorAction::Accept
            } else {
                ErrorAction::Abort
            }
        },
    )
    .await?;
    Ok(())
}

/// Wait for the runner labeled `label` to register and come online.
pub async fn wait_for_runner_to_become_active(
    platform: &dyn CiPlatform,
    label: &str,
    timings: &Timings,
) -> Result<Runner, TendError> {
    let runner = await_runner_appears(platform, label, timings.appear).await?;
    debug!(label, runner_id = %runner.id, "Runner registered");

    let runner = await_state_left(platform, runner.id, Runner::OFFLINE, timings.activate).await?;
    info!(label, runner_id = %runner.id, status = %runner.status, "Runner is active");
    Ok(runner)
}

/// Wait for the runner labeled `label` to go `offline`.
pub async fn wait_for_runner_offline(
    platform: &dyn CiPlatform,
    label: &str,
    budget: PollBudget,
) -> Result<Runner, TendError> {
    let runner = platform
        .find_one_runner_by_label(label)
        .await
        .map_err(|e| TendError::lookup("find the runner", label, e))?;

    await_state_equal(platform, runner.id, Runner::OFFLINE, budget).await
}

/// Wait for the runner labeled `label` to de-register.
///
/// A runner that can no longer be found by label has already de-registered.
pub async fn wait_for_runner_to_be_deregistered(
    platform: &dyn CiPlatform,
    label: &str,
    budget: PollBudget,
) -> Result<(), TendError> {
    let runner = match platform.find_one_runner_by_label(label).await {
        Ok(runner) => runner,
        Err(e) if e.is_not_found() => {
            debug!(label, "Runner already de-registered");
            return Ok(());
        }
        Err(e) => return Err(TendError::lookup(DEREGISTER, label, e)),
    };

    await_disappearance(platform, runner.id, budget).await?;
    info!(label, runner_id = %runner.id, "Runner de-registered");
    Ok(())
}
