//! Runner housekeeping commands.

use std::error::Error;

use tracing::{error, info, warn};

use ghrunner_github::CiPlatform;

/// Print every runner carrying `label`.
pub async fn list_runners(platform: &dyn CiPlatform, label: &str) -> Result<(), Box<dyn Error>> {
    let runners = platform.find_runners_by_label(label).await?;

    println!("Runners labeled {label} ({}):", runners.len());
    println!("{:<12}  {:<40}  {}", "ID", "NAME", "STATUS");
    println!("{}", "-".repeat(64));

    for runner in runners {
        println!("{:<12}  {:<40}  {}", runner.id, runner.name, runner.status);
    }

    Ok(())
}

/// Remove every runner carrying `label`.
///
/// Keeps going past individual failures and reports them together at the end.
pub async fn remove_runners(platform: &dyn CiPlatform, label: &str) -> Result<(), Box<dyn Error>> {
    let runners = platform.find_runners_by_label(label).await?;
    if runners.is_empty() {
        warn!(label, "No runner carries this label");
        return Ok(());
    }

    let total = runners.len();
    let mut failed = 0;
    for runner in runners {
        match platform.remove_runner(runner.id).await {
            Ok(()) => info!(runner_id = %runner.id, name = %runner.name, "Removed runner"),
            Err(e) => {
                failed += 1;
                error!(runner_id = %runner.id, name = %runner.name, error = %e, "Failed to remove runner");
            }
        }
    }

    if failed > 0 {
        return Err(format!("failed to remove {failed} of {total} runners labeled {label}").into());
    }
    Ok(())
}
