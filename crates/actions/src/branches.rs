//! Branch lifecycle handlers.

use repobot_core::action::ActionOutcome;
use repobot_core::host::OperationContext;

/// Create `branch_name` pointing at the head of `base_branch`.
pub async fn create_branch(ctx: &OperationContext, branch_name: &str, base_branch: &str) -> ActionOutcome {
    let sha = match ctx.host.branch_sha(&ctx.repo, base_branch).await {
        Ok(sha) => sha,
        Err(e) => return ActionOutcome::failed(format!("Error creating branch: {e}")),
    };
    match ctx.host.create_branch_ref(&ctx.repo, branch_name, &sha).await {
        Ok(()) => ActionOutcome::ok(format!(
            "Branch {branch_name} created successfully from {base_branch} with sha: {sha}"
        )),
        Err(e) => ActionOutcome::failed(format!("Error creating branch: {e}")),
    }
}

/// Move `branch_name` to the head of `new_base`.
pub async fn update_branch(ctx: &OperationContext, branch_name: &str, new_base: &str) -> ActionOutcome {
    let result = async {
        let sha = ctx.host.branch_sha(&ctx.repo, new_base).await?;
        ctx.host.update_branch_ref(&ctx.repo, branch_name, &sha).await
    }
    .await;
    match result {
        Ok(()) => ActionOutcome::ok(format!(
            "Branch {branch_name} updated successfully to base {new_base}"
        )),
        Err(e) => ActionOutcome::failed(format!("Error updating branch: {e}")),
    }
}

pub async fn delete_branch(ctx: &OperationContext, branch_name: &str) -> ActionOutcome {
    match ctx.host.delete_branch_ref(&ctx.repo, branch_name).await {
        Ok(()) => ActionOutcome::ok(format!("Branch {branch_name} deleted successfully")),
        Err(e) => ActionOutcome::failed(format!("Error deleting branch: {e}")),
    }
}

pub async fn list_branches(ctx: &OperationContext) -> ActionOutcome {
    match ctx.host.list_branches(&ctx.repo).await {
        Ok(names) => ActionOutcome::json(&names),
        Err(e) => ActionOutcome::failed(format!("Error listing branches: {e}")),
    }
}
