//! Issue lifecycle handlers.

use repobot_core::action::ActionOutcome;
use repobot_core::host::{ItemState, ItemUpdate, OperationContext};

pub async fn create_issue(ctx: &OperationContext, title: &str, body: &str) -> ActionOutcome {
    match ctx.host.create_issue(&ctx.repo, title, body).await {
        Ok(_) => ActionOutcome::ok(format!(
            "Issue with title '{title}' has been successfully created."
        )),
        Err(e) => ActionOutcome::failed(format!("Error creating issue: {e}")),
    }
}

pub async fn update_issue(ctx: &OperationContext, number: u64, title: String, body: String) -> ActionOutcome {
    let update = ItemUpdate {
        title: Some(title),
        body: Some(body),
        state: None,
    };
    match ctx.host.update_issue(&ctx.repo, number, update).await {
        Ok(()) => ActionOutcome::ok(format!("Successfully updated issue #{number}.")),
        Err(e) => ActionOutcome::failed(format!("Error updating issue: {e}")),
    }
}

/// Issues cannot be deleted through the API; this closes them.
pub async fn close_issue(ctx: &OperationContext, number: u64) -> ActionOutcome {
    let update = ItemUpdate {
        state: Some(ItemState::Closed),
        ..Default::default()
    };
    match ctx.host.update_issue(&ctx.repo, number, update).await {
        Ok(()) => ActionOutcome::ok(format!("Successfully closed issue #{number}.")),
        Err(e) => ActionOutcome::failed(format!("Error closing issue: {e}")),
    }
}

pub async fn list_issues(ctx: &OperationContext, state: ItemState) -> ActionOutcome {
    match ctx.host.list_issues(&ctx.repo, state).await {
        Ok(issues) => ActionOutcome::json(&issues),
        Err(e) => ActionOutcome::failed(format!("Error fetching issue list: {e}")),
    }
}

pub async fn comment_on_issue(ctx: &OperationContext, number: u64, body: &str) -> ActionOutcome {
    match ctx.host.create_comment(&ctx.repo, number, body).await {
        Ok(()) => ActionOutcome::ok("Comment has been successfully posted!"),
        Err(e) => ActionOutcome::failed(format!("Failed to comment on issue: {e}")),
    }
}
