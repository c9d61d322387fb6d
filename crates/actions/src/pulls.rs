//! Pull request lifecycle and review-comment handlers.

use repobot_core::action::ActionOutcome;
use repobot_core::host::{ItemState, ItemUpdate, LineComment, NewPullRequest, OperationContext};

pub async fn create_pull_request(
    ctx: &OperationContext,
    title: String,
    body: String,
    head: String,
    base: String,
) -> ActionOutcome {
    let pr = NewPullRequest {
        title: title.clone(),
        body,
        head,
        base,
    };
    match ctx.host.create_pull_request(&ctx.repo, pr).await {
        Ok(_) => ActionOutcome::ok(format!("Pull request '{title}' has been successfully created.")),
        Err(e) => ActionOutcome::failed(format!("Failed to create pull request. Error: {e}")),
    }
}

pub async fn update_pull_request(ctx: &OperationContext, number: u64, title: String, body: String) -> ActionOutcome {
    let update = ItemUpdate {
        title: Some(title),
        body: Some(body),
        state: None,
    };
    match ctx.host.update_pull_request(&ctx.repo, number, update).await {
        Ok(()) => ActionOutcome::ok(format!("Pull request #{number} has been successfully updated.")),
        Err(e) => ActionOutcome::failed(format!("Failed to update pull request. Error: {e}")),
    }
}

pub async fn close_pull_request(ctx: &OperationContext, number: u64) -> ActionOutcome {
    let update = ItemUpdate {
        state: Some(ItemState::Closed),
        ..Default::default()
    };
    match ctx.host.update_pull_request(&ctx.repo, number, update).await {
        Ok(()) => ActionOutcome::ok(format!("Pull request #{number} has been successfully closed.")),
        Err(e) => ActionOutcome::failed(format!("Failed to close pull request. Error: {e}")),
    }
}

pub async fn list_pull_requests(ctx: &OperationContext, state: ItemState) -> ActionOutcome {
    match ctx.host.list_pull_requests(&ctx.repo, state).await {
        Ok(pulls) => ActionOutcome::json(&pulls),
        Err(e) => ActionOutcome::failed(format!(
            "Failed to retrieve the list of pull requests. Error: {e}"
        )),
    }
}

/// A conversation comment (pull requests share the issue comment thread).
pub async fn add_comment(ctx: &OperationContext, number: u64, body: &str) -> ActionOutcome {
    match ctx.host.create_comment(&ctx.repo, number, body).await {
        Ok(()) => ActionOutcome::ok(format!(
            "Comment has been successfully added to pull request #{number}."
        )),
        Err(e) => ActionOutcome::failed(format!("Failed to add comment to pull request. Error: {e}")),
    }
}

pub async fn add_line_comment(
    ctx: &OperationContext,
    number: u64,
    commit_id: String,
    body: String,
    path: String,
    position: u64,
) -> ActionOutcome {
    let comment = LineComment {
        commit_id,
        body,
        path,
        position,
    };
    match ctx.host.create_line_comment(&ctx.repo, number, comment).await {
        Ok(()) => ActionOutcome::ok(format!(
            "Line comment has been successfully added to pull request #{number}."
        )),
        Err(e) => ActionOutcome::failed(format!(
            "Failed to add line comment to pull request. Error: {e}"
        )),
    }
}

pub async fn add_reply(ctx: &OperationContext, number: u64, comment_id: u64, body: &str) -> ActionOutcome {
    match ctx.host.reply_to_review_comment(&ctx.repo, number, comment_id, body).await {
        Ok(()) => ActionOutcome::ok(format!(
            "Reply has been successfully added to comment #{comment_id} on pull request #{number}."
        )),
        Err(e) => ActionOutcome::failed(format!("Failed to add reply to comment. Error: {e}")),
    }
}
