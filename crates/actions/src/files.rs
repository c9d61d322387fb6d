//! Reader and writer handlers: tree listing, file reads, writes and deletes.

use repobot_core::action::ActionOutcome;
use repobot_core::error::HostError;
use repobot_core::host::{Contents, EntryKind, FileWrite, OperationContext};
use tracing::debug;

pub async fn repo_file_tree(ctx: &OperationContext, branch: &str, start_path: &str) -> ActionOutcome {
    match ctx.host.file_tree(&ctx.repo, branch, start_path).await {
        Ok(entries) => ActionOutcome::json(&entries),
        Err(e) => ActionOutcome::failed(format!("Failed to fetch repo tree: {e}")),
    }
}

pub async fn read_file(ctx: &OperationContext, branch: &str, file_path: &str) -> ActionOutcome {
    match ctx.host.contents(&ctx.repo, branch, file_path).await {
        Ok(Contents::File { content, .. }) => ActionOutcome::ok(content),
        Ok(Contents::Directory(_)) | Err(HostError::NotAFile) => {
            ActionOutcome::failed("Content not found in data object")
        }
        Err(e) => ActionOutcome::failed(format!("Failed to read file: {e}")),
    }
}

/// Write a file, creating it when the path does not exist yet.
pub async fn create_or_update_file(
    ctx: &OperationContext,
    branch: String,
    file_path: String,
    content: String,
    commit_message: String,
) -> ActionOutcome {
    let sha = match ctx.host.contents(&ctx.repo, &branch, &file_path).await {
        Ok(Contents::File { sha, .. }) => Some(sha),
        Ok(Contents::Directory(_)) => {
            return ActionOutcome::failed(
                "Error fetching file: the specified path is a folder, not a file",
            );
        }
        Err(e) if e.status() == Some(404) => None,
        Err(e) => return ActionOutcome::failed(format!("Error fetching file: {e}")),
    };

    let write = FileWrite {
        branch,
        path: file_path,
        content,
        message: commit_message,
        sha,
    };
    match ctx.host.put_file(&ctx.repo, write).await {
        Ok(()) => ActionOutcome::ok("File has been successfully created or updated!"),
        Err(e) => ActionOutcome::failed(format!("Failed to create or update file: {e}")),
    }
}

pub async fn delete_file(
    ctx: &OperationContext,
    branch: &str,
    file_path: &str,
    commit_message: &str,
) -> ActionOutcome {
    match remove_file(ctx, branch, file_path, commit_message).await {
        Ok(()) => ActionOutcome::ok("File has been successfully deleted!"),
        Err(e) => ActionOutcome::failed(format!("Failed to delete file: {e}")),
    }
}

async fn remove_file(
    ctx: &OperationContext,
    branch: &str,
    file_path: &str,
    commit_message: &str,
) -> Result<(), String> {
    let sha = match ctx.host.contents(&ctx.repo, branch, file_path).await {
        Ok(Contents::File { sha, .. }) => sha,
        Ok(Contents::Directory(_)) | Err(HostError::NotAFile) => {
            return Err(
                "The specified path is not a file or the file SHA could not be obtained.".into(),
            );
        }
        Err(e) => return Err(e.to_string()),
    };
    ctx.host
        .delete_file(&ctx.repo, branch, file_path, &sha, commit_message)
        .await
        .map_err(|e| e.to_string())
}

/// Delete every file below `folder_path`, descending into subfolders.
pub async fn delete_files_in_folder(
    ctx: &OperationContext,
    branch: &str,
    folder_path: &str,
    commit_message: &str,
) -> ActionOutcome {
    let mut pending = match ctx.host.contents(&ctx.repo, branch, folder_path).await {
        Ok(Contents::Directory(entries)) => entries,
        Ok(Contents::File { .. }) | Err(HostError::NotAFile) => {
            return ActionOutcome::failed("The specified path is not a folder.");
        }
        Err(e) => return ActionOutcome::failed(format!("Failed to delete folder contents: {e}")),
    };
    pending.reverse();

    let mut failures: Vec<String> = Vec::new();
    while let Some(entry) = pending.pop() {
        match entry.kind {
            EntryKind::File => {
                debug!(path = %entry.path, "Deleting file");
                if let Err(e) = remove_file(ctx, branch, &entry.path, commit_message).await {
                    failures.push(format!("{}: {e}", entry.path));
                }
            }
            EntryKind::Dir => match ctx.host.contents(&ctx.repo, branch, &entry.path).await {
                Ok(Contents::Directory(children)) => pending.extend(children.into_iter().rev()),
                Ok(Contents::File { .. }) => {}
                Err(e) => failures.push(format!("{}: {e}", entry.path)),
            },
            EntryKind::Symlink | EntryKind::Submodule => {}
        }
    }

    if failures.is_empty() {
        ActionOutcome::ok("Folder and its contents have been successfully deleted!")
    } else {
        ActionOutcome::failed(format!(
            "Failed to delete folder contents: {}",
            failures.join("; ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repobot_core::host::RepoRef;
    use repobot_core::host::testing::InMemoryHost;
    use std::sync::Arc;

    fn ctx(host: Arc<InMemoryHost>) -> OperationContext {
        OperationContext::new(host, RepoRef::new("octo", "demo"))
    }

    #[tokio::test]
    async fn read_existing_file() {
        let host = Arc::new(InMemoryHost::new().with_file("main", "README.md", "# Demo\nteh typo"));
        let out = read_file(&ctx(host), "main", "README.md").await;
        assert!(!out.is_error);
        assert_eq!(out.content, "# Demo\nteh typo");
    }

    #[tokio::test]
    async fn read_missing_file_narrates_error() {
        let host = Arc::new(InMemoryHost::new());
        let out = read_file(&ctx(host), "main", "nope.md").await;
        assert!(out.is_error);
        assert_eq!(out.content, "Failed to read file: Not Found");
    }

    #[tokio::test]
    async fn read_directory_is_not_content() {
        let host = Arc::new(InMemoryHost::new().with_file("main", "docs/a.md", "a"));
        let out = read_file(&ctx(host), "main", "docs").await;
        assert!(out.is_error);
        assert_eq!(out.content, "Content not found in data object");
    }

    #[tokio::test]
    async fn create_then_update_file() {
        let host = Arc::new(InMemoryHost::new());
        let c = ctx(host.clone());
        let out = create_or_update_file(&c, "main".into(), "new.txt".into(), "v1".into(), "add".into()).await;
        assert_eq!(out.content, "File has been successfully created or updated!");
        let out = create_or_update_file(&c, "main".into(), "new.txt".into(), "v2".into(), "edit".into()).await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(host.file("main", "new.txt").as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn write_to_missing_branch_fails() {
        let host = Arc::new(InMemoryHost::new());
        let out = create_or_update_file(&ctx(host), "ghost".into(), "f".into(), "x".into(), "m".into()).await;
        assert!(out.is_error);
        assert!(out.content.starts_with("Failed to create or update file:"));
    }

    #[tokio::test]
    async fn delete_file_and_folder() {
        let host = Arc::new(
            InMemoryHost::new()
                .with_file("main", "keep.md", "k")
                .with_file("main", "old/a.md", "a")
                .with_file("main", "old/nested/b.md", "b"),
        );
        let c = ctx(host.clone());

        let out = delete_file(&c, "main", "keep.md", "rm").await;
        assert_eq!(out.content, "File has been successfully deleted!");
        assert!(host.file("main", "keep.md").is_none());

        let out = delete_files_in_folder(&c, "main", "old", "rm").await;
        assert_eq!(out.content, "Folder and its contents have been successfully deleted!");
        assert!(host.file("main", "old/a.md").is_none());
        assert!(host.file("main", "old/nested/b.md").is_none());
    }

    #[tokio::test]
    async fn delete_folder_on_file_path() {
        let host = Arc::new(InMemoryHost::new().with_file("main", "a.md", "a"));
        let out = delete_files_in_folder(&ctx(host), "main", "a.md", "rm").await;
        assert!(out.is_error);
        assert_eq!(out.content, "The specified path is not a folder.");
    }

    #[tokio::test]
    async fn tree_is_json() {
        let host = Arc::new(InMemoryHost::new().with_file("main", "src/lib.rs", "x"));
        let out = repo_file_tree(&ctx(host), "main", "").await;
        assert!(!out.is_error);
        let parsed: serde_json::Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(parsed[0]["path"], "src/lib.rs");
        assert_eq!(parsed[0]["type"], "blob");
    }
}
