//! Git repository fixtures.

use std::path::Path;

/// Initialises a real git repository with every file in `path` committed.
///
/// Uses `git2` only, so no `git` executable or global config is needed.
///
/// # Panics
/// Panics if any git operation fails.
pub fn real_git_repo_with_commit(path: &Path) -> git2::Repository {
    let repo = git2::Repository::init(path).unwrap_or_else(|e| {
        panic!(
            "real_git_repo_with_commit: failed to init repository at {}: {e}",
            path.display()
        )
    });
    commit_all(&repo, "Initial commit");
    repo
}

/// Stages every file in the working tree and commits it.
///
/// # Panics
/// Panics if any git operation fails.
pub fn commit_all(repo: &git2::Repository, message: &str) {
    let mut index = repo
        .index()
        .unwrap_or_else(|e| panic!("commit_all: failed to open index: {e}"));
    index
        .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
        .unwrap_or_else(|e| panic!("commit_all: failed to stage files: {e}"));
    index
        .write()
        .unwrap_or_else(|e| panic!("commit_all: failed to write index: {e}"));
    let tree_id = index
        .write_tree()
        .unwrap_or_else(|e| panic!("commit_all: failed to write tree: {e}"));
    let tree = repo
        .find_tree(tree_id)
        .unwrap_or_else(|e| panic!("commit_all: failed to find tree: {e}"));
    let signature = git2::Signature::now("Test User", "test@test.com")
        .unwrap_or_else(|e| panic!("commit_all: failed to build signature: {e}"));

    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap_or_else(|e| panic!("commit_all: failed to commit: {e}"));
}
