//! Git bookkeeping for the per-site metadata directory.

use crate::config::GitConfig;
use crate::error::Result;
use git2::{Commit, ErrorCode, Repository, Signature, Status};
use std::path::Path;

pub struct MetadataRepo {
    repo: Repository,
    author_name: String,
    author_email: String,
}

impl MetadataRepo {
    /// Opens the repository rooted at `dir`. Returns `None`, after logging a
    /// warning, if `dir` is not the top of a Git work tree.
    pub fn open(dir: &Path, git: &GitConfig) -> Result<Option<Self>> {
        match Repository::open(dir) {
            Ok(repo) => Ok(Some(MetadataRepo {
                repo,
                author_name: git.author_name.clone(),
                author_email: git.author_email.clone(),
            })),
            Err(e) if e.code() == ErrorCode::NotFound => {
                log::warn!(
                    "{} is not a Git repository, metadata changes will not be committed",
                    dir.display()
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// True if the working copy of `name` differs from the index. Untracked
    /// and missing files count as unchanged.
    pub fn has_file_changed(&self, name: &str) -> Result<bool> {
        let status = match self.repo.status_file(Path::new(name)) {
            Ok(status) => status,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(status.intersects(
            Status::WT_MODIFIED | Status::WT_DELETED | Status::WT_TYPECHANGE | Status::WT_RENAMED,
        ))
    }

    /// Stages `name` and commits it on HEAD. Nothing is committed if the
    /// resulting tree equals HEAD's.
    pub fn commit_file(&self, name: &str, message: &str) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_path(Path::new(name))?;
        index.write()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;

        let parent = self.head_commit()?;
        if let Some(parent) = &parent {
            if parent.tree_id() == tree_id {
                log::debug!("{} unchanged, skipping commit", name);
                return Ok(());
            }
        }

        let signature = Signature::now(&self.author_name, &self.author_email)?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        log::info!("Committed {} as {}", name, oid);
        Ok(())
    }

    fn head_commit(&self) -> Result<Option<Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::temp_db;
    use crate::locks::FileLocks;
    use std::collections::BTreeMap;
    use std::fs;

    fn git_config() -> GitConfig {
        GitConfig {
            author_name: "Portal".into(),
            author_email: "portal@example.org".into(),
        }
    }

    fn commit_messages(dir: &Path) -> Vec<String> {
        let repo = Repository::open(dir).unwrap();
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.map(|oid| {
            repo.find_commit(oid.unwrap())
                .unwrap()
                .message()
                .unwrap_or_default()
                .to_string()
        })
        .collect()
    }

    #[test]
    fn update_commits_before_and_after_outside_edits() {
        let (_db_dir, db) = temp_db();
        let locks = FileLocks::new(db);
        let meta = tempfile::tempdir().unwrap();
        Repository::init(meta.path()).unwrap();

        let mut data = BTreeMap::new();
        data.insert("doi".to_string(), "10.1/a".to_string());
        locks
            .update_metadata_repo(meta.path(), "pa_parkfalls.json", &data, "alice", &git_config())
            .unwrap();
        assert_eq!(commit_messages(meta.path()).len(), 1);

        // Someone edits the file by hand without committing.
        fs::write(meta.path().join("pa_parkfalls.json"), "{\"doi\": \"hand\"}\n").unwrap();

        data.insert("doi".to_string(), "10.1/b".to_string());
        locks
            .update_metadata_repo(meta.path(), "pa_parkfalls.json", &data, "bob", &git_config())
            .unwrap();

        let messages = commit_messages(meta.path());
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("submitted by bob"));
        assert!(messages[1].starts_with("Commit state of pa_parkfalls.json before change"));
    }

    #[test]
    fn identical_write_makes_no_commit() {
        let (_db_dir, db) = temp_db();
        let locks = FileLocks::new(db);
        let meta = tempfile::tempdir().unwrap();
        Repository::init(meta.path()).unwrap();

        let data: BTreeMap<String, String> = BTreeMap::new();
        for _ in 0..2 {
            locks
                .update_metadata_repo(meta.path(), "oc_lamont.json", &data, "carol", &git_config())
                .unwrap();
        }
        assert_eq!(commit_messages(meta.path()).len(), 1);
    }

    #[test]
    fn plain_directory_still_gets_the_file() {
        let (_db_dir, db) = temp_db();
        let locks = FileLocks::new(db);
        let meta = tempfile::tempdir().unwrap();
        let data: BTreeMap<String, String> = BTreeMap::new();
        locks
            .update_metadata_repo(meta.path(), "ci_pasadena.json", &data, "dave", &git_config())
            .unwrap();
        assert!(meta.path().join("ci_pasadena.json").exists());
    }
}
