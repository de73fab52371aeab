//! Migration run driver.
//!
//! A run is Scanning → Computing (both inside [`Migration::plan`]) →
//! AwaitingConfirmation → Committing. Confirmation is never requested when
//! nothing changed, and a declined confirmation discards every computed
//! write. Declines surface as [`RunStatus::Aborted`] rather than a process
//! exit, so a composed multi-migration run survives one declined step.

use miette::{Result, miette};
use tracing::info;

use rekey_store::DocumentStore;

use crate::confirm::Confirm;
use crate::migrate::{Migration, MigrationPlan, available_migrations};

/// Terminal state of one migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// The run finished; zero updates means nothing needed repair.
    Completed { documents_updated: usize },
    /// The operator declined confirmation; nothing was written.
    Aborted,
}

/// Drive one computed plan through confirmation and commit.
pub async fn execute_plan(
    store: &dyn DocumentStore,
    confirmer: &dyn Confirm,
    plan: MigrationPlan,
    target: &str,
    dry_run: bool,
) -> Result<RunStatus> {
    if plan.updates.is_empty() {
        println!("No documents required updating.");
        return Ok(RunStatus::Completed {
            documents_updated: 0,
        });
    }

    if dry_run {
        println!(
            "Dry-run: {} document(s) would be updated",
            plan.updates.len()
        );
        if !plan.changes.is_empty() {
            println!("\nChanges:");
            for change in &plan.changes {
                println!("  - {change}");
            }
        }
        return Ok(RunStatus::Completed {
            documents_updated: 0,
        });
    }

    for change in &plan.changes {
        info!("{change}");
    }

    println!("\nYou are about to run the migration on: {target}");
    println!("About to update {} document(s).", plan.updates.len());
    let answer = confirmer
        .ask("Do you want to continue? (y/n): ")
        .map_err(|e| miette!("failed to read confirmation: {}", e))?;
    if answer != "y" {
        println!("Migration aborted.");
        return Ok(RunStatus::Aborted);
    }

    println!(
        "Committing batch update for {} document(s)...",
        plan.updates.len()
    );
    let applied = store
        .commit(plan.updates)
        .await
        .map_err(|e| miette!("{}", e))?;
    println!("Batch update complete.");

    Ok(RunStatus::Completed {
        documents_updated: applied,
    })
}

/// Run the migrate command with the given options.
pub async fn run_migrate_command(
    store: &dyn DocumentStore,
    confirmer: &dyn Confirm,
    target: &str,
    migration_name: Option<&str>,
    list: bool,
    dry_run: bool,
    all: bool,
    lookup_batch: usize,
) -> Result<()> {
    let migrations = available_migrations(lookup_batch);

    if list {
        println!("Available migrations:\n");
        for m in &migrations {
            let pending = !m.plan(store).await?.updates.is_empty();
            let status = if pending { "[PENDING]" } else { "[APPLIED]" };
            println!("  {} {}", status, m.name());
            println!("      {}\n", m.description());
        }
        return Ok(());
    }

    let to_run: Vec<Box<dyn Migration>> = if all {
        migrations
    } else if let Some(name) = migration_name {
        let m = migrations
            .into_iter()
            .find(|m| m.name() == name)
            .ok_or_else(|| miette!("Unknown migration: {}", name))?;
        vec![m]
    } else {
        return Err(miette!("Specify a migration name, --all, or --list"));
    };

    for m in to_run {
        println!("\n=== {} ===", m.name());
        println!("{}\n", m.description());

        let plan = m.plan(store).await?;
        match execute_plan(store, confirmer, plan, target, dry_run).await? {
            RunStatus::Completed { documents_updated } => {
                info!(
                    migration = m.name(),
                    documents_updated, "migration finished"
                );
            }
            // A declined step must not kill the remaining migrations.
            RunStatus::Aborted => {
                info!(migration = m.name(), "migration aborted by operator");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rekey_store::{DocumentUpdate, MemoryStore};

    use crate::confirm::AutoApprove;

    /// Answers with a fixed line and counts how often it was asked.
    struct Scripted {
        answer: &'static str,
        asked: AtomicUsize,
    }

    impl Scripted {
        fn new(answer: &'static str) -> Self {
            Self {
                answer,
                asked: AtomicUsize::new(0),
            }
        }

        fn times_asked(&self) -> usize {
            self.asked.load(Ordering::SeqCst)
        }
    }

    impl Confirm for Scripted {
        fn ask(&self, _question: &str) -> io::Result<String> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.to_string())
        }
    }

    fn plan_with_one_update() -> MigrationPlan {
        MigrationPlan {
            updates: vec![DocumentUpdate::new("users", "u1").set("id", json!("u1"))],
            changes: vec!["User u1: field id (old) does not match document key".to_string()],
        }
    }

    #[tokio::test]
    async fn empty_plan_skips_confirmation_and_commit() {
        let store = MemoryStore::new();
        let confirmer = Scripted::new("y");
        let plan = MigrationPlan {
            updates: Vec::new(),
            changes: Vec::new(),
        };

        let status = execute_plan(&store, &confirmer, plan, "!PRODUCTION!", false)
            .await
            .unwrap();

        assert_eq!(
            status,
            RunStatus::Completed {
                documents_updated: 0
            }
        );
        assert_eq!(confirmer.times_asked(), 0);
        assert_eq!(store.commit_count().await, 0);
    }

    #[tokio::test]
    async fn declined_confirmation_aborts_without_writing() {
        let store = MemoryStore::new();
        store.insert("users", "u1", json!({"id": "old"})).await;
        let confirmer = Scripted::new("n");

        let status = execute_plan(&store, &confirmer, plan_with_one_update(), "emu:8080", false)
            .await
            .unwrap();

        assert_eq!(status, RunStatus::Aborted);
        assert_eq!(confirmer.times_asked(), 1);
        assert_eq!(store.commit_count().await, 0);
        let doc = store.get("users", "u1").await.unwrap();
        assert_eq!(doc.get_str("id"), Some("old"));
    }

    #[tokio::test]
    async fn only_the_literal_y_approves() {
        // The prompt hands over trimmed, lower-cased answers; anything but
        // the exact literal "y" aborts, including "yes" and empty input.
        for answer in ["yes", "", "ok", "y "] {
            let store = MemoryStore::new();
            store.insert("users", "u1", json!({"id": "old"})).await;
            let confirmer = Scripted::new(answer);

            let status =
                execute_plan(&store, &confirmer, plan_with_one_update(), "emu:8080", false)
                    .await
                    .unwrap();

            assert_eq!(status, RunStatus::Aborted, "answer {answer:?}");
            assert_eq!(store.commit_count().await, 0);
        }
    }

    #[tokio::test]
    async fn approved_plan_commits_in_one_batch() {
        let store = MemoryStore::new();
        store.insert("users", "u1", json!({"id": "old"})).await;
        let confirmer = Scripted::new("y");

        let status = execute_plan(&store, &confirmer, plan_with_one_update(), "emu:8080", false)
            .await
            .unwrap();

        assert_eq!(
            status,
            RunStatus::Completed {
                documents_updated: 1
            }
        );
        assert_eq!(store.commit_count().await, 1);
        let doc = store.get("users", "u1").await.unwrap();
        assert_eq!(doc.get_str("id"), Some("u1"));
    }

    #[tokio::test]
    async fn dry_run_never_prompts_or_writes() {
        let store = MemoryStore::new();
        store.insert("users", "u1", json!({"id": "old"})).await;
        let confirmer = Scripted::new("y");

        let status = execute_plan(&store, &confirmer, plan_with_one_update(), "emu:8080", true)
            .await
            .unwrap();

        assert_eq!(
            status,
            RunStatus::Completed {
                documents_updated: 0
            }
        );
        assert_eq!(confirmer.times_asked(), 0);
        assert_eq!(store.commit_count().await, 0);
    }

    #[tokio::test]
    async fn run_all_continues_past_clean_collections() {
        // An empty store has nothing to repair; --all must complete without
        // prompting.
        let store = MemoryStore::new();
        run_migrate_command(&store, &AutoApprove, "emu:8080", None, false, false, true, 30)
            .await
            .unwrap();
        assert_eq!(store.commit_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_migration_name_is_an_error() {
        let store = MemoryStore::new();
        let result = run_migrate_command(
            &store,
            &AutoApprove,
            "emu:8080",
            Some("no-such-migration"),
            false,
            false,
            false,
            30,
        )
        .await;
        assert!(result.is_err());
    }
}
