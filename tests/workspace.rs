//! End-to-end coverage of the `codeforge` facade: apply a transaction,
//! rebuild the index, and query it back, all against a real temp
//! directory with the indexer's background watch turned off so the
//! test controls exactly when the index refreshes.

use codeforge::{ApplyOptions, CodeforgeConfig, RawOperation, Workspace, WorkspaceDeps};

fn disabled_indexer_config() -> CodeforgeConfig {
    let mut config = CodeforgeConfig::default();
    config.indexer.enabled = false;
    config
}

#[tokio::test(flavor = "current_thread")]
async fn apply_transaction_writes_file_and_rebuild_index_finds_it() {
    let dir = tempfile::tempdir().unwrap();
    let workspace =
        Workspace::open(dir.path(), disabled_indexer_config(), WorkspaceDeps::default()).unwrap();

    let outcome = workspace
        .apply_transaction(
            vec![RawOperation::Create {
                uri: "widgets.rs".to_string(),
                content: "pub fn make_widget() -> Widget { Widget::default() }".to_string(),
            }],
            ApplyOptions::default(),
        )
        .await;
    assert!(outcome.success, "{:?}", outcome.error);
    assert!(dir.path().join("widgets.rs").exists());

    workspace.rebuild_index().await.unwrap();
    let hits = workspace.query("make_widget", 5).await;
    assert!(hits.iter().any(|h| h.uri.as_str() == "widgets.rs"));
}

#[tokio::test(flavor = "current_thread")]
async fn failed_transaction_leaves_no_file_and_index_stays_empty() {
    let dir = tempfile::tempdir().unwrap();
    let workspace =
        Workspace::open(dir.path(), disabled_indexer_config(), WorkspaceDeps::default()).unwrap();

    let outcome = workspace
        .apply_transaction(
            vec![RawOperation::Delete {
                uri: "nonexistent.rs".to_string(),
                recursive: false,
                is_folder: false,
            }],
            ApplyOptions::default(),
        )
        .await;
    assert!(!outcome.success);

    workspace.rebuild_index().await.unwrap();
    let hits = workspace.query("anything", 5).await;
    assert!(hits.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn disabled_indexer_returns_empty_results_even_after_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let workspace =
        Workspace::open(dir.path(), disabled_indexer_config(), WorkspaceDeps::default()).unwrap();

    workspace
        .apply_transaction(
            vec![RawOperation::Create {
                uri: "a.rs".to_string(),
                content: "struct Anything;".to_string(),
            }],
            ApplyOptions::default(),
        )
        .await;
    workspace.rebuild_index().await.unwrap();

    assert_eq!(workspace.indexer_state(), codeforge::IndexerState::Disabled);
    assert!(workspace.query("Anything", 5).await.is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn reopening_a_workspace_reloads_the_persisted_index() {
    let dir = tempfile::tempdir().unwrap();
    {
        let workspace =
            Workspace::open(dir.path(), disabled_indexer_config(), WorkspaceDeps::default())
                .unwrap();
        workspace
            .apply_transaction(
                vec![RawOperation::Create {
                    uri: "persisted.rs".to_string(),
                    content: "fn survives_reopen() {}".to_string(),
                }],
                ApplyOptions::default(),
            )
            .await;
        workspace.rebuild_index().await.unwrap();
    }

    let reopened =
        Workspace::open(dir.path(), disabled_indexer_config(), WorkspaceDeps::default()).unwrap();
    let hits = reopened.query("survives_reopen", 5).await;
    assert!(hits.iter().any(|h| h.uri.as_str() == "persisted.rs"));
}
