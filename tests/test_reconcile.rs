use std::fs;
use tempfile::tempdir;

use imap_dedup::{
    backend,
    dedup::lists,
    reconcile::{self, Artifacts, ReconcileConfig, Side, Stage, StageOutcome},
    Flag, ImapConfig, MemoryBackend, MemoryStore,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn header(id: &str) -> String {
    format!(
        "From: alice@localhost\r\nSubject: {}\r\nMessage-ID: {}\r\n\r\n",
        id, id
    )
}

fn reconcile_config() -> ReconcileConfig {
    serde_json::from_str(
        r#"{
            "source": {"host": "imap.source.test", "login": "me"},
            "target": {"host": "imap.target.test", "login": "me"}
        }"#,
    )
    .unwrap()
}

struct Accounts {
    source: MemoryStore,
    target: MemoryStore,
    connections: Vec<Side>,
}

impl Accounts {
    fn new() -> Self {
        let source = MemoryStore::new(Some("/"));
        source.append("INBOX", header("<a@x>"));
        source.append("INBOX", header("<b@x>"));
        source.append("Archive", header("<c@x>"));
        source.append("Spam", header("<d@x>"));

        let target = MemoryStore::new(Some("."));
        target.append("INBOX", header("<a@x>"));
        target.append("recovered", header("<a@x>"));
        target.append("recovered", header("<c@x>"));
        target.append("recovered", header("<d@x>"));
        target.append("recovered", header("<e@x>"));
        target.append("recovered", header("<e@x>"));

        Self {
            source,
            target,
            connections: Vec::new(),
        }
    }

    fn run(&mut self, artifacts: &Artifacts) -> (Stage, StageOutcome) {
        let config = reconcile_config();
        let source = self.source.clone();
        let target = self.target.clone();
        let connections = &mut self.connections;

        reconcile::run_next_stage(
            &config,
            artifacts,
            |side, _: &ImapConfig| -> backend::Result<MemoryBackend> {
                connections.push(side);
                Ok(match side {
                    Side::Source => MemoryBackend::new(source.clone()),
                    Side::Target => MemoryBackend::new(target.clone()),
                })
            },
        )
        .unwrap()
    }

    fn source_snapshot(&self) -> Vec<Vec<imap_dedup::backend::memory::MemoryMessage>> {
        self.source
            .folder_names()
            .iter()
            .map(|folder| self.source.messages(folder))
            .collect()
    }
}

#[test]
fn test_four_stages() {
    init_logger();
    let dir = tempdir().unwrap();
    let artifacts = Artifacts::new(dir.path().join("sync"));
    let mut accounts = Accounts::new();
    let source_before = accounts.source_snapshot();

    // stage 1: the source folders are listed
    let (stage, outcome) = accounts.run(&artifacts);
    assert_eq!(Stage::ListFolders, stage);
    assert_eq!(
        StageOutcome::ListedFolders {
            mailboxes: vec![
                String::from("INBOX"),
                String::from("Archive"),
                String::from("Spam"),
            ],
        },
        outcome
    );
    assert!(artifacts.mailboxes.exists());
    assert!(!artifacts.source_ids.exists());

    // the operator removes the spam folder
    let curated = [String::from("INBOX"), String::from("Archive")];
    lists::write_mailbox_list(&artifacts.mailboxes, &curated).unwrap();

    // stage 2: the source identities are collected
    let (stage, outcome) = accounts.run(&artifacts);
    assert_eq!(Stage::ScanSource, stage);
    assert_eq!(StageOutcome::ScannedSource { ids: 3 }, outcome);
    assert_eq!(
        "<a@x>\n<b@x>\n<c@x>\n",
        fs::read_to_string(&artifacts.source_ids).unwrap()
    );
    assert!(!artifacts.target_ids.exists());

    // stage 3: the target identities are collected, unfiltered
    let (stage, outcome) = accounts.run(&artifacts);
    assert_eq!(Stage::ScanTarget, stage);
    assert_eq!(StageOutcome::ScannedTarget { ids: 5 }, outcome);
    assert_eq!(
        "<a@x>\n<c@x>\n<d@x>\n<e@x>\n<e@x>\n",
        fs::read_to_string(&artifacts.target_ids).unwrap()
    );
    assert_eq!(5, accounts.target.messages("recovered").len());

    // stage 4: the target messages present at source are purged
    let (stage, outcome) = accounts.run(&artifacts);
    assert_eq!(Stage::Purge, stage);
    match outcome {
        StageOutcome::Purged {
            report,
            unmatched,
            target_count,
        } => {
            assert_eq!(vec![1, 2, 5], report.folders[0].scan.flagged());
            assert_eq!(
                vec!["<d@x>", "<e@x>"],
                unmatched
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<String>>()
            );
            assert_eq!(4, target_count);
        }
        outcome => panic!("unexpected outcome {:?}", outcome),
    }

    let recovered: Vec<Vec<u8>> = accounts
        .target
        .messages("recovered")
        .into_iter()
        .map(|msg| msg.header)
        .collect();
    assert_eq!(
        vec![header("<d@x>").into_bytes(), header("<e@x>").into_bytes()],
        recovered
    );
    assert_eq!(1, accounts.target.messages("INBOX").len());

    // the source is never modified
    assert_eq!(source_before, accounts.source_snapshot());
    assert_eq!(
        vec![Side::Source, Side::Source, Side::Target, Side::Target],
        accounts.connections
    );
}

#[test]
fn test_stage_gating() {
    init_logger();
    let dir = tempdir().unwrap();
    let artifacts = Artifacts::new(dir.path().join("sync"));
    artifacts.create_dir().unwrap();
    let mut accounts = Accounts::new();

    // with the mailbox list and the target identities, only the
    // source scan runs
    lists::write_mailbox_list(&artifacts.mailboxes, &[String::from("INBOX")]).unwrap();
    fs::write(&artifacts.target_ids, "<z@x>\n").unwrap();

    let (stage, _) = accounts.run(&artifacts);
    assert_eq!(Stage::ScanSource, stage);
    assert_eq!(vec![Side::Source], accounts.connections);
    assert_eq!(
        "<a@x>\n<b@x>\n",
        fs::read_to_string(&artifacts.source_ids).unwrap()
    );
    assert_eq!("<z@x>\n", fs::read_to_string(&artifacts.target_ids).unwrap());
    assert_eq!(0, accounts.target.count_flagged("recovered", &Flag::Deleted));

    // all artifacts present: the purge runs and can be run again
    let (stage, _) = accounts.run(&artifacts);
    assert_eq!(Stage::Purge, stage);
    let (stage, outcome) = accounts.run(&artifacts);
    assert_eq!(Stage::Purge, stage);
    match outcome {
        StageOutcome::Purged { report, .. } => assert_eq!(0, report.duplicates()),
        outcome => panic!("unexpected outcome {:?}", outcome),
    }
}
