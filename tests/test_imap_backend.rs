#[cfg(feature = "imap-backend")]
use imap_dedup::{
    backend::{Criterion, SearchQuery},
    dedup, Backend, DedupConfig, ImapBackend, ImapConfig,
};
#[cfg(feature = "imap-backend")]
use std::{
    io::{BufRead, BufReader, Write},
    net::TcpListener,
    thread::{self, JoinHandle},
};

/// Spawns a one-shot IMAP server on a random local port. It sends the
/// greeting, answers each received line with the next scripted reply,
/// then keeps reading until the client hangs up. Returns the port and
/// a handle yielding every received line.
#[cfg(feature = "imap-backend")]
fn fake_server(greeting: &'static str, replies: Vec<&'static str>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        stream.write_all(greeting.as_bytes()).unwrap();

        let mut replies = replies.into_iter();
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => (),
            }
            lines.push(line);
            if let Some(reply) = replies.next() {
                if stream.write_all(reply.as_bytes()).is_err() {
                    break;
                }
            }
        }
        lines
    });

    (port, handle)
}

#[cfg(feature = "imap-backend")]
fn local_config(port: u16) -> ImapConfig {
    ImapConfig {
        host: "127.0.0.1".into(),
        port: Some(port),
        login: "me".into(),
        passwd: Some("secret".into()),
        ..ImapConfig::default()
    }
}

#[cfg(feature = "imap-backend")]
#[test]
fn starttls_is_used_when_offered() {
    let (port, server) = fake_server(
        "* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n",
        vec!["s2 BAD starttls unavailable\r\n"],
    );

    assert!(ImapBackend::new(&local_config(port)).is_err());

    let lines = server.join().unwrap();
    assert_eq!("s2 STARTTLS\r\n", lines[0]);
    assert!(!lines.iter().any(|line| line.contains("LOGIN")));
}

#[cfg(feature = "imap-backend")]
#[test]
fn plain_login_when_starttls_not_offered() {
    let (port, server) = fake_server(
        "* OK ready\r\n",
        vec![
            "* CAPABILITY IMAP4rev1 AUTH=PLAIN\r\ns1 OK done\r\n",
            "a1 OK logged in\r\n",
            "* BYE logging out\r\na2 OK done\r\n",
        ],
    );

    let mut imap = ImapBackend::new(&local_config(port)).unwrap();
    imap.logout().unwrap();
    drop(imap);

    let lines = server.join().unwrap();
    assert_eq!(
        vec![
            "s1 CAPABILITY\r\n",
            "a1 LOGIN \"me\" \"secret\"\r\n",
            "a2 LOGOUT\r\n",
        ],
        lines
    );
}

#[cfg(feature = "imap-backend")]
#[test]
fn required_starttls_not_offered() {
    let (port, server) = fake_server(
        "* OK ready\r\n",
        vec!["* CAPABILITY IMAP4rev1\r\ns1 OK done\r\n"],
    );

    let config = ImapConfig {
        starttls: Some(true),
        ..local_config(port)
    };
    assert!(ImapBackend::new(&config).is_err());

    let lines = server.join().unwrap();
    assert_eq!(vec!["s1 CAPABILITY\r\n"], lines);
}

#[cfg(all(feature = "imap-backend", unix))]
#[test]
fn preauth_process_skips_login() {
    let script = r#"printf '* PREAUTH ready\r\n'
read tag rest
printf '* LIST (\\Noselect) "/" ""\r\n%s OK done\r\n' "$tag"
read tag rest
printf '%s OK done\r\n' "$tag""#;

    let config = ImapConfig {
        process_cmd: Some(script.into()),
        ..ImapConfig::default()
    };

    // no password is configured nor needed
    let mut imap = ImapBackend::new(&config).unwrap();
    let root = imap.list_folders("", "").unwrap();
    assert_eq!(1, root.len());
    assert_eq!(Some("/"), root[0].delim.as_deref());
    imap.logout().unwrap();
}

// needs an IMAP server listening on localhost:3143
#[cfg(feature = "imap-backend")]
#[test]
#[ignore]
fn test_imap_backend() {
    let _ = env_logger::builder().is_test(true).try_init();

    let imap_config = ImapConfig {
        host: "localhost".into(),
        port: Some(3143),
        ssl: Some(false),
        starttls: Some(false),
        insecure: Some(true),
        login: "patrick@localhost".into(),
        passwd_cmd: Some("echo 'password'".into()),
        ..ImapConfig::default()
    };

    // checking that the backend can connect and list folders
    let mut imap = ImapBackend::new(&imap_config).unwrap();
    let folders = imap.list_folders("", "*").unwrap();
    assert!(folders.selectable_names().contains(&String::from("INBOX")));

    // checking that the hierarchy delimiter can be queried
    let root = imap.list_folders("", "").unwrap();
    assert_eq!(1, root.len());

    // checking that a read-only selection can be searched and fetched
    let exists = imap.select_folder("INBOX", true).unwrap();
    let seqs = imap
        .search(&SearchQuery::new(Criterion::Undeleted, None))
        .unwrap();
    assert!(seqs.len() <= exists as usize);
    let headers = imap.fetch_headers(&seqs).unwrap();
    assert_eq!(seqs.len(), headers.len());
    imap.close_folder().unwrap();
    imap.logout().unwrap();

    // checking that a dry run leaves the counts untouched
    let config = DedupConfig {
        mailboxes: vec!["INBOX".into()],
        dry_run: true,
        ..DedupConfig::default()
    };
    let mut imap = ImapBackend::new(&imap_config).unwrap();
    let report = dedup::run(&mut imap, &config).unwrap();
    let scan = &report.folders[0].scan;

    let mut imap = ImapBackend::new(&imap_config).unwrap();
    imap.select_folder("INBOX", true).unwrap();
    let counts = dedup::count(&mut imap, None, None).unwrap();
    assert_eq!(scan.deleted_before, counts.deleted);
    assert_eq!(scan.undeleted_before, counts.undeleted);
    imap.logout().unwrap();
}
