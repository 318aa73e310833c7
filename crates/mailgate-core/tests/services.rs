//! Service flows against the in-memory transport.

#![allow(clippy::unwrap_used)]

use std::path::Path;

use mailgate_core::directory::{draft_folder, list_mailboxes};
use mailgate_core::mutator::{self, DraftRequest, Outcome};
use mailgate_core::query::{self, get_messages};
use mailgate_core::testing::{FakeMessage, FakeTransport};
use mailgate_core::{MailboxRole, TransportCapabilities, get_attachment};
use mailgate_imap::{MailboxAttribute, Uid};

fn mail_server() -> FakeTransport {
    let mut transport = FakeTransport::new();
    transport.add_mailbox("INBOX.Drafts", vec![]);
    transport.add_mailbox("INBOX.Trash", vec![MailboxAttribute::Trash]);
    transport.add_mailbox("INBOX.Junk", vec![]);
    transport
}

fn uids(transport: &FakeTransport, mailbox: &str) -> Vec<Uid> {
    transport.uids(mailbox).into_iter().filter_map(Uid::new).collect()
}

#[tokio::test]
async fn test_inbox_lists_recent_threads() {
    let mut transport = mail_server();
    let first = transport.add_message("INBOX", FakeMessage::new("Plan").days_old(3));
    let stale = transport.add_message("INBOX", FakeMessage::new("Plan").days_old(12));
    let reply = transport.add_message("INBOX", FakeMessage::new("Re: Plan").days_old(1));
    let other = transport.add_message("INBOX", FakeMessage::new("Lunch").days_old(2));

    let records = query::list_messages(&mut transport, "INBOX").await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].uid, other.get().max(reply.get()));

    let plan = records.iter().find(|r| r.uid == reply.get()).unwrap();
    assert_eq!(plan.thread.count, 2);
    assert_eq!(plan.thread.uids, format!("{first},{reply}"));
    assert!(!plan.thread.uids.contains(&stale.to_string()));
}

#[tokio::test]
async fn test_local_threading_matches_server_threading() {
    let mut server_side = mail_server();
    let caps = TransportCapabilities {
        move_messages: true,
        uidplus: true,
        ..TransportCapabilities::default()
    };
    let mut local = mail_server().with_capabilities(caps);
    for transport in [&mut server_side, &mut local] {
        transport.add_message("INBOX", FakeMessage::new("Report").days_old(4));
        transport.add_message("INBOX", FakeMessage::new("Fwd: Report").days_old(2));
        transport.add_message("INBOX", FakeMessage::new("Old news").days_old(30));
    }

    let threaded = query::list_messages(&mut server_side, "INBOX").await.unwrap();
    let grouped = query::list_messages(&mut local, "INBOX").await.unwrap();
    let threads = |records: &[query::MessageRecord]| {
        records.iter().map(|r| (r.uid, r.thread.clone())).collect::<Vec<_>>()
    };
    assert_eq!(threads(&threaded), threads(&grouped));
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].thread.uids, "1,2");
}

#[tokio::test]
async fn test_search_then_read_then_download() {
    let mut transport = mail_server();
    transport.add_message("INBOX", FakeMessage::new("Weekly"));
    let uid = transport.add_message(
        "INBOX",
        FakeMessage::new("Invoice 42")
            .html("<p>Attached</p>")
            .attachment("invoice.pdf", "application/pdf", b"%PDF"),
    );

    let found = query::search_messages(&mut transport, "INBOX", "invoice").await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].has_attachments);

    let messages = get_messages(&mut transport, "INBOX", &[uid]).await.unwrap();
    let attachment = &messages[0].attachments[0];
    assert_eq!(messages[0].body, "<p>Attached</p>");

    let content = get_attachment(&mut transport, "INBOX", uid, &attachment.part_id, &attachment.file)
        .await
        .unwrap();
    assert_eq!(content.data, b"%PDF");
}

#[tokio::test]
async fn test_trash_then_purge() {
    let mut transport = mail_server();
    let uid = transport.add_message("INBOX", FakeMessage::new("Spam-ish"));

    let first = mutator::trash(&mut transport, &[uid], "INBOX", "trash").await;
    assert_eq!(first, Outcome::attempted(true));
    let in_trash = uids(&transport, "INBOX.Trash");
    assert_eq!(in_trash.len(), 1);

    let second = mutator::trash(&mut transport, &in_trash, "INBOX.Trash", "trash").await;
    assert_eq!(second, Outcome::attempted(true));
    assert!(transport.uids("INBOX.Trash").is_empty());
}

#[tokio::test]
async fn test_spam_round_trip() {
    let mut transport = mail_server();
    let uid = transport.add_message("INBOX", FakeMessage::new("Offer"));

    assert!(mutator::spam(&mut transport, &[uid], "INBOX", "junk").await.succeeded());
    let junk = uids(&transport, "INBOX.Junk");
    assert_eq!(mutator::spam(&mut transport, &junk, "INBOX.Junk", "junk").await, Outcome::failed());

    assert!(mutator::unspam(&mut transport, &junk, "INBOX", "junk").await.succeeded());
    assert_eq!(transport.uids("INBOX").len(), 1);
}

#[tokio::test]
async fn test_draft_saved_twice_keeps_one_copy() {
    let mut transport = mail_server();
    let mailboxes = list_mailboxes(&mut transport).await.unwrap();
    let folder = draft_folder(&mailboxes).unwrap();
    assert_eq!(folder.role, MailboxRole::Drafts);
    let folder = folder.path.clone();

    let draft = DraftRequest {
        from: "alice@example.com".into(),
        to: "bob@example.com".into(),
        subject: "Notes".into(),
        body: "<p>v1</p>".into(),
        ..DraftRequest::default()
    };
    let first = mutator::save_draft(&mut transport, &folder, Path::new("."), draft.clone())
        .await
        .unwrap();
    let second = mutator::save_draft(
        &mut transport,
        &folder,
        Path::new("."),
        DraftRequest {
            draft_id: Some(first),
            body: "<p>v2</p>".into(),
            ..draft
        },
    )
    .await
    .unwrap();

    assert_ne!(first, second);
    assert_eq!(transport.uids(&folder), vec![second.get()]);
}
