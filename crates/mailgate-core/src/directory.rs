//! Mailbox directory: listing, role assignment and fuzzy resolution.

use mailgate_imap::{ListResponse, MailboxAttribute};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::MailTransport;

/// What a folder is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxRole {
    /// The inbox.
    Inbox,
    /// Deleted messages.
    Trash,
    /// Junk mail.
    Spam,
    /// Unsent drafts.
    Drafts,
    /// Sent mail.
    Sent,
    /// Messages moved aside as starred.
    Starred,
    /// Anything else.
    Other,
}

impl MailboxRole {
    /// Role from RFC 6154 special-use attributes.
    #[must_use]
    pub fn from_attributes(attributes: &[MailboxAttribute]) -> Option<Self> {
        attributes.iter().find_map(|a| match a {
            MailboxAttribute::Trash => Some(Self::Trash),
            MailboxAttribute::Junk => Some(Self::Spam),
            MailboxAttribute::Drafts => Some(Self::Drafts),
            MailboxAttribute::Sent => Some(Self::Sent),
            MailboxAttribute::Flagged => Some(Self::Starred),
            _ => None,
        })
    }

    /// Role guessed from the last path segment.
    #[must_use]
    pub fn from_name(path: &str) -> Self {
        let name = format_folder_name(path);
        match name.as_str() {
            "inbox" => Self::Inbox,
            "drafts" | "draft" => Self::Drafts,
            n if n.contains("trash") || n.contains("deleted") => Self::Trash,
            n if n.contains("spam") || n.contains("junk") => Self::Spam,
            n if n.contains("sent") => Self::Sent,
            n if n.contains("starred") || n.contains("flagged") => Self::Starred,
            _ => Self::Other,
        }
    }
}

/// A folder on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mailbox {
    /// Full path as used in commands.
    pub path: String,
    /// Last hierarchy segment.
    pub name: String,
    /// Assigned role.
    pub role: MailboxRole,
    /// False for `\Noselect` containers.
    pub selectable: bool,
}

impl Mailbox {
    /// Builds a mailbox from a LIST line.
    #[must_use]
    pub fn from_list(list: &ListResponse) -> Self {
        let path = list.name.clone();
        let name = match list.delimiter {
            Some(d) => path.rsplit(d).next().unwrap_or(&path).to_string(),
            None => path.clone(),
        };
        let role = MailboxRole::from_attributes(&list.attributes)
            .unwrap_or_else(|| MailboxRole::from_name(&path));
        Self {
            path,
            name,
            role,
            selectable: list.is_selectable(),
        }
    }
}

/// Lowercased last path segment, split on `.` and `/`.
#[must_use]
pub fn format_folder_name(path: &str) -> String {
    path.rsplit(['.', '/']).next().unwrap_or(path).to_lowercase()
}

/// The first folder named `drafts` or `draft`.
#[must_use]
pub fn draft_folder(mailboxes: &[Mailbox]) -> Option<&Mailbox> {
    mailboxes
        .iter()
        .find(|m| matches!(format_folder_name(&m.path).as_str(), "drafts" | "draft"))
}

/// The first selectable folder with `role`.
#[must_use]
pub fn find_by_role(mailboxes: &[Mailbox], role: MailboxRole) -> Option<&Mailbox> {
    mailboxes.iter().find(|m| m.selectable && m.role == role)
}

/// Matches `reference` against `mailboxes` case-insensitively.
///
/// An exact path match wins; otherwise the first path containing the
/// reference, in list order. Containers that cannot be selected are skipped.
#[must_use]
pub fn find_mailbox<'a>(mailboxes: &'a [Mailbox], reference: &str) -> Option<&'a Mailbox> {
    let needle = reference.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let candidates = || mailboxes.iter().filter(|m| m.selectable);
    candidates()
        .find(|m| m.path.to_lowercase() == needle)
        .or_else(|| candidates().find(|m| m.path.to_lowercase().contains(&needle)))
}

/// Lists every folder on the server.
///
/// # Errors
///
/// Returns an error if LIST fails.
pub async fn list_mailboxes<T: MailTransport>(transport: &mut T) -> Result<Vec<Mailbox>> {
    let list = transport.list_mailboxes().await?;
    let mailboxes: Vec<Mailbox> = list.iter().map(Mailbox::from_list).collect();
    debug!(count = mailboxes.len(), "mailboxes listed");
    Ok(mailboxes)
}

/// Resolves `reference` to a live folder, creating it when nothing matches.
///
/// # Errors
///
/// [`Error::MailboxUnavailable`] for an empty reference, when CREATE fails,
/// or when the created folder still does not resolve.
pub async fn resolve_mailbox<T: MailTransport>(transport: &mut T, reference: &str) -> Result<Mailbox> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(Error::MailboxUnavailable("empty mailbox reference".into()));
    }

    let mailboxes = list_mailboxes(transport).await?;
    if let Some(found) = find_mailbox(&mailboxes, reference) {
        debug!(reference, mailbox = %found.path, "mailbox resolved");
        return Ok(found.clone());
    }

    info!(mailbox = reference, "creating missing mailbox");
    if let Err(err) = transport.create_mailbox(reference).await {
        warn!(mailbox = reference, error = %err, "mailbox creation failed");
        return Err(Error::MailboxUnavailable(format!("{reference}: {err}")));
    }

    let mailboxes = list_mailboxes(transport).await?;
    find_mailbox(&mailboxes, reference)
        .cloned()
        .ok_or_else(|| Error::MailboxUnavailable(reference.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::testing::FakeTransport;

    fn mailbox(path: &str) -> Mailbox {
        Mailbox {
            path: path.to_string(),
            name: path.to_string(),
            role: MailboxRole::from_name(path),
            selectable: true,
        }
    }

    #[test]
    fn test_roles_from_names() {
        assert_eq!(MailboxRole::from_name("INBOX"), MailboxRole::Inbox);
        assert_eq!(MailboxRole::from_name("INBOX.Trash"), MailboxRole::Trash);
        assert_eq!(MailboxRole::from_name("Deleted Items"), MailboxRole::Trash);
        assert_eq!(MailboxRole::from_name("[Gmail]/Spam"), MailboxRole::Spam);
        assert_eq!(MailboxRole::from_name("Junk E-mail"), MailboxRole::Spam);
        assert_eq!(MailboxRole::from_name("INBOX.Drafts"), MailboxRole::Drafts);
        assert_eq!(MailboxRole::from_name("Sent Messages"), MailboxRole::Sent);
        assert_eq!(MailboxRole::from_name("INBOX.Starred"), MailboxRole::Starred);
        assert_eq!(MailboxRole::from_name("Projects/2024"), MailboxRole::Other);
    }

    #[test]
    fn test_special_use_wins() {
        let list = ListResponse {
            attributes: vec![MailboxAttribute::HasNoChildren, MailboxAttribute::Junk],
            delimiter: Some('/'),
            name: "[Gmail]/Bulk".into(),
        };
        let mailbox = Mailbox::from_list(&list);
        assert_eq!(mailbox.role, MailboxRole::Spam);
        assert_eq!(mailbox.name, "Bulk");
        assert!(mailbox.selectable);
    }

    #[test]
    fn test_format_folder_name() {
        assert_eq!(format_folder_name("INBOX.Drafts"), "drafts");
        assert_eq!(format_folder_name("[Gmail]/Drafts"), "drafts");
        assert_eq!(format_folder_name("Draft"), "draft");
    }

    #[test]
    fn test_draft_folder_first_match() {
        let mailboxes = vec![mailbox("INBOX"), mailbox("Old/Draft"), mailbox("INBOX.Drafts")];
        assert_eq!(draft_folder(&mailboxes).unwrap().path, "Old/Draft");
        assert!(draft_folder(&[mailbox("INBOX")]).is_none());
    }

    #[test]
    fn test_find_exact_before_substring() {
        let mailboxes = vec![mailbox("INBOX.Trash"), mailbox("Trash")];
        assert_eq!(find_mailbox(&mailboxes, "trash").unwrap().path, "Trash");
        assert_eq!(find_mailbox(&mailboxes, "TRA").unwrap().path, "INBOX.Trash");
        assert!(find_mailbox(&mailboxes, "").is_none());
    }

    #[test]
    fn test_find_skips_noselect() {
        let mut parent = mailbox("Archive");
        parent.selectable = false;
        let mailboxes = vec![parent, mailbox("Archive/2024")];
        assert_eq!(find_mailbox(&mailboxes, "archive").unwrap().path, "Archive/2024");
    }

    #[tokio::test]
    async fn test_resolve_creates_missing() {
        let mut transport = FakeTransport::new();
        let resolved = resolve_mailbox(&mut transport, "Receipts").await.unwrap();
        assert_eq!(resolved.path, "Receipts");
        assert!(transport.has_mailbox("Receipts"));
    }

    #[tokio::test]
    async fn test_resolve_reports_failed_create() {
        let mut transport = FakeTransport::new().failing_create();
        let err = resolve_mailbox(&mut transport, "Receipts").await.unwrap_err();
        assert!(matches!(err, Error::MailboxUnavailable(_)));
    }

    #[tokio::test]
    async fn test_resolve_empty_reference_creates_nothing() {
        let mut transport = FakeTransport::new();
        let err = resolve_mailbox(&mut transport, "  ").await.unwrap_err();
        assert!(matches!(err, Error::MailboxUnavailable(_)));
        assert!(transport.calls().is_empty());
    }

    proptest! {
        #[test]
        fn prop_find_result_contains_reference(
            paths in proptest::collection::vec("[A-Za-z./]{1,12}", 0..8),
            reference in "[A-Za-z]{1,4}",
        ) {
            let mailboxes: Vec<Mailbox> = paths.iter().map(|p| mailbox(p)).collect();
            match find_mailbox(&mailboxes, &reference) {
                Some(found) => prop_assert!(found.path.to_lowercase().contains(&reference.to_lowercase())),
                None => prop_assert!(
                    !paths.iter().any(|p| p.to_lowercase().contains(&reference.to_lowercase()))
                ),
            }
        }

        #[test]
        fn prop_resolve_matches_or_creates(
            paths in proptest::collection::vec("[A-Za-z]{1,10}", 0..6),
            reference in "[A-Za-z]{1,6}",
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let mut transport = FakeTransport::new();
            for path in &paths {
                transport.add_mailbox(path, vec![]);
            }
            let existed = transport
                .mailbox_paths()
                .iter()
                .any(|p| p.to_lowercase().contains(&reference.to_lowercase()));

            let resolved = runtime.block_on(resolve_mailbox(&mut transport, &reference)).unwrap();
            prop_assert!(resolved.path.to_lowercase().contains(&reference.to_lowercase()));
            if !existed {
                prop_assert_eq!(&resolved.path, &reference);
            }
        }
    }
}
