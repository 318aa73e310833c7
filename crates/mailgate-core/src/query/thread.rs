//! Subject threading (RFC 5256 base subject, ORDEREDSUBJECT grouping).

use chrono::{DateTime, FixedOffset};
use mailgate_imap::Uid;
use mailgate_mime::encoding::decode_rfc2047;

/// Reduces a subject to its RFC 5256 base subject, lowercased.
///
/// Strips `Re:`, `Fw:` and `Fwd:` prefixes (with optional `[blob]`),
/// leading `[blob]`s, trailing `(fwd)` and `[Fwd: ...]` wrappers, and
/// collapses whitespace.
#[must_use]
pub fn base_subject(subject: &str) -> String {
    let mut s = subject.split_whitespace().collect::<Vec<_>>().join(" ");
    loop {
        let before = s.len();

        let mut end = s.trim_end();
        while let Some(i) = end.len().checked_sub(5) {
            match (end.get(..i), end.get(i..)) {
                (Some(head), Some(tail)) if tail.eq_ignore_ascii_case("(fwd)") => end = head.trim_end(),
                _ => break,
            }
        }
        s = end.to_string();

        let mut start = s.as_str();
        loop {
            let trimmed = start.trim_start();
            if let Some(rest) = strip_refwd(trimmed) {
                start = rest;
            } else if let Some(rest) = strip_blob(trimmed).filter(|r| !r.trim().is_empty()) {
                start = rest;
            } else {
                start = trimmed;
                break;
            }
        }
        s = start.to_string();

        if let Some(inner) = s
            .get(..5)
            .filter(|h| h.eq_ignore_ascii_case("[fwd:"))
            .and_then(|_| s.strip_suffix(']'))
            .and_then(|t| t.get(5..))
        {
            s = inner.to_string();
            continue;
        }
        if s.len() == before {
            break;
        }
    }
    s.to_lowercase()
}

/// `subj-refwd`: `re`/`fw`/`fwd`, optional blob, then `:`.
fn strip_refwd(s: &str) -> Option<&str> {
    let rest = ["re", "fwd", "fw"].iter().find_map(|prefix| {
        s.get(..prefix.len())
            .filter(|h| h.eq_ignore_ascii_case(prefix))
            .and_then(|_| s.get(prefix.len()..))
    })?;
    let rest = rest.trim_start();
    let rest = strip_blob(rest).unwrap_or(rest);
    rest.strip_prefix(':')
}

/// `subj-blob`: `[` without nested brackets `]`, then whitespace.
fn strip_blob(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('[')?;
    let end = inner.find(['[', ']'])?;
    inner[end..].strip_prefix(']').map(str::trim_start)
}

/// Groups messages by base subject, each thread oldest first.
///
/// Threads are ordered by their oldest message. Messages without a date
/// sort before dated ones, ties by UID.
pub(crate) fn group_by_subject(
    messages: impl IntoIterator<Item = (Uid, Option<String>, Option<DateTime<FixedOffset>>)>,
) -> Vec<Vec<Uid>> {
    type Member = (Option<DateTime<FixedOffset>>, Uid);
    let mut groups: Vec<(String, Vec<Member>)> = Vec::new();
    for (uid, subject, date) in messages {
        let key = base_subject(&decode_rfc2047(subject.as_deref().unwrap_or_default()));
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push((date, uid)),
            None => groups.push((key, vec![(date, uid)])),
        }
    }
    for (_, members) in &mut groups {
        members.sort();
    }
    groups.sort_by_key(|(_, members)| members.first().copied());
    groups
        .into_iter()
        .map(|(_, members)| members.into_iter().map(|(_, uid)| uid).collect())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[test]
    fn test_strips_reply_and_forward_prefixes() {
        assert_eq!(base_subject("Re: Lunch"), "lunch");
        assert_eq!(base_subject("RE: re: Fwd: Lunch"), "lunch");
        assert_eq!(base_subject("Re[2]: Lunch"), "lunch");
        assert_eq!(base_subject("FW:  Lunch   plans"), "lunch plans");
        assert_eq!(base_subject("[list] Re: Lunch"), "lunch");
    }

    #[test]
    fn test_strips_trailers_and_wrappers() {
        assert_eq!(base_subject("Lunch (fwd)"), "lunch");
        assert_eq!(base_subject("Lunch (FWD) (fwd)"), "lunch");
        assert_eq!(base_subject("[Fwd: Re: Lunch]"), "lunch");
    }

    #[test]
    fn test_keeps_lone_blob() {
        assert_eq!(base_subject("[urgent]"), "[urgent]");
        assert_eq!(base_subject("Re: "), "");
        assert_eq!(base_subject(""), "");
    }

    #[test]
    fn test_non_ascii_does_not_panic() {
        assert_eq!(base_subject("Re: Grüße"), "grüße");
        assert_eq!(base_subject("日本語 (fwd)"), "日本語");
        assert_eq!(base_subject("é"), "é");
    }

    #[test]
    fn test_group_by_subject() {
        let day = |d: u32| DateTime::parse_from_rfc3339(&format!("2024-07-0{d}T10:00:00+00:00")).ok();
        let threads = group_by_subject(vec![
            (uid(5), Some("Re: Plan".to_string()), day(3)),
            (uid(2), Some("Plan".to_string()), day(1)),
            (uid(7), Some("Other".to_string()), day(2)),
            (uid(9), Some("=?utf-8?Q?Re=3A_Plan?=".to_string()), day(4)),
            (uid(11), None, day(5)),
        ]);
        assert_eq!(threads, vec![vec![uid(2), uid(5), uid(9)], vec![uid(7)], vec![uid(11)]]);
    }

    proptest! {
        #[test]
        fn prop_base_subject_idempotent(subject in "[ a-zA-Z:\\[\\]()]{0,40}") {
            let once = base_subject(&subject);
            prop_assert_eq!(base_subject(&once), once.clone());
        }

        #[test]
        fn prop_reply_prefix_ignored(subject in "[a-z ]{0,30}") {
            prop_assert_eq!(base_subject(&format!("Re: {subject}")), base_subject(&subject));
        }

        #[test]
        fn prop_never_panics(subject in "\\PC{0,40}") {
            let _ = base_subject(&subject);
        }
    }
}
