use lifelog_core::lifelog::Lifelog;

/// Case-insensitive substring match over the fields a caller can see:
/// title, markdown body, and transcript summary. The upstream offers no
/// full-text search, so this runs client-side over an already-fetched page.
pub fn matches(log: &Lifelog, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    log.title.to_lowercase().contains(&needle)
        || log
            .markdown
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains(&needle))
        || log
            .transcript_summary
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains(&needle))
}

/// Filter a page of lifelogs down to those matching the query string.
pub fn filter(logs: &[Lifelog], needle: &str) -> Vec<Lifelog> {
    logs.iter().filter(|l| matches(l, needle)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(title: &str, markdown: Option<&str>, summary: Option<&str>) -> Lifelog {
        Lifelog {
            id: "ll_x".into(),
            title: title.into(),
            markdown: markdown.map(str::to_string),
            content_nodes: Vec::new(),
            start_time: "2025-05-01T09:00:00Z".into(),
            end_time: "2025-05-01T09:15:00Z".into(),
            is_starred: false,
            last_updated: "2025-05-01T09:20:00Z".into(),
            transcript_summary: summary.map(str::to_string),
        }
    }

    #[test]
    fn matches_title_case_insensitive() {
        assert!(matches(&log("Morning Standup", None, None), "standup"));
        assert!(matches(&log("morning standup", None, None), "STANDUP"));
        assert!(!matches(&log("Lunch", None, None), "standup"));
    }

    #[test]
    fn matches_markdown_and_summary() {
        assert!(matches(&log("Meeting", Some("we discussed the standup"), None), "standup"));
        assert!(matches(&log("Meeting", None, Some("Standup recap")), "standup"));
        assert!(!matches(&log("Meeting", None, None), "standup"));
    }

    #[test]
    fn filter_keeps_only_matches() {
        let logs = vec![
            log("Standup", None, None),
            log("Lunch", None, None),
            log("Review", Some("standup follow-ups"), None),
        ];
        let hits = filter(&logs, "standup");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Standup");
        assert_eq!(hits[1].title, "Review");
    }
}
