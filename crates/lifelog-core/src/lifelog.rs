use serde::{Deserialize, Serialize};

/// One node of structured lifelog content (the upstream leaves the shape open).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// A single lifelog record as the upstream returns it (wire format is camelCase).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifelog {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default)]
    pub content_nodes: Vec<ContentNode>,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub is_starred: bool,
    pub last_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_summary: Option<String>,
}

/// Sort order for listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Filter for the upstream list operation. The cursor is an opaque token
/// passed through unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LifelogQuery {
    pub timezone: Option<String>,
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub cursor: Option<String>,
    pub direction: Option<Direction>,
    pub include_markdown: Option<bool>,
    pub include_headings: Option<bool>,
    pub limit: Option<u32>,
    pub is_starred: Option<bool>,
}

impl LifelogQuery {
    /// Render as URL query pairs, omitting unset fields.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = &self.date {
            pairs.push(("date", v.clone()));
        }
        if let Some(v) = &self.timezone {
            pairs.push(("timezone", v.clone()));
        }
        if let Some(v) = &self.start {
            pairs.push(("start", v.clone()));
        }
        if let Some(v) = &self.end {
            pairs.push(("end", v.clone()));
        }
        if let Some(v) = &self.cursor {
            pairs.push(("cursor", v.clone()));
        }
        if let Some(v) = self.limit {
            pairs.push(("limit", v.to_string()));
        }
        if let Some(v) = self.include_markdown {
            pairs.push(("includeMarkdown", v.to_string()));
        }
        if let Some(v) = self.include_headings {
            pairs.push(("includeHeadings", v.to_string()));
        }
        if let Some(v) = self.is_starred {
            pairs.push(("isStarred", v.to_string()));
        }
        if let Some(v) = self.direction {
            pairs.push(("direction", v.as_str().to_string()));
        }
        pairs
    }
}

/// One page of list results, flattened from the upstream envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifelogPage {
    pub lifelogs: Vec<Lifelog>,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// --- Upstream wire envelopes ---

#[derive(Debug, Deserialize)]
pub struct ListResponse {
    pub data: ListData,
    pub meta: ListMeta,
}

#[derive(Debug, Deserialize)]
pub struct ListData {
    pub lifelogs: Vec<Lifelog>,
}

#[derive(Debug, Deserialize)]
pub struct ListMeta {
    pub lifelogs: ListMetaLifelogs,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetaLifelogs {
    pub count: u64,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl ListResponse {
    pub fn into_page(self) -> LifelogPage {
        LifelogPage {
            lifelogs: self.data.lifelogs,
            count: self.meta.lifelogs.count,
            next_cursor: self.meta.lifelogs.next_cursor,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ByIdResponse {
    pub data: ByIdData,
}

#[derive(Debug, Deserialize)]
pub struct ByIdData {
    pub lifelog: Lifelog,
}

impl ByIdResponse {
    pub fn into_lifelog(self) -> Lifelog {
        self.data.lifelog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lifelog {
        Lifelog {
            id: "ll_1".into(),
            title: "Morning standup".into(),
            markdown: Some("# Standup\nnotes".into()),
            content_nodes: vec![ContentNode {
                node_type: "heading1".into(),
                content: serde_json::json!("Standup"),
            }],
            start_time: "2025-05-01T09:00:00Z".into(),
            end_time: "2025-05-01T09:15:00Z".into(),
            is_starred: false,
            last_updated: "2025-05-01T09:20:00Z".into(),
            transcript_summary: None,
        }
    }

    #[test]
    fn lifelog_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["startTime"], "2025-05-01T09:00:00Z");
        assert_eq!(json["isStarred"], false);
        assert_eq!(json["contentNodes"][0]["type"], "heading1");
        assert!(json.get("transcriptSummary").is_none());
    }

    #[test]
    fn lifelog_deserializes_without_optional_fields() {
        let json = serde_json::json!({
            "id": "ll_2",
            "title": "Lunch",
            "startTime": "2025-05-01T12:00:00Z",
            "endTime": "2025-05-01T12:30:00Z",
            "lastUpdated": "2025-05-01T12:31:00Z"
        });
        let log: Lifelog = serde_json::from_value(json).unwrap();
        assert_eq!(log.id, "ll_2");
        assert!(log.markdown.is_none());
        assert!(log.content_nodes.is_empty());
        assert!(!log.is_starred);
    }

    #[test]
    fn query_pairs_omit_unset_fields() {
        let query = LifelogQuery {
            limit: Some(5),
            include_markdown: Some(true),
            ..Default::default()
        };
        let pairs = query.to_query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("limit", "5".to_string()),
                ("includeMarkdown", "true".to_string()),
            ]
        );
    }

    #[test]
    fn query_pairs_full() {
        let query = LifelogQuery {
            timezone: Some("America/New_York".into()),
            date: Some("2025-05-01".into()),
            start: Some("2025-05-01T00:00:00Z".into()),
            end: Some("2025-05-01T23:59:59Z".into()),
            cursor: Some("opaque-token".into()),
            direction: Some(Direction::Desc),
            include_markdown: Some(false),
            include_headings: Some(true),
            limit: Some(25),
            is_starred: Some(true),
        };
        let pairs = query.to_query_pairs();
        assert_eq!(pairs.len(), 10);
        assert!(pairs.contains(&("cursor", "opaque-token".to_string())));
        assert!(pairs.contains(&("direction", "desc".to_string())));
    }

    #[test]
    fn list_response_flattens_to_page() {
        let json = serde_json::json!({
            "data": { "lifelogs": [serde_json::to_value(sample()).unwrap()] },
            "meta": { "lifelogs": { "count": 12, "nextCursor": "abc123" } }
        });
        let resp: ListResponse = serde_json::from_value(json).unwrap();
        let page = resp.into_page();
        assert_eq!(page.lifelogs.len(), 1);
        assert_eq!(page.count, 12);
        assert_eq!(page.next_cursor.as_deref(), Some("abc123"));
    }

    #[test]
    fn list_response_without_cursor() {
        let json = serde_json::json!({
            "data": { "lifelogs": [] },
            "meta": { "lifelogs": { "count": 0 } }
        });
        let page: LifelogPage = serde_json::from_value::<ListResponse>(json)
            .unwrap()
            .into_page();
        assert!(page.lifelogs.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn by_id_response_unwraps() {
        let json = serde_json::json!({
            "data": { "lifelog": serde_json::to_value(sample()).unwrap() }
        });
        let resp: ByIdResponse = serde_json::from_value(json).unwrap();
        assert_eq!(resp.into_lifelog().id, "ll_1");
    }
}
