use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use lifelog_client::search;
use lifelog_core::api::LifelogApi;
use lifelog_core::lifelog::{Direction, LifelogQuery};
use lifelog_core::params::{self, ParamKind, ParamSpec};
use lifelog_core::tools::{CallToolResult, Tool, ToolDefinition, ToolError};

/// The callable operations of one session, keyed by globally unique name.
/// Unpopulated on unauthenticated sessions; dispatch then never runs.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with the four lifelog tools bound to the given client.
    pub fn with_lifelog_tools(api: Arc<dyn LifelogApi>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GetLifelogsTool { api: Arc::clone(&api) }));
        registry.register(Arc::new(GetLifelogByIdTool { api: Arc::clone(&api) }));
        registry.register(Arc::new(DeleteLifelogTool { api: Arc::clone(&api) }));
        registry.register(Arc::new(SearchLifelogsTool { api }));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "replacing previously registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Definitions for `tools/list`, name-sorted for a stable listing.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke one tool and fold every outcome into the uniform envelope.
    /// Failures stop here; they never propagate as a transport fault.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> CallToolResult {
        let Some(tool) = self.get(name) else {
            return CallToolResult::error(format!("Unknown tool: {name}"));
        };
        tracing::debug!(tool = %name, "dispatching tool call");
        match tool.execute(arguments).await {
            Ok(value) => CallToolResult::success(&value),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool call failed");
                CallToolResult::error(e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// --- argument extraction over a validated map ---

fn opt_str(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

fn opt_bool(args: &Map<String, Value>, key: &str) -> Option<bool> {
    args.get(key).and_then(Value::as_bool)
}

fn opt_u32(args: &Map<String, Value>, key: &str) -> Result<Option<u32>, ToolError> {
    match args.get(key).and_then(Value::as_i64) {
        None => Ok(None),
        Some(v) if (0..=u32::MAX as i64).contains(&v) => Ok(Some(v as u32)),
        Some(_) => Err(ToolError::InvalidArguments(format!(
            "`{key}` must be a non-negative integer"
        ))),
    }
}

fn parse_direction(args: &Map<String, Value>) -> Result<Option<Direction>, ToolError> {
    match args.get("direction").and_then(Value::as_str) {
        None => Ok(None),
        Some("asc") => Ok(Some(Direction::Asc)),
        Some("desc") => Ok(Some(Direction::Desc)),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "`direction` must be \"asc\" or \"desc\", got \"{other}\""
        ))),
    }
}

// --- get_lifelogs ---

struct GetLifelogsTool {
    api: Arc<dyn LifelogApi>,
}

fn get_lifelogs_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec::optional("date", ParamKind::String, "Day to fetch, YYYY-MM-DD"),
        ParamSpec::optional(
            "timezone",
            ParamKind::String,
            "IANA timezone used to interpret `date`",
        ),
        ParamSpec::optional("start", ParamKind::String, "Range start, ISO-8601"),
        ParamSpec::optional("end", ParamKind::String, "Range end, ISO-8601"),
        ParamSpec::optional(
            "cursor",
            ParamKind::String,
            "Opaque pagination token from a previous page",
        ),
        ParamSpec::optional("direction", ParamKind::String, "Sort order: asc or desc"),
        ParamSpec::optional(
            "includeMarkdown",
            ParamKind::Boolean,
            "Include the markdown body of each entry",
        ),
        ParamSpec::optional(
            "includeHeadings",
            ParamKind::Boolean,
            "Include heading content nodes",
        ),
        ParamSpec::optional("limit", ParamKind::Integer, "Maximum entries to return"),
        ParamSpec::optional("isStarred", ParamKind::Boolean, "Only starred entries"),
    ]
}

#[async_trait]
impl Tool for GetLifelogsTool {
    fn name(&self) -> &str {
        "get_lifelogs"
    }

    fn description(&self) -> &str {
        "Retrieve lifelogs with optional date, range, and pagination filters"
    }

    fn parameters_schema(&self) -> Value {
        params::json_schema(&get_lifelogs_specs())
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args = params::validate(&get_lifelogs_specs(), &args)?;
        let query = LifelogQuery {
            timezone: opt_str(&args, "timezone"),
            date: opt_str(&args, "date"),
            start: opt_str(&args, "start"),
            end: opt_str(&args, "end"),
            cursor: opt_str(&args, "cursor"),
            direction: parse_direction(&args)?,
            include_markdown: opt_bool(&args, "includeMarkdown"),
            include_headings: opt_bool(&args, "includeHeadings"),
            limit: opt_u32(&args, "limit")?,
            is_starred: opt_bool(&args, "isStarred"),
        };
        let page = self.api.get_lifelogs(&query).await?;
        let has_more = page.next_cursor.is_some();
        Ok(serde_json::json!({
            "lifelogs": page.lifelogs,
            "cursor": page.next_cursor,
            "hasMore": has_more,
            "count": page.count,
        }))
    }
}

// --- get_lifelog_by_id ---

struct GetLifelogByIdTool {
    api: Arc<dyn LifelogApi>,
}

fn by_id_specs() -> Vec<ParamSpec> {
    vec![ParamSpec::required(
        "id",
        ParamKind::String,
        "Lifelog entry ID",
    )]
}

#[async_trait]
impl Tool for GetLifelogByIdTool {
    fn name(&self) -> &str {
        "get_lifelog_by_id"
    }

    fn description(&self) -> &str {
        "Retrieve a specific lifelog entry by ID"
    }

    fn parameters_schema(&self) -> Value {
        params::json_schema(&by_id_specs())
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args = params::validate(&by_id_specs(), &args)?;
        let id = opt_str(&args, "id").unwrap_or_default();
        let log = self.api.get_lifelog_by_id(&id).await?;
        Ok(serde_json::to_value(log).unwrap_or(Value::Null))
    }
}

// --- delete_lifelog ---

struct DeleteLifelogTool {
    api: Arc<dyn LifelogApi>,
}

#[async_trait]
impl Tool for DeleteLifelogTool {
    fn name(&self) -> &str {
        "delete_lifelog"
    }

    fn description(&self) -> &str {
        "Permanently delete a specific lifelog entry. The upstream is not \
         guaranteed idempotent; repeating a delete may report not-found"
    }

    fn parameters_schema(&self) -> Value {
        params::json_schema(&by_id_specs())
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args = params::validate(&by_id_specs(), &args)?;
        let id = opt_str(&args, "id").unwrap_or_default();
        self.api.delete_lifelog(&id).await?;
        Ok(Value::String(format!(
            "Successfully deleted lifelog with ID: {id}"
        )))
    }
}

// --- search_lifelogs ---

struct SearchLifelogsTool {
    api: Arc<dyn LifelogApi>,
}

fn search_specs() -> Vec<ParamSpec> {
    vec![
        ParamSpec::optional(
            "query",
            ParamKind::String,
            "Substring to match against title, markdown, and summary",
        ),
        ParamSpec::optional("startDate", ParamKind::String, "Range start, YYYY-MM-DD"),
        ParamSpec::optional("endDate", ParamKind::String, "Range end, YYYY-MM-DD"),
        ParamSpec::optional("isStarred", ParamKind::Boolean, "Only starred entries"),
        ParamSpec::with_default(
            "limit",
            ParamKind::Integer,
            "Maximum entries to fetch and return",
            serde_json::json!(10),
        ),
    ]
}

#[async_trait]
impl Tool for SearchLifelogsTool {
    fn name(&self) -> &str {
        "search_lifelogs"
    }

    fn description(&self) -> &str {
        "Search lifelogs by date range and text. Matching runs client-side \
         over a single fetched page, so results may be incomplete and \
         pagination cursors do not apply to them"
    }

    fn parameters_schema(&self) -> Value {
        params::json_schema(&search_specs())
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args = params::validate(&search_specs(), &args)?;
        let limit = opt_u32(&args, "limit")?.unwrap_or(10);

        // Date bounds expand with fixed UTC anchors regardless of any
        // timezone the caller used elsewhere.
        let start_date = opt_str(&args, "startDate");
        let end_date = opt_str(&args, "endDate");
        let query = LifelogQuery {
            start: start_date.as_ref().map(|d| format!("{d}T00:00:00Z")),
            end: end_date.as_ref().map(|d| format!("{d}T23:59:59Z")),
            include_markdown: Some(true),
            limit: Some(limit),
            is_starred: opt_bool(&args, "isStarred"),
            ..Default::default()
        };
        let page = self.api.get_lifelogs(&query).await?;

        let needle = opt_str(&args, "query");
        let mut results = match needle.as_deref() {
            Some(q) if !q.is_empty() => search::filter(&page.lifelogs, q),
            _ => page.lifelogs,
        };
        results.truncate(limit as usize);

        let total_found = results.len();
        let date_range = match (&start_date, &end_date) {
            (Some(s), Some(e)) => format!("{s} to {e}"),
            _ => "All dates".to_string(),
        };
        Ok(serde_json::json!({
            "results": results,
            "totalFound": total_found,
            "query": needle.unwrap_or_else(|| "No text filter".to_string()),
            "dateRange": date_range,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifelog_client::MockApi;
    use lifelog_core::errors::UpstreamError;
    use lifelog_core::lifelog::{Lifelog, LifelogPage};
    use lifelog_core::tools::ToolContent;

    fn log(id: &str, title: &str, markdown: Option<&str>) -> Lifelog {
        Lifelog {
            id: id.into(),
            title: title.into(),
            markdown: markdown.map(str::to_string),
            content_nodes: Vec::new(),
            start_time: "2025-05-01T09:00:00Z".into(),
            end_time: "2025-05-01T09:15:00Z".into(),
            is_starred: false,
            last_updated: "2025-05-01T09:20:00Z".into(),
            transcript_summary: None,
        }
    }

    fn page(logs: Vec<Lifelog>, next_cursor: Option<&str>) -> LifelogPage {
        LifelogPage {
            count: logs.len() as u64,
            lifelogs: logs,
            next_cursor: next_cursor.map(str::to_string),
        }
    }

    fn registry_with(mock: Arc<MockApi>) -> ToolRegistry {
        ToolRegistry::with_lifelog_tools(mock)
    }

    fn envelope_text(result: &CallToolResult) -> &str {
        let ToolContent::Text { text } = &result.content[0];
        text
    }

    fn envelope_json(result: &CallToolResult) -> Value {
        serde_json::from_str(envelope_text(result)).unwrap()
    }

    #[test]
    fn registers_four_tools_sorted() {
        let registry = registry_with(Arc::new(MockApi::new()));
        let names: Vec<String> = registry
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "delete_lifelog",
                "get_lifelog_by_id",
                "get_lifelogs",
                "search_lifelogs",
            ]
        );
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn definitions_carry_schemas() {
        let registry = registry_with(Arc::new(MockApi::new()));
        let defs = registry.definitions();
        let search = defs.iter().find(|d| d.name == "search_lifelogs").unwrap();
        assert_eq!(search.input_schema["type"], "object");
        assert_eq!(search.input_schema["properties"]["limit"]["default"], 10);
        let by_id = defs.iter().find(|d| d.name == "get_lifelog_by_id").unwrap();
        assert_eq!(by_id.input_schema["required"], serde_json::json!(["id"]));
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_envelope() {
        let registry = registry_with(Arc::new(MockApi::new()));
        let result = registry.dispatch("bogus_tool", Value::Null).await;
        assert!(result.is_error);
        assert_eq!(envelope_text(&result), "Error: Unknown tool: bogus_tool");
    }

    #[tokio::test]
    async fn get_lifelogs_wraps_page() {
        let mock = Arc::new(MockApi::new());
        mock.push_page(page(vec![log("ll_1", "Standup", None)], Some("tok")));
        let registry = registry_with(Arc::clone(&mock));

        let result = registry
            .dispatch("get_lifelogs", serde_json::json!({"limit": 3}))
            .await;
        assert!(!result.is_error);
        let body = envelope_json(&result);
        assert_eq!(body["lifelogs"][0]["id"], "ll_1");
        assert_eq!(body["cursor"], "tok");
        assert_eq!(body["hasMore"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(mock.list_calls()[0].limit, Some(3));
    }

    #[tokio::test]
    async fn get_lifelogs_passes_filters_through() {
        let mock = Arc::new(MockApi::new());
        mock.push_page(page(Vec::new(), None));
        let registry = registry_with(Arc::clone(&mock));

        let result = registry
            .dispatch(
                "get_lifelogs",
                serde_json::json!({
                    "date": "2025-05-01",
                    "timezone": "America/New_York",
                    "direction": "desc",
                    "includeMarkdown": false,
                    "isStarred": true,
                }),
            )
            .await;
        assert!(!result.is_error);
        let sent = &mock.list_calls()[0];
        assert_eq!(sent.date.as_deref(), Some("2025-05-01"));
        assert_eq!(sent.timezone.as_deref(), Some("America/New_York"));
        assert_eq!(sent.direction, Some(Direction::Desc));
        assert_eq!(sent.include_markdown, Some(false));
        assert_eq!(sent.is_starred, Some(true));
    }

    #[tokio::test]
    async fn get_lifelogs_rejects_bad_direction() {
        let mock = Arc::new(MockApi::new());
        let registry = registry_with(Arc::clone(&mock));
        let result = registry
            .dispatch("get_lifelogs", serde_json::json!({"direction": "sideways"}))
            .await;
        assert!(result.is_error);
        assert!(envelope_text(&result).contains("direction"));
        assert!(mock.list_calls().is_empty(), "handler must not run");
    }

    #[tokio::test]
    async fn get_lifelogs_rejects_unknown_field() {
        let registry = registry_with(Arc::new(MockApi::new()));
        let result = registry
            .dispatch("get_lifelogs", serde_json::json!({"bogus": 1}))
            .await;
        assert!(result.is_error);
        assert!(envelope_text(&result).contains("unknown field `bogus`"));
    }

    #[tokio::test]
    async fn get_by_id_requires_id() {
        let registry = registry_with(Arc::new(MockApi::new()));
        let result = registry
            .dispatch("get_lifelog_by_id", serde_json::json!({}))
            .await;
        assert!(result.is_error);
        assert!(envelope_text(&result).contains("missing required parameter: id"));
    }

    #[tokio::test]
    async fn get_by_id_returns_record() {
        let mock = Arc::new(MockApi::new());
        mock.push_lifelog(log("ll_9", "Walk", None));
        let registry = registry_with(Arc::clone(&mock));

        let result = registry
            .dispatch("get_lifelog_by_id", serde_json::json!({"id": "ll_9"}))
            .await;
        assert!(!result.is_error);
        assert_eq!(envelope_json(&result)["id"], "ll_9");
        assert_eq!(mock.by_id_calls(), vec!["ll_9".to_string()]);
    }

    #[tokio::test]
    async fn get_by_id_not_found_becomes_envelope() {
        let mock = Arc::new(MockApi::new());
        mock.push_by_id_error(UpstreamError::NotFound("no such lifelog".into()));
        let registry = registry_with(mock);

        let result = registry
            .dispatch("get_lifelog_by_id", serde_json::json!({"id": "ll_404"}))
            .await;
        assert!(result.is_error);
        assert_eq!(
            envelope_text(&result),
            "Error: not found: no such lifelog"
        );
    }

    #[tokio::test]
    async fn delete_returns_confirmation_text() {
        let mock = Arc::new(MockApi::new());
        mock.push_delete_ok();
        let registry = registry_with(Arc::clone(&mock));

        let result = registry
            .dispatch("delete_lifelog", serde_json::json!({"id": "ll_7"}))
            .await;
        assert!(!result.is_error);
        assert_eq!(
            envelope_text(&result),
            "Successfully deleted lifelog with ID: ll_7"
        );
    }

    #[tokio::test]
    async fn repeated_delete_surfaces_not_found() {
        let mock = Arc::new(MockApi::new());
        mock.push_delete_error(UpstreamError::NotFound("already gone".into()));
        let registry = registry_with(mock);

        let result = registry
            .dispatch("delete_lifelog", serde_json::json!({"id": "ll_7"}))
            .await;
        assert!(result.is_error);
        assert_eq!(envelope_text(&result), "Error: not found: already gone");
    }

    #[tokio::test]
    async fn search_filters_client_side() {
        let mock = Arc::new(MockApi::new());
        let mut logs = Vec::new();
        for i in 0..6 {
            logs.push(log(&format!("ll_{i}"), &format!("Entry {i}"), None));
        }
        logs.push(log("ll_6", "Planning", Some("daily standup notes")));
        logs.push(log("ll_7", "Retro", Some("the standup ran long")));
        mock.push_page(page(logs, Some("ignored")));
        let registry = registry_with(Arc::clone(&mock));

        let result = registry
            .dispatch(
                "search_lifelogs",
                serde_json::json!({"query": "standup", "limit": 5}),
            )
            .await;
        assert!(!result.is_error);
        let body = envelope_json(&result);
        assert_eq!(body["totalFound"], 2);
        assert_eq!(body["results"][0]["id"], "ll_6");
        assert_eq!(body["results"][1]["id"], "ll_7");
        assert_eq!(body["query"], "standup");

        // page fetch requested up to the caller's limit, markdown included
        let sent = &mock.list_calls()[0];
        assert_eq!(sent.limit, Some(5));
        assert_eq!(sent.include_markdown, Some(true));
    }

    #[tokio::test]
    async fn search_expands_dates_with_utc_anchors() {
        let mock = Arc::new(MockApi::new());
        mock.push_page(page(Vec::new(), None));
        let registry = registry_with(Arc::clone(&mock));

        let result = registry
            .dispatch(
                "search_lifelogs",
                serde_json::json!({"startDate": "2025-05-01", "endDate": "2025-05-02"}),
            )
            .await;
        assert!(!result.is_error);
        let sent = &mock.list_calls()[0];
        assert_eq!(sent.start.as_deref(), Some("2025-05-01T00:00:00Z"));
        assert_eq!(sent.end.as_deref(), Some("2025-05-02T23:59:59Z"));
        assert_eq!(envelope_json(&result)["dateRange"], "2025-05-01 to 2025-05-02");
    }

    #[tokio::test]
    async fn search_without_query_returns_page() {
        let mock = Arc::new(MockApi::new());
        mock.push_page(page(
            vec![log("ll_1", "A", None), log("ll_2", "B", None)],
            None,
        ));
        let registry = registry_with(mock);

        let result = registry
            .dispatch("search_lifelogs", serde_json::json!({}))
            .await;
        assert!(!result.is_error);
        let body = envelope_json(&result);
        assert_eq!(body["totalFound"], 2);
        assert_eq!(body["query"], "No text filter");
        assert_eq!(body["dateRange"], "All dates");
    }

    #[tokio::test]
    async fn search_upstream_failure_becomes_envelope() {
        let mock = Arc::new(MockApi::new());
        mock.push_list_error(UpstreamError::ServerError {
            status: 502,
            body: "bad gateway".into(),
        });
        let registry = registry_with(mock);

        let result = registry
            .dispatch("search_lifelogs", serde_json::json!({"query": "x"}))
            .await;
        assert!(result.is_error);
        assert!(envelope_text(&result).contains("upstream error 502"));
    }
}
