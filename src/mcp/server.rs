use std::io::{BufRead, Write};

use colored::Colorize;
use serde_json::json;

use super::protocol::*;
use crate::app::App;
use crate::error::{Result, RlmError};
use crate::insights::{Category, Importance};
use crate::search::SearchFilters;

pub struct McpServer {
    app: App,
}

impl McpServer {
    pub fn new(app: App) -> Self {
        Self { app }
    }

    /// Run the MCP server on stdio: one JSON-RPC request per line in,
    /// one JSON-RPC response per line out.
    pub fn run(&mut self) -> Result<()> {
        eprintln!("{}", "rlm-memory MCP server starting...".green());
        eprintln!("{}", "Listening on stdio".dimmed());

        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        let reader = stdin.lock();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let request: Request = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(e) => {
                    eprintln!("{} failed to parse request: {}", "error:".red(), e);
                    continue;
                }
            };

            let response = self.handle_request(request);
            let response_json = serde_json::to_string(&response)?;
            writeln!(stdout, "{response_json}")?;
            stdout.flush()?;
        }

        Ok(())
    }

    fn handle_request(&mut self, request: Request) -> Response {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params),
            _ => Response::error(request.id, -32601, format!("method not found: {}", request.method)),
        }
    }

    fn handle_initialize(&self, id: serde_json::Value) -> Response {
        Response::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": "rlm-memory",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: serde_json::Value) -> Response {
        let tools = tool_definitions();
        Response::success(id, json!({ "tools": tools }))
    }

    fn handle_tools_call(&mut self, id: serde_json::Value, params: serde_json::Value) -> Response {
        let tool_name = match params.get("name").and_then(|v| v.as_str()) {
            Some(name) => name.to_string(),
            None => return Response::error(id, -32602, "missing tool name"),
        };
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        match self.dispatch(&tool_name, args) {
            Ok(value) => Response::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": value.to_string() }]
                }),
            ),
            Err(e) => Response::error(id, -32000, format!("tool error: {e}")),
        }
    }

    fn dispatch(&mut self, tool_name: &str, args: serde_json::Value) -> Result<serde_json::Value> {
        match tool_name {
            "remember" => self.call_remember(args),
            "recall" => self.call_recall(args),
            "forget" => self.call_forget(args),
            "status" => self.call_status(),
            "chunk" => self.call_chunk(args),
            "peek" => self.call_peek(args),
            "grep" => self.call_grep(args),
            "list_chunks" => self.call_list_chunks(args),
            "search" => self.call_search(args),
            "sessions" => self.call_sessions(args),
            "domains" => self.call_domains(),
            "retention_preview" => self.call_retention_preview(),
            "retention_run" => self.call_retention_run(args),
            "restore" => self.call_restore(args),
            other => Err(RlmError::NotFound(format!("unknown tool: {other}"))),
        }
    }

    fn call_remember(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let content = arg_str(&args, "content")?;
        let category = args
            .get("category")
            .and_then(|v| v.as_str())
            .and_then(Category::parse)
            .unwrap_or(Category::General);
        let importance = args
            .get("importance")
            .and_then(|v| v.as_str())
            .and_then(Importance::parse)
            .unwrap_or(Importance::Medium);
        let tags = arg_string_list(&args, "tags");
        let id = self.app.remember(content, category, importance, tags)?;
        Ok(json!({ "id": id }))
    }

    fn call_recall(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let query = args.get("query").and_then(|v| v.as_str());
        let category = args
            .get("category")
            .and_then(|v| v.as_str())
            .and_then(Category::parse);
        let importance = args
            .get("importance")
            .and_then(|v| v.as_str())
            .and_then(Importance::parse);
        let limit = args.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize);
        let insights = self.app.recall(query, category, importance, limit)?;
        Ok(json!({ "insights": insights }))
    }

    fn call_forget(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let id = arg_str(&args, "id")?;
        self.app.forget(id)?;
        Ok(json!({ "ok": true }))
    }

    fn call_status(&mut self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.app.status()?)?)
    }

    fn call_chunk(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let content = arg_str(&args, "content")?;
        let summary = args.get("summary").and_then(|v| v.as_str());
        let tags = arg_string_list(&args, "tags");
        let project = args.get("project").and_then(|v| v.as_str()).map(String::from);
        let ticket = args.get("ticket").and_then(|v| v.as_str()).map(String::from);
        let domain = args.get("domain").and_then(|v| v.as_str()).map(String::from);
        let result = self.app.chunk(content, summary, tags, project, ticket, domain)?;
        Ok(serde_json::to_value(result)?)
    }

    fn call_peek(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let id = arg_str(&args, "id")?;
        let start_line = args.get("start_line").and_then(|v| v.as_u64()).map(|n| n as usize);
        let end_line = args.get("end_line").and_then(|v| v.as_u64()).map(|n| n as usize);
        let (content, access_count) = self.app.peek(id, start_line, end_line)?;
        Ok(json!({ "content": content, "access_count": access_count }))
    }

    fn call_grep(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let pattern = arg_str(&args, "pattern")?;
        let filters = arg_filters(&args);
        let limit = arg_limit(&args);
        if args.get("fuzzy").and_then(|v| v.as_bool()).unwrap_or(false) {
            let threshold = args.get("threshold").and_then(|v| v.as_i64()).unwrap_or(0);
            let hits = self.app.grep_fuzzy(pattern, threshold, &filters, limit)?;
            Ok(json!({ "hits": hits }))
        } else {
            let hits = self.app.grep(pattern, &filters, limit)?;
            Ok(json!({ "hits": hits }))
        }
    }

    fn call_list_chunks(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let project = args.get("project").and_then(|v| v.as_str());
        let domain = args.get("domain").and_then(|v| v.as_str());
        let limit = args.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize);
        let chunks = self.app.list_chunks(project, domain, limit)?;
        Ok(json!({ "chunks": chunks }))
    }

    fn call_search(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let query = arg_str(&args, "query")?;
        let filters = arg_filters(&args);
        let include_insights = args
            .get("include_insights")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let limit = arg_limit(&args);
        let results = self.app.search(query, &filters, include_insights, limit)?;
        Ok(json!({ "results": results }))
    }

    fn call_sessions(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let project = args.get("project").and_then(|v| v.as_str());
        let domain = args.get("domain").and_then(|v| v.as_str());
        let limit = args.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize);
        let sessions = self.app.sessions(project, domain, limit)?;
        Ok(json!({ "sessions": sessions }))
    }

    fn call_domains(&mut self) -> Result<serde_json::Value> {
        Ok(json!({ "domains": self.app.domains()? }))
    }

    fn call_retention_preview(&mut self) -> Result<serde_json::Value> {
        Ok(json!({ "candidates": self.app.retention_preview()? }))
    }

    fn call_retention_run(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let archive = args.get("archive").and_then(|v| v.as_bool()).unwrap_or(true);
        let purge = args.get("purge").and_then(|v| v.as_bool()).unwrap_or(false);
        Ok(serde_json::to_value(self.app.retention_run(archive, purge)?)?)
    }

    fn call_restore(&mut self, args: serde_json::Value) -> Result<serde_json::Value> {
        let id = arg_str(&args, "id")?;
        self.app.restore(id)?;
        Ok(json!({ "ok": true }))
    }
}

fn arg_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RlmError::InvalidId(format!("missing argument: {key}")))
}

fn arg_string_list(args: &serde_json::Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn arg_limit(args: &serde_json::Value) -> usize {
    args.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize
}

fn arg_filters(args: &serde_json::Value) -> SearchFilters {
    SearchFilters {
        project: args.get("project").and_then(|v| v.as_str()).map(String::from),
        domain: args.get("domain").and_then(|v| v.as_str()).map(String::from),
        date_from: args.get("date_from").and_then(|v| v.as_str()).map(String::from),
        date_to: args.get("date_to").and_then(|v| v.as_str()).map(String::from),
        entity: args.get("entity").and_then(|v| v.as_str()).map(String::from),
    }
}

fn tool_definitions() -> Vec<Tool> {
    let empty_schema = |props: serde_json::Value, required: Vec<&str>| {
        json!({ "type": "object", "properties": props, "required": required })
    };

    vec![
        Tool {
            name: "remember".to_string(),
            description: "Store a short insight (decision, fact, preference, finding, todo)".to_string(),
            input_schema: empty_schema(
                json!({
                    "content": {"type": "string"},
                    "category": {"type": "string"},
                    "importance": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}}
                }),
                vec!["content"],
            ),
        },
        Tool {
            name: "recall".to_string(),
            description: "Recall insights ranked by relevance to a query".to_string(),
            input_schema: empty_schema(
                json!({
                    "query": {"type": "string"},
                    "category": {"type": "string"},
                    "importance": {"type": "string"},
                    "limit": {"type": "integer"}
                }),
                vec![],
            ),
        },
        Tool {
            name: "forget".to_string(),
            description: "Remove an insight by id".to_string(),
            input_schema: empty_schema(json!({"id": {"type": "string"}}), vec!["id"]),
        },
        Tool {
            name: "status".to_string(),
            description: "Report chunk/insight/session counts and embedding provider".to_string(),
            input_schema: empty_schema(json!({}), vec![]),
        },
        Tool {
            name: "chunk".to_string(),
            description: "Store a content-addressed chunk of text".to_string(),
            input_schema: empty_schema(
                json!({
                    "content": {"type": "string"},
                    "summary": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "project": {"type": "string"},
                    "ticket": {"type": "string"},
                    "domain": {"type": "string"}
                }),
                vec!["content"],
            ),
        },
        Tool {
            name: "peek".to_string(),
            description: "Read a chunk's content, optionally sliced by line range".to_string(),
            input_schema: empty_schema(
                json!({
                    "id": {"type": "string"},
                    "start_line": {"type": "integer"},
                    "end_line": {"type": "integer"}
                }),
                vec!["id"],
            ),
        },
        Tool {
            name: "grep".to_string(),
            description: "Regex search, or fuzzy line-by-line search, over active chunk bodies and summaries".to_string(),
            input_schema: empty_schema(
                json!({
                    "pattern": {"type": "string"},
                    "fuzzy": {"type": "boolean"},
                    "threshold": {"type": "integer"},
                    "project": {"type": "string"},
                    "domain": {"type": "string"},
                    "date_from": {"type": "string"},
                    "date_to": {"type": "string"},
                    "entity": {"type": "string"},
                    "limit": {"type": "integer"}
                }),
                vec!["pattern"],
            ),
        },
        Tool {
            name: "list_chunks".to_string(),
            description: "List chunk metadata, optionally filtered by project/domain".to_string(),
            input_schema: empty_schema(
                json!({
                    "project": {"type": "string"},
                    "domain": {"type": "string"},
                    "limit": {"type": "integer"}
                }),
                vec![],
            ),
        },
        Tool {
            name: "search".to_string(),
            description: "Hybrid BM25 + cosine search across chunks and insights".to_string(),
            input_schema: empty_schema(
                json!({
                    "query": {"type": "string"},
                    "project": {"type": "string"},
                    "domain": {"type": "string"},
                    "date_from": {"type": "string"},
                    "date_to": {"type": "string"},
                    "entity": {"type": "string"},
                    "include_insights": {"type": "boolean"},
                    "limit": {"type": "integer"}
                }),
                vec!["query"],
            ),
        },
        Tool {
            name: "sessions".to_string(),
            description: "List recorded sessions, optionally filtered by project/domain".to_string(),
            input_schema: empty_schema(
                json!({
                    "project": {"type": "string"},
                    "domain": {"type": "string"},
                    "limit": {"type": "integer"}
                }),
                vec![],
            ),
        },
        Tool {
            name: "domains".to_string(),
            description: "List curated and observed domains".to_string(),
            input_schema: empty_schema(json!({}), vec![]),
        },
        Tool {
            name: "retention_preview".to_string(),
            description: "List chunks that would be archived or purged right now".to_string(),
            input_schema: empty_schema(json!({}), vec![]),
        },
        Tool {
            name: "retention_run".to_string(),
            description: "Apply the archive/purge retention policy".to_string(),
            input_schema: empty_schema(
                json!({"archive": {"type": "boolean"}, "purge": {"type": "boolean"}}),
                vec![],
            ),
        },
        Tool {
            name: "restore".to_string(),
            description: "Restore an archived chunk back to active storage".to_string(),
            input_schema: empty_schema(json!({"id": {"type": "string"}}), vec!["id"]),
        },
    ]
}
