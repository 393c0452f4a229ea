#![allow(dead_code)]
mod app;
mod chunks;
mod cli;
mod config;
mod embeddings;
mod error;
mod insights;
mod io_safety;
mod mcp;
mod nav;
mod retention;
mod search;
mod sessions;
mod status;
mod tokenizer;

use std::io::Read;

use clap::Parser;
use colored::Colorize;

use app::App;
use cli::{Cli, Commands, RetentionCommand};
use config::Config;
use error::Result;
use insights::{Category, Importance};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.storage_root {
        Some(root) => Config::with_root(root),
        None => Config::load()?,
    };

    let mut app = App::new(config);

    match cli.command {
        Commands::Serve => {
            let mut server = mcp::server::McpServer::new(app);
            server.run()
        }
        Commands::Status => cmd_status(&app),
        Commands::Chunk {
            content,
            summary,
            tags,
            project,
            ticket,
            domain,
        } => cmd_chunk(&mut app, content, summary, tags, project, ticket, domain),
        Commands::Peek {
            id,
            start_line,
            end_line,
        } => cmd_peek(&app, &id, start_line, end_line),
        Commands::Grep {
            pattern,
            fuzzy,
            threshold,
            filters,
            limit,
        } => cmd_grep(&app, &pattern, fuzzy, threshold, filters.into(), limit),
        Commands::ListChunks {
            project,
            domain,
            limit,
        } => cmd_list_chunks(&app, project.as_deref(), domain.as_deref(), limit),
        Commands::Search {
            query,
            filters,
            include_insights,
            limit,
        } => cmd_search(&app, &query, filters.into(), include_insights, limit),
        Commands::Retention { command } => match command {
            RetentionCommand::Preview => cmd_retention_preview(&app),
            RetentionCommand::Run { archive, purge } => cmd_retention_run(&app, archive, purge),
        },
        Commands::Restore { id } => cmd_restore(&app, &id),
        Commands::Sessions {
            project,
            domain,
            limit,
        } => cmd_sessions(&app, project.as_deref(), domain.as_deref(), limit),
        Commands::Domains => cmd_domains(&app),
        Commands::Remember {
            content,
            category,
            importance,
            tags,
        } => cmd_remember(&app, &content, &category, &importance, tags),
        Commands::Recall {
            query,
            category,
            importance,
            limit,
        } => cmd_recall(&app, query.as_deref(), category.as_deref(), importance.as_deref(), limit),
        Commands::Forget { id } => cmd_forget(&app, &id),
    }
}

fn read_content_or_stdin(content: Option<String>) -> Result<String> {
    match content {
        Some(c) => Ok(c),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn cmd_status(app: &App) -> Result<()> {
    let report = app.status()?;
    println!("{}", "rlm-memory status".bold());
    println!("  storage root:      {}", report.storage_root.display());
    println!("  active chunks:     {}", report.active_chunks);
    println!("  archived chunks:   {}", report.archived_chunks);
    println!("  insights:          {}", report.insights);
    println!("  sessions:          {}", report.sessions);
    match &report.embedding_provider {
        Some(name) => println!("  embedding provider: {}", name.green()),
        None => println!("  embedding provider: {}", "none (BM25-only)".yellow()),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_chunk(
    app: &mut App,
    content: Option<String>,
    summary: Option<String>,
    tags: Vec<String>,
    project: Option<String>,
    ticket: Option<String>,
    domain: Option<String>,
) -> Result<()> {
    let content = read_content_or_stdin(content)?;
    let result = app.chunk(&content, summary.as_deref(), tags, project, ticket, domain)?;
    if result.duplicate {
        println!("{} {}", "duplicate:".yellow(), result.chunk_id);
    } else {
        println!("{} {}", "chunked:".green(), result.chunk_id);
    }
    println!("  summary: {}", result.summary);
    println!("  tokens:  {}", result.tokens);
    Ok(())
}

fn cmd_peek(app: &App, id: &str, start_line: Option<usize>, end_line: Option<usize>) -> Result<()> {
    let (content, access_count) = app.peek(id, start_line, end_line)?;
    println!("{content}");
    eprintln!("{} access_count={}", "—".dimmed(), access_count);
    Ok(())
}

fn cmd_grep(
    app: &App,
    pattern: &str,
    fuzzy: bool,
    threshold: i64,
    filters: search::SearchFilters,
    limit: usize,
) -> Result<()> {
    if fuzzy {
        for hit in app.grep_fuzzy(pattern, threshold, &filters, limit)? {
            println!("{} {} ({})", hit.id.cyan(), hit.summary, hit.score);
        }
    } else {
        for hit in app.grep(pattern, &filters, limit)? {
            println!("{}:{}: {}", hit.id.cyan(), hit.line_no, hit.line);
        }
    }
    Ok(())
}

fn cmd_list_chunks(app: &App, project: Option<&str>, domain: Option<&str>, limit: Option<usize>) -> Result<()> {
    for c in app.list_chunks(project, domain, limit)? {
        let archived_tag = if c.archived { " [archived]".dimmed().to_string() } else { String::new() };
        println!("{} {}{}", c.id.cyan(), c.summary, archived_tag);
    }
    Ok(())
}

fn cmd_search(
    app: &App,
    query: &str,
    filters: search::SearchFilters,
    include_insights: bool,
    limit: usize,
) -> Result<()> {
    for r in app.search(query, &filters, include_insights, limit)? {
        println!("{:.3} [{}] {} — {}", r.score, r.kind, r.id.cyan(), r.preview);
    }
    Ok(())
}

fn cmd_retention_preview(app: &App) -> Result<()> {
    for c in app.retention_preview()? {
        println!("{} {} ({})", c.action.yellow(), c.id.cyan(), c.summary);
    }
    Ok(())
}

fn cmd_retention_run(app: &App, archive: bool, purge: bool) -> Result<()> {
    let report = app.retention_run(archive, purge)?;
    println!("{} archived: {}", "done:".green(), report.archived.len());
    println!("{} purged:   {}", "done:".green(), report.purged.len());
    for e in &report.errors {
        eprintln!("{} {}", "error:".red(), e);
    }
    Ok(())
}

fn cmd_restore(app: &App, id: &str) -> Result<()> {
    app.restore(id)?;
    println!("{} {}", "restored:".green(), id);
    Ok(())
}

fn cmd_sessions(app: &App, project: Option<&str>, domain: Option<&str>, limit: Option<usize>) -> Result<()> {
    for (key, record) in app.sessions(project, domain, limit)? {
        println!("{} ({} chunks)", key.cyan(), record.chunk_ids.len());
    }
    Ok(())
}

fn cmd_domains(app: &App) -> Result<()> {
    for d in app.domains()? {
        println!("{d}");
    }
    Ok(())
}

fn cmd_remember(app: &App, content: &str, category: &str, importance: &str, tags: Vec<String>) -> Result<()> {
    let category = Category::parse(category).unwrap_or(Category::General);
    let importance = Importance::parse(importance).unwrap_or(Importance::Medium);
    let id = app.remember(content, category, importance, tags)?;
    println!("{} {}", "remembered:".green(), id);
    Ok(())
}

fn cmd_recall(
    app: &App,
    query: Option<&str>,
    category: Option<&str>,
    importance: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let category = category.and_then(Category::parse);
    let importance = importance.and_then(Importance::parse);
    for insight in app.recall(query, category, importance, limit)? {
        println!("{} {}", insight.id.cyan(), insight.content);
    }
    Ok(())
}

fn cmd_forget(app: &App, id: &str) -> Result<()> {
    app.forget(id)?;
    println!("{} {}", "forgotten:".green(), id);
    Ok(())
}
