//! Line-oriented front end commands and rendering.
//!
//! Lines starting with `:` are commands; anything else is a question for the
//! active connection.

use crate::chart::{chart_data, ChartData};
use crate::chat::{AnswerKind, ChatTurn, Transcript};
use crate::connection::{Connection, ConnectionFields, ConnectionState};
use crate::db::ResultSet;
use crate::error::{ChatError, Result};

/// Rows shown before a table is cut off.
const MAX_TABLE_ROWS: usize = 50;

/// Widest a table cell may get before truncation.
const MAX_CELL_WIDTH: usize = 40;

pub const HELP: &str = "\
Commands:
  :list                     List saved connections
  :use <n|id>               Select a connection by list number or id
  :retest                   Test the active connection again
  :leave                    Deselect the active connection
  :add name=.. database=.. [type=.. host=.. port=.. user=.. password=..]
                            Save a new connection
  :delete <n|id>            Delete a saved connection
  :history                  Show the transcript for the active connection
  :help                     Show this help
  :quit                     Exit
Anything else is sent as a question.";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    List,
    Use(String),
    Retest,
    Leave,
    Add(ConnectionFields),
    Delete(String),
    History,
    Help,
    Quit,
    Ask(String),
    Empty,
}

impl ReplCommand {
    /// Parses one input line.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Self::Empty);
        }
        let Some(rest) = trimmed.strip_prefix(':') else {
            return Ok(Self::Ask(line.to_string()));
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match name {
            "list" | "ls" => Ok(Self::List),
            "use" => Ok(Self::Use(required(args, ":use <n|id>")?)),
            "retest" => Ok(Self::Retest),
            "leave" => Ok(Self::Leave),
            "add" => parse_fields(args).map(Self::Add),
            "delete" | "rm" => Ok(Self::Delete(required(args, ":delete <n|id>")?)),
            "history" => Ok(Self::History),
            "help" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(ChatError::validation(format!(
                "Unknown command ':{other}'. Type :help for a list."
            ))),
        }
    }
}

fn required(args: &str, usage: &str) -> Result<String> {
    if args.is_empty() {
        Err(ChatError::validation(format!("Usage: {usage}")))
    } else {
        Ok(args.to_string())
    }
}

/// Splits `key=value` pairs, honoring double or single quotes around values.
fn tokenize_pairs(input: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(ChatError::validation(format!(
                "Expected key=value, got '{key}'"
            )));
        }

        let mut value = String::new();
        match chars.peek().copied() {
            Some(quote @ ('"' | '\'')) => {
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(ChatError::validation(format!(
                        "Unterminated quote in '{key}'"
                    )));
                }
            }
            _ => {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
            }
        }
        pairs.push((key.to_lowercase(), value));
    }

    Ok(pairs)
}

/// Builds the add-connection form from `key=value` arguments.
fn parse_fields(args: &str) -> Result<ConnectionFields> {
    let mut fields = ConnectionFields::default();
    for (key, value) in tokenize_pairs(args)? {
        match key.as_str() {
            "name" => fields.name = value,
            "database" | "db" => fields.database = value,
            "type" | "engine" => fields.engine = value.parse().map_err(ChatError::validation)?,
            "host" => fields.host = value,
            "port" => fields.port = value,
            "user" | "username" => fields.username = value,
            "password" => fields.password = value,
            other => {
                return Err(ChatError::validation(format!("Unknown field '{other}'")));
            }
        }
    }
    Ok(fields)
}

/// Resolves a `:use`/`:delete` argument: a 1-based list number or an id.
pub fn resolve_connection<'a>(connections: &'a [Connection], arg: &str) -> Option<&'a Connection> {
    if let Ok(n) = arg.parse::<usize>() {
        if (1..=connections.len()).contains(&n) {
            return connections.get(n - 1);
        }
    }
    connections.iter().find(|c| c.id.as_str() == arg)
}

/// Renders the saved connection list.
pub fn render_connections(connections: &[Connection], active: Option<&Connection>) -> String {
    if connections.is_empty() {
        return "No saved connections. Add one with :add".to_string();
    }
    connections
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let marker = if active.is_some_and(|a| a.id == c.id) {
                '*'
            } else {
                ' '
            };
            format!("{marker}{:>3}. {}  {}", i + 1, c.name, c.display_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the connection status line.
pub fn render_state(active: Option<&Connection>, state: &ConnectionState) -> String {
    let name = active.map(|c| c.name.as_str()).unwrap_or("");
    match state {
        ConnectionState::Idle => "No connection selected.".to_string(),
        ConnectionState::Testing => format!("Testing {name}..."),
        ConnectionState::Connected => format!("Connected to {name}."),
        ConnectionState::Failed(reason) => format!("{name}: {reason}"),
    }
}

fn truncate(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        return single_line;
    }
    let mut cut: String = single_line.chars().take(MAX_CELL_WIDTH - 1).collect();
    cut.push('…');
    cut
}

/// Renders rows as a plain-text table.
pub fn render_table(results: &ResultSet) -> String {
    let columns = results.columns();
    let rows: Vec<Vec<String>> = results
        .rows()
        .iter()
        .take(MAX_TABLE_ROWS)
        .map(|row| {
            columns
                .iter()
                .map(|col| {
                    row.get(col)
                        .map(|v| truncate(&v.to_display_string()))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            rows.iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![format_line(columns.clone())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &rows {
        lines.push(format_line(row.iter().map(String::as_str).collect()));
    }
    if results.len() > MAX_TABLE_ROWS {
        lines.push(format!("... {} more rows", results.len() - MAX_TABLE_ROWS));
    }
    lines.join("\n")
}

fn render_chart(data: &ChartData) -> String {
    match data {
        ChartData::Pie { slices } => {
            let total: f64 = slices.iter().map(|s| s.value).sum();
            let parts: Vec<String> = slices
                .iter()
                .map(|s| {
                    let share = if total > 0.0 { s.value / total * 100.0 } else { 0.0 };
                    format!("{} {share:.0}%", s.name)
                })
                .collect();
            format!("[pie] {}", parts.join(", "))
        }
        ChartData::Bar { series, points } => {
            format!("[bar] {} over {} labels", series.join(", "), points.len())
        }
        ChartData::Line { series, points } => {
            format!("[line] {} over {} points", series.join(", "), points.len())
        }
    }
}

/// Renders one transcript turn.
pub fn render_turn(turn: &ChatTurn) -> String {
    let Some(answer) = turn.as_assistant() else {
        return format!("> {}", turn.content());
    };
    if answer.error {
        return format!("Error: {}", answer.content);
    }

    let mut out = answer.content.clone();
    match (answer.kind(), &answer.results) {
        (AnswerKind::Rows, Some(results)) => {
            out.push_str("\n\n");
            out.push_str(&render_table(results));
            if let Some(data) = chart_data(results, &answer.chart) {
                out.push_str("\n\n");
                out.push_str(&render_chart(&data));
            }
        }
        (AnswerKind::EmptyResult, _) => out.push_str("\n\n(no rows)"),
        _ => {}
    }
    out
}

/// Renders a whole transcript.
pub fn render_transcript(transcript: &Transcript) -> String {
    if transcript.is_empty() {
        return "No messages yet.".to_string();
    }
    transcript
        .turns()
        .iter()
        .map(render_turn)
        .collect::<Vec<_>>()
        .join("\n\n")
}
