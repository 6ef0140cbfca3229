use chrono::DateTime;
use thiserror::Error;
use uuid::Uuid;

use comment_thread::domain::comment::{Comment, CommentId};
use comment_thread::usecase::comments::{CommentStore, LoadState};
use comment_thread::usecase::contracts::{CommentRepository, SyncChannel};

pub const HELP: &str = "\
commands:
  add <text>              post a top-level comment
  reply <id> <text>       reply to a comment
  delete <id>             delete a comment and its replies
  list                    print the comment tree
  count                   print the total number of comments
  refresh                 reload from storage
  status                  print the store status
  help                    show this message
  quit                    exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Reply { parent_id: CommentId, text: String },
    Delete(CommentId),
    List,
    Count,
    Refresh,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty input")]
    Empty,
    #[error("unknown command `{0}`, type `help` for a list")]
    Unknown(String),
    #[error("missing {0}")]
    MissingArgument(&'static str),
    #[error("`{0}` is not a comment id")]
    InvalidId(String),
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CommandError::Empty);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_ascii_lowercase().as_str() {
        // Whitespace-only text is passed through; the store ignores it.
        "add" => Ok(Command::Add(rest.to_string())),
        "reply" => {
            let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if id.is_empty() {
                return Err(CommandError::MissingArgument("comment id"));
            }
            Ok(Command::Reply {
                parent_id: parse_id(id)?,
                text: text.trim().to_string(),
            })
        }
        "delete" | "rm" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument("comment id"));
            }
            Ok(Command::Delete(parse_id(rest)?))
        }
        "list" | "ls" => Ok(Command::List),
        "count" => Ok(Command::Count),
        "refresh" => Ok(Command::Refresh),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_id(raw: &str) -> Result<CommentId, CommandError> {
    Uuid::parse_str(raw).map_err(|_| CommandError::InvalidId(raw.to_string()))
}

/// Indented text rendering of the forest, one comment per line.
pub fn render(comments: &[Comment]) -> String {
    let mut out = String::new();
    let mut stack: Vec<(&Comment, usize)> = comments.iter().rev().map(|c| (c, 0)).collect();
    while let Some((comment, depth)) = stack.pop() {
        let when = DateTime::from_timestamp_millis(comment.timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| comment.timestamp.to_string());
        out.push_str(&format!(
            "{}- {} [{}] ({})\n",
            "  ".repeat(depth),
            comment.text,
            comment.id,
            when
        ));
        stack.extend(comment.replies.iter().rev().map(|reply| (reply, depth + 1)));
    }
    out
}

pub async fn execute<R, C>(store: &CommentStore<R, C>, command: Command)
where
    R: CommentRepository + 'static,
    C: SyncChannel + 'static,
{
    match command {
        Command::Add(text) => match store.add(&text, None).await {
            Ok(Some(comment)) => println!("added {}", comment.id),
            Ok(None) => println!("nothing to add"),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Reply { parent_id, text } => match store.add(&text, Some(parent_id)).await {
            Ok(Some(comment)) => println!("replied {}", comment.id),
            Ok(None) => println!("nothing to add (empty text or unknown comment)"),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::Delete(id) => match store.delete(id).await {
            Ok(()) => println!("deleted {id}"),
            Err(e) => println!("{}", e.user_message()),
        },
        Command::List => {
            let comments = store.comments();
            if comments.is_empty() {
                println!("no comments yet");
            } else {
                print!("{}", render(&comments));
            }
        }
        Command::Count => println!("{} comments", store.total_count()),
        Command::Refresh => {
            if let Err(e) = store.refresh().await {
                println!("{}", e.user_message());
            } else {
                print!("{}", render(&store.comments()));
            }
        }
        Command::Status => match store.status() {
            LoadState::Loading => println!("loading"),
            LoadState::Ready => println!("ready, {} comments", store.total_count()),
            LoadState::Error(message) => println!("error: {message}"),
        },
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}
