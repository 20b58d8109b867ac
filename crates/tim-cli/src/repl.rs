//! Line-oriented memory shell.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use tim_core::{validate_top_k, BucketId, OrganizeMode, OrganizeReport, ThinkInMemory, ThoughtMemory};

pub const HELP: &str = "\
commands:
  think <text>          store a thought
  ask <query>           recall, answer and store the post-thought (needs [llm])
  recall <k> <query>    top-k thoughts for a query
  forget <id>           drop obsolete thoughts in a bucket
  merge <id>            merge redundant thoughts in a bucket
  organize <id>         forget, then merge
  organize-all          organize every bucket
  show [id]             print one bucket or the whole memory
  stats                 memory and counter summary
  help                  this text
  quit                  leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Think(String),
    Ask(String),
    Recall { top_k: usize, query: String },
    Organize { bucket: BucketId, mode: OrganizeMode },
    OrganizeAll,
    Show(Option<BucketId>),
    Stats,
    Help,
    Quit,
    Empty,
}

impl ReplCommand {
    /// Parse one input line. Errors are messages for the user, never fatal.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "" => Ok(Self::Empty),
            "think" | "insert" => non_empty(rest, "think <text>").map(Self::Think),
            "ask" => non_empty(rest, "ask <query>").map(Self::Ask),
            "recall" => {
                let (k, query) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: recall <k> <query>".to_string())?;
                let top_k = k
                    .parse::<i64>()
                    .map_err(|_| format!("k must be an integer, got {k:?}"))
                    .and_then(|k| validate_top_k(k).map_err(|e| e.to_string()))?;
                Ok(Self::Recall {
                    top_k,
                    query: query.trim().to_string(),
                })
            }
            "forget" => bucket_arg(rest).map(|bucket| Self::Organize {
                bucket,
                mode: OrganizeMode::Forget,
            }),
            "merge" => bucket_arg(rest).map(|bucket| Self::Organize {
                bucket,
                mode: OrganizeMode::Merge,
            }),
            "organize-all" => Ok(Self::OrganizeAll),
            "organize_all" if rest.is_empty() => Ok(Self::OrganizeAll),
            "organize" | "organize_all" => bucket_arg(rest).map(|bucket| Self::Organize {
                bucket,
                mode: OrganizeMode::All,
            }),
            "show" | "display" if rest.is_empty() => Ok(Self::Show(None)),
            "show" | "display" => bucket_arg(rest).map(|b| Self::Show(Some(b))),
            "stats" => Ok(Self::Stats),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command {other:?}; type help")),
        }
    }
}

fn non_empty(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        return Err(format!("usage: {usage}"));
    }
    Ok(rest.to_string())
}

fn bucket_arg(rest: &str) -> Result<BucketId, String> {
    let raw = rest.split_whitespace().next().unwrap_or_default();
    let id: i64 = raw
        .parse()
        .map_err(|_| format!("bucket id must be an integer, got {raw:?}"))?;
    BucketId::try_from(id).map_err(|_| format!("bucket id must be >= 0, got {id}"))
}

/// A memory plus the optional agent loop bound to it.
pub struct Session {
    memory: Arc<ThoughtMemory>,
    agent: Option<ThinkInMemory>,
}

impl Session {
    pub fn new(memory: Arc<ThoughtMemory>, agent: Option<ThinkInMemory>) -> Self {
        Self { memory, agent }
    }

    pub fn memory(&self) -> &Arc<ThoughtMemory> {
        &self.memory
    }

    /// Run one command. Returns `false` when the session should end.
    ///
    /// Memory errors are printed and the session continues.
    pub async fn execute<W: Write>(&self, command: ReplCommand, out: &mut W) -> Result<bool> {
        match self.dispatch(command, out).await {
            Ok(keep_going) => Ok(keep_going),
            Err(e) => {
                writeln!(out, "error: {e:#}")?;
                Ok(true)
            }
        }
    }

    async fn dispatch<W: Write>(&self, command: ReplCommand, out: &mut W) -> Result<bool> {
        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => return Ok(false),
            ReplCommand::Help => writeln!(out, "{HELP}")?,
            ReplCommand::Think(text) => {
                let ins = self.memory.insert(&text).await?;
                if ins.inserted {
                    writeln!(out, "stored in bucket {}", ins.bucket)?;
                } else {
                    writeln!(out, "already in bucket {}", ins.bucket)?;
                }
            }
            ReplCommand::Ask(query) => match &self.agent {
                None => writeln!(out, "ask needs an [llm] section in the config")?,
                Some(agent) => {
                    let turn = agent.turn(&query).await?;
                    for t in &turn.recalled {
                        writeln!(out, "  recalled: {t}")?;
                    }
                    writeln!(out, "{}", turn.response)?;
                    if let (Some(thought), Some(bucket)) = (&turn.thought, turn.bucket) {
                        writeln!(out, "  remembered in bucket {bucket}: {thought}")?;
                    }
                }
            },
            ReplCommand::Recall { top_k, query } => {
                let bucket = self.memory.bucket_of_text(&query).await?;
                let hits = self.memory.recall_scored(&query, top_k).await?;
                if hits.is_empty() {
                    writeln!(out, "nothing recalled from bucket {bucket}")?;
                }
                for hit in hits {
                    writeln!(out, "[{bucket}] {:.3}  {}", hit.score, hit.text)?;
                }
            }
            ReplCommand::Organize { bucket, mode } => {
                let report = self.memory.organize(bucket, mode).await?;
                write_report(out, &report)?;
            }
            ReplCommand::OrganizeAll => {
                let reports = self.memory.organize_all(OrganizeMode::All).await?;
                for report in reports.iter().filter(|r| !r.skipped) {
                    write_report(out, report)?;
                }
            }
            ReplCommand::Show(Some(bucket)) => {
                let thoughts = self.memory.snapshot(bucket).await?;
                write_bucket(out, bucket, &thoughts)?;
            }
            ReplCommand::Show(None) => {
                let dump = self.memory.dump().await;
                if dump.is_empty() {
                    writeln!(out, "memory is empty")?;
                }
                for bucket in dump {
                    write_bucket(out, bucket.bucket, &bucket.thoughts)?;
                }
            }
            ReplCommand::Stats => {
                writeln!(out, "{}", serde_json::to_string_pretty(&self.memory.stats().await)?)?;
                writeln!(
                    out,
                    "{}",
                    serde_json::to_string_pretty(&self.memory.metrics().snapshot())?
                )?;
            }
        }
        Ok(true)
    }
}

pub fn write_bucket<W: Write>(out: &mut W, bucket: BucketId, thoughts: &[String]) -> std::io::Result<()> {
    writeln!(out, "bucket {bucket} ({} thoughts)", thoughts.len())?;
    for t in thoughts {
        writeln!(out, "  - {t}")?;
    }
    Ok(())
}

pub fn write_report<W: Write>(out: &mut W, report: &OrganizeReport) -> std::io::Result<()> {
    if report.skipped {
        return writeln!(out, "bucket {}: nothing to organize", report.bucket);
    }
    writeln!(
        out,
        "bucket {} ({}): {} -> {} thoughts{}",
        report.bucket,
        report.mode,
        report.before,
        report.after,
        if report.merged { ", merged" } else { "" }
    )?;
    for t in &report.forgotten {
        writeln!(out, "  forgot: {t}")?;
    }
    Ok(())
}

/// Read commands until `quit` or end of input.
pub async fn run<R, W>(session: &Session, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    write!(out, "tim> ")?;
    out.flush()?;
    while let Some(line) = lines.next_line().await? {
        let keep_going = match ReplCommand::parse(&line) {
            Ok(command) => session.execute(command, out).await?,
            Err(message) => {
                writeln!(out, "{message}")?;
                true
            }
        };
        if !keep_going {
            break;
        }
        write!(out, "tim> ")?;
        out.flush()?;
    }
    Ok(())
}
