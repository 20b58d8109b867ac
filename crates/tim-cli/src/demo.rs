//! Scripted walk through insert, recall and organize.

use std::io::Write;

use anyhow::Result;

use tim_core::{OrganizeMode, ThoughtMemory};

use crate::repl::{write_bucket, write_report};

/// Thoughts distilled from the book, movie, capital and occupation
/// conversations of the Think-in-Memory paper.
pub const SEED_THOUGHTS: &[&str] = &[
    "Recommend book is \"The Little Prince\".",
    "\"The Little Prince\" is interesting.",
    "Recommend movie is \"The Wandering Earth\".",
    "\"The Wandering Earth\" is with stunning visuals.",
    "The capital of China is Beijing.",
    "The capital of China is Shanghai.",
    "Nanjing is an old version capital of China.",
    "John works as an actor.",
    "John works as a director.",
    "John works as a writer.",
    "Mike works as a teacher.",
    "The capital of France is Paris.",
];

pub const SAMPLE_QUERIES: &[&str] = &[
    "What does Mike do",
    "What is the capital of China?",
    "How is \"The Little Prince\"?",
];

/// `reachable_buckets` is how many buckets the embedding source can hash
/// into; it is printed next to the bucket count.
pub async fn run<W: Write>(
    memory: &ThoughtMemory,
    reachable_buckets: usize,
    top_k: usize,
    out: &mut W,
) -> Result<()> {
    writeln!(
        out,
        "== {} buckets ({reachable_buckets} reachable)",
        memory.num_buckets()
    )?;
    writeln!(out, "== seeding {} thoughts", SEED_THOUGHTS.len())?;
    for thought in SEED_THOUGHTS {
        let ins = memory.insert(thought).await?;
        writeln!(out, "  [{}] {thought}", ins.bucket)?;
    }

    writeln!(out, "\n== memory")?;
    for bucket in memory.dump().await {
        write_bucket(out, bucket.bucket, &bucket.thoughts)?;
    }

    writeln!(out, "\n== recall (top {top_k})")?;
    for query in SAMPLE_QUERIES {
        let bucket = memory.bucket_of_text(query).await?;
        let hits = memory.recall(query, top_k).await?;
        writeln!(out, "{query}  -> bucket {bucket}")?;
        if hits.is_empty() {
            writeln!(out, "  (nothing)")?;
        }
        for hit in hits {
            writeln!(out, "  - {hit}")?;
        }
    }

    writeln!(out, "\n== organize all buckets")?;
    for report in memory.organize_all(OrganizeMode::All).await? {
        if !report.skipped {
            write_report(out, &report)?;
        }
    }

    writeln!(out, "\n== memory after organize")?;
    for bucket in memory.dump().await {
        write_bucket(out, bucket.bucket, &bucket.thoughts)?;
    }
    Ok(())
}
