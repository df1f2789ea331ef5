// src/pipeline/review.rs

//! Batch approval for reviewed crawls.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{AppError, Result};
use crate::models::ThreadSummary;

/// A thread shown to the reviewer, with its step hint.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub thread: &'a ThreadSummary,
    pub hint: String,
}

/// Approval of one batch member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub thread_id: String,
    pub approved: bool,
}

/// Decides which candidates of a batch get fetched.
#[async_trait]
pub trait Approver: Send {
    /// Return one decision per batch member. Any other shape voids the batch.
    async fn review(&mut self, batch_no: usize, batch: &[Candidate<'_>]) -> Result<Vec<Decision>>;
}

/// Line up decisions with the batch, by thread id.
///
/// Returns `None` unless every member has exactly one decision and no
/// decision names a thread outside the batch.
pub fn resolve_decisions(batch: &[ThreadSummary], decisions: &[Decision]) -> Option<Vec<bool>> {
    if decisions.len() != batch.len() {
        return None;
    }
    let mut by_id: HashMap<&str, bool> = HashMap::with_capacity(decisions.len());
    for decision in decisions {
        if by_id.insert(decision.thread_id.as_str(), decision.approved).is_some() {
            return None;
        }
    }
    batch
        .iter()
        .map(|thread| by_id.get(thread.id.as_str()).copied())
        .collect()
}

/// Prompts on a writer and reads comma-separated `y`/`n` answers from a reader.
pub struct LineApprover<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> LineApprover<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    async fn present(&mut self, batch_no: usize, batch: &[Candidate<'_>]) -> Result<()> {
        let mut text = format!("\n--- Thread batch {} ---\n", batch_no);
        for (idx, candidate) in batch.iter().enumerate() {
            let thread = candidate.thread;
            text.push_str(&format!(
                "{}. {} | {} ({} comments) [Step: {}]\n",
                idx + 1,
                thread.title,
                thread.permalink,
                thread.activity,
                candidate.hint
            ));
        }
        text.push_str("Enter y/n for each thread (comma-separated, e.g., y,n,y,...): ");
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl<R, W> Approver for LineApprover<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn review(&mut self, batch_no: usize, batch: &[Candidate<'_>]) -> Result<Vec<Decision>> {
        self.present(batch_no, batch).await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(AppError::crawl("review", "input closed"));
        }

        let answers = parse_answers(&line);
        if answers.len() != batch.len() {
            self.writer
                .write_all(b"Mismatch in number of responses.\n")
                .await?;
            return Ok(Vec::new());
        }

        Ok(batch
            .iter()
            .zip(answers)
            .map(|(candidate, approved)| Decision {
                thread_id: candidate.thread.id.clone(),
                approved,
            })
            .collect())
    }
}

fn parse_answers(line: &str) -> Vec<bool> {
    line.trim()
        .split(',')
        .map(|answer| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
        .collect()
}
