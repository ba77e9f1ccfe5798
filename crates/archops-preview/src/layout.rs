//! Local graph layout

use crate::error::{PreviewError, PreviewResult};
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Turns a DOT graph into SVG
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphLayout: Send + Sync + Debug {
    /// Lay out `dot`
    ///
    /// # Errors
    /// Returns [`PreviewError::Layout`] if the graph cannot be laid out
    async fn layout(&self, dot: &str) -> PreviewResult<String>;
}

/// Runs the Graphviz `dot` executable
#[derive(Debug, Clone)]
pub struct GraphvizCli {
    program: PathBuf,
}

impl GraphvizCli {
    /// Use a specific executable
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Executable in use
    #[inline]
    #[must_use]
    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

impl Default for GraphvizCli {
    fn default() -> Self {
        Self::new("dot")
    }
}

#[async_trait]
impl GraphLayout for GraphvizCli {
    async fn layout(&self, dot: &str) -> PreviewResult<String> {
        let mut child = Command::new(&self.program)
            .arg("-Tsvg")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PreviewError::layout(format!("cannot start {}: {e}", self.program.display()))
            })?;

        // Feed stdin concurrently so a large SVG cannot fill the stdout pipe first.
        let stdin = child.stdin.take();
        let input = dot.to_owned();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| PreviewError::layout(e.to_string()))?;
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PreviewError::layout(format!("writing graph: {e}"))),
            Err(e) => return Err(PreviewError::layout(e.to_string())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PreviewError::layout(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        tracing::debug!("laid out {} bytes of DOT", dot.len());
        String::from_utf8(output.stdout).map_err(|e| PreviewError::layout(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_executable_is_a_layout_error() {
        let layout = GraphvizCli::new("/nonexistent/archops-dot");
        let err = layout.layout("digraph { a -> b }").await.unwrap_err();
        assert!(matches!(err, PreviewError::Layout(_)));
    }

    #[test]
    fn default_program_is_dot() {
        assert_eq!(GraphvizCli::default().program(), &PathBuf::from("dot"));
    }
}
