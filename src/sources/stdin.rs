//! Stdin source: alarm texts separated by blank lines, for local testing and
//! for piping SMS or network payloads into the workflow.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{debug, error};

use crate::error::SourceError;
use crate::parsing::AlarmParser;
use crate::services::Services;
use crate::sources::{AlarmSender, AlarmSource};

/// Reads alarms from stdin until EOF.
#[derive(Default)]
pub struct StdinSource {
    parser: Option<AlarmParser>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlarmSource for StdinSource {
    fn name(&self) -> &str {
        "Stdin"
    }

    async fn initialize(&mut self, services: &Services) -> Result<(), SourceError> {
        self.parser = Some(services.parser());
        Ok(())
    }

    async fn run(&self, sender: AlarmSender) -> Result<(), SourceError> {
        let Some(parser) = &self.parser else {
            return Err(SourceError::StartupFailed {
                name: self.name().to_string(),
                reason: "not initialized".to_string(),
            });
        };
        read_alarms(BufReader::new(tokio::io::stdin()), parser, &sender).await
    }
}

/// Send one operation per blank-line separated block of `reader`.
async fn read_alarms<R>(reader: R, parser: &AlarmParser, sender: &AlarmSender) -> Result<(), SourceError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut block: Vec<String> = Vec::new();

    loop {
        match lines.next().await {
            Some(Ok(line)) if line.trim().is_empty() => {
                flush(&mut block, parser, sender).await?;
            }
            Some(Ok(line)) => block.push(line),
            Some(Err(e)) => {
                error!("Error reading stdin: {}", e);
                return Err(e.into());
            }
            None => {
                flush(&mut block, parser, sender).await?;
                return Ok(());
            }
        }
    }
}

async fn flush(block: &mut Vec<String>, parser: &AlarmParser, sender: &AlarmSender) -> Result<(), SourceError> {
    if block.is_empty() {
        return Ok(());
    }
    debug!(lines = block.len(), "Parsing alarm block");
    let operation = parser.parse_lines(block.iter().map(String::as_str));
    block.clear();
    sender.send(operation).await
}
