//! Chunk command implementation.

use crate::cli::ChunkArgs;
use crate::context::Context;
use crate::error::{CliError, Result};
use quarry_chunker::ChunkArchive;
use std::fs;
use std::path::Path;

/// Execute the chunk command.
pub fn execute_chunk(args: ChunkArgs, context: &Context) -> Result<()> {
    let name = document_name(&args.file)?;
    let text = fs::read_to_string(&args.file)?;

    let engine = context.engine()?;
    let result = engine.chunk(&args.project, &name, &text);
    println!("{}", context.formatter.format_chunks(&name, &result)?);

    if args.save && !result.chunks.is_empty() {
        let store = context.store()?;
        let keys = ChunkArchive::new(&store).save(&result.chunks)?;
        eprintln!(
            "{}",
            context
                .formatter
                .success(&format!("Saved {} chunk(s) under {}", keys.len(), store.root().display()))
        );
    }

    Ok(())
}

/// File name of `path`, used as the document name
pub(crate) fn document_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| CliError::InvalidInput(format!("Not a document path: {}", path.display())))
}
