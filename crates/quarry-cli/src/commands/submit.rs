//! Submit command implementation.

use crate::cli::SubmitArgs;
use crate::commands::chunk::document_name;
use crate::context::Context;
use crate::error::{CliError, Result};
use quarry_domain::SourceDocument;
use std::fs;
use std::path::Path;

const DOCUMENT_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Execute the submit command.
pub fn execute_submit(args: SubmitArgs, context: &Context) -> Result<()> {
    let documents = read_documents(&args.project, &args.dir)?;
    if documents.is_empty() {
        return Err(CliError::InvalidInput(format!(
            "No .txt or .md documents in {}",
            args.dir.display()
        )));
    }

    let plan = context.planner()?.plan(&args.project, &documents)?;
    if args.dry_run {
        println!("{}", context.formatter.format_plan(&plan)?);
        return Ok(());
    }

    tracing::info!(
        project = %args.project,
        documents = plan.documents.len(),
        skipped = plan.skipped.len(),
        requests = plan.requests.len(),
        "Request plan ready"
    );

    let manifest = context.submitter()?.submit(&args.project, &plan.requests)?;
    println!("{}", context.formatter.format_submission(&manifest)?);

    Ok(())
}

/// Load every `.txt` / `.md` file directly under `dir`, sorted by name
pub fn read_documents(project: &str, dir: &Path) -> Result<Vec<SourceDocument>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let eligible = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| DOCUMENT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && eligible {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path)?;
        documents.push(SourceDocument::new(project, document_name(&path)?, text));
    }
    Ok(documents)
}
