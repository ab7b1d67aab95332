//! Decode command implementation.

use crate::cli::DecodeArgs;
use crate::context::Context;
use crate::error::Result;
use quarry_domain::CorrelationId;
use quarry_extractor::DecoderChain;

/// Execute the decode command.
pub fn execute_decode(args: DecodeArgs, context: &Context) -> Result<()> {
    let decoded = decode_all(&context.decoders(), args.ids);
    println!("{}", context.formatter.format_decoded(&decoded)?);
    Ok(())
}

/// Pair each id with its decoding, if any decoder recognizes it
pub fn decode_all(decoders: &DecoderChain, ids: Vec<String>) -> Vec<(String, Option<CorrelationId>)> {
    ids.into_iter()
        .map(|id| {
            let decoded = decoders.decode(&id);
            if decoded.is_none() {
                tracing::warn!(id = %id, "Unrecognized correlation id");
            }
            (id, decoded)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_domain::CategoryCatalog;
    use std::sync::Arc;

    #[test]
    fn test_decode_all() {
        let decoders = DecoderChain::standard(Arc::new(CategoryCatalog::default()));
        let decoded = decode_all(
            &decoders,
            vec![
                "CFA009660_ROP-informe_disbursements_chunk_001".to_string(),
                "not-an-id".to_string(),
            ],
        );

        let first = decoded[0].1.as_ref().unwrap();
        assert_eq!(first.project, "CFA009660");
        assert_eq!(first.category, "disbursements");
        assert_eq!(first.ordinal, Some(1));
        assert!(decoded[1].1.is_none());
    }
}
