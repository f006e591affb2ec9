use crate::engine::Engine;
use crate::error::Result;
use crate::keys::{stream_symbol_count, PrivateKey};
use crate::stats::StreamStats;
use std::path::Path;

/// Statistics of the stream a private key synthesizes
pub fn show_stats(engine: &Engine, private_path: &Path) -> Result<String> {
    let private = PrivateKey::load(private_path)?;
    let stream = engine.synthesize(private.recipe())?;
    let stats = StreamStats::analyze(&stream, stream_symbol_count(private.recipe().rule(), engine.store()));

    let mut output = String::new();
    output.push_str("Stream Statistics\n");
    output.push_str("=================\n\n");
    output.push_str(&format!("Key: {}\n", private_path.display()));
    output.push_str(&format!("Combination: {}\n\n", private.recipe().rule()));
    output.push_str(&stats.report());
    Ok(output)
}
