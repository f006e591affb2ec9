use crate::engine::Engine;
use crate::error::Result;
use crate::keys::PrivateKey;
use crate::token;
use std::path::Path;

/// List the matches behind a private key and the token they produce
pub fn search_key(engine: &Engine, private_path: &Path) -> Result<String> {
    let private = PrivateKey::load(private_path)?;
    let spans = engine.find_spans(private.recipe(), private.pattern(), private.matches())?;
    let positions: Vec<u64> = spans.iter().map(|m| m.start).collect();
    let token = token::derive(&positions, private.salt(), private.hash())?;

    let mut output = String::new();
    output.push_str(&format!("Pattern: {}\n", private.pattern()));
    output.push_str(&format!(
        "Stream:  {} symbols, {} offsets, {}\n",
        private.recipe().length(),
        private.recipe().offsets().len(),
        private.recipe().rule()
    ));
    output.push_str(&format!("Matches ({}):\n", spans.len()));
    for span in &spans {
        output.push_str(&format!("  {} (through {})\n", span.start, span.end));
    }
    output.push_str(&format!("Token:   {}\n", token));
    Ok(output)
}
