use crate::error::{Result, TranscryptError};
use crate::keys::{PrivateKey, PublicKey};
use crate::pattern::GapRule;
use std::path::Path;

/// Describe a private or public key file
pub fn show_info(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)?;

    let mut output = String::new();
    output.push_str(&format!("File: {}\n", path.display()));

    if let Ok(private) = serde_json::from_str::<PrivateKey>(&text) {
        let recipe = private.recipe();
        let pattern = private.pattern();
        output.push_str("Type: private key\n\n");

        output.push_str("Stream:\n");
        output.push_str(&format!("  Offsets: {}\n", recipe.offsets().len()));
        output.push_str(&format!("  Length: {} symbols\n", recipe.length()));
        output.push_str(&format!("  Combination: {}\n", recipe.rule()));
        output.push('\n');

        output.push_str("Pattern:\n");
        output.push_str(&format!("  Symbols: {}\n", pattern.len()));
        output.push_str(&format!("  Span: {} positions\n", pattern.span()));
        let gaps = match &pattern.spacing().gap {
            GapRule::Exact { .. } if pattern.is_contiguous() => "contiguous".to_string(),
            GapRule::Exact { .. } => "exact gaps".to_string(),
            GapRule::Window { min, max } => format!("window {}..{}", min, max),
        };
        output.push_str(&format!("  Spacing: {}\n", gaps));
        output.push_str(&format!("  Overlap: {:?}\n", pattern.overlap()));
        output.push('\n');

        output.push_str("Token:\n");
        output.push_str(&format!("  Matches (K): {}\n", private.matches()));
        output.push_str(&format!("  Hash: {}\n", private.hash()));
        output.push_str(&format!("  Salt: {} bytes\n", private.salt().len()));
        output.push_str(&format!("  Public form: {}\n", private.form()));
        return Ok(output);
    }

    let public: PublicKey = serde_json::from_str(&text).map_err(|e| {
        TranscryptError::InvalidConfig(format!("{} is not a key file: {}", path.display(), e))
    })?;
    output.push_str("Type: public key\n\n");
    output.push_str(&format!("Form: {}\n", public.form()));
    output.push_str(&format!("Value: {}\n", hex::encode(public.value())));
    output.push_str(&format!("Matches (K): {}\n", public.matches()));
    output.push_str(&format!("Hash: {}\n", public.hash()));
    Ok(output)
}
