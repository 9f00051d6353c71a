//! User-supplied signatures loaded from JSON.
//!
//! ```json
//! [
//!   { "name": "gif", "extension": "gif", "category": "images",
//!     "header": "47 49 46 38", "footer": "00 3B" },
//!   { "name": "avi", "extension": "avi", "category": "videos",
//!     "header": "52494646" }
//! ]
//! ```
//!
//! Byte strings are hex, whitespace ignored. An entry without `footer` is
//! bounded by its next header. `footer_length` defaults to the footer size.

use anyhow::{Context, Result};
use recarve_core::{Category, Signature};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignatureEntry {
    name: String,
    extension: String,
    #[serde(default = "default_category")]
    category: String,
    header: String,
    #[serde(default)]
    footer: Option<String>,
    #[serde(default)]
    footer_length: Option<usize>,
}

fn default_category() -> String {
    Category::Other.name().to_string()
}

impl SignatureEntry {
    fn into_signature(self) -> Result<Signature> {
        let category: Category = self.category.parse()?;
        let header = decode_hex(&self.header)
            .with_context(|| format!("Invalid header for '{}'", self.name))?;

        let signature = match self.footer {
            Some(footer) => {
                let footer = decode_hex(&footer)
                    .with_context(|| format!("Invalid footer for '{}'", self.name))?;
                let inclusive_len = self.footer_length.unwrap_or(footer.len());
                Signature::with_footer(
                    self.name,
                    self.extension,
                    category,
                    header,
                    footer,
                    inclusive_len,
                )?
            }
            None => {
                if self.footer_length.is_some() {
                    anyhow::bail!("'{}' sets footer_length without a footer", self.name);
                }
                Signature::heuristic(self.name, self.extension, category, header)?
            }
        };
        Ok(signature)
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    Ok(hex::decode(digits)?)
}

pub fn parse(text: &str) -> Result<Vec<Signature>> {
    let entries: Vec<SignatureEntry> =
        serde_json::from_str(text).context("Malformed signature file")?;
    entries
        .into_iter()
        .map(SignatureEntry::into_signature)
        .collect()
}

pub fn load(path: &Path) -> Result<Vec<Signature>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read signature file {}", path.display()))?;
    parse(&text).with_context(|| format!("Failed to load signatures from {}", path.display()))
}
