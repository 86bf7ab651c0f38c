use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Read-only list of quotes plus the generator used to draw from it.
///
/// The list is never mutated after construction and is always non-empty,
/// so concurrent handlers only contend on the generator lock.
pub struct QuoteBook {
    quotes: Vec<String>,
    rng: Mutex<StdRng>,
}

impl QuoteBook {
    /// Load quotes from a file, one per line. Lines that are empty or only
    /// whitespace are skipped. Invalid UTF-8 is replaced, not rejected.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to open file with quotes: {}", path.display()))?;
        let content = String::from_utf8_lossy(&bytes);

        let book = Self::from_lines(content.lines())
            .with_context(|| format!("No quotes found in {}", path.display()))?;

        info!("Loaded {} quotes from {}", book.len(), path.display());
        Ok(book)
    }

    pub fn from_lines<I, S>(lines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_rng(lines, StdRng::from_entropy())
    }

    /// Deterministic draws, for tests.
    pub fn with_seed<I, S>(lines: I, seed: u64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_rng(lines, StdRng::seed_from_u64(seed))
    }

    fn with_rng<I, S>(lines: I, rng: StdRng) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let quotes: Vec<String> = lines
            .into_iter()
            .filter(|line| !line.as_ref().trim().is_empty())
            .map(|line| line.as_ref().to_string())
            .collect();

        if quotes.is_empty() {
            anyhow::bail!("Quote list is empty");
        }

        Ok(Self {
            quotes,
            rng: Mutex::new(rng),
        })
    }

    /// Pick a quote uniformly at random, with replacement.
    ///
    /// The seed is the sanitized user text. It does not influence the choice.
    pub fn pick(&self, seed: &str) -> &str {
        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.gen_range(0..self.quotes.len())
        };
        let quote = &self.quotes[index];
        debug!(seed, quote = quote.as_str(), "picked quote");
        quote
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }
}
