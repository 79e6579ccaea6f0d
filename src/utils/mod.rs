use crate::models::Interaction;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::info;

pub mod metrics;
pub mod validation;

/// Reads the canonical interaction table, one JSON object per line.
///
/// Blank lines are skipped. A line that does not parse aborts the read; every
/// parsed record is kept as is.
pub fn read_interactions(path: &Path) -> Result<Vec<Interaction>> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open interactions file {}", path.display()))?;

    let mut interactions = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }

        let interaction: Interaction = serde_json::from_str(&line)
            .with_context(|| format!("malformed interaction on line {}", index + 1))?;
        interactions.push(interaction);
    }

    info!("Loaded {} interactions from {}", interactions.len(), path.display());
    Ok(interactions)
}

pub fn write_interactions(path: &Path, interactions: &[Interaction]) -> Result<()> {
    let mut buffer = Vec::new();
    for interaction in interactions {
        serde_json::to_writer(&mut buffer, interaction)?;
        buffer.push(b'\n');
    }
    write_atomic(path, &buffer)
}

/// Writes through a temporary sibling and renames, so readers never see a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    let mut file = fs::File::create(tmp)
        .with_context(|| format!("failed to create {}", tmp.display()))?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;

    Ok(())
}

/// Keeps the interactions of a seeded random `fraction` of distinct products.
pub fn sample_products(interactions: &[Interaction], fraction: f64, seed: u64) -> Vec<Interaction> {
    let products: Vec<i64> = interactions
        .iter()
        .map(|i| i.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let keep = ((products.len() as f64 * fraction).round() as usize)
        .max(1)
        .min(products.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let sampled: HashSet<i64> = products.choose_multiple(&mut rng, keep).copied().collect();

    interactions
        .iter()
        .filter(|i| sampled.contains(&i.product_id))
        .cloned()
        .collect()
}
