#![deny(warnings)]

use farm_core::{validate_state, DEFAULT_STORAGE_KEY};
use persistence::{default_save_dir, load_or_default, save_state, FileStorage, LoadOutcome};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let dir = args.next().unwrap_or_else(|| default_save_dir().to_string());
    let key = args.next().unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());

    let storage = FileStorage::new(&dir);
    let (state, outcome) = load_or_default(&storage, &key)?;
    match &outcome {
        LoadOutcome::Fresh => {
            println!("No save at {}", storage.path_for(&key).display());
            return Ok(());
        }
        LoadOutcome::Corrupt { reason } => {
            anyhow::bail!("save at {} is unreadable: {reason}", storage.path_for(&key).display());
        }
        LoadOutcome::Restored { repairs } if repairs.is_empty() => {
            println!("Save OK, nothing to repair");
            return Ok(());
        }
        LoadOutcome::Restored { repairs } => {
            for r in repairs {
                println!("repaired: {r}");
            }
        }
    }
    validate_state(&state)?;
    save_state(&storage, &key, &state)?;
    println!("Save repaired at {}", storage.path_for(&key).display());
    Ok(())
}
