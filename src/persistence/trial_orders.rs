//! Trial-order dump (`trial_orders_<stamp>_<participant>.csv`)
//!
//! Two header-less rows, one per block: `trial_list1,<id>,<id>,...` and
//! `trial_list2,...`.

use crate::config::constants::output;
use crate::persistence::{PersistenceError, PersistenceResult};
use crate::protocol::{TrialBlock, TrialSpec};
use std::path::{Path, PathBuf};

const ROW_LABELS: [&str; 2] = ["trial_list1", "trial_list2"];

pub fn write_trial_orders(
    dir: &Path,
    stamp: &str,
    participant: &str,
    blocks: &[TrialBlock; 2],
) -> PersistenceResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "{}_{}_{}.csv",
        output::TRIAL_ORDERS_PREFIX,
        stamp,
        file_safe(participant)
    ));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)?;
    for (label, block) in ROW_LABELS.iter().zip(blocks) {
        let mut record = vec![label.to_string()];
        record.extend(block.ids());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(path)
}

pub fn read_trial_orders(path: &Path) -> PersistenceResult<[TrialBlock; 2]> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut blocks: [Option<TrialBlock>; 2] = [None, None];
    for record in reader.records() {
        let record = record?;
        let Some(label) = record.get(0) else { continue };
        let Some(slot) = ROW_LABELS.iter().position(|l| *l == label) else {
            return Err(PersistenceError::Malformed(format!("unexpected row label '{}'", label)));
        };
        let trials = record
            .iter()
            .skip(1)
            .map(str::parse::<TrialSpec>)
            .collect::<Result<Vec<_>, _>>()?;
        blocks[slot] = Some(TrialBlock::from_trials(trials));
    }

    match blocks {
        [Some(first), Some(second)] => Ok([first, second]),
        _ => Err(PersistenceError::Malformed(format!(
            "{} does not contain both trial lists",
            path.display()
        ))),
    }
}

fn file_safe(participant: &str) -> String {
    participant
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    #[test]
    fn test_orders_file_layout() {
        let dir = TempDir::new().unwrap();
        let blocks = [
            TrialBlock::from_trials(vec!["FullGrasp20".parse().unwrap(), "IndexPinch80".parse().unwrap()]),
            TrialBlock::from_trials(vec!["MiddlePinch40".parse().unwrap()]),
        ];
        let path = write_trial_orders(dir.path(), "20240101_1200", "P01", &blocks).unwrap();

        assert_eq!(path.file_name().unwrap(), "trial_orders_20240101_1200_P01.csv");
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "trial_list1,FullGrasp20,IndexPinch80\ntrial_list2,MiddlePinch40\n");
    }

    #[test]
    fn test_generated_blocks_read_back() {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let blocks = [TrialBlock::generate(5, &mut rng), TrialBlock::generate(5, &mut rng)];
        let path = write_trial_orders(dir.path(), "stamp", "Unknown", &blocks).unwrap();

        let read = read_trial_orders(&path).unwrap();
        assert_eq!(read[0].ids(), blocks[0].ids());
        assert_eq!(read[1].ids(), blocks[1].ids());
    }

    #[test]
    fn test_participant_is_made_file_safe() {
        assert_eq!(file_safe(" P/07 "), "P_07");
        assert_eq!(file_safe("ab-c_1"), "ab-c_1");
    }

    #[test]
    fn test_missing_list_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.csv");
        std::fs::write(&path, "trial_list1,FullGrasp20\n").unwrap();
        assert!(matches!(read_trial_orders(&path), Err(PersistenceError::Malformed(_))));
    }
}
