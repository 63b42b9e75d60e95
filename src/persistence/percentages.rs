//! MVC percentage table (`mvc_percentages.csv` / `mvc_percentages.json`),
//! rewritten whenever a reference is loaded

use crate::config::constants::output;
use crate::persistence::PersistenceResult;
use crate::scoring::MvcPercentages;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Write both files, returning their paths (CSV, JSON)
pub fn write_percentages(dir: &Path, percentages: &MvcPercentages) -> PersistenceResult<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir)?;
    let labels = MvcPercentages::level_labels();

    let csv_path = dir.join(output::MVC_PERCENTAGES_CSV);
    let mut writer = csv::Writer::from_path(&csv_path)?;
    let mut header = vec!["Motion".to_string()];
    header.extend(labels.iter().cloned());
    writer.write_record(&header)?;
    for entry in &percentages.motions {
        let mut row = vec![entry.motion.motion_label().to_string()];
        match entry.values {
            Some(values) => row.extend(values.iter().map(|v| v.to_string())),
            None => row.extend(std::iter::repeat(String::new()).take(labels.len())),
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;

    let json_path = dir.join(output::MVC_PERCENTAGES_JSON);
    let mut motions = Map::new();
    for entry in &percentages.motions {
        let mut levels = Map::new();
        if let Some(values) = entry.values {
            for (label, value) in labels.iter().zip(values) {
                levels.insert(label.clone(), Value::from(value));
            }
        }
        motions.insert(entry.motion.motion_label().to_string(), Value::Object(levels));
    }
    let file = BufWriter::new(File::create(&json_path)?);
    serde_json::to_writer_pretty(file, &Value::Object(motions))?;

    Ok((csv_path, json_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MvcRecord;
    use tempfile::TempDir;

    #[test]
    fn test_percentage_files() {
        let dir = TempDir::new().unwrap();
        let record = MvcRecord {
            participant_id: "P01".into(),
            date: "2024-01-01".into(),
            time: "12:00:00".into(),
            full_grasp: Some(100.0),
            index_pinch: None,
            middle_pinch: Some(50.0),
        };
        let (csv_path, json_path) =
            write_percentages(dir.path(), &MvcPercentages::from_record(&record)).unwrap();

        let text = std::fs::read_to_string(csv_path).unwrap();
        assert_eq!(
            text,
            "Motion,20%,40%,60%,80%\n\
             Full Grasp (Grip),20,40,60,80\n\
             Pinch (Index Finger),,,,\n\
             Pinch (Middle Finger),10,20,30,40\n"
        );

        let json: Value = serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(json["Full Grasp (Grip)"]["60%"], 60.0);
        assert!(json["Pinch (Index Finger)"].as_object().unwrap().is_empty());
        assert_eq!(json["Pinch (Middle Finger)"]["20%"], 10.0);
    }
}
