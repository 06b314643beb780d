//! Project scaffolding from the embedded starter templates.

use std::path::Path;

use anyhow::Context;

use crate::foundation::error::CardforgeResult;

const STARTER_SPEC: &str = include_str!("../templates/deck.yaml");
const STARTER_DATA: &str = include_str!("../templates/deck.csv");

/// What `init` did, so the caller can word its notice.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InitOutcome {
    Created,
    /// A `deck.yaml` or `deck.csv` is already there; nothing was touched.
    AlreadyInitialized,
}

/// Drop the starter `deck.yaml` and `deck.csv` into `dir`.
///
/// Refuses to overwrite: if either file exists the directory is left
/// exactly as found.
pub fn init_project(dir: &Path) -> CardforgeResult<InitOutcome> {
    if dir.join("deck.yaml").exists() || dir.join("deck.csv").exists() {
        return Ok(InitOutcome::AlreadyInitialized);
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating project directory {}", dir.display()))?;
    std::fs::write(dir.join("deck.yaml"), STARTER_SPEC)
        .with_context(|| format!("writing {}", dir.join("deck.yaml").display()))?;
    std::fs::write(dir.join("deck.csv"), STARTER_DATA)
        .with_context(|| format!("writing {}", dir.join("deck.csv").display()))?;
    Ok(InitOutcome::Created)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::data::DataTable;
    use crate::spec::load;
    use crate::spec::model::CardSpec;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cardforge_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn init_writes_both_starter_files() {
        let dir = scratch_dir("project_init");
        assert_eq!(init_project(&dir).unwrap(), InitOutcome::Created);
        assert!(dir.join("deck.yaml").exists());
        assert!(dir.join("deck.csv").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn second_init_leaves_files_alone() {
        let dir = scratch_dir("project_reinit");
        init_project(&dir).unwrap();
        std::fs::write(dir.join("deck.yaml"), "width: 9\n").unwrap();

        assert_eq!(
            init_project(&dir).unwrap(),
            InitOutcome::AlreadyInitialized
        );
        let kept = std::fs::read_to_string(dir.join("deck.yaml")).unwrap();
        assert_eq!(kept, "width: 9\n");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn a_lone_data_file_also_counts_as_initialized() {
        let dir = scratch_dir("project_lone_csv");
        std::fs::write(dir.join("deck.csv"), "name\n").unwrap();

        assert_eq!(
            init_project(&dir).unwrap(),
            InitOutcome::AlreadyInitialized
        );
        assert!(!dir.join("deck.yaml").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn starter_templates_parse_as_spec_and_data() {
        let dir = scratch_dir("project_templates");
        init_project(&dir).unwrap();

        let doc = load::load_document(&dir.join("deck.yaml")).unwrap();
        let spec = CardSpec::from_value(&doc).unwrap();
        assert!(!spec.elements.is_empty());

        let table = DataTable::from_path(&dir.join("deck.csv")).unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.header().iter().any(|c| c == "name"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
