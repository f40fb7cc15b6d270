use std::fs;

use harvester_engine::ProblemRegistry;
use tempfile::TempDir;

#[test]
fn missing_file_is_an_empty_registry() {
    let temp = TempDir::new().unwrap();
    let registry = ProblemRegistry::open(temp.path().join("problems.txt")).unwrap();
    assert!(registry.is_empty());
    assert!(!registry.contains("alice"));
}

#[test]
fn add_is_idempotent_and_persisted() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("problems.txt");

    let mut registry = ProblemRegistry::open(&path).unwrap();
    assert!(registry.add("alice").unwrap());
    assert!(!registry.add("alice").unwrap());
    assert!(!registry.add("  alice ").unwrap());
    assert!(registry.add("bob").unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), "alice\nbob\n");

    let reopened = ProblemRegistry::open(&path).unwrap();
    assert_eq!(reopened.len(), 2);
    assert!(reopened.contains("alice"));
    assert!(reopened.contains(" bob"));
}

#[test]
fn lookups_are_exact_not_substring() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("problems.txt");
    fs::write(&path, "alice\n").unwrap();

    let registry = ProblemRegistry::open(&path).unwrap();
    assert!(!registry.contains("ali"));
    assert!(!registry.contains("alice2"));
}

#[test]
fn append_after_file_without_trailing_newline() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("problems.txt");
    fs::write(&path, "alice\n\nbob").unwrap();

    let mut registry = ProblemRegistry::open(&path).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.add("carol").unwrap());
    assert_eq!(fs::read_to_string(&path).unwrap(), "alice\n\nbob\ncarol\n");
}

#[test]
fn blank_ids_are_ignored() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("problems.txt");

    let mut registry = ProblemRegistry::open(&path).unwrap();
    assert!(!registry.add("   ").unwrap());
    assert!(!path.exists());
}
