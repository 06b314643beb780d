use std::path::PathBuf;
use std::process::Command;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_cardforge")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let name = if cfg!(windows) {
                "cardforge.exe"
            } else {
                "cardforge"
            };
            std::env::current_dir()
                .unwrap()
                .join("target")
                .join("debug")
                .join(name)
        })
}

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

const SOLID_SPEC: &str = "width: 12\nheight: 8\nbackground_color: [0, 0, 0, 255]\n";

#[test]
fn init_build_export_round_trip() {
    let dir = scratch_dir("cli_round_trip");

    let status = Command::new(exe())
        .arg("init")
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(dir.join("deck.yaml").exists());
    assert!(dir.join("deck.csv").exists());

    let status = Command::new(exe())
        .arg("build")
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(status.success());
    for n in 1..=3 {
        assert!(dir.join(format!("output/card_{n}.png")).exists());
    }

    let status = Command::new(exe())
        .args(["export", "output", "--output", "deck.pdf"])
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(status.success());
    let pdf = std::fs::read(dir.join("deck.pdf")).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn second_init_does_not_overwrite() {
    let dir = scratch_dir("cli_reinit");

    let status = Command::new(exe())
        .arg("init")
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(status.success());
    std::fs::write(dir.join("deck.yaml"), "width: 9\n").unwrap();

    let status = Command::new(exe())
        .arg("init")
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(
        std::fs::read_to_string(dir.join("deck.yaml")).unwrap(),
        "width: 9\n"
    );
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn build_without_data_renders_a_single_card() {
    let dir = scratch_dir("cli_single_card");
    std::fs::write(dir.join("deck.yaml"), SOLID_SPEC).unwrap();

    let status = Command::new(exe())
        .arg("build")
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(dir.join("output/card_1.png").exists());
    assert!(!dir.join("output/card_2.png").exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_spec_file_fails_the_build() {
    let dir = scratch_dir("cli_no_spec");

    let status = Command::new(exe())
        .arg("build")
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(!status.success());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn explicitly_named_missing_data_fails_the_build() {
    let dir = scratch_dir("cli_no_data");
    std::fs::write(dir.join("deck.yaml"), SOLID_SPEC).unwrap();

    let status = Command::new(exe())
        .args(["build", "--data", "nowhere.csv"])
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(!status.success());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_image_folder_fails_the_export() {
    let dir = scratch_dir("cli_no_folder");

    let status = Command::new(exe())
        .args(["export", "nowhere"])
        .current_dir(&dir)
        .status()
        .unwrap();
    assert!(!status.success());
    std::fs::remove_dir_all(&dir).ok();
}
