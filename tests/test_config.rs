use glovecheck::{Config, LabelRule, Overrides};
use std::path::PathBuf;

#[test]
fn cli_overrides_beat_config_file() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("glovecheck.toml");
    std::fs::write(
        &path,
        r#"
input = "site_photos"
summary = "run.json"

[model]
path = "models/yolov8s.rten"

[detection]
confidence = 0.3
rule = "filename"
"#,
    )?;

    let config = Config::load(
        Some(&path),
        Overrides {
            confidence: Some(0.15),
            rule: Some(LabelRule::Label),
            classes: Some(vec!["person".into()]),
            ..Default::default()
        },
    )?;

    assert_eq!(config.input_dir, PathBuf::from("site_photos"));
    assert_eq!(config.summary, Some(PathBuf::from("run.json")));
    assert_eq!(config.model.path, PathBuf::from("models/yolov8s.rten"));
    assert_eq!(config.confidence, 0.15);
    assert_eq!(config.rule, LabelRule::Label);
    assert_eq!(config.classes, vec!["person".to_string()]);

    Ok(())
}

#[test]
fn invalid_override_is_rejected() {
    let result = Config::load(
        None,
        Overrides {
            iou: Some(2.0),
            ..Default::default()
        },
    );
    assert!(result.is_err());
}
