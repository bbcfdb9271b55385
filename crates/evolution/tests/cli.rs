use clap::Parser;
use evolution::cli::Cli;
use evolution_runtime::UnitCatalog;
use tempfile::TempDir;

fn cli(dir: &TempDir, args: &[&str]) -> Cli {
    let url = format!("sqlite://{}", dir.path().join("cli.db").display());
    let migrations = dir.path().join("migrations");
    let config = dir.path().join("missing.toml");

    let mut argv = vec![
        "evolution".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "--database-url".to_string(),
        url,
        "--migrations-dir".to_string(),
        migrations.display().to_string(),
    ];
    argv.extend(args.iter().map(|a| a.to_string()));
    Cli::try_parse_from(argv).unwrap()
}

#[tokio::test]
async fn test_init_create_run_undo() {
    let dir = TempDir::new().unwrap();

    cli(&dir, &["init"]).execute(UnitCatalog::new()).await.unwrap();
    assert!(dir.path().join("migrations").is_dir());

    // init is strict.
    assert!(cli(&dir, &["init"]).execute(UnitCatalog::new()).await.is_err());

    cli(&dir, &["create", "add", "widgets"])
        .execute(UnitCatalog::new())
        .await
        .unwrap();
    let path = dir.path().join("migrations").join("0001_add_widgets.sql");
    assert!(path.is_file());
    std::fs::write(
        &path,
        "-- up\nCREATE TABLE widgets (id INTEGER);\n-- down\nDROP TABLE widgets;\n",
    )
    .unwrap();

    cli(&dir, &["run"]).execute(UnitCatalog::new()).await.unwrap();
    cli(&dir, &["status", "--json"])
        .execute(UnitCatalog::new())
        .await
        .unwrap();
    cli(&dir, &["redo"]).execute(UnitCatalog::new()).await.unwrap();
    cli(&dir, &["undo"]).execute(UnitCatalog::new()).await.unwrap();

    let err = cli(&dir, &["undo"])
        .execute(UnitCatalog::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Nothing to undo");
}

#[tokio::test]
async fn test_create_before_init_fails() {
    let dir = TempDir::new().unwrap();
    let err = cli(&dir, &["create", "first"])
        .execute(UnitCatalog::new())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Not initialized"));
}
