use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_parse_query_with_project() {
    let cli = Cli::try_parse_from(["mt", "query", "SELECT 1", "--project", "proj", "-v"]).unwrap();
    assert!(cli.global.verbose);
    match cli.command {
        Commands::Query(args) => {
            assert_eq!(args.sql, "SELECT 1");
            assert_eq!(args.project.as_deref(), Some("proj"));
            assert_eq!(args.output, OutputFormat::Table);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_parse_scheduler_once() {
    let cli = Cli::try_parse_from(["mt", "--config", "x.yml", "scheduler", "--once"]).unwrap();
    assert_eq!(cli.global.config.as_deref(), Some("x.yml"));
    assert!(matches!(
        cli.command,
        Commands::Scheduler(SchedulerArgs { once: true, interval: None })
    ));
}

#[test]
fn test_parse_model_create() {
    let cli = Cli::try_parse_from([
        "mt",
        "models",
        "create",
        "m1",
        "--predict",
        "amount",
        "--from",
        "SELECT * FROM files.orders",
        "--option",
        "train_delay_ms=5",
        "--option",
        "note=a=b",
        "--no-activate",
    ])
    .unwrap();
    let Commands::Models(ModelsArgs {
        command: ModelCommands::Create(args),
    }) = &cli.command
    else {
        panic!("unexpected command {:?}", cli.command);
    };
    assert_eq!(args.name, "m1");
    assert_eq!(args.predict.as_deref(), Some("amount"));
    assert_eq!(args.training_query.as_deref(), Some("SELECT * FROM files.orders"));
    assert_eq!(
        args.options,
        vec![
            ("train_delay_ms".to_string(), "5".to_string()),
            ("note".to_string(), "a=b".to_string())
        ]
    );
    assert!(args.no_activate);
}

#[test]
fn test_parse_model_version_commands() {
    let cli = Cli::try_parse_from(["mt", "models", "delete-version", "m1", "2", "-p", "proj"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Models(ModelsArgs {
            command: ModelCommands::DeleteVersion(ModelVersionArgs { version: 2, .. })
        })
    ));
    assert!(Cli::try_parse_from(["mt", "models", "activate", "m1", "latest"]).is_err());
}

#[test]
fn test_parse_bad_option_pair() {
    let err = Cli::try_parse_from(["mt", "models", "retrain", "m1", "--option", "novalue"])
        .unwrap_err();
    assert!(err.to_string().contains("KEY=VALUE"));
}

#[test]
fn test_parse_job_and_view_commands() {
    let cli = Cli::try_parse_from([
        "mt",
        "jobs",
        "create",
        "j1",
        "SELECT 1",
        "--every",
        "every 2 hours",
        "--start-at",
        "2024-01-01 00:00:00",
    ])
    .unwrap();
    match cli.command {
        Commands::Jobs(JobsArgs {
            command: JobCommands::Create(args),
        }) => {
            assert_eq!(args.every.as_deref(), Some("every 2 hours"));
            assert_eq!(args.start_at.as_deref(), Some("2024-01-01 00:00:00"));
            assert!(args.end_at.is_none());
        }
        other => panic!("unexpected command {:?}", other),
    }

    let cli = Cli::try_parse_from(["mt", "views", "create", "v1", "SELECT 1"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Views(ViewsArgs {
            command: ViewCommands::Create(_)
        })
    ));
    assert!(Cli::try_parse_from(["mt", "jobs"]).is_err());
}

#[test]
fn test_parse_describe() {
    let cli = Cli::try_parse_from(["mt", "describe", "files.orders", "-p", "proj"]).unwrap();
    match &cli.command {
        Commands::Describe(args) => {
            assert_eq!(args.relation, "files.orders");
            assert_eq!(args.project.as_deref(), Some("proj"));
        }
        other => panic!("unexpected command {:?}", other),
    }
}
