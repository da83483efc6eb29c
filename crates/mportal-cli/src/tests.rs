use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["mportal-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["mportal-cli", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn seed_channels_path_is_optional() {
    let cli = Cli::try_parse_from(["mportal-cli", "seed-channels"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::SeedChannels { path: None })
    ));

    let cli =
        Cli::try_parse_from(["mportal-cli", "seed-channels", "--path", "alt/channels.yaml"])
            .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::SeedChannels { path: Some(ref p) }) if p == &PathBuf::from("alt/channels.yaml")
    ));
}

#[test]
fn create_admin_requires_email_and_password() {
    assert!(Cli::try_parse_from(["mportal-cli", "create-admin", "--email", "a@b.co"]).is_err());

    let cli = Cli::try_parse_from([
        "mportal-cli",
        "create-admin",
        "--email",
        "owner@example.com",
        "--password",
        "correct-horse-battery",
        "--first-name",
        "Ada",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::CreateAdmin {
            ref email,
            first_name: Some(ref first),
            last_name: None,
            ..
        }) if email == "owner@example.com" && first == "Ada"
    ));
}

#[test]
fn sync_products_takes_channel_and_optional_limit() {
    let cli = Cli::try_parse_from([
        "mportal-cli",
        "sync",
        "products",
        "--channel",
        "shopify-us",
        "--limit",
        "25",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Products {
                ref channel,
                limit: Some(25)
            }
        }) if channel == "shopify-us"
    ));
}

#[test]
fn sync_orders_requires_a_channel() {
    assert!(Cli::try_parse_from(["mportal-cli", "sync", "orders"]).is_err());

    let cli =
        Cli::try_parse_from(["mportal-cli", "sync", "orders", "--channel", "bestbuy-ca"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Orders { limit: None, .. }
        })
    ));
}

#[test]
fn rollup_parses_iso_dates() {
    let cli = Cli::try_parse_from([
        "mportal-cli",
        "rollup",
        "--from",
        "2024-06-01",
        "--to",
        "2024-06-30",
    ])
    .unwrap();
    let Some(Commands::Rollup { from, to }) = cli.command else {
        panic!("expected rollup command");
    };
    assert_eq!(from, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    assert_eq!(to, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());

    assert!(Cli::try_parse_from(["mportal-cli", "rollup", "--from", "June", "--to", "2024-06-30"])
        .is_err());
}

#[test]
fn check_connection_takes_a_channel_code() {
    let cli =
        Cli::try_parse_from(["mportal-cli", "check-connection", "--channel", "shopify-us"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::CheckConnection { ref channel }) if channel == "shopify-us"
    ));
}
