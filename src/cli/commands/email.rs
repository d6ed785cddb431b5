use clap::{Arg, Command};

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_outbox_args(command);
    with_smtp_args(command)
}

fn with_outbox_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("email-outbox-poll-seconds")
                .long("email-outbox-poll-seconds")
                .help("Email outbox poll interval in seconds")
                .env("FRAGO_EMAIL_OUTBOX_POLL_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-outbox-batch-size")
                .long("email-outbox-batch-size")
                .help("Email outbox batch size per poll")
                .env("FRAGO_EMAIL_OUTBOX_BATCH_SIZE")
                .default_value("10")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("email-outbox-max-attempts")
                .long("email-outbox-max-attempts")
                .help("Max attempts before marking an email as failed")
                .env("FRAGO_EMAIL_OUTBOX_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("email-outbox-backoff-base-seconds")
                .long("email-outbox-backoff-base-seconds")
                .help("Base delay for email outbox retry backoff")
                .env("FRAGO_EMAIL_OUTBOX_BACKOFF_BASE_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-outbox-backoff-max-seconds")
                .long("email-outbox-backoff-max-seconds")
                .help("Max delay for email outbox retry backoff")
                .env("FRAGO_EMAIL_OUTBOX_BACKOFF_MAX_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_smtp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("smtp-host")
                .long("smtp-host")
                .help("SMTP relay host; when unset, outbound mail is logged instead of sent")
                .env("FRAGO_SMTP_HOST"),
        )
        .arg(
            Arg::new("smtp-port")
                .long("smtp-port")
                .help("SMTP relay port")
                .env("FRAGO_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("smtp-username")
                .long("smtp-username")
                .help("SMTP username")
                .env("FRAGO_SMTP_USERNAME")
                .requires("smtp-host"),
        )
        .arg(
            Arg::new("smtp-password")
                .long("smtp-password")
                .help("SMTP password")
                .env("FRAGO_SMTP_PASSWORD")
                .requires("smtp-host"),
        )
        .arg(
            Arg::new("smtp-from")
                .long("smtp-from")
                .help("From mailbox for outbound mail")
                .env("FRAGO_SMTP_FROM")
                .default_value("FRAGO <no-reply@frago.shop>"),
        )
}

#[cfg(test)]
mod tests {
    #[test]
    fn outbox_defaults() {
        let matches = crate::cli::commands::new().get_matches_from(vec![
            "frago",
            "--dsn",
            "postgres://frago@localhost:5432/frago",
            "--jwt-secret",
            "not-a-real-secret",
        ]);

        assert_eq!(
            matches.get_one::<u64>("email-outbox-poll-seconds").copied(),
            Some(5)
        );
        assert_eq!(
            matches
                .get_one::<usize>("email-outbox-batch-size")
                .copied(),
            Some(10)
        );
        assert_eq!(
            matches
                .get_one::<u32>("email-outbox-max-attempts")
                .copied(),
            Some(5)
        );
        assert_eq!(matches.get_one::<u16>("smtp-port").copied(), Some(587));
        assert_eq!(
            matches.get_one::<String>("smtp-from").map(String::as_str),
            Some("FRAGO <no-reply@frago.shop>")
        );
        assert!(matches.get_one::<String>("smtp-host").is_none());
    }
}
