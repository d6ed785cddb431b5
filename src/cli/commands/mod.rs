pub mod auth;
pub mod email;
pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("frago")
        .about("Frago marketplace accounts API")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("FRAGO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("FRAGO_DSN")
                .required(true),
        );

    let command = auth::with_args(command);
    let command = email::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_ARGS: [&str; 5] = [
        "frago",
        "--dsn",
        "postgres://frago@localhost:5432/frago",
        "--jwt-secret",
        "not-a-real-secret",
    ];

    #[test]
    fn command_metadata() {
        let command = new();

        assert_eq!(command.get_name(), "frago");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Frago marketplace accounts API"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn port_and_dsn() {
        let command = new();
        let mut args: Vec<&str> = BASE_ARGS.to_vec();
        args.extend(["--port", "9090"]);
        let matches = command.get_matches_from(args);

        assert_eq!(matches.get_one::<u16>("port").copied(), Some(9090));
        assert_eq!(
            matches.get_one::<String>("dsn").map(String::as_str),
            Some("postgres://frago@localhost:5432/frago")
        );
    }

    #[test]
    fn defaults_from_env() {
        temp_env::with_vars(
            [
                ("FRAGO_PORT", Some("443")),
                ("FRAGO_DSN", Some("postgres://frago@localhost:5432/frago")),
                ("FRAGO_JWT_SECRET", Some("not-a-real-secret")),
                ("FRAGO_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["frago"]);
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(443));
                assert_eq!(
                    matches.get_one::<String>("dsn").map(String::as_str),
                    Some("postgres://frago@localhost:5432/frago")
                );
                assert_eq!(
                    matches
                        .get_one::<u8>(super::logging::ARG_VERBOSITY)
                        .copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn log_level_names_from_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("FRAGO_LOG_LEVEL", Some(level)),
                    ("FRAGO_DSN", Some("postgres://frago@localhost:5432/frago")),
                    ("FRAGO_JWT_SECRET", Some("not-a-real-secret")),
                ],
                || {
                    let command = new();
                    let matches = command.get_matches_from(vec!["frago"]);
                    assert_eq!(
                        matches
                            .get_one::<u8>(super::logging::ARG_VERBOSITY)
                            .copied(),
                        Some(u8::try_from(index).unwrap_or(0))
                    );
                },
            );
        }
    }

    #[test]
    fn verbosity_flags() {
        for count in 0..4_usize {
            temp_env::with_vars([("FRAGO_LOG_LEVEL", None::<String>)], || {
                let mut args: Vec<String> =
                    BASE_ARGS.iter().map(ToString::to_string).collect();
                if count > 0 {
                    args.push(format!("-{}", "v".repeat(count)));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches
                        .get_one::<u8>(super::logging::ARG_VERBOSITY)
                        .copied(),
                    Some(u8::try_from(count).unwrap_or(0))
                );
            });
        }
    }
}
