use clap::{Arg, Command};

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("jwt-secret")
                .long("jwt-secret")
                .help("Shared secret for signing session tokens")
                .env("FRAGO_JWT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new("frontend-origin")
                .long("frontend-origin")
                .help("Frontend origin allowed by CORS")
                .env("FRAGO_FRONTEND_ORIGIN")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new("otp-ttl-seconds")
                .long("otp-ttl-seconds")
                .help("Verification code TTL in seconds")
                .env("FRAGO_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("reset-ttl-seconds")
                .long("reset-ttl-seconds")
                .help("Password reset code TTL in seconds")
                .env("FRAGO_RESET_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("resend-cooldown-seconds")
                .long("resend-cooldown-seconds")
                .help("Cooldown before a verification code is regenerated")
                .env("FRAGO_RESEND_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("token-ttl-seconds")
                .long("token-ttl-seconds")
                .help("Session token lifetime in seconds")
                .env("FRAGO_TOKEN_TTL_SECONDS")
                .default_value("28800")
                .value_parser(clap::value_parser!(i64)),
        )
}
