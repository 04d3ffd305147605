use clap::{Arg, ArgMatches, Command};

pub const ARG_LOGIN_TTL: &str = "otp-login-ttl-seconds";
pub const ARG_PASSWORD_RESET_TTL: &str = "otp-password-reset-ttl-seconds";
pub const ARG_VERIFICATION_TTL: &str = "otp-verification-ttl-seconds";
pub const ARG_REGISTRATION_TTL: &str = "otp-registration-ttl-seconds";
pub const ARG_MAX_ATTEMPTS: &str = "otp-max-attempts";
pub const ARG_DELIVERY_TIMEOUT: &str = "delivery-timeout-seconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub login_ttl_seconds: u64,
    pub password_reset_ttl_seconds: u64,
    pub verification_ttl_seconds: u64,
    pub registration_ttl_seconds: u64,
    pub max_attempts: u32,
    pub delivery_timeout_seconds: u64,
}

impl Options {
    /// Parse OTP arguments from matches.
    ///
    /// # Errors
    /// Returns an error if any duration or the attempt cap is zero.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let positive = |id: &str, default: u64| -> anyhow::Result<u64> {
            let value = matches.get_one::<u64>(id).copied().unwrap_or(default);
            if value == 0 {
                anyhow::bail!("--{id} must be greater than zero");
            }
            Ok(value)
        };

        let max_attempts = matches
            .get_one::<u32>(ARG_MAX_ATTEMPTS)
            .copied()
            .unwrap_or(5);
        if max_attempts == 0 {
            anyhow::bail!("--{ARG_MAX_ATTEMPTS} must be greater than zero");
        }

        Ok(Self {
            login_ttl_seconds: positive(ARG_LOGIN_TTL, 300)?,
            password_reset_ttl_seconds: positive(ARG_PASSWORD_RESET_TTL, 900)?,
            verification_ttl_seconds: positive(ARG_VERIFICATION_TTL, 1800)?,
            registration_ttl_seconds: positive(ARG_REGISTRATION_TTL, 1800)?,
            max_attempts,
            delivery_timeout_seconds: positive(ARG_DELIVERY_TIMEOUT, 10)?,
        })
    }
}

fn seconds_arg(
    id: &'static str,
    env: &'static str,
    help: &'static str,
    default: &'static str,
) -> Arg {
    Arg::new(id)
        .long(id)
        .help(help)
        .env(env)
        .default_value(default)
        .value_parser(clap::value_parser!(u64))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(seconds_arg(
            ARG_LOGIN_TTL,
            "SPOREHUB_OTP_LOGIN_TTL_SECONDS",
            "Lifetime of login codes in seconds",
            "300",
        ))
        .arg(seconds_arg(
            ARG_PASSWORD_RESET_TTL,
            "SPOREHUB_OTP_PASSWORD_RESET_TTL_SECONDS",
            "Lifetime of password reset codes in seconds",
            "900",
        ))
        .arg(seconds_arg(
            ARG_VERIFICATION_TTL,
            "SPOREHUB_OTP_VERIFICATION_TTL_SECONDS",
            "Lifetime of email verification codes in seconds",
            "1800",
        ))
        .arg(seconds_arg(
            ARG_REGISTRATION_TTL,
            "SPOREHUB_OTP_REGISTRATION_TTL_SECONDS",
            "Lifetime of registration codes in seconds",
            "1800",
        ))
        .arg(
            Arg::new(ARG_MAX_ATTEMPTS)
                .long(ARG_MAX_ATTEMPTS)
                .help("Wrong codes accepted before a code is discarded")
                .env("SPOREHUB_OTP_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(seconds_arg(
            ARG_DELIVERY_TIMEOUT,
            "SPOREHUB_DELIVERY_TIMEOUT_SECONDS",
            "Deadline for a single email or chat delivery in seconds",
            "10",
        ))
}
