use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_TTL_SECONDS: &str = "jwt-ttl-seconds";
pub const ARG_RATE_LIMIT: &str = "rate-limit";

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub jwt_ttl_seconds: u64,
    pub rate_limit: u32,
}

impl Options {
    /// Parse token and admission arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the secret is missing or too short, or the TTL is zero.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .filter(|value| !value.trim().is_empty())
            .cloned();
        let Some(secret) = secret else {
            anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}");
        };
        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("--{ARG_JWT_SECRET} must be at least {MIN_SECRET_LEN} bytes");
        }

        let jwt_ttl_seconds = matches
            .get_one::<u64>(ARG_JWT_TTL_SECONDS)
            .copied()
            .unwrap_or(3600);
        if jwt_ttl_seconds == 0 {
            anyhow::bail!("--{ARG_JWT_TTL_SECONDS} must be greater than zero");
        }

        Ok(Self {
            jwt_secret: SecretString::from(secret),
            jwt_ttl_seconds,
            rate_limit: matches.get_one::<u32>(ARG_RATE_LIMIT).copied().unwrap_or(60),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign and verify bearer tokens")
                .env("SPOREHUB_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_TTL_SECONDS)
                .long(ARG_JWT_TTL_SECONDS)
                .help("Bearer token lifetime in seconds")
                .env("SPOREHUB_JWT_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT)
                .long(ARG_RATE_LIMIT)
                .help("Requests per minute per client, 0 disables admission limiting")
                .env("SPOREHUB_RATE_LIMIT")
                .default_value("60")
                .value_parser(clap::value_parser!(u32)),
        )
}
