//! Map validated CLI arguments to the action that runs the service.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, delivery, otp};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or out of range.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;
    let otp_opts = otp::Options::parse(matches)?;
    let delivery_opts = delivery::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret: auth_opts.jwt_secret,
        jwt_ttl_seconds: auth_opts.jwt_ttl_seconds,
        rate_limit: auth_opts.rate_limit,
        otp_login_ttl_seconds: otp_opts.login_ttl_seconds,
        otp_password_reset_ttl_seconds: otp_opts.password_reset_ttl_seconds,
        otp_verification_ttl_seconds: otp_opts.verification_ttl_seconds,
        otp_registration_ttl_seconds: otp_opts.registration_ttl_seconds,
        otp_max_attempts: otp_opts.max_attempts,
        delivery_timeout_seconds: otp_opts.delivery_timeout_seconds,
        mail_relay_url: delivery_opts.mail_relay_url,
        mail_relay_token: delivery_opts.mail_relay_token,
        mail_from: delivery_opts.mail_from,
        messenger_webhook_url: delivery_opts.messenger_webhook_url,
        messenger_token: delivery_opts.messenger_token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DSN: &str = "postgres://user@localhost:5432/sporehub";
    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn dispatch_with(vars: &[(&'static str, Option<&'static str>)]) -> Result<Action> {
        let mut all = vec![
            ("SPOREHUB_DSN", Some(DSN)),
            ("SPOREHUB_JWT_SECRET", Some(SECRET)),
        ];
        all.extend_from_slice(vars);
        temp_env::with_vars(all, || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["sporehub"]);
            handler(&matches)
        })
    }

    #[test]
    fn defaults_build_server_action() {
        let result = dispatch_with(&[]);
        assert!(result.is_ok());
        if let Ok(Action::Server(args)) = result {
            assert_eq!(args.port, 8080);
            assert_eq!(args.rate_limit, 60);
            assert_eq!(args.otp_login_ttl_seconds, 300);
            assert_eq!(args.otp_password_reset_ttl_seconds, 900);
            assert_eq!(args.otp_max_attempts, 5);
            assert_eq!(args.mail_from, "no-reply@sporehub.local");
            assert!(args.mail_relay_url.is_none());
            assert!(args.messenger_webhook_url.is_none());
        }
    }

    #[test]
    fn short_secret_is_rejected() {
        let result = dispatch_with(&[("SPOREHUB_JWT_SECRET", Some("short"))]);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("at least 32 bytes"));
        }
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let result = dispatch_with(&[("SPOREHUB_OTP_LOGIN_TTL_SECONDS", Some("0"))]);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("--otp-login-ttl-seconds"));
        }
    }

    #[test]
    fn invalid_relay_url_is_rejected() {
        let result = dispatch_with(&[("SPOREHUB_MAIL_RELAY_URL", Some("ftp://relay.local"))]);
        assert!(result.is_err());

        let result = dispatch_with(&[("SPOREHUB_MAIL_RELAY_URL", Some("not a url"))]);
        assert!(result.is_err());
    }

    #[test]
    fn empty_env_values_count_as_unset() {
        let result = dispatch_with(&[("SPOREHUB_MESSENGER_WEBHOOK_URL", Some(""))]);
        assert!(result.is_ok());
        if let Ok(Action::Server(args)) = result {
            assert!(args.messenger_webhook_url.is_none());
        }
    }

    #[test]
    fn rate_limit_zero_is_allowed() {
        let result = dispatch_with(&[("SPOREHUB_RATE_LIMIT", Some("0"))]);
        assert!(matches!(result, Ok(Action::Server(ref args)) if args.rate_limit == 0));
    }
}
