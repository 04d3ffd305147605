use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_MAIL_RELAY_URL: &str = "mail-relay-url";
pub const ARG_MAIL_RELAY_TOKEN: &str = "mail-relay-token";
pub const ARG_MAIL_FROM: &str = "mail-from";
pub const ARG_MESSENGER_WEBHOOK_URL: &str = "messenger-webhook-url";
pub const ARG_MESSENGER_TOKEN: &str = "messenger-token";

#[derive(Debug, Clone)]
pub struct Options {
    pub mail_relay_url: Option<String>,
    pub mail_relay_token: Option<SecretString>,
    pub mail_from: String,
    pub messenger_webhook_url: Option<String>,
    pub messenger_token: Option<SecretString>,
}

impl Options {
    /// Parse delivery transport arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a URL is not a valid http(s) URL.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        // Env vars set to "" count as absent.
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let mail_relay_url = get_non_empty(ARG_MAIL_RELAY_URL)
            .map(|url| http_url(ARG_MAIL_RELAY_URL, &url))
            .transpose()?;
        let messenger_webhook_url = get_non_empty(ARG_MESSENGER_WEBHOOK_URL)
            .map(|url| http_url(ARG_MESSENGER_WEBHOOK_URL, &url))
            .transpose()?;

        Ok(Self {
            mail_relay_url,
            mail_relay_token: get_non_empty(ARG_MAIL_RELAY_TOKEN).map(SecretString::from),
            mail_from: get_non_empty(ARG_MAIL_FROM)
                .unwrap_or_else(|| crate::delivery::DEFAULT_MAIL_FROM.to_string()),
            messenger_webhook_url,
            messenger_token: get_non_empty(ARG_MESSENGER_TOKEN).map(SecretString::from),
        })
    }
}

fn http_url(id: &str, value: &str) -> anyhow::Result<String> {
    let url = Url::parse(value).with_context(|| format!("invalid --{id}: {value}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("--{id} must use http or https");
    }
    Ok(url.to_string())
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MAIL_RELAY_URL)
                .long(ARG_MAIL_RELAY_URL)
                .help("HTTP mail relay endpoint; emails are only logged when unset")
                .env("SPOREHUB_MAIL_RELAY_URL"),
        )
        .arg(
            Arg::new(ARG_MAIL_RELAY_TOKEN)
                .long(ARG_MAIL_RELAY_TOKEN)
                .help("Bearer token for the mail relay")
                .env("SPOREHUB_MAIL_RELAY_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_MAIL_FROM)
                .long(ARG_MAIL_FROM)
                .help("Sender address for outbound email")
                .env("SPOREHUB_MAIL_FROM")
                .default_value(crate::delivery::DEFAULT_MAIL_FROM),
        )
        .arg(
            Arg::new(ARG_MESSENGER_WEBHOOK_URL)
                .long(ARG_MESSENGER_WEBHOOK_URL)
                .help("Chat messaging webhook; messages are only logged when unset")
                .env("SPOREHUB_MESSENGER_WEBHOOK_URL"),
        )
        .arg(
            Arg::new(ARG_MESSENGER_TOKEN)
                .long(ARG_MESSENGER_TOKEN)
                .help("Bearer token for the messaging webhook")
                .env("SPOREHUB_MESSENGER_TOKEN")
                .hide_env_values(true),
        )
}
