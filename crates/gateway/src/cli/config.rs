use ba_domain::config::{Config, ConfigSeverity};

const KEYRING_SERVICE: &str = "bioagent";

/// Parse and validate the config, printing any issues.
///
/// Exits with code 0 when valid, code 1 when errors are found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        error_count, warning_count,
    );

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}

/// Prompt for an API key and store it in the OS keychain under
/// `bioagent`/`<provider_id>`.
pub fn set_secret(_config: &Config, provider_id: &str) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, provider_id)?;
    let secret = rpassword::prompt_password(format!("API key for {provider_id}: "))?;
    entry.set_password(secret.trim())?;
    println!("Stored API key for {provider_id} in the OS keychain.");
    Ok(())
}

/// Read and print a masked API key from the OS keychain.
pub fn get_secret(_config: &Config, provider_id: &str) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, provider_id)?;
    match entry.get_password() {
        Ok(secret) => {
            let masked = mask(&secret);
            println!("{provider_id}: {masked}");
        }
        Err(keyring::Error::NoEntry) => {
            println!("{provider_id}: (no key stored)");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn mask(secret: &str) -> String {
    if secret.len() <= 8 {
        "*".repeat(secret.len())
    } else {
        format!("{}...{}", &secret[..4], &secret[secret.len() - 4..])
    }
}
