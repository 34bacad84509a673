use anyhow::Result;

use affinity::config::Config;

/// Print the effective configuration (file, defaults and env overrides)
pub fn execute(config: &Config) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
