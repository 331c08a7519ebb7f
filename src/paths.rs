use std::{env, path::PathBuf};

/// Directory holding `gist-mirror` configuration.
///
/// `$XDG_CONFIG_HOME/gist-mirror`, falling back to `$HOME/.config/gist-mirror`.
pub fn config_home() -> PathBuf {
    let xdg = env::var_os("XDG_CONFIG_HOME");
    let base = xdg
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env::var_os("HOME").unwrap_or_default()).join(".config"));
    base.join("gist-mirror")
}

pub fn default_config_path() -> PathBuf {
    config_home().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn config_path_follows_xdg_config_home() {
        let td = tempfile::tempdir().unwrap();
        let old = env::var_os("XDG_CONFIG_HOME");
        unsafe { env::set_var("XDG_CONFIG_HOME", td.path()) };

        let got = default_config_path();

        match old {
            Some(v) => unsafe { env::set_var("XDG_CONFIG_HOME", v) },
            None => unsafe { env::remove_var("XDG_CONFIG_HOME") },
        }
        assert_eq!(got, td.path().join("gist-mirror").join("config.toml"));
    }
}
