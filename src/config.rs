use std::collections::HashSet;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "Config::default_cmd")]
    pub cmd: String,

    #[serde(default = "Config::default_editor")]
    pub editor: String,

    #[serde(default = "Config::default_picker")]
    pub picker: String,

    pub kubeconfig: Option<String>,

    pub ns_alias: Option<Vec<NsAlias>>,

    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// A namespace shortlist keyed by context name, matched either by regex or
/// by an explicit set of names.
#[derive(Debug, Deserialize, Clone)]
pub struct NsAlias {
    pub regex: Option<String>,

    pub names: Option<HashSet<String>>,

    pub alias: Vec<String>,

    #[serde(skip)]
    parsed_regex: Option<Regex>,
}

impl Config {
    const CONFIG_PATH_ENV: &'static str = "KUBESWITCH_CONFIG_PATH";
    const KUBECONFIG_ENV: &'static str = "KUBECONFIG";

    pub fn load() -> Result<Config> {
        let path = Self::get_path().context("get config path")?;
        let mut cfg = match path.as_ref() {
            Some(path) => Self::read(path)?,
            None => Self::default(),
        };
        cfg.path = path;
        cfg.validate().context("validate config")?;
        Ok(cfg)
    }

    #[cfg(test)]
    pub fn parse(s: &str) -> Result<Config> {
        let mut cfg: Config = toml::from_str(s).context("parse config toml")?;
        cfg.validate().context("validate config")?;
        Ok(cfg)
    }

    pub fn match_ns_alias<S: AsRef<str>>(&self, name: S) -> Option<&[String]> {
        self.ns_alias
            .as_ref()?
            .iter()
            .find_map(|alias| alias.match_alias(name.as_ref()))
    }

    /// Resolve the kubeconfig path: explicit override, then the `kubeconfig`
    /// key, then the first entry of `$KUBECONFIG`, then `~/.kube/config`.
    pub fn kubeconfig_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }

        if let Some(path) = self.kubeconfig.as_ref() {
            let path = expand_env(path).context("expand env for `kubeconfig`")?;
            return Ok(PathBuf::from(path));
        }

        if let Some(paths) = env::var_os(Self::KUBECONFIG_ENV) {
            if let Some(path) = env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
                return Ok(path);
            }
        }

        let home_dir = get_home_dir()?;
        Ok(home_dir.join(".kube").join("config"))
    }

    fn get_path() -> Result<Option<PathBuf>> {
        let path = match env::var_os(Self::CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => {
                let home_dir = get_home_dir()?;
                home_dir.join(".config").join("kubeswitch.toml")
            }
        };

        match fs::metadata(&path) {
            Ok(meta) => {
                if meta.is_dir() {
                    bail!(
                        "config path '{}' is a directory, require file",
                        path.display()
                    );
                }
                Ok(Some(path))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("stat config file '{}'", path.display())),
        }
    }

    fn read<P: AsRef<Path>>(path: P) -> Result<Config> {
        let data = fs::read(path).context("read config file")?;
        let config = String::from_utf8(data).context("decode config file as utf-8")?;
        toml::from_str(&config).context("parse config toml")
    }

    fn validate(&mut self) -> Result<()> {
        if self.cmd.is_empty() {
            bail!("`cmd` cannot be empty");
        }
        if self.editor.is_empty() {
            bail!("`editor` cannot be empty");
        }
        if self.picker.is_empty() {
            bail!("`picker` cannot be empty");
        }

        if let Some(ns_alias) = self.ns_alias.as_mut() {
            for (idx, alias) in ns_alias.iter_mut().enumerate() {
                alias
                    .validate()
                    .with_context(|| format!("validate ns_alias index {idx}"))?;
            }
        }

        Ok(())
    }

    pub fn default() -> Config {
        Config {
            cmd: Self::default_cmd(),
            editor: Self::default_editor(),
            picker: Self::default_picker(),
            kubeconfig: None,
            ns_alias: None,
            path: None,
        }
    }

    fn default_cmd() -> String {
        String::from("kubeswitch")
    }

    fn default_editor() -> String {
        String::from("$EDITOR")
    }

    fn default_picker() -> String {
        String::from("fzf")
    }
}

impl NsAlias {
    fn match_alias(&self, name: &str) -> Option<&[String]> {
        let mut is_match = false;
        if let Some(regex) = self.parsed_regex.as_ref() {
            is_match = regex.is_match(name);
        }
        if let Some(names) = self.names.as_ref() {
            is_match = is_match || names.contains(name);
        }

        if is_match && !self.alias.is_empty() {
            Some(self.alias.as_slice())
        } else {
            None
        }
    }

    fn validate(&mut self) -> Result<()> {
        if self.alias.is_empty() {
            bail!("`ns_alias.alias` cannot be empty");
        }

        let mut has_regex = false;
        if let Some(regex) = self.regex.as_ref() {
            let regex =
                Regex::new(regex).with_context(|| format!("parse ns_alias regex '{regex}'"))?;
            self.parsed_regex = Some(regex);
            has_regex = true;
        }

        let has_names = self.names.as_ref().map_or(false, |names| !names.is_empty());

        if !has_regex && !has_names {
            bail!("ns_alias must have at least regex or names");
        }

        Ok(())
    }
}

fn expand_env<S: AsRef<str>>(s: S) -> Result<String> {
    let s = shellexpand::full(s.as_ref())
        .with_context(|| format!("expand env for '{}'", s.as_ref()))?;
    Ok(s.to_string())
}

fn get_home_dir() -> Result<PathBuf> {
    match env::var_os("HOME") {
        Some(home) => Ok(PathBuf::from(home)),
        None => bail!(
            "$HOME env not found in your system, please make sure that you are in an UNIX system"
        ),
    }
}
