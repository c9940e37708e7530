//! `~/.todorc` settings.
//!
//! The file holds `key = value` lines with `#` comments. Only the keys
//! below are understood; anything else is rejected so typos surface.

use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  warn
};

pub const DATA_LOCATION_KEY: &str =
  "data.location";
pub const COLOR_KEY: &str = "color";
pub const SEED_KEY: &str = "seed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Directory holding `tasks.data`
  /// and `preferences.json`; `~/` is
  /// expanded on use.
  pub data_location: PathBuf,
  pub color: bool,
  /// Insert demo tasks when the task
  /// file is created.
  pub seed: bool,
  pub loaded_from: Option<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location: PathBuf::from(
        "~/.todo"
      ),
      color: true,
      seed: true,
      loaded_from: None
    }
  }
}

impl Config {
  /// Loads the todorc picked by
  /// `--todorc`, then `TODORC`
  /// (`/dev/null` disables it), then
  /// `~/.todorc` if present.
  #[tracing::instrument(skip(
    todorc_override
  ))]
  pub fn load(
    todorc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let todorc = match todorc_override
    {
      Some(path) => {
        Some(path.to_path_buf())
      }
      None => {
        locate_todorc(
          std::env::var("TODORC").ok()
        )
      }
    };

    let Some(path) = todorc else {
      debug!(
        "no todorc; using defaults"
      );
      return Ok(Self::default());
    };

    let path = expand_tilde(&path);
    info!(todorc = %path.display(), "loading todorc");
    let text = fs::read_to_string(
      &path
    )
    .with_context(|| {
      format!(
        "failed to read {}",
        path.display()
      )
    })?;

    let mut cfg = Self::parse(&text)
      .with_context(|| {
        format!(
          "invalid todorc {}",
          path.display()
        )
      })?;
    cfg.loaded_from = Some(path);
    Ok(cfg)
  }

  pub fn parse(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::default();
    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split_once('#')
        .map_or(raw_line, |(before, _)| {
          before
        })
        .trim();
      if line.is_empty() {
        continue;
      }

      let (key, value) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "line {}: expected \
             `key = value`, got {:?}",
            idx + 1,
            raw_line
          )
        })?;
      cfg
        .set(key.trim(), value.trim())
        .with_context(|| {
          format!("line {}", idx + 1)
        })?;
    }
    Ok(cfg)
  }

  /// Applies `--rc` overrides; an
  /// `rc.` prefix on the key is
  /// accepted.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .unwrap_or(&key);
      debug!(key, value = %value, "applying override");
      self.set(key, &value)?;
    }
    Ok(())
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    match key {
      DATA_LOCATION_KEY => {
        if value.is_empty() {
          bail!(
            "{key} cannot be empty"
          );
        }
        self.data_location =
          PathBuf::from(value);
      }
      COLOR_KEY => {
        self.color =
          parse_switch(key, value)?
      }
      SEED_KEY => {
        self.seed =
          parse_switch(key, value)?
      }
      other => {
        bail!(
          "unknown setting {other:?}"
        )
      }
    }
    Ok(())
  }

  /// Resolves the data directory
  /// (`--data` wins over the todorc)
  /// and creates it if needed.
  #[tracing::instrument(skip(
    self,
    override_dir
  ))]
  pub fn data_dir(
    &self,
    override_dir: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    let dir = match override_dir {
      Some(path) => path.to_path_buf(),
      None => {
        expand_tilde(&self.data_location)
      }
    };

    if !dir.exists() {
      info!(dir = %dir.display(), "creating data directory");
      fs::create_dir_all(&dir)
        .with_context(|| {
          format!(
            "failed to create {}",
            dir.display()
          )
        })?;
    }
    Ok(dir)
  }
}

fn locate_todorc(
  env: Option<String>
) -> Option<PathBuf> {
  if let Some(env) = env {
    if env == "/dev/null" {
      return None;
    }
    return Some(PathBuf::from(env));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping todorc"
    );
    return None;
  };
  let candidate = home.join(".todorc");
  candidate
    .exists()
    .then_some(candidate)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  if let Ok(rest) =
    path.strip_prefix("~")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_switch(
  key: &str,
  value: &str
) -> anyhow::Result<bool> {
  match value
    .to_ascii_lowercase()
    .as_str()
  {
    "on" | "yes" | "true" | "1" => {
      Ok(true)
    }
    "off" | "no" | "false" | "0" => {
      Ok(false)
    }
    other => {
      Err(anyhow!(
        "{key} must be on or off, \
         not {other:?}"
      ))
    }
  }
}
